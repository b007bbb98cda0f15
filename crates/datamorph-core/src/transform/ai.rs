//! Batched, rate-limited external transform step
//!
//! Items are sent to an [`ExternalTransform`] in fixed-size batches. Calls
//! inside a batch run concurrently; batches run one after another with a
//! fixed delay between them. Only the first `maxItems` items are sent, the
//! rest are kept unchanged in their original positions. A failure for one
//! item (call error, unparsable response, panic in the client) returns that
//! item unchanged and never fails the step.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use super::ConfigView;
use crate::error::{Error, Result};
use crate::path;
use crate::value::to_text;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const DEFAULT_SYSTEM_PROMPT: &str = "You transform data. Reply with JSON only, in the form {\"result\": <value>}.";

/// Request sent to the external transform collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTransformRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub output_format: String,
}

/// Raw reply from the external transform collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTransformResponse {
    pub response: String,
}

/// External text transformation service (typically an LLM endpoint)
#[async_trait]
pub trait ExternalTransform: Send + Sync {
    async fn invoke(&self, request: ExternalTransformRequest) -> Result<ExternalTransformResponse>;
}

/// Configuration of an `ai-transform` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTransformConfig {
    /// Item field sent to the service; whole item when unset
    #[serde(default)]
    pub field: Option<String>,

    /// Field receiving the result; defaults to `field`
    #[serde(default)]
    pub target_field: Option<String>,

    /// User instruction prepended to the item text, also read from `instruction`
    #[serde(default)]
    pub prompt: String,

    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default = "default_output_format")]
    pub output_format: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_output_format() -> String {
    "json".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_delay_ms() -> u64 {
    2000
}

fn default_max_items() -> usize {
    50
}

impl Default for AiTransformConfig {
    fn default() -> Self {
        Self {
            field: None,
            target_field: None,
            prompt: String::new(),
            system_prompt: None,
            output_format: default_output_format(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_items: default_max_items(),
        }
    }
}

impl AiTransformConfig {
    /// Parse from a step config, letting `source_field` stand in for `field`
    pub fn from_step_config(config: &Value, source_field: Option<&str>, step: &str) -> Result<Self> {
        let mut parsed: Self = match config {
            Value::Null => Self::default(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| Error::transformation(step, format!("invalid ai-transform config: {}", e)))?,
        };
        if let Some(prompt) = ConfigView::new(config, step).field(&["prompt", "instruction"]) {
            parsed.prompt = prompt;
        }
        if parsed.field.is_none() {
            parsed.field = source_field.map(str::to_string);
        }
        Ok(parsed)
    }
}

/// Wraps an [`ExternalTransform`] with batching and a fixed-window delay
pub struct AiThrottler {
    config: AiTransformConfig,
    client: Arc<dyn ExternalTransform>,
}

impl AiThrottler {
    pub fn new(config: AiTransformConfig, client: Arc<dyn ExternalTransform>) -> Self {
        Self { config, client }
    }

    /// Transform an array item by item, or a scalar/object as one item
    pub async fn apply(&self, input: Value) -> Value {
        match input {
            Value::Array(items) => Value::Array(self.apply_items(items).await),
            other => self.transform_item(other).await,
        }
    }

    async fn apply_items(&self, mut items: Vec<Value>) -> Vec<Value> {
        let cap = self.config.max_items.min(items.len());
        let passthrough = items.split_off(cap);
        let batch_size = self.config.batch_size.max(1);
        let batch_count = items.len().div_ceil(batch_size);

        debug!(
            items = items.len(),
            passthrough = passthrough.len(),
            batches = batch_count,
            "Running ai-transform"
        );

        let mut output = Vec::with_capacity(items.len() + passthrough.len());
        for (index, batch) in items.chunks(batch_size).enumerate() {
            let calls = batch.iter().cloned().map(|item| self.transform_item(item));
            output.extend(join_all(calls).await);

            if index + 1 < batch_count && self.config.batch_delay_ms > 0 {
                sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        output.extend(passthrough);
        output
    }

    async fn transform_item(&self, item: Value) -> Value {
        match self.try_transform(&item).await {
            Ok(transformed) => transformed,
            Err(e) => {
                warn!(error = %e, "ai-transform failed for item, keeping original");
                item
            }
        }
    }

    async fn try_transform(&self, item: &Value) -> Result<Value> {
        let field = self.config.field.as_deref();
        let input_text = match (field, item) {
            (Some(field), _) => to_text(&path::get(item, field)),
            (None, Value::String(s)) => s.clone(),
            (None, other) => other.to_string(),
        };

        let request = ExternalTransformRequest {
            prompt: format!("{}\n\n{}", self.config.prompt, input_text),
            system_prompt: self
                .config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            output_format: self.config.output_format.clone(),
        };

        let response = AssertUnwindSafe(self.client.invoke(request))
            .catch_unwind()
            .await
            .map_err(|payload| Error::Internal {
                message: "external transform panicked".to_string(),
                source: anyhow::anyhow!(panic_message(payload.as_ref())),
            })??;

        let result = parse_response(&response.response, &self.config.output_format)?;

        let target = self.config.target_field.as_deref().or(field);
        Ok(match (target, item) {
            (Some(target), Value::Object(_)) => {
                let mut updated = item.clone();
                path::set(&mut updated, target, result);
                updated
            }
            _ => result,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Interpret an external response according to the output format
pub fn parse_response(response: &str, output_format: &str) -> Result<Value> {
    let trimmed = response.trim();
    if output_format.eq_ignore_ascii_case("text") {
        return Ok(Value::String(trimmed.to_string()));
    }

    let body = strip_code_fence(trimmed);
    let parsed: Value = serde_json::from_str(body).map_err(|e| Error::AiTransform {
        message: format!("response is not valid JSON: {}", e),
    })?;

    Ok(unwrap_result(parsed))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn unwrap_result(parsed: Value) -> Value {
    match parsed {
        Value::Object(mut map) => {
            if map.len() == 1 {
                let key = map.keys().next().cloned().unwrap_or_default();
                return map.remove(&key).unwrap_or(Value::Null);
            }
            for key in ["summary", "result", "value"] {
                if let Some(value) = map.remove(key) {
                    return value;
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}
