//! Output envelope and template splicing
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use super::merge::MergeOutcome;
use crate::error::Result;
use crate::types::{MappingConfig, OutputWrapperConfig};
use serde_json::{json, Map, Value};

/// Version stamped into wrapped output
pub const OUTPUT_VERSION: &str = "1.0";

const DATA_PLACEHOLDER: &str = "{{data}}";
const COUNT_PLACEHOLDER: &str = "{{count}}";
const TIMESTAMP_PLACEHOLDER: &str = "{{timestamp}}";

/// Number of items a payload represents
pub fn payload_count(payload: &Value) -> usize {
    match payload {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Builds the final output from a merge outcome
#[derive(Debug)]
pub struct OutputWrapper<'a> {
    config: &'a OutputWrapperConfig,
}

impl<'a> OutputWrapper<'a> {
    pub fn new(config: &'a OutputWrapperConfig) -> Self {
        Self { config }
    }

    /// Place the payload under the wrapper key, next to the requested metadata
    pub fn wrap(&self, outcome: &MergeOutcome, timestamp: &str) -> Result<Value> {
        if !self.config.enabled {
            return Ok(outcome.payload.clone());
        }

        let key = self.config.key()?;
        let mut envelope = Map::new();

        let metadata = self.metadata(outcome, timestamp);
        if !metadata.is_empty() {
            envelope.insert("metadata".to_string(), Value::Object(metadata));
        }
        envelope.insert(key.to_string(), outcome.payload.clone());

        Ok(Value::Object(envelope))
    }

    fn metadata(&self, outcome: &MergeOutcome, timestamp: &str) -> Map<String, Value> {
        let mut metadata = Map::new();

        if self.config.include_timestamp {
            metadata.insert("timestamp".to_string(), Value::String(timestamp.to_string()));
        }

        if self.config.include_source {
            match outcome.sources.as_slice() {
                [only] => {
                    metadata.insert("source".to_string(), only.summary());
                }
                sources => {
                    let summaries = sources.iter().map(|s| s.summary()).collect();
                    metadata.insert("sources".to_string(), Value::Array(summaries));
                }
            }
        }

        if self.config.include_count {
            metadata.insert("count".to_string(), json!(payload_count(&outcome.payload)));
        }

        if self.config.include_source_counts {
            let counts: Map<String, Value> = outcome
                .source_counts
                .iter()
                .map(|c| (c.id.clone(), json!(c.count)))
                .collect();
            metadata.insert("sourceCounts".to_string(), Value::Object(counts));
        }

        if self.config.include_version {
            metadata.insert("version".to_string(), Value::String(OUTPUT_VERSION.to_string()));
        }

        metadata
    }
}

/// Wrap the outcome and splice it into the output template, when configured
pub fn finalize(config: &MappingConfig, outcome: &MergeOutcome, timestamp: &str) -> Result<Value> {
    let wrapped = match &config.output_wrapper {
        Some(wrapper) => OutputWrapper::new(wrapper).wrap(outcome, timestamp)?,
        None => outcome.payload.clone(),
    };

    Ok(match &config.output_template {
        Some(template) => apply_template(template, &wrapped, payload_count(&outcome.payload), timestamp),
        None => wrapped,
    })
}

/// Replace placeholders in a template.
///
/// A string that is exactly a placeholder is replaced by the typed value;
/// `{{count}}` and `{{timestamp}}` embedded in longer strings are replaced
/// textually. `{{data}}` only substitutes as a whole string.
pub fn apply_template(template: &Value, data: &Value, count: usize, timestamp: &str) -> Value {
    match template {
        Value::String(s) => match s.trim() {
            DATA_PLACEHOLDER => data.clone(),
            COUNT_PLACEHOLDER => json!(count),
            TIMESTAMP_PLACEHOLDER => Value::String(timestamp.to_string()),
            _ => Value::String(
                s.replace(COUNT_PLACEHOLDER, &count.to_string())
                    .replace(TIMESTAMP_PLACEHOLDER, timestamp),
            ),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| apply_template(item, data, count, timestamp))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), apply_template(v, data, count, timestamp)))
                .collect(),
        ),
        other => other.clone(),
    }
}
