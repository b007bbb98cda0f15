//! Mapping engine entry point
//!
//! [`MappingEngine`] ties the pieces together for one request:
//! configuration checks, the transformation pipeline, source merging and
//! output finalisation. Each call owns its working set; the engine itself
//! only holds the optional external transform client and the fetch budget.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::mapping::{effective_mode, finalize, validate_config, SourceMerger, ValidationReport};
use crate::source::{fetch_sources, SourceFetcher, DEFAULT_FETCH_TIMEOUT};
use crate::transform::{ExternalTransform, TransformationPipeline};
use crate::types::{MappingConfig, SourcePayloads};
use crate::value::now_iso;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runs mapping configurations against fetched source payloads
#[derive(Clone)]
pub struct MappingEngine {
    external: Option<Arc<dyn ExternalTransform>>,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for MappingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingEngine")
            .field("external", &self.external.is_some())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self {
            external: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl MappingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `client` for `ai-transform` pipeline steps
    pub fn with_external_transform(mut self, client: Arc<dyn ExternalTransform>) -> Self {
        self.external = Some(client);
        self
    }

    /// Per-source budget used by [`MappingEngine::fetch_and_execute`]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Run a configuration, surfacing configuration errors as `{error}` values
    pub async fn execute(&self, config: &MappingConfig, payloads: &SourcePayloads) -> Value {
        match self.try_execute(config, payloads).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Mapping run rejected");
                e.to_value()
            }
        }
    }

    /// Run a configuration given as raw JSON
    pub async fn execute_json(&self, config: Value, payloads: &SourcePayloads) -> Value {
        match MappingConfig::from_value(config) {
            Ok(config) => self.execute(&config, payloads).await,
            Err(e) => {
                warn!(error = %e, "Mapping configuration could not be parsed");
                e.to_value()
            }
        }
    }

    /// Fetch every configured source, then run the configuration
    pub async fn fetch_and_execute(&self, config: &MappingConfig, fetcher: &dyn SourceFetcher) -> Value {
        if let Err(e) = check_config(config) {
            return e.to_value();
        }
        let payloads = fetch_sources(fetcher, &config.source_selection.sources, self.fetch_timeout).await;
        self.execute(config, &payloads).await
    }

    /// Run a configuration, returning the typed error on rejection
    pub async fn try_execute(&self, config: &MappingConfig, payloads: &SourcePayloads) -> Result<Value> {
        check_config(config)?;

        let mode = effective_mode(config);
        let span = info_span!(
            "mapping_run",
            merge_mode = ?mode,
            sources = config.source_selection.sources.len(),
            fetched = payloads.len()
        );

        async {
            let timestamp = now_iso();
            let pipeline = self.pipeline(config);
            debug!(steps = pipeline.len(), stage = ?config.pipeline_stage, "Prepared pipeline");

            let outcome = SourceMerger::new(config, &pipeline, timestamp.as_str())
                .merge(payloads)
                .await;
            let output = finalize(config, &outcome, &timestamp)?;

            info!(
                items = crate::mapping::payload_count(&outcome.payload),
                "Mapping run complete"
            );
            Ok::<_, Error>(output)
        }
        .instrument(span)
        .await
    }

    /// Static report on a configuration, independent of any run
    pub fn validate(&self, config: &MappingConfig) -> ValidationReport {
        validate_config(config)
    }

    fn pipeline(&self, config: &MappingConfig) -> TransformationPipeline {
        let pipeline = TransformationPipeline::with_steps(config.pipeline_steps().into_iter().cloned());
        match &self.external {
            Some(client) => pipeline.with_external_transform(Arc::clone(client)),
            None => pipeline,
        }
    }
}

/// Reject configurations the engine cannot run
fn check_config(config: &MappingConfig) -> Result<()> {
    if config.source_selection.sources.is_empty() {
        return Err(Error::configuration_field(
            "No sources selected",
            "sourceSelection.sources",
        ));
    }
    if config.field_mappings.is_empty() {
        return Err(Error::configuration_field(
            "No field mappings configured",
            "fieldMappings",
        ));
    }
    if let Some(wrapper) = config.output_wrapper.as_ref().filter(|w| w.enabled) {
        wrapper.key()?;
    }
    Ok(())
}
