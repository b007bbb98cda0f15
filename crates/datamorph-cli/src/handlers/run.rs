//! Run command handler

use super::load_mapping_config;
use crate::ai_client::HttpTransformClient;
use crate::cli::{OutputFormat, RunArgs};
use crate::config::Config;
use crate::error::{Error, ErrorContext, Result};
use crate::logging::timing::Timer;
use crate::output::OutputWriter;
use crate::sources::{resolve_locations, LocationFetcher};
use datamorph_core::{fetch_sources, MappingEngine};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Handle the run command
#[instrument(skip_all, fields(file = %args.mapping.display()))]
pub async fn handle_run(args: RunArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::with_details("run_command", &format!("file: {}", args.mapping.display()));

    let timeout_ms = args.timeout_ms.unwrap_or(config.fetch.timeout_ms);
    if timeout_ms == 0 {
        return Err(Error::InvalidArgs("--timeout-ms must be greater than zero".to_string()));
    }
    let budget = Duration::from_millis(timeout_ms);
    let mapping = load_mapping_config(&args.mapping)?;

    let mut engine = MappingEngine::new().with_fetch_timeout(budget);
    if let Some(client) = HttpTransformClient::from_config(config)? {
        engine = engine.with_external_transform(Arc::new(client));
    }

    for warning in engine.validate(&mapping).warnings {
        warn!("{}", warning);
    }

    let locations = resolve_locations(&mapping, config, &args.sources);
    let fetcher = LocationFetcher::new(locations, budget)?;

    let spinner = if config.output.progress {
        output.spinner("Fetching sources...")
    } else {
        None
    };
    let payloads = fetch_sources(&fetcher, &mapping.source_selection.sources, budget).await;
    info!(
        requested = mapping.source_selection.sources.len(),
        fetched = payloads.len(),
        "Sources fetched"
    );

    if let Some(pb) = &spinner {
        pb.set_message("Mapping...");
    }
    let result = engine.try_execute(&mapping, &payloads).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let document = result.map_err(|e| match e {
        datamorph_core::Error::Configuration { .. } => Error::MappingRejected {
            message: e.to_string(),
        },
        other => Error::Core(other),
    })?;

    let rendered = render(&document, output.format(), args.pretty || config.output.pretty)?;

    match &args.save_to {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output.success(&format!(
                "✓ Mapped {} of {} source(s) into {}",
                payloads.len(),
                mapping.source_selection.sources.len(),
                path.display()
            ))?;
        }
        None => output.writeln(rendered.trim_end())?,
    }

    Ok(())
}

/// Serialise the mapped document for the chosen output format
fn render(document: &Value, format: OutputFormat, pretty: bool) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(document)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(document)?,
        _ if pretty => serde_json::to_string_pretty(document)?,
        _ => serde_json::to_string(document)?,
    })
}
