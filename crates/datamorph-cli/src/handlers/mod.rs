//! Command handlers for CLI subcommands
//!
//! This module contains the implementation logic for each CLI subcommand,
//! plus the mapping configuration loader they share.

mod completions;
mod config;
mod run;
mod validate;

pub use completions::handle_completions;
pub use config::handle_config;
pub use run::handle_run;
pub use validate::handle_validate;

use crate::error::{Error, Result};
use crate::logging::redaction;
use datamorph_core::MappingConfig;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, trace};

/// Load a mapping configuration from a JSON or YAML file
pub fn load_mapping_config(path: &Path) -> Result<MappingConfig> {
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let is_yaml = matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    );

    let raw: Value = if is_yaml {
        serde_yaml::from_str(&content).map_err(|_| Error::InvalidFormat {
            path: path.to_path_buf(),
            expected: "YAML".to_string(),
        })?
    } else {
        serde_json::from_str(&content).map_err(|_| Error::InvalidFormat {
            path: path.to_path_buf(),
            expected: "JSON".to_string(),
        })?
    };

    if tracing::enabled!(tracing::Level::TRACE) {
        let mut redacted = raw.clone();
        redaction::redact_json_value(&mut redacted);
        trace!(config = %redacted, "Mapping configuration contents");
    }

    let config = MappingConfig::from_value(raw)?;
    debug!(
        path = %path.display(),
        sources = config.source_selection.sources.len(),
        mappings = config.field_mappings.len(),
        "Loaded mapping configuration"
    );
    Ok(config)
}
