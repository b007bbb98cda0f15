//! Settings management for the CLI
//!
//! This module handles loading CLI settings from:
//! - Default values
//! - Settings files (YAML/JSON/TOML)
//! - Environment variables (for secrets and logging)
//!
//! These are settings for the command-line tool itself. Mapping
//! configurations are separate documents passed to `run` and `validate`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default per-source fetch budget in milliseconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Source fetching settings
    pub fetch: FetchConfig,

    /// External AI transform endpoint
    pub ai: AiConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Source fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-source budget in milliseconds
    pub timeout_ms: u64,

    /// Source id to file path or URL
    pub sources: BTreeMap<String, String>,
}

/// External AI transform configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// Endpoint receiving `{prompt, systemPrompt, outputFormat}`; AI steps are skipped when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the bearer token
    pub api_key_env: String,

    /// Request timeout in seconds
    pub timeout: u64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Show progress indicators
    pub progress: bool,

    /// Pretty-print mapped documents by default
    pub pretty: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no -v flag is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Log format (compact, full, json)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Log file path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            sources: BTreeMap::new(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: "DATAMORPH_AI_KEY".to_string(),
            timeout: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            progress: true,
            pretty: false,
        }
    }
}

impl Config {
    /// Load settings from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?,
            _ => serde_json::from_str(&content)?,
        };

        Ok(config)
    }

    /// Load settings from default locations
    pub fn load() -> Result<Self> {
        for path in &Self::default_config_paths() {
            if path.exists() {
                match Self::from_file(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        eprintln!("Warning: Failed to load settings from {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load settings from a specific file or default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        if let Some(path) = file {
            Self::from_file(path)
        } else {
            Self::load()
        }
    }

    /// Get default settings file paths to check
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from(".datamorph.yaml"),
            PathBuf::from(".datamorph.json"),
            PathBuf::from(".datamorph.toml"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let datamorph_dir = config_dir.join("datamorph");
            paths.push(datamorph_dir.join("config.yaml"));
            paths.push(datamorph_dir.join("config.json"));
            paths.push(datamorph_dir.join("config.toml"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".datamorph.yaml"));
        }

        paths
    }

    /// Save settings to a file, format chosen by extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            _ => serde_yaml::to_string(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Bearer token for the AI endpoint, read from the configured variable
    pub fn ai_api_key(&self) -> Option<String> {
        std::env::var(&self.ai.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetch.timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
        assert!(config.ai.endpoint.is_none());
        assert_eq!(config.ai.api_key_env, "DATAMORPH_AI_KEY");
        assert!(config.output.progress);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "fetch:\n  sources:\n    news: ./news.json\nai:\n  endpoint: http://localhost:9000/transform\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.fetch.timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
        assert_eq!(config.fetch.sources["news"], "./news.json");
        assert_eq!(config.ai.endpoint.as_deref(), Some("http://localhost:9000/transform"));
        assert_eq!(config.ai.timeout, 60);
    }

    #[test]
    fn test_save_and_reload_in_each_format() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.fetch.timeout_ms = 1_500;
        config.logging.format = Some("json".to_string());

        for name in ["out.yaml", "out.json", "nested/out.toml"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(Config::from_file(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/datamorph.yaml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
