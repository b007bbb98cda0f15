//! Source retrieval for the CLI
//!
//! Each source id resolves to a location, a local file or an HTTP(S) URL.
//! Locations come from `--source ID=...` flags first, then the settings
//! file, then the descriptor's own metadata (`location`, `url` or `path`).

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use datamorph_core::{MappingConfig, SourceDescriptor, SourceFetcher};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const METADATA_LOCATION_KEYS: [&str; 3] = ["location", "url", "path"];

/// Where one source's payload lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Http(String),
}

impl SourceLocation {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Http(raw.to_string())
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Http(url) => write!(f, "{}", url),
        }
    }
}

/// Resolve a location for every configured source that has one
pub fn resolve_locations(
    mapping: &MappingConfig,
    settings: &Config,
    overrides: &[(String, String)],
) -> HashMap<String, SourceLocation> {
    let overrides: HashMap<&str, &str> = overrides
        .iter()
        .map(|(id, location)| (id.as_str(), location.as_str()))
        .collect();

    let mut locations = HashMap::new();
    for descriptor in &mapping.source_selection.sources {
        let id = descriptor.id.as_str();
        let raw = overrides
            .get(id)
            .copied()
            .or_else(|| settings.fetch.sources.get(id).map(String::as_str))
            .or_else(|| metadata_location(descriptor));

        match raw {
            Some(raw) => {
                let location = SourceLocation::parse(raw);
                debug!(source = %id, location = %location, "Resolved source location");
                locations.insert(id.to_string(), location);
            }
            None => warn!(source = %id, "No location configured for source"),
        }
    }

    for id in overrides.keys() {
        if !locations.contains_key(*id) {
            warn!(source = %id, "--source given for an id the mapping does not select");
        }
    }

    locations
}

fn metadata_location(descriptor: &SourceDescriptor) -> Option<&str> {
    METADATA_LOCATION_KEYS
        .iter()
        .find_map(|key| descriptor.metadata.get(*key).and_then(Value::as_str))
        .filter(|raw| !raw.trim().is_empty())
}

/// Fetches sources from files and HTTP endpoints
pub struct LocationFetcher {
    locations: HashMap<String, SourceLocation>,
    client: reqwest::Client,
}

impl LocationFetcher {
    pub fn new(locations: HashMap<String, SourceLocation>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("datamorph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { locations, client })
    }

    async fn read_file(&self, id: &str, path: &PathBuf) -> datamorph_core::Result<Value> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| unavailable(id, format!("{}: {}", path.display(), e)))?;

        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| unavailable(id, format!("invalid YAML: {}", e)))
        } else {
            serde_json::from_str(&content).map_err(|e| unavailable(id, format!("invalid JSON: {}", e)))
        }
    }

    async fn get(&self, id: &str, url: &str) -> datamorph_core::Result<Value> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| unavailable(id, describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(id, format!("HTTP {}", status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| unavailable(id, format!("invalid JSON body: {}", e)))
    }
}

#[async_trait]
impl SourceFetcher for LocationFetcher {
    async fn fetch(&self, descriptor: &SourceDescriptor) -> datamorph_core::Result<Option<Value>> {
        let Some(location) = self.locations.get(&descriptor.id) else {
            return Ok(None);
        };

        let payload = match location {
            SourceLocation::File(path) => self.read_file(&descriptor.id, path).await?,
            SourceLocation::Http(url) => self.get(&descriptor.id, url).await?,
        };

        debug!(source = %descriptor.id, location = %location, "Fetched source");
        Ok(Some(payload))
    }
}

fn unavailable(id: &str, message: String) -> datamorph_core::Error {
    datamorph_core::Error::SourceUnavailable {
        source_id: id.to_string(),
        message,
    }
}

/// Shorten reqwest errors to what a user can act on
pub(crate) fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn mapping() -> MappingConfig {
        MappingConfig::from_value(json!({
            "sourceSelection": {"sources": [
                {"id": "news", "metadata": {"url": "https://news.example.com/feed.json"}},
                {"id": "blog", "metadata": {"path": "./blog.json"}},
                {"id": "wiki"}
            ]},
            "fieldMappings": [{"targetPath": "title", "sourcePath": "title"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_location_parsing() {
        assert_eq!(
            SourceLocation::parse("HTTPS://example.com/a.json"),
            SourceLocation::Http("HTTPS://example.com/a.json".to_string())
        );
        assert_eq!(
            SourceLocation::parse("data/a.json"),
            SourceLocation::File(PathBuf::from("data/a.json"))
        );
    }

    #[test]
    fn test_resolution_precedence() {
        let mut settings = Config::default();
        settings
            .fetch
            .sources
            .insert("blog".to_string(), "/srv/blog.json".to_string());
        settings
            .fetch
            .sources
            .insert("wiki".to_string(), "/srv/wiki.yaml".to_string());
        let overrides = vec![("wiki".to_string(), "http://localhost/wiki".to_string())];

        let locations = resolve_locations(&mapping(), &settings, &overrides);

        assert_eq!(
            locations["news"],
            SourceLocation::Http("https://news.example.com/feed.json".to_string())
        );
        assert_eq!(locations["blog"], SourceLocation::File(PathBuf::from("/srv/blog.json")));
        assert_eq!(locations["wiki"], SourceLocation::Http("http://localhost/wiki".to_string()));
    }

    #[test]
    fn test_sources_without_location_are_skipped() {
        let locations = resolve_locations(&mapping(), &Config::default(), &[]);
        assert_eq!(locations.len(), 2);
        assert!(!locations.contains_key("wiki"));
    }

    #[tokio::test]
    async fn test_fetch_files() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("a.json");
        let yaml_path = dir.path().join("b.yml");
        std::fs::write(&json_path, r#"{"items": [{"title": "A"}]}"#).unwrap();
        std::fs::write(&yaml_path, "items:\n  - title: B\n").unwrap();

        let fetcher = LocationFetcher::new(
            HashMap::from([
                ("a".to_string(), SourceLocation::File(json_path)),
                ("b".to_string(), SourceLocation::File(yaml_path)),
                ("gone".to_string(), SourceLocation::File(dir.path().join("missing.json"))),
            ]),
            Duration::from_secs(5),
        )
        .unwrap();

        let a = fetcher.fetch(&SourceDescriptor::new("a", "A")).await.unwrap();
        assert_eq!(a, Some(json!({"items": [{"title": "A"}]})));

        let b = fetcher.fetch(&SourceDescriptor::new("b", "B")).await.unwrap();
        assert_eq!(b, Some(json!({"items": [{"title": "B"}]})));

        let unknown = fetcher.fetch(&SourceDescriptor::new("other", "Other")).await.unwrap();
        assert_eq!(unknown, None);

        let err = fetcher.fetch(&SourceDescriptor::new("gone", "Gone")).await.unwrap_err();
        assert!(matches!(err, datamorph_core::Error::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_http() {
        let (url, request) = serve_once(200, r#"{"data": [1, 2]}"#).await;
        let fetcher = LocationFetcher::new(
            HashMap::from([("api".to_string(), SourceLocation::Http(format!("{}/feed", url)))]),
            Duration::from_secs(5),
        )
        .unwrap();

        let payload = fetcher.fetch(&SourceDescriptor::new("api", "API")).await.unwrap();
        assert_eq!(payload, Some(json!({"data": [1, 2]})));
        assert!(request.await.unwrap().starts_with("GET /feed "));
    }

    #[tokio::test]
    async fn test_http_error_status_is_unavailable() {
        let (url, _request) = serve_once(503, "{}").await;
        let fetcher = LocationFetcher::new(
            HashMap::from([("api".to_string(), SourceLocation::Http(url))]),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = fetcher.fetch(&SourceDescriptor::new("api", "API")).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }
}
