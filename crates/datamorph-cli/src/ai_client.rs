//! HTTP client for the external AI transform service
//!
//! Posts `{prompt, systemPrompt, outputFormat}` as JSON and expects a
//! `{response}` body back. A bearer token is attached when one is configured.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::redaction::redact_sensitive;
use crate::sources::describe_request_error;
use async_trait::async_trait;
use datamorph_core::{ExternalTransform, ExternalTransformRequest, ExternalTransformResponse};
use std::time::Duration;
use tracing::{debug, info};

/// Calls an HTTP endpoint for `ai-transform` pipeline steps
#[derive(Debug, Clone)]
pub struct HttpTransformClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTransformClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("datamorph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Build a client from settings; `None` when no endpoint is configured
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(endpoint) = config.ai.endpoint.as_deref().filter(|e| !e.trim().is_empty()) else {
            return Ok(None);
        };

        info!(
            endpoint = %redact_sensitive(endpoint),
            authenticated = config.ai_api_key().is_some(),
            "Using external AI transform endpoint"
        );
        Self::new(
            endpoint,
            config.ai_api_key(),
            Duration::from_secs(config.ai.timeout),
        )
        .map(Some)
    }
}

#[async_trait]
impl ExternalTransform for HttpTransformClient {
    async fn invoke(
        &self,
        request: ExternalTransformRequest,
    ) -> datamorph_core::Result<ExternalTransformResponse> {
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| ai_error(describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ai_error(format!(
                "HTTP {}: {}",
                status,
                redact_sensitive(body.chars().take(200).collect::<String>().as_str())
            )));
        }

        let reply = response
            .json::<ExternalTransformResponse>()
            .await
            .map_err(|e| ai_error(format!("invalid response body: {}", e)))?;

        debug!(chars = reply.response.len(), "AI transform replied");
        Ok(reply)
    }
}

fn ai_error(message: String) -> datamorph_core::Error {
    datamorph_core::Error::AiTransform { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;
    use pretty_assertions::assert_eq;

    fn request() -> ExternalTransformRequest {
        ExternalTransformRequest {
            prompt: "Summarise\n\nhello".to_string(),
            system_prompt: "Reply with JSON".to_string(),
            output_format: "json".to_string(),
        }
    }

    #[test]
    fn test_no_endpoint_means_no_client() {
        assert!(HttpTransformClient::from_config(&Config::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_posts_request_with_bearer_token() {
        let (url, captured) = serve_once(200, r#"{"response": "{\"result\": 1}"}"#).await;
        let client =
            HttpTransformClient::new(url, Some("secret-key".to_string()), Duration::from_secs(5)).unwrap();

        let reply = client.invoke(request()).await.unwrap();
        assert_eq!(reply.response, r#"{"result": 1}"#);

        let raw = captured.await.unwrap();
        assert!(raw.starts_with("POST / "));
        assert!(raw.to_lowercase().contains("authorization: bearer secret-key"));
        assert!(raw.contains(r#""systemPrompt":"Reply with JSON""#));
        assert!(raw.contains(r#""outputFormat":"json""#));
    }

    #[tokio::test]
    async fn test_error_status_is_an_ai_error() {
        let (url, _captured) = serve_once(500, r#"{"error": "overloaded"}"#).await;
        let client = HttpTransformClient::new(url, None, Duration::from_secs(5)).unwrap();

        let err = client.invoke(request()).await.unwrap_err();
        assert!(matches!(err, datamorph_core::Error::AiTransform { .. }));
        assert!(err.to_string().contains("500"));
    }
}
