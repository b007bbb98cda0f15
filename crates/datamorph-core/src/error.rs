//! Error types for the Datamorph core library
//!
//! This module defines the error taxonomy of the mapping engine using thiserror.
//! None of these errors is fatal to a mapping run: configuration errors are
//! surfaced as a structured `{error}` value at the engine boundary, and every
//! other kind is caught and logged close to where it happens.

use serde_json::{json, Value};
use thiserror::Error;

/// Main error type for Datamorph operations
#[derive(Error, Debug)]
pub enum Error {
    /// The mapping configuration cannot be executed
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// A source could not be fetched
    #[error("Source '{source_id}' unavailable: {message}")]
    SourceUnavailable {
        source_id: String,
        message: String,
    },

    /// A pipeline step failed
    #[error("Transformation '{step}' failed: {message}")]
    Transformation {
        step: String,
        message: String,
    },

    /// An external AI transform call failed for one item
    #[error("AI transform failed: {message}")]
    AiTransform {
        message: String,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// A source fetch exceeded its time budget
    #[error("Source '{source_id}' timed out after {millis}ms")]
    Timeout {
        source_id: String,
        millis: u64,
    },

    /// A collaborator failed in a way no other variant describes
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error pointing at a config field
    pub fn configuration_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a transformation error for a named step
    pub fn transformation(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transformation {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::Transformation { .. } => "transformation",
            Self::AiTransform { .. } => "ai_transform",
            Self::Json { .. } => "json",
            Self::Timeout { .. } => "timeout",
            Self::Internal { .. } => "internal",
        }
    }

    /// Render the error as the structured result returned across the engine boundary
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let Self::Configuration { field: Some(field), .. } = self {
            value["field"] = Value::String(field.clone());
        }
        value
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_value() {
        let err = Error::configuration_field("No sources selected", "sourceSelection.sources");
        let value = err.to_value();
        assert_eq!(value["kind"], "configuration");
        assert_eq!(value["field"], "sourceSelection.sources");
        assert!(value["error"].as_str().unwrap().contains("No sources selected"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::transformation("sort", "boom").kind(), "transformation");
        let err = Error::Timeout {
            source_id: "a".to_string(),
            millis: 10,
        };
        assert_eq!(err.kind(), "timeout");
        assert!(err.to_string().contains("10ms"));
        assert!(err.to_value().get("field").is_none());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<Value, _> = serde_json::from_str("{oops");
        let err: Error = parse.unwrap_err().into();
        assert_eq!(err.kind(), "json");
    }
}
