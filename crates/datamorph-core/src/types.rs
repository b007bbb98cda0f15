//! Core types and data structures for the Datamorph mapping engine
//!
//! This module defines the declarative configuration consumed by the engine:
//! which sources to read, how fields map onto the target document, which
//! transformations run, and how the final payload is wrapped. Keys are
//! camelCase on the wire.

use crate::condition::Operator;
use crate::error::{Error, Result};
use crate::path;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Reserved prefix addressing source metadata instead of item data
pub const SOURCE_METADATA_PREFIX: &str = "$source.";

/// Fetched payloads keyed by source id
pub type SourcePayloads = HashMap<String, Value>;

/// Declarative configuration for one mapping request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    /// Sources to read and how to merge them
    #[serde(default)]
    pub source_selection: SourceSelection,

    /// Per-field mapping rules
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,

    /// Single-value transforms and pipeline steps
    #[serde(default)]
    pub transformations: Vec<Transformation>,

    /// Optional metadata envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_wrapper: Option<OutputWrapperConfig>,

    /// Optional template the final result is spliced into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_template: Option<Value>,

    /// Whether the pipeline runs on raw items or on the mapped payload
    #[serde(default)]
    pub pipeline_stage: PipelineStage,

    /// Target paths the consumer expects, used by validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_fields: Option<TargetFields>,
}

impl MappingConfig {
    /// Parse a configuration from an arbitrary JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::Configuration {
            message: format!("Invalid mapping configuration: {}", e),
            field: None,
        })
    }

    /// Look up a transformation by id
    pub fn transformation(&self, id: &str) -> Option<&Transformation> {
        self.transformations.iter().find(|t| t.id == id)
    }

    /// Transformations that run as pipeline steps, in configuration order.
    ///
    /// Any transformation referenced by a field mapping's `transformId` is a
    /// single-value transform and is excluded.
    pub fn pipeline_steps(&self) -> Vec<&Transformation> {
        self.transformations
            .iter()
            .filter(|t| {
                !self
                    .field_mappings
                    .iter()
                    .any(|m| m.transform_id() == Some(t.id.as_str()))
            })
            .collect()
    }
}

/// Source selection and merge policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSelection {
    /// Configured sources, in priority order
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,

    /// Merge mode; unset behaves as single for one source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_mode: Option<MergeMode>,

    /// Default location of the item list inside each payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_path: Option<String>,

    /// Ordering policy for combined feeds
    #[serde(default)]
    pub merge_strategy: MergeStrategy,

    /// Mapped field holding the item date for chronological ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_field: Option<String>,
}

/// Cardinality and shape policy for multi-source output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Single,
    Combined,
    Separate,
}

/// Ordering policy for a combined feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Configured source order
    #[default]
    Sequential,
    /// Newest first by parsed date
    Chronological,
    /// Round-robin across sources
    Interleaved,
    /// Configured source order
    Priority,
}

/// Where the transformation pipeline runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// On each source's raw item list before mapping
    #[serde(alias = "before_mapping")]
    Before,
    /// On the mapped payload
    #[default]
    #[serde(alias = "after_mapping")]
    After,
}

/// Identity of one source and where its items live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub source_type: String,

    #[serde(default)]
    pub category: String,

    /// Location of the item list inside this source's payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_path: Option<String>,

    /// Free-form metadata addressable as `$source.metadata.*`
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_primary_path(mut self, path: impl Into<String>) -> Self {
        self.primary_path = Some(path.into());
        self
    }

    /// Name shown to consumers, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Rule producing one target field from one source field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub target_path: String,

    #[serde(default)]
    pub source_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Conditional>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_value: Option<Value>,
}

impl FieldMapping {
    pub fn new(target_path: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            target_path: target_path.into(),
            source_path: source_path.into(),
            ..Default::default()
        }
    }

    pub fn for_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_transform(mut self, transform_id: impl Into<String>) -> Self {
        self.transform_id = Some(transform_id.into());
        self
    }

    pub fn with_fallback(mut self, value: Value) -> Self {
        self.fallback_value = Some(value);
        self
    }

    pub fn with_conditional(mut self, conditional: Conditional) -> Self {
        self.conditional = Some(conditional);
        self
    }

    /// Source id, treating a blank string as unset
    pub fn source_id(&self) -> Option<&str> {
        non_blank(self.source_id.as_deref())
    }

    /// Transform id, treating a blank string as unset
    pub fn transform_id(&self) -> Option<&str> {
        non_blank(self.transform_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Conditional replacement of a mapped value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conditional {
    /// Path (or `$source.` metadata path) whose value is tested
    pub when: String,

    pub operator: Operator,

    #[serde(default)]
    pub value: Value,

    #[serde(default)]
    pub then: Value,

    #[serde(rename = "else", default)]
    pub otherwise: Value,
}

/// A named transformation: single-value transform or pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformation {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub config: Value,

    #[serde(default, alias = "sourceField", skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,
}

impl Transformation {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, config: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            config,
            source_field: None,
        }
    }
}

/// Metadata envelope settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputWrapperConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper_key: Option<String>,

    #[serde(default)]
    pub include_timestamp: bool,

    #[serde(default)]
    pub include_source: bool,

    #[serde(default)]
    pub include_count: bool,

    #[serde(default)]
    pub include_source_counts: bool,

    #[serde(default)]
    pub include_version: bool,
}

impl OutputWrapperConfig {
    /// Key the payload is stored under; `"data"` when unset
    pub fn key(&self) -> Result<&str> {
        match self.wrapper_key.as_deref() {
            None => Ok("data"),
            Some(key) if key.trim().is_empty() => Err(Error::configuration_field(
                "Output wrapper is enabled but the wrapper key is empty",
                "outputWrapper.wrapperKey",
            )),
            Some(key) => Ok(key),
        }
    }
}

/// Target paths the consumer expects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetFields {
    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub optional: Vec<String>,
}

/// Runtime metadata for one source, addressable through `$source.` paths
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetadata {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub category: String,
    /// Capture time of this run
    pub timestamp: String,
    /// Effective primary path
    pub path: Option<String>,
    pub metadata: Value,
}

impl SourceMetadata {
    pub fn from_descriptor(
        descriptor: &SourceDescriptor,
        path: Option<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.display_name().to_string(),
            source_type: descriptor.source_type.clone(),
            category: descriptor.category.clone(),
            timestamp: timestamp.into(),
            path,
            metadata: descriptor.metadata.clone(),
        }
    }

    /// Resolve a metadata field (the part after `$source.`)
    pub fn lookup(&self, field: &str) -> Value {
        match field {
            "id" => Value::String(self.id.clone()),
            "name" => Value::String(self.name.clone()),
            "type" => Value::String(self.source_type.clone()),
            "category" => Value::String(self.category.clone()),
            "timestamp" => Value::String(self.timestamp.clone()),
            "path" => self.path.clone().map(Value::String).unwrap_or(Value::Null),
            "metadata" => self.metadata.clone(),
            other => match other.strip_prefix("metadata.") {
                Some(rest) => path::get(&self.metadata, rest),
                None => Value::Null,
            },
        }
    }

    /// Identity summary used by the output wrapper
    pub fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "type": self.source_type,
            "category": self.category,
        })
    }
}
