//! Datamorph Core - declarative mapping engine for heterogeneous JSON sources
//!
//! This crate turns one or more already-fetched JSON payloads into a single
//! target document, driven entirely by a [`MappingConfig`].
//!
//! # Main Components
//!
//! - **Path access**: dotted/bracketed read paths and dotted write paths ([`path`])
//! - **Conditions**: a closed operator set with fail-closed evaluation ([`condition`])
//! - **Transformations**: single-value transforms, a chainable dataset
//!   pipeline and a batched external transform step ([`transform`])
//! - **Mapping**: per-record field resolution, multi-source merging, output
//!   wrapping and static validation ([`mapping`])
//! - **Engine**: the request-scoped entry point ([`MappingEngine`])
//!
//! # Example
//!
//! ```no_run
//! use datamorph_core::{MappingConfig, MappingEngine, SourcePayloads};
//! use serde_json::json;
//!
//! async fn example() -> datamorph_core::Result<()> {
//!     let config = MappingConfig::from_value(json!({
//!         "sourceSelection": {"sources": [{"id": "feed", "primaryPath": "items"}]},
//!         "fieldMappings": [{"targetPath": "title", "sourcePath": "headline"}]
//!     }))?;
//!     let payloads = SourcePayloads::from([
//!         ("feed".to_string(), json!({"items": [{"headline": "Hello"}]})),
//!     ]);
//!     let output = MappingEngine::new().try_execute(&config, &payloads).await?;
//!     assert_eq!(output, json!([{"title": "Hello"}]));
//!     Ok(())
//! }
//! ```

pub mod condition;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod path;
pub mod source;
pub mod transform;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use condition::Operator;
pub use engine::MappingEngine;
pub use error::{Error, Result};
pub use mapping::{validate_config, MappingResolver, MergeOutcome, SourceMerger, ValidationReport};
pub use source::{fetch_sources, SourceFetcher};
pub use transform::{
    AiThrottler, ExternalTransform, ExternalTransformRequest, ExternalTransformResponse,
    TransformationPipeline,
};
pub use types::{
    // Configuration
    MappingConfig, SourceSelection, MergeMode, MergeStrategy, PipelineStage,

    // Sources
    SourceDescriptor, SourceMetadata, SourcePayloads,

    // Field mappings
    FieldMapping, Conditional, Transformation,

    // Output
    OutputWrapperConfig, TargetFields,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
