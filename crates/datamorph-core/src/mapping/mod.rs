//! Field mapping, multi-source merging and output finalisation
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

pub mod merge;
pub mod resolver;
pub mod validation;
pub mod wrapper;

pub use merge::{effective_mode, MergeOutcome, SourceCount, SourceMerger, DEFAULT_DATE_FIELDS};
pub use resolver::MappingResolver;
pub use validation::{validate_config, ValidationReport};
pub use wrapper::{apply_template, finalize, payload_count, OutputWrapper, OUTPUT_VERSION};
