//! Static validation of a mapping configuration
//!
//! The report is computed from the configuration alone and never blocks a
//! mapping run. Errors describe configurations the engine refuses to run;
//! warnings describe parts it will skip or ignore at run time.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use super::merge::effective_mode;
use crate::transform::{StepKind, ValueTransform};
use crate::types::{MappingConfig, MergeMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of [`validate_config`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub unmapped_required: Vec<String>,
    pub unmapped_optional: Vec<String>,
    pub unknown_source_ids: Vec<String>,
}

impl ValidationReport {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Check a configuration without running it
pub fn validate_config(config: &MappingConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_sources(config, &mut report);
    check_mappings(config, &mut report);
    check_transformations(config, &mut report);

    if let Some(wrapper) = config.output_wrapper.as_ref().filter(|w| w.enabled) {
        if let Err(e) = wrapper.key() {
            report.error(e.to_string());
        }
    }

    if let Some(targets) = &config.target_fields {
        let mapped: HashSet<&str> = config
            .field_mappings
            .iter()
            .map(|m| m.target_path.as_str())
            .collect();
        report.unmapped_required = targets
            .required
            .iter()
            .filter(|t| !mapped.contains(t.as_str()))
            .cloned()
            .collect();
        report.unmapped_optional = targets
            .optional
            .iter()
            .filter(|t| !mapped.contains(t.as_str()))
            .cloned()
            .collect();
    }

    report.valid = report.errors.is_empty() && report.unmapped_required.is_empty();
    report
}

fn check_sources(config: &MappingConfig, report: &mut ValidationReport) {
    let sources = &config.source_selection.sources;
    if sources.is_empty() {
        report.error("No sources selected");
    }

    let mut seen = HashSet::new();
    for source in sources {
        if source.id.trim().is_empty() {
            report.error("Source with an empty id");
        } else if !seen.insert(source.id.as_str()) {
            report.warning(format!("Source '{}' is configured more than once", source.id));
        }
    }
}

fn check_mappings(config: &MappingConfig, report: &mut ValidationReport) {
    if config.field_mappings.is_empty() {
        report.error("No field mappings configured");
    }

    let known_sources: HashSet<&str> = config
        .source_selection
        .sources
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    let separate = effective_mode(config) == MergeMode::Separate;
    let mut catch_all_targets = HashSet::new();

    for (index, mapping) in config.field_mappings.iter().enumerate() {
        if mapping.target_path.trim().is_empty() {
            report.error(format!("Field mapping #{} has an empty target path", index));
        }

        match mapping.source_id() {
            Some(id) if !known_sources.contains(id) => {
                report.warning(format!(
                    "Field mapping '{}' references unknown source '{}'",
                    mapping.target_path, id
                ));
                if !report.unknown_source_ids.iter().any(|known| known == id) {
                    report.unknown_source_ids.push(id.to_string());
                }
            }
            Some(_) => {}
            None if separate => report.warning(format!(
                "Field mapping '{}' has no sourceId and is ignored in separate mode",
                mapping.target_path
            )),
            None => {
                if !catch_all_targets.insert(mapping.target_path.as_str()) {
                    report.warning(format!(
                        "Several source-less mappings target '{}'; only the first is used",
                        mapping.target_path
                    ));
                }
            }
        }

        if let Some(id) = mapping.transform_id() {
            match config.transformation(id) {
                None => report.warning(format!(
                    "Field mapping '{}' references unknown transform '{}'",
                    mapping.target_path, id
                )),
                Some(transformation) => {
                    if let Err(e) = ValueTransform::parse(transformation) {
                        report.warning(e.to_string());
                    }
                }
            }
        }

        if let Some(conditional) = &mapping.conditional {
            if !conditional.operator.is_known() {
                report.warning(format!(
                    "Field mapping '{}' uses unknown operator '{}'; the condition is always false",
                    mapping.target_path, conditional.operator
                ));
            }
        }
    }
}

fn check_transformations(config: &MappingConfig, report: &mut ValidationReport) {
    for step in config.pipeline_steps() {
        match StepKind::parse(step) {
            Ok(StepKind::Filter { operator, .. }) if !operator.is_known() => report.warning(format!(
                "Filter step '{}' uses unknown operator '{}'; it drops every item",
                step.id, operator
            )),
            Ok(_) => {}
            Err(e) => report.warning(format!("{}; the step will be skipped", e)),
        }
    }
}
