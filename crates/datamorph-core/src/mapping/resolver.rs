//! Per-record field resolution
//!
//! Field mappings are grouped by target path. For each record at most one
//! mapping per group is selected: the one bound to the record's source, or
//! else the source-less catch-all. The selected mapping's value is read from
//! the record (or from source metadata), passed through its single-value
//! transform, replaced wholesale by its conditional, and finally swapped for
//! the fallback when it is exactly `null`.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use crate::path;
use crate::transform::ValueTransform;
use crate::types::{FieldMapping, MappingConfig, SourceMetadata, SOURCE_METADATA_PREFIX};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Mappings sharing one target path, in configuration order
#[derive(Debug, Clone)]
struct TargetGroup<'a> {
    target_path: &'a str,
    mappings: Vec<&'a FieldMapping>,
}

/// Resolves field mappings against individual source records
#[derive(Debug)]
pub struct MappingResolver<'a> {
    groups: Vec<TargetGroup<'a>>,
    transforms: HashMap<&'a str, ValueTransform>,
    include_sourceless: bool,
}

impl<'a> MappingResolver<'a> {
    /// Build a resolver for a configuration.
    ///
    /// Single-value transforms referenced by the mappings are parsed once
    /// here; one that fails to parse is logged and later treated as absent.
    pub fn new(config: &'a MappingConfig) -> Self {
        let mut groups: Vec<TargetGroup<'a>> = Vec::new();
        for mapping in &config.field_mappings {
            match groups.iter_mut().find(|g| g.target_path == mapping.target_path) {
                Some(group) => group.mappings.push(mapping),
                None => groups.push(TargetGroup {
                    target_path: &mapping.target_path,
                    mappings: vec![mapping],
                }),
            }
        }

        let mut transforms = HashMap::new();
        for id in config.field_mappings.iter().filter_map(FieldMapping::transform_id) {
            if transforms.contains_key(id) {
                continue;
            }
            match config.transformation(id).map(ValueTransform::parse) {
                Some(Ok(transform)) => {
                    transforms.insert(id, transform);
                }
                Some(Err(e)) => warn!(transform = id, error = %e, "Ignoring invalid single-value transform"),
                None => warn!(transform = id, "Field mapping references an unknown transform"),
            }
        }

        Self {
            groups,
            transforms,
            include_sourceless: true,
        }
    }

    /// Ignore mappings without a `sourceId` (separate merge mode)
    pub fn excluding_sourceless(mut self) -> Self {
        self.include_sourceless = false;
        self
    }

    /// Target paths in first-appearance order
    pub fn target_paths(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.groups.iter().map(|g| g.target_path)
    }

    /// Pick the mapping for `target_path` that applies to records of `source_id`
    pub fn select(&self, target_path: &str, source_id: &str) -> Option<&'a FieldMapping> {
        let group = self.groups.iter().find(|g| g.target_path == target_path)?;
        self.select_in(group, source_id)
    }

    fn select_in(&self, group: &TargetGroup<'a>, source_id: &str) -> Option<&'a FieldMapping> {
        group
            .mappings
            .iter()
            .find(|m| m.source_id() == Some(source_id))
            .or_else(|| {
                if self.include_sourceless {
                    group.mappings.iter().find(|m| m.source_id().is_none())
                } else {
                    None
                }
            })
            .copied()
    }

    /// Resolve one mapping's value for one record
    pub fn resolve_field(&self, record: &Value, mapping: &FieldMapping, source: &SourceMetadata) -> Value {
        let mut value = read(record, &mapping.source_path, source);

        if let Some(id) = mapping.transform_id() {
            if let Some(transform) = self.transforms.get(id) {
                value = transform.apply(value);
            }
        }

        if let Some(conditional) = &mapping.conditional {
            let subject = read(record, &conditional.when, source);
            value = if conditional.operator.evaluate(&subject, &conditional.value) {
                conditional.then.clone()
            } else {
                conditional.otherwise.clone()
            };
        }

        if value.is_null() {
            if let Some(fallback) = &mapping.fallback_value {
                value = fallback.clone();
            }
        }

        value
    }

    /// Build the mapped object for one record
    pub fn map_record(&self, record: &Value, source: &SourceMetadata) -> Value {
        let mut result = Value::Object(Map::new());
        for group in &self.groups {
            if let Some(mapping) = self.select_in(group, &source.id) {
                let value = self.resolve_field(record, mapping, source);
                path::set(&mut result, group.target_path, value);
            }
        }
        result
    }
}

/// Read a path from the record, or from source metadata when it carries the marker
fn read(record: &Value, source_path: &str, source: &SourceMetadata) -> Value {
    match source_path.strip_prefix(SOURCE_METADATA_PREFIX) {
        Some(field) => source.lookup(field),
        None => path::get(record, source_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use crate::types::{Conditional, SourceDescriptor, Transformation};
    use serde_json::json;

    fn meta(id: &str) -> SourceMetadata {
        let mut descriptor = SourceDescriptor::new(id, format!("Source {}", id));
        descriptor.category = "news".to_string();
        SourceMetadata::from_descriptor(&descriptor, None, "2024-01-01T00:00:00Z")
    }

    fn config(mappings: Vec<FieldMapping>, transformations: Vec<Transformation>) -> MappingConfig {
        MappingConfig {
            field_mappings: mappings,
            transformations,
            ..Default::default()
        }
    }

    #[test]
    fn test_basic_mapping_with_nested_target() {
        let cfg = config(vec![FieldMapping::new("meta.title", "headline")], vec![]);
        let resolver = MappingResolver::new(&cfg);
        let record = json!({"headline": "Hello"});
        assert_eq!(resolver.map_record(&record, &meta("a")), json!({"meta": {"title": "Hello"}}));
    }

    #[test]
    fn test_fallback_only_for_null() {
        let cfg = config(
            vec![
                FieldMapping::new("zero", "count").with_fallback(json!(99)),
                FieldMapping::new("flag", "flag").with_fallback(json!(true)),
                FieldMapping::new("text", "text").with_fallback(json!("x")),
                FieldMapping::new("missing", "nope").with_fallback(json!("fb")),
            ],
            vec![],
        );
        let resolver = MappingResolver::new(&cfg);
        let record = json!({"count": 0, "flag": false, "text": ""});
        assert_eq!(
            resolver.map_record(&record, &meta("a")),
            json!({"zero": 0, "flag": false, "text": "", "missing": "fb"})
        );
    }

    #[test]
    fn test_fallback_is_not_transformed() {
        let cfg = config(
            vec![FieldMapping::new("t", "nope").with_transform("up").with_fallback(json!("low"))],
            vec![Transformation::new("up", "uppercase", json!({}))],
        );
        let resolver = MappingResolver::new(&cfg);
        assert_eq!(resolver.map_record(&json!({}), &meta("a")), json!({"t": "low"}));
    }

    #[test]
    fn test_transform_applied() {
        let cfg = config(
            vec![FieldMapping::new("t", "name").with_transform("up")],
            vec![Transformation::new("up", "uppercase", json!({}))],
        );
        let resolver = MappingResolver::new(&cfg);
        assert_eq!(resolver.map_record(&json!({"name": "ada"}), &meta("a")), json!({"t": "ADA"}));
    }

    #[test]
    fn test_unknown_transform_leaves_value() {
        let cfg = config(vec![FieldMapping::new("t", "name").with_transform("ghost")], vec![]);
        let resolver = MappingResolver::new(&cfg);
        assert_eq!(resolver.map_record(&json!({"name": "ada"}), &meta("a")), json!({"t": "ada"}));
    }

    #[test]
    fn test_conditional_replaces_value() {
        let conditional = Conditional {
            when: "status".to_string(),
            operator: Operator::Equals,
            value: json!("published"),
            then: json!("live"),
            otherwise: json!("draft"),
        };
        let cfg = config(
            vec![FieldMapping::new("state", "title")
                .with_transform("up")
                .with_conditional(conditional)],
            vec![Transformation::new("up", "uppercase", json!({}))],
        );
        let resolver = MappingResolver::new(&cfg);

        let live = json!({"title": "Anything", "status": "published"});
        assert_eq!(resolver.map_record(&live, &meta("a")), json!({"state": "live"}));
        let draft = json!({"title": "Anything", "status": "pending"});
        assert_eq!(resolver.map_record(&draft, &meta("a")), json!({"state": "draft"}));
    }

    #[test]
    fn test_conditional_on_source_metadata() {
        let conditional = Conditional {
            when: "$source.category".to_string(),
            operator: Operator::Equals,
            value: json!("news"),
            then: json!("N"),
            otherwise: json!("O"),
        };
        let cfg = config(vec![FieldMapping::new("c", "x").with_conditional(conditional)], vec![]);
        let resolver = MappingResolver::new(&cfg);
        assert_eq!(resolver.map_record(&json!({}), &meta("a")), json!({"c": "N"}));
    }

    #[test]
    fn test_metadata_source_path() {
        let cfg = config(
            vec![
                FieldMapping::new("origin", "$source.name"),
                FieldMapping::new("origin_id", "$source.id"),
            ],
            vec![],
        );
        let resolver = MappingResolver::new(&cfg);
        assert_eq!(
            resolver.map_record(&json!({"name": "record name"}), &meta("a")),
            json!({"origin": "Source a", "origin_id": "a"})
        );
    }

    #[test]
    fn test_selection_prefers_source_specific() {
        let cfg = config(
            vec![
                FieldMapping::new("title", "generic"),
                FieldMapping::new("title", "headline").for_source("a"),
                FieldMapping::new("title", "name").for_source("b"),
                FieldMapping::new("only_b", "extra").for_source("b"),
            ],
            vec![],
        );
        let resolver = MappingResolver::new(&cfg);
        let record = json!({"generic": "G", "headline": "H", "name": "N", "extra": "E"});

        assert_eq!(resolver.map_record(&record, &meta("a")), json!({"title": "H"}));
        assert_eq!(resolver.map_record(&record, &meta("b")), json!({"title": "N", "only_b": "E"}));
        assert_eq!(resolver.map_record(&record, &meta("c")), json!({"title": "G"}));
        assert_eq!(resolver.select("title", "c").unwrap().source_path, "generic");
        assert!(resolver.select("only_b", "a").is_none());
    }

    #[test]
    fn test_excluding_sourceless() {
        let cfg = config(
            vec![
                FieldMapping::new("title", "generic"),
                FieldMapping::new("id", "id").for_source("a"),
            ],
            vec![],
        );
        let resolver = MappingResolver::new(&cfg).excluding_sourceless();
        assert_eq!(
            resolver.map_record(&json!({"generic": "G", "id": 1}), &meta("a")),
            json!({"id": 1})
        );
        assert_eq!(resolver.target_paths().collect::<Vec<_>>(), vec!["title", "id"]);
    }
}
