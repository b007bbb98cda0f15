//! Transformation pipeline implementation
//!
//! A pipeline is an ordered list of dataset-level steps. Each step receives
//! the previous step's output and returns a new value. Steps given input of
//! the wrong shape pass it through unchanged. A step that fails (bad config,
//! missing required field) is logged and skipped, leaving the pre-step value
//! in place, so one faulty step never aborts the run.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use super::ai::{AiThrottler, AiTransformConfig, ExternalTransform};
use super::{normalize_kind, CaseOp, ConfigView, RoundOp};
use crate::condition::Operator;
use crate::error::{Error, Result};
use crate::path;
use crate::types::Transformation;
use crate::value::{compare_values, identity_key, number_value, sort_keys, to_number};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

const DEFAULT_LIMIT: usize = 10;

/// A parsed pipeline step
#[derive(Debug, Clone)]
pub enum StepKind {
    Filter {
        field: Option<String>,
        operator: Operator,
        value: Value,
    },
    Sort {
        field: Option<String>,
        descending: bool,
    },
    Limit {
        count: usize,
    },
    Unique {
        field: Option<String>,
    },
    /// Build fresh objects from a `{newField: sourcePath}` table
    Map {
        fields: Vec<(String, String)>,
    },
    AddField {
        field: String,
        value: Value,
    },
    RemoveField {
        field: String,
    },
    RenameField {
        from: String,
        to: String,
    },
    Case {
        field: Option<String>,
        op: CaseOp,
    },
    Round {
        field: Option<String>,
        op: RoundOp,
    },
    Count,
    Sum {
        field: String,
    },
    Average {
        field: String,
    },
    AiTransform(AiTransformConfig),
}

impl StepKind {
    /// Parse a transformation definition into a pipeline step
    pub fn parse(transformation: &Transformation) -> Result<Self> {
        let step = transformation.id.as_str();
        let config = ConfigView::new(&transformation.config, step);
        let field = config
            .field(&["field"])
            .or_else(|| transformation.source_field.clone().filter(|f| !f.trim().is_empty()));

        let kind = match normalize_kind(&transformation.kind).as_str() {
            "filter" => Self::Filter {
                field,
                operator: config
                    .string(&["operator"])
                    .map(Operator::from)
                    .unwrap_or(Operator::Equals),
                value: config.value(&["value"]).cloned().unwrap_or(Value::Null),
            },
            "sort" => Self::Sort {
                field,
                descending: config
                    .string(&["order", "direction"])
                    .is_some_and(|o| o.eq_ignore_ascii_case("desc")),
            },
            "limit" => Self::Limit {
                count: config.usize(&["count", "limit"])?.unwrap_or(DEFAULT_LIMIT),
            },
            "unique" => Self::Unique { field },
            "map" => {
                let table = config
                    .value(&["fields", "mapping"])
                    .and_then(Value::as_object)
                    .ok_or_else(|| Error::transformation(step, "map requires a 'fields' table"))?;
                Self::Map {
                    fields: table
                        .iter()
                        .map(|(target, source)| (target.clone(), crate::value::to_text(source)))
                        .collect(),
                }
            }
            "add_field" => Self::AddField {
                field: field.ok_or_else(|| Error::transformation(step, "missing required config 'field'"))?,
                value: config.value(&["value"]).cloned().unwrap_or(Value::Null),
            },
            "remove_field" => Self::RemoveField {
                field: field.ok_or_else(|| Error::transformation(step, "missing required config 'field'"))?,
            },
            "rename_field" => Self::RenameField {
                from: config
                    .field(&["from", "oldField"])
                    .or(field)
                    .ok_or_else(|| Error::transformation(step, "missing required config 'from'"))?,
                to: config.required_field(&["to", "newField"])?,
            },
            "uppercase" => Self::Case { field, op: CaseOp::Upper },
            "lowercase" => Self::Case { field, op: CaseOp::Lower },
            "capitalize" => Self::Case { field, op: CaseOp::Capitalize },
            "trim" => Self::Case { field, op: CaseOp::Trim },
            "round" => Self::Round {
                field,
                op: RoundOp::Round(config.usize(&["precision", "decimals"])?.unwrap_or(0) as u32),
            },
            "floor" => Self::Round { field, op: RoundOp::Floor },
            "ceil" => Self::Round { field, op: RoundOp::Ceil },
            "count" => Self::Count,
            "sum" => Self::Sum {
                field: field.ok_or_else(|| Error::transformation(step, "sum requires a field"))?,
            },
            "average" | "avg" => Self::Average {
                field: field.ok_or_else(|| Error::transformation(step, "average requires a field"))?,
            },
            "ai_transform" | "ai" => Self::AiTransform(AiTransformConfig::from_step_config(
                &transformation.config,
                transformation.source_field.as_deref(),
                step,
            )?),
            _ => {
                return Err(Error::transformation(
                    step,
                    format!("unknown pipeline step type '{}'", transformation.kind),
                ))
            }
        };

        Ok(kind)
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Filter { .. } => "filter",
            Self::Sort { .. } => "sort",
            Self::Limit { .. } => "limit",
            Self::Unique { .. } => "unique",
            Self::Map { .. } => "map",
            Self::AddField { .. } => "add-field",
            Self::RemoveField { .. } => "remove-field",
            Self::RenameField { .. } => "rename-field",
            Self::Case { .. } => "case",
            Self::Round { .. } => "round",
            Self::Count => "count",
            Self::Sum { .. } => "sum",
            Self::Average { .. } => "average",
            Self::AiTransform(_) => "ai-transform",
        }
    }
}

/// An ordered pipeline of dataset-level transformation steps
#[derive(Clone, Default)]
pub struct TransformationPipeline {
    steps: Vec<Transformation>,
    external: Option<Arc<dyn ExternalTransform>>,
}

impl std::fmt::Debug for TransformationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationPipeline")
            .field("steps", &self.steps)
            .field("external", &self.external.is_some())
            .finish()
    }
}

impl TransformationPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pipeline from transformations, in order
    pub fn with_steps<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = Transformation>,
    {
        Self {
            steps: steps.into_iter().collect(),
            external: None,
        }
    }

    /// Append a step
    pub fn add_step(mut self, step: Transformation) -> Self {
        self.steps.push(step);
        self
    }

    /// Attach the collaborator used by `ai-transform` steps
    pub fn with_external_transform(mut self, client: Arc<dyn ExternalTransform>) -> Self {
        self.external = Some(client);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order
    pub async fn run(&self, input: Value) -> Value {
        let mut current = input;

        for step in &self.steps {
            let span = tracing::debug_span!("pipeline_step", step = %step.id, kind = %step.kind);
            let outcome = async {
                let kind = StepKind::parse(step)?;
                self.apply(&kind, &current).await
            }
            .instrument(span)
            .await;

            match outcome {
                Ok(next) => {
                    debug!(step = %step.id, "Pipeline step applied");
                    current = next;
                }
                Err(e) => {
                    warn!(step = %step.id, kind = %step.kind, error = %e, "Pipeline step failed, keeping previous value");
                }
            }
        }

        current
    }

    /// Apply one parsed step, returning a new value
    pub async fn apply(&self, kind: &StepKind, input: &Value) -> Result<Value> {
        let output = match kind {
            StepKind::Filter { field, operator, value } => on_array(input, |items| {
                items
                    .iter()
                    .filter(|item| operator.evaluate(&extract(item, field.as_deref()), value))
                    .cloned()
                    .collect()
            }),
            StepKind::Sort { field, descending } => on_array(input, |items| {
                let keys = sort_keys(items.iter().map(|item| extract(item, field.as_deref())).collect());
                let mut keyed: Vec<(Value, Value)> = keys.into_iter().zip(items.iter().cloned()).collect();
                keyed.sort_by(|(a, _), (b, _)| {
                    let ordering = compare_values(a, b);
                    if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
                keyed.into_iter().map(|(_, item)| item).collect()
            }),
            StepKind::Limit { count } => {
                on_array(input, |items| items.iter().take(*count).cloned().collect())
            }
            StepKind::Unique { field } => on_array(input, |items| {
                let mut seen = HashSet::new();
                items
                    .iter()
                    .filter(|item| seen.insert(identity_key(&extract(item, field.as_deref()))))
                    .cloned()
                    .collect()
            }),
            StepKind::Map { fields } => on_array(input, |items| {
                items
                    .iter()
                    .map(|item| {
                        let mut built = Value::Object(Map::new());
                        for (target, source) in fields {
                            path::set(&mut built, target, path::get(item, source));
                        }
                        built
                    })
                    .collect()
            }),
            StepKind::AddField { field, value } => on_objects(input, |obj| {
                path::set(obj, field, value.clone());
            }),
            StepKind::RemoveField { field } => on_objects(input, |obj| {
                path::remove(obj, field);
            }),
            StepKind::RenameField { from, to } => on_objects(input, |obj| {
                if let Some(value) = path::remove(obj, from) {
                    path::set(obj, to, value);
                }
            }),
            StepKind::Case { field, op } => map_values(input, field.as_deref(), |v| match v {
                Value::String(s) => Some(Value::String(op.apply(s))),
                _ => None,
            }),
            StepKind::Round { field, op } => map_values(input, field.as_deref(), |v| {
                if v.is_boolean() {
                    return None;
                }
                to_number(v).map(|n| number_value(op.apply(n)))
            }),
            StepKind::Count => match input {
                Value::Array(items) => json!({ "count": items.len() }),
                other => other.clone(),
            },
            StepKind::Sum { field } => match input {
                Value::Array(items) => json!({ "sum": number_value(sum_field(items, field)) }),
                other => other.clone(),
            },
            StepKind::Average { field } => match input {
                Value::Array(items) if items.is_empty() => json!({ "average": 0 }),
                Value::Array(items) => {
                    let average = sum_field(items, field) / items.len() as f64;
                    json!({ "average": number_value(average) })
                }
                other => other.clone(),
            },
            StepKind::AiTransform(config) => match &self.external {
                Some(client) => {
                    AiThrottler::new(config.clone(), Arc::clone(client))
                        .apply(input.clone())
                        .await
                }
                None => {
                    warn!("ai-transform step has no external transform configured, passing through");
                    input.clone()
                }
            },
        };

        Ok(output)
    }
}

/// Value compared by filter/sort/unique: a field of the item, or the item itself
fn extract(item: &Value, field: Option<&str>) -> Value {
    match field {
        Some(field) => path::get(item, field),
        None => item.clone(),
    }
}

fn on_array(input: &Value, f: impl FnOnce(&[Value]) -> Vec<Value>) -> Value {
    match input {
        Value::Array(items) => Value::Array(f(items)),
        other => other.clone(),
    }
}

/// Structural edit on every object item of an array, or on an object itself
fn on_objects(input: &Value, edit: impl Fn(&mut Value)) -> Value {
    let mut output = input.clone();
    if let Value::Array(items) = &mut output {
        items.iter_mut().filter(|i| i.is_object()).for_each(&edit);
    } else if output.is_object() {
        edit(&mut output);
    }
    output
}

/// Apply `f` to a scalar input, or to `field` on each item / on the object.
///
/// `f` returns `None` when the value is of a kind it does not touch.
fn map_values(input: &Value, field: Option<&str>, f: impl Fn(&Value) -> Option<Value>) -> Value {
    let apply_to = |item: &Value| -> Value {
        match (field, item) {
            (Some(field), Value::Object(_)) => {
                let mut updated = item.clone();
                if let Some(next) = path::lookup(item, field).and_then(&f) {
                    path::set(&mut updated, field, next);
                }
                updated
            }
            (None, Value::Object(_)) | (None, Value::Array(_)) => item.clone(),
            (_, scalar) => f(scalar).unwrap_or_else(|| scalar.clone()),
        }
    };

    match input {
        Value::Array(items) => Value::Array(items.iter().map(apply_to).collect()),
        other => apply_to(other),
    }
}

fn sum_field(items: &[Value], field: &str) -> f64 {
    items
        .iter()
        .map(|item| to_number(&path::get(item, field)).unwrap_or(0.0))
        .sum()
}
