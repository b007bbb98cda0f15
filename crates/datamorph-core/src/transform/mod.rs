//! Value and dataset transformations
//!
//! Two tables live here. [`single`] holds the transforms a field mapping
//! applies to one resolved value through its `transformId`. [`pipeline`]
//! holds the dataset-level steps (filter, sort, limit, ...) chained over a
//! whole payload, including the batched external call in [`ai`].
//!
//! Both tables parse a [`Transformation`](crate::Transformation) from its
//! `type` string into a closed enum before anything runs, so every kind is
//! handled by an exhaustive match.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

pub mod ai;
pub mod pipeline;
pub mod single;


pub use ai::{
    AiThrottler, AiTransformConfig, ExternalTransform, ExternalTransformRequest,
    ExternalTransformResponse,
};
pub use pipeline::{StepKind, TransformationPipeline};
pub use single::ValueTransform;

use crate::error::{Error, Result};
use crate::value::to_number;
use serde_json::Value;

/// Normalise a transformation type name: lowercase, `-` and spaces become `_`.
pub(crate) fn normalize_kind(kind: &str) -> String {
    kind.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

/// Read-only view over a transformation's `config` object
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConfigView<'a> {
    config: &'a Value,
    step: &'a str,
}

impl<'a> ConfigView<'a> {
    pub(crate) fn new(config: &'a Value, step: &'a str) -> Self {
        Self { config, step }
    }

    /// First present, non-null value among `keys`
    pub(crate) fn value(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|k| self.config.get(*k))
            .find(|v| !v.is_null())
    }

    pub(crate) fn string(&self, keys: &[&str]) -> Option<String> {
        self.value(keys).map(|v| match v {
            Value::String(s) => s.clone(),
            other => crate::value::to_text(other),
        })
    }

    /// Non-blank string
    pub(crate) fn field(&self, keys: &[&str]) -> Option<String> {
        self.string(keys).filter(|s| !s.trim().is_empty())
    }

    pub(crate) fn required_field(&self, keys: &[&str]) -> Result<String> {
        self.field(keys).ok_or_else(|| {
            Error::transformation(self.step, format!("missing required config '{}'", keys[0]))
        })
    }

    pub(crate) fn usize(&self, keys: &[&str]) -> Result<Option<usize>> {
        match self.value(keys) {
            None => Ok(None),
            Some(v) => match to_number(v) {
                Some(n) if n >= 0.0 => Ok(Some(n as usize)),
                _ => Err(Error::transformation(
                    self.step,
                    format!("config '{}' must be a non-negative number", keys[0]),
                )),
            },
        }
    }

    pub(crate) fn bool(&self, keys: &[&str]) -> bool {
        match self.value(keys) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "1" | "yes"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        }
    }
}

/// String case operations shared by both tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOp {
    Upper,
    Lower,
    Capitalize,
    Trim,
}

impl CaseOp {
    pub fn apply(self, s: &str) -> String {
        match self {
            Self::Upper => s.to_uppercase(),
            Self::Lower => s.to_lowercase(),
            Self::Capitalize => {
                let mut chars = s.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            Self::Trim => s.trim().to_string(),
        }
    }
}

/// Numeric rounding operations shared by both tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOp {
    /// Round half away from zero at the given number of decimals
    Round(u32),
    Floor,
    Ceil,
}

impl RoundOp {
    pub fn apply(self, n: f64) -> f64 {
        match self {
            Self::Round(0) => n.round(),
            Self::Round(precision) => {
                let factor = 10f64.powi(precision.min(15) as i32);
                let scaled = n * factor;
                if !scaled.is_finite() {
                    return n;
                }
                scaled.round() / factor
            }
            Self::Floor => n.floor(),
            Self::Ceil => n.ceil(),
        }
    }
}
