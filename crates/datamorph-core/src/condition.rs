//! Comparison operators shared by field conditionals and pipeline filters
//!
//! There is exactly one evaluator in the crate. An operator name that is not
//! recognised deserialises to [`Operator::Unknown`] and always evaluates to
//! `false`, so a malformed filter drops items instead of keeping them.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use crate::value::{is_empty_value, loose_equals, to_number, to_text};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    Exists,
    NotExists,
    /// Unrecognised operator name, kept for reporting
    Unknown(String),
}

impl Operator {
    /// Canonical snake_case name
    pub fn name(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::IsEmpty => "is_empty",
            Self::IsNotEmpty => "is_not_empty",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
            Self::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Evaluate `actual <op> expected`
    pub fn evaluate(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Equals => loose_equals(actual, expected),
            Self::NotEquals => !loose_equals(actual, expected),
            Self::Contains => to_text(actual).contains(&to_text(expected)),
            Self::NotContains => !to_text(actual).contains(&to_text(expected)),
            Self::GreaterThan => compare_numeric(actual, expected, |a, b| a > b),
            Self::LessThan => compare_numeric(actual, expected, |a, b| a < b),
            Self::StartsWith => to_text(actual).starts_with(&to_text(expected)),
            Self::EndsWith => to_text(actual).ends_with(&to_text(expected)),
            Self::IsEmpty => is_empty_value(actual),
            Self::IsNotEmpty => !is_empty_value(actual),
            Self::Exists => !actual.is_null(),
            Self::NotExists => actual.is_null(),
            Self::Unknown(name) => {
                tracing::warn!(operator = %name, "Unknown condition operator, evaluating to false");
                false
            }
        }
    }
}

fn compare_numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (to_number(actual), to_number(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

impl From<&str> for Operator {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "equals" | "eq" | "==" | "=" => Self::Equals,
            "not_equals" | "neq" | "!=" => Self::NotEquals,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "greater_than" | "gt" | ">" => Self::GreaterThan,
            "less_than" | "lt" | "<" => Self::LessThan,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "is_empty" => Self::IsEmpty,
            "is_not_empty" => Self::IsNotEmpty,
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            _ => Self::Unknown(name.to_string()),
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.name().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Evaluate a condition given as an operator name.
pub fn evaluate(actual: &Value, operator: &str, expected: &Value) -> bool {
    Operator::from(operator).evaluate(actual, expected)
}
