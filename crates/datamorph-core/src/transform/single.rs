//! Single-value transforms applied by field mappings
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use super::{normalize_kind, CaseOp, ConfigView, RoundOp};
use crate::error::{Error, Result};
use crate::types::Transformation;
use crate::value::{now_iso, number_value, parse_date, to_number, to_text};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static HTML_TAG_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

/// A transform over one resolved value
#[derive(Debug, Clone)]
pub enum ValueTransform {
    /// Copy the value unchanged
    Direct,
    Case(CaseOp),
    Substring {
        start: usize,
        end: Option<usize>,
    },
    Replace {
        find: String,
        replacement: String,
        pattern: Option<Regex>,
    },
    Round(RoundOp),
    Abs,
    Join {
        separator: String,
    },
    Split {
        separator: String,
    },
    ParseNumber,
    ToString,
    ToBoolean,
    /// Current capture time; ignores the input
    Timestamp,
    FormatDate {
        format: String,
    },
    StripHtml,
    Truncate {
        length: usize,
        suffix: String,
    },
    Template {
        template: String,
    },
    Default {
        value: Value,
    },
    Prefix(String),
    Suffix(String),
}

impl ValueTransform {
    /// Parse a transformation definition into a single-value transform
    pub fn parse(transformation: &Transformation) -> Result<Self> {
        let config = ConfigView::new(&transformation.config, &transformation.id);
        let kind = normalize_kind(&transformation.kind);

        let transform = match kind.as_str() {
            "direct" | "copy" | "none" => Self::Direct,
            "uppercase" => Self::Case(CaseOp::Upper),
            "lowercase" => Self::Case(CaseOp::Lower),
            "capitalize" => Self::Case(CaseOp::Capitalize),
            "trim" => Self::Case(CaseOp::Trim),
            "substring" => Self::Substring {
                start: config.usize(&["start"])?.unwrap_or(0),
                end: config.usize(&["end"])?,
            },
            "replace" => {
                let find = config.string(&["find", "search"]).unwrap_or_default();
                let pattern = if config.bool(&["regex"]) {
                    Some(Regex::new(&find).map_err(|e| {
                        Error::configuration_field(
                            format!("invalid regex '{}': {}", find, e),
                            format!("transformations.{}.config.find", transformation.id),
                        )
                    })?)
                } else {
                    None
                };
                Self::Replace {
                    replacement: config.string(&["replace", "replacement"]).unwrap_or_default(),
                    find,
                    pattern,
                }
            }
            "round" => Self::Round(RoundOp::Round(
                config.usize(&["precision", "decimals"])?.unwrap_or(0) as u32,
            )),
            "floor" => Self::Round(RoundOp::Floor),
            "ceil" => Self::Round(RoundOp::Ceil),
            "abs" => Self::Abs,
            "join" => Self::Join {
                separator: config.string(&["separator"]).unwrap_or_else(|| ", ".to_string()),
            },
            "split" => Self::Split {
                separator: config.string(&["separator"]).unwrap_or_else(|| ",".to_string()),
            },
            "parse_number" | "to_number" | "number" => Self::ParseNumber,
            "to_string" | "string" => Self::ToString,
            "to_boolean" | "boolean" => Self::ToBoolean,
            "timestamp" => Self::Timestamp,
            "format_date" | "date" => Self::FormatDate {
                format: config.string(&["format"]).unwrap_or_else(|| "%Y-%m-%d".to_string()),
            },
            "strip_html" => Self::StripHtml,
            "truncate" => Self::Truncate {
                length: config.usize(&["length", "maxLength"])?.unwrap_or(100),
                suffix: config.string(&["suffix"]).unwrap_or_else(|| "...".to_string()),
            },
            "template" => Self::Template {
                template: config.string(&["template"]).unwrap_or_else(|| "{value}".to_string()),
            },
            "default" => Self::Default {
                value: config.value(&["value"]).cloned().unwrap_or(Value::Null),
            },
            "prefix" => Self::Prefix(config.string(&["value", "prefix"]).unwrap_or_default()),
            "suffix" => Self::Suffix(config.string(&["value", "suffix"]).unwrap_or_default()),
            _ => {
                return Err(Error::configuration_field(
                    format!("unknown single-value transform type '{}'", transformation.kind),
                    format!("transformations.{}.type", transformation.id),
                ))
            }
        };

        Ok(transform)
    }

    /// Apply the transform to one value
    pub fn apply(&self, value: Value) -> Value {
        match self {
            Self::Direct => value,
            Self::Case(op) => map_string(value, |s| op.apply(s)),
            Self::Substring { start, end } => map_string(value, |s| {
                let take = end.map(|e| e.saturating_sub(*start)).unwrap_or(usize::MAX);
                s.chars().skip(*start).take(take).collect()
            }),
            Self::Replace {
                find,
                replacement,
                pattern,
            } => map_string(value, |s| match pattern {
                Some(re) => re.replace_all(s, replacement.as_str()).into_owned(),
                None if find.is_empty() => s.to_string(),
                None => s.replace(find.as_str(), replacement),
            }),
            Self::Round(op) => map_number(value, |n| op.apply(n)),
            Self::Abs => map_number(value, f64::abs),
            Self::Join { separator } => match value {
                Value::Array(items) => Value::String(
                    items.iter().map(to_text).collect::<Vec<_>>().join(separator),
                ),
                other => other,
            },
            Self::Split { separator } => match value {
                Value::String(s) => Value::Array(
                    s.split(separator.as_str())
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                ),
                other => other,
            },
            Self::ParseNumber => match value {
                Value::Number(_) => value,
                other => to_number(&other).map(number_value).unwrap_or(Value::Null),
            },
            Self::ToString => match value {
                Value::Null => Value::Null,
                other => Value::String(to_text(&other)),
            },
            Self::ToBoolean => to_boolean(value),
            Self::Timestamp => Value::String(now_iso()),
            Self::FormatDate { format } => match parse_date(&value) {
                Some(date) => Value::String(date.format(format).to_string()),
                None => Value::Null,
            },
            Self::StripHtml => map_string(value, strip_html),
            Self::Truncate { length, suffix } => map_string(value, |s| {
                if s.chars().count() > *length {
                    let mut truncated: String = s.chars().take(*length).collect();
                    truncated.push_str(suffix);
                    truncated
                } else {
                    s.to_string()
                }
            }),
            Self::Template { template } => match value {
                Value::Null => Value::Null,
                other => Value::String(template.replace("{value}", &to_text(&other))),
            },
            Self::Default { value: default } => match value {
                Value::Null => default.clone(),
                other => other,
            },
            Self::Prefix(prefix) => match value {
                Value::Null => Value::Null,
                other => Value::String(format!("{}{}", prefix, to_text(&other))),
            },
            Self::Suffix(suffix) => match value {
                Value::Null => Value::Null,
                other => Value::String(format!("{}{}", to_text(&other), suffix)),
            },
        }
    }
}

fn map_string(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn map_number(value: Value, f: impl FnOnce(f64) -> f64) -> Value {
    match to_number(&value) {
        Some(n) if !value.is_boolean() => number_value(f(n)),
        _ => value,
    }
}

fn to_boolean(value: Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) => value,
        Value::Number(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            Value::Bool(!matches!(lowered.as_str(), "" | "false" | "0" | "no" | "off"))
        }
        Value::Array(items) => Value::Bool(!items.is_empty()),
        Value::Object(map) => Value::Bool(!map.is_empty()),
    }
}

/// Remove markup tags and decode the common entities
pub fn strip_html(input: &str) -> String {
    let text = match HTML_TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").ok()) {
        Some(tags) => tags.replace_all(input, ""),
        None => input.into(),
    };
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transform(kind: &str, config: Value) -> ValueTransform {
        ValueTransform::parse(&Transformation::new("t", kind, config)).unwrap()
    }

    #[test]
    fn test_case_transforms() {
        assert_eq!(transform("uppercase", json!({})).apply(json!("abc")), json!("ABC"));
        assert_eq!(transform("lowercase", json!({})).apply(json!("AbC")), json!("abc"));
        assert_eq!(transform("capitalize", json!({})).apply(json!("hello world")), json!("Hello world"));
        assert_eq!(transform("trim", json!({})).apply(json!("  x ")), json!("x"));
        assert_eq!(transform("uppercase", json!({})).apply(json!(5)), json!(5));
    }

    #[test]
    fn test_substring_and_truncate() {
        let sub = transform("substring", json!({"start": 1, "end": 4}));
        assert_eq!(sub.apply(json!("abcdef")), json!("bcd"));
        let tail = transform("substring", json!({"start": 2}));
        assert_eq!(tail.apply(json!("abcdef")), json!("cdef"));

        let trunc = transform("truncate", json!({"length": 3}));
        assert_eq!(trunc.apply(json!("abcdef")), json!("abc..."));
        assert_eq!(trunc.apply(json!("ab")), json!("ab"));
    }

    #[test]
    fn test_replace_plain_and_regex() {
        let plain = transform("replace", json!({"find": "a", "replace": "o"}));
        assert_eq!(plain.apply(json!("banana")), json!("bonono"));

        let regex = transform("replace", json!({"find": "\\d+", "replace": "#", "regex": true}));
        assert_eq!(regex.apply(json!("a1b22")), json!("a#b#"));

        let bad = ValueTransform::parse(&Transformation::new(
            "bad",
            "replace",
            json!({"find": "(", "regex": true}),
        ));
        assert!(bad.is_err());
    }

    #[test]
    fn test_numeric_transforms() {
        assert_eq!(transform("round", json!({"precision": 2})).apply(json!(3.14159)), json!(3.14));
        assert_eq!(transform("round", json!({})).apply(json!("2.5")), json!(3));
        assert_eq!(transform("round", json!({"precision": 15})).apply(json!(1e300)), json!(1e300));
        assert_eq!(transform("floor", json!({})).apply(json!(2.9)), json!(2));
        assert_eq!(transform("ceil", json!({})).apply(json!(2.1)), json!(3));
        assert_eq!(transform("abs", json!({})).apply(json!(-4)), json!(4));
        assert_eq!(transform("abs", json!({})).apply(json!("text")), json!("text"));
    }

    #[test]
    fn test_join_and_split() {
        assert_eq!(transform("join", json!({})).apply(json!(["a", "b", 3])), json!("a, b, 3"));
        assert_eq!(
            transform("split", json!({"separator": ";"})).apply(json!("x; y;;z")),
            json!(["x", "y", "z"])
        );
    }

    #[test]
    fn test_conversions() {
        let parse = transform("parse-number", json!({}));
        assert_eq!(parse.apply(json!("42")), json!(42));
        assert_eq!(parse.apply(json!("4.5")), json!(4.5));
        assert_eq!(parse.apply(json!("n/a")), Value::Null);

        let to_string = transform("to_string", json!({}));
        assert_eq!(to_string.apply(json!(7)), json!("7"));
        assert_eq!(to_string.apply(Value::Null), Value::Null);

        let to_bool = transform("to_boolean", json!({}));
        assert_eq!(to_bool.apply(json!("yes")), json!(true));
        assert_eq!(to_bool.apply(json!("off")), json!(false));
        assert_eq!(to_bool.apply(json!(0)), json!(false));
    }

    #[test]
    fn test_dates() {
        let format = transform("format_date", json!({"format": "%d/%m/%Y"}));
        assert_eq!(format.apply(json!("2024-03-01T10:00:00Z")), json!("01/03/2024"));
        assert_eq!(format.apply(json!("garbage")), Value::Null);

        let stamp = transform("timestamp", json!({})).apply(json!("ignored"));
        assert!(parse_date(&stamp).is_some());
    }

    #[test]
    fn test_text_decoration() {
        assert_eq!(transform("strip_html", json!({})).apply(json!("<p>Fish &amp; chips</p>")), json!("Fish & chips"));
        assert_eq!(transform("template", json!({"template": "#{value}!"})).apply(json!(3)), json!("#3!"));
        assert_eq!(transform("prefix", json!({"value": "$"})).apply(json!(10)), json!("$10"));
        assert_eq!(transform("suffix", json!({"value": "%"})).apply(json!(10)), json!("10%"));
        assert_eq!(transform("default", json!({"value": "none"})).apply(Value::Null), json!("none"));
        assert_eq!(transform("default", json!({"value": "none"})).apply(json!(0)), json!(0));
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let err = ValueTransform::parse(&Transformation::new("x", "teleport", json!({}))).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
