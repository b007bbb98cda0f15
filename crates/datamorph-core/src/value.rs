//! Scalar helpers shared by conditions, transforms and merge strategies
//!
//! JSON payloads coming from heterogeneous sources rarely agree on types, so
//! comparisons go through a small set of lenient casts defined here.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Cast a value to text.
///
/// Strings are returned verbatim, integral numbers without a fraction, null as
/// an empty string, arrays as comma-joined casts and objects as compact JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn number_text(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Cast a value to a number, if it has a numeric reading.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Build a JSON number, emitting an integer when the value is integral.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Empty means null, blank string, empty array or empty object.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Loose equality: JSON equality, or equal text casts when both are scalars.
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    let scalar = |v: &Value| !matches!(v, Value::Array(_) | Value::Object(_) | Value::Null);
    if scalar(left) && scalar(right) {
        return to_text(left) == to_text(right);
    }
    false
}

/// Total ordering used by `sort`.
///
/// Kinds rank null < bool < number < string < array < object. Numbers
/// compare numerically, strings lexicographically, and arrays and objects by
/// their text casts.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.total_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            to_text(left).cmp(&to_text(right))
        }
        _ => kind_rank(left).cmp(&kind_rank(right)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Sort keys for a slice, cast to text when non-null keys mix kinds.
///
/// Nulls stay null so they still sort first.
pub fn sort_keys(keys: Vec<Value>) -> Vec<Value> {
    let mut kinds = keys.iter().filter(|k| !k.is_null()).map(kind_rank);
    let first = kinds.next();
    if kinds.all(|kind| Some(kind) == first) {
        return keys;
    }
    keys.into_iter()
        .map(|key| match key {
            Value::Null => Value::Null,
            other => Value::String(to_text(&other)),
        })
        .collect()
}

/// Identity key for whole-value deduplication.
pub fn identity_key(value: &Value) -> String {
    value.to_string()
}

/// Parse a date-like value into UTC.
///
/// Accepts RFC 3339, RFC 2822, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%d`, and epoch
/// numbers (milliseconds above 1e11, seconds otherwise).
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            epoch_to_datetime(raw)
        }
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn epoch_to_datetime(raw: f64) -> Option<DateTime<Utc>> {
    let millis = if raw.abs() > 1e11 { raw } else { raw * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }
    s.parse::<f64>().ok().and_then(epoch_to_datetime)
}

/// Current capture time as an ISO-8601 string.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}
