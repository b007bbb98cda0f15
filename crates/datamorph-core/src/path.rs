//! Dotted path access into JSON trees
//!
//! Reads accept `a.b[1].c` style paths: dot-separated keys, each optionally
//! followed by bracketed array indices. Writes accept dotted keys only; a
//! bracket on write is part of the key text. Missing keys, non-object
//! intermediates and out-of-range indices all read as `null`.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use serde_json::{Map, Value};

/// One step of a read path
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    /// Bracket text that is not a valid index; never resolves
    Invalid,
}

/// Parse a read path into segments.
fn parse_read_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }

        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };

        if !key.is_empty() {
            segments.push(Segment::Key(key.to_string()));
        }

        while let Some(stripped) = rest.strip_prefix('[') {
            match stripped.find(']') {
                Some(end) => {
                    let index = stripped[..end].trim();
                    segments.push(
                        index
                            .parse::<usize>()
                            .map(Segment::Index)
                            .unwrap_or(Segment::Invalid),
                    );
                    rest = &stripped[end + 1..];
                }
                None => {
                    segments.push(Segment::Invalid);
                    rest = "";
                }
            }
        }

        if !rest.is_empty() {
            segments.push(Segment::Invalid);
        }
    }

    segments
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (segment, current) {
        (Segment::Key(key), Value::Object(map)) => map.get(key),
        (Segment::Key(key), Value::Array(items)) => {
            key.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        (Segment::Index(i), Value::Array(items)) => items.get(*i),
        _ => None,
    }
}

/// Borrow the value at `path`, or `None` when it does not resolve.
///
/// An empty path addresses the tree itself.
pub fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = tree;
    for segment in parse_read_path(path) {
        current = step(current, &segment)?;
    }
    Some(current)
}

/// Read the value at `path`, resolving anything unreachable to `null`.
pub fn get(tree: &Value, path: &str) -> Value {
    lookup(tree, path).cloned().unwrap_or(Value::Null)
}

fn write_keys(path: &str) -> Vec<&str> {
    path.split('.').filter(|k| !k.is_empty()).collect()
}

/// Write `value` at the dotted `path`.
///
/// Missing intermediates are created, non-object intermediates are replaced
/// by fresh objects and the final key is always overwritten. An empty path
/// leaves the tree untouched.
pub fn set(tree: &mut Value, path: &str, value: Value) {
    let keys = write_keys(path);
    let Some((last, parents)) = keys.split_last() else {
        return;
    };

    let mut current = tree;
    for key in parents {
        let map = ensure_object(current);
        current = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    ensure_object(current).insert(last.to_string(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Remove the value at the dotted `path`, returning it when present.
pub fn remove(tree: &mut Value, path: &str) -> Option<Value> {
    let keys = write_keys(path);
    let (last, parents) = keys.split_last()?;

    let mut current = tree;
    for key in parents {
        current = current.as_object_mut()?.get_mut(*key)?;
    }

    current.as_object_mut()?.remove(*last)
}
