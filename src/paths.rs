//! Dotted-path addressing into JSON trees.
//!
//! Every translatable string leaf is addressed by a dotted path whose tokens
//! are object keys and array indices ("buttons.save", "items.2.label").
//! `flatten` produces the path → string mapping for a tree, `set_at_path`
//! writes a leaf back, and `get_at_path` reads one with a sentinel on
//! failure. The round-trip law holds: applying `set_at_path` for every entry
//! of `flatten(tree)` onto a copy of `tree` reproduces it exactly.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Prefix of the sentinel string returned when a path cannot be resolved.
pub const RETRIEVAL_ERROR_PREFIX: &str = "Error: Could not retrieve value at path";

/// Compatibility switches for `set_at_path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCompat {
    /// Historical behavior: a numeric path token applied to a non-array node
    /// is treated as a plain string key on an object instead of forcing the
    /// node into an array. Downstream output formats depend on this, so it
    /// defaults to on. Known correctness risk for trees that mix numeric
    /// object keys with real array indices.
    pub legacy_numeric_key_coercion: bool,
}

impl Default for PathCompat {
    fn default() -> Self {
        Self {
            legacy_numeric_key_coercion: true,
        }
    }
}

fn parse_index(token: &str) -> Option<usize> {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

fn join_path(prefix: &str, token: &str) -> String {
    if prefix.is_empty() {
        token.to_string()
    } else {
        format!("{prefix}.{token}")
    }
}

/// Flatten a JSON tree into a mapping of dotted paths to string leaves.
///
/// Only string leaves contribute entries; other scalars are skipped and
/// containers recurse. Keys are unique by construction.
pub fn flatten(tree: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(tree, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect(child, &join_path(prefix, key), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect(child, &join_path(prefix, &index.to_string()), out);
            }
        }
        _ => {}
    }
}

fn collect(child: &Value, path: &str, out: &mut BTreeMap<String, String>) {
    match child {
        Value::String(s) => {
            out.insert(path.to_string(), s.clone());
        }
        Value::Object(_) | Value::Array(_) => flatten_into(child, path, out),
        _ => {}
    }
}

/// Read the value at a dotted path, degrading to a sentinel string when the
/// path cannot be traversed. Non-string leaves are rendered as JSON text.
pub fn get_at_path(tree: &Value, path: &str) -> String {
    let mut current = tree;
    for token in path.split('.') {
        let next = match (parse_index(token), current) {
            (Some(index), Value::Array(items)) => items.get(index),
            (_, Value::Object(map)) => map.get(token),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return format!("{RETRIEVAL_ERROR_PREFIX} {path}"),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Set a leaf value at a dotted path, creating intermediate containers as
/// needed. Arrays grow with `{}` filler for intermediate tokens and `null`
/// filler for a numeric leaf token; a type mismatch replaces the node with a
/// fresh container instead of failing. Mutates `tree` in place.
pub fn set_at_path(tree: &mut Value, path: &str, new_value: Value, compat: PathCompat) {
    let tokens: Vec<&str> = path.split('.').collect();
    let mut current = tree;
    for token in &tokens[..tokens.len() - 1] {
        current = descend(current, token, compat);
    }
    set_leaf(current, tokens[tokens.len() - 1], new_value, compat);
}

fn descend<'a>(current: &'a mut Value, token: &str, compat: PathCompat) -> &'a mut Value {
    match parse_index(token) {
        Some(index) => {
            if !current.is_array() {
                if compat.legacy_numeric_key_coercion {
                    // Numeric token against a non-array: fresh object node
                    // keyed by the token text.
                    return descend_key(current, token);
                }
                *current = Value::Array(Vec::new());
            }
            match current {
                Value::Array(items) => {
                    while items.len() <= index {
                        items.push(Value::Object(Map::new()));
                    }
                    &mut items[index]
                }
                _ => unreachable!("node was just coerced to an array"),
            }
        }
        None => descend_key(current, token),
    }
}

fn descend_key<'a>(current: &'a mut Value, key: &str) -> &'a mut Value {
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new())),
        _ => unreachable!("node was just coerced to an object"),
    }
}

fn set_leaf(current: &mut Value, token: &str, new_value: Value, compat: PathCompat) {
    match parse_index(token) {
        Some(index) => {
            if !current.is_array() {
                if compat.legacy_numeric_key_coercion {
                    set_key(current, token, new_value);
                    return;
                }
                *current = Value::Array(Vec::new());
            }
            if let Value::Array(items) = current {
                while items.len() <= index {
                    items.push(Value::Null);
                }
                items[index] = new_value;
            }
        }
        None => set_key(current, token, new_value),
    }
}

fn set_key(current: &mut Value, key: &str, new_value: Value) {
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(key.to_string(), new_value);
    }
}
