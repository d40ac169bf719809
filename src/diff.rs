//! Recursive structural comparison of JSON trees.
//!
//! Produces a 0-100 fidelity score and an itemized issue list for a
//! translated tree measured against its original. A type mismatch stops
//! recursion into that subtree; an array length mismatch is one issue and
//! skips element-wise comparison for that node, so nested problems are
//! never double-reported.

use serde_json::Value;
use serde::{Deserialize, Serialize};

/// Outcome of a structural comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    /// 0-100; exactly 100.0 when no issues were found.
    pub score: f64,
    pub issues: Vec<String>,
}

/// Compare a translated tree against the original it was derived from.
///
/// The score is `max(0, 100 - issues/total * 100)` rounded to two decimals,
/// where `total` counts every node of the original (containers and leaves,
/// each counting itself). Zero issues short-circuits to exactly 100.
pub fn compare(original: &Value, translated: &Value) -> StructureReport {
    let mut issues = Vec::new();
    walk(original, translated, "", &mut issues);

    if issues.is_empty() {
        return StructureReport {
            score: 100.0,
            issues,
        };
    }

    let total = count_elements(original);
    let raw = 100.0 - (issues.len() as f64 / total as f64) * 100.0;
    let score = (raw.max(0.0) * 100.0).round() / 100.0;

    StructureReport { score, issues }
}

/// Recursive node count of a tree, counting self as 1 at every level.
pub fn count_elements(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(count_elements).sum::<usize>(),
        Value::Array(items) => 1 + items.iter().map(count_elements).sum::<usize>(),
        _ => 1,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn walk(original: &Value, translated: &Value, path: &str, issues: &mut Vec<String>) {
    if std::mem::discriminant(original) != std::mem::discriminant(translated) {
        issues.push(format!(
            "Type mismatch at {path}: {} vs {}",
            kind(original),
            kind(translated)
        ));
        return;
    }

    match (original, translated) {
        (Value::Object(orig), Value::Object(trans)) => {
            for (key, orig_child) in orig {
                match trans.get(key) {
                    Some(trans_child) => {
                        walk(orig_child, trans_child, &child_path(path, key), issues)
                    }
                    None => issues.push(format!("Missing key at {path}.{key}")),
                }
            }
            for key in trans.keys() {
                if !orig.contains_key(key) {
                    issues.push(format!("Extra key at {path}.{key}"));
                }
            }
        }
        (Value::Array(orig), Value::Array(trans)) => {
            if orig.len() != trans.len() {
                issues.push(format!(
                    "Array length mismatch at {path}: {} vs {}",
                    orig.len(),
                    trans.len()
                ));
            } else {
                for (index, (orig_item, trans_item)) in orig.iter().zip(trans).enumerate() {
                    walk(orig_item, trans_item, &format!("{path}[{index}]"), issues);
                }
            }
        }
        _ => {}
    }
}
