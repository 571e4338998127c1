//! Blank-value pruning.

use serde_json::{Map, Value};

use crate::Document;

/// Whether a value counts as blank: `null`, `""`, `{}` or `[]`.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        _ => false,
    }
}

/// Remove blank values from `document`, depth-first.
///
/// Children are cleaned before their parent is inspected, so a mapping whose
/// entries were all blank is itself removed. Mappings inside sequences are
/// cleaned, but sequence elements are never removed.
pub fn prune(document: &mut Document) {
    prune_map(document);
}

fn prune_map(map: &mut Map<String, Value>) {
    for value in map.values_mut() {
        prune_value(value);
    }
    map.retain(|_, value| !is_blank(value));
}

fn prune_value(value: &mut Value) {
    match value {
        Value::Object(map) => prune_map(map),
        Value::Array(arr) => arr.iter_mut().for_each(prune_value),
        _ => {}
    }
}
