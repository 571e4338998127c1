//! Navigating and mutating documents by dot path.
//!
//! Mappings are addressed by key, sequences by an in-bounds unsigned index
//! segment (`list.0`). None of these functions perform I/O.

use serde_json::{Map, Value};

use crate::Document;

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn index_of(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Get a reference to the value at the given segments.
///
/// Returns `None` as soon as a segment is absent or an intermediate value
/// cannot be descended into. An empty segment list returns the value itself.
pub fn get<'a, S: AsRef<str>>(tree: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut cursor = tree;
    for segment in segments {
        let segment = segment.as_ref();
        cursor = match cursor {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => arr.get(index_of(segment)?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

/// [`get`] starting from a document root.
pub fn get_in<'a, S: AsRef<str>>(document: &'a Document, segments: &[S]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    get(document.get(first.as_ref())?, rest)
}

/// Set `value` at the dot path `path` inside `document`.
///
/// Intermediate segments that are missing, `null`, or hold a scalar are
/// overwritten with a fresh empty mapping: setting `a.b` while `a` holds `5`
/// replaces `5` with `{"b": ...}`. This coercion is destructive. The final
/// segment is assigned directly, replacing whatever was there.
///
/// A sequence segment must be an index no greater than the sequence length
/// (equal to the length appends). Returns `false` and logs when the path is
/// empty or cannot be addressed.
pub fn set(path: &str, value: Value, document: &mut Document) -> bool {
    if path.is_empty() {
        tracing::error!("invalid path provided for set operation");
        return false;
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return false,
    };

    let mut level: &mut Value = match parents.first() {
        None => {
            document.insert(last.to_string(), value);
            return true;
        }
        Some(first) => {
            let child = document
                .entry(first.to_string())
                .or_insert(Value::Null);
            coerce_container(child);
            child
        }
    };

    for segment in &parents[1..] {
        let current = level;
        level = match current {
            Value::Object(map) => {
                let child = map.entry(segment.to_string()).or_insert(Value::Null);
                coerce_container(child);
                child
            }
            Value::Array(arr) => match index_of(segment) {
                Some(i) if i < arr.len() => {
                    let child = &mut arr[i];
                    coerce_container(child);
                    child
                }
                Some(i) if i == arr.len() => {
                    arr.push(Value::Object(Map::new()));
                    &mut arr[i]
                }
                _ => {
                    tracing::error!(path, segment, "cannot address sequence element");
                    return false;
                }
            },
            _ => return false,
        };
    }

    match level {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            true
        }
        Value::Array(arr) => match index_of(last) {
            Some(i) if i < arr.len() => {
                arr[i] = value;
                true
            }
            Some(i) if i == arr.len() => {
                arr.push(value);
                true
            }
            _ => {
                tracing::error!(path, segment = *last, "cannot address sequence element");
                false
            }
        },
        _ => false,
    }
}

fn coerce_container(value: &mut Value) {
    if !is_container(value) {
        *value = Value::Object(Map::new());
    }
}

/// Remove the value at `path`.
///
/// Every intermediate segment must already resolve to a container, otherwise
/// nothing is touched and `false` is returned. Returns `true` only if a value
/// was actually removed. Removing a sequence element shifts the elements after
/// it.
pub fn remove(document: &mut Document, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return false,
    };

    let Some((first, rest)) = parents.split_first() else {
        return document.remove(*last).is_some();
    };

    let Some(mut parent) = document.get_mut(*first) else {
        return false;
    };
    for segment in rest {
        let current = parent;
        parent = match current {
            Value::Object(map) => match map.get_mut(*segment) {
                Some(next) => next,
                None => return false,
            },
            Value::Array(arr) => match index_of(segment).and_then(|i| arr.get_mut(i)) {
                Some(next) => next,
                None => return false,
            },
            _ => return false,
        };
    }

    match parent {
        Value::Object(map) => map.remove(*last).is_some(),
        Value::Array(arr) => match index_of(last) {
            Some(i) if i < arr.len() => {
                arr.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_doc() -> Document {
        match json!({
            "name": "Alice",
            "age": 30,
            "address": { "city": "NYC" },
            "scores": [90, 85, 95],
            "empty": null,
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not a mapping"),
        }
    }

    // ==================== get tests ====================

    #[test]
    fn get_direct_child() {
        let d = test_doc();
        assert_eq!(get_in(&d, &["name"]), Some(&json!("Alice")));
    }

    #[test]
    fn get_nested_child() {
        let d = test_doc();
        assert_eq!(get_in(&d, &["address", "city"]), Some(&json!("NYC")));
    }

    #[test]
    fn get_array_element() {
        let d = test_doc();
        assert_eq!(get_in(&d, &["scores", "1"]), Some(&json!(85)));
    }

    #[test]
    fn get_array_out_of_bounds_none() {
        let d = test_doc();
        assert_eq!(get_in(&d, &["scores", "9"]), None);
        assert_eq!(get_in(&d, &["scores", "x"]), None);
    }

    #[test]
    fn get_missing_and_primitive_none() {
        let d = test_doc();
        assert_eq!(get_in(&d, &["nonexistent"]), None);
        assert_eq!(get_in(&d, &["name", "first"]), None);
        assert_eq!(get_in(&d, &["address", "missing", "deep"]), None);
    }

    #[test]
    fn get_null_is_present() {
        let d = test_doc();
        assert_eq!(get_in(&d, &["empty"]), Some(&Value::Null));
        assert_eq!(get_in(&d, &["empty", "child"]), None);
    }

    #[test]
    fn get_with_no_segments_returns_tree() {
        let tree = json!({"a": 1});
        assert_eq!(get::<&str>(&tree, &[]), Some(&tree));
        assert_eq!(get_in::<&str>(&test_doc(), &[]), None);
    }

    // ==================== set tests ====================

    #[test]
    fn set_creates_intermediate_maps() {
        let mut d = Document::new();
        assert!(set("a.b.c", json!(5), &mut d));
        assert_eq!(get_in(&d, &["a", "b", "c"]), Some(&json!(5)));
        assert_eq!(get_in(&d, &["a", "b"]), Some(&json!({"c": 5})));
    }

    #[test]
    fn set_overwrites_scalar_intermediate() {
        let mut d = doc(json!({"a": 5}));
        assert!(set("a.b", json!(true), &mut d));
        assert_eq!(Value::Object(d), json!({"a": {"b": true}}));
    }

    #[test]
    fn set_overwrites_null_intermediate() {
        let mut d = test_doc();
        assert!(set("empty.child", json!(1), &mut d));
        assert_eq!(get_in(&d, &["empty"]), Some(&json!({"child": 1})));
    }

    #[test]
    fn set_replaces_without_merge() {
        let mut d = test_doc();
        assert!(set("address", json!({"zip": "10001"}), &mut d));
        assert_eq!(get_in(&d, &["address"]), Some(&json!({"zip": "10001"})));
    }

    #[test]
    fn set_into_array() {
        let mut d = test_doc();
        assert!(set("scores.1", json!(100), &mut d));
        assert!(set("scores.3", json!(70), &mut d));
        assert_eq!(get_in(&d, &["scores"]), Some(&json!([90, 100, 95, 70])));
    }

    #[test]
    fn set_array_out_of_bounds_fails() {
        let mut d = test_doc();
        assert!(!set("scores.7", json!(1), &mut d));
        assert!(!set("scores.x", json!(1), &mut d));
        assert_eq!(get_in(&d, &["scores"]), Some(&json!([90, 85, 95])));
    }

    #[test]
    fn set_through_array_element() {
        let mut d = doc(json!({"users": [{"name": "a"}]}));
        assert!(set("users.0.name", json!("b"), &mut d));
        assert_eq!(get_in(&d, &["users", "0", "name"]), Some(&json!("b")));
    }

    #[test]
    fn set_empty_path_fails() {
        let mut d = test_doc();
        assert!(!set("", json!(1), &mut d));
        assert_eq!(d, test_doc());
    }

    #[test]
    fn set_then_get_round_trips() {
        let paths = ["x", "a.b", "name.first", "scores.0", "address.city.zip", "n.0.m"];
        for path in paths {
            let mut d = test_doc();
            let v = json!({"marker": path});
            assert!(set(path, v.clone(), &mut d), "set {}", path);
            let segments: Vec<&str> = path.split('.').collect();
            assert_eq!(get_in(&d, &segments), Some(&v), "get {}", path);
        }
    }

    // ==================== remove tests ====================

    #[test]
    fn remove_top_level() {
        let mut d = test_doc();
        assert!(remove(&mut d, "name"));
        assert_eq!(get_in(&d, &["name"]), None);
    }

    #[test]
    fn remove_nested() {
        let mut d = test_doc();
        assert!(remove(&mut d, "address.city"));
        assert_eq!(get_in(&d, &["address"]), Some(&json!({})));
    }

    #[test]
    fn remove_array_element_shifts() {
        let mut d = test_doc();
        assert!(remove(&mut d, "scores.0"));
        assert_eq!(get_in(&d, &["scores"]), Some(&json!([85, 95])));
    }

    #[test]
    fn remove_absent_final_key_is_false() {
        let mut d = test_doc();
        assert!(!remove(&mut d, "address.zip"));
        assert_eq!(d, test_doc());
    }

    #[test]
    fn remove_unresolvable_parent_is_false() {
        for path in ["missing.key", "name.first", "address.missing.deep", "scores.9.x", ""] {
            let mut d = test_doc();
            assert!(!remove(&mut d, path), "remove {}", path);
            assert_eq!(d, test_doc(), "unchanged after {}", path);
        }
    }
}
