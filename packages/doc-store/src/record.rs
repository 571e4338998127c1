//! Records, filters and update expressions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One stored entry: a top-level key and its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Record {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({"key": self.key, "value": self.value})
    }

    /// Parse a record document. Missing `value` reads as `null`.
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }
}

/// Selects one record by key, optionally requiring a sequence at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub key: String,
    /// Only match if the value at this record path is a sequence.
    pub array_at: Option<String>,
}

impl RecordFilter {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            array_at: None,
        }
    }

    #[must_use]
    pub fn with_array_at(mut self, path: impl Into<String>) -> Self {
        self.array_at = Some(path.into());
        self
    }

    /// Whether `record` (as a JSON document) passes this filter.
    pub fn matches(&self, record: &Value) -> bool {
        if record.get("key").and_then(Value::as_str) != Some(self.key.as_str()) {
            return false;
        }
        match &self.array_at {
            None => true,
            Some(path) => {
                let segments: Vec<&str> = path.split('.').collect();
                matches!(dotstore_core::access::get(record, &segments), Some(Value::Array(_)))
            }
        }
    }

    /// Render as a filter document.
    pub fn to_value(&self) -> Value {
        let mut filter = Map::new();
        filter.insert("key".to_string(), Value::String(self.key.clone()));
        if let Some(path) = &self.array_at {
            filter.insert(path.clone(), json!({"$type": "array"}));
        }
        Value::Object(filter)
    }
}

/// A single-field update expression.
///
/// Paths are record paths, so they start with `value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Set { path: String, value: Value },
    Unset { path: String },
    Inc { path: String, amount: Value },
    Push { path: String, element: Value },
    Pull { path: String, element: Value },
}

impl Update {
    pub fn operator(&self) -> &'static str {
        match self {
            Update::Set { .. } => "$set",
            Update::Unset { .. } => "$unset",
            Update::Inc { .. } => "$inc",
            Update::Push { .. } => "$push",
            Update::Pull { .. } => "$pull",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Update::Set { path, .. }
            | Update::Unset { path }
            | Update::Inc { path, .. }
            | Update::Push { path, .. }
            | Update::Pull { path, .. } => path,
        }
    }

    /// Render as an update document, e.g. `{"$inc": {"value.n": 1}}`.
    pub fn to_value(&self) -> Value {
        let operand = match self {
            Update::Set { value, .. } => value.clone(),
            Update::Unset { .. } => Value::String(String::new()),
            Update::Inc { amount, .. } => amount.clone(),
            Update::Push { element, .. } | Update::Pull { element, .. } => element.clone(),
        };
        let mut field = Map::new();
        field.insert(self.path().to_string(), operand);
        let mut update = Map::new();
        update.insert(self.operator().to_string(), Value::Object(field));
        Value::Object(update)
    }
}

/// Result of `update_one`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateOutcome {
    /// A record matched the filter (or was inserted by an upsert).
    pub matched: bool,
    /// The record actually changed.
    pub modified: bool,
    /// The record after the update.
    pub document: Option<Record>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_documents() {
        assert_eq!(RecordFilter::key("a").to_value(), json!({"key": "a"}));
        assert_eq!(
            RecordFilter::key("a").with_array_at("value.list").to_value(),
            json!({"key": "a", "value.list": {"$type": "array"}})
        );
    }

    #[test]
    fn filter_matching() {
        let record = json!({"key": "a", "value": {"list": [1], "n": 1}});
        assert!(RecordFilter::key("a").matches(&record));
        assert!(!RecordFilter::key("b").matches(&record));
        assert!(RecordFilter::key("a").with_array_at("value.list").matches(&record));
        assert!(!RecordFilter::key("a").with_array_at("value.n").matches(&record));
    }

    #[test]
    fn update_documents() {
        let set = Update::Set {
            path: "value.a".to_string(),
            value: json!({"b": 1}),
        };
        assert_eq!(set.to_value(), json!({"$set": {"value.a": {"b": 1}}}));

        let unset = Update::Unset {
            path: "value".to_string(),
        };
        assert_eq!(unset.to_value(), json!({"$unset": {"value": ""}}));

        let pull = Update::Pull {
            path: "value".to_string(),
            element: json!("x"),
        };
        assert_eq!(pull.to_value(), json!({"$pull": {"value": "x"}}));
    }

    #[test]
    fn record_parsing() {
        assert_eq!(
            Record::from_value(json!({"key": "k"})),
            Some(Record::new("k", Value::Null))
        );
        assert_eq!(Record::from_value(json!({"value": 1})), None);
    }
}
