//! Bulk import from another data source.
//!
//! A source yields items shaped `{"ID": "<key>", "data": <value>}`; each is
//! written with `set(ID, data)`.

use async_trait::async_trait;
use serde_json::json;

use dotstore_core::{BoxError, Value};

/// Anything that can list its entries for import.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Value>, BoxError>;
}

#[async_trait]
impl DataSource for Vec<Value> {
    async fn fetch_all(&self) -> Result<Vec<Value>, BoxError> {
        Ok(self.clone())
    }
}

#[async_trait]
impl DataSource for crate::Database {
    async fn fetch_all(&self) -> Result<Vec<Value>, BoxError> {
        let all = self.all().await?;
        Ok(all
            .into_iter()
            .map(|(key, value)| json!({"ID": key, "data": value}))
            .collect())
    }
}

/// A single import item.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImportItem {
    pub id: String,
    pub data: Value,
}

impl ImportItem {
    /// `None` unless the item has a non-empty string `ID` and a `data` field.
    pub fn parse(item: &Value) -> Option<Self> {
        let id = item.get("ID")?.as_str().filter(|id| !id.is_empty())?;
        let data = item.get("data")?;
        Some(Self {
            id: id.to_string(),
            data: data.clone(),
        })
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Positions of malformed items.
    pub skipped: Vec<usize>,
    /// Keys whose write failed, with the error text.
    pub failed: Vec<(String, String)>,
}

impl ImportReport {
    /// True when every item was written.
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_items() {
        assert_eq!(
            ImportItem::parse(&json!({"ID": "a", "data": {"x": 1}})),
            Some(ImportItem {
                id: "a".to_string(),
                data: json!({"x": 1})
            })
        );
        assert_eq!(
            ImportItem::parse(&json!({"ID": "a", "data": null})).map(|i| i.data),
            Some(Value::Null)
        );
        assert_eq!(ImportItem::parse(&json!({"ID": "a"})), None);
        assert_eq!(ImportItem::parse(&json!({"ID": 5, "data": 1})), None);
        assert_eq!(ImportItem::parse(&json!({"ID": "", "data": 1})), None);
        assert_eq!(ImportItem::parse(&json!("a")), None);
    }

    #[test]
    fn report_success() {
        assert!(ImportReport::default().is_success());
        let report = ImportReport {
            imported: 1,
            skipped: vec![2],
            failed: vec![],
        };
        assert!(!report.is_success());
    }
}
