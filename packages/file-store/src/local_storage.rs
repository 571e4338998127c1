//! Browser-style key/value storage holding one serialized document.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dotstore_core::{Document, DocumentMedium, Loaded, Result};

use crate::error::FileStoreError;

const PROBE_KEY: &str = "__dotstore_probe__";

/// String items with `getItem`/`setItem`/`removeItem` semantics.
#[async_trait]
pub trait StorageArea: Send + Sync {
    async fn get_item(&self, key: &str) -> std::result::Result<Option<String>, FileStoreError>;

    async fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), FileStoreError>;

    async fn remove_item(&self, key: &str) -> std::result::Result<(), FileStoreError>;
}

/// An in-process storage area. Clones share the same items.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageArea {
    items: Arc<Mutex<HashMap<String, String>>>,
    disabled: bool,
}

impl MemoryStorageArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// An area that rejects every call, like storage blocked by the host.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    fn items(
        &self,
        key: &str,
    ) -> std::result::Result<std::sync::MutexGuard<'_, HashMap<String, String>>, FileStoreError>
    {
        if self.disabled {
            return Err(FileStoreError::Rejected {
                key: key.to_string(),
                message: "storage is disabled".to_string(),
            });
        }
        self.items.lock().map_err(|_| FileStoreError::Rejected {
            key: key.to_string(),
            message: "lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl StorageArea for MemoryStorageArea {
    async fn get_item(&self, key: &str) -> std::result::Result<Option<String>, FileStoreError> {
        Ok(self.items(key)?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), FileStoreError> {
        self.items(key)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> std::result::Result<(), FileStoreError> {
        self.items(key)?.remove(key);
        Ok(())
    }
}

/// A storage area persisted as one file per item inside a directory.
#[derive(Debug, Clone)]
pub struct DirectoryStorageArea {
    root: PathBuf,
}

impl DirectoryStorageArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join(escape_key(key))
    }
}

/// Keep item names filesystem-safe: anything but `[A-Za-z0-9_-]` becomes `%XX`.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    escaped
}

#[async_trait]
impl StorageArea for DirectoryStorageArea {
    async fn get_item(&self, key: &str) -> std::result::Result<Option<String>, FileStoreError> {
        let path = self.item_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FileStoreError::io("read", path, e)),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> std::result::Result<(), FileStoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| FileStoreError::io("create folder", &self.root, e))?;

        let path = self.item_path(key);
        let mut temp = path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, value.as_bytes())
            .await
            .map_err(|e| FileStoreError::io("write", &temp, e))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| FileStoreError::io("replace", path, e))
    }

    async fn remove_item(&self, key: &str) -> std::result::Result<(), FileStoreError> {
        let path = self.item_path(key);
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(FileStoreError::io("remove", path, e))
            }
            _ => Ok(()),
        }
    }
}

/// The whole document serialized as compact JSON under one storage key.
///
/// Availability is probed once at construction. An unavailable area reads as
/// an empty document and rejects writes.
pub struct LocalStorage<A> {
    area: A,
    key: String,
    available: bool,
}

impl<A: StorageArea> LocalStorage<A> {
    pub async fn new(area: A, key: impl Into<String>) -> Self {
        let available = probe(&area).await;
        let key = key.into();
        if !available {
            tracing::error!(key = %key, "local storage is unavailable, writes will fail");
        }
        Self {
            area,
            key,
            available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn area(&self) -> &A {
        &self.area
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

async fn probe<A: StorageArea>(area: &A) -> bool {
    match area.set_item(PROBE_KEY, PROBE_KEY).await {
        Ok(()) => area.remove_item(PROBE_KEY).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "local storage probe failed");
            false
        }
    }
}

#[async_trait]
impl<A: StorageArea> DocumentMedium for LocalStorage<A> {
    fn name(&self) -> &'static str {
        "localstorage"
    }

    fn describe(&self) -> String {
        format!("localStorage[{}]", self.key)
    }

    async fn load(&self) -> Result<Loaded> {
        if !self.available {
            return Ok(Loaded::Missing);
        }
        let raw = self
            .area
            .get_item(&self.key)
            .await
            .map_err(|e| e.into_store_error(self.name()))?;

        Ok(match raw {
            None => Loaded::Missing,
            Some(text) => match serde_json::from_str(&text) {
                Ok(value) => Loaded::Document(value),
                Err(e) => Loaded::Corrupt(e.to_string()),
            },
        })
    }

    async fn store(&self, document: &Document) -> Result<()> {
        if !self.available {
            return Err(FileStoreError::Unavailable.into_store_error(self.name()));
        }
        let text = serde_json::to_string(document).map_err(|e| {
            FileStoreError::Encode {
                format: "json",
                message: e.to_string(),
            }
            .into_store_error(self.name())
        })?;
        self.area
            .set_item(&self.key, &text)
            .await
            .map_err(|e| e.into_store_error(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn probe_leaves_no_item() {
        let area = MemoryStorageArea::new();
        let storage = LocalStorage::new(area.clone(), "db").await;
        assert!(storage.is_available());
        assert_eq!(area.get_item(PROBE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_then_load() {
        let storage = LocalStorage::new(MemoryStorageArea::new(), "db").await;
        assert_eq!(storage.load().await.unwrap(), Loaded::Missing);

        let mut document = Document::new();
        document.insert("a".to_string(), json!([1, 2]));
        storage.store(&document).await.unwrap();

        assert_eq!(
            storage.area().get_item("db").await.unwrap().as_deref(),
            Some(r#"{"a":[1,2]}"#)
        );
        assert_eq!(storage.load().await.unwrap(), Loaded::Document(json!({"a": [1, 2]})));
    }

    #[tokio::test]
    async fn unavailable_reads_empty_and_rejects_writes() {
        let storage = LocalStorage::new(MemoryStorageArea::disabled(), "db").await;
        assert!(!storage.is_available());
        assert_eq!(storage.load().await.unwrap(), Loaded::Missing);
        assert!(storage.store(&Document::new()).await.unwrap_err().is_medium());
    }

    #[tokio::test]
    async fn corrupt_item() {
        let area = MemoryStorageArea::new();
        area.set_item("db", "not json").await.unwrap();
        let storage = LocalStorage::new(area, "db").await;
        assert!(matches!(storage.load().await.unwrap(), Loaded::Corrupt(_)));
    }

    #[tokio::test]
    async fn directory_area_round_trip() {
        let dir = tempdir().unwrap();
        let area = DirectoryStorageArea::new(dir.path().join("storage"));

        assert_eq!(area.get_item("a/b").await.unwrap(), None);
        area.set_item("a/b", "value").await.unwrap();
        assert_eq!(area.get_item("a/b").await.unwrap().as_deref(), Some("value"));
        assert!(dir.path().join("storage").join("a%2Fb").exists());

        area.remove_item("a/b").await.unwrap();
        area.remove_item("a/b").await.unwrap();
        assert_eq!(area.get_item("a/b").await.unwrap(), None);
    }

    #[test]
    fn escapes_keys() {
        assert_eq!(escape_key("plain_key-1"), "plain_key-1");
        assert_eq!(escape_key("a.b c"), "a%2Eb%20c");
    }
}
