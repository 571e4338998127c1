//! A document kept in a single file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dotstore_core::{Document, DocumentMedium, Loaded, Result};

use crate::error::FileStoreError;
use crate::format::Format;

/// One JSON or YAML file holding the whole document.
///
/// The file lives at `{folder}/{file_name}.{json|yaml}`. Writes go to a
/// sibling temporary file which is then renamed over the original.
#[derive(Debug, Clone)]
pub struct FileMedium {
    path: PathBuf,
    format: Format,
}

impl FileMedium {
    /// Open (creating the folder and an empty `{}` document if needed).
    pub async fn open(
        folder: impl AsRef<Path>,
        file_name: &str,
        format: Format,
    ) -> std::result::Result<Self, FileStoreError> {
        let folder = folder.as_ref();
        let path = folder.join(format!("{}.{}", file_name, format.extension()));
        let medium = FileMedium { path, format };

        tokio::fs::create_dir_all(folder)
            .await
            .map_err(|e| FileStoreError::io("create folder", folder, e))?;

        let exists = tokio::fs::try_exists(&medium.path)
            .await
            .map_err(|e| FileStoreError::io("inspect", &medium.path, e))?;
        if !exists {
            tracing::debug!(path = %medium.path.display(), "initializing empty document file");
            medium.write_file(&Document::new()).await?;
        }

        Ok(medium)
    }

    pub async fn json(
        folder: impl AsRef<Path>,
        file_name: &str,
        readable: bool,
    ) -> std::result::Result<Self, FileStoreError> {
        Self::open(folder, file_name, Format::Json { readable }).await
    }

    pub async fn yaml(
        folder: impl AsRef<Path>,
        file_name: &str,
    ) -> std::result::Result<Self, FileStoreError> {
        Self::open(folder, file_name, Format::Yaml).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_file(&self, document: &Document) -> std::result::Result<(), FileStoreError> {
        let text = self.format.encode(document)?;
        let temp = self.temp_path();

        tokio::fs::write(&temp, text.as_bytes())
            .await
            .map_err(|e| FileStoreError::io("write", &temp, e))?;

        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(FileStoreError::io("replace", &self.path, e));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentMedium for FileMedium {
    fn name(&self) -> &'static str {
        self.format.adapter_name()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Loaded> {
        tracing::debug!(path = %self.path.display(), "reading document");
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(e) => {
                return Err(FileStoreError::io("read", &self.path, e).into_store_error(self.name()))
            }
        };

        if text.trim().is_empty() {
            return Ok(Loaded::Missing);
        }

        Ok(match self.format.decode(&text) {
            Ok(value) => Loaded::Document(value),
            Err(reason) => Loaded::Corrupt(reason),
        })
    }

    async fn store(&self, document: &Document) -> Result<()> {
        tracing::debug!(path = %self.path.display(), "writing document");
        self.write_file(document)
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
    async fn open_creates_folder_and_empty_file() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("nested").join("db");
        let medium = FileMedium::json(&folder, "data", false).await.unwrap();

        assert_eq!(medium.path(), folder.join("data.json"));
        assert_eq!(std::fs::read_to_string(medium.path()).unwrap(), "{}");
    }

    #[tokio::test]
    async fn open_keeps_existing_contents() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("data.yaml"), "a: 1\n").unwrap();
        let medium = FileMedium::yaml(dir.path(), "data").await.unwrap();

        assert_eq!(medium.load().await.unwrap(), Loaded::Document(json!({"a": 1})));
    }

    #[tokio::test]
    async fn store_replaces_file_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let medium = FileMedium::json(dir.path(), "data", true).await.unwrap();

        let mut document = Document::new();
        document.insert("k".to_string(), json!("v"));
        medium.store(&document).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(medium.path()).unwrap(),
            "{\n  \"k\": \"v\"\n}"
        );
        assert!(!medium.temp_path().exists());
    }

    #[tokio::test]
    async fn garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let medium = FileMedium::json(dir.path(), "data", false).await.unwrap();
        std::fs::write(medium.path(), "{not json").unwrap();

        assert!(matches!(medium.load().await.unwrap(), Loaded::Corrupt(_)));
    }

    #[tokio::test]
    async fn empty_or_deleted_file_is_missing() {
        let dir = tempdir().unwrap();
        let medium = FileMedium::json(dir.path(), "data", false).await.unwrap();

        std::fs::write(medium.path(), "  \n").unwrap();
        assert_eq!(medium.load().await.unwrap(), Loaded::Missing);

        std::fs::remove_file(medium.path()).unwrap();
        assert_eq!(medium.load().await.unwrap(), Loaded::Missing);
    }
}
