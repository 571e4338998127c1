//! Database configuration.
//!
//! Loadable from JSON or YAML:
//!
//! ```yaml
//! adapter: yamldb
//! folder: data
//! fileName: app
//! readable: true
//! pruneEmpty: true
//! language: tr
//! cacheTtlMs: 500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dotstore_core::Language;

use crate::error::ConfigError;

/// Which backing store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Jsondb,
    Yamldb,
    Localstorage,
    Mongo,
}

impl AdapterKind {
    pub fn name(self) -> &'static str {
        match self {
            AdapterKind::Jsondb => "jsondb",
            AdapterKind::Yamldb => "yamldb",
            AdapterKind::Localstorage => "localstorage",
            AdapterKind::Mongo => "mongo",
        }
    }
}

fn default_collection() -> String {
    "dotstore".to_string()
}

/// Where the document-store adapter keeps its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStoreConfig {
    /// `memory://...` or an `http(s)://` data API base URL.
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub adapter: AdapterKind,
    /// Folder holding the document file.
    pub folder: PathBuf,
    /// File base name, also the local-storage item key.
    pub file_name: String,
    /// Pretty-print JSON files.
    pub readable: bool,
    /// Remove blank values on every write.
    pub prune_empty: bool,
    /// Language code for error messages. Unknown codes fall back to `en`.
    pub language: String,
    /// Custom message bundle (`{"errors": {...}}`) overriding `language`.
    pub messages_file: Option<PathBuf>,
    /// Cache the last read document for this many milliseconds.
    pub cache_ttl_ms: Option<u64>,
    /// Persist local storage in this directory instead of in memory.
    pub local_storage_dir: Option<PathBuf>,
    pub document_store: Option<DocumentStoreConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter: AdapterKind::default(),
            folder: PathBuf::from("dotstore"),
            file_name: "dotstore".to_string(),
            readable: false,
            prune_empty: false,
            language: Language::default().code().to_string(),
            messages_file: None,
            cache_ttl_ms: None,
            local_storage_dir: None,
            document_store: None,
        }
    }
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Err(ConfigError::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn language(&self) -> Language {
        Language::from_code(&self.language)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_ms.map(Duration::from_millis)
    }

    // Builders

    #[must_use]
    pub fn with_adapter(mut self, adapter: AdapterKind) -> Self {
        self.adapter = adapter;
        self
    }

    #[must_use]
    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    #[must_use]
    pub fn with_readable(mut self, readable: bool) -> Self {
        self.readable = readable;
        self
    }

    #[must_use]
    pub fn with_prune_empty(mut self, prune_empty: bool) -> Self {
        self.prune_empty = prune_empty;
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language.code().to_string();
        self
    }

    #[must_use]
    pub fn with_messages_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.messages_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = Some(ttl.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn with_local_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_storage_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_document_store(
        mut self,
        url: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        self.adapter = AdapterKind::Mongo;
        self.document_store = Some(DocumentStoreConfig {
            url: url.into(),
            collection: collection.into(),
            connect_timeout_ms: None,
        });
        self
    }
}
