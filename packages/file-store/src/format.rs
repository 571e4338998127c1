//! On-disk encodings for a whole document.

use dotstore_core::{Document, Value};

use crate::error::{FileStoreError, Result};

/// How a document file is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// JSON; pretty-printed with two-space indentation when `readable`.
    Json { readable: bool },
    Yaml,
}

impl Format {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json { .. } => "json",
            Format::Yaml => "yaml",
        }
    }

    /// Name of the adapter built on files of this format.
    pub fn adapter_name(self) -> &'static str {
        match self {
            Format::Json { .. } => "jsondb",
            Format::Yaml => "yamldb",
        }
    }

    pub fn encode(self, document: &Document) -> Result<String> {
        let encoded = match self {
            Format::Json { readable: true } => serde_json::to_string_pretty(document),
            Format::Json { readable: false } => serde_json::to_string(document),
            Format::Yaml => {
                return serde_yaml::to_string(document).map_err(|e| FileStoreError::Encode {
                    format: "yaml",
                    message: e.to_string(),
                })
            }
        };
        encoded.map_err(|e| FileStoreError::Encode {
            format: "json",
            message: e.to_string(),
        })
    }

    /// Decode file contents. The error is a human readable reason.
    pub fn decode(self, text: &str) -> std::result::Result<Value, String> {
        match self {
            Format::Json { .. } => serde_json::from_str(text).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}
