use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from file and local-storage media.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// A filesystem call failed.
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The document could not be serialized.
    #[error("failed to encode document as {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },

    /// The storage area failed its availability probe.
    #[error("local storage is not available")]
    Unavailable,

    /// The storage area refused an item.
    #[error("storage area rejected item '{key}': {message}")]
    Rejected { key: String, message: String },
}

impl FileStoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        FileStoreError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Wrap as a medium error of the named adapter.
    pub fn into_store_error(self, adapter: &'static str) -> dotstore_core::Error {
        dotstore_core::Error::medium(adapter, self)
    }
}

pub type Result<T> = std::result::Result<T, FileStoreError>;
