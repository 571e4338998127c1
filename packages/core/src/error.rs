//! Error types shared by every adapter.

use thiserror::Error;

use crate::messages::MessageKey;

/// Boxed source error from an adapter's medium.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by adapters and the facade.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument was rejected before any I/O happened.
    #[error("{message}")]
    InvalidArgument { kind: MessageKey, message: String },

    /// The adapter cannot perform this operation at all.
    #[error("{operation} is not supported by the {adapter} adapter")]
    Unsupported {
        adapter: &'static str,
        operation: &'static str,
    },

    /// The backing medium (file, storage area, database) failed.
    #[error("{adapter} medium error: {source}")]
    Medium {
        adapter: &'static str,
        #[source]
        source: BoxError,
    },

    /// The document store never became ready.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// A session could not be committed or aborted.
    #[error("transaction error: {message}")]
    Transaction { message: String },
}

impl Error {
    /// Build an invalid-argument error with an already-localized message.
    pub fn invalid_argument(kind: MessageKey, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            kind,
            message: message.into(),
        }
    }

    /// Build a capability error.
    pub fn unsupported(adapter: &'static str, operation: &'static str) -> Self {
        Error::Unsupported { adapter, operation }
    }

    /// Wrap a medium failure.
    pub fn medium(adapter: &'static str, source: impl Into<BoxError>) -> Self {
        Error::Medium {
            adapter,
            source: source.into(),
        }
    }

    /// Whether the failure came from the backing medium.
    ///
    /// The facade degrades read paths only for these.
    pub fn is_medium(&self) -> bool {
        matches!(self, Error::Medium { .. })
    }
}

/// Result type alias for dotstore operations.
pub type Result<T> = std::result::Result<T, Error>;
