use dotstore_core::Error as StoreError;

use crate::ADAPTER_NAME;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An update operator met a value of the wrong type.
    #[error("cannot apply {operator} to {path}: expected {expected}")]
    TypeMismatch {
        operator: &'static str,
        path: String,
        expected: &'static str,
    },

    #[error("no such session: {id}")]
    UnknownSession { id: String },

    #[error("sessions are not supported by collection {collection}")]
    SessionsUnsupported { collection: String },

    /// The server answered with an error status.
    #[error("server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("collection lock poisoned")]
    Poisoned,
}

impl Error {
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. })
    }
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        match error {
            Error::UnknownSession { .. } => StoreError::Transaction {
                message: error.to_string(),
            },
            Error::SessionsUnsupported { .. } => {
                StoreError::unsupported(ADAPTER_NAME, "startTransaction")
            }
            other => StoreError::medium(ADAPTER_NAME, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
