use std::io;
use std::path::PathBuf;

use dotstore_doc_store::DocStoreError;
use dotstore_file_store::FileStoreError;

/// Errors reading a configuration or message bundle.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cannot tell the format of {} from its extension", .path.display())]
    UnknownFormat { path: PathBuf },

    #[error("the mongo adapter needs a documentStore section")]
    MissingDocumentStore,
}

/// Errors opening a database.
#[derive(thiserror::Error, Debug)]
pub enum OpenError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("file store error: {0}")]
    FileStore(#[from] FileStoreError),

    #[error("document store error: {0}")]
    DocStore(#[from] DocStoreError),
}
