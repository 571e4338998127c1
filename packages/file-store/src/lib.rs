//! Whole-document dotstore adapters
//!
//! Media that keep the entire dataset in one place:
//! - `FileMedium` with `Format::Json` or `Format::Yaml`: a single file on disk
//! - `LocalStorage`: one item of a browser-style `StorageArea`
//!
//! Wrap a medium in `DocumentAdapter` to get a full `StorageAdapter`.
//!
//! # Example
//!
//! ```rust,no_run
//! use dotstore_core::{DocumentAdapter, DocumentOptions, DotPath, StorageAdapter};
//! use dotstore_file_store::FileMedium;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let medium = FileMedium::json("dotstore", "dotstore", true).await?;
//! let db = DocumentAdapter::new(medium, DocumentOptions::default());
//! db.set(&DotPath::parse("user.name")?, json!("Ada"), None).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod file;
mod format;
mod local_storage;

use dotstore_core::DocumentAdapter;

pub use error::FileStoreError;
pub use file::FileMedium;
pub use format::Format;
pub use local_storage::{DirectoryStorageArea, LocalStorage, MemoryStorageArea, StorageArea};

/// A JSON- or YAML-file backed adapter.
pub type FileAdapter = DocumentAdapter<FileMedium>;

/// A local-storage backed adapter.
pub type LocalStorageAdapter<A> = DocumentAdapter<LocalStorage<A>>;
