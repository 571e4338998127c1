//! Document-collection dotstore adapter
//!
//! Stores one `{key, value}` record per top-level key in a collection and
//! answers every operation with targeted record commands.
//!
//! - `Collection`: the record collection contract
//! - `MemoryCollection`: in-process collection with snapshot sessions
//! - `HttpCollection`: JSON-over-HTTP data API
//! - `Connection`: background readiness check
//! - `DocumentStoreAdapter`: `StorageAdapter` over any collection
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use dotstore_core::{DotPath, StorageAdapter};
//! use dotstore_doc_store::{DocumentStoreAdapter, MemoryCollection};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DocumentStoreAdapter::new(Arc::new(MemoryCollection::new("records")));
//! db.set(&DotPath::parse("user.name")?, json!("Ada"), None).await?;
//! assert_eq!(db.get(&DotPath::parse("user")?, None).await?, Some(json!({"name": "Ada"})));
//! # Ok(())
//! # }
//! ```

mod adapter;
pub mod collection;
mod connection;
mod error;
mod http;
mod memory;
mod record;

pub use adapter::{DocumentStoreAdapter, DEFAULT_CONNECT_TIMEOUT};
pub use collection::Collection;
pub use connection::{Connection, ConnectionState};
pub use error::{Error, Error as DocStoreError, Result};
pub use http::HttpCollection;
pub use memory::MemoryCollection;
pub use record::{Record, RecordFilter, Update, UpdateOutcome};

/// Name reported by the adapter and used in its errors.
pub const ADAPTER_NAME: &str = "mongo";
