//! An embedded key-value store addressed by dot paths.
//!
//! `dotstore` keeps one document per database and lets callers read and
//! modify nested values with keys like `user.stats.wins`. The document can
//! live in:
//!
//! - a JSON file (`jsondb`)
//! - a YAML file (`yamldb`)
//! - a local-storage area (`localstorage`)
//! - a document collection, one record per top-level key (`mongo`)
//!
//! ```rust,no_run
//! use dotstore::{AdapterKind, Config, Database};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(Config::default().with_adapter(AdapterKind::Yamldb)).await?;
//! db.add("visits", 1.0).await?;
//! let _adults = db
//!     .find(&json!({"age": {"$gte": 18}}), &json!({"sort": {"age": -1}}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod database;
mod error;
mod events;
mod import;

pub use config::{AdapterKind, Config, DocumentStoreConfig};
pub use database::{Database, Scope};
pub use error::{ConfigError, OpenError};
pub use events::{Operation, StoreEvent};
pub use import::{DataSource, ImportReport};

pub use dotstore_core::{
    BoxError, Capabilities, Document, DotPath, Error, FindOptions, Language, MessageKey, Messages,
    Query, Result, Session, StorageAdapter, Value,
};
