//! Core dotstore layer
//!
//! Everything that does not depend on a particular backing store:
//! - `DotPath`: validated dot-separated key
//! - `access`: get/set/remove inside a nested document
//! - `prune`: blank-value removal
//! - `query`: filter/sort/project/skip/limit over a document's values
//! - `StorageAdapter`: the contract every backing store satisfies
//! - `DocumentAdapter`: the contract implemented once over any whole-document medium
//!
//! # Example
//!
//! ```rust
//! use dotstore_core::{access, Document};
//! use serde_json::json;
//!
//! let mut doc = Document::new();
//! assert!(access::set("user.stats.wins", json!(3), &mut doc));
//! assert_eq!(access::get_in(&doc, &["user", "stats"]), Some(&json!({"wins": 3})));
//! ```

pub use serde_json::Value;

pub mod access;
pub mod adapter;
pub mod arith;
pub mod document;
mod error;
pub mod messages;
mod path;
pub mod prune;
pub mod query;

pub use adapter::{Capabilities, Session, StorageAdapter};
pub use document::{DocumentAdapter, DocumentMedium, DocumentOptions, Loaded};
pub use error::{BoxError, Error, Result};
pub use messages::{Language, MessageKey, Messages};
pub use path::{DotPath, PathError};
pub use query::{FindOptions, Query, QueryError};

/// A whole dataset: always a mapping at the top level.
pub type Document = serde_json::Map<String, Value>;
