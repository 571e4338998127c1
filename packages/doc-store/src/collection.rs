//! The record collection contract.

use std::sync::Arc;

use async_trait::async_trait;
use dotstore_core::{FindOptions, Query, Value};

use crate::error::{Error, Result};
use crate::http::HttpCollection;
use crate::memory::MemoryCollection;
use crate::record::{Record, RecordFilter, Update, UpdateOutcome};

/// A collection of `{key, value}` records.
///
/// `session` is a session id from `start_session`. Collections that do not
/// support sessions keep the default session methods, which fail with
/// [`Error::SessionsUnsupported`], and ignore the argument elsewhere.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn Collection>`.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    fn supports_sessions(&self) -> bool {
        false
    }

    /// Check that the collection is reachable.
    async fn ping(&self) -> Result<()>;

    async fn find_one(&self, filter: &RecordFilter, session: Option<&str>)
        -> Result<Option<Record>>;

    /// Apply `update` to the record matching `filter`, inserting
    /// `{key: filter.key}` first when nothing matches and `upsert` is set.
    async fn update_one(
        &self,
        filter: &RecordFilter,
        update: &Update,
        upsert: bool,
        session: Option<&str>,
    ) -> Result<UpdateOutcome>;

    async fn delete_one(&self, filter: &RecordFilter, session: Option<&str>) -> Result<bool>;

    /// Delete every record matching `query`. Returns the number deleted.
    async fn delete_many(&self, query: &Query, session: Option<&str>) -> Result<u64>;

    /// Records matching `query` (in record terms), as raw documents so that
    /// projections can drop fields.
    async fn find(
        &self,
        query: &Query,
        options: &FindOptions,
        session: Option<&str>,
    ) -> Result<Vec<Value>>;

    async fn start_session(&self) -> Result<String> {
        Err(Error::SessionsUnsupported {
            collection: self.name().to_string(),
        })
    }

    async fn commit_session(&self, session: &str) -> Result<()> {
        Err(Error::UnknownSession {
            id: session.to_string(),
        })
    }

    async fn abort_session(&self, session: &str) -> Result<()> {
        Err(Error::UnknownSession {
            id: session.to_string(),
        })
    }
}

/// Open a collection from a URL.
///
/// `memory://` gives a fresh in-process collection; `http://` and
/// `https://` point at a data API.
pub fn open(url: &str, collection: &str) -> Result<Arc<dyn Collection>> {
    let parsed = url::Url::parse(url)?;
    match parsed.scheme() {
        "memory" => Ok(Arc::new(MemoryCollection::new(collection))),
        "http" | "https" => Ok(Arc::new(HttpCollection::new(url, collection)?)),
        other => Err(Error::InvalidUrl {
            message: format!("unsupported scheme '{}' in {}", other, url),
        }),
    }
}
