//! The contract every backing store satisfies.

use std::fmt;
use std::num::NonZeroUsize;

use async_trait::async_trait;
use serde_json::Value;

use crate::query::{FindOptions, Query};
use crate::{Document, DotPath, Error, Result};

/// What an adapter can do beyond the basic operation set.
///
/// Fixed when the adapter is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Sessions can be started, committed and aborted.
    pub transactions: bool,
    /// `find` is answered natively rather than rejected.
    pub find: bool,
}

/// Handle for one transactional unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    id: String,
    adapter: &'static str,
}

impl Session {
    pub fn new(id: impl Into<String>, adapter: &'static str) -> Self {
        Self {
            id: id.into(),
            adapter,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the adapter that opened this session.
    pub fn adapter(&self) -> &'static str {
        self.adapter
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.adapter, self.id)
    }
}

/// A key-value store addressed by dot paths.
///
/// Every operation accepts an optional session. Adapters without session
/// support ignore it.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn StorageAdapter>`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short adapter name, e.g. `jsondb`.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Value at `key`, or `None` if anything along the path is missing.
    async fn get(&self, key: &DotPath, session: Option<&Session>) -> Result<Option<Value>>;

    /// Store `value` at `key`, replacing what was there. Returns the stored value.
    async fn set(&self, key: &DotPath, value: Value, session: Option<&Session>) -> Result<Value>;

    async fn has(&self, key: &DotPath, session: Option<&Session>) -> Result<bool> {
        Ok(self.get(key, session).await?.is_some())
    }

    /// Remove `key`. Returns whether something was removed.
    async fn delete(&self, key: &DotPath, session: Option<&Session>) -> Result<bool>;

    /// Add `amount` to the number at `key`. Non-numbers count as zero.
    async fn add(&self, key: &DotPath, amount: f64, session: Option<&Session>) -> Result<Value>;

    async fn subtract(
        &self,
        key: &DotPath,
        amount: f64,
        session: Option<&Session>,
    ) -> Result<Value> {
        self.add(key, -amount, session).await
    }

    /// Append `element` to the sequence at `key`, starting one if needed.
    /// Returns the whole sequence.
    async fn push(&self, key: &DotPath, element: Value, session: Option<&Session>)
        -> Result<Value>;

    /// Remove every element equal to `element` from the sequence at `key`.
    ///
    /// A value that is not a sequence is returned unchanged; `None` if there
    /// is no value at all.
    async fn unpush(
        &self,
        key: &DotPath,
        element: Value,
        session: Option<&Session>,
    ) -> Result<Option<Value>>;

    /// Remove the element at one-based `index`. `None` if the value is not a
    /// sequence or is shorter than `index`.
    async fn del_by_priority(
        &self,
        key: &DotPath,
        index: NonZeroUsize,
        session: Option<&Session>,
    ) -> Result<Option<Vec<Value>>>;

    /// Replace the element at one-based `index`. Never extends the sequence.
    async fn set_by_priority(
        &self,
        key: &DotPath,
        value: Value,
        index: NonZeroUsize,
        session: Option<&Session>,
    ) -> Result<Option<Vec<Value>>>;

    /// The whole dataset as one mapping.
    async fn all(&self, session: Option<&Session>) -> Result<Document>;

    /// Remove everything.
    async fn delete_all(&self, session: Option<&Session>) -> Result<bool>;

    async fn find(
        &self,
        query: &Query,
        options: &FindOptions,
        session: Option<&Session>,
    ) -> Result<Vec<Value>>;

    async fn start_transaction(&self) -> Result<Session> {
        Err(Error::unsupported(self.name(), "startTransaction"))
    }

    async fn commit_transaction(&self, session: &Session) -> Result<()> {
        let _ = session;
        Err(Error::unsupported(self.name(), "commitTransaction"))
    }

    async fn abort_transaction(&self, session: &Session) -> Result<()> {
        let _ = session;
        Err(Error::unsupported(self.name(), "abortTransaction"))
    }
}
