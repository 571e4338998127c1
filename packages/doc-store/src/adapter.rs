//! `StorageAdapter` over a record collection.
//!
//! The first key segment selects the record; the rest is a path inside its
//! value, so `user.stats.wins` addresses `value.stats.wins` of record
//! `user`. Single-record mutations are one update command each.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dotstore_core::{
    access, arith, Capabilities, Document, DotPath, Error as StoreError, FindOptions, Query,
    Result, Session, StorageAdapter, Value,
};

use crate::collection::Collection;
use crate::connection::{Connection, ConnectionState};
use crate::record::{Record, RecordFilter, Update};
use crate::ADAPTER_NAME;

const VALUE_FIELD: &str = "value";

/// Default time allowed for the initial ping.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DocumentStoreAdapter {
    collection: Arc<dyn Collection>,
    connection: Connection,
}

impl DocumentStoreAdapter {
    /// Start connecting to `collection` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(collection: Arc<dyn Collection>) -> Self {
        Self::with_timeout(collection, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeout(collection: Arc<dyn Collection>, timeout: Duration) -> Self {
        let connection = Connection::establish(collection.clone(), timeout);
        Self {
            collection,
            connection,
        }
    }

    /// Use an existing connection state instead of pinging.
    pub fn with_connection(collection: Arc<dyn Collection>, connection: Connection) -> Self {
        Self {
            collection,
            connection,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.collection
    }

    async fn ready(&self) -> Result<()> {
        self.connection.wait_ready().await
    }

    async fn record(&self, key: &DotPath, session: Option<&str>) -> Result<Option<Record>> {
        self.ready().await?;
        Ok(self
            .collection
            .find_one(&RecordFilter::key(key.head()), session)
            .await?)
    }

    async fn update(
        &self,
        key: &DotPath,
        update: Update,
        session: Option<&str>,
    ) -> Result<Option<Value>> {
        self.ready().await?;
        let outcome = self
            .collection
            .update_one(&RecordFilter::key(key.head()), &update, true, session)
            .await?;
        Ok(outcome.document.and_then(|record| inner(record, key)))
    }

    /// The current value at `key`, read straight from the collection.
    async fn current(&self, key: &DotPath, session: Option<&str>) -> Result<Option<Value>> {
        Ok(self
            .record(key, session)
            .await?
            .and_then(|record| inner(record, key)))
    }

    /// Replace the sequence at `key` after `change` edits a copy of it.
    async fn rewrite_sequence<F>(
        &self,
        key: &DotPath,
        index: NonZeroUsize,
        session: Option<&str>,
        change: F,
    ) -> Result<Option<Vec<Value>>>
    where
        F: FnOnce(&mut Vec<Value>, usize) + Send,
    {
        let mut list = match self.current(key, session).await? {
            Some(Value::Array(list)) if list.len() >= index.get() => list,
            _ => return Ok(None),
        };
        change(&mut list, index.get() - 1);
        self.update(
            key,
            Update::Set {
                path: record_path(key),
                value: Value::Array(list.clone()),
            },
            session,
        )
        .await?;
        Ok(Some(list))
    }
}

/// `value` followed by the key's tail segments.
fn record_path(key: &DotPath) -> String {
    let mut path = VALUE_FIELD.to_string();
    for segment in key.tail() {
        path.push('.');
        path.push_str(segment);
    }
    path
}

fn inner(record: Record, key: &DotPath) -> Option<Value> {
    access::get(&record.value, key.tail()).cloned()
}

fn session_id(session: Option<&Session>) -> Option<&str> {
    session.map(Session::id)
}

#[async_trait]
impl StorageAdapter for DocumentStoreAdapter {
    fn name(&self) -> &'static str {
        ADAPTER_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactions: self.collection.supports_sessions(),
            find: true,
        }
    }

    async fn get(&self, key: &DotPath, session: Option<&Session>) -> Result<Option<Value>> {
        self.current(key, session_id(session)).await
    }

    async fn set(&self, key: &DotPath, value: Value, session: Option<&Session>) -> Result<Value> {
        let update = Update::Set {
            path: record_path(key),
            value: value.clone(),
        };
        self.update(key, update, session_id(session)).await?;
        Ok(value)
    }

    async fn delete(&self, key: &DotPath, session: Option<&Session>) -> Result<bool> {
        self.ready().await?;
        let session = session_id(session);
        let filter = RecordFilter::key(key.head());

        if key.is_top_level() {
            return Ok(self.collection.delete_one(&filter, session).await?);
        }

        let update = Update::Unset {
            path: record_path(key),
        };
        let outcome = self
            .collection
            .update_one(&filter, &update, false, session)
            .await?;
        Ok(outcome.modified)
    }

    async fn add(&self, key: &DotPath, amount: f64, session: Option<&Session>) -> Result<Value> {
        let session = session_id(session);
        let path = record_path(key);
        let increment = Update::Inc {
            path: path.clone(),
            amount: arith::amount_value(amount),
        };

        match self.update(key, increment, session).await {
            Ok(Some(value)) if value.is_number() => Ok(value),
            Ok(_) => Ok(self
                .current(key, session)
                .await?
                .unwrap_or_else(|| arith::amount_value(amount))),
            Err(StoreError::Medium { source, .. })
                if source
                    .downcast_ref::<crate::Error>()
                    .is_some_and(crate::Error::is_type_mismatch) =>
            {
                tracing::debug!(key = %key, "value is not numeric, replacing it");
                let value = arith::amount_value(amount);
                let reset = Update::Set {
                    path,
                    value: value.clone(),
                };
                self.update(key, reset, session).await?;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    async fn push(
        &self,
        key: &DotPath,
        element: Value,
        session: Option<&Session>,
    ) -> Result<Value> {
        let session = session_id(session);
        let path = record_path(key);
        let push = Update::Push {
            path: path.clone(),
            element: element.clone(),
        };

        match self.update(key, push, session).await {
            Ok(Some(list @ Value::Array(_))) => Ok(list),
            Ok(_) => Ok(self
                .current(key, session)
                .await?
                .unwrap_or_else(|| Value::Array(vec![element]))),
            Err(StoreError::Medium { source, .. })
                if source
                    .downcast_ref::<crate::Error>()
                    .is_some_and(crate::Error::is_type_mismatch) =>
            {
                tracing::debug!(key = %key, "value is not a sequence, starting a new one");
                let list = Value::Array(vec![element]);
                let reset = Update::Set {
                    path,
                    value: list.clone(),
                };
                self.update(key, reset, session).await?;
                Ok(list)
            }
            Err(e) => Err(e),
        }
    }

    async fn unpush(
        &self,
        key: &DotPath,
        element: Value,
        session: Option<&Session>,
    ) -> Result<Option<Value>> {
        self.ready().await?;
        let session = session_id(session);
        let path = record_path(key);
        let filter = RecordFilter::key(key.head()).with_array_at(path.clone());
        let pull = Update::Pull { path, element };

        let outcome = self
            .collection
            .update_one(&filter, &pull, false, session)
            .await?;
        if !outcome.matched {
            return self.current(key, session).await;
        }
        match outcome.document {
            Some(record) => Ok(inner(record, key)),
            None => self.current(key, session).await,
        }
    }

    async fn del_by_priority(
        &self,
        key: &DotPath,
        index: NonZeroUsize,
        session: Option<&Session>,
    ) -> Result<Option<Vec<Value>>> {
        self.rewrite_sequence(key, index, session_id(session), |list, i| {
            list.remove(i);
        })
        .await
    }

    async fn set_by_priority(
        &self,
        key: &DotPath,
        value: Value,
        index: NonZeroUsize,
        session: Option<&Session>,
    ) -> Result<Option<Vec<Value>>> {
        self.rewrite_sequence(key, index, session_id(session), move |list, i| {
            list[i] = value;
        })
        .await
    }

    async fn all(&self, session: Option<&Session>) -> Result<Document> {
        self.ready().await?;
        let records = self
            .collection
            .find(&Query::all(), &FindOptions::default(), session_id(session))
            .await?;

        Ok(records
            .into_iter()
            .filter_map(Record::from_value)
            .map(|record| (record.key, record.value))
            .collect())
    }

    async fn delete_all(&self, session: Option<&Session>) -> Result<bool> {
        self.ready().await?;
        let deleted = self
            .collection
            .delete_many(&Query::all(), session_id(session))
            .await?;
        tracing::debug!(deleted, "deleted all records");
        Ok(true)
    }

    async fn find(
        &self,
        query: &Query,
        options: &FindOptions,
        session: Option<&Session>,
    ) -> Result<Vec<Value>> {
        self.ready().await?;
        let found = self
            .collection
            .find(
                &query.prefixed(VALUE_FIELD),
                &options.prefixed(VALUE_FIELD),
                session_id(session),
            )
            .await?;

        Ok(found
            .into_iter()
            .map(|mut record| match record.get_mut(VALUE_FIELD) {
                Some(value) => value.take(),
                None => Value::Object(Default::default()),
            })
            .collect())
    }

    async fn start_transaction(&self) -> Result<Session> {
        self.ready().await?;
        let id = self.collection.start_session().await?;
        Ok(Session::new(id, ADAPTER_NAME))
    }

    async fn commit_transaction(&self, session: &Session) -> Result<()> {
        if !self.collection.supports_sessions() {
            return Err(StoreError::unsupported(ADAPTER_NAME, "commitTransaction"));
        }
        self.ready().await?;
        Ok(self.collection.commit_session(session.id()).await?)
    }

    async fn abort_transaction(&self, session: &Session) -> Result<()> {
        if !self.collection.supports_sessions() {
            return Err(StoreError::unsupported(ADAPTER_NAME, "abortTransaction"));
        }
        self.ready().await?;
        Ok(self.collection.abort_session(session.id()).await?)
    }
}
