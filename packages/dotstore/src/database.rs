//! The public key-value facade.

use std::collections::HashSet;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use dotstore_core::{
    Document, DocumentAdapter, DocumentOptions, DotPath, Error, FindOptions, MessageKey, Messages,
    Query, Result, Session, StorageAdapter, Value,
};
use dotstore_doc_store::{collection, DocumentStoreAdapter, DEFAULT_CONNECT_TIMEOUT};
use dotstore_file_store::{DirectoryStorageArea, FileMedium, LocalStorage, MemoryStorageArea};

use crate::config::{AdapterKind, Config};
use crate::error::{ConfigError, OpenError};
use crate::events::{Operation, StoreEvent};
use crate::import::{DataSource, ImportItem, ImportReport};

const EVENT_CAPACITY: usize = 64;

/// A key-value store addressed by dot paths.
///
/// Keys like `user.stats.wins` address nested values. All arguments are
/// validated before the adapter is called; invalid ones fail with
/// [`Error::InvalidArgument`] carrying a localized message.
///
/// Read operations (`get`, `has`, `all`, `find`) log and degrade to an
/// empty result when the backing medium fails. Mutations propagate the
/// error.
///
/// # Example
///
/// ```rust,no_run
/// use dotstore::{Config, Database};
/// use serde_json::json;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::open(Config::default().with_folder("data")).await?;
/// db.set("user.name", json!("Ada")).await?;
/// db.push("user.tags", json!("admin")).await?;
/// assert_eq!(db.get("user.tags").await?, Some(json!(["admin"])));
/// # Ok(())
/// # }
/// ```
pub struct Database {
    adapter: Arc<dyn StorageAdapter>,
    messages: Messages,
    config: Option<Config>,
    events: broadcast::Sender<StoreEvent>,
    sessions: Mutex<HashSet<String>>,
}

impl Database {
    /// Open the adapter described by `config`.
    pub async fn open(config: Config) -> std::result::Result<Self, OpenError> {
        let messages = load_messages(&config).await?;
        let adapter = build_adapter(&config).await?;
        tracing::info!(adapter = adapter.name(), "database opened");

        let mut db = Self::with_adapter(adapter, messages);
        db.config = Some(config);
        Ok(db)
    }

    /// Wrap an already constructed adapter.
    pub fn with_adapter(adapter: Arc<dyn StorageAdapter>, messages: Messages) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            adapter,
            messages,
            config: None,
            events,
            sessions: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the adapter and messages. Open sessions are forgotten;
    /// subscribers stay subscribed.
    pub async fn reconfigure(&mut self, config: Config) -> std::result::Result<(), OpenError> {
        let messages = load_messages(&config).await?;
        let adapter = build_adapter(&config).await?;
        tracing::info!(
            from = self.adapter.name(),
            to = adapter.name(),
            "database reconfigured"
        );

        self.adapter = adapter;
        self.messages = messages;
        self.config = Some(config);
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.clear();
        }
        Ok(())
    }

    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    /// Receive a [`StoreEvent`] after each successful mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn invalid(&self, kind: MessageKey) -> Error {
        Error::invalid_argument(kind, self.messages.text(kind))
    }

    /// Operations bound to `session`.
    pub fn in_session<'a>(&'a self, session: &'a Session) -> Scope<'a> {
        Scope {
            db: self,
            session: Some(session),
        }
    }

    fn scope(&self) -> Scope<'_> {
        Scope {
            db: self,
            session: None,
        }
    }

    fn ensure_active(&self, session: &Session) -> Result<()> {
        let active = session.adapter() == self.adapter.name()
            && self
                .sessions
                .lock()
                .map(|sessions| sessions.contains(session.id()))
                .unwrap_or(false);
        if active {
            Ok(())
        } else {
            Err(self.invalid(MessageKey::BlankSession))
        }
    }

    fn forget(&self, session: &Session) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(session.id());
        }
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<Value> {
        self.scope().set(key, value).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.scope().get(key).await
    }

    /// Alias of [`Database::get`].
    pub async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        self.scope().get(key).await
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        self.scope().has(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.scope().delete(key).await
    }

    pub async fn add(&self, key: &str, amount: f64) -> Result<Value> {
        self.scope().add(key, amount).await
    }

    pub async fn subtract(&self, key: &str, amount: f64) -> Result<Value> {
        self.scope().subtract(key, amount).await
    }

    pub async fn push(&self, key: &str, element: Value) -> Result<Value> {
        self.scope().push(key, element).await
    }

    pub async fn unpush(&self, key: &str, element: Value) -> Result<Option<Value>> {
        self.scope().unpush(key, element).await
    }

    pub async fn del_by_priority(&self, key: &str, index: usize) -> Result<Option<Vec<Value>>> {
        self.scope().del_by_priority(key, index).await
    }

    pub async fn set_by_priority(
        &self,
        key: &str,
        value: Value,
        index: usize,
    ) -> Result<Option<Vec<Value>>> {
        self.scope().set_by_priority(key, value, index).await
    }

    pub async fn all(&self) -> Result<Document> {
        self.scope().all().await
    }

    pub async fn delete_all(&self) -> Result<bool> {
        self.scope().delete_all().await
    }

    pub async fn find(&self, query: &Value, options: &Value) -> Result<Vec<Value>> {
        self.scope().find(query, options).await
    }

    pub async fn find_with(&self, query: &Query, options: &FindOptions) -> Result<Vec<Value>> {
        self.scope().find_with(query, options).await
    }

    pub async fn start_transaction(&self) -> Result<Session> {
        let session = self.adapter.start_transaction().await?;
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session.id().to_string());
        }
        tracing::debug!(session = %session, "transaction started");
        Ok(session)
    }

    /// Commit `session`. If the adapter fails to commit, the session stays
    /// open so it can still be aborted.
    pub async fn commit_transaction(&self, session: &Session) -> Result<()> {
        self.ensure_active(session)?;
        self.adapter.commit_transaction(session).await?;
        self.forget(session);
        tracing::debug!(session = %session, "transaction committed");
        Ok(())
    }

    /// Abort `session`. The session is finished even if the adapter fails.
    pub async fn abort_transaction(&self, session: &Session) -> Result<()> {
        self.ensure_active(session)?;
        let aborted = self.adapter.abort_transaction(session).await;
        self.forget(session);
        aborted?;
        tracing::debug!(session = %session, "transaction aborted");
        Ok(())
    }

    /// Run `work` in a fresh session, committing on `Ok` and aborting on `Err`.
    ///
    /// The session is finished on every path: a failed commit is followed by
    /// an abort. Abort failures are logged and the first error is returned.
    pub async fn with_transaction<T, F, Fut>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.start_transaction().await?;
        let failure = match work(session.clone()).await {
            Ok(value) => match self.commit_transaction(&session).await {
                Ok(()) => return Ok(value),
                Err(e) => e,
            },
            Err(e) => e,
        };

        if let Err(abort) = self.abort_transaction(&session).await {
            tracing::error!(
                session = %session,
                error = %abort,
                "failed to abort transaction"
            );
        }
        Err(failure)
    }

    /// Write every `{ID, data}` item of `source` with `set(ID, data)`.
    pub async fn import_from(&self, source: &dyn DataSource) -> Result<ImportReport> {
        let items = source
            .fetch_all()
            .await
            .map_err(|e| Error::medium("import", e))?;

        let mut report = ImportReport::default();
        for (position, item) in items.iter().enumerate() {
            let Some(item) = ImportItem::parse(item) else {
                tracing::warn!(position, "skipping malformed import item");
                report.skipped.push(position);
                continue;
            };
            match self.set(&item.id, item.data).await {
                Ok(_) => report.imported += 1,
                Err(e) => {
                    tracing::error!(key = %item.id, error = %e, "failed to import item");
                    report.failed.push((item.id, e.to_string()));
                }
            }
        }

        tracing::info!(
            imported = report.imported,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "import finished"
        );
        Ok(report)
    }
}

/// Facade operations, optionally bound to a session.
pub struct Scope<'a> {
    db: &'a Database,
    session: Option<&'a Session>,
}

impl<'a> Scope<'a> {
    fn adapter(&self) -> &dyn StorageAdapter {
        self.db.adapter.as_ref()
    }

    fn key(&self, key: &str) -> Result<DotPath> {
        DotPath::parse(key).map_err(|_| self.db.invalid(MessageKey::BlankName))
    }

    fn amount(&self, amount: f64) -> Result<f64> {
        if amount.is_finite() {
            Ok(amount)
        } else {
            Err(self.db.invalid(MessageKey::BlankNumber))
        }
    }

    fn index(&self, index: usize) -> Result<NonZeroUsize> {
        NonZeroUsize::new(index).ok_or_else(|| self.db.invalid(MessageKey::BlankNumber))
    }

    fn check_session(&self) -> Result<()> {
        match self.session {
            Some(session) => self.db.ensure_active(session),
            None => Ok(()),
        }
    }

    fn emit(&self, operation: Operation, key: Option<&DotPath>, value: Value) {
        let event = StoreEvent {
            operation,
            key: key.map(DotPath::to_string),
            value,
            session: self.session.map(|s| s.id().to_string()),
        };
        // No subscribers is not an error.
        let _ = self.db.events.send(event);
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<Value> {
        let path = self.key(key)?;
        self.check_session()?;
        let stored = self.adapter().set(&path, value, self.session).await?;
        self.emit(Operation::Set, Some(&path), stored.clone());
        Ok(stored)
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key(key)?;
        self.check_session()?;
        degrade("get", self.adapter().get(&path, self.session).await, None)
    }

    pub async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        self.get(key).await
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        let path = self.key(key)?;
        self.check_session()?;
        degrade("has", self.adapter().has(&path, self.session).await, false)
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.key(key)?;
        self.check_session()?;
        let deleted = self.adapter().delete(&path, self.session).await?;
        if deleted {
            self.emit(Operation::Delete, Some(&path), Value::Bool(true));
        }
        Ok(deleted)
    }

    pub async fn add(&self, key: &str, amount: f64) -> Result<Value> {
        let path = self.key(key)?;
        let amount = self.amount(amount)?;
        self.check_session()?;
        let value = self.adapter().add(&path, amount, self.session).await?;
        self.emit(Operation::Add, Some(&path), value.clone());
        Ok(value)
    }

    pub async fn subtract(&self, key: &str, amount: f64) -> Result<Value> {
        let path = self.key(key)?;
        let amount = self.amount(amount)?;
        self.check_session()?;
        let value = self.adapter().subtract(&path, amount, self.session).await?;
        self.emit(Operation::Subtract, Some(&path), value.clone());
        Ok(value)
    }

    pub async fn push(&self, key: &str, element: Value) -> Result<Value> {
        let path = self.key(key)?;
        self.check_session()?;
        let list = self.adapter().push(&path, element, self.session).await?;
        self.emit(Operation::Push, Some(&path), list.clone());
        Ok(list)
    }

    pub async fn unpush(&self, key: &str, element: Value) -> Result<Option<Value>> {
        let path = self.key(key)?;
        self.check_session()?;
        let remaining = self.adapter().unpush(&path, element, self.session).await?;
        if let Some(list @ Value::Array(_)) = &remaining {
            self.emit(Operation::Unpush, Some(&path), list.clone());
        }
        Ok(remaining)
    }

    pub async fn del_by_priority(&self, key: &str, index: usize) -> Result<Option<Vec<Value>>> {
        let path = self.key(key)?;
        let index = self.index(index)?;
        self.check_session()?;
        let list = self
            .adapter()
            .del_by_priority(&path, index, self.session)
            .await?;
        if let Some(list) = &list {
            self.emit(Operation::DelByPriority, Some(&path), Value::Array(list.clone()));
        }
        Ok(list)
    }

    pub async fn set_by_priority(
        &self,
        key: &str,
        value: Value,
        index: usize,
    ) -> Result<Option<Vec<Value>>> {
        let path = self.key(key)?;
        let index = self.index(index)?;
        self.check_session()?;
        let list = self
            .adapter()
            .set_by_priority(&path, value, index, self.session)
            .await?;
        if let Some(list) = &list {
            self.emit(Operation::SetByPriority, Some(&path), Value::Array(list.clone()));
        }
        Ok(list)
    }

    pub async fn all(&self) -> Result<Document> {
        self.check_session()?;
        degrade("all", self.adapter().all(self.session).await, Document::new())
    }

    pub async fn delete_all(&self) -> Result<bool> {
        self.check_session()?;
        let done = self.adapter().delete_all(self.session).await?;
        self.emit(Operation::DeleteAll, None, Value::Bool(done));
        Ok(done)
    }

    /// Run a query given as JSON, e.g. `{"age": {"$gte": 18}}` with
    /// `{"sort": {"age": -1}, "limit": 2}`. `null` options mean none.
    pub async fn find(&self, query: &Value, options: &Value) -> Result<Vec<Value>> {
        let query = Query::from_value(query).map_err(|_| self.db.invalid(MessageKey::BlankQuery))?;
        let options =
            FindOptions::from_value(options).map_err(|_| self.db.invalid(MessageKey::BlankQuery))?;
        self.find_with(&query, &options).await
    }

    pub async fn find_with(&self, query: &Query, options: &FindOptions) -> Result<Vec<Value>> {
        self.check_session()?;
        if !self.adapter().capabilities().find {
            return Err(Error::unsupported(self.adapter().name(), "find"));
        }
        degrade(
            "find",
            self.adapter().find(query, options, self.session).await,
            Vec::new(),
        )
    }
}

/// Turn a medium failure on a read path into `fallback`.
fn degrade<T>(operation: &'static str, result: Result<T>, fallback: T) -> Result<T> {
    match result {
        Err(e) if e.is_medium() => {
            tracing::error!(operation, error = %e, "read failed, returning empty result");
            Ok(fallback)
        }
        other => other,
    }
}

async fn load_messages(config: &Config) -> std::result::Result<Messages, ConfigError> {
    match &config.messages_file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
            Ok(Messages::from_json(&text)?)
        }
        None => Ok(Messages::for_language(config.language())),
    }
}

async fn build_adapter(
    config: &Config,
) -> std::result::Result<Arc<dyn StorageAdapter>, OpenError> {
    let options = DocumentOptions {
        prune_empty: config.prune_empty,
        cache_ttl: config.cache_ttl(),
    };

    let adapter: Arc<dyn StorageAdapter> = match config.adapter {
        AdapterKind::Jsondb => {
            let medium =
                FileMedium::json(&config.folder, &config.file_name, config.readable).await?;
            Arc::new(DocumentAdapter::new(medium, options))
        }
        AdapterKind::Yamldb => {
            let medium = FileMedium::yaml(&config.folder, &config.file_name).await?;
            Arc::new(DocumentAdapter::new(medium, options))
        }
        AdapterKind::Localstorage => match &config.local_storage_dir {
            Some(dir) => {
                let area = DirectoryStorageArea::new(dir);
                let medium = LocalStorage::new(area, config.file_name.clone()).await;
                Arc::new(DocumentAdapter::new(medium, options))
            }
            None => {
                let area = MemoryStorageArea::new();
                let medium = LocalStorage::new(area, config.file_name.clone()).await;
                Arc::new(DocumentAdapter::new(medium, options))
            }
        },
        AdapterKind::Mongo => {
            let store = config
                .document_store
                .as_ref()
                .ok_or(ConfigError::MissingDocumentStore)?;
            let records = collection::open(&store.url, &store.collection)?;
            let timeout = store
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT);
            Arc::new(DocumentStoreAdapter::with_timeout(records, timeout))
        }
    };
    Ok(adapter)
}
