//! Whole-document adapters.
//!
//! A [`DocumentMedium`] only knows how to load and store one document.
//! [`DocumentAdapter`] builds every [`StorageAdapter`] operation on top of
//! that: read the document, mutate it with [`access`], optionally prune, and
//! write the whole thing back.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::adapter::{Capabilities, Session, StorageAdapter};
use crate::query::{self, FindOptions, Query};
use crate::{access, arith, prune, Document, DotPath, Error, Result};

/// What a medium found when asked for its document.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Nothing stored yet.
    Missing,
    /// A decoded document. May still be a non-mapping.
    Document(Value),
    /// The stored bytes could not be decoded.
    Corrupt(String),
}

/// Storage for exactly one document.
#[async_trait]
pub trait DocumentMedium: Send + Sync {
    /// Adapter name reported by the [`DocumentAdapter`] wrapping this medium.
    fn name(&self) -> &'static str;

    /// Human readable location, used in logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Loaded>;

    /// Replace the stored document. Must be all-or-nothing.
    async fn store(&self, document: &Document) -> Result<()>;
}

/// Options shared by all whole-document adapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Prune blank values before every write.
    pub prune_empty: bool,
    /// Keep the last read document for this long. `None` disables caching.
    pub cache_ttl: Option<Duration>,
}

struct CacheEntry {
    document: Document,
    expires_at: Instant,
}

/// A [`StorageAdapter`] over any [`DocumentMedium`].
///
/// Mutations on one instance are serialized, so concurrent read-modify-write
/// calls never lose updates. Other instances or processes writing the same
/// medium still race.
pub struct DocumentAdapter<M> {
    medium: M,
    options: DocumentOptions,
    cache: Mutex<Option<CacheEntry>>,
    /// Bumped before and after every store. A load only fills the cache if
    /// no store started or finished while it ran.
    generation: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
}

impl<M: DocumentMedium> DocumentAdapter<M> {
    pub fn new(medium: M, options: DocumentOptions) -> Self {
        Self {
            medium,
            options,
            cache: Mutex::new(None),
            generation: AtomicU64::new(0),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn options(&self) -> DocumentOptions {
        self.options
    }

    fn cached(&self) -> Option<Document> {
        self.options.cache_ttl?;
        let mut cache = self.cache.lock().ok()?;
        match cache.as_ref() {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.document.clone()),
            Some(_) => {
                *cache = None;
                None
            }
            None => None,
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(AtomicOrdering::SeqCst)
    }

    fn remember(&self, document: &Document, generation: u64) {
        let Some(ttl) = self.options.cache_ttl else {
            return;
        };
        if let Ok(mut cache) = self.cache.lock() {
            if self.generation() != generation {
                return;
            }
            *cache = Some(CacheEntry {
                document: document.clone(),
                expires_at: Instant::now() + ttl,
            });
        }
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, AtomicOrdering::SeqCst);
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }

    /// Read the whole document, resetting a corrupt medium to `{}`.
    async fn read(&self) -> Result<Document> {
        if let Some(document) = self.cached() {
            return Ok(document);
        }

        let generation = self.generation();
        let document = match self.medium.load().await? {
            Loaded::Missing => Document::new(),
            Loaded::Document(Value::Object(map)) => map,
            Loaded::Document(other) => {
                self.reset(&format!("top level is not a mapping: {}", kind_of(&other)))
                    .await
            }
            Loaded::Corrupt(reason) => self.reset(&reason).await,
        };

        self.remember(&document, generation);
        Ok(document)
    }

    async fn reset(&self, reason: &str) -> Document {
        tracing::error!(
            medium = %self.medium.describe(),
            reason,
            "document is corrupt, resetting to an empty mapping"
        );
        let empty = Document::new();
        if let Err(e) = self.medium.store(&empty).await {
            tracing::error!(
                medium = %self.medium.describe(),
                error = %e,
                "failed to reset document"
            );
        }
        empty
    }

    async fn write(&self, mut document: Document) -> Result<()> {
        if self.options.prune_empty {
            prune::prune(&mut document);
        }
        self.invalidate();
        let stored = self.medium.store(&document).await;
        self.invalidate();
        stored?;
        tracing::debug!(
            medium = %self.medium.describe(),
            entries = document.len(),
            "document written"
        );
        Ok(())
    }

    /// Read, let `change` mutate, and write back when it asks to.
    ///
    /// `change` returns the operation result and whether the document must
    /// be written.
    async fn modify<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<(T, bool)> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read().await?;
        let (result, dirty) = change(&mut document)?;
        if dirty {
            self.write(document).await?;
        }
        Ok(result)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn unaddressable(adapter: &'static str, key: &DotPath) -> Error {
    Error::medium(adapter, format!("key '{}' cannot be addressed", key))
}

#[async_trait]
impl<M: DocumentMedium> StorageAdapter for DocumentAdapter<M> {
    fn name(&self) -> &'static str {
        self.medium.name()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactions: false,
            find: true,
        }
    }

    async fn get(&self, key: &DotPath, _session: Option<&Session>) -> Result<Option<Value>> {
        let document = self.read().await?;
        Ok(access::get_in(&document, key.segments()).cloned())
    }

    async fn set(&self, key: &DotPath, value: Value, _session: Option<&Session>) -> Result<Value> {
        let name = self.name();
        self.modify(|document| {
            if !access::set(&key.to_string(), value.clone(), document) {
                return Err(unaddressable(name, key));
            }
            Ok((value, true))
        })
        .await
    }

    async fn delete(&self, key: &DotPath, _session: Option<&Session>) -> Result<bool> {
        self.modify(|document| {
            let removed = access::remove(document, &key.to_string());
            Ok((removed, removed))
        })
        .await
    }

    async fn add(&self, key: &DotPath, amount: f64, _session: Option<&Session>) -> Result<Value> {
        let name = self.name();
        self.modify(|document| {
            let sum = arith::add(access::get_in(document, key.segments()), amount);
            if !access::set(&key.to_string(), sum.clone(), document) {
                return Err(unaddressable(name, key));
            }
            Ok((sum, true))
        })
        .await
    }

    async fn push(
        &self,
        key: &DotPath,
        element: Value,
        _session: Option<&Session>,
    ) -> Result<Value> {
        let name = self.name();
        self.modify(|document| {
            let mut list = match access::get_in(document, key.segments()) {
                Some(Value::Array(list)) => list.clone(),
                _ => Vec::new(),
            };
            list.push(element);
            let list = Value::Array(list);
            if !access::set(&key.to_string(), list.clone(), document) {
                return Err(unaddressable(name, key));
            }
            Ok((list, true))
        })
        .await
    }

    async fn unpush(
        &self,
        key: &DotPath,
        element: Value,
        _session: Option<&Session>,
    ) -> Result<Option<Value>> {
        let name = self.name();
        self.modify(|document| {
            let list = match access::get_in(document, key.segments()) {
                Some(Value::Array(list)) => list,
                other => return Ok((other.cloned(), false)),
            };
            let kept = Value::Array(list.iter().filter(|v| **v != element).cloned().collect());
            if !access::set(&key.to_string(), kept.clone(), document) {
                return Err(unaddressable(name, key));
            }
            Ok((Some(kept), true))
        })
        .await
    }

    async fn del_by_priority(
        &self,
        key: &DotPath,
        index: NonZeroUsize,
        _session: Option<&Session>,
    ) -> Result<Option<Vec<Value>>> {
        let name = self.name();
        self.modify(|document| {
            let mut list = match access::get_in(document, key.segments()) {
                Some(Value::Array(list)) if list.len() >= index.get() => list.clone(),
                _ => return Ok((None, false)),
            };
            list.remove(index.get() - 1);
            if !access::set(&key.to_string(), Value::Array(list.clone()), document) {
                return Err(unaddressable(name, key));
            }
            Ok((Some(list), true))
        })
        .await
    }

    async fn set_by_priority(
        &self,
        key: &DotPath,
        value: Value,
        index: NonZeroUsize,
        _session: Option<&Session>,
    ) -> Result<Option<Vec<Value>>> {
        let name = self.name();
        self.modify(|document| {
            let mut list = match access::get_in(document, key.segments()) {
                Some(Value::Array(list)) if list.len() >= index.get() => list.clone(),
                _ => return Ok((None, false)),
            };
            list[index.get() - 1] = value;
            if !access::set(&key.to_string(), Value::Array(list.clone()), document) {
                return Err(unaddressable(name, key));
            }
            Ok((Some(list), true))
        })
        .await
    }

    async fn all(&self, _session: Option<&Session>) -> Result<Document> {
        self.read().await
    }

    async fn delete_all(&self, _session: Option<&Session>) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.write(Document::new()).await?;
        Ok(true)
    }

    async fn find(
        &self,
        query: &Query,
        options: &FindOptions,
        _session: Option<&Session>,
    ) -> Result<Vec<Value>> {
        let document = self.read().await?;
        Ok(query::find(&Value::Object(document), query, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory medium that counts loads and stores.
    #[derive(Default)]
    struct TestMedium {
        stored: Mutex<Option<Loaded>>,
        loads: AtomicUsize,
        stores: AtomicUsize,
        fail_store: bool,
        /// Slows every load and store down by this much.
        delay: Option<Duration>,
    }

    impl TestMedium {
        fn with(loaded: Loaded) -> Self {
            Self {
                stored: Mutex::new(Some(loaded)),
                ..Default::default()
            }
        }

        fn contents(&self) -> Option<Loaded> {
            self.stored.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentMedium for TestMedium {
        fn name(&self) -> &'static str {
            "test"
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn load(&self) -> Result<Loaded> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let loaded = self.stored.lock().unwrap().clone().unwrap_or(Loaded::Missing);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(loaded)
        }

        async fn store(&self, document: &Document) -> Result<()> {
            if self.fail_store {
                return Err(Error::medium("test", "disk full"));
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.stores.fetch_add(1, Ordering::SeqCst);
            *self.stored.lock().unwrap() = Some(Loaded::Document(Value::Object(document.clone())));
            Ok(())
        }
    }

    fn adapter() -> DocumentAdapter<TestMedium> {
        DocumentAdapter::new(TestMedium::default(), DocumentOptions::default())
    }

    fn key(s: &str) -> DotPath {
        DotPath::parse(s).unwrap()
    }

    fn one(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn set_then_get_nested() {
        let db = adapter();
        db.set(&key("a.b.c"), json!(5), None).await.unwrap();
        assert_eq!(db.get(&key("a.b.c"), None).await.unwrap(), Some(json!(5)));
        assert_eq!(db.get(&key("a.b"), None).await.unwrap(), Some(json!({"c": 5})));
        assert!(db.has(&key("a"), None).await.unwrap());
        assert!(!db.has(&key("a.x"), None).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_and_skips_write_when_absent() {
        let db = adapter();
        db.set(&key("a.b"), json!(1), None).await.unwrap();
        let stores = db.medium().stores.load(Ordering::SeqCst);

        assert!(!db.delete(&key("a.zzz"), None).await.unwrap());
        assert_eq!(db.medium().stores.load(Ordering::SeqCst), stores);

        assert!(db.delete(&key("a.b"), None).await.unwrap());
        assert_eq!(db.get(&key("a.b"), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_prunes_when_enabled() {
        let db = DocumentAdapter::new(
            TestMedium::default(),
            DocumentOptions {
                prune_empty: true,
                cache_ttl: None,
            },
        );
        db.set(&key("a.b.c"), json!(1), None).await.unwrap();
        db.set(&key("keep"), json!(true), None).await.unwrap();
        assert!(db.delete(&key("a.b.c"), None).await.unwrap());
        assert_eq!(Value::Object(db.all(None).await.unwrap()), json!({"keep": true}));
    }

    #[tokio::test]
    async fn add_and_subtract() {
        let db = adapter();
        assert_eq!(db.add(&key("n"), 5.0, None).await.unwrap(), json!(5));
        assert_eq!(db.add(&key("n"), 2.0, None).await.unwrap(), json!(7));
        assert_eq!(db.subtract(&key("n"), 7.0, None).await.unwrap(), json!(0));

        db.set(&key("s"), json!("x"), None).await.unwrap();
        assert_eq!(db.add(&key("s"), 3.0, None).await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn concurrent_adds_do_not_lose_updates() {
        let db = Arc::new(adapter());
        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.add(&key("counter"), 1.0, None).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(db.get(&key("counter"), None).await.unwrap(), Some(json!(20)));
    }

    #[tokio::test]
    async fn push_and_unpush() {
        let db = adapter();
        db.set(&key("tags"), json!("not a list"), None).await.unwrap();
        assert_eq!(db.push(&key("tags"), json!("a"), None).await.unwrap(), json!(["a"]));
        db.push(&key("tags"), json!("b"), None).await.unwrap();
        db.push(&key("tags"), json!("a"), None).await.unwrap();

        assert_eq!(
            db.unpush(&key("tags"), json!("a"), None).await.unwrap(),
            Some(json!(["b"]))
        );
    }

    #[tokio::test]
    async fn unpush_on_non_sequence_returns_value_without_write() {
        let db = adapter();
        db.set(&key("n"), json!(4), None).await.unwrap();
        let stores = db.medium().stores.load(Ordering::SeqCst);

        assert_eq!(db.unpush(&key("n"), json!(4), None).await.unwrap(), Some(json!(4)));
        assert_eq!(db.unpush(&key("missing"), json!(4), None).await.unwrap(), None);
        assert_eq!(db.medium().stores.load(Ordering::SeqCst), stores);
    }

    #[tokio::test]
    async fn by_priority() {
        let db = adapter();
        db.set(&key("list"), json!([1, 2, 3]), None).await.unwrap();

        assert_eq!(
            db.set_by_priority(&key("list"), json!(99), one(2), None).await.unwrap(),
            Some(vec![json!(1), json!(99), json!(3)])
        );
        assert_eq!(
            db.set_by_priority(&key("list"), json!(0), one(4), None).await.unwrap(),
            None
        );
        assert_eq!(
            db.del_by_priority(&key("list"), one(1), None).await.unwrap(),
            Some(vec![json!(99), json!(3)])
        );
        assert_eq!(db.del_by_priority(&key("list"), one(3), None).await.unwrap(), None);
        assert_eq!(db.del_by_priority(&key("nope"), one(1), None).await.unwrap(), None);
        assert_eq!(db.get(&key("list"), None).await.unwrap(), Some(json!([99, 3])));
    }

    #[tokio::test]
    async fn corrupt_medium_resets_to_empty() {
        let db = DocumentAdapter::new(
            TestMedium::with(Loaded::Corrupt("unexpected token".to_string())),
            DocumentOptions::default(),
        );
        assert!(db.all(None).await.unwrap().is_empty());
        assert_eq!(db.medium().contents(), Some(Loaded::Document(json!({}))));
    }

    #[tokio::test]
    async fn non_mapping_root_resets_to_empty() {
        let db = DocumentAdapter::new(
            TestMedium::with(Loaded::Document(json!([1, 2]))),
            DocumentOptions::default(),
        );
        assert!(db.all(None).await.unwrap().is_empty());
        assert_eq!(db.medium().contents(), Some(Loaded::Document(json!({}))));
    }

    #[tokio::test]
    async fn write_errors_propagate() {
        let db = DocumentAdapter::new(
            TestMedium {
                fail_store: true,
                ..Default::default()
            },
            DocumentOptions::default(),
        );
        let err = db.set(&key("a"), json!(1), None).await.unwrap_err();
        assert!(err.is_medium());
    }

    #[tokio::test]
    async fn set_through_short_sequence_fails() {
        let db = adapter();
        db.set(&key("list"), json!([1]), None).await.unwrap();
        assert!(db.set(&key("list.5"), json!(1), None).await.is_err());
    }

    #[tokio::test]
    async fn cache_serves_reads_until_written() {
        let db = DocumentAdapter::new(
            TestMedium::default(),
            DocumentOptions {
                prune_empty: false,
                cache_ttl: Some(Duration::from_secs(60)),
            },
        );
        db.set(&key("a"), json!(1), None).await.unwrap();
        let loads = db.medium().loads.load(Ordering::SeqCst);

        db.get(&key("a"), None).await.unwrap();
        db.get(&key("a"), None).await.unwrap();
        assert_eq!(db.medium().loads.load(Ordering::SeqCst), loads + 1);

        db.set(&key("a"), json!(2), None).await.unwrap();
        assert_eq!(db.get(&key("a"), None).await.unwrap(), Some(json!(2)));
    }

    fn cached_adapter(medium: TestMedium, ttl: Duration) -> DocumentAdapter<TestMedium> {
        DocumentAdapter::new(
            medium,
            DocumentOptions {
                prune_empty: false,
                cache_ttl: Some(ttl),
            },
        )
    }

    #[tokio::test]
    async fn cache_expires() {
        let db = cached_adapter(TestMedium::default(), Duration::from_millis(200));
        db.set(&key("a"), json!(1), None).await.unwrap();
        assert_eq!(db.get(&key("a"), None).await.unwrap(), Some(json!(1)));

        *db.medium().stored.lock().unwrap() = Some(Loaded::Document(json!({"a": 5})));
        assert_eq!(db.get(&key("a"), None).await.unwrap(), Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(db.get(&key("a"), None).await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn read_during_store_does_not_cache_old_document() {
        let medium = TestMedium {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let db = Arc::new(cached_adapter(medium, Duration::from_secs(60)));
        db.set(&key("n"), json!(1), None).await.unwrap();

        let writer = {
            let db = db.clone();
            tokio::spawn(async move { db.set(&key("n"), json!(2), None).await.unwrap() })
        };
        // The writer loads for 50ms, then stores for 50ms.
        tokio::time::sleep(Duration::from_millis(70)).await;
        db.get(&key("n"), None).await.unwrap();
        writer.await.unwrap();

        assert_eq!(db.get(&key("n"), None).await.unwrap(), Some(json!(2)));
        assert_eq!(db.add(&key("n"), 10.0, None).await.unwrap(), json!(12));
        assert_eq!(
            db.medium().contents(),
            Some(Loaded::Document(json!({"n": 12})))
        );
    }

    #[tokio::test]
    async fn find_over_values() {
        let db = adapter();
        db.set(&key("ali"), json!({"age": 15}), None).await.unwrap();
        db.set(&key("bea"), json!({"age": 20}), None).await.unwrap();
        db.set(&key("cem"), json!({"age": 30}), None).await.unwrap();

        let query = Query::from_value(&json!({"age": {"$gte": 18}})).unwrap();
        let options = FindOptions::from_value(&json!({"sort": {"age": -1}, "limit": 2})).unwrap();
        assert_eq!(
            db.find(&query, &options, None).await.unwrap(),
            vec![json!({"age": 30}), json!({"age": 20})]
        );
    }

    #[tokio::test]
    async fn delete_all_and_transactions_unsupported() {
        let db = adapter();
        db.set(&key("a"), json!(1), None).await.unwrap();
        assert!(db.delete_all(None).await.unwrap());
        assert!(db.all(None).await.unwrap().is_empty());

        assert!(matches!(
            db.start_transaction().await,
            Err(Error::Unsupported { .. })
        ));
        assert!(!db.capabilities().transactions);
    }
}
