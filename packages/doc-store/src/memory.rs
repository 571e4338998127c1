//! In-process collection with snapshot sessions.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use dotstore_core::{access, arith, query, Document, FindOptions, Query, Value};

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::record::{Record, RecordFilter, Update, UpdateOutcome};

/// A session's private copy of the records and the keys it wrote.
struct Workspace {
    records: Vec<Record>,
    touched: HashSet<String>,
}

#[derive(Default)]
struct State {
    records: Vec<Record>,
    sessions: HashMap<String, Workspace>,
}

impl State {
    fn records_mut(&mut self, session: Option<&str>) -> Result<&mut Vec<Record>> {
        match session {
            None => Ok(&mut self.records),
            Some(id) => self
                .sessions
                .get_mut(id)
                .map(|workspace| &mut workspace.records)
                .ok_or_else(|| Error::UnknownSession { id: id.to_string() }),
        }
    }

    fn touch(&mut self, session: Option<&str>, keys: impl IntoIterator<Item = String>) {
        if let Some(workspace) = session.and_then(|id| self.sessions.get_mut(id)) {
            workspace.touched.extend(keys);
        }
    }

    /// Copy the final state of every key `workspace` wrote into the shared
    /// records. Keys the session never wrote keep their shared state.
    fn merge(&mut self, workspace: Workspace) {
        let Workspace { records, touched } = workspace;
        for key in touched {
            let committed = records.iter().find(|r| r.key == key).cloned();
            let position = self.records.iter().position(|r| r.key == key);
            match (position, committed) {
                (Some(i), Some(record)) => self.records[i] = record,
                (None, Some(record)) => self.records.push(record),
                (Some(i), None) => {
                    self.records.remove(i);
                }
                (None, None) => {}
            }
        }
    }
}

/// Records kept in memory, in insertion order.
///
/// A session works on a private copy of the records. Committing writes back
/// only the records the session touched, so concurrent writes outside the
/// session survive; on a key written both ways the session wins. Aborting
/// drops the copy.
pub struct MemoryCollection {
    name: String,
    state: Mutex<State>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| Error::Poisoned)
    }
}

fn as_document(record: &Record) -> Document {
    let mut document = Document::new();
    document.insert("key".to_string(), Value::String(record.key.clone()));
    document.insert("value".to_string(), record.value.clone());
    document
}

fn from_document(mut document: Document) -> Record {
    let key = match document.remove("key") {
        Some(Value::String(key)) => key,
        _ => String::new(),
    };
    Record {
        key,
        value: document.remove("value").unwrap_or(Value::Null),
    }
}

/// Apply one update operator to a record document.
fn apply(update: &Update, document: &mut Document) -> Result<()> {
    let path = update.path();
    let segments: Vec<&str> = path.split('.').collect();
    let current = access::get_in(document, &segments);

    let next = match update {
        Update::Set { value, .. } => value.clone(),
        Update::Unset { .. } => {
            access::remove(document, path);
            return Ok(());
        }
        Update::Inc { amount, .. } => match current {
            None | Some(Value::Number(_)) => {
                let amount = amount.as_f64().ok_or(Error::TypeMismatch {
                    operator: "$inc",
                    path: path.to_string(),
                    expected: "numeric amount",
                })?;
                arith::add(current, amount)
            }
            Some(_) => {
                return Err(Error::TypeMismatch {
                    operator: "$inc",
                    path: path.to_string(),
                    expected: "number",
                })
            }
        },
        Update::Push { element, .. } => match current {
            None => Value::Array(vec![element.clone()]),
            Some(Value::Array(list)) => {
                let mut list = list.clone();
                list.push(element.clone());
                Value::Array(list)
            }
            Some(_) => {
                return Err(Error::TypeMismatch {
                    operator: "$push",
                    path: path.to_string(),
                    expected: "array",
                })
            }
        },
        Update::Pull { element, .. } => match current {
            None => return Ok(()),
            Some(Value::Array(list)) => {
                Value::Array(list.iter().filter(|v| *v != element).cloned().collect())
            }
            Some(_) => {
                return Err(Error::TypeMismatch {
                    operator: "$pull",
                    path: path.to_string(),
                    expected: "array",
                })
            }
        },
    };

    if !access::set(path, next, document) {
        return Err(Error::TypeMismatch {
            operator: update.operator(),
            path: path.to_string(),
            expected: "addressable path",
        });
    }
    Ok(())
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn find_one(
        &self,
        filter: &RecordFilter,
        session: Option<&str>,
    ) -> Result<Option<Record>> {
        let mut state = self.lock()?;
        let records = state.records_mut(session)?;
        Ok(records
            .iter()
            .find(|r| filter.matches(&r.to_value()))
            .cloned())
    }

    async fn update_one(
        &self,
        filter: &RecordFilter,
        update: &Update,
        upsert: bool,
        session: Option<&str>,
    ) -> Result<UpdateOutcome> {
        let mut state = self.lock()?;
        let records = state.records_mut(session)?;

        let position = records.iter().position(|r| filter.matches(&r.to_value()));
        let (mut document, position) = match position {
            Some(i) => (as_document(&records[i]), Some(i)),
            None if upsert => (as_document(&Record::new(filter.key.clone(), Value::Null)), None),
            None => return Ok(UpdateOutcome::default()),
        };
        if position.is_none() {
            document.remove("value");
        }

        let before = document.clone();
        apply(update, &mut document)?;
        let modified = document != before;
        let record = from_document(document);

        match position {
            Some(i) => records[i] = record.clone(),
            None => records.push(record.clone()),
        }
        state.touch(session, [filter.key.clone()]);

        Ok(UpdateOutcome {
            matched: true,
            modified,
            document: Some(record),
        })
    }

    async fn delete_one(&self, filter: &RecordFilter, session: Option<&str>) -> Result<bool> {
        let mut state = self.lock()?;
        let records = state.records_mut(session)?;
        match records.iter().position(|r| filter.matches(&r.to_value())) {
            Some(i) => {
                let removed = records.remove(i);
                state.touch(session, [removed.key]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, query: &Query, session: Option<&str>) -> Result<u64> {
        let mut state = self.lock()?;
        let records = state.records_mut(session)?;
        let (removed, kept): (Vec<Record>, Vec<Record>) = std::mem::take(records)
            .into_iter()
            .partition(|r| query.matches(&r.to_value()));
        *records = kept;
        let deleted = removed.len() as u64;
        state.touch(session, removed.into_iter().map(|r| r.key));
        Ok(deleted)
    }

    async fn find(
        &self,
        query: &Query,
        options: &FindOptions,
        session: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut state = self.lock()?;
        let records = state.records_mut(session)?;
        let candidates = Value::Array(records.iter().map(Record::to_value).collect());
        Ok(query::find(&candidates, query, options))
    }

    async fn start_session(&self) -> Result<String> {
        let mut state = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        let workspace = Workspace {
            records: state.records.clone(),
            touched: HashSet::new(),
        };
        state.sessions.insert(id.clone(), workspace);
        tracing::debug!(collection = %self.name, session = %id, "session started");
        Ok(id)
    }

    async fn commit_session(&self, session: &str) -> Result<()> {
        let mut state = self.lock()?;
        let workspace = state
            .sessions
            .remove(session)
            .ok_or_else(|| Error::UnknownSession {
                id: session.to_string(),
            })?;
        state.merge(workspace);
        tracing::debug!(collection = %self.name, session, "session committed");
        Ok(())
    }

    async fn abort_session(&self, session: &str) -> Result<()> {
        let mut state = self.lock()?;
        state
            .sessions
            .remove(session)
            .ok_or_else(|| Error::UnknownSession {
                id: session.to_string(),
            })?;
        tracing::debug!(collection = %self.name, session, "session aborted");
        Ok(())
    }
}
