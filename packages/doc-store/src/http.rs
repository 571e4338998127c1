//! Collection served by a JSON-over-HTTP data API.
//!
//! Every call is a `POST {base}/action/{name}` whose JSON body names the
//! collection and carries the filter, update and options:
//!
//! ```text
//! POST /action/updateOne
//! {"collection": "records", "filter": {"key": "a"},
//!  "update": {"$inc": {"value": 1}}, "upsert": true, "session": "..."}
//!
//! 200 {"matchedCount": 1, "modifiedCount": 1, "document": {"key": "a", "value": 2}}
//! ```
//!
//! Error responses carry `{"code": "...", "message": "..."}`. The codes
//! `TypeMismatch` and `NoSuchSession` map to the matching [`Error`] variants.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use dotstore_core::{FindOptions, Query};

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::record::{Record, RecordFilter, Update, UpdateOutcome};

/// A remote collection.
///
/// # Example
///
/// ```ignore
/// use dotstore_doc_store::{Collection, HttpCollection, RecordFilter};
///
/// let records = HttpCollection::new("https://data.example.com/api", "records")?;
/// let record = records.find_one(&RecordFilter::key("user"), None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpCollection {
    client: Client,
    base_url: Url,
    collection: String,
}

#[derive(Deserialize)]
struct FindOneResponse {
    document: Option<Record>,
}

#[derive(Deserialize)]
struct FindResponse {
    #[serde(default)]
    documents: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    #[serde(default)]
    matched_count: u64,
    #[serde(default)]
    modified_count: u64,
    #[serde(default)]
    upserted_id: Option<Value>,
    #[serde(default)]
    document: Option<Record>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    #[serde(default)]
    deleted_count: u64,
}

#[derive(Deserialize)]
struct SessionResponse {
    session: String,
}

#[derive(Deserialize)]
struct Ack {}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl HttpCollection {
    pub fn new(base_url: &str, collection: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("{} cannot be used as a base URL", base_url),
            });
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            collection: collection.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn body(&self, session: Option<&str>) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("collection".to_string(), Value::String(self.collection.clone()));
        if let Some(session) = session {
            body.insert("session".to_string(), Value::String(session.to_string()));
        }
        body
    }

    async fn action<T: DeserializeOwned>(&self, name: &str, body: Map<String, Value>) -> Result<T> {
        let url = self.base_url.join(&format!("action/{}", name))?;
        tracing::debug!(%url, collection = %self.collection, "data API request");

        let response = self
            .client
            .post(url)
            .json(&Value::Object(body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let message = if error.message.is_empty() {
                text
            } else {
                error.message
            };
            return Err(match error.code.as_str() {
                "TypeMismatch" => Error::TypeMismatch {
                    operator: "update",
                    path: message,
                    expected: "compatible type",
                },
                "NoSuchSession" => Error::UnknownSession { id: message },
                _ => Error::Remote {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Collection for HttpCollection {
    fn name(&self) -> &str {
        &self.collection
    }

    fn supports_sessions(&self) -> bool {
        true
    }

    async fn ping(&self) -> Result<()> {
        let _: Ack = self.action("ping", self.body(None)).await?;
        Ok(())
    }

    async fn find_one(
        &self,
        filter: &RecordFilter,
        session: Option<&str>,
    ) -> Result<Option<Record>> {
        let mut body = self.body(session);
        body.insert("filter".to_string(), filter.to_value());
        let response: FindOneResponse = self.action("findOne", body).await?;
        Ok(response.document)
    }

    async fn update_one(
        &self,
        filter: &RecordFilter,
        update: &Update,
        upsert: bool,
        session: Option<&str>,
    ) -> Result<UpdateOutcome> {
        let mut body = self.body(session);
        body.insert("filter".to_string(), filter.to_value());
        body.insert("update".to_string(), update.to_value());
        body.insert("upsert".to_string(), Value::Bool(upsert));
        body.insert("returnDocument".to_string(), json!("after"));

        let response: UpdateResponse = self.action("updateOne", body).await?;
        Ok(UpdateOutcome {
            matched: response.matched_count > 0 || response.upserted_id.is_some(),
            modified: response.modified_count > 0 || response.upserted_id.is_some(),
            document: response.document,
        })
    }

    async fn delete_one(&self, filter: &RecordFilter, session: Option<&str>) -> Result<bool> {
        let mut body = self.body(session);
        body.insert("filter".to_string(), filter.to_value());
        let response: DeleteResponse = self.action("deleteOne", body).await?;
        Ok(response.deleted_count > 0)
    }

    async fn delete_many(&self, query: &Query, session: Option<&str>) -> Result<u64> {
        let mut body = self.body(session);
        body.insert("filter".to_string(), query.to_value());
        let response: DeleteResponse = self.action("deleteMany", body).await?;
        Ok(response.deleted_count)
    }

    async fn find(
        &self,
        query: &Query,
        options: &FindOptions,
        session: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut body = self.body(session);
        body.insert("filter".to_string(), query.to_value());
        if let Some(sort) = options.sort_value() {
            body.insert("sort".to_string(), sort);
        }
        if let Some(projection) = options.projection_value() {
            body.insert("projection".to_string(), projection);
        }
        if options.skip > 0 {
            body.insert("skip".to_string(), json!(options.skip));
        }
        if let Some(limit) = options.limit.filter(|l| *l > 0) {
            body.insert("limit".to_string(), json!(limit));
        }

        let response: FindResponse = self.action("find", body).await?;
        Ok(response.documents)
    }

    async fn start_session(&self) -> Result<String> {
        let response: SessionResponse = self.action("startSession", self.body(None)).await?;
        Ok(response.session)
    }

    async fn commit_session(&self, session: &str) -> Result<()> {
        let _: Ack = self
            .action("commitTransaction", self.body(Some(session)))
            .await?;
        Ok(())
    }

    async fn abort_session(&self, session: &str) -> Result<()> {
        let _: Ack = self
            .action("abortTransaction", self.body(Some(session)))
            .await?;
        Ok(())
    }
}
