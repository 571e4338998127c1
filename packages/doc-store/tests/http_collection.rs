use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dotstore_core::{DotPath, Error as StoreError, FindOptions, Query, StorageAdapter};
use dotstore_doc_store::{
    Collection, ConnectionState, DocStoreError, DocumentStoreAdapter, HttpCollection,
    RecordFilter, Update,
};

fn key(s: &str) -> DotPath {
    DotPath::parse(s).unwrap()
}

async fn mount_ping(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/action/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_find_one_sends_filter() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/action/findOne"))
        .and(body_partial_json(json!({
            "collection": "records",
            "filter": {"key": "user"},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document": {"key": "user", "value": {"name": "Ada"}},
        })))
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    let record = records
        .find_one(&RecordFilter::key("user"), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.value, json!({"name": "Ada"}));
}

#[tokio::test]
async fn test_find_one_missing_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/action/findOne"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"document": null})))
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    assert!(records
        .find_one(&RecordFilter::key("nobody"), None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_update_one_sends_update_document() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/action/updateOne"))
        .and(body_partial_json(json!({
            "filter": {"key": "counter"},
            "update": {"$inc": {"value": 2}},
            "upsert": true,
            "session": "s-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matchedCount": 1,
            "modifiedCount": 1,
            "document": {"key": "counter", "value": 7},
        })))
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    let update = Update::Inc {
        path: "value".to_string(),
        amount: json!(2),
    };
    let outcome = records
        .update_one(&RecordFilter::key("counter"), &update, true, Some("s-1"))
        .await
        .unwrap();
    assert!(outcome.matched);
    assert!(outcome.modified);
    assert_eq!(outcome.document.unwrap().value, json!(7));
}

#[tokio::test]
async fn test_type_mismatch_error_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/action/updateOne"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "TypeMismatch",
            "message": "Cannot apply $inc to a value of non-numeric type",
        })))
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    let update = Update::Inc {
        path: "value".to_string(),
        amount: json!(1),
    };
    let err = records
        .update_one(&RecordFilter::key("k"), &update, true, None)
        .await
        .unwrap_err();
    assert!(err.is_type_mismatch());
}

#[tokio::test]
async fn test_server_error_is_remote() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/action/deleteOne"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    match records.delete_one(&RecordFilter::key("k"), None).await {
        Err(DocStoreError::Remote { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_find_sends_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/action/find"))
        .and(body_partial_json(json!({
            "filter": {"value.age": {"$gte": 18}},
            "sort": {"value.age": -1},
            "limit": 2,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [
                {"key": "cem", "value": {"age": 30}},
                {"key": "bea", "value": {"age": 20}},
            ],
        })))
        .mount(&server)
        .await;
    mount_ping(&server).await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    let db = DocumentStoreAdapter::new(Arc::new(records));

    let query = Query::from_value(&json!({"age": {"$gte": 18}})).unwrap();
    let options = FindOptions::from_value(&json!({"sort": {"age": -1}, "limit": 2})).unwrap();
    assert_eq!(
        db.find(&query, &options, None).await.unwrap(),
        vec![json!({"age": 30}), json!({"age": 20})]
    );
    assert_eq!(db.connection_state(), ConnectionState::Ready);
}

#[tokio::test]
async fn test_adapter_add_falls_back_to_set() {
    let server = MockServer::start().await;
    mount_ping(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/action/updateOne"))
        .and(body_partial_json(json!({"update": {"$inc": {"value": 3}}})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "TypeMismatch",
            "message": "value",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/action/updateOne"))
        .and(body_partial_json(json!({"update": {"$set": {"value": 3}}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matchedCount": 1,
            "modifiedCount": 1,
            "document": {"key": "score", "value": 3},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    let db = DocumentStoreAdapter::new(Arc::new(records));
    assert_eq!(db.add(&key("score"), 3.0, None).await.unwrap(), json!(3));
}

#[tokio::test]
async fn test_sessions_round_trip() {
    let server = MockServer::start().await;
    mount_ping(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/action/startSession"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session": "abc"})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/action/commitTransaction"))
        .and(body_partial_json(json!({"session": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/action/abortTransaction"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "NoSuchSession",
            "message": "abc",
        })))
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    let db = DocumentStoreAdapter::new(Arc::new(records));

    let session = db.start_transaction().await.unwrap();
    assert_eq!(session.id(), "abc");
    db.commit_transaction(&session).await.unwrap();
    assert!(matches!(
        db.abort_transaction(&session).await,
        Err(StoreError::Transaction { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_server_fails_connection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/action/ping"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let records = HttpCollection::new(&format!("{}/api", server.uri()), "records").unwrap();
    let db = DocumentStoreAdapter::with_timeout(Arc::new(records), Duration::from_secs(5));

    let err = db.get(&key("a"), None).await.unwrap_err();
    assert!(matches!(err, StoreError::Connection { .. }));
    assert!(matches!(db.connection_state(), ConnectionState::Failed(_)));
}
