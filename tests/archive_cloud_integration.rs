//! Cloud store over the REST table backend, against a mock server

use medibot::archive::backend::RestTableBackend;
use medibot::archive::{CloudStore, TranscriptArchive};
use medibot::auth::SessionAuth;
use medibot::config::CloudConfig;
use medibot::error::MedibotError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{sample_transcript, signed_in};

const TABLE_PATH: &str = "/rest/v1/saved_chats";

fn store(server: &MockServer, auth: Arc<SessionAuth>) -> CloudStore {
    let config = CloudConfig {
        url: Some(server.uri()),
        api_key: Some("anon-key".to_string()),
        access_token: None,
        timeout_seconds: 5,
    };
    let backend = RestTableBackend::new(&config, Duration::from_secs(60)).unwrap();
    CloudStore::new(Arc::new(backend), auth, "saved_chats")
}

fn row(id: &str, owner: &str, title: &str, saved_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "owner_id": owner,
        "title": title,
        "saved_at": saved_at,
        "message_count": 1,
        "messages": [
            { "text": "hi", "isUser": true, "timestamp": saved_at }
        ]
    })
}

#[tokio::test]
async fn test_save_posts_owner_stamped_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TABLE_PATH))
        .and(header("apikey", "anon-key"))
        .and(body_partial_json(json!({
            "id": "a",
            "owner_id": "u1",
            "title": "Flu symptoms",
            "message_count": 1
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, signed_in("u1"))
        .save(&sample_transcript("a", "Flu symptoms", 100))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_filters_by_owner_and_skips_bad_rows() {
    let server = MockServer::start().await;
    let mut bad = row("bad", "u1", "Broken", "2025-01-03T00:00:00Z");
    bad["messages"] = json!([{ "text": "no flag", "timestamp": "2025-01-03T00:00:00Z" }]);

    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .and(query_param("owner_id", "eq.u1"))
        .and(query_param("order", "saved_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            bad,
            row("new", "u1", "Back pain", "2025-01-02T00:00:00Z"),
            row("old", "u1", "Flu symptoms", "2025-01-01T00:00:00Z"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let listing = store(&server, signed_in("u1")).list_all().await.unwrap();
    let ids: Vec<_> = listing.transcripts.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
    assert_eq!(listing.failures.len(), 1);
    assert_eq!(listing.failures[0].key, "bad");
}

#[tokio::test]
async fn test_search_uses_ilike() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .and(query_param("title", "ilike.*flu*"))
        .and(query_param("owner_id", "eq.u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(
            "a",
            "u1",
            "Flu symptoms",
            "2025-01-01T00:00:00Z"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let listing = store(&server, signed_in("u1")).search("flu").await.unwrap();
    assert_eq!(listing.len(), 1);
}

#[tokio::test]
async fn test_delete_all_is_one_owner_scoped_request() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(TABLE_PATH))
        .and(query_param("owner_id", "eq.u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "a" },
            { "id": "b" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, signed_in("u1")).delete_all().await.unwrap();
}

#[tokio::test]
async fn test_update_title_patches_only_title() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(TABLE_PATH))
        .and(query_param("id", "eq.a"))
        .and(query_param("owner_id", "eq.u1"))
        .and(wiremock::matchers::body_json(json!({ "title": "Cold" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a" }])))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, signed_in("u1"))
        .update_title("a", "Cold")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_anonymous_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = store(&server, Arc::new(SessionAuth::anonymous()));
    assert!(store.list_all().await.unwrap().is_empty());
    assert!(store.search("flu").await.unwrap().is_empty());
    assert!(matches!(
        store.save(&sample_transcript("a", "Flu", 100)).await,
        Err(MedibotError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_server_errors_map_to_store_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TABLE_PATH))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&server)
        .await;

    let store = store(&server, signed_in("u1"));
    assert!(matches!(
        store.list_all().await,
        Err(MedibotError::StoreRead(_))
    ));
    assert!(matches!(
        store.save(&sample_transcript("a", "Flu", 100)).await,
        Err(MedibotError::StoreWrite(_))
    ));
}
