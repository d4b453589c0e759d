use chrono::{Duration as ChronoDuration, Utc};
use roost_sync::{BulkLoader, Collection, RecordSource, RestBackend, RestConfig, Session, SessionProvider, SyncError};
use roost_types::{Bird, UserId};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> RestBackend {
    RestBackend::new(RestConfig {
        base_url: format!("{}/", server.uri()),
        api_key: "anon-key".to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn session(token: &str) -> Session {
    Session::new(token, Some("refresh-1".into()), None)
}

// ── Fetch ───────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_all_sends_filter_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/birds"))
        .and(query_param("select", "*"))
        .and(query_param("user_id", "eq.u1"))
        .and(query_param("order", "created_at.desc"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "B", "name": "Rio" },
            { "id": "A", "name": "Skye" },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = backend(&server)
        .fetch_all("birds", &UserId::new("u1"), &session("token-1"))
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "B");
}

#[tokio::test]
async fn fetch_unauthorized_is_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/birds"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = backend(&server)
        .fetch_all("birds", &UserId::new("u1"), &session("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::AuthExpired(_)));
}

#[tokio::test]
async fn fetch_server_error_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/birds"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .fetch_all("birds", &UserId::new("u1"), &session("t"))
        .await
        .unwrap_err();
    match err {
        SyncError::Fetch(msg) => assert!(msg.contains("boom")),
        other => panic!("expected Fetch, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_non_array_body_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/birds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .fetch_all("birds", &UserId::new("u1"), &session("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Fetch(_)));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let backend = RestBackend::new(RestConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        request_timeout_secs: 2,
        ..Default::default()
    })
    .unwrap();

    let err = backend
        .fetch_all("birds", &UserId::new("u1"), &session("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
}

// ── Session refresh ─────────────────────────────────────────────

#[tokio::test]
async fn no_session_by_default() {
    let server = MockServer::start().await;
    assert!(backend(&server).current().await.is_none());
}

#[tokio::test]
async fn refresh_exchanges_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(header("apikey", "anon-key"))
        .and(body_json(json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-2",
            "refresh_token": "refresh-2",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server);
    backend.set_session(Some(session("token-1"))).await;

    let refreshed = backend.refresh().await.unwrap();
    assert_eq!(refreshed.access_token, "token-2");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-2"));
    assert!(refreshed.expires_at.unwrap() > Utc::now() + ChronoDuration::minutes(59));
    assert_eq!(backend.current().await, Some(refreshed));
}

#[tokio::test]
async fn refresh_keeps_old_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-2",
            "expires_at": 4_102_444_800i64,
        })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    backend.set_session(Some(session("token-1"))).await;

    let refreshed = backend.refresh().await.unwrap();
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(refreshed.expires_at.unwrap().timestamp(), 4_102_444_800);
}

#[tokio::test]
async fn rejected_refresh_is_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
        })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    backend.set_session(Some(session("token-1"))).await;

    let err = backend.refresh().await.unwrap_err();
    assert!(matches!(err, SyncError::AuthExpired(_)));
}

#[tokio::test]
async fn refresh_without_refresh_token_fails_fast() {
    let server = MockServer::start().await;
    let backend = backend(&server);
    backend.set_session(Some(Session::new("token-1", None, None))).await;

    let err = backend.refresh().await.unwrap_err();
    assert!(matches!(err, SyncError::AuthExpired(_)));
}

// ── Loader over HTTP ────────────────────────────────────────────

#[tokio::test]
async fn loader_refreshes_expired_session_before_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-2",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/birds"))
        .and(header("authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "A", "name": "Skye", "gender": "male" },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(backend(&server));
    backend
        .set_session(Some(Session::new(
            "token-1",
            Some("refresh-1".into()),
            Some(Utc::now() - ChronoDuration::minutes(5)),
        )))
        .await;

    let loader: BulkLoader<Bird> = BulkLoader::new(backend.clone(), backend);
    let birds = loader.load(&UserId::new("u1"), &Collection::new()).await.unwrap();
    assert_eq!(birds.len(), 1);
    assert_eq!(birds[0].name, "Skye");
}
