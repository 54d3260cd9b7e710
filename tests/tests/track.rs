//! Tests for the tracking endpoint.

use std::sync::Arc;

use api::{ApiConfig, RateLimitConfig};
use axum::http::StatusCode;
use event_store::EventStore;
use integration_tests::{fixtures, mocks::UnavailableStore, setup::TestContext};

/// A valid event is stored with edge geo and device enrichment
#[tokio::test]
async fn test_track_stores_enriched_event() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let session = fixtures::session_id();

    let response = server
        .post("/api/track")
        .add_header("User-Agent", fixtures::CHROME_UA)
        .add_header("X-Geo-Country", "NZ")
        .add_header("X-Vercel-IP-City", "Auckland")
        .json(&fixtures::pageview(&session, "/photos/42"))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    let id = body["id"].as_str().expect("id in response").to_string();

    let stored = ctx.events.get(&id).await.unwrap().expect("event stored");
    assert_eq!(stored.session_id, session);
    assert_eq!(stored.path, "/photos/42");
    assert!(stored.is_pageview());
    assert_eq!(stored.geo.country.as_deref(), Some("NZ"));
    assert_eq!(stored.geo.city.as_deref(), Some("Auckland"));
    assert_eq!(stored.data.get("geo").unwrap()["country"], "NZ");
    assert_eq!(stored.data.get("device").unwrap()["category"], "desktop");
}

/// sendBeacon posts text/plain; the body is still parsed as JSON
#[tokio::test]
async fn test_track_accepts_text_plain_beacon() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let payload = serde_json::json!({
        "type": "click",
        "sessionId": fixtures::session_id(),
        "url": "https://folio.example/gallery/tokyo?ref=home#top",
        "data": {"target": "next"}
    });

    let response = server.post("/api/track").text(payload.to_string()).await;

    response.assert_status_ok();
    let events = ctx.events.recent(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "/gallery/tokyo");
    assert_eq!(events[0].data.get("target").unwrap(), "next");
}

/// Missing sessionId is rejected before anything is stored
#[tokio::test]
async fn test_missing_session_id_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .json(&serde_json::json!({"type": "pageview", "path": "/"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
    assert!(ctx.events.is_empty());
}

#[tokio::test]
async fn test_blank_type_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .json(&fixtures::track_event("   ", &fixtures::session_id(), "/"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(ctx.events.is_empty());
}

#[tokio::test]
async fn test_invalid_json_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/api/track").text("{not json").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.post("/api/track").text("[1, 2, 3]").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
}

/// Non-object data payloads are rejected
#[tokio::test]
async fn test_non_object_data_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .json(&serde_json::json!({
            "type": "custom",
            "sessionId": fixtures::session_id(),
            "data": [1, 2, 3]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(ctx.events.is_empty());
}

#[tokio::test]
async fn test_oversized_body_returns_413() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let payload = serde_json::json!({
        "type": "custom",
        "sessionId": fixtures::session_id(),
        "data": {"blob": "x".repeat(70_000)}
    });

    let response = server.post("/api/track").json(&payload).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_002");
    assert!(ctx.events.is_empty());
}

/// Store failures surface as STORE_001 without leaking driver details
#[tokio::test]
async fn test_store_failure_returns_500() {
    let store = Arc::new(UnavailableStore::new());
    let ctx = TestContext::with_event_store(store.clone());
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .json(&fixtures::pageview(&fixtures::session_id(), "/"))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "STORE_001");
    assert!(!body["error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(store.calls(), 1, "no internal retry");
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let ctx = TestContext::with_config(ApiConfig {
        rate_limit: RateLimitConfig {
            enabled: true,
            rate: 1,
            burst: 2,
        },
        ..TestContext::default_config()
    });
    let server = ctx.server();
    let session = fixtures::session_id();

    for _ in 0..2 {
        server
            .post("/api/track")
            .add_header("X-Forwarded-For", "203.0.113.7")
            .json(&fixtures::pageview(&session, "/"))
            .await
            .assert_status_ok();
    }

    let response = server
        .post("/api/track")
        .add_header("X-Forwarded-For", "203.0.113.7")
        .json(&fixtures::pageview(&session, "/"))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "RATE_001");
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(ctx.events.len(), 2);

    // Another client still has its own budget
    server
        .post("/api/track")
        .add_header("X-Forwarded-For", "198.51.100.1")
        .json(&fixtures::pageview(&session, "/"))
        .await
        .assert_status_ok();
}
