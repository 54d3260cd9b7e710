//! Tests for the dashboard endpoints.

use std::sync::Arc;

use api::ApiConfig;
use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, mocks::UnavailableStore, setup::TestContext};

async fn track(server: &TestServer, payload: serde_json::Value) {
    server.post("/api/track").json(&payload).await.assert_status_ok();
}

/// Three pageviews in one session: one visitor, three views, no bounce
#[tokio::test]
async fn test_single_session_scenario() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let session = fixtures::session_id();

    for path in ["/", "/about", "/"] {
        track(&server, fixtures::pageview(&session, path)).await;
    }

    let response = server.get("/api/analytics").add_query_param("range", "1h").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["range"], "1h");
    assert_eq!(body["uniqueVisitors"], 1);
    assert_eq!(body["totalViews"], 3);
    assert_eq!(body["bounceRate"], 0);

    let histogram = body["histogram"].as_array().unwrap();
    let total: u64 = histogram.iter().map(|p| p["value"].as_u64().unwrap()).sum();
    assert_eq!(total, 3);
    assert!(histogram
        .iter()
        .all(|p| p["start"].as_str().is_some() && p["label"].as_str().is_some()));

    let top = body["topPaths"].as_array().unwrap();
    assert_eq!(top[0]["path"], "/");
    assert_eq!(top[0]["views"], 2);
}

/// Two single-event sessions and one two-event session: 67% bounce
#[tokio::test]
async fn test_bounce_rate_and_custom_events() {
    let ctx = TestContext::new();
    let server = ctx.server();

    track(&server, fixtures::pageview("a", "/")).await;
    track(&server, fixtures::pageview("b", "/")).await;
    track(&server, fixtures::pageview("c", "/")).await;
    track(&server, fixtures::track_event("click", "c", "/")).await;

    let body: serde_json::Value = server.get("/api/analytics").await.json();
    assert_eq!(body["range"], "24h");
    assert_eq!(body["uniqueVisitors"], 3);
    assert_eq!(body["totalViews"], 3);
    assert_eq!(body["bounceRate"], 67);
}

#[tokio::test]
async fn test_empty_store_yields_zeros() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let body: serde_json::Value = server
        .get("/api/analytics")
        .add_query_param("range", "30d")
        .add_query_param("offsetMinutes", "-300")
        .await
        .json();

    assert_eq!(body["uniqueVisitors"], 0);
    assert_eq!(body["totalViews"], 0);
    assert_eq!(body["bounceRate"], 0);
    assert!(body["histogram"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_range_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/api/analytics").add_query_param("range", "90d").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");

    let response = server
        .get("/api/analytics")
        .add_query_param("offsetMinutes", "100000")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

/// Raw events come back most-recent-first and honor the limit
#[tokio::test]
async fn test_raw_events_listing() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for path in ["/one", "/two", "/three"] {
        track(&server, fixtures::pageview("s1", path)).await;
    }
    track(&server, fixtures::pageview("s2", "/other")).await;

    let body: serde_json::Value = server
        .get("/api/analytics/events")
        .add_query_param("limit", "2")
        .await
        .json();
    assert_eq!(body["count"], 2);
    assert_eq!(body["events"][0]["path"], "/other");
    assert_eq!(body["events"][1]["path"], "/three");
    assert!(body.get("session").is_none());

    let body: serde_json::Value = server
        .get("/api/analytics/events")
        .add_query_param("sessionId", "s1")
        .await
        .json();
    assert_eq!(body["count"], 3);
    assert!(body["events"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["sessionId"] == "s1"));
}

/// Narrowing to a session also reports its rollup
#[tokio::test]
async fn test_session_listing_includes_summary() {
    let ctx = TestContext::new();
    let server = ctx.server();

    track(&server, fixtures::pageview("s1", "/landing")).await;
    track(&server, fixtures::track_event("click", "s1", "/landing")).await;
    track(&server, fixtures::pageview("s1", "/about")).await;
    track(&server, fixtures::pageview("s2", "/")).await;

    let body: serde_json::Value = server
        .get("/api/analytics/events")
        .add_query_param("sessionId", "s1")
        .add_query_param("limit", "1")
        .await
        .json();
    assert_eq!(body["count"], 1);

    let session = &body["session"];
    assert_eq!(session["sessionId"], "s1");
    assert_eq!(session["eventCount"], 3);
    assert_eq!(session["pageviewCount"], 2);
    assert_eq!(session["entryPath"], "/landing");
    assert_eq!(session["bounced"], false);
    assert!(session["durationMs"].as_i64().unwrap() >= 0);

    let body: serde_json::Value = server
        .get("/api/analytics/events")
        .add_query_param("sessionId", "nobody")
        .await
        .json();
    assert_eq!(body["count"], 0);
    assert!(body.get("session").is_none());
}

#[tokio::test]
async fn test_raw_events_bounded_by_query_limit() {
    let ctx = TestContext::with_config(ApiConfig {
        raw_query_limit: 2,
        ..TestContext::default_config()
    });
    let server = ctx.server();

    for i in 0..5 {
        track(&server, fixtures::pageview("s1", &format!("/p{}", i))).await;
    }

    let body: serde_json::Value = server
        .get("/api/analytics/events")
        .add_query_param("limit", "100")
        .await
        .json();
    assert_eq!(body["count"], 2);
}

/// Metrics cover the whole window even when it spans several store pages
#[tokio::test]
async fn test_metrics_read_past_page_size() {
    let ctx = TestContext::with_config(ApiConfig {
        raw_query_limit: 2,
        ..TestContext::default_config()
    });
    let server = ctx.server();

    for i in 0..5 {
        track(&server, fixtures::pageview(&format!("s{}", i), "/")).await;
    }

    let body: serde_json::Value = server
        .get("/api/analytics")
        .add_query_param("range", "7d")
        .await
        .json();
    assert_eq!(body["totalViews"], 5);
    assert_eq!(body["uniqueVisitors"], 5);
    assert_eq!(body["bounceRate"], 100);
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn test_metrics_flag_truncated_window() {
    let ctx = TestContext::with_config(ApiConfig {
        raw_query_limit: 2,
        window_event_limit: 3,
        ..TestContext::default_config()
    });
    let server = ctx.server();

    for i in 0..5 {
        track(&server, fixtures::pageview(&format!("s{}", i), "/")).await;
    }

    let body: serde_json::Value = server.get("/api/analytics").await.json();
    assert_eq!(body["totalViews"], 3);
    assert_eq!(body["truncated"], true);
}

/// Dashboard routes require the bearer token once one is configured
#[tokio::test]
async fn test_admin_token_guards_dashboard() {
    let ctx = TestContext::with_config(ApiConfig {
        admin_token: Some("s3cret".to_string()),
        ..TestContext::default_config()
    });
    let server = ctx.server();

    for path in ["/api/analytics", "/api/analytics/events", "/api/analytics/stream"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "AUTH_001");
    }

    server
        .get("/api/analytics")
        .add_header("Authorization", "Bearer wrong")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .get("/api/analytics")
        .add_header("Authorization", "Bearer s3cret")
        .await
        .assert_status_ok();

    // Tracking stays public
    server
        .post("/api/track")
        .json(&fixtures::pageview("s1", "/"))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_store_failure_returns_500() {
    let ctx = TestContext::with_event_store(Arc::new(UnavailableStore::new()));
    let server = ctx.server();

    let response = server.get("/api/analytics").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "STORE_001");
}
