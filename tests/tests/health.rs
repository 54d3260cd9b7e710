//! Tests for health check endpoints.

use std::sync::Arc;

use axum::http::StatusCode;
use event_store::MemoryEventStore;
use integration_tests::setup::TestContext;
use worker::{WorkerConfig, WorkerScheduler};

/// /health reports the store component
#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "unhealthy",
        "unexpected status '{}'",
        status
    );
    assert_eq!(body["components"][0]["name"], "store");
}

/// Ready once a store probe has succeeded
#[tokio::test]
async fn test_ready_after_store_probe() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let scheduler = WorkerScheduler::new(WorkerConfig::default(), Arc::new(MemoryEventStore::new()));
    scheduler.check_store().await;

    server.get("/health/ready").await.assert_status_ok();

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health/live").await;
    response.assert_status(StatusCode::OK);
}
