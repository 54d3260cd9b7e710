//! Tests for the heatmap endpoints.

use integration_tests::{fixtures, setup::TestContext};

/// Batches accumulate per cell and per scroll bucket
#[tokio::test]
async fn test_batches_merge_into_snapshot() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/api/heatmap")
        .json(&fixtures::heatmap_batch(
            "/gallery",
            &[("1,2", 3), ("4,5", 1)],
            0.42,
            1_500,
        ))
        .await
        .assert_status_ok();
    server
        .post("/api/heatmap")
        .json(&fixtures::heatmap_batch("/gallery", &[("1,2", 2)], 0.47, 500))
        .await
        .assert_status_ok();

    let body: serde_json::Value = server
        .get("/api/heatmap")
        .add_query_param("path", "/gallery")
        .await
        .json();

    assert_eq!(body["path"], "/gallery");
    assert_eq!(body["totalSessions"], 2);
    assert_eq!(
        body["cursorMap"],
        serde_json::json!([
            {"x": 1, "y": 2, "value": 5},
            {"x": 4, "y": 5, "value": 1}
        ])
    );
    assert_eq!(
        body["scrollMap"],
        serde_json::json!([{"depth": 40, "count": 2, "dwellTime": 2000}])
    );
}

/// Bad keys and zero counts are skipped; the request still succeeds
#[tokio::test]
async fn test_malformed_cells_are_skipped() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/heatmap")
        .json(&fixtures::heatmap_batch(
            "/about",
            &[("oops", 9), ("2,2", 0), ("3,-1", 4)],
            1.0,
            0,
        ))
        .await;
    response.assert_status_ok();
    let ack: serde_json::Value = response.json();
    assert_eq!(ack, serde_json::json!({"success": true}));

    let body: serde_json::Value = server
        .get("/api/heatmap")
        .add_query_param("path", "/about")
        .await
        .json();
    assert_eq!(
        body["cursorMap"],
        serde_json::json!([{"x": 3, "y": -1, "value": 4}])
    );
    assert_eq!(body["scrollMap"][0]["depth"], 100);
}

/// Heatmap ingestion never reports failure to the browser
#[tokio::test]
async fn test_garbage_body_still_acknowledged() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/api/heatmap").text("not a batch").await;
    response.assert_status_ok();
    let ack: serde_json::Value = response.json();
    assert_eq!(ack["success"], true);
}

/// Query strings in the batch path are normalized away
#[tokio::test]
async fn test_paths_are_normalized() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/api/heatmap")
        .json(&fixtures::heatmap_batch("/photos?page=2", &[("0,0", 1)], 0.0, 10))
        .await
        .assert_status_ok();

    let body: serde_json::Value = server
        .get("/api/heatmap")
        .add_query_param("path", "/photos")
        .await
        .json();
    assert_eq!(body["cursorMap"][0]["value"], 1);
}

#[tokio::test]
async fn test_unknown_path_is_empty_snapshot() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/api/heatmap").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["path"], "/");
    assert_eq!(body["totalSessions"], 0);
    assert!(body["cursorMap"].as_array().unwrap().is_empty());
    assert!(body["scrollMap"].as_array().unwrap().is_empty());
}
