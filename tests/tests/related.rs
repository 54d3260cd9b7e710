//! Tests for the related-content endpoint.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};

#[tokio::test]
async fn test_related_ranks_by_similarity() {
    let ctx = TestContext::new();
    ctx.seed_catalog(fixtures::sample_catalog());
    let server = ctx.server();

    let response = server.get("/api/related/sunset").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["id"], "sunset");
    let ids: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();

    // Other models and missing embeddings never rank
    assert_eq!(ids, vec!["dusk", "dawn", "forest"]);

    let scores: Vec<f64> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert!(scores[2].abs() < 1e-9);
}

#[tokio::test]
async fn test_k_limits_results() {
    let ctx = TestContext::new();
    ctx.seed_catalog(fixtures::sample_catalog());
    let server = ctx.server();

    let body: serde_json::Value = server
        .get("/api/related/sunset")
        .add_query_param("k", "1")
        .await
        .json();
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["id"], "dusk");
}

#[tokio::test]
async fn test_target_without_embedding_is_empty() {
    let ctx = TestContext::new();
    ctx.seed_catalog(fixtures::sample_catalog());
    let server = ctx.server();

    let response = server.get("/api/related/zine").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_target_returns_404() {
    let ctx = TestContext::new();
    ctx.seed_catalog(fixtures::sample_catalog());
    let server = ctx.server();

    let response = server.get("/api/related/missing").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

/// A component past the f32 range loads as infinity and must not rank
#[tokio::test]
async fn test_out_of_range_embedding_never_ranks() {
    let ctx = TestContext::new();
    let items: Vec<engine_core::ContentItem> = serde_json::from_str(
        r#"[
            {"id": "target", "kind": "photo", "embedding": {"model": "clip-vit-b32", "values": [1.0, 1.0]}},
            {"id": "good", "kind": "photo", "embedding": {"model": "clip-vit-b32", "values": [2.0, 2.0]}},
            {"id": "huge", "kind": "photo", "embedding": {"model": "clip-vit-b32", "values": [1e39, 1.0]}}
        ]"#,
    )
    .unwrap();
    ctx.seed_catalog(items);
    let server = ctx.server();

    let body: serde_json::Value = server.get("/api/related/target").await.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "good");
    assert!(items[0]["score"].is_f64());
}
