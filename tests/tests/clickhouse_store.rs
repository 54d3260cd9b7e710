//! ClickHouse store tests.
//!
//! Require Docker for the ClickHouse testcontainer (or
//! `FOLIO_TEST_CLICKHOUSE_URL`). Run with `cargo test -- --ignored`.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use engine_core::{new_event_id, AnalyticsEvent, EventData, EventType, GeoInfo, HeatmapBatch};
use event_store::clickhouse::{
    check_connection, init_schema, ClickHouseClient, ClickHouseEventStore, ClickHouseHeatmapStore,
};
use event_store::{EventStore, HeatmapStore};
use integration_tests::containers::TestClickHouse;

fn event(session_id: &str, path: &str, age: Duration) -> AnalyticsEvent {
    let mut data = EventData::new();
    data.insert("referrer", serde_json::json!("https://news.example"));

    AnalyticsEvent {
        id: new_event_id(Utc::now()),
        session_id: session_id.to_string(),
        event_type: EventType::Pageview,
        path: path.to_string(),
        timestamp: Utc::now() - age,
        data,
        geo: GeoInfo {
            country: Some("NZ".to_string()),
            ..Default::default()
        },
    }
}

async fn client() -> (TestClickHouse, ClickHouseClient) {
    let ch = TestClickHouse::start().await;
    let client = ClickHouseClient::new(ch.config.clone());
    assert!(check_connection(&client).await, "ClickHouse not reachable");
    init_schema(&client).await.expect("Failed to initialize schema");
    (ch, client)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_events_round_trip_and_ordering() {
    let (_ch, client) = client().await;
    let store = ClickHouseEventStore::new(client);

    let first = event("s1", "/", Duration::minutes(5));
    let second = event("s1", "/about", Duration::minutes(1));
    assert!(store.insert(&first).await.unwrap());
    assert!(store.insert(&second).await.unwrap());

    // Same ID again is ignored
    assert!(!store.insert(&first).await.unwrap());

    let recent = store.recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id);
    assert_eq!(recent[1].id, first.id);

    let fetched = store.get(&first.id).await.unwrap().expect("stored event");
    assert_eq!(fetched.data.get("referrer").unwrap(), "https://news.example");
    assert_eq!(fetched.geo.country.as_deref(), Some("NZ"));

    let window = store
        .since(Utc::now() - Duration::minutes(2), None, 100)
        .await
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].id, second.id);

    let older = store
        .since(Utc::now() - Duration::hours(1), Some(&second.id), 100)
        .await
        .unwrap();
    assert_eq!(older.len(), 1);
    assert_eq!(older[0].id, first.id);

    assert_eq!(store.by_session("s1").await.unwrap().len(), 2);
    assert!(store.by_session("nobody").await.unwrap().is_empty());
    store.ping().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_prune_reports_expired_count() {
    let (_ch, client) = client().await;
    let store = ClickHouseEventStore::new(client);

    store
        .insert(&event("s1", "/", Duration::days(40)))
        .await
        .unwrap();
    store
        .insert(&event("s2", "/", Duration::hours(1)))
        .await
        .unwrap();

    let pruned = store
        .prune_before(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(pruned, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_heatmap_counters_sum_across_batches() {
    let (_ch, client) = client().await;
    let store = ClickHouseHeatmapStore::new(client);

    let batch = |cells: &[(&str, u64)], max_scroll: f64| HeatmapBatch {
        path: "/gallery".to_string(),
        grid: cells
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<HashMap<_, _>>(),
        max_scroll,
        dwell_ms: 1_000,
    };

    assert_eq!(store.merge_batch(&batch(&[("1,1", 2)], 0.55)).await.unwrap(), 1);
    assert_eq!(
        store
            .merge_batch(&batch(&[("1,1", 3), ("0,9", 1)], 0.51))
            .await
            .unwrap(),
        2
    );

    let snapshot = store.snapshot("/gallery").await.unwrap();
    assert_eq!(snapshot.total_sessions, 2);
    assert_eq!(snapshot.cursor_map.len(), 2);
    assert_eq!(snapshot.cursor_map[0].x, 0);
    assert_eq!(snapshot.cursor_map[1].value, 5);
    assert_eq!(snapshot.scroll_map.len(), 1);
    assert_eq!(snapshot.scroll_map[0].depth, 50);
    assert_eq!(snapshot.scroll_map[0].dwell_time, 2_000);

    let empty = store.snapshot("/nowhere").await.unwrap();
    assert_eq!(empty.total_sessions, 0);
    assert!(empty.cursor_map.is_empty());
}
