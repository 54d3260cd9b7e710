//! End-to-end tests for the live dashboard stream.
//!
//! SSE responses never complete, so these run against a real listener and
//! read the body chunk by chunk.

use std::time::Duration;

use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;
use worker::StreamConfig;

/// Upper bound on waiting for any single frame.
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimal `text/event-stream` reader: yields `(event, data)` pairs and
/// skips comment-only blocks (keep-alives).
struct FrameReader {
    response: reqwest::Response,
    buffer: String,
}

impl FrameReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
        }
    }

    async fn next_frame(&mut self) -> (String, Value) {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                let mut name = None;
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        name = Some(value.trim().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push_str(value.trim_start());
                    }
                }
                if let Some(name) = name {
                    return (name, serde_json::from_str(&data).expect("frame data is JSON"));
                }
                continue;
            }

            let chunk = self
                .response
                .chunk()
                .await
                .expect("stream read failed")
                .expect("stream ended early");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    async fn expect_frame(&mut self) -> (String, Value) {
        tokio::time::timeout(FRAME_TIMEOUT, self.next_frame())
            .await
            .expect("timed out waiting for a frame")
    }
}

fn fast_polling() -> StreamConfig {
    StreamConfig {
        poll_interval_ms: 50,
        ..Default::default()
    }
}

/// Track one event, see `connected` with the empty window, then exactly one
/// `update` carrying that event and nothing after it
#[tokio::test]
async fn test_tracked_event_arrives_as_single_update() {
    let ctx = TestContext::with_stream_config(fast_polling());
    let addr = ctx.serve().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{}/api/analytics/stream", addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    let mut frames = FrameReader::new(response);

    let (name, connected) = frames.expect_frame().await;
    assert_eq!(name, "connected");
    assert_eq!(connected["type"], "connected");
    assert!(connected["events"].as_array().unwrap().is_empty());

    let session = fixtures::session_id();
    let tracked: Value = client
        .post(format!("http://{}/api/track", addr))
        .json(&fixtures::pageview(&session, "/gallery"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tracked["success"], true);

    let (name, update) = frames.expect_frame().await;
    assert_eq!(name, "update");
    assert_eq!(update["type"], "update");
    let events = update["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], tracked["id"]);
    assert_eq!(events[0]["sessionId"], session.as_str());
    assert_eq!(events[0]["path"], "/gallery");

    // Unchanged polls send nothing
    let idle = tokio::time::timeout(Duration::from_millis(300), frames.next_frame()).await;
    assert!(idle.is_err(), "unexpected frame: {:?}", idle.ok());
}

/// Events already stored when the stream opens arrive in `connected`, not
/// as an update
#[tokio::test]
async fn test_existing_events_arrive_in_connected_frame() {
    let ctx = TestContext::with_stream_config(fast_polling());
    let addr = ctx.serve().await;
    let client = reqwest::Client::new();

    for path in ["/one", "/two"] {
        let status = client
            .post(format!("http://{}/api/track", addr))
            .json(&fixtures::pageview("s1", path))
            .send()
            .await
            .unwrap()
            .status();
        assert!(status.is_success());
    }

    let response = client
        .get(format!("http://{}/api/analytics/stream", addr))
        .send()
        .await
        .unwrap();
    let mut frames = FrameReader::new(response);

    let (name, connected) = frames.expect_frame().await;
    assert_eq!(name, "connected");
    let events = connected["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["path"], "/two");
    assert_eq!(events[1]["path"], "/one");

    let idle = tokio::time::timeout(Duration::from_millis(300), frames.next_frame()).await;
    assert!(idle.is_err(), "unexpected frame: {:?}", idle.ok());
}
