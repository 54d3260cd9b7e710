//! Live dashboard stream (Server-Sent Events).

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};
use worker::StreamFrame;

use crate::state::AppState;

/// GET /api/analytics/stream - `connected`, `update` and `resync` frames.
///
/// The subscription lives inside the response stream, so a client
/// disconnect drops it and stops the polling task.
pub async fn stream_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.subscribers.subscribe();
    info!(
        subscriber = subscription.id(),
        active = state.subscribers.active_count(),
        "Dashboard stream opened"
    );

    let events = subscription.filter_map(|frame| frame_event(&frame).map(Ok));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// SSE event named after the frame type, carrying the frame as JSON.
pub fn frame_event(frame: &StreamFrame) -> Option<Event> {
    match Event::default().event(frame.kind.as_str()).json_data(frame) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, kind = frame.kind.as_str(), "Failed to encode stream frame");
            None
        }
    }
}
