//! Dashboard read endpoints.

use std::time::Instant;

use analytics::{aggregate, filter_window, top_paths};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use engine_core::{summarize_sessions, AnalyticsEvent, Error, TimeRange};
use serde::Deserialize;
use telemetry::metrics;
use tracing::{debug, warn};

use crate::response::{AnalyticsResponse, ApiError, EventsResponse, SessionView};
use crate::state::AppState;

/// Paths listed alongside the summary.
const TOP_PATHS: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub range: Option<String>,
    /// Minutes east of UTC used for histogram labels
    pub offset_minutes: Option<i32>,
}

/// GET /api/analytics?range=24h - Aggregated metrics for a window.
pub async fn metrics_handler(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let range = match query.range.as_deref() {
        Some(r) => r.parse::<TimeRange>()?,
        None => TimeRange::default(),
    };
    let offset = parse_offset(query.offset_minutes)?;

    let now = Utc::now();
    let (events, truncated) = read_window(&state, range.window_start(now)).await?;

    let window = filter_window(&events, range, now);
    debug!(range = %range, events = window.len(), truncated, "Aggregating dashboard window");
    if truncated {
        warn!(
            range = %range,
            limit = state.config.window_event_limit,
            "Dashboard window exceeds the aggregation limit; oldest events skipped"
        );
    }

    Ok(Json(AnalyticsResponse {
        range: range.to_string(),
        metrics: aggregate(&window, range, offset),
        top_paths: top_paths(&window, TOP_PATHS),
        truncated,
    }))
}

/// Reads every event since `from`, one `raw_query_limit` page at a time.
/// Returns `true` alongside the events when `window_event_limit` cut the
/// read short.
async fn read_window(
    state: &AppState,
    from: DateTime<Utc>,
) -> Result<(Vec<AnalyticsEvent>, bool), Error> {
    let page_size = state.config.raw_query_limit.max(1);
    let max = state.config.window_event_limit.max(1);
    let mut events: Vec<AnalyticsEvent> = Vec::new();

    loop {
        let before = events.last().map(|e| e.id.clone());
        let start = Instant::now();
        let page = state.events.since(from, before.as_deref(), page_size).await?;
        metrics()
            .store_read_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        let exhausted = page.len() < page_size;
        events.extend(page);

        if events.len() > max {
            events.truncate(max);
            return Ok((events, true));
        }
        if exhausted {
            return Ok((events, false));
        }
    }
}

fn parse_offset(minutes: Option<i32>) -> Result<FixedOffset, Error> {
    let minutes = minutes.unwrap_or(0);
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::validation(format!("offsetMinutes {} is out of range", minutes)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub limit: Option<usize>,
    pub session_id: Option<String>,
}

/// GET /api/analytics/events - Raw retained events, most-recent-first.
pub async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let cap = state.config.raw_query_limit;
    let limit = query.limit.unwrap_or(cap).min(cap);

    let (mut events, session) = match query.session_id.as_deref().filter(|s| !s.is_empty()) {
        Some(session_id) => {
            let events = state.events.by_session(session_id).await?;
            // Summarized before the listing is capped
            let session = summarize_sessions(&events)
                .into_iter()
                .next()
                .map(SessionView::from);
            (events, session)
        }
        None => (state.events.recent(limit).await?, None),
    };
    events.truncate(limit);

    Ok(Json(EventsResponse {
        count: events.len(),
        events,
        session,
    }))
}
