//! Session grouping.
//!
//! Sessions are never stored. A session exists only because at least one
//! event references its ID, so every summary has `event_count >= 1`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::AnalyticsEvent;

/// Per-session rollup derived from a set of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub event_count: u64,
    pub pageview_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Path of the earliest event
    pub entry_path: String,
}

impl SessionSummary {
    fn start(event: &AnalyticsEvent) -> Self {
        Self {
            session_id: event.session_id.clone(),
            event_count: 0,
            pageview_count: 0,
            first_seen: event.timestamp,
            last_seen: event.timestamp,
            entry_path: event.path.clone(),
        }
    }

    fn record(&mut self, event: &AnalyticsEvent) {
        self.event_count += 1;
        if event.is_pageview() {
            self.pageview_count += 1;
        }
        if event.timestamp < self.first_seen {
            self.first_seen = event.timestamp;
            self.entry_path = event.path.clone();
        }
        if event.timestamp > self.last_seen {
            self.last_seen = event.timestamp;
        }
    }

    /// A session with exactly one recorded event.
    pub fn is_bounce(&self) -> bool {
        self.event_count == 1
    }

    /// Time between first and last event, in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.last_seen - self.first_seen).num_milliseconds()
    }
}

/// Group events by session ID. Output is sorted by `first_seen`, then ID.
pub fn summarize_sessions(events: &[AnalyticsEvent]) -> Vec<SessionSummary> {
    let mut sessions: HashMap<&str, SessionSummary> = HashMap::new();

    for event in events {
        sessions
            .entry(event.session_id.as_str())
            .or_insert_with(|| SessionSummary::start(event))
            .record(event);
    }

    let mut summaries: Vec<SessionSummary> = sessions.into_values().collect();
    summaries.sort_by(|a, b| {
        a.first_seen
            .cmp(&b.first_seen)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    summaries
}
