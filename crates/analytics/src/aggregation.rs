//! Aggregation engine.
//!
//! Everything here is a pure function of the event slice it is given.
//! Results are recomputed per request and never cached.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, FixedOffset, Utc};
use engine_core::{summarize_sessions, AnalyticsEvent, TimeRange};
use serde::{Deserialize, Serialize};

/// One histogram bar.
///
/// `label` is for display and may repeat inside a window (the same hour of
/// two different days in a 24h range); `start` identifies the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramPoint {
    pub label: String,
    /// Bucket start in the requested offset
    pub start: DateTime<FixedOffset>,
    pub value: u64,
}

/// Dashboard summary for one time range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub unique_visitors: u64,
    pub total_views: u64,
    /// 0..=100
    pub bounce_rate: u8,
    /// Chronological, sparse: buckets without events are omitted
    pub histogram: Vec<HistogramPoint>,
}

/// Pageviews for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCount {
    pub path: String,
    pub views: u64,
}

/// Keeps events with `timestamp >= now - range`.
pub fn filter_window(
    events: &[AnalyticsEvent],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Vec<AnalyticsEvent> {
    let start = range.window_start(now);
    events
        .iter()
        .filter(|e| e.timestamp >= start)
        .cloned()
        .collect()
}

/// Summarizes an already-filtered event window.
///
/// Histogram buckets are labelled in `offset`, never in the host's local
/// zone, so the same input always yields the same labels.
pub fn aggregate(
    events: &[AnalyticsEvent],
    range: TimeRange,
    offset: FixedOffset,
) -> AggregatedMetrics {
    if events.is_empty() {
        return AggregatedMetrics::default();
    }

    let unique_visitors = events
        .iter()
        .map(|e| e.session_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;
    let total_views = events.iter().filter(|e| e.is_pageview()).count() as u64;

    AggregatedMetrics {
        unique_visitors,
        total_views,
        bounce_rate: bounce_rate(events),
        histogram: histogram(events, range, offset),
    }
}

/// Percentage of sessions with exactly one event, rounded.
pub fn bounce_rate(events: &[AnalyticsEvent]) -> u8 {
    let sessions = summarize_sessions(events);
    if sessions.is_empty() {
        return 0;
    }
    let bounced = sessions.iter().filter(|s| s.is_bounce()).count();
    (bounced as f64 / sessions.len() as f64 * 100.0).round() as u8
}

fn histogram(
    events: &[AnalyticsEvent],
    range: TimeRange,
    offset: FixedOffset,
) -> Vec<HistogramPoint> {
    let granularity = range.granularity();

    // Keyed by bucket start so ordering is chronological, not lexical
    let mut buckets: BTreeMap<DateTime<FixedOffset>, u64> = BTreeMap::new();
    for event in events {
        *buckets
            .entry(granularity.bucket_start(event.timestamp, offset))
            .or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(start, value)| HistogramPoint {
            label: granularity.label(start),
            start,
            value,
        })
        .collect()
}

/// Most viewed paths, descending by views then ascending by path.
pub fn top_paths(events: &[AnalyticsEvent], n: usize) -> Vec<PathCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in events.iter().filter(|e| e.is_pageview()) {
        *counts.entry(event.path.as_str()).or_insert(0) += 1;
    }

    let mut paths: Vec<PathCount> = counts
        .into_iter()
        .map(|(path, views)| PathCount {
            path: path.to_string(),
            views,
        })
        .collect();
    paths.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.path.cmp(&b.path)));
    paths.truncate(n);
    paths
}
