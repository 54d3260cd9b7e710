//! In-process metrics.
//!
//! Lock-free counters and fixed-bucket histograms. The scheduler logs a
//! snapshot every minute.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Gauge that can go up or down. Never underflows.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Millisecond latency histogram.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds: 1, 5, 10, 25, 50, 100, 250, 500, 1000ms, then overflow
    buckets: [AtomicU64; 10],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 9] = [1, 5, 10, 25, 50, 100, 250, 500, 1000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// Bucket counts as `(upper_bound, count)`; overflow uses `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Metrics for the telemetry engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub events_received: Counter,
    pub events_rejected: Counter,
    pub events_stored: Counter,
    pub store_errors: Counter,
    pub rate_limited_requests: Counter,

    // Heatmaps
    pub heatmap_batches_merged: Counter,
    pub heatmap_cells_merged: Counter,

    // Streaming
    pub stream_frames_sent: Counter,
    pub stream_poll_errors: Counter,
    pub stream_resyncs: Counter,
    pub active_subscribers: Gauge,

    // Retention
    pub events_pruned: Counter,

    // Latency
    pub ingest_latency_ms: Histogram,
    pub store_read_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_received: self.events_received.get(),
            events_rejected: self.events_rejected.get(),
            events_stored: self.events_stored.get(),
            store_errors: self.store_errors.get(),
            rate_limited_requests: self.rate_limited_requests.get(),
            heatmap_batches_merged: self.heatmap_batches_merged.get(),
            stream_frames_sent: self.stream_frames_sent.get(),
            stream_poll_errors: self.stream_poll_errors.get(),
            stream_resyncs: self.stream_resyncs.get(),
            active_subscribers: self.active_subscribers.get(),
            events_pruned: self.events_pruned.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            store_read_latency_mean_ms: self.store_read_latency_ms.mean(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_received: u64,
    pub events_rejected: u64,
    pub events_stored: u64,
    pub store_errors: u64,
    pub rate_limited_requests: u64,
    pub heatmap_batches_merged: u64,
    pub stream_frames_sent: u64,
    pub stream_poll_errors: u64,
    pub stream_resyncs: u64,
    pub active_subscribers: u64,
    pub events_pruned: u64,
    pub ingest_latency_mean_ms: f64,
    pub store_read_latency_mean_ms: f64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
