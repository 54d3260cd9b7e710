//! Storage collaborators for the telemetry engine.
//!
//! Everything the engine persists goes through the traits here. The
//! in-memory implementations back tests and single-node deployments; the
//! ClickHouse implementations back production.

pub mod catalog;
pub mod clickhouse;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{AnalyticsEvent, ContentItem, HeatmapBatch, HeatmapSnapshot, Result};

pub use catalog::MemoryCatalog;
pub use memory::{MemoryEventStore, MemoryHeatmapStore};

/// Append-only event table.
///
/// Reads are consistent with prior writes. Every listing is most-recent-first,
/// ordered by event ID descending.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert-or-ignore keyed by `id`. Returns `false` when the ID already
    /// existed and nothing was written.
    async fn insert(&self, event: &AnalyticsEvent) -> Result<bool>;

    /// The `limit` most recent events.
    async fn recent(&self, limit: usize) -> Result<Vec<AnalyticsEvent>>;

    /// Events with `timestamp >= from`, at most `limit` of them. With
    /// `before`, only events whose ID sorts below it, so a caller can page
    /// through a window by passing the last ID of the previous page.
    async fn since(
        &self,
        from: DateTime<Utc>,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AnalyticsEvent>>;

    async fn get(&self, id: &str) -> Result<Option<AnalyticsEvent>>;

    async fn by_session(&self, session_id: &str) -> Result<Vec<AnalyticsEvent>>;

    /// Deletes events older than `cutoff`. Returns how many were removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<()>;
}

/// Per-path heatmap counters. Buckets only ever grow.
#[async_trait]
pub trait HeatmapStore: Send + Sync {
    /// Adds a batch to the counters for `batch.path`. Returns the number of
    /// cells merged.
    async fn merge_batch(&self, batch: &HeatmapBatch) -> Result<usize>;

    /// Merged view for `path`; an empty snapshot when nothing was recorded.
    async fn snapshot(&self, path: &str) -> Result<HeatmapSnapshot>;
}

/// Read-only view of the portfolio's content items.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    async fn items(&self) -> Result<Vec<ContentItem>>;
}
