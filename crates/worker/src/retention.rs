//! Retention worker.
//!
//! Events older than the retention window are deleted; heatmap counters
//! are kept forever.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use engine_core::Result;
use event_store::EventStore;
use telemetry::metrics;
use tracing::{debug, info};

/// Default retention, matching the widest dashboard range.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

pub struct RetentionWorker {
    store: Arc<dyn EventStore>,
    retention: Duration,
}

impl RetentionWorker {
    pub fn new(store: Arc<dyn EventStore>, retention_days: u32) -> Self {
        Self {
            store,
            retention: Duration::days(i64::from(retention_days.max(1))),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    /// Deletes expired events. Returns how many were removed.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = self.cutoff(now);
        let pruned = self.store.prune_before(cutoff).await?;

        if pruned > 0 {
            metrics().events_pruned.inc_by(pruned);
            info!(pruned, cutoff = %cutoff, "Pruned expired events");
        } else {
            debug!(cutoff = %cutoff, "No expired events");
        }
        Ok(pruned)
    }
}
