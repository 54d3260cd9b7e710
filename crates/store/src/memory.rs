//! In-memory stores.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{AnalyticsEvent, HeatmapBatch, HeatmapSnapshot, PathHeatmap, Result};
use parking_lot::RwLock;
use tracing::debug;

use crate::{EventStore, HeatmapStore};

/// Events keyed by ID. IDs sort in issue order, so the map's reverse
/// iteration is most-recent-first.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<BTreeMap<String, AnalyticsEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: &AnalyticsEvent) -> Result<bool> {
        let mut events = self.events.write();
        if events.contains_key(&event.id) {
            debug!(id = %event.id, "Duplicate event ignored");
            return Ok(false);
        }
        events.insert(event.id.clone(), event.clone());
        Ok(true)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AnalyticsEvent>> {
        Ok(self.events.read().values().rev().take(limit).cloned().collect())
    }

    async fn since(
        &self,
        from: DateTime<Utc>,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AnalyticsEvent>> {
        let upper = before.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(self
            .events
            .read()
            .range::<str, _>((Bound::Unbounded, upper))
            .rev()
            .map(|(_, e)| e)
            .filter(|e| e.timestamp >= from)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<AnalyticsEvent>> {
        Ok(self.events.read().get(id).cloned())
    }

    async fn by_session(&self, session_id: &str) -> Result<Vec<AnalyticsEvent>> {
        Ok(self
            .events
            .read()
            .values()
            .rev()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|_, e| e.timestamp >= cutoff);
        Ok((before - events.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Heatmap counters keyed by path.
#[derive(Debug, Default)]
pub struct MemoryHeatmapStore {
    paths: RwLock<HashMap<String, PathHeatmap>>,
}

impl MemoryHeatmapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HeatmapStore for MemoryHeatmapStore {
    async fn merge_batch(&self, batch: &HeatmapBatch) -> Result<usize> {
        let mut paths = self.paths.write();
        Ok(paths.entry(batch.path.clone()).or_default().merge(batch))
    }

    async fn snapshot(&self, path: &str) -> Result<HeatmapSnapshot> {
        Ok(self
            .paths
            .read()
            .get(path)
            .map(|heatmap| heatmap.snapshot(path))
            .unwrap_or_else(|| HeatmapSnapshot::empty(path)))
    }
}
