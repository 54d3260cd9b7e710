//! Heatmap aggregation.
//!
//! [`HeatmapCollector`] is the client half: it quantizes pointer samples
//! into grid cells and periodically flushes them as a [`HeatmapBatch`].
//! [`HeatmapAggregator`] is the server half: it merges batches into the
//! heatmap store. Both sides are best-effort; a lost batch only means an
//! undercount.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use engine_core::limits::{DEFAULT_HEATMAP_CELL_SIZE, HEATMAP_SAMPLE_INTERVAL_MS};
use engine_core::{normalize_path, CellKey, HeatmapBatch, HeatmapSnapshot, Result};
use event_store::HeatmapStore;
use parking_lot::Mutex;
use telemetry::metrics;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Where a collector sends its batches.
#[async_trait]
pub trait HeatmapSink: Send + Sync {
    async fn send(&self, batch: HeatmapBatch) -> Result<()>;
}

/// Server-side merge into the heatmap store.
pub struct HeatmapAggregator {
    store: Arc<dyn HeatmapStore>,
}

impl HeatmapAggregator {
    pub fn new(store: Arc<dyn HeatmapStore>) -> Self {
        Self { store }
    }

    /// Merges a batch. Never fails: heatmap loss is tolerated, so store
    /// errors are logged and dropped.
    pub async fn merge(&self, mut batch: HeatmapBatch) {
        batch.path = normalize_path(Some(&batch.path), None);

        match self.store.merge_batch(&batch).await {
            Ok(cells) => {
                metrics().heatmap_batches_merged.inc();
                metrics().heatmap_cells_merged.inc_by(cells as u64);
                debug!(path = %batch.path, cells, "Merged heatmap batch");
            }
            Err(e) => {
                metrics().store_errors.inc();
                warn!(path = %batch.path, error = %e, "Dropped heatmap batch");
            }
        }
    }

    /// Current snapshot for `path`; empty when nothing was recorded.
    pub async fn snapshot(&self, path: &str) -> Result<HeatmapSnapshot> {
        self.store
            .snapshot(&normalize_path(Some(path), None))
            .await
    }
}

#[async_trait]
impl HeatmapSink for HeatmapAggregator {
    async fn send(&self, batch: HeatmapBatch) -> Result<()> {
        self.merge(batch).await;
        Ok(())
    }
}

struct PageState {
    path: String,
    last_flush_ms: u64,
}

/// Client-side sample buffer for one page view.
///
/// Sampling never blocks: the throttle is a CAS on an atomic timestamp,
/// and the cell map is only taken with `try_lock`. A sample that arrives
/// while a flush holds the map is dropped.
pub struct HeatmapCollector {
    cell_size: u32,
    sample_interval_ms: u64,
    epoch: Instant,
    /// Last accepted sample time + 1; 0 means none yet
    last_sample: AtomicU64,
    max_scroll_permille: AtomicU32,
    cells: Mutex<HashMap<CellKey, u64>>,
    page: Mutex<PageState>,
}

impl HeatmapCollector {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_settings(path, DEFAULT_HEATMAP_CELL_SIZE, HEATMAP_SAMPLE_INTERVAL_MS)
    }

    pub fn with_settings(path: impl Into<String>, cell_size: u32, sample_interval_ms: u64) -> Self {
        Self {
            cell_size: cell_size.max(1),
            sample_interval_ms,
            epoch: Instant::now(),
            last_sample: AtomicU64::new(0),
            max_scroll_permille: AtomicU32::new(0),
            cells: Mutex::new(HashMap::new()),
            page: Mutex::new(PageState {
                path: path.into(),
                last_flush_ms: 0,
            }),
        }
    }

    /// Milliseconds since the collector was created.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Records a pointer position. Returns whether the sample was kept.
    pub fn record_pointer(&self, x: f64, y: f64, scroll_offset: f64, now_ms: u64) -> bool {
        let stamp = now_ms.saturating_add(1);
        let last = self.last_sample.load(Ordering::Relaxed);
        if last != 0 && stamp < last.saturating_add(self.sample_interval_ms) {
            return false;
        }
        if self
            .last_sample
            .compare_exchange(last, stamp, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let Some(mut cells) = self.cells.try_lock() else {
            return false;
        };
        *cells
            .entry(CellKey::from_pointer(x, y, scroll_offset, self.cell_size))
            .or_insert(0) += 1;
        true
    }

    /// Records the current scroll position as a fraction of document height.
    pub fn record_scroll(&self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        let permille = (fraction.clamp(0.0, 1.0) * 1000.0).round() as u32;
        self.max_scroll_permille.fetch_max(permille, Ordering::Relaxed);
    }

    pub fn max_scroll(&self) -> f64 {
        f64::from(self.max_scroll_permille.load(Ordering::Relaxed)) / 1000.0
    }

    pub fn pending_cells(&self) -> usize {
        self.cells.lock().len()
    }

    /// Starts a new page view: every counter is reset.
    pub fn navigate(&self, path: impl Into<String>, now_ms: u64) {
        let mut page = self.page.lock();
        page.path = path.into();
        page.last_flush_ms = now_ms;
        self.cells.lock().clear();
        self.max_scroll_permille.store(0, Ordering::Relaxed);
        self.last_sample.store(0, Ordering::Relaxed);
    }

    /// Sends pending cells, if any, and clears them. Returns the number of
    /// cells handed to the sink. Sink failures are swallowed.
    pub async fn flush(&self, sink: &dyn HeatmapSink, now_ms: u64) -> usize {
        let batch = {
            let mut page = self.page.lock();
            let cells = std::mem::take(&mut *self.cells.lock());
            if cells.is_empty() {
                return 0;
            }

            let dwell_ms = now_ms.saturating_sub(page.last_flush_ms);
            page.last_flush_ms = now_ms;

            HeatmapBatch {
                path: page.path.clone(),
                grid: cells
                    .into_iter()
                    .map(|(cell, count)| (cell.to_string(), count))
                    .collect(),
                max_scroll: self.max_scroll(),
                dwell_ms,
            }
        };

        let sent = batch.grid.len();
        if let Err(e) = sink.send(batch).await {
            debug!(error = %e, "Heatmap flush failed, batch dropped");
        }
        sent
    }

    /// Flushes on a fixed interval until the task is dropped or aborted.
    pub async fn run_flush_loop(self: Arc<Self>, sink: Arc<dyn HeatmapSink>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.flush(sink.as_ref(), self.now_ms()).await;
        }
    }
}
