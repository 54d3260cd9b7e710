//! Periodic background loops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use telemetry::{health, metrics};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::retention::{RetentionWorker, DEFAULT_RETENTION_DAYS};

/// Intervals for the background loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub retention_days: u32,
    pub retention_interval_secs: u64,
    pub health_check_interval_secs: u64,
    pub metrics_log_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            retention_interval_secs: 3600,
            health_check_interval_secs: 30,
            metrics_log_interval_secs: 60,
        }
    }
}

pub struct WorkerScheduler {
    config: WorkerConfig,
    store: Arc<dyn EventStore>,
    retention: RetentionWorker,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig, store: Arc<dyn EventStore>) -> Self {
        let retention = RetentionWorker::new(store.clone(), config.retention_days);
        Self {
            config,
            store,
            retention,
        }
    }

    /// Spawns every loop. Each stops when `cancel` fires.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            retention_days = self.config.retention_days,
            "Starting background workers"
        );

        vec![
            tokio::spawn(self.clone().retention_loop(cancel.clone())),
            tokio::spawn(self.clone().health_loop(cancel.clone())),
            tokio::spawn(self.metrics_loop(cancel)),
        ]
    }

    async fn retention_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = ticker(self.config.retention_interval_secs);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.retention.run(Utc::now()).await {
                error!(error = %e, "Retention run failed");
            }
        }
    }

    async fn health_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = ticker(self.config.health_check_interval_secs);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.check_store().await;
        }
    }

    /// Probes the store and records the result in the health registry.
    pub async fn check_store(&self) {
        match self.store.ping().await {
            Ok(()) => health().store.set_healthy(),
            Err(e) => {
                if health().store.is_healthy() {
                    warn!(error = %e, "Event store became unhealthy");
                }
                health().store.set_unhealthy(e.to_string());
            }
        }
    }

    async fn metrics_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = ticker(self.config.metrics_log_interval_secs);
        // Skip the immediate first tick; there is nothing to report yet
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let snapshot = metrics().snapshot();
            info!(
                events_received = snapshot.events_received,
                events_stored = snapshot.events_stored,
                events_rejected = snapshot.events_rejected,
                store_errors = snapshot.store_errors,
                heatmap_batches = snapshot.heatmap_batches_merged,
                stream_frames = snapshot.stream_frames_sent,
                stream_resyncs = snapshot.stream_resyncs,
                subscribers = snapshot.active_subscribers,
                ingest_mean_ms = snapshot.ingest_latency_mean_ms,
                "Engine metrics"
            );
        }
    }
}

fn ticker(secs: u64) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
