//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use analytics::{HeatmapAggregator, IngestionGateway};
use event_store::{ContentCatalog, EventStore, HeatmapStore};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use worker::{StreamConfig, SubscriberRegistry};

use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};

/// Idle rate-limit buckets older than this are dropped.
const RATE_LIMIT_BUCKET_TTL: Duration = Duration::from_secs(600);

/// How often idle buckets are swept.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// HTTP-facing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer token for the dashboard routes; open when unset
    pub admin_token: Option<String>,
    /// Upper bound on events read by one store query; also the page size
    /// when a dashboard window is read in full
    pub raw_query_limit: usize,
    /// Events aggregated for one metrics request before the response is
    /// marked `truncated`
    pub window_event_limit: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            admin_token: None,
            raw_query_limit: 10_000,
            window_event_limit: 1_000_000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<dyn EventStore>,
    pub gateway: Arc<IngestionGateway>,
    pub heatmaps: Arc<HeatmapAggregator>,
    pub catalog: Arc<dyn ContentCatalog>,
    /// Live dashboard subscribers
    pub subscribers: Arc<SubscriberRegistry>,
    pub rate_limiter: SharedRateLimiter,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(
        events: Arc<dyn EventStore>,
        heatmaps: Arc<dyn HeatmapStore>,
        catalog: Arc<dyn ContentCatalog>,
        stream: StreamConfig,
        config: ApiConfig,
    ) -> Self {
        Self {
            gateway: Arc::new(IngestionGateway::new(events.clone())),
            heatmaps: Arc::new(HeatmapAggregator::new(heatmaps)),
            subscribers: Arc::new(SubscriberRegistry::new(events.clone(), stream)),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            events,
            catalog,
            config: Arc::new(config),
        }
    }

    /// Periodically drops idle rate-limit buckets until `cancel` fires.
    pub fn start_rate_limiter_cleanup(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = rate_limiter.cleanup(RATE_LIMIT_BUCKET_TTL);
                        if removed > 0 {
                            debug!(removed, "Swept idle rate-limit buckets");
                        }
                    }
                }
            }
        })
    }
}
