//! Folio Telemetry Engine
//!
//! Telemetry and recommendation backend for the Folio portfolio:
//! - Browser event ingestion with edge geo and device enrichment
//! - Dashboard aggregation and a live delta stream over SSE
//! - Privacy-preserving interaction heatmaps
//! - Embedding-based related-content ranking

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use api::{router, ApiConfig, AppState, RateLimitConfig};
use event_store::clickhouse::{
    init_schema, ClickHouseClient, ClickHouseConfig, ClickHouseEventStore, ClickHouseHeatmapStore,
};
use event_store::{
    ContentCatalog, EventStore, HeatmapStore, MemoryCatalog, MemoryEventStore, MemoryHeatmapStore,
};
use telemetry::init_tracing_from_env;
use worker::{StreamConfig, WorkerConfig, WorkerScheduler};

/// Where events and heatmap counters are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StorageBackend {
    Memory,
    Clickhouse,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Bearer token for the dashboard routes
    #[serde(default)]
    admin_token: Option<String>,

    /// JSON array of content items for related-content ranking
    #[serde(default)]
    catalog_path: Option<String>,

    #[serde(default = "default_storage")]
    storage: StorageBackend,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    stream: StreamConfig,

    /// Retention and background loop intervals
    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default = "default_raw_query_limit")]
    raw_query_limit: usize,

    #[serde(default = "default_window_event_limit")]
    window_event_limit: usize,

    #[serde(default)]
    rate_limit: RateLimitConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage() -> StorageBackend {
    StorageBackend::Memory
}

fn default_raw_query_limit() -> usize {
    ApiConfig::default().raw_query_limit
}

fn default_window_event_limit() -> usize {
    ApiConfig::default().window_event_limit
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
            catalog_path: None,
            storage: default_storage(),
            clickhouse: ClickHouseConfig::default(),
            stream: StreamConfig::default(),
            worker: WorkerConfig::default(),
            raw_query_limit: default_raw_query_limit(),
            window_event_limit: default_window_event_limit(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    fn api(&self) -> ApiConfig {
        ApiConfig {
            admin_token: self.admin_token.clone().filter(|t| !t.is_empty()),
            raw_query_limit: self.raw_query_limit.max(1),
            window_event_limit: self.window_event_limit.max(1),
            rate_limit: self.rate_limit.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Folio Telemetry Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        storage = ?config.storage,
        dashboard_auth = config.admin_token.is_some(),
        retention_days = config.worker.retention_days,
        "Loaded configuration"
    );

    let (events, heatmaps) = open_stores(&config).await;
    let catalog = load_catalog(&config)?;

    let cancel = CancellationToken::new();

    // Background workers; the first health probe runs before serving
    let scheduler = Arc::new(WorkerScheduler::new(config.worker.clone(), events.clone()));
    scheduler.check_store().await;
    let worker_handles = scheduler.clone().start(cancel.clone());

    let state = AppState::new(
        events,
        heatmaps,
        catalog,
        config.stream.clone(),
        config.api(),
    );
    let cleanup_handle = state.start_rate_limiter_cleanup(cancel.clone());

    let subscribers = state.subscribers.clone();
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // SSE responses never finish on their own, so subscribers are closed
    // as soon as the signal arrives to let in-flight connections drain
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
            subscribers.shutdown().await;
        })
        .await
        .context("Server error")?;

    info!("Shutting down...");
    cancel.cancel();
    for handle in worker_handles.into_iter().chain([cleanup_handle]) {
        if let Err(e) = handle.await {
            error!(error = %e, "Background task ended abnormally");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from defaults, `config/default.toml` and environment.
///
/// Environment keys use the `TELEMETRY_` prefix and `__` for nesting,
/// e.g. `TELEMETRY_CLICKHOUSE__URL` or `TELEMETRY_STREAM__POLL_INTERVAL_MS`.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::with_prefix("TELEMETRY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

async fn open_stores(config: &Config) -> (Arc<dyn EventStore>, Arc<dyn HeatmapStore>) {
    match config.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            let events: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
            let heatmaps: Arc<dyn HeatmapStore> = Arc::new(MemoryHeatmapStore::new());
            (events, heatmaps)
        }
        StorageBackend::Clickhouse => {
            let client = ClickHouseClient::new(config.clickhouse.clone());

            if config.clickhouse.init_schema {
                if let Err(e) = init_schema(&client).await {
                    // Keep serving; the health loop reports the store as down
                    error!(error = %e, "Failed to initialize ClickHouse schema");
                }
            }

            let events: Arc<dyn EventStore> = Arc::new(ClickHouseEventStore::new(client.clone()));
            let heatmaps: Arc<dyn HeatmapStore> = Arc::new(ClickHouseHeatmapStore::new(client));
            (events, heatmaps)
        }
    }
}

fn load_catalog(config: &Config) -> Result<Arc<dyn ContentCatalog>> {
    let catalog = match config.catalog_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => MemoryCatalog::from_file(path)
            .with_context(|| format!("Failed to load content catalog from {}", path))?,
        None => {
            info!("No catalog configured; related-content lookups will return 404");
            MemoryCatalog::default()
        }
    };
    Ok(Arc::new(catalog))
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
