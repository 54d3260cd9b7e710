//! Common test setup functions.

use std::net::SocketAddr;
use std::sync::Arc;

use api::{router, ApiConfig, AppState, RateLimitConfig};
use axum::Router;
use axum_test::TestServer;
use engine_core::ContentItem;
use event_store::{EventStore, MemoryCatalog, MemoryEventStore, MemoryHeatmapStore};
use worker::StreamConfig;

/// Test context over in-memory stores.
///
/// Exercises the real router with every middleware layer; only the
/// storage collaborators are swapped for in-process ones.
pub struct TestContext {
    pub events: Arc<MemoryEventStore>,
    pub heatmaps: Arc<MemoryHeatmapStore>,
    pub catalog: Arc<MemoryCatalog>,
    pub state: AppState,
    pub router: Router,
}

impl TestContext {
    /// Open dashboard, generous rate limit, empty catalog.
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let events = Arc::new(MemoryEventStore::new());
        Self::build(events.clone(), events, config, StreamConfig::default())
    }

    /// Default API settings with custom streaming settings.
    pub fn with_stream_config(stream: StreamConfig) -> Self {
        let events = Arc::new(MemoryEventStore::new());
        Self::build(events.clone(), events, Self::default_config(), stream)
    }

    /// Routes event reads and writes through `store` instead of memory.
    pub fn with_event_store(store: Arc<dyn EventStore>) -> Self {
        Self::build(
            store,
            Arc::new(MemoryEventStore::new()),
            Self::default_config(),
            StreamConfig::default(),
        )
    }

    fn build(
        store: Arc<dyn EventStore>,
        events: Arc<MemoryEventStore>,
        config: ApiConfig,
        stream: StreamConfig,
    ) -> Self {
        let heatmaps = Arc::new(MemoryHeatmapStore::new());
        let catalog = Arc::new(MemoryCatalog::default());

        let state = AppState::new(
            store,
            heatmaps.clone(),
            catalog.clone(),
            stream,
            config,
        );
        let router = router(state.clone());

        Self {
            events,
            heatmaps,
            catalog,
            state,
            router,
        }
    }

    pub fn default_config() -> ApiConfig {
        ApiConfig {
            admin_token: None,
            raw_query_limit: 10_000,
            window_event_limit: 1_000_000,
            rate_limit: RateLimitConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }

    /// Adds items to the content catalog.
    pub fn seed_catalog(&self, items: Vec<ContentItem>) {
        for item in items {
            self.catalog.upsert(item);
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }

    /// Serves the router on an ephemeral local port for clients that need
    /// a real connection (streaming responses). Lives until the runtime ends.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let app = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });
        addr
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
