//! API routes.

pub mod analytics;
pub mod health;
pub mod heatmap;
pub mod related;
pub mod stream;
pub mod track;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{auth, rate_limit};
use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let limited = || middleware::from_fn_with_state(state.clone(), rate_limit::enforce);

    let dashboard = Router::new()
        .route("/api/analytics", get(analytics::metrics_handler))
        .route("/api/analytics/events", get(analytics::events_handler))
        .route("/api/analytics/stream", get(stream::stream_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/api/track", post(track::track_handler).layer(limited()))
        .route(
            "/api/heatmap",
            post(heatmap::merge_handler)
                .layer(limited())
                .get(heatmap::snapshot_handler),
        )
        .route("/api/related/:id", get(related::related_handler))
        .merge(dashboard)
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
