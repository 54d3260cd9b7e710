//! Heatmap endpoints.

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use engine_core::{limits::MAX_INGEST_BODY_BYTES, HeatmapBatch, HeatmapSnapshot};
use serde::Deserialize;
use tracing::debug;

use crate::response::{ApiError, SuccessResponse};
use crate::state::AppState;

/// POST /api/heatmap - Merge a collector batch.
///
/// Always acknowledges: a malformed or oversized batch is dropped, since
/// heatmaps tolerate loss and the client never retries.
pub async fn merge_handler(State(state): State<AppState>, body: Bytes) -> Json<SuccessResponse> {
    if body.len() > MAX_INGEST_BODY_BYTES {
        debug!(bytes = body.len(), "Dropped oversized heatmap batch");
        return Json(SuccessResponse::ok());
    }

    match serde_json::from_slice::<HeatmapBatch>(&body) {
        Ok(batch) => state.heatmaps.merge(batch).await,
        Err(e) => debug!(error = %e, "Dropped malformed heatmap batch"),
    }

    Json(SuccessResponse::ok())
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub path: Option<String>,
}

/// GET /api/heatmap?path=/ - Merged snapshot for one page.
pub async fn snapshot_handler(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Json<HeatmapSnapshot>, ApiError> {
    let path = query.path.as_deref().unwrap_or("/");
    Ok(Json(state.heatmaps.snapshot(path).await?))
}
