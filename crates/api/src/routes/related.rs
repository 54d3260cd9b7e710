//! Related-content endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use engine_core::limits::{DEFAULT_RELATED_LIMIT, MAX_RELATED_LIMIT};
use serde::Deserialize;

use crate::response::{ApiError, RelatedResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub k: Option<usize>,
}

/// GET /api/related/:id?k=6 - Items most similar to `id`.
pub async fn related_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<RelatedResponse>, ApiError> {
    let k = query.k.unwrap_or(DEFAULT_RELATED_LIMIT).min(MAX_RELATED_LIMIT);

    let pool = state.catalog.items().await?;
    let items = analytics::related(&id, &pool, k)?;

    Ok(Json(RelatedResponse { id, items }))
}
