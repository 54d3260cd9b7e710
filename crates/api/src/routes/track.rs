//! Tracking endpoint.
//!
//! Browsers post one event per request, often via `sendBeacon`, so the
//! body is read as bytes regardless of content type.

use analytics::IngestContext;
use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use engine_core::{limits::MAX_INGEST_BODY_BYTES, Error, RawEvent};
use tracing::debug;

use crate::extractors::{GeoHints, UserAgent};
use crate::response::{ApiError, TrackResponse};
use crate::state::AppState;

/// POST /api/track - Ingest one event.
pub async fn track_handler(
    State(state): State<AppState>,
    GeoHints(geo): GeoHints,
    UserAgent(user_agent): UserAgent,
    body: Bytes,
) -> Result<Json<TrackResponse>, ApiError> {
    if body.len() > MAX_INGEST_BODY_BYTES {
        return Err(Error::payload_too_large(format!(
            "body of {} bytes exceeds {} bytes",
            body.len(),
            MAX_INGEST_BODY_BYTES
        ))
        .into());
    }

    let raw = RawEvent::parse(&body)?;

    let mut ctx = IngestContext::new(Utc::now()).with_geo(geo);
    if let Some(ua) = user_agent {
        ctx = ctx.with_user_agent(ua);
    }

    let event = state.gateway.ingest(raw, ctx).await?;
    debug!(id = %event.id, event_type = %event.event_type, path = %event.path, "Tracked event");

    Ok(Json(TrackResponse::stored(&event)))
}
