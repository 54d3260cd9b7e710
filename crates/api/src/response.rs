//! Standardized API responses.

use analytics::{AggregatedMetrics, PathCount};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine_core::{AnalyticsEvent, ErrorCode, RelatedItem, SessionSummary};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Success response for `/api/track`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    pub id: String,
    pub timestamp: i64,
}

impl TrackResponse {
    pub fn stored(event: &AnalyticsEvent) -> Self {
        Self {
            success: true,
            id: event.id.clone(),
            timestamp: event.timestamp.timestamp_millis(),
        }
    }
}

/// Bare acknowledgement.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Dashboard summary for `/api/analytics`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub range: String,
    #[serde(flatten)]
    pub metrics: AggregatedMetrics,
    pub top_paths: Vec<PathCount>,
    /// Set when the window held more events than one request aggregates
    pub truncated: bool,
}

/// Raw events for `/api/analytics/events`, most-recent-first.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub count: usize,
    pub events: Vec<AnalyticsEvent>,
    /// Present only when the listing is narrowed to one session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
}

/// Rollup of one session's retained events.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub duration_ms: i64,
    pub bounced: bool,
}

impl From<SessionSummary> for SessionView {
    fn from(summary: SessionSummary) -> Self {
        Self {
            duration_ms: summary.duration_ms(),
            bounced: summary.is_bounce(),
            summary,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelatedResponse {
    pub id: String,
    pub items: Vec<RelatedItem>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error carrying a stable error code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
            retry_after: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput.code(), msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized.code(), msg)
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            response: ErrorResponse::new(msg, ErrorCode::RateLimited.code()),
            retry_after,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal.code(), msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

impl From<engine_core::Error> for ApiError {
    fn from(err: engine_core::Error) -> Self {
        let code = err.code();
        let status = StatusCode::from_u16(code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Collaborator failures are logged in full and reported generically
        if status.is_server_error() {
            error!(code = code.code(), error = %err, "Request failed");
            let msg = if err.is_storage() {
                "Storage unavailable"
            } else {
                "Internal error"
            };
            return ApiError::with_code(status, code.code(), msg);
        }

        ApiError::with_code(status, code.code(), err.to_string())
    }
}
