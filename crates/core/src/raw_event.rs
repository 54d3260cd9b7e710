//! Raw tracking payloads as sent by the browser, and their validation.
//!
//! This module handles:
//! - Parsing the tracking body (JSON object, any content type)
//! - Validating required fields before any side effect
//! - Normalizing the page path (full URLs are reduced to their path)

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::{Error, Result};
use crate::events::{EventType, GeoInfo};
use crate::limits::{MAX_EVENT_TYPE_LEN, MAX_PATH_LEN, MAX_SESSION_ID_LEN};

static EVENT_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_.:-]*$").expect("event type regex is valid")
});

/// Tracking event as received from the browser (camelCase).
///
/// Required fields are optional here so that their absence surfaces as a
/// validation error rather than a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Event type name
    #[serde(rename = "type")]
    #[validate(length(max = 64))]
    pub event_type: Option<String>,

    /// Client-generated session ID
    #[validate(length(max = 128))]
    pub session_id: Option<String>,

    /// Page path
    #[validate(length(max = 2048))]
    pub path: Option<String>,

    /// Full page URL, used when `path` is missing
    #[validate(length(max = 2048))]
    pub url: Option<String>,

    /// Open key-value payload
    pub data: Option<Value>,

    /// Client-side geo hints (lowest precedence)
    pub geo: Option<GeoInfo>,
}

impl RawEvent {
    /// Parse a tracking body. Accepts any content type, since `sendBeacon`
    /// posts `text/plain`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::validation(format!("invalid JSON: {}", e)))?;

        if !value.is_object() {
            return Err(Error::validation("request body must be a JSON object"));
        }

        serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("invalid event: {}", e)))
    }
}

/// A raw event that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    pub event_type: EventType,
    pub session_id: String,
    pub path: String,
    pub data: Option<Value>,
    pub geo: Option<GeoInfo>,
}

/// Validate a raw event and normalize its fields.
pub fn validate_raw_event(event: RawEvent) -> Result<ValidatedEvent> {
    event
        .validate()
        .map_err(|e| Error::validation(format!("{}", e)))?;

    let event_type = event
        .event_type
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::validation("type is required"))?;

    if event_type.len() > MAX_EVENT_TYPE_LEN || !EVENT_TYPE_RE.is_match(&event_type) {
        return Err(Error::validation(format!(
            "type '{}' must be lowercase alphanumeric with _ . : -",
            event_type
        )));
    }

    let session_id = event
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::validation("sessionId is required"))?;

    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(Error::validation("sessionId exceeds 128 chars"));
    }

    let path = normalize_path(event.path.as_deref(), event.url.as_deref());

    Ok(ValidatedEvent {
        event_type: EventType::from(event_type),
        session_id: session_id.to_string(),
        path,
        data: event.data,
        geo: event.geo,
    })
}

/// Reduce a path or URL to a normalized page path.
///
/// Query strings and fragments are dropped, a leading `/` is guaranteed,
/// and the result is capped at `MAX_PATH_LEN` bytes.
pub fn normalize_path(path: Option<&str>, url: Option<&str>) -> String {
    let candidate = path
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or_else(|| url.map(str::trim).filter(|u| !u.is_empty()));

    let Some(candidate) = candidate else {
        return "/".to_string();
    };

    let raw = if candidate.contains("://") {
        url::Url::parse(candidate)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    } else {
        candidate
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    };

    let mut normalized = if raw.starts_with('/') {
        raw
    } else {
        format!("/{}", raw)
    };

    if normalized.len() > MAX_PATH_LEN {
        let mut end = MAX_PATH_LEN;
        while !normalized.is_char_boundary(end) {
            end -= 1;
        }
        normalized.truncate(end);
    }

    normalized
}
