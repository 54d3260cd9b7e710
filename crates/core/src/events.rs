//! Stored analytics event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::limits::{MAX_EVENT_DATA_BYTES, MAX_EVENT_DATA_KEYS, MAX_GEO_FIELD_LEN};

/// Event type. Known types get their own variant; anything else is a
/// custom event carrying its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Pageview,
    Click,
    Scroll,
    Custom(String),
}

impl EventType {
    /// Returns the string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pageview => "pageview",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "pageview" => Self::Pageview,
            "click" => Self::Click,
            "scroll" => Self::Scroll,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse visitor location, taken from edge/proxy headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl GeoInfo {
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.city.is_none()
            && self.region.is_none()
            && self.lat.is_none()
            && self.lng.is_none()
    }

    /// Fills fields missing from `self` with values from `hint`.
    pub fn merge(&mut self, hint: &GeoInfo) {
        if self.country.is_none() {
            self.country = hint.country.clone();
        }
        if self.city.is_none() {
            self.city = hint.city.clone();
        }
        if self.region.is_none() {
            self.region = hint.region.clone();
        }
        if self.lat.is_none() {
            self.lat = hint.lat;
        }
        if self.lng.is_none() {
            self.lng = hint.lng;
        }
    }

    /// Drops over-long strings and out-of-range coordinates.
    pub fn sanitized(mut self) -> Self {
        for field in [&mut self.country, &mut self.city, &mut self.region] {
            if field
                .as_ref()
                .is_some_and(|v| v.trim().is_empty() || v.len() > MAX_GEO_FIELD_LEN)
            {
                *field = None;
            }
        }
        if self.lat.is_some_and(|v| !(-90.0..=90.0).contains(&v)) {
            self.lat = None;
        }
        if self.lng.is_some_and(|v| !(-180.0..=180.0).contains(&v)) {
            self.lng = None;
        }
        self
    }
}

/// Schema-less, size-bounded event payload.
///
/// Always a JSON object. Bounded by key count and serialized size so the
/// store cannot grow without limit from a single event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(Map<String, Value>);

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a caller-supplied value. `null` becomes an empty map.
    pub fn try_from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(Error::validation("data must be a JSON object")),
        };

        let data = Self(map);
        data.check_bounds()?;
        Ok(data)
    }

    /// Sets a key written by the server (`geo`, `device`). Bounds apply to
    /// the client payload only, so these never cause a rejection.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn check_bounds(&self) -> Result<()> {
        if self.0.len() > MAX_EVENT_DATA_KEYS {
            return Err(Error::validation(format!(
                "data has {} keys, exceeds {} limit",
                self.0.len(),
                MAX_EVENT_DATA_KEYS
            )));
        }

        let size = serde_json::to_vec(&self.0)?.len();
        if size > MAX_EVENT_DATA_BYTES {
            return Err(Error::validation(format!(
                "data {}KB exceeds {}KB limit",
                size / 1024,
                MAX_EVENT_DATA_BYTES / 1024
            )));
        }
        Ok(())
    }
}

/// A single stored analytics event. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Time-prefixed unique ID, also the stream cursor
    pub id: String,
    /// Client-generated session ID
    pub session_id: String,
    /// Event type
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Normalized page path
    pub path: String,
    /// Server receive timestamp
    pub timestamp: DateTime<Utc>,
    /// Open key-value payload
    #[serde(default)]
    pub data: EventData,
    /// Visitor location
    #[serde(default)]
    pub geo: GeoInfo,
}

impl AnalyticsEvent {
    pub fn is_pageview(&self) -> bool {
        self.event_type == EventType::Pageview
    }
}
