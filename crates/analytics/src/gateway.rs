//! Ingestion gateway.
//!
//! One call, one event: validate, normalize, enrich, insert. Nothing is
//! retried here; browser telemetry is fire-and-forget and the caller owns
//! any retry policy.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use engine_core::{
    new_event_id, validate_raw_event, AnalyticsEvent, EventData, GeoInfo, RawEvent, Result,
};
use event_store::EventStore;
use telemetry::metrics;
use tracing::{debug, warn};

use crate::enrichment::DeviceParser;

/// Request-side information the gateway may attach to an event.
#[derive(Debug, Clone)]
pub struct IngestContext {
    /// Geo hints observed by the edge (headers)
    pub geo: GeoInfo,
    pub user_agent: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl IngestContext {
    pub fn new(received_at: DateTime<Utc>) -> Self {
        Self {
            geo: GeoInfo::default(),
            user_agent: None,
            received_at,
        }
    }

    pub fn with_geo(mut self, geo: GeoInfo) -> Self {
        self.geo = geo;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

pub struct IngestionGateway {
    store: Arc<dyn EventStore>,
    devices: DeviceParser,
}

impl IngestionGateway {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            devices: DeviceParser::new(),
        }
    }

    /// Validates and stores one event.
    ///
    /// Fails with `Validation` before any side effect when `type` or
    /// `sessionId` is missing, and with `Storage` when the insert fails.
    pub async fn ingest(&self, raw: RawEvent, ctx: IngestContext) -> Result<AnalyticsEvent> {
        let start = Instant::now();
        metrics().events_received.inc();

        let event = match self.build(raw, &ctx) {
            Ok(event) => event,
            Err(e) => {
                metrics().events_rejected.inc();
                debug!(error = %e, "Rejected event");
                return Err(e);
            }
        };

        match self.store.insert(&event).await {
            Ok(inserted) => {
                if inserted {
                    metrics().events_stored.inc();
                }
            }
            Err(e) => {
                metrics().store_errors.inc();
                warn!(id = %event.id, error = %e, "Failed to store event");
                return Err(e);
            }
        }

        metrics()
            .ingest_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        debug!(
            id = %event.id,
            event_type = %event.event_type,
            path = %event.path,
            "Ingested event"
        );

        Ok(event)
    }

    fn build(&self, raw: RawEvent, ctx: &IngestContext) -> Result<AnalyticsEvent> {
        let validated = validate_raw_event(raw)?;
        let mut data = EventData::try_from_value(validated.data.unwrap_or_default())?;

        // Edge headers win; the client's own guess only fills gaps
        let mut geo = ctx.geo.clone().sanitized();
        geo.merge(&validated.geo.unwrap_or_default().sanitized());
        if !geo.is_empty() {
            data.insert("geo", serde_json::to_value(&geo)?);
        }

        if let Some(device) = ctx
            .user_agent
            .as_deref()
            .and_then(|ua| self.devices.parse(ua))
        {
            data.insert("device", serde_json::to_value(&device)?);
        }

        Ok(AnalyticsEvent {
            id: new_event_id(ctx.received_at),
            session_id: validated.session_id,
            event_type: validated.event_type,
            path: validated.path,
            timestamp: ctx.received_at,
            data,
            geo,
        })
    }
}
