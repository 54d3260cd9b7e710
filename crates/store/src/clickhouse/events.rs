//! Event store on ClickHouse.

use std::time::Instant;

use ::clickhouse::query::Query;
use ::clickhouse::Row;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{AnalyticsEvent, Error, EventData, EventType, GeoInfo, Result};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::{debug, info};

use super::client::ClickHouseClient;
use super::store_error;
use crate::EventStore;

/// Flattened event row. `timestamp` is unix millis (`DateTime64(3)`).
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub session_id: String,
    pub event_type: String,
    pub path: String,
    pub timestamp: i64,
    pub data: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl TryFrom<&AnalyticsEvent> for EventRow {
    type Error = Error;

    fn try_from(event: &AnalyticsEvent) -> Result<Self> {
        Ok(Self {
            id: event.id.clone(),
            session_id: event.session_id.clone(),
            event_type: event.event_type.to_string(),
            path: event.path.clone(),
            timestamp: event.timestamp.timestamp_millis(),
            data: serde_json::to_string(&event.data)?,
            country: event.geo.country.clone(),
            city: event.geo.city.clone(),
            region: event.geo.region.clone(),
            lat: event.geo.lat,
            lng: event.geo.lng,
        })
    }
}

impl TryFrom<EventRow> for AnalyticsEvent {
    type Error = Error;

    fn try_from(row: EventRow) -> Result<Self> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(row.timestamp).ok_or_else(|| {
            Error::storage(format!("event {} has timestamp {} out of range", row.id, row.timestamp))
        })?;
        let data = if row.data.is_empty() {
            EventData::new()
        } else {
            serde_json::from_str(&row.data)?
        };

        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            event_type: EventType::from(row.event_type),
            path: row.path,
            timestamp,
            data,
            geo: GeoInfo {
                country: row.country,
                city: row.city,
                region: row.region,
                lat: row.lat,
                lng: row.lng,
            },
        })
    }
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<AnalyticsEvent>> {
    rows.into_iter().map(AnalyticsEvent::try_from).collect()
}

/// `EventStore` over the `events` table.
#[derive(Clone)]
pub struct ClickHouseEventStore {
    client: ClickHouseClient,
}

impl ClickHouseEventStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    async fn fetch(
        &self,
        sql: &str,
        binds: impl FnOnce(Query) -> Query + Send,
    ) -> Result<Vec<AnalyticsEvent>> {
        let start = Instant::now();
        let rows: Vec<EventRow> = binds(self.client.inner().query(sql))
            .fetch_all()
            .await
            .map_err(store_error("select events"))?;
        metrics()
            .store_read_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        into_events(rows)
    }
}

#[async_trait]
impl EventStore for ClickHouseEventStore {
    async fn insert(&self, event: &AnalyticsEvent) -> Result<bool> {
        let existing: u64 = self
            .client
            .inner()
            .query("SELECT count() FROM events WHERE id = ?")
            .bind(&event.id)
            .fetch_one()
            .await
            .map_err(store_error("check event id"))?;
        if existing > 0 {
            debug!(id = %event.id, "Duplicate event ignored");
            return Ok(false);
        }

        let row = EventRow::try_from(event)?;
        let mut insert = self
            .client
            .inner()
            .insert("events")
            .map_err(store_error("insert event"))?;
        insert.write(&row).await.map_err(store_error("insert event"))?;
        insert.end().await.map_err(store_error("insert event"))?;

        Ok(true)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AnalyticsEvent>> {
        self.fetch(
            "SELECT ?fields FROM events FINAL ORDER BY id DESC LIMIT ?",
            |q| q.bind(limit as u64),
        )
        .await
    }

    async fn since(
        &self,
        from: DateTime<Utc>,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AnalyticsEvent>> {
        let from_ms = from.timestamp_millis();
        match before.map(str::to_string) {
            Some(before) => {
                self.fetch(
                    "SELECT ?fields FROM events FINAL \
                     WHERE toUnixTimestamp64Milli(timestamp) >= ? AND id < ? \
                     ORDER BY id DESC LIMIT ?",
                    |q| q.bind(from_ms).bind(before).bind(limit as u64),
                )
                .await
            }
            None => {
                self.fetch(
                    "SELECT ?fields FROM events FINAL \
                     WHERE toUnixTimestamp64Milli(timestamp) >= ? \
                     ORDER BY id DESC LIMIT ?",
                    |q| q.bind(from_ms).bind(limit as u64),
                )
                .await
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<AnalyticsEvent>> {
        let id = id.to_string();
        let mut events = self
            .fetch("SELECT ?fields FROM events FINAL WHERE id = ? LIMIT 1", |q| {
                q.bind(id)
            })
            .await?;
        Ok(events.pop())
    }

    async fn by_session(&self, session_id: &str) -> Result<Vec<AnalyticsEvent>> {
        let session_id = session_id.to_string();
        self.fetch(
            "SELECT ?fields FROM events FINAL WHERE session_id = ? ORDER BY id DESC",
            |q| q.bind(session_id),
        )
        .await
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_ms = cutoff.timestamp_millis();
        let expired: u64 = self
            .client
            .inner()
            .query("SELECT count() FROM events FINAL WHERE toUnixTimestamp64Milli(timestamp) < ?")
            .bind(cutoff_ms)
            .fetch_one()
            .await
            .map_err(store_error("count expired events"))?;
        if expired == 0 {
            return Ok(0);
        }

        self.client
            .inner()
            .query("ALTER TABLE events DELETE WHERE toUnixTimestamp64Milli(timestamp) < ?")
            .bind(cutoff_ms)
            .execute()
            .await
            .map_err(store_error("delete expired events"))?;

        info!(expired, cutoff = %cutoff, "Scheduled deletion of expired events");
        Ok(expired)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .inner()
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map_err(store_error("ping"))?;
        Ok(())
    }
}
