//! ClickHouse-backed stores.

pub mod client;
pub mod config;
pub mod events;
pub mod health;
pub mod heatmap;
pub mod schema;

pub use client::ClickHouseClient;
pub use config::ClickHouseConfig;
pub use events::ClickHouseEventStore;
pub use health::{check_connection, init_schema};
pub use heatmap::ClickHouseHeatmapStore;

use engine_core::Error;

/// Wraps a driver error with the operation that failed.
pub(crate) fn store_error(op: &'static str) -> impl Fn(::clickhouse::error::Error) -> Error {
    move |e| Error::storage(format!("ClickHouse {} failed: {}", op, e))
}
