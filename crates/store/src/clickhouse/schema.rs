//! ClickHouse table schemas.
//!
//! Events use ReplacingMergeTree keyed by `id`, so a redelivered event
//! collapses into the original on merge; reads use `FINAL`. Heatmap tables
//! use SummingMergeTree, so merging a batch is a plain insert of deltas.

pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS `{}`", name.replace('`', ""))
}

pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id String,
    session_id String,
    event_type LowCardinality(String),
    path String,
    timestamp DateTime64(3),
    data String,
    country Nullable(String),
    city Nullable(String),
    region Nullable(String),
    lat Nullable(Float64),
    lng Nullable(Float64)
)
ENGINE = ReplacingMergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY id
SETTINGS index_granularity = 8192
"#;

pub const CREATE_HEATMAP_CELLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS heatmap_cells (
    path String,
    x Int64,
    y Int64,
    hits UInt64
)
ENGINE = SummingMergeTree(hits)
ORDER BY (path, x, y)
"#;

pub const CREATE_HEATMAP_SCROLL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS heatmap_scroll (
    path String,
    depth UInt8,
    sessions UInt64,
    dwell_ms UInt64
)
ENGINE = SummingMergeTree((sessions, dwell_ms))
ORDER BY (path, depth)
"#;

pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_EVENTS_TABLE,
        CREATE_HEATMAP_CELLS_TABLE,
        CREATE_HEATMAP_SCROLL_TABLE,
    ]
}
