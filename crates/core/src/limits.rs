//! Size limits and tuning constants for the telemetry engine.
//!
//! Limits keep a single browser from growing the event store or the
//! heatmap snapshot without bound. The `#[validate]` derive macro requires
//! literal values in attributes, so field limits are duplicated there.
//! Keep both in sync when modifying.

// === Ingest Limits ===

/// Maximum request body accepted by the ingest endpoints (64KB).
pub const MAX_INGEST_BODY_BYTES: usize = 64 * 1024;

/// Maximum serialized size of an event's `data` payload (16KB).
pub const MAX_EVENT_DATA_BYTES: usize = 16 * 1024;

/// Maximum number of top-level keys in an event's `data` payload.
pub const MAX_EVENT_DATA_KEYS: usize = 64;

/// Session ID max length.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Event type name max length.
pub const MAX_EVENT_TYPE_LEN: usize = 64;

/// Page path max length.
pub const MAX_PATH_LEN: usize = 2000;

/// Geo string fields (country, city, region) max length.
pub const MAX_GEO_FIELD_LEN: usize = 128;

// === Heatmap Limits ===

/// Default grid cell size in CSS pixels.
pub const DEFAULT_HEATMAP_CELL_SIZE: u32 = 20;

/// Maximum cells accepted in one heatmap batch. Extra cells are dropped.
pub const MAX_HEATMAP_BATCH_CELLS: usize = 4096;

/// Step between scroll-depth buckets, in percent.
pub const SCROLL_DEPTH_STEP: u8 = 10;

/// Minimum interval between two pointer samples on the client (ms).
pub const HEATMAP_SAMPLE_INTERVAL_MS: u64 = 50;

/// Client flush interval (ms).
pub const HEATMAP_FLUSH_INTERVAL_MS: u64 = 5_000;

// === Similarity ===

/// Default number of related items returned.
pub const DEFAULT_RELATED_LIMIT: usize = 6;

/// Upper bound on caller-supplied `k`.
pub const MAX_RELATED_LIMIT: usize = 50;
