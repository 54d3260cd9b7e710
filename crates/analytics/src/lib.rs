//! The telemetry engine's processing components.
//!
//! - [`gateway`]: validate, enrich and persist one event per call
//! - [`aggregation`]: pure metrics over an event window
//! - [`heatmap`]: client-side collector and server-side merge
//! - [`similarity`]: embedding-based related-content ranking

pub mod aggregation;
pub mod enrichment;
pub mod gateway;
pub mod heatmap;
pub mod similarity;

pub use aggregation::{aggregate, filter_window, top_paths, AggregatedMetrics, HistogramPoint, PathCount};
pub use enrichment::{DeviceInfo, DeviceParser};
pub use gateway::{IngestContext, IngestionGateway};
pub use heatmap::{HeatmapAggregator, HeatmapCollector, HeatmapSink};
pub use similarity::{cosine_similarity, related};
