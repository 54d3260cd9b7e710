//! Observability for the Folio telemetry engine itself.
//!
//! Counters and histograms live in-process and are logged periodically by
//! the worker scheduler; nothing here talks to an external metrics system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
