//! Core types, validation, and error taxonomy for the Folio telemetry engine.

pub mod embedding;
pub mod error;
pub mod events;
pub mod heatmap;
pub mod ids;
pub mod limits;
pub mod range;
pub mod raw_event;
pub mod session;

pub use embedding::*;
pub use error::{Error, ErrorCode, Result};
pub use events::*;
pub use heatmap::*;
pub use ids::new_event_id;
pub use range::*;
pub use raw_event::*;
pub use session::*;
