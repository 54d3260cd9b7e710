//! Long-running tasks for the telemetry engine.
//!
//! - Delta streaming: one polling task per dashboard subscriber
//! - Retention: hourly pruning of events past the retention window
//! - Scheduler: retention, store health and metrics logging loops

pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod stream;

pub use registry::{SubscriberRegistry, Subscription};
pub use retention::RetentionWorker;
pub use scheduler::{WorkerConfig, WorkerScheduler};
pub use stream::{diff_since, Delta, FrameKind, StreamConfig, StreamFrame, SubscriberState};
