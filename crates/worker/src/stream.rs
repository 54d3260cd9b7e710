//! Delta streaming.
//!
//! Each subscriber gets its own task that polls the event store and pushes
//! only what is new since its cursor (the ID of the newest event it has
//! seen). The task moves through:
//!
//! ```text
//! Connecting -> Connected -> (Reconnecting -> Connecting)* -> Closed
//! ```
//!
//! `Connecting` sends a `connected` frame with the current window.
//! `Connected` polls on a fixed interval and sends `update` frames; when the
//! cursor has fallen out of the window it sends the whole window as a
//! `resync` frame instead of guessing. Repeated poll failures move to
//! `Reconnecting`, which backs off exponentially. Cancellation or a dropped
//! receiver moves to `Closed`, after which the store is never read again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_core::{AnalyticsEvent, Result};
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Most recent events read per poll
    pub window_size: usize,
    pub poll_interval_ms: u64,
    /// Poll failures in a row before reconnecting
    pub max_consecutive_failures: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Frames buffered per subscriber
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            window_size: 500,
            poll_interval_ms: 5_000,
            max_consecutive_failures: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            channel_capacity: 16,
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Delay before reconnect attempt `attempt` (0-based): doubles from
    /// the initial backoff, capped at the max.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Frame type, also the SSE event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Connected,
    Update,
    Resync,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Update => "update",
            Self::Resync => "resync",
        }
    }
}

/// One message to a subscriber. Events are most-recent-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub events: Vec<AnalyticsEvent>,
}

/// Result of comparing a fresh window against a cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Unchanged,
    /// Events newer than the cursor, most-recent-first
    New(Vec<AnalyticsEvent>),
    /// Cursor not in the window; the whole window
    Resync(Vec<AnalyticsEvent>),
}

/// Walks a most-recent-first window from the head until `cursor`.
pub fn diff_since(mut window: Vec<AnalyticsEvent>, cursor: Option<&str>) -> Delta {
    let Some(head) = window.first() else {
        return Delta::Unchanged;
    };
    let Some(cursor) = cursor else {
        return Delta::New(window);
    };
    if head.id == cursor {
        return Delta::Unchanged;
    }

    match window.iter().position(|e| e.id == cursor) {
        Some(idx) => {
            window.truncate(idx);
            Delta::New(window)
        }
        None => Delta::Resync(window),
    }
}

/// Lifecycle state of one subscriber task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Polling task for one subscriber.
pub(crate) struct SubscriberTask {
    pub(crate) id: u64,
    pub(crate) store: Arc<dyn EventStore>,
    pub(crate) config: StreamConfig,
    pub(crate) tx: mpsc::Sender<StreamFrame>,
    pub(crate) cancel: CancellationToken,
}

impl SubscriberTask {
    pub(crate) async fn run(self) {
        let mut cursor: Option<String> = None;
        let mut attempt = 0u32;
        let mut state = SubscriberState::Connecting;

        debug!(subscriber = self.id, "Subscriber task started");

        loop {
            state = match state {
                SubscriberState::Connecting => self.connect(&mut cursor).await,
                SubscriberState::Connected => {
                    attempt = 0;
                    self.poll(&mut cursor).await
                }
                SubscriberState::Reconnecting => {
                    let delay = self.config.backoff(attempt);
                    attempt = attempt.saturating_add(1);
                    self.back_off(delay).await
                }
                SubscriberState::Closed => break,
            };
        }

        debug!(subscriber = self.id, "Subscriber task closed");
    }

    async fn connect(&self, cursor: &mut Option<String>) -> SubscriberState {
        let window = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SubscriberState::Closed,
            window = self.read_window() => window,
        };

        match window {
            Ok(events) => {
                *cursor = events.first().map(|e| e.id.clone());
                info!(
                    subscriber = self.id,
                    events = events.len(),
                    "Subscriber connected"
                );
                self.send(FrameKind::Connected, events).await
            }
            Err(e) => {
                metrics().stream_poll_errors.inc();
                warn!(subscriber = self.id, error = %e, "Initial snapshot failed");
                SubscriberState::Reconnecting
            }
        }
    }

    async fn poll(&self, cursor: &mut Option<String>) -> SubscriberState {
        let period = self.config.poll_interval();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SubscriberState::Closed,
                _ = self.tx.closed() => return SubscriberState::Closed,
                _ = ticker.tick() => {}
            }

            let window = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SubscriberState::Closed,
                window = self.read_window() => window,
            };

            let window = match window {
                Ok(window) => {
                    failures = 0;
                    window
                }
                Err(e) => {
                    failures += 1;
                    metrics().stream_poll_errors.inc();
                    warn!(
                        subscriber = self.id,
                        failures,
                        error = %e,
                        "Stream poll failed"
                    );
                    if failures >= self.config.max_consecutive_failures.max(1) {
                        return SubscriberState::Reconnecting;
                    }
                    continue;
                }
            };

            let (kind, events) = match diff_since(window, cursor.as_deref()) {
                Delta::Unchanged => continue,
                Delta::New(events) => (FrameKind::Update, events),
                Delta::Resync(events) => {
                    metrics().stream_resyncs.inc();
                    warn!(
                        subscriber = self.id,
                        cursor = cursor.as_deref().unwrap_or(""),
                        "Cursor left the window, resyncing"
                    );
                    (FrameKind::Resync, events)
                }
            };

            if let Some(head) = events.first() {
                *cursor = Some(head.id.clone());
            }
            if self.send(kind, events).await == SubscriberState::Closed {
                return SubscriberState::Closed;
            }
        }
    }

    async fn back_off(&self, delay: Duration) -> SubscriberState {
        debug!(
            subscriber = self.id,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting after backoff"
        );
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => SubscriberState::Closed,
            _ = self.tx.closed() => SubscriberState::Closed,
            _ = tokio::time::sleep(delay) => SubscriberState::Connecting,
        }
    }

    async fn send(&self, kind: FrameKind, events: Vec<AnalyticsEvent>) -> SubscriberState {
        let frame = StreamFrame { kind, events };
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = self.tx.send(frame) => res.is_ok(),
        };

        if sent {
            metrics().stream_frames_sent.inc();
            SubscriberState::Connected
        } else {
            SubscriberState::Closed
        }
    }

    async fn read_window(&self) -> Result<Vec<AnalyticsEvent>> {
        let start = Instant::now();
        let window = self.store.recent(self.config.window_size).await;
        metrics()
            .store_read_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        window
    }
}
