//! Process-scoped registry of subscriber tasks.
//!
//! The registry owns every polling task. A task lives exactly as long as
//! its [`Subscription`]: dropping the subscription cancels the task and
//! removes it from the registry.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use event_store::EventStore;
use parking_lot::Mutex;
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::stream::{StreamConfig, StreamFrame, SubscriberTask};

struct ActiveTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

type ActiveMap = Arc<Mutex<HashMap<u64, ActiveTask>>>;

pub struct SubscriberRegistry {
    store: Arc<dyn EventStore>,
    config: StreamConfig,
    next_id: AtomicU64,
    active: ActiveMap,
    shutdown: CancellationToken,
}

impl SubscriberRegistry {
    pub fn new(store: Arc<dyn EventStore>, config: StreamConfig) -> Self {
        Self {
            store,
            config,
            next_id: AtomicU64::new(1),
            active: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Spawns a polling task for a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = self.shutdown.child_token();

        let task = SubscriberTask {
            id,
            store: self.store.clone(),
            config: self.config.clone(),
            tx,
            cancel: cancel.clone(),
        };

        // Hold the lock across spawn so a task that exits immediately
        // cannot race its own registration
        let mut active = self.active.lock();
        let handle = tokio::spawn(task.run());
        active.insert(
            id,
            ActiveTask {
                cancel: cancel.clone(),
                handle,
            },
        );
        drop(active);

        metrics().active_subscribers.inc();
        debug!(subscriber = id, "Subscriber registered");

        Subscription {
            id,
            frames: ReceiverStream::new(rx),
            _guard: SubscriptionGuard {
                id,
                cancel,
                active: self.active.clone(),
            },
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Cancels every subscriber and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks: Vec<ActiveTask> = self.active.lock().drain().map(|(_, t)| t).collect();
        let count = tasks.len();
        for task in tasks {
            metrics().active_subscribers.dec();
            task.cancel.cancel();
            let _ = task.handle.await;
        }

        info!(subscribers = count, "Stream subscribers shut down");
    }
}

/// Cancels and deregisters a task when dropped.
struct SubscriptionGuard {
    id: u64,
    cancel: CancellationToken,
    active: ActiveMap,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.active.lock().remove(&self.id).is_some() {
            metrics().active_subscribers.dec();
        }
        debug!(subscriber = self.id, "Subscriber released");
    }
}

/// Frames for one subscriber. Dropping it ends the subscription.
pub struct Subscription {
    id: u64,
    frames: ReceiverStream<StreamFrame>,
    _guard: SubscriptionGuard,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next frame, or `None` once the task has closed.
    pub async fn next_frame(&mut self) -> Option<StreamFrame> {
        self.frames.next().await
    }
}

impl Stream for Subscription {
    type Item = StreamFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamFrame>> {
        Pin::new(&mut self.frames).poll_next(cx)
    }
}
