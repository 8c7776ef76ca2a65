use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

use alerta_types::events::{EventPublisher, NotificationEvent};

/// Events a subscriber may fall behind by before the oldest are dropped for it.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;

/// Single-topic broadcast bus for report lifecycle events.
///
/// Every subscriber connected at publish time receives the event, in publish
/// order. Publishing never blocks: a subscriber that falls more than its
/// queue capacity behind loses the oldest events instead.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for lifecycle events; all subscribers receive all events
    broadcast_tx: broadcast::Sender<NotificationEvent>,

    /// Total events published since startup
    published: AtomicU64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to lifecycle events published from now on. No history is
    /// replayed.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.inner.broadcast_tx.subscribe(),
        }
    }

    /// Deliver an event to every current subscriber.
    pub fn broadcast(&self, event: NotificationEvent) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        // Err only means nobody is listening.
        if self.inner.broadcast_tx.send(event).is_err() {
            trace!("No subscribers, event dropped");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }

    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

impl EventPublisher for Dispatcher {
    fn publish(&self, event: NotificationEvent) {
        self.broadcast(event);
    }
}

/// A live handle on the bus. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<NotificationEvent>,
}

impl Subscription {
    /// Next event in publish order, or `None` once the bus is gone.
    /// Events lost to lag are skipped.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!("Subscriber lagged, skipped {} events", n);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`]; `None` when nothing is
    /// queued.
    pub fn try_recv(&mut self) -> Option<NotificationEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => {
                    warn!("Subscriber lagged, skipped {} events", n);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
