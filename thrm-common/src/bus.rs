//! Publish/subscribe bus abstraction
//!
//! The sensing node publishes readings and the server consumes them through
//! [`MessageBus`]. The broker-backed transport is an external collaborator;
//! [`LocalBus`] carries the same traffic inside one process.

use tokio::sync::broadcast;
use tracing::trace;

use crate::events::{BusMessage, Topic};
use crate::{Error, Result};

/// Receiving half of a bus subscription
pub type BusReceiver = broadcast::Receiver<BusMessage>;

/// Topic-based publish/subscribe transport
pub trait MessageBus: Send + Sync {
    /// Publish `payload` on `topic`
    fn publish(&self, topic: Topic, payload: String) -> Result<()>;

    /// Subscribe to every topic published after this call
    fn subscribe(&self) -> BusReceiver;
}

/// In-process bus built on a Tokio broadcast channel
///
/// Slow subscribers lose the oldest messages once `capacity` is exceeded and
/// observe `RecvError::Lagged`.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<BusMessage>,
    capacity: usize,
}

impl LocalBus {
    /// Creates a new LocalBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl MessageBus for LocalBus {
    fn publish(&self, topic: Topic, payload: String) -> Result<()> {
        trace!("bus publish {} = {}", topic, payload);
        self.tx
            .send(BusMessage::new(topic, payload))
            .map(|_| ())
            .map_err(|_| Error::Transport(format!("No subscribers for {}", topic)))
    }

    fn subscribe(&self) -> BusReceiver {
        self.tx.subscribe()
    }
}
