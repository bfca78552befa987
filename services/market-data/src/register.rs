//! Fan-out register
//!
//! One register per topic (trade, depth, candle, order). Subscribers are
//! delivered to in registration order; each delivery is isolated so a
//! failing or panicking subscriber never stops the remaining ones and
//! never reaches the publisher.
//!
//! Flow: client connects → register → publish(snapshot)* → unregister.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Fan-out topics exposed to streaming clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Trade,
    Depth,
    Candle,
    Order,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Trade => "trade",
            Topic::Depth => "depth",
            Topic::Candle => "candle",
            Topic::Order => "order",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by [`Register::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Reasons a single delivery can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscriber channel closed")]
    Closed,

    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Receiver of published messages for one topic.
pub trait Subscriber<T>: Send {
    fn deliver(&mut self, message: Arc<T>) -> Result<(), DeliveryError>;
}

impl<T, F> Subscriber<T> for F
where
    F: FnMut(Arc<T>) -> Result<(), DeliveryError> + Send,
{
    fn deliver(&mut self, message: Arc<T>) -> Result<(), DeliveryError> {
        self(message)
    }
}

/// Subscriber that forwards every message into an unbounded channel.
pub fn channel_subscriber<T>(tx: UnboundedSender<Arc<T>>) -> impl Subscriber<T>
where
    T: Send + Sync + 'static,
{
    move |message: Arc<T>| -> Result<(), DeliveryError> {
        tx.send(message).map_err(|_| DeliveryError::Closed)
    }
}

/// Counts from a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Entry<T> {
    id: SubscriberId,
    subscriber: Box<dyn Subscriber<T>>,
}

/// Ordered subscriber list for one topic.
pub struct Register<T> {
    topic: Topic,
    entries: Vec<Entry<T>>,
    next_id: u64,
    total_failures: u64,
}

impl<T> Register<T> {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            entries: Vec::new(),
            next_id: 1,
            total_failures: 0,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Append a subscriber. Registering the same callback twice yields
    /// two independent entries.
    pub fn register<S>(&mut self, subscriber: S) -> SubscriberId
    where
        S: Subscriber<T> + 'static,
    {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            subscriber: Box::new(subscriber),
        });
        debug!(topic = %self.topic, subscriber = %id, total = self.entries.len(), "Subscriber registered");
        id
    }

    /// Remove a subscriber. Unknown ids are a no-op.
    pub fn unregister(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        let removed = self.entries.len() != before;
        if removed {
            debug!(topic = %self.topic, subscriber = %id, total = self.entries.len(), "Subscriber removed");
        }
        removed
    }

    /// Deliver `message` to every subscriber in registration order.
    pub fn publish(&mut self, message: Arc<T>) -> PublishReport {
        let mut report = PublishReport::default();
        let topic = self.topic;

        for entry in self.entries.iter_mut() {
            let payload = Arc::clone(&message);
            let outcome = catch_unwind(AssertUnwindSafe(|| entry.subscriber.deliver(payload)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(topic = %topic, subscriber = %entry.id, error = %e, "Subscriber delivery failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(topic = %topic, subscriber = %entry.id, "Subscriber panicked during delivery");
                }
            }
        }

        self.total_failures += report.failed as u64;
        report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Failed deliveries since creation.
    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }
}

impl<T> fmt::Debug for Register<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Register")
            .field("topic", &self.topic)
            .field("subscribers", &self.entries.len())
            .field("total_failures", &self.total_failures)
            .finish()
    }
}
