//! # Event Bus
//!
//! Central event distribution between the proxy connection tasks and
//! the subscribers that keep history and render live traffic.

use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

use super::types::LogEvent;

/// Receiving side of a bus subscription
pub type EventReceiver = mpsc::UnboundedReceiver<LogEvent>;

/// Event bus for decoupled communication between components
///
/// Publishing must be safe from many connection tasks at once and must
/// never block the caller.
pub trait EventBus: Send + Sync {
    /// Publish an event to every current subscriber
    fn publish(&self, event: LogEvent);

    /// Subscribe to all events published from now on
    fn subscribe(&self) -> EventReceiver;

    /// Number of live subscribers
    fn subscriber_count(&self) -> usize;
}

/// Simple in-memory event bus implementation
///
/// Each subscriber owns an unbounded channel, so a slow consumer never
/// stalls a publisher. The subscriber list lock is held for the whole
/// fan-out, which gives every subscriber the same global event order.
pub struct SimpleEventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<LogEvent>>>,
}

impl SimpleEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl Default for SimpleEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for SimpleEventBus {
    fn publish(&self, event: LogEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        tracing::debug!(
            "Publishing {} event for {} to {} subscribers",
            event.kind.label(),
            event.record_id,
            subscribers.len()
        );

        // Dropped receivers are pruned here
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    fn subscribe(&self) -> EventReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
