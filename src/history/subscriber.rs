//! # History Subscriber
//!
//! Single consumer that drains a bus subscription into the shared
//! [`HistoryStore`]. Because there is only one writer, store mutation is
//! serialized by construction; the lock only guards against readers.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;

use super::store::HistoryStore;
use crate::events::{EventBus, EventReceiver};

/// History store shared between the subscriber (writer) and the console
pub type SharedHistory = Arc<RwLock<HistoryStore>>;

/// Create an empty shared store with the given capacity
pub fn shared_history(capacity: usize) -> SharedHistory {
    Arc::new(RwLock::new(HistoryStore::new(capacity)))
}

/// Keeps the history store in sync with the event bus
pub struct HistorySubscriber {
    receiver: EventReceiver,
    store: SharedHistory,
}

impl HistorySubscriber {
    /// Subscribe to `bus` now so no event published after this call is missed
    pub fn new(bus: &dyn EventBus, store: SharedHistory) -> Self {
        Self {
            receiver: bus.subscribe(),
            store,
        }
    }

    /// Subscribe and start consuming on a background task
    pub fn spawn(bus: &dyn EventBus, store: SharedHistory) -> JoinHandle<()> {
        let subscriber = Self::new(bus, store);
        tokio::spawn(subscriber.run())
    }

    /// Consume events until every publisher is gone
    pub async fn run(mut self) {
        tracing::debug!("History subscriber started");
        while let Some(event) = self.receiver.recv().await {
            self.store
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .apply(&event);
        }
        tracing::debug!("History subscriber stopped: event bus closed");
    }

    /// Apply every event already queued without waiting for more
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.receiver.try_recv() {
            self.store
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .apply(&event);
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{LogEvent, RecordId, SimpleEventBus};
    use crate::history::RecordState;
    use bytes::Bytes;

    #[test]
    fn subscriber_should_apply_queued_events() {
        let bus = SimpleEventBus::new();
        let store = shared_history(10);
        let mut subscriber = HistorySubscriber::new(&bus, Arc::clone(&store));
        let id = RecordId::new(1);

        bus.publish(LogEvent::request(id, "GET", "/a", Vec::new(), Bytes::new()));
        bus.publish(LogEvent::response(id, 204, Vec::new(), false));
        bus.publish(LogEvent::complete(id));

        assert_eq!(subscriber.drain_pending(), 3);
        let store = store.read().unwrap();
        let record = store.get_by_index(1).unwrap();
        assert_eq!(record.response_status(), Some(204));
        assert_eq!(record.state(), RecordState::Completed);
    }

    #[tokio::test]
    async fn spawned_subscriber_should_stop_when_bus_is_dropped() {
        let bus = SimpleEventBus::new();
        let store = shared_history(10);
        let handle = HistorySubscriber::spawn(&bus, Arc::clone(&store));

        let id = RecordId::new(1);
        bus.publish(LogEvent::request(id, "GET", "/gone", Vec::new(), Bytes::new()));
        bus.publish(LogEvent::error(id, "connection refused"));
        drop(bus);

        handle.await.unwrap();
        let store = store.read().unwrap();
        assert_eq!(store.stats().failed, 1);
        assert_eq!(
            store.get_by_index(1).unwrap().error(),
            Some("connection refused")
        );
    }
}
