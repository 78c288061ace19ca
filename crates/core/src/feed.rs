//! Live event snapshots
//!
//! Every committed change publishes the fresh snapshot. Subscribers re-run
//! the participation rules on each one instead of patching old state.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::Event;

/// Default number of snapshots a slow subscriber may fall behind
pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct EventSnapshot {
    pub event_id: Uuid,
    /// `None` once the event has been deleted
    pub event: Option<Event>,
}

#[derive(Debug, Clone)]
pub struct SnapshotFeed {
    tx: broadcast::Sender<EventSnapshot>,
}

impl SnapshotFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventSnapshot> {
        self.tx.subscribe()
    }

    pub fn publish(&self, snapshot: EventSnapshot) {
        // No subscribers is not an error
        let _ = self.tx.send(snapshot);
    }

    pub fn publish_event(&self, event: &Event) {
        self.publish(EventSnapshot {
            event_id: event.id,
            event: Some(event.clone()),
        });
    }

    pub fn publish_deleted(&self, event_id: Uuid) {
        self.publish(EventSnapshot {
            event_id,
            event: None,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SnapshotFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let feed = SnapshotFeed::default();
        feed.publish_deleted(Uuid::new_v4());
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_sees_deletion() {
        let feed = SnapshotFeed::new(4);
        let mut rx = feed.subscribe();
        let id = Uuid::new_v4();

        feed.publish_deleted(id);

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.event_id, id);
        assert!(snapshot.event.is_none());
    }
}
