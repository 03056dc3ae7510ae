//! Process-wide collection of live events.
//!
//! The registry is the only thing that publishes or destroys events. Writes
//! (`start_event`, `remove_event`) are serialized by one write lock; readers
//! take a snapshot of `Arc`s and never hold the lock while they work.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::event::{Event, Rejection};

/// Live events keyed by id.
///
/// Ids are UUIDv7, so iteration order is creation order.
#[derive(Clone, Default)]
pub struct EventRegistry {
    events: Arc<RwLock<BTreeMap<Uuid, Arc<dyn Event>>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and publish `event`.
    ///
    /// Validation runs under the write lock, so a rejected event is never
    /// visible to anyone.
    pub async fn start_event<E: Event>(&self, event: E) -> Result<Arc<E>, Rejection> {
        let mut events = self.events.write().await;
        if let Err(rejection) = event.validate() {
            debug!(kind = event.name(), %rejection, "Event rejected");
            return Err(rejection);
        }

        let event = Arc::new(event);
        events.insert(event.id(), event.clone() as Arc<dyn Event>);
        info!(
            kind = event.name(),
            event_id = %event.id(),
            live = events.len(),
            "Event registered"
        );
        Ok(event)
    }

    /// Snapshot of every live event of kind `E`, oldest first.
    pub async fn get_events<E: Event>(&self) -> Vec<Arc<E>> {
        let snapshot: Vec<Arc<dyn Event>> = self.events.read().await.values().cloned().collect();
        snapshot
            .into_iter()
            .filter_map(|event| event.into_any().downcast::<E>().ok())
            .collect()
    }

    /// Remove an event. Removing an absent event is a no-op.
    pub async fn remove_event(&self, event_id: Uuid) -> bool {
        let removed = self.events.write().await.remove(&event_id);
        if let Some(event) = &removed {
            info!(kind = event.name(), %event_id, "Event removed");
        }
        removed.is_some()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DuelEvent, UserRef};

    fn duel(initiator: &str, wager: i64) -> DuelEvent {
        DuelEvent::new("streamer", UserRef::new(initiator), None, wager, 1_000)
    }

    #[tokio::test]
    async fn test_rejected_event_is_not_registered() {
        let registry = EventRegistry::new();
        for wager in [0, -5] {
            let result = registry.start_event(duel("alice", wager)).await;
            assert!(matches!(result, Err(Rejection::NonPositiveWager { .. })));
        }
        let self_duel =
            DuelEvent::new("streamer", "alice".into(), Some("ALICE".into()), 10, 1_000);
        assert!(registry.start_event(self_duel).await.is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_ordered_and_detached() {
        let registry = EventRegistry::new();
        let first = registry.start_event(duel("alice", 10)).await.unwrap();
        let second = registry.start_event(duel("bob", 20)).await.unwrap();

        let snapshot = registry.get_events::<DuelEvent>().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id(), first.id());
        assert_eq!(snapshot[1].id(), second.id());

        // Mutating the registry does not touch a snapshot already taken.
        assert!(registry.remove_event(first.id()).await);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.get_events::<DuelEvent>().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = EventRegistry::new();
        let event = registry.start_event(duel("alice", 10)).await.unwrap();
        assert!(registry.remove_event(event.id()).await);
        assert!(!registry.remove_event(event.id()).await);
        assert!(!registry.remove_event(Uuid::now_v7()).await);
        assert_eq!(registry.len().await, 0);
    }
}
