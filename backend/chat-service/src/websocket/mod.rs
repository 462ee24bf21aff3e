use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod handlers;
pub mod pubsub;

pub use events::ChatEvent;

/// Fan-out hub for live subscriptions, keyed by conversation id. Dropping a
/// receiver detaches the subscription; the registry prunes closed channels on
/// the next broadcast for that conversation.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Vec<UnboundedSender<ChatEvent>>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, conversation_id: Uuid) -> UnboundedReceiver<ChatEvent> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.entry(conversation_id).or_default().push(tx);
        rx
    }

    pub async fn broadcast(&self, conversation_id: Uuid, event: ChatEvent) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&conversation_id) {
            list.retain(|sender| sender.send(event.clone()).is_ok());
            if list.is_empty() {
                guard.remove(&conversation_id);
            }
        }
    }

    pub async fn subscriber_count(&self, conversation_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard.get(&conversation_id).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn read_event(conversation_id: Uuid) -> ChatEvent {
        ChatEvent::ReadMarked {
            conversation_id,
            user_id: Uuid::new_v4(),
            last_read_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let registry = ConnectionRegistry::new();
        let conversation_id = Uuid::new_v4();
        let mut rx1 = registry.subscribe(conversation_id).await;
        let mut rx2 = registry.subscribe(conversation_id).await;

        registry
            .broadcast(conversation_id, read_event(conversation_id))
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_next_broadcast() {
        let registry = ConnectionRegistry::new();
        let conversation_id = Uuid::new_v4();
        let rx = registry.subscribe(conversation_id).await;
        let mut live = registry.subscribe(conversation_id).await;
        assert_eq!(registry.subscriber_count(conversation_id).await, 2);

        drop(rx);
        registry
            .broadcast(conversation_id, read_event(conversation_id))
            .await;

        assert_eq!(registry.subscriber_count(conversation_id).await, 1);
        assert!(live.try_recv().is_ok());
    }

    #[tokio::test]
    async fn events_stay_scoped_to_their_conversation() {
        let registry = ConnectionRegistry::new();
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut rx = registry.subscribe(mine).await;

        registry.broadcast(other, read_event(other)).await;
        assert!(rx.try_recv().is_err());
    }
}
