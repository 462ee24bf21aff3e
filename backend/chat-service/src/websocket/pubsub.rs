use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use uuid::Uuid;

use crate::websocket::events::EventEnvelope;
use crate::websocket::{ChatEvent, ConnectionRegistry};

fn channel_for_conversation(id: Uuid) -> String {
    format!("conversation:{id}")
}

/// Publishes events to the conversation channel so other nodes can fan them
/// out to their local subscribers.
#[derive(Clone)]
pub struct EventPublisher {
    manager: ConnectionManager,
    node_id: Uuid,
}

impl EventPublisher {
    pub fn new(manager: ConnectionManager, node_id: Uuid) -> Self {
        Self { manager, node_id }
    }

    pub async fn publish(&self, event: &ChatEvent) -> Result<(), String> {
        let envelope = EventEnvelope::new(self.node_id, event.clone());
        let payload = serde_json::to_string(&envelope).map_err(|e| e.to_string())?;
        let channel = channel_for_conversation(envelope.conversation_id);
        let mut conn = self.manager.clone();
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Re-broadcast events published by other nodes into the local registry.
/// Runs until the pub/sub connection drops. Events originating from this
/// node were already delivered locally and are skipped.
pub async fn start_psub_listener(
    client: Client,
    registry: ConnectionRegistry,
    node_id: Uuid,
) -> redis::RedisResult<()> {
    // Pub/sub requires a dedicated connection, not the multiplexed one.
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe("conversation:*").await?;
    let mut stream = pubsub.on_message();

    while let Some(msg) = stream.next().await {
        let payload: String = msg.get_payload()?;
        let envelope: EventEnvelope = match serde_json::from_str(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, channel = %msg.get_channel_name(), "dropping malformed pub/sub payload");
                continue;
            }
        };
        if envelope.origin_node == node_id {
            continue;
        }
        registry
            .broadcast(envelope.conversation_id, envelope.event)
            .await;
    }
    Ok(())
}
