use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::config::{BadgeScope, Config};
use crate::error::{AppError, AppResult};
use crate::metrics::{MESSAGES_SENT_TOTAL, REACTIONS_TOGGLED_TOTAL};
use crate::models::{Conversation, MemberProfile, Message};
use crate::services::{ConversationDirectory, MessageStream, ReactionAggregator, UnreadLedger};
use crate::store::{AppendOutcome, ChatStore, ReadReceipt, ToggleOutcome};
use crate::websocket::pubsub::EventPublisher;
use crate::websocket::{ChatEvent, ConnectionRegistry};

/// The messaging facade. Composes the conversation directory, message
/// stream, reaction aggregator and unread ledger behind the one surface the
/// HTTP/WS layer talks to, and owns event fan-out: local registry first, then
/// Redis for the other nodes.
///
/// Errors are propagated, never swallowed. Validation failures surface
/// before any store interaction; a failed store write publishes nothing.
pub struct ChatService {
    directory: ConversationDirectory,
    stream: MessageStream,
    reactions: ReactionAggregator,
    unread: UnreadLedger,
    registry: ConnectionRegistry,
    publisher: Option<EventPublisher>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        config: &Config,
        registry: ConnectionRegistry,
        publisher: Option<EventPublisher>,
    ) -> Self {
        Self {
            directory: ConversationDirectory::new(store.clone()),
            stream: MessageStream::new(store.clone(), config.max_message_length),
            reactions: ReactionAggregator::new(store.clone()),
            unread: UnreadLedger::new(store, config.unread_badge_scope),
            registry,
            publisher,
        }
    }

    // ============================================
    // Conversation directory
    // ============================================

    pub async fn list_conversations(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        self.directory.list(user_id).await
    }

    /// Fetch one conversation; members only.
    pub async fn get_conversation(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self.directory.get(conversation_id).await?;
        if !conversation.is_member(user_id) {
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }

    pub async fn create_or_get_dm(
        &self,
        creator: &MemberProfile,
        partner: &MemberProfile,
    ) -> AppResult<(Conversation, bool)> {
        let (conversation, created) = self.directory.create_or_get_dm(creator, partner).await?;
        if created {
            tracing::info!(
                conversation_id = %conversation.id,
                creator = %creator.user_id,
                partner = %partner.user_id,
                "direct conversation created"
            );
        }
        Ok((conversation, created))
    }

    pub async fn create_group_chat(
        &self,
        creator: &MemberProfile,
        name: &str,
        icon: Option<&str>,
        members: &[MemberProfile],
    ) -> AppResult<Conversation> {
        let conversation = self
            .directory
            .create_group(creator, name, icon, members)
            .await?;
        tracing::info!(
            conversation_id = %conversation.id,
            creator = %creator.user_id,
            member_count = conversation.members.len(),
            "group conversation created"
        );
        Ok(conversation)
    }

    // ============================================
    // Message stream
    // ============================================

    /// Append a message as `sender`. The store applies the insert, the
    /// conversation summary refresh and the other members' unread increments
    /// as one atomic unit; the `message.new` event goes out only after that
    /// unit committed, and not at all for an idempotency-key replay.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender: &MemberProfile,
        text: &str,
        idempotency_key: Option<String>,
    ) -> AppResult<AppendOutcome> {
        if !self.directory.is_member(conversation_id, sender.user_id).await? {
            return Err(AppError::Forbidden);
        }

        let outcome = self
            .stream
            .append(conversation_id, sender.clone(), text, idempotency_key)
            .await?;
        if outcome.deduplicated {
            tracing::debug!(
                conversation_id = %conversation_id,
                message_id = %outcome.message.id,
                "send replayed through idempotency key"
            );
            return Ok(outcome);
        }

        MESSAGES_SENT_TOTAL.inc();
        self.publish(ChatEvent::MessageNew {
            message: outcome.message.clone(),
        })
        .await;
        Ok(outcome)
    }

    /// Ascending history page; members only.
    pub async fn messages(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        limit: Option<i64>,
        before: Option<Uuid>,
    ) -> AppResult<Vec<Message>> {
        if !self.directory.is_member(conversation_id, user_id).await? {
            return Err(AppError::Forbidden);
        }
        self.stream.history(conversation_id, limit, before).await
    }

    /// Backlog plus live event receiver for one conversation. The backlog
    /// is the newest history page (default 50 messages), not the full
    /// stream; older messages are reachable through the paginated history
    /// endpoint. The receiver is registered before the backlog read so no
    /// event published between the two is lost; dropping it tears the
    /// subscription down.
    pub async fn subscribe(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<(Vec<Message>, UnboundedReceiver<ChatEvent>)> {
        if !self.directory.is_member(conversation_id, user_id).await? {
            return Err(AppError::Forbidden);
        }
        let rx = self.registry.subscribe(conversation_id).await;
        let backlog = self.stream.history(conversation_id, None, None).await?;
        Ok((backlog, rx))
    }

    // ============================================
    // Reactions
    // ============================================

    /// Flip the caller's (message, emoji) membership. The broadcast carries
    /// the converged entry list after the flip, so subscribers converge
    /// regardless of delivery order.
    pub async fn toggle_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<ToggleOutcome> {
        let message = self.reactions.message(message_id).await?;
        if !self
            .directory
            .is_member(message.conversation_id, user_id)
            .await?
        {
            return Err(AppError::Forbidden);
        }

        let outcome = self.reactions.toggle(message_id, user_id, emoji).await?;
        REACTIONS_TOGGLED_TOTAL.inc();
        self.publish(ChatEvent::ReactionUpdated {
            conversation_id: outcome.message.conversation_id,
            message_id,
            user_id,
            emoji: emoji.trim().to_string(),
            added: outcome.added,
            reactions: outcome.message.reactions.clone(),
        })
        .await;
        Ok(outcome)
    }

    // ============================================
    // Unread ledger
    // ============================================

    pub async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt> {
        if !self.directory.is_member(conversation_id, user_id).await? {
            return Err(AppError::Forbidden);
        }
        let receipt = self.unread.mark_read(conversation_id, user_id).await?;
        self.publish(ChatEvent::ReadMarked {
            conversation_id,
            user_id,
            last_read_at: receipt.last_read_at,
        })
        .await;
        Ok(receipt)
    }

    pub async fn total_unread(&self, user_id: Uuid, scope: Option<BadgeScope>) -> AppResult<i64> {
        self.unread.total_unread(user_id, scope).await
    }

    pub async fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        self.directory.is_member(conversation_id, user_id).await
    }

    // ============================================
    // Fan-out
    // ============================================

    /// Local registry first, then Redis for other nodes. A publish failure
    /// after a committed store write is logged, not surfaced: local
    /// subscribers already have the event and the write stands.
    async fn publish(&self, event: ChatEvent) {
        self.registry
            .broadcast(event.conversation_id(), event.clone())
            .await;
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(&event).await {
                tracing::warn!(
                    error = %e,
                    event_type = event.event_type(),
                    conversation_id = %event.conversation_id(),
                    "failed to publish event to redis"
                );
            }
        }
    }
}
