use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::BadgeScope;
use crate::error::AppResult;
use crate::models::{Conversation, MemberProfile, Message};

pub mod memory;
pub mod postgres;

pub use memory::MemoryChatStore;
pub use postgres::PostgresChatStore;

/// Preview shown before the first message arrives.
pub const CREATED_PREVIEW: &str = "Chat created";

/// A message ready to append. Text is already validated and trimmed by the
/// service layer; `sent_at` is assigned by the store clock, never taken from
/// the caller.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender: MemberProfile,
    pub text: String,
    pub idempotency_key: Option<String>,
}

/// Result of an append. `deduplicated` is true when the idempotency key
/// matched an earlier send, in which case `message` is the original row and
/// no counters or summaries were touched.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub message: Message,
    pub deduplicated: bool,
}

/// Result of a reaction toggle: the message with its converged reaction list
/// after the flip, and whether the flip added (`true`) or removed (`false`)
/// the user's reaction.
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub message: Message,
    pub added: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadReceipt {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub last_read_at: DateTime<Utc>,
}

/// Storage contract for the messaging core. Implementations must uphold:
/// one direct conversation per unordered member pair; appends update the
/// message log, the conversation summary and every other member's unread
/// count as a single atomic unit; reaction rows are scoped to
/// (message, user, emoji); unread counts only move through appends and
/// `mark_read`.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Create the direct conversation for this pair, or return the existing
    /// one. The boolean is true when a new conversation was created.
    async fn create_direct(
        &self,
        creator: &MemberProfile,
        partner: &MemberProfile,
    ) -> AppResult<(Conversation, bool)>;

    /// Create a group conversation. `members` excludes the creator, who is
    /// recorded with the `owner` role.
    async fn create_group(
        &self,
        creator: &MemberProfile,
        name: &str,
        icon: Option<&str>,
        members: &[MemberProfile],
    ) -> AppResult<Conversation>;

    /// Conversations the user belongs to, newest activity first.
    async fn conversations_for(&self, user_id: Uuid) -> AppResult<Vec<Conversation>>;

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>>;

    async fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<bool>;

    /// Append a message: insert it, refresh the conversation summary and
    /// increment every other member's unread count, atomically.
    async fn append_message(&self, new: NewMessage) -> AppResult<AppendOutcome>;

    /// Ascending page of messages. `before` is an exclusive message-id
    /// cursor; `limit` bounds the page size.
    async fn messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        before: Option<Uuid>,
    ) -> AppResult<Vec<Message>>;

    async fn message(&self, message_id: Uuid) -> AppResult<Option<Message>>;

    /// Flip the (message, user, emoji) membership and return the converged
    /// state.
    async fn toggle_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<ToggleOutcome>;

    /// Zero the member's unread count and stamp `last_read_at`.
    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt>;

    /// Sum of the user's unread counts over the conversations the scope
    /// includes.
    async fn total_unread(&self, user_id: Uuid, scope: BadgeScope) -> AppResult<i64>;
}
