use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One emoji on one message, with every user who applied it. A user id
/// appears at most once per entry; an entry with no users does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReactionEntry {
    pub emoji: String,
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_display_name: String,
    pub sender_avatar: Option<String>,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    /// Ordered by when each emoji first appeared on the message.
    pub reactions: Vec<ReactionEntry>,
}

impl Message {
    pub fn reaction(&self, emoji: &str) -> Option<&ReactionEntry> {
        self.reactions.iter().find(|r| r.emoji == emoji)
    }

    pub fn has_reacted(&self, user_id: Uuid, emoji: &str) -> bool {
        self.reaction(emoji)
            .map(|r| r.user_ids.contains(&user_id))
            .unwrap_or(false)
    }
}
