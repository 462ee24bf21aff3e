use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Message;
use crate::store::{ChatStore, ToggleOutcome};

// Family emoji with ZWJ sequences run past 20 bytes.
const MAX_EMOJI_BYTES: usize = 32;

/// Per-message emoji tally with toggle semantics: a flip adds the user's
/// membership in the emoji's entry if absent and removes it if present.
/// Storage is one row per (message, user, emoji), so toggles of different
/// emoji on the same message never clobber each other.
pub struct ReactionAggregator {
    store: Arc<dyn ChatStore>,
}

impl ReactionAggregator {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    pub async fn toggle(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<ToggleOutcome> {
        let emoji = emoji.trim();
        if emoji.is_empty() || emoji.len() > MAX_EMOJI_BYTES {
            return Err(AppError::Validation("invalid emoji".into()));
        }
        self.store.toggle_reaction(message_id, user_id, emoji).await
    }

    pub async fn message(&self, message_id: Uuid) -> AppResult<Message> {
        self.store
            .message(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("message".into()))
    }
}
