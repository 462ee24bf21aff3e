use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{MemberProfile, Message};
use crate::store::{AppendOutcome, ChatStore, NewMessage};

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 100;

/// The per-conversation append-only message log. Validation happens here,
/// before any store interaction; the store does the atomic
/// append-summary-counters write and assigns `sent_at` from its own clock.
pub struct MessageStream {
    store: Arc<dyn ChatStore>,
    max_message_length: usize,
}

impl MessageStream {
    pub fn new(store: Arc<dyn ChatStore>, max_message_length: usize) -> Self {
        Self {
            store,
            max_message_length,
        }
    }

    pub async fn append(
        &self,
        conversation_id: Uuid,
        sender: MemberProfile,
        text: &str,
        idempotency_key: Option<String>,
    ) -> AppResult<AppendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("message text cannot be empty".into()));
        }
        if text.chars().count() > self.max_message_length {
            return Err(AppError::Validation(format!(
                "message text exceeds {} characters",
                self.max_message_length
            )));
        }

        self.store
            .append_message(NewMessage {
                conversation_id,
                sender,
                text: text.to_string(),
                idempotency_key,
            })
            .await
    }

    /// Ascending page of history. `before` is an exclusive message-id cursor
    /// for walking backwards; `limit` is clamped to [1, 100], defaulting
    /// to 50.
    pub async fn history(
        &self,
        conversation_id: Uuid,
        limit: Option<i64>,
        before: Option<Uuid>,
    ) -> AppResult<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        self.store.messages(conversation_id, limit, before).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryChatStore;

    fn sender() -> MemberProfile {
        MemberProfile {
            user_id: Uuid::new_v4(),
            display_name: "sender".to_string(),
            avatar_url: None,
        }
    }

    fn stream() -> MessageStream {
        MessageStream::new(Arc::new(MemoryChatStore::new()), 40)
    }

    #[tokio::test]
    async fn whitespace_only_text_is_rejected_before_the_store() {
        let stream = stream();
        // Conversation id is bogus: validation must fire first.
        let err = stream
            .append(Uuid::new_v4(), sender(), "   \n\t ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn oversized_text_is_rejected() {
        let stream = stream();
        let long = "x".repeat(41);
        let err = stream
            .append(Uuid::new_v4(), sender(), &long, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn text_is_trimmed_on_append() {
        let store = Arc::new(MemoryChatStore::new());
        let stream = MessageStream::new(store.clone(), 4000);
        let alice = sender();
        let bob = sender();
        let (conversation, _) = store.create_direct(&alice, &bob).await.unwrap();

        let outcome = stream
            .append(conversation.id, alice, "  hello  ", None)
            .await
            .unwrap();
        assert_eq!(outcome.message.text, "hello");
        assert!(!outcome.deduplicated);
    }
}
