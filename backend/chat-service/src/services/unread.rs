use std::sync::Arc;
use uuid::Uuid;

use crate::config::BadgeScope;
use crate::error::AppResult;
use crate::store::{ChatStore, ReadReceipt};

/// Per-member unread bookkeeping. Counters only move through two paths: the
/// store's append increments every member but the sender, and `mark_read`
/// zeroes the reader's own counter. Nothing else may touch them.
pub struct UnreadLedger {
    store: Arc<dyn ChatStore>,
    default_scope: BadgeScope,
}

impl UnreadLedger {
    pub fn new(store: Arc<dyn ChatStore>, default_scope: BadgeScope) -> Self {
        Self {
            store,
            default_scope,
        }
    }

    /// Zero the reader's counter and stamp `last_read_at`. Idempotent; safe
    /// to retry blindly and re-invoked by clients whenever new messages
    /// arrive in the conversation they have open.
    pub async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt> {
        self.store.mark_read(conversation_id, user_id).await
    }

    /// Aggregate badge count. The product default only counts direct
    /// conversations; pass an explicit scope to include groups.
    pub async fn total_unread(&self, user_id: Uuid, scope: Option<BadgeScope>) -> AppResult<i64> {
        let scope = scope.unwrap_or(self.default_scope);
        self.store.total_unread(user_id, scope).await
    }
}
