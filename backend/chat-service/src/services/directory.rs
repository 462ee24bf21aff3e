use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, MemberProfile};
use crate::store::ChatStore;

/// Owns the set of conversations a user belongs to: listing, direct-message
/// resolution and group creation. DM deduplication is enforced by the store's
/// unique key over the sorted member pair, not by scanning here, so two
/// concurrent create-or-get calls cannot race a duplicate into existence.
pub struct ConversationDirectory {
    store: Arc<dyn ChatStore>,
}

impl ConversationDirectory {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// The caller's conversations, newest activity first.
    pub async fn list(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        self.store.conversations_for(user_id).await
    }

    pub async fn get(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        self.store
            .conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("conversation".into()))
    }

    pub async fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        self.store.is_member(conversation_id, user_id).await
    }

    /// Resolve or create the direct conversation with `partner`. The boolean
    /// is true when this call created it.
    pub async fn create_or_get_dm(
        &self,
        creator: &MemberProfile,
        partner: &MemberProfile,
    ) -> AppResult<(Conversation, bool)> {
        if creator.user_id == partner.user_id {
            return Err(AppError::Validation(
                "cannot start a direct conversation with yourself".into(),
            ));
        }
        self.store.create_direct(creator, partner).await
    }

    /// Create a group chat owned by `creator`. Membership is the given
    /// members plus the creator, deduplicated.
    pub async fn create_group(
        &self,
        creator: &MemberProfile,
        name: &str,
        icon: Option<&str>,
        members: &[MemberProfile],
    ) -> AppResult<Conversation> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("group name cannot be blank".into()));
        }

        let mut others: Vec<MemberProfile> = Vec::new();
        for profile in members {
            if profile.user_id == creator.user_id {
                continue;
            }
            if others.iter().any(|m| m.user_id == profile.user_id) {
                continue;
            }
            others.push(profile.clone());
        }
        if others.is_empty() {
            return Err(AppError::Validation(
                "a group needs at least one member besides the creator".into(),
            ));
        }

        self.store.create_group(creator, name, icon, &others).await
    }
}
