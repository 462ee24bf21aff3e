use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::BadgeScope;
use crate::error::{AppError, AppResult};
use crate::models::{
    dm_key, Conversation, ConversationKind, ConversationMember, MemberProfile, MemberRole, Message,
    ReactionEntry,
};
use crate::store::{
    AppendOutcome, ChatStore, NewMessage, ReadReceipt, ToggleOutcome, CREATED_PREVIEW,
};

/// Infrastructure-free store with the same semantics as the Postgres
/// implementation. Backs the facade test-suite and demo deployments. All
/// mutating operations run under a single write lock, so an append's message
/// insert, summary refresh and counter increments are observed as one unit.
pub struct MemoryChatStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    conversations: HashMap<Uuid, Conversation>,
    dm_index: HashMap<String, Uuid>,
    // Ascending by (sent_at, id); the clock below makes sent_at strictly
    // monotonic, so plain push order is already sorted.
    messages: HashMap<Uuid, Vec<Message>>,
    message_owner: HashMap<Uuid, Uuid>,
    idempotency: HashMap<(Uuid, Uuid, String), Uuid>,
    last_sent_at: Option<DateTime<Utc>>,
}

impl State {
    /// Server clock for message timestamps. Strictly monotonic even when the
    /// wall clock stalls within one microsecond tick.
    fn next_sent_at(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_sent_at {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_sent_at = Some(now);
        now
    }
}

fn member_from(profile: &MemberProfile, role: MemberRole, joined_at: DateTime<Utc>) -> ConversationMember {
    ConversationMember {
        user_id: profile.user_id,
        display_name: profile.display_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        role,
        unread_count: 0,
        last_read_at: None,
        joined_at,
    }
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for MemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryChatStore {
    async fn create_direct(
        &self,
        creator: &MemberProfile,
        partner: &MemberProfile,
    ) -> AppResult<(Conversation, bool)> {
        let key = dm_key(creator.user_id, partner.user_id);
        let mut state = self.state.write().await;

        if let Some(id) = state.dm_index.get(&key) {
            let existing = state
                .conversations
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::NotFound("conversation".into()))?;
            return Ok((existing, false));
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Direct,
            name: None,
            icon: None,
            last_message_preview: Some(CREATED_PREVIEW.to_string()),
            last_message_at: None,
            created_at: now,
            members: vec![
                member_from(creator, MemberRole::Member, now),
                member_from(partner, MemberRole::Member, now),
            ],
        };
        state.dm_index.insert(key, conversation.id);
        state.messages.insert(conversation.id, Vec::new());
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok((conversation, true))
    }

    async fn create_group(
        &self,
        creator: &MemberProfile,
        name: &str,
        icon: Option<&str>,
        members: &[MemberProfile],
    ) -> AppResult<Conversation> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let mut member_rows = vec![member_from(creator, MemberRole::Owner, now)];
        for profile in members {
            if member_rows.iter().any(|m| m.user_id == profile.user_id) {
                continue;
            }
            member_rows.push(member_from(profile, MemberRole::Member, now));
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            name: Some(name.to_string()),
            icon: icon.map(str::to_string),
            last_message_preview: Some(CREATED_PREVIEW.to_string()),
            last_message_at: None,
            created_at: now,
            members: member_rows,
        };
        state.messages.insert(conversation.id, Vec::new());
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn conversations_for(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let state = self.state.read().await;
        let mut list: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.is_member(user_id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
        Ok(list)
    }

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state.conversations.get(&conversation_id).cloned())
    }

    async fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .conversations
            .get(&conversation_id)
            .map(|c| c.is_member(user_id))
            .unwrap_or(false))
    }

    async fn append_message(&self, new: NewMessage) -> AppResult<AppendOutcome> {
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(&new.conversation_id) {
            return Err(AppError::NotFound("conversation".into()));
        }

        if let Some(key) = &new.idempotency_key {
            let lookup = (new.conversation_id, new.sender.user_id, key.clone());
            if let Some(message_id) = state.idempotency.get(&lookup) {
                let existing = state
                    .messages
                    .get(&new.conversation_id)
                    .and_then(|list| list.iter().find(|m| m.id == *message_id))
                    .cloned()
                    .ok_or_else(|| AppError::NotFound("message".into()))?;
                return Ok(AppendOutcome {
                    message: existing,
                    deduplicated: true,
                });
            }
        }

        let sent_at = state.next_sent_at();
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            sender_id: new.sender.user_id,
            sender_display_name: new.sender.display_name.clone(),
            sender_avatar: new.sender.avatar_url.clone(),
            text: new.text.clone(),
            sent_at,
            reactions: Vec::new(),
        };

        state.message_owner.insert(message.id, new.conversation_id);
        if let Some(key) = &new.idempotency_key {
            state.idempotency.insert(
                (new.conversation_id, new.sender.user_id, key.clone()),
                message.id,
            );
        }
        state
            .messages
            .entry(new.conversation_id)
            .or_default()
            .push(message.clone());

        let conversation = state
            .conversations
            .get_mut(&new.conversation_id)
            .ok_or_else(|| AppError::NotFound("conversation".into()))?;
        conversation.last_message_preview = Some(new.text);
        conversation.last_message_at = Some(sent_at);
        for member in conversation.members.iter_mut() {
            if member.user_id != new.sender.user_id {
                member.unread_count += 1;
            }
        }

        Ok(AppendOutcome {
            message,
            deduplicated: false,
        })
    }

    async fn messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        before: Option<Uuid>,
    ) -> AppResult<Vec<Message>> {
        let state = self.state.read().await;
        let list = state
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();

        let end = match before {
            Some(cursor) => list
                .iter()
                .position(|m| m.id == cursor)
                .ok_or_else(|| AppError::NotFound("message".into()))?,
            None => list.len(),
        };
        let start = end.saturating_sub(limit.max(0) as usize);
        Ok(list[start..end].to_vec())
    }

    async fn message(&self, message_id: Uuid) -> AppResult<Option<Message>> {
        let state = self.state.read().await;
        let Some(conversation_id) = state.message_owner.get(&message_id) else {
            return Ok(None);
        };
        Ok(state
            .messages
            .get(conversation_id)
            .and_then(|list| list.iter().find(|m| m.id == message_id))
            .cloned())
    }

    async fn toggle_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<ToggleOutcome> {
        let mut state = self.state.write().await;
        let conversation_id = *state
            .message_owner
            .get(&message_id)
            .ok_or_else(|| AppError::NotFound("message".into()))?;
        let message = state
            .messages
            .get_mut(&conversation_id)
            .and_then(|list| list.iter_mut().find(|m| m.id == message_id))
            .ok_or_else(|| AppError::NotFound("message".into()))?;

        let added = match message.reactions.iter_mut().position(|e| e.emoji == emoji) {
            Some(index) if message.reactions[index].user_ids.contains(&user_id) => {
                let entry = &mut message.reactions[index];
                entry.user_ids.retain(|id| *id != user_id);
                // No zero-count entries persist
                if entry.user_ids.is_empty() {
                    message.reactions.remove(index);
                }
                false
            }
            Some(index) => {
                message.reactions[index].user_ids.push(user_id);
                true
            }
            None => {
                message.reactions.push(ReactionEntry {
                    emoji: emoji.to_string(),
                    user_ids: vec![user_id],
                });
                true
            }
        };

        Ok(ToggleOutcome {
            message: message.clone(),
            added,
        })
    }

    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt> {
        let mut state = self.state.write().await;
        let member = state
            .conversations
            .get_mut(&conversation_id)
            .and_then(|c| c.members.iter_mut().find(|m| m.user_id == user_id))
            .ok_or_else(|| AppError::NotFound("conversation".into()))?;

        let now = Utc::now();
        member.unread_count = 0;
        member.last_read_at = Some(now);
        Ok(ReadReceipt {
            conversation_id,
            user_id,
            last_read_at: now,
        })
    }

    async fn total_unread(&self, user_id: Uuid, scope: BadgeScope) -> AppResult<i64> {
        let state = self.state.read().await;
        let total = state
            .conversations
            .values()
            .filter(|c| scope == BadgeScope::All || c.kind == ConversationKind::Direct)
            .filter_map(|c| c.member(user_id))
            .map(|m| m.unread_count as i64)
            .sum();
        Ok(total)
    }
}
