use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================
// Enums
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

// ============================================
// Domain types
// ============================================

/// Deterministic key for a direct conversation: the sorted uuid pair. Both
/// orderings of the same pair produce the same key, so a UNIQUE constraint
/// on it collapses concurrent create-or-get calls onto one row.
pub fn dm_key(a: Uuid, b: Uuid) -> String {
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}

/// Identity snapshot used when a user joins a conversation or sends a
/// message. Supplied by the identity service; never refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ConversationMember {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: MemberRole,
    pub unread_count: i32,
    pub last_read_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub members: Vec<ConversationMember>,
}

impl Conversation {
    pub fn member(&self, user_id: Uuid) -> Option<&ConversationMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member(user_id).is_some()
    }

    pub fn member_ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|m| m.user_id).collect()
    }

    pub fn unread_for(&self, user_id: Uuid) -> i32 {
        self.member(user_id).map(|m| m.unread_count).unwrap_or(0)
    }

    /// Name and icon as the given viewer sees them: groups use their own
    /// name/icon, direct conversations show the partner's snapshot.
    pub fn display_for(&self, viewer: Uuid) -> (Option<String>, Option<String>) {
        match self.kind {
            ConversationKind::Group => (self.name.clone(), self.icon.clone()),
            ConversationKind::Direct => {
                let partner = self.members.iter().find(|m| m.user_id != viewer);
                (
                    partner.map(|m| m.display_name.clone()),
                    partner.and_then(|m| m.avatar_url.clone()),
                )
            }
        }
    }

    /// Sort key for conversation lists: newest activity first, with creation
    /// time standing in for conversations that never received a message.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: Uuid, name: &str) -> ConversationMember {
        ConversationMember {
            user_id,
            display_name: name.to_string(),
            avatar_url: Some(format!("https://cdn.dadspace.dev/avatars/{name}.png")),
            role: MemberRole::Member,
            unread_count: 0,
            last_read_at: None,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn direct_conversation_displays_partner_snapshot() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Direct,
            name: None,
            icon: None,
            last_message_preview: None,
            last_message_at: None,
            created_at: Utc::now(),
            members: vec![member(alice, "alice"), member(bob, "bob")],
        };

        let (name, icon) = conversation.display_for(alice);
        assert_eq!(name.as_deref(), Some("bob"));
        assert!(icon.unwrap().contains("bob"));

        let (name, _) = conversation.display_for(bob);
        assert_eq!(name.as_deref(), Some("alice"));
    }

    #[test]
    fn group_conversation_displays_its_own_metadata() {
        let creator = Uuid::new_v4();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            name: Some("Saturday football".to_string()),
            icon: Some("⚽".to_string()),
            last_message_preview: None,
            last_message_at: None,
            created_at: Utc::now(),
            members: vec![member(creator, "creator")],
        };

        let (name, icon) = conversation.display_for(creator);
        assert_eq!(name.as_deref(), Some("Saturday football"));
        assert_eq!(icon.as_deref(), Some("⚽"));
    }

    #[test]
    fn dm_key_ignores_argument_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dm_key(a, b), dm_key(b, a));
        assert_ne!(dm_key(a, b), dm_key(a, Uuid::new_v4()));
    }

    #[test]
    fn activity_falls_back_to_creation_time() {
        let created = Utc::now();
        let mut conversation = Conversation {
            id: Uuid::new_v4(),
            kind: ConversationKind::Group,
            name: Some("quiet".into()),
            icon: None,
            last_message_preview: None,
            last_message_at: None,
            created_at: created,
            members: vec![],
        };
        assert_eq!(conversation.activity_at(), created);

        let later = created + chrono::Duration::minutes(5);
        conversation.last_message_at = Some(later);
        assert_eq!(conversation.activity_at(), later);
    }
}
