use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::BadgeScope;
use crate::error::{AppError, AppResult};
use crate::models::{
    dm_key, Conversation, ConversationKind, ConversationMember, MemberProfile, Message,
    ReactionEntry,
};
use crate::store::{
    AppendOutcome, ChatStore, NewMessage, ReadReceipt, ToggleOutcome, CREATED_PREVIEW,
};

#[derive(Clone)]
pub struct PostgresChatStore {
    pool: PgPool,
}

// ============================================
// Row types
// ============================================

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    kind: ConversationKind,
    name: Option<String>,
    icon: Option<String>,
    last_message_preview: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self, members: Vec<ConversationMember>) -> Conversation {
        Conversation {
            id: self.id,
            kind: self.kind,
            name: self.name,
            icon: self.icon,
            last_message_preview: self.last_message_preview,
            last_message_at: self.last_message_at,
            created_at: self.created_at,
            members,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    conversation_id: Uuid,
    user_id: Uuid,
    display_name: String,
    avatar_url: Option<String>,
    role: crate::models::MemberRole,
    unread_count: i32,
    last_read_at: Option<DateTime<Utc>>,
    joined_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_member(self) -> ConversationMember {
        ConversationMember {
            user_id: self.user_id,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            role: self.role,
            unread_count: self.unread_count,
            last_read_at: self.last_read_at,
            joined_at: self.joined_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    sender_display_name: String,
    sender_avatar: Option<String>,
    text: String,
    sent_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self, reactions: Vec<ReactionEntry>) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            sender_display_name: self.sender_display_name,
            sender_avatar: self.sender_avatar,
            text: self.text,
            sent_at: self.sent_at,
            reactions,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReactionRow {
    message_id: Uuid,
    emoji: String,
    user_id: Uuid,
}

// ============================================
// Store
// ============================================

impl PostgresChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn members_of(&self, conversation_id: Uuid) -> AppResult<Vec<ConversationMember>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT conversation_id, user_id, display_name, avatar_url, role,
                   unread_count, last_read_at, joined_at
            FROM conversation_members
            WHERE conversation_id = $1
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MemberRow::into_member).collect())
    }

    /// Reaction entries per message, entries ordered by when each emoji first
    /// appeared, user ids within an entry ordered by reaction time.
    async fn load_reactions(
        &self,
        message_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<ReactionEntry>>> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, ReactionRow>(
            r#"
            SELECT message_id, emoji, user_id
            FROM message_reactions
            WHERE message_id = ANY($1)
            ORDER BY message_id, created_at, user_id
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_message: HashMap<Uuid, Vec<ReactionEntry>> = HashMap::new();
        for row in rows {
            let entries = by_message.entry(row.message_id).or_default();
            match entries.iter_mut().find(|e| e.emoji == row.emoji) {
                Some(entry) => entry.user_ids.push(row.user_id),
                None => entries.push(ReactionEntry {
                    emoji: row.emoji,
                    user_ids: vec![row.user_id],
                }),
            }
        }
        Ok(by_message)
    }

    async fn message_by_idempotency_key(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        key: &str,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, sender_display_name,
                   sender_avatar, text, sent_at
            FROM messages
            WHERE conversation_id = $1 AND sender_id = $2 AND idempotency_key = $3
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let mut reactions = self.load_reactions(&[row.id]).await?;
                let entries = reactions.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_message(entries)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl ChatStore for PostgresChatStore {
    async fn create_direct(
        &self,
        creator: &MemberProfile,
        partner: &MemberProfile,
    ) -> AppResult<(Conversation, bool)> {
        let key = dm_key(creator.user_id, partner.user_id);

        let mut tx = self.pool.begin().await?;
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO conversations (id, kind, dm_key, last_message_preview)
            VALUES ($1, 'direct', $2, $3)
            ON CONFLICT (dm_key) WHERE dm_key IS NOT NULL DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&key)
        .bind(CREATED_PREVIEW)
        .fetch_optional(&mut *tx)
        .await?;

        let (id, created) = match inserted {
            Some((id,)) => {
                for profile in [creator, partner] {
                    sqlx::query(
                        r#"
                        INSERT INTO conversation_members
                            (conversation_id, user_id, display_name, avatar_url, role)
                        VALUES ($1, $2, $3, $4, 'member')
                        ON CONFLICT (conversation_id, user_id) DO NOTHING
                        "#,
                    )
                    .bind(id)
                    .bind(profile.user_id)
                    .bind(&profile.display_name)
                    .bind(&profile.avatar_url)
                    .execute(&mut *tx)
                    .await?;
                }
                tx.commit().await?;
                (id, true)
            }
            None => {
                // Another call won the race; the unique key points at its row.
                tx.rollback().await?;
                let (id,): (Uuid,) =
                    sqlx::query_as(r#"SELECT id FROM conversations WHERE dm_key = $1"#)
                        .bind(&key)
                        .fetch_one(&self.pool)
                        .await?;
                (id, false)
            }
        };

        let conversation = self
            .conversation(id)
            .await?
            .ok_or_else(|| AppError::NotFound("conversation".into()))?;
        Ok((conversation, created))
    }

    async fn create_group(
        &self,
        creator: &MemberProfile,
        name: &str,
        icon: Option<&str>,
        members: &[MemberProfile],
    ) -> AppResult<Conversation> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO conversations (id, kind, name, icon, last_message_preview)
            VALUES ($1, 'group', $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(icon)
        .bind(CREATED_PREVIEW)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_members
                (conversation_id, user_id, display_name, avatar_url, role)
            VALUES ($1, $2, $3, $4, 'owner')
            "#,
        )
        .bind(id)
        .bind(creator.user_id)
        .bind(&creator.display_name)
        .bind(&creator.avatar_url)
        .execute(&mut *tx)
        .await?;

        for profile in members {
            sqlx::query(
                r#"
                INSERT INTO conversation_members
                    (conversation_id, user_id, display_name, avatar_url, role)
                VALUES ($1, $2, $3, $4, 'member')
                ON CONFLICT (conversation_id, user_id) DO NOTHING
                "#,
            )
            .bind(id)
            .bind(profile.user_id)
            .bind(&profile.display_name)
            .bind(&profile.avatar_url)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.conversation(id)
            .await?
            .ok_or_else(|| AppError::NotFound("conversation".into()))
    }

    async fn conversations_for(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT c.id, c.kind, c.name, c.icon, c.last_message_preview,
                   c.last_message_at, c.created_at
            FROM conversations c
            JOIN conversation_members cm ON cm.conversation_id = c.id
            WHERE cm.user_id = $1
            ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let member_rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT conversation_id, user_id, display_name, avatar_url, role,
                   unread_count, last_read_at, joined_at
            FROM conversation_members
            WHERE conversation_id = ANY($1)
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut members_by_conversation: HashMap<Uuid, Vec<ConversationMember>> = HashMap::new();
        for row in member_rows {
            members_by_conversation
                .entry(row.conversation_id)
                .or_default()
                .push(row.into_member());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let members = members_by_conversation.remove(&row.id).unwrap_or_default();
                row.into_conversation(members)
            })
            .collect())
    }

    async fn conversation(&self, conversation_id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, kind, name, icon, last_message_preview, last_message_at, created_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let members = self.members_of(conversation_id).await?;
                Ok(Some(row.into_conversation(members)))
            }
            None => Ok(None),
        }
    }

    async fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM conversation_members
                WHERE conversation_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn append_message(&self, new: NewMessage) -> AppResult<AppendOutcome> {
        // A retried send with a known key resolves to the original message.
        if let Some(key) = &new.idempotency_key {
            if let Some(existing) = self
                .message_by_idempotency_key(new.conversation_id, new.sender.user_id, key)
                .await?
            {
                return Ok(AppendOutcome {
                    message: existing,
                    deduplicated: true,
                });
            }
        }

        let mut tx = self.pool.begin().await?;
        let exists: Option<(ConversationKind,)> =
            sqlx::query_as(r#"SELECT kind FROM conversations WHERE id = $1"#)
                .bind(new.conversation_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("conversation".into()));
        }

        let inserted: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            r#"
            INSERT INTO messages
                (id, conversation_id, sender_id, sender_display_name,
                 sender_avatar, text, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (conversation_id, sender_id, idempotency_key)
                WHERE idempotency_key IS NOT NULL
                DO NOTHING
            RETURNING id, sent_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.conversation_id)
        .bind(new.sender.user_id)
        .bind(&new.sender.display_name)
        .bind(&new.sender.avatar_url)
        .bind(&new.text)
        .bind(&new.idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, sent_at)) = inserted else {
            // Lost the insert race against an identical retry.
            tx.rollback().await?;
            let key = new
                .idempotency_key
                .as_deref()
                .ok_or_else(|| AppError::Internal("append conflict without idempotency key".into()))?;
            let existing = self
                .message_by_idempotency_key(new.conversation_id, new.sender.user_id, key)
                .await?
                .ok_or_else(|| AppError::Internal("append conflict without stored message".into()))?;
            return Ok(AppendOutcome {
                message: existing,
                deduplicated: true,
            });
        };

        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_preview = $2, last_message_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(new.conversation_id)
        .bind(&new.text)
        .bind(sent_at)
        .execute(&mut *tx)
        .await?;

        // Field-scoped increment; the sender's own counter never moves.
        sqlx::query(
            r#"
            UPDATE conversation_members
            SET unread_count = unread_count + 1
            WHERE conversation_id = $1 AND user_id <> $2
            "#,
        )
        .bind(new.conversation_id)
        .bind(new.sender.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AppendOutcome {
            message: Message {
                id,
                conversation_id: new.conversation_id,
                sender_id: new.sender.user_id,
                sender_display_name: new.sender.display_name,
                sender_avatar: new.sender.avatar_url,
                text: new.text,
                sent_at,
                reactions: Vec::new(),
            },
            deduplicated: false,
        })
    }

    async fn messages(
        &self,
        conversation_id: Uuid,
        limit: i64,
        before: Option<Uuid>,
    ) -> AppResult<Vec<Message>> {
        let mut rows = match before {
            Some(cursor) => {
                let anchor: Option<(DateTime<Utc>,)> = sqlx::query_as(
                    r#"SELECT sent_at FROM messages WHERE id = $1 AND conversation_id = $2"#,
                )
                .bind(cursor)
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;
                let (anchor_sent_at,) =
                    anchor.ok_or_else(|| AppError::NotFound("message".into()))?;

                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, conversation_id, sender_id, sender_display_name,
                           sender_avatar, text, sent_at
                    FROM messages
                    WHERE conversation_id = $1
                      AND (sent_at < $2 OR (sent_at = $2 AND id < $3))
                    ORDER BY sent_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(conversation_id)
                .bind(anchor_sent_at)
                .bind(cursor)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, conversation_id, sender_id, sender_display_name,
                           sender_avatar, text, sent_at
                    FROM messages
                    WHERE conversation_id = $1
                    ORDER BY sent_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        // Pages are fetched newest-first for the LIMIT, served oldest-first.
        rows.reverse();

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut reactions = self.load_reactions(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let entries = reactions.remove(&row.id).unwrap_or_default();
                row.into_message(entries)
            })
            .collect())
    }

    async fn message(&self, message_id: Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, sender_display_name,
                   sender_avatar, text, sent_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut reactions = self.load_reactions(&[row.id]).await?;
                let entries = reactions.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_message(entries)))
            }
            None => Ok(None),
        }
    }

    async fn toggle_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<ToggleOutcome> {
        let exists: Option<(Uuid,)> =
            sqlx::query_as(r#"SELECT conversation_id FROM messages WHERE id = $1"#)
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("message".into()));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO message_reactions (message_id, user_id, emoji)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, user_id, emoji) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(&self.pool)
        .await?;

        let added = inserted.rows_affected() == 1;
        if !added {
            sqlx::query(
                r#"
                DELETE FROM message_reactions
                WHERE message_id = $1 AND user_id = $2 AND emoji = $3
                "#,
            )
            .bind(message_id)
            .bind(user_id)
            .bind(emoji)
            .execute(&self.pool)
            .await?;
        }

        let message = self
            .message(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("message".into()))?;
        Ok(ToggleOutcome { message, added })
    }

    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<ReadReceipt> {
        let updated: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            UPDATE conversation_members
            SET unread_count = 0, last_read_at = NOW()
            WHERE conversation_id = $1 AND user_id = $2
            RETURNING last_read_at
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let (last_read_at,) = updated.ok_or_else(|| AppError::NotFound("conversation".into()))?;
        Ok(ReadReceipt {
            conversation_id,
            user_id,
            last_read_at,
        })
    }

    async fn total_unread(&self, user_id: Uuid, scope: BadgeScope) -> AppResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(cm.unread_count), 0)::BIGINT
            FROM conversation_members cm
            JOIN conversations c ON c.id = cm.conversation_id
            WHERE cm.user_id = $1 AND ($2 OR c.kind = 'direct')
            "#,
        )
        .bind(user_id)
        .bind(scope == BadgeScope::All)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
