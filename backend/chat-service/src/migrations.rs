use sqlx::{Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup
const MIG_0001: &str = include_str!("../migrations/0001_create_conversations.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_conversation_members.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_messages.sql");
const MIG_0004: &str = include_str!("../migrations/0004_create_message_reactions.sql");

/// Apply all migrations in order. Each file only contains IF NOT EXISTS
/// statements, so re-running on an up-to-date schema is a no-op.
pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    for (label, sql) in [
        ("0001_create_conversations", MIG_0001),
        ("0002_create_conversation_members", MIG_0002),
        ("0003_create_messages", MIG_0003),
        ("0004_create_message_reactions", MIG_0004),
    ] {
        sqlx::raw_sql(sql).execute(db).await?;
        tracing::info!(migration = %label, "chat-service migration applied");
    }
    Ok(())
}
