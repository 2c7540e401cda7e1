use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A chat the bot has seen. Upserted on every incoming update.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TrackedChat {
    pub chat_id: i64,
    pub chat_type: String,
    pub title: Option<String>,
    pub is_active: bool,
    pub last_seen_at: String,
}

impl TrackedChat {
    pub fn is_private(&self) -> bool {
        self.chat_type == "private"
    }

    pub fn is_group(&self) -> bool {
        matches!(self.chat_type.as_str(), "group" | "supergroup")
    }

    /// Records a sighting. Re-activates nothing: a chat suspended after a
    /// Forbidden error stays inactive until explicitly re-enabled.
    pub async fn upsert(
        pool: &sqlx::SqlitePool,
        chat_id: i64,
        chat_type: &str,
        title: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO chats (chat_id, chat_type, title, is_active, last_seen_at)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT(chat_id) DO UPDATE SET
                chat_type = excluded.chat_type,
                title = excluded.title,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(chat_id)
        .bind(chat_type)
        .bind(title)
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_chat_id(
        pool: &sqlx::SqlitePool,
        chat_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrackedChat>(
            "SELECT chat_id, chat_type, title, is_active, last_seen_at FROM chats WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(pool)
        .await
    }

    /// Active chats, most recently seen first.
    pub async fn find_active(pool: &sqlx::SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TrackedChat>(
            "SELECT chat_id, chat_type, title, is_active, last_seen_at FROM chats \
             WHERE is_active = 1 ORDER BY last_seen_at DESC, chat_id",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn set_active(
        pool: &sqlx::SqlitePool,
        chat_id: i64,
        active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chats SET is_active = ? WHERE chat_id = ?")
            .bind(active)
            .bind(chat_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
