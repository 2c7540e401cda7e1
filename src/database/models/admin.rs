use chrono::Utc;

/// Admins added at runtime, on top of the configured `ADMIN_IDS`.
pub struct Admin;

impl Admin {
    pub async fn ids(pool: &sqlx::SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT user_id FROM admins")
            .fetch_all(pool)
            .await
    }

    pub async fn exists(pool: &sqlx::SqlitePool, user_id: i64) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn add(
        pool: &sqlx::SqlitePool,
        user_id: i64,
        username: Option<&str>,
        added_by: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO admins (user_id, username, added_by, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET username = excluded.username
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(added_by)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Staff/control chats. They may run admin commands and never receive broadcasts.
pub struct ApprovedChat;

impl ApprovedChat {
    pub async fn ids(pool: &sqlx::SqlitePool) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT chat_id FROM approved_chats")
            .fetch_all(pool)
            .await
    }

    pub async fn exists(pool: &sqlx::SqlitePool, chat_id: i64) -> Result<bool, sqlx::Error> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM approved_chats WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_one(pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn add(
        pool: &sqlx::SqlitePool,
        chat_id: i64,
        title: Option<&str>,
        added_by: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO approved_chats (chat_id, title, added_by, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(chat_id) DO UPDATE SET title = excluded.title
            "#,
        )
        .bind(chat_id)
        .bind(title)
        .bind(added_by)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }
}
