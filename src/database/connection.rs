use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use tracing::info;

use crate::database::models::{Admin, ApprovedChat, TrackedChat};
use crate::services::broadcast::AudienceStore;

#[derive(Clone)]
pub struct DatabaseManager {
    pub pool: SqlitePool,
}

impl DatabaseManager {
    /// Opens (creating if needed) the database behind a single-connection pool,
    /// so every store operation is serialized.
    pub async fn new(database_url: &str) -> Result<Self> {
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Creating database {}", database_url);
            if let Some(parent) = sqlite_file_path(database_url).and_then(|path| path.parent()) {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Filesystem path of a file-backed SQLite url, `None` for in-memory databases.
pub fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

#[async_trait]
impl AudienceStore for DatabaseManager {
    async fn active_chats(&self) -> Result<Vec<TrackedChat>, sqlx::Error> {
        TrackedChat::find_active(&self.pool).await
    }

    async fn set_chat_active(&self, chat_id: i64, active: bool) -> Result<(), sqlx::Error> {
        TrackedChat::set_active(&self.pool, chat_id, active).await
    }

    async fn additional_admin_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        Admin::ids(&self.pool).await
    }

    async fn approved_chat_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        ApprovedChat::ids(&self.pool).await
    }
}
