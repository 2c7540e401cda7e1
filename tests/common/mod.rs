#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use referral_bot::database::connection::DatabaseManager;
use referral_bot::database::models::TrackedChat;
use referral_bot::services::broadcast::AudienceStore;
use referral_bot::services::delivery::{ChatInfo, DeliveryChannel, DeliveryError};

/// Fresh migrated database in its own temp directory.
pub async fn setup_test_db() -> (Arc<DatabaseManager>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let db = DatabaseManager::new(&db_url)
        .await
        .expect("Failed to create test database");
    db.run_migrations().await.expect("Failed to run migrations");

    (Arc::new(db), temp_dir)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub photo: Option<PathBuf>,
}

/// Records every send attempt and replays scripted failures per chat.
#[derive(Default)]
pub struct FakeChannel {
    attempts: Mutex<Vec<i64>>,
    delivered: Mutex<Vec<Sent>>,
    scripts: Mutex<HashMap<i64, VecDeque<DeliveryError>>>,
    always_fail: Mutex<HashMap<i64, DeliveryError>>,
    titles: Mutex<HashMap<i64, Option<String>>>,
    broken_lookups: Mutex<HashSet<i64>>,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The next sends to `chat_id` fail with `errors`, in order, then succeed.
    pub fn script(&self, chat_id: i64, errors: Vec<DeliveryError>) {
        self.scripts.lock().unwrap().insert(chat_id, errors.into());
    }

    pub fn fail_always(&self, chat_id: i64, error: DeliveryError) {
        self.always_fail.lock().unwrap().insert(chat_id, error);
    }

    pub fn set_live_title(&self, chat_id: i64, title: &str) {
        self.titles.lock().unwrap().insert(chat_id, Some(title.to_string()));
    }

    pub fn break_lookup(&self, chat_id: i64) {
        self.broken_lookups.lock().unwrap().insert(chat_id);
    }

    pub fn attempts_for(&self, chat_id: i64) -> usize {
        self.attempts.lock().unwrap().iter().filter(|id| **id == chat_id).count()
    }

    pub fn delivered(&self) -> Vec<Sent> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_chat_ids(&self) -> Vec<i64> {
        self.delivered().into_iter().map(|sent| sent.chat_id).collect()
    }

    fn record(&self, chat_id: i64, text: &str, photo: Option<&Path>) -> Result<(), DeliveryError> {
        self.attempts.lock().unwrap().push(chat_id);

        if let Some(error) = self.always_fail.lock().unwrap().get(&chat_id) {
            return Err(error.clone());
        }
        if let Some(error) = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&chat_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        self.delivered.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            photo: photo.map(Path::to_path_buf),
        });
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for FakeChannel {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.record(chat_id, text, None)
    }

    async fn send_photo(&self, chat_id: i64, photo: &Path, caption: &str) -> Result<(), DeliveryError> {
        self.record(chat_id, caption, Some(photo))
    }

    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, DeliveryError> {
        if self.broken_lookups.lock().unwrap().contains(&chat_id) {
            return Err(DeliveryError::Unknown("network down".to_string()));
        }
        let title = self.titles.lock().unwrap().get(&chat_id).cloned().flatten();
        Ok(ChatInfo { title })
    }
}

/// In-memory audience.
#[derive(Default)]
pub struct FakeStore {
    chats: Mutex<Vec<TrackedChat>>,
    admin_ids: Mutex<Vec<i64>>,
    approved_chat_ids: Mutex<Vec<i64>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_chat(&self, chat_id: i64, chat_type: &str, title: Option<&str>) {
        self.chats.lock().unwrap().push(TrackedChat {
            chat_id,
            chat_type: chat_type.to_string(),
            title: title.map(str::to_string),
            is_active: true,
            last_seen_at: Utc::now().to_rfc3339(),
        });
    }

    pub fn add_admin(&self, user_id: i64) {
        self.admin_ids.lock().unwrap().push(user_id);
    }

    pub fn approve_chat(&self, chat_id: i64) {
        self.approved_chat_ids.lock().unwrap().push(chat_id);
    }

    pub fn is_active(&self, chat_id: i64) -> bool {
        self.chats
            .lock()
            .unwrap()
            .iter()
            .any(|chat| chat.chat_id == chat_id && chat.is_active)
    }
}

#[async_trait]
impl AudienceStore for FakeStore {
    async fn active_chats(&self) -> Result<Vec<TrackedChat>, sqlx::Error> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .iter()
            .filter(|chat| chat.is_active)
            .cloned()
            .collect())
    }

    async fn set_chat_active(&self, chat_id: i64, active: bool) -> Result<(), sqlx::Error> {
        for chat in self.chats.lock().unwrap().iter_mut() {
            if chat.chat_id == chat_id {
                chat.is_active = active;
            }
        }
        Ok(())
    }

    async fn additional_admin_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        Ok(self.admin_ids.lock().unwrap().clone())
    }

    async fn approved_chat_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        Ok(self.approved_chat_ids.lock().unwrap().clone())
    }
}
