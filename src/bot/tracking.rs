use teloxide::types::Chat;

use crate::database::connection::DatabaseManager;
use crate::database::models::TrackedChat;
use crate::utils::logging::{log_database_error, log_database_operation};
use crate::utils::validation::validate_telegram_chat_id;

pub fn chat_type_name(chat: &Chat) -> &'static str {
    if chat.is_private() {
        "private"
    } else if chat.is_supergroup() {
        "supergroup"
    } else if chat.is_group() {
        "group"
    } else {
        "channel"
    }
}

/// Records that the bot saw `chat`. Failures are logged and swallowed so
/// tracking never blocks the update itself.
pub async fn track_chat(db: &DatabaseManager, chat: &Chat) {
    let chat_id = chat.id.0;
    if let Err(e) = validate_telegram_chat_id(chat_id) {
        tracing::debug!("Not tracking chat {}: {}", chat_id, e);
        return;
    }

    match TrackedChat::upsert(&db.pool, chat_id, chat_type_name(chat), chat.title()).await {
        Ok(()) => log_database_operation("UPSERT", "chats", Some(&format!("chat_id={chat_id}"))),
        Err(e) => log_database_error("UPSERT", "chats", &e.to_string(), Some(&format!("chat_id={chat_id}"))),
    }
}
