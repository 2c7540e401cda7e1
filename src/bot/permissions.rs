use teloxide::prelude::*;

use crate::bot::BotContext;
use crate::database::models::{Admin, ApprovedChat};
use crate::utils::logging::log_database_error;

pub const NOT_ALLOWED: &str = "You are not allowed to use this command.";

/// Configured admins only; runtime admins cannot grant access.
pub fn is_primary_admin(ctx: &BotContext, user_id: Option<i64>) -> bool {
    user_id.is_some_and(|id| ctx.config.admin_ids.contains(&id))
}

/// Approved chats (config or table) and admins (config or table) may run
/// management commands. Store errors deny access.
pub async fn has_admin_access(ctx: &BotContext, user_id: Option<i64>, chat_id: i64) -> bool {
    if ctx.config.approved_chat_ids.contains(&chat_id) {
        return true;
    }
    match ApprovedChat::exists(&ctx.db.pool, chat_id).await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(e) => log_database_error("SELECT", "approved_chats", &e.to_string(), None),
    }

    let Some(user_id) = user_id else {
        return false;
    };
    if ctx.config.admin_ids.contains(&user_id) {
        return true;
    }
    match Admin::exists(&ctx.db.pool, user_id).await {
        Ok(found) => found,
        Err(e) => {
            log_database_error("SELECT", "admins", &e.to_string(), None);
            false
        }
    }
}

pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from().and_then(|user| i64::try_from(user.id.0).ok())
}
