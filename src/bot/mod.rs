//! Telegram surface: commands, callbacks and chat tracking.

pub mod commands;
pub mod handlers;
pub mod permissions;
pub mod tracking;

use std::sync::Arc;

use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::services::announcement::AnnouncementService;
use crate::services::reminder::ReminderService;

/// Shared handles every handler needs.
#[derive(Clone)]
pub struct BotContext {
    pub db: Arc<DatabaseManager>,
    pub config: Arc<Config>,
    pub reminders: ReminderService,
    pub announcements: AnnouncementService,
}

/// Error type of the dispatcher schema.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HandlerResult = Result<(), HandlerError>;
