//! One-line, prefixed log helpers so command, job and delivery logs grep the same way.

use teloxide::types::Message;
use tracing::{debug, error, info, warn};

/// Who ran which command where. Built once per handler and reused for every log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLog {
    pub command: &'static str,
    pub user: String,
    pub user_id: i64,
    pub chat_id: i64,
}

impl CommandLog {
    pub fn new(command: &'static str, user: impl Into<String>, user_id: i64, chat_id: i64) -> Self {
        Self {
            command,
            user: user.into(),
            user_id,
            chat_id,
        }
    }

    pub fn from_message(command: &'static str, msg: &Message) -> Self {
        let user = msg.from();
        Self::new(
            command,
            user.and_then(|u| u.username.clone()).unwrap_or_else(|| "unknown".to_string()),
            user.and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(0),
            msg.chat.id.0,
        )
    }

    pub fn start(&self, details: Option<&str>) {
        info!(
            command = self.command,
            user_id = self.user_id,
            chat_id = self.chat_id,
            "CMD_START: {} by {} {}",
            self.command,
            self.user,
            details.unwrap_or_default()
        );
    }

    pub fn success(&self, details: Option<&str>) {
        info!(
            command = self.command,
            user_id = self.user_id,
            chat_id = self.chat_id,
            "CMD_SUCCESS: {} by {} {}",
            self.command,
            self.user,
            details.unwrap_or_default()
        );
    }

    pub fn failure(&self, error: &str) {
        error!(
            command = self.command,
            user_id = self.user_id,
            chat_id = self.chat_id,
            "CMD_ERROR: {} by {} - {}",
            self.command,
            self.user,
            error
        );
    }

    /// Input the user can fix; logged at warn, never as an error.
    pub fn invalid(&self, field: &str, value: &str, error: &str) {
        warn!(
            command = self.command,
            user_id = self.user_id,
            chat_id = self.chat_id,
            "VALIDATION_ERROR: {} field {} = '{}': {}",
            self.command,
            field,
            value,
            error
        );
    }

    pub fn denied(&self) {
        warn!(
            command = self.command,
            user_id = self.user_id,
            chat_id = self.chat_id,
            "ACCESS_DENIED: {} by {}",
            self.command,
            self.user
        );
    }
}

pub fn log_database_operation(operation: &str, table: &str, details: Option<&str>) {
    debug!("DB_OP: {} on {} {}", operation, table, details.unwrap_or_default());
}

pub fn log_database_error(operation: &str, table: &str, error: &str, details: Option<&str>) {
    error!(
        "DB_ERROR: {} on {} failed: {} {}",
        operation,
        table,
        error,
        details.unwrap_or_default()
    );
}

/// Job table changes: `registered`, `removed`, `fired`, `expired`, `skipped`.
pub fn log_job_event(event: &str, job_id: &str, details: Option<&str>) {
    info!(job_id, "JOB: {} {} {}", event, job_id, details.unwrap_or_default());
}

pub fn log_delivery_issue(chat_id: i64, attempt: u32, issue: &str) {
    warn!(chat_id, attempt, "BROADCAST: chat {} attempt {} - {}", chat_id, attempt, issue);
}

pub fn log_broadcast_summary(delivered: usize, suspended: usize, rejected: usize, abandoned: usize) {
    info!(
        delivered,
        suspended,
        rejected,
        abandoned,
        "BROADCAST: finished - delivered {}, suspended {}, rejected {}, abandoned {}",
        delivered,
        suspended,
        rejected,
        abandoned
    );
}

pub fn log_system_event(event: &str, details: Option<&str>) {
    info!("SYSTEM: {} {}", event, details.unwrap_or_default());
}
