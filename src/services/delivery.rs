//! Outbound message delivery.
//!
//! [`DeliveryChannel`] is the seam between broadcasting and Telegram, so the
//! retry and eligibility rules can be exercised without a live bot.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::RequestError;
use thiserror::Error;

/// Classified failure of a single send.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The bot can no longer post here (blocked, kicked, chat deleted).
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),
    /// The request itself is wrong; retrying will not help.
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("delivery failed: {0}")]
    Unknown(String),
}

/// A broadcast body: text, optionally sent as the caption of a local photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub photo: Option<PathBuf>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            photo: None,
        }
    }

    pub fn with_photo(mut self, photo: impl Into<PathBuf>) -> Self {
        self.photo = Some(photo.into());
        self
    }
}

/// What a live chat lookup tells us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatInfo {
    pub title: Option<String>,
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;

    async fn send_photo(&self, chat_id: i64, photo: &Path, caption: &str) -> Result<(), DeliveryError>;

    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, DeliveryError>;
}

/// Sends through the Bot API with HTML formatting.
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(classify_request_error)
    }

    async fn send_photo(&self, chat_id: i64, photo: &Path, caption: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_photo(ChatId(chat_id), InputFile::file(photo.to_path_buf()))
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(classify_request_error)
    }

    async fn get_chat(&self, chat_id: i64) -> Result<ChatInfo, DeliveryError> {
        let chat = self
            .bot
            .get_chat(ChatId(chat_id))
            .await
            .map_err(classify_request_error)?;
        Ok(ChatInfo {
            title: chat.title().map(str::to_owned),
        })
    }
}

/// Maps a Bot API error onto the broadcast retry policy.
pub fn classify_request_error(error: RequestError) -> DeliveryError {
    match error {
        RequestError::RetryAfter(after) => DeliveryError::RateLimited(after),
        RequestError::Api(api_error) => classify_description(&api_error.to_string()),
        RequestError::MigrateToChatId(new_id) => {
            DeliveryError::BadRequest(format!("chat migrated to {new_id:?}"))
        }
        other => DeliveryError::Unknown(other.to_string()),
    }
}

/// Classifies a Telegram error description by its status prefix.
pub fn classify_description(description: &str) -> DeliveryError {
    let trimmed = description.trim();
    if trimmed.starts_with("Forbidden") {
        DeliveryError::Forbidden(trimmed.to_string())
    } else if trimmed.starts_with("Bad Request") {
        DeliveryError::BadRequest(trimmed.to_string())
    } else {
        DeliveryError::Unknown(trimmed.to_string())
    }
}
