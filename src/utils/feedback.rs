use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};

use crate::utils::markdown::escape_markdown;

/// How a reply reads; picks the leading marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Done,
    /// Finished, but some of the work did not go through.
    Partial,
    Failed,
    Note,
    Pending,
}

impl Tone {
    fn marker(self) -> &'static str {
        match self {
            Tone::Done => "✅",
            Tone::Partial => "⚠️",
            Tone::Failed => "❌",
            Tone::Note => "ℹ️",
            Tone::Pending => "⏳",
        }
    }
}

/// MarkdownV2 body for a reply: marker, space, escaped text.
pub fn render(tone: Tone, text: &str) -> String {
    format!("{} {}", tone.marker(), escape_markdown(text))
}

/// Replies to the chat a command came from.
pub struct CommandFeedback {
    bot: Bot,
    chat_id: ChatId,
}

impl CommandFeedback {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    pub async fn send(&self, tone: Tone, text: &str) -> ResponseResult<Message> {
        self.bot
            .send_message(self.chat_id, render(tone, text))
            .parse_mode(ParseMode::MarkdownV2)
            .await
    }

    pub async fn success(&self, text: &str) -> ResponseResult<Message> {
        self.send(Tone::Done, text).await
    }

    pub async fn error(&self, text: &str) -> ResponseResult<Message> {
        self.send(Tone::Failed, text).await
    }

    pub async fn info(&self, text: &str) -> ResponseResult<Message> {
        self.send(Tone::Note, text).await
    }

    /// Rejects user input and shows the expected form.
    pub async fn validation_error(&self, error: &str, usage: &str) -> ResponseResult<Message> {
        self.send(Tone::Failed, &format!("{error}\n\nUsage: {usage}")).await
    }

    /// Posts a pending line that [`PendingReply::finish`] later edits in place.
    pub async fn begin(&self, text: &str) -> ResponseResult<PendingReply<'_>> {
        let message = self.send(Tone::Pending, text).await?;
        Ok(PendingReply {
            feedback: self,
            message_id: message.id,
        })
    }
}

/// A sent "working on it" message waiting for its outcome.
pub struct PendingReply<'a> {
    feedback: &'a CommandFeedback,
    message_id: MessageId,
}

impl PendingReply<'_> {
    pub async fn finish(self, tone: Tone, text: &str) -> ResponseResult<Message> {
        self.feedback
            .bot
            .edit_message_text(self.feedback.chat_id, self.message_id, render(tone, text))
            .parse_mode(ParseMode::MarkdownV2)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefixes_marker_and_escapes() {
        assert_eq!(render(Tone::Done, "Reminder #4 saved."), "✅ Reminder \\#4 saved\\.");
        assert_eq!(render(Tone::Partial, "1 chat failed"), "⚠️ 1 chat failed");
        assert!(render(Tone::Pending, "Sending").starts_with("⏳ "));
    }
}
