use teloxide::prelude::*;

use crate::bot::tracking::track_chat;
use crate::bot::{BotContext, HandlerResult};
use crate::utils::feedback::CommandFeedback;

/// Every non-command message: record the chat, and point mistyped commands at /help.
pub async fn handle_general_message(bot: Bot, msg: Message, ctx: BotContext) -> HandlerResult {
    track_chat(&ctx.db, &msg.chat).await;

    let Some(text) = msg.text() else {
        return Ok(());
    };

    // Only answer in private chats; groups see plenty of stray slashes.
    if msg.chat.is_private() && text.starts_with('/') {
        let command = text.split_whitespace().next().unwrap_or(text);
        CommandFeedback::new(bot, msg.chat.id)
            .validation_error(
                &format!("Unknown command: {command}"),
                "Use /help to see all available commands.",
            )
            .await?;
    }
    Ok(())
}
