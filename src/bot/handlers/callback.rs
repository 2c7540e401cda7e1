use teloxide::prelude::*;

use crate::bot::commands::reminders::{reminder_keyboard, reminder_list_text, ReminderAction};
use crate::bot::permissions::{has_admin_access, NOT_ALLOWED};
use crate::bot::tracking::track_chat;
use crate::bot::{BotContext, HandlerResult};
use crate::database::models::Reminder;
use crate::utils::logging::CommandLog;

pub async fn callback_handler(bot: Bot, q: CallbackQuery, ctx: BotContext) -> HandlerResult {
    let user_id = i64::try_from(q.from.id.0).ok();
    let username = q.from.username.clone().unwrap_or_else(|| "unknown".to_string());
    let chat_id = q.message.as_ref().map(|m| m.chat.id.0).unwrap_or(0);
    let log = CommandLog::new("reminders", username.clone(), user_id.unwrap_or(0), chat_id);

    if let Some(message) = &q.message {
        track_chat(&ctx.db, &message.chat).await;
    }

    let Some(action) = q.data.as_deref().and_then(ReminderAction::parse) else {
        tracing::debug!("Ignoring callback {:?} from {}", q.data, username);
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    tracing::info!("Callback {:?} from user {} ({:?}) in chat {}", action, username, user_id, chat_id);

    if !has_admin_access(&ctx, user_id, chat_id).await {
        log.denied();
        bot.answer_callback_query(q.id).text(NOT_ALLOWED).show_alert(true).await?;
        return Ok(());
    }

    let outcome = match action {
        ReminderAction::Toggle(id) => ctx.reminders.toggle_reminder(id).await.map(|r| r.is_some()),
        ReminderAction::Delete(id) => ctx.reminders.delete_reminder(id).await,
    };

    let answer = match (&outcome, action) {
        (Ok(true), ReminderAction::Toggle(_)) => "Reminder updated.",
        (Ok(true), ReminderAction::Delete(_)) => "Reminder deleted.",
        (Ok(false), _) => "Reminder missing.",
        (Err(_), _) => "Something went wrong, please try again.",
    };
    match &outcome {
        Ok(_) => log.success(Some(&format!("{action:?}"))),
        Err(e) => log.failure(&e.to_string()),
    }
    bot.answer_callback_query(q.id).text(answer).await?;

    if let Some(message) = q.message {
        refresh_list(&bot, &message, &ctx).await?;
    }
    Ok(())
}

/// Re-renders the reminder list in place after a button press.
async fn refresh_list(bot: &Bot, message: &Message, ctx: &BotContext) -> HandlerResult {
    let rows = Reminder::find_all(&ctx.db.pool).await?;
    let text = reminder_list_text(&rows, &ctx.reminders.timezone());
    let edit = bot.edit_message_text(message.chat.id, message.id, text);
    match reminder_keyboard(&rows) {
        Some(keyboard) => edit.reply_markup(keyboard).await?,
        None => edit.await?,
    };
    Ok(())
}
