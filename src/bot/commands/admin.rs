use teloxide::prelude::*;

use crate::bot::permissions::{is_primary_admin, sender_id, NOT_ALLOWED};
use crate::bot::BotContext;
use crate::database::models::{Admin, ApprovedChat};
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::{log_database_error, CommandLog};

/// Target of `/addadmin`: explicit id first, then the author of the replied-to message.
pub fn admin_target(args: &str, msg: &Message) -> Option<(i64, Option<String>)> {
    if let Ok(id) = args.trim().parse::<i64>() {
        return (id > 0).then_some((id, None));
    }
    let user = msg.reply_to_message()?.from()?;
    let id = i64::try_from(user.id.0).ok()?;
    Some((id, user.username.clone()))
}

pub async fn handle_admins(bot: Bot, msg: Message, ctx: &BotContext) -> ResponseResult<()> {
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let (admins, chats) = match (Admin::ids(&ctx.db.pool).await, ApprovedChat::ids(&ctx.db.pool).await) {
        (Ok(admins), Ok(chats)) => (admins, chats),
        (Err(e), _) | (_, Err(e)) => {
            log_database_error("SELECT", "admins", &e.to_string(), None);
            feedback.error("Could not load the admin lists. Please try again.").await?;
            return Ok(());
        }
    };

    let join = |ids: &[i64]| {
        if ids.is_empty() {
            "–".to_string()
        } else {
            ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ")
        }
    };

    let text = format!(
        "Configured admins: {}\nAdded admins: {}\nConfigured chats: {}\nApproved chats: {}",
        join(&ctx.config.admin_ids),
        join(&admins),
        join(&ctx.config.approved_chat_ids),
        join(&chats)
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

pub async fn handle_add_admin(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let user_id = sender_id(&msg);
    let log = CommandLog::from_message("addadmin", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    if !is_primary_admin(ctx, user_id) {
        log.denied();
        bot.send_message(msg.chat.id, NOT_ALLOWED).await?;
        return Ok(());
    }
    let added_by = user_id.unwrap_or(0);

    let Some((target, target_name)) = admin_target(&args, &msg) else {
        feedback
            .validation_error("No user given", "Use /addadmin <user id>, or reply to their message with /addadmin")
            .await?;
        return Ok(());
    };

    match Admin::add(&ctx.db.pool, target, target_name.as_deref(), added_by).await {
        Ok(()) => {
            log.success(Some(&format!("target={target}")));
            feedback.success(&format!("User {target} can now manage reminders.")).await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not save the admin. Please try again.").await?;
        }
    }
    Ok(())
}

pub async fn handle_approve_chat(bot: Bot, msg: Message, ctx: &BotContext) -> ResponseResult<()> {
    let user_id = sender_id(&msg);
    let log = CommandLog::from_message("approvechat", &msg);
    let chat_id = msg.chat.id.0;
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    if !is_primary_admin(ctx, user_id) {
        log.denied();
        bot.send_message(msg.chat.id, NOT_ALLOWED).await?;
        return Ok(());
    }
    let added_by = user_id.unwrap_or(0);

    match ApprovedChat::add(&ctx.db.pool, chat_id, msg.chat.title(), added_by).await {
        Ok(()) => {
            log.success(None);
            feedback
                .success("This chat is approved. Members can manage reminders here, and it no longer receives broadcasts.")
                .await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not approve this chat. Please try again.").await?;
        }
    }
    Ok(())
}
