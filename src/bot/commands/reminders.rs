use anyhow::Context;
use chrono::Utc;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use uuid::Uuid;

use crate::bot::commands::REMIND_USAGE;
use crate::bot::permissions::sender_id;
use crate::bot::BotContext;
use crate::database::models::{NewReminder, Reminder, ReminderRow};
use crate::services::reminder::ReminderError;
use crate::utils::datetime::format_datetime;
use crate::utils::feedback::CommandFeedback;
use crate::utils::logging::{log_database_error, CommandLog};
use crate::utils::validation::parse_reminder_request;

const CALLBACK_PREFIX: &str = "reminders";

/// Inline button actions on the reminder list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    Toggle(i64),
    Delete(i64),
}

impl ReminderAction {
    /// `reminders:toggle:<id>` / `reminders:delete:<id>`
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(3, ':');
        if parts.next()? != CALLBACK_PREFIX {
            return None;
        }
        let action = parts.next()?;
        let id = parts.next()?.parse().ok()?;
        match action {
            "toggle" => Some(Self::Toggle(id)),
            "delete" => Some(Self::Delete(id)),
            _ => None,
        }
    }

    pub fn callback_data(self) -> String {
        match self {
            Self::Toggle(id) => format!("{CALLBACK_PREFIX}:toggle:{id}"),
            Self::Delete(id) => format!("{CALLBACK_PREFIX}:delete:{id}"),
        }
    }
}

fn describe_row(row: &ReminderRow, tz: &Tz) -> String {
    match row.schedule() {
        Ok(schedule) => schedule.describe(tz),
        Err(_) => format!("[{}] unreadable schedule", row.kind),
    }
}

pub fn reminder_list_text(rows: &[ReminderRow], tz: &Tz) -> String {
    if rows.is_empty() {
        return "Reminders:\n– No reminders configured yet.".to_string();
    }

    let mut lines = vec!["Reminders:".to_string()];
    for row in rows {
        let status = if row.active { "Active" } else { "Disabled" };
        let photo = if row.media_path.is_some() { " 📷" } else { "" };
        lines.push(format!(
            "{}) {} – \"{}\" ({}){}",
            row.id,
            describe_row(row, tz),
            row.text,
            status,
            photo
        ));
    }
    lines.join("\n")
}

/// One row per reminder: enable/disable and delete.
pub fn reminder_keyboard(rows: &[ReminderRow]) -> Option<InlineKeyboardMarkup> {
    if rows.is_empty() {
        return None;
    }

    let buttons = rows.iter().map(|row| {
        let toggle_label = if row.active { "Disable" } else { "Enable" };
        vec![
            InlineKeyboardButton::callback(
                format!("{toggle_label} #{}", row.id),
                ReminderAction::Toggle(row.id).callback_data(),
            ),
            InlineKeyboardButton::callback(
                format!("Delete #{}", row.id),
                ReminderAction::Delete(row.id).callback_data(),
            ),
        ]
    });
    Some(InlineKeyboardMarkup::new(buttons))
}

pub async fn handle_reminders(bot: Bot, msg: Message, ctx: &BotContext) -> ResponseResult<()> {
    let rows = match Reminder::find_all(&ctx.db.pool).await {
        Ok(rows) => rows,
        Err(e) => {
            log_database_error("SELECT", "reminders", &e.to_string(), None);
            CommandFeedback::new(bot.clone(), msg.chat.id)
                .error("Could not load reminders. Please try again.")
                .await?;
            return Ok(());
        }
    };

    let text = reminder_list_text(&rows, &ctx.reminders.timezone());
    let request = bot.send_message(msg.chat.id, text);
    match reminder_keyboard(&rows) {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };
    Ok(())
}

pub async fn handle_remind(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let user_id = sender_id(&msg).unwrap_or(0);
    let log = CommandLog::from_message("remind", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    log.start(Some(&args));

    if args.trim().is_empty() {
        feedback.validation_error("Reminder details are missing", REMIND_USAGE).await?;
        return Ok(());
    }

    let tz = ctx.reminders.timezone();
    let request = match parse_reminder_request(&args, &tz, Utc::now()) {
        Ok(request) => request,
        Err(e) => {
            log.invalid("args", &args, &e.to_string());
            feedback.validation_error(&e.to_string(), REMIND_USAGE).await?;
            return Ok(());
        }
    };

    let media_path = match download_reply_photo(&bot, &msg, ctx.reminders.upload_dir()).await {
        Ok(path) => path,
        Err(e) => {
            log.failure(&format!("{e:#}"));
            feedback.error("Could not download the photo. Please try again.").await?;
            return Ok(());
        }
    };

    let new = NewReminder {
        text: request.text,
        schedule: request.schedule,
        created_by: user_id,
        media_path: media_path.clone(),
        ignore_inactive: request.ignore_inactive,
    };

    let created = ctx.reminders.create_reminder(new).await;
    if created.is_err() {
        if let Some(path) = &media_path {
            discard_upload(path).await;
        }
    }

    match created {
        Ok(reminder) => {
            let next = ctx
                .reminders
                .next_fire(reminder.id)
                .map(|at| format_datetime(&at.with_timezone(&tz)))
                .unwrap_or_else(|| "not scheduled".to_string());
            log.success(Some(&format!("id={}", reminder.id)));
            feedback
                .success(&format!(
                    "Reminder #{} saved: {}\nNext run: {}",
                    reminder.id,
                    reminder.schedule.describe(&tz),
                    next
                ))
                .await?;
        }
        Err(ReminderError::Database(e)) => {
            log.failure(&e.to_string());
            feedback.error("Could not save the reminder. Please try again.").await?;
        }
        Err(e) => {
            log.invalid("text", &args, &e.to_string());
            feedback.validation_error(&e.to_string(), REMIND_USAGE).await?;
        }
    }

    Ok(())
}

/// Saves the largest size of a replied-to photo under `upload_dir`.
async fn download_reply_photo(bot: &Bot, msg: &Message, upload_dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let Some(photo) = msg
        .reply_to_message()
        .and_then(|reply| reply.photo())
        .and_then(|sizes| sizes.last())
    else {
        return Ok(None);
    };

    let file = bot.get_file(photo.file.id.clone()).await.context("get_file failed")?;
    tokio::fs::create_dir_all(upload_dir)
        .await
        .with_context(|| format!("cannot create {}", upload_dir.display()))?;

    let path = upload_dir.join(format!("{}.jpg", Uuid::new_v4()));
    let downloaded = async {
        let mut dst = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("cannot create {}", path.display()))?;
        bot.download_file(&file.path, &mut dst).await.context("download failed")
    }
    .await;

    if let Err(e) = downloaded {
        discard_upload(&path).await;
        return Err(e);
    }
    Ok(Some(path))
}

/// Removes a saved photo that no reminder will reference.
async fn discard_upload(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Discarded upload {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove upload {}: {}", path.display(), e),
    }
}
