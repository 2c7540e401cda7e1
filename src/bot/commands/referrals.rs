use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::bot::permissions::sender_id;
use crate::bot::BotContext;
use crate::database::models::{Referral, Referrer};
use crate::services::broadcast::BroadcastReport;
use crate::utils::datetime::format_datetime;
use crate::utils::feedback::{CommandFeedback, Tone};
use crate::utils::logging::{log_database_error, CommandLog};
use crate::utils::validation::{
    parse_announcement_schedule_input, parse_edit_cpm_input, parse_referrals_input, parse_referrer_id,
    parse_referrer_input,
};

pub fn broadcast_summary(report: &BroadcastReport) -> String {
    format!(
        "Announcement sent to {} chat(s). Suspended: {}, rejected: {}, failed: {}.",
        report.delivered.len(),
        report.suspended.len(),
        report.rejected.len(),
        report.abandoned.len()
    )
}

pub async fn handle_leaderboard(bot: Bot, msg: Message, ctx: &BotContext) -> ResponseResult<()> {
    match ctx.announcements.leaderboard().await {
        Ok(text) => {
            bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
        }
        Err(e) => {
            log_database_error("SELECT", "referrers", &e.to_string(), Some("leaderboard"));
            CommandFeedback::new(bot.clone(), msg.chat.id)
                .error("Could not load the leaderboard. Please try again.")
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_announce(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let log = CommandLog::from_message("announce", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let text = match args.trim() {
        "" => ctx.announcements.scheduled_text().await,
        raw => match raw.parse::<i64>() {
            Ok(referrer_id) => ctx.announcements.announcement_for(referrer_id).await,
            Err(_) => {
                log.invalid("referrer_id", raw, "not a number");
                feedback
                    .validation_error("Referrer id must be a number", "Use /announce or /announce <referrer id>")
                    .await?;
                return Ok(());
            }
        },
    };

    let text = match text {
        Ok(text) => text,
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not build the announcement. Please try again.").await?;
            return Ok(());
        }
    };

    let pending = feedback.begin("Sending announcement...").await?;
    let report = ctx.announcements.broadcast_text(text).await;
    log.success(Some(&format!("delivered={}", report.delivered.len())));
    let tone = if report.delivered.len() == report.attempted() {
        Tone::Done
    } else {
        Tone::Partial
    };
    pending.finish(tone, &broadcast_summary(&report)).await?;
    Ok(())
}

pub async fn handle_announcement_schedule(
    bot: Bot,
    msg: Message,
    args: String,
    ctx: &BotContext,
) -> ResponseResult<()> {
    let log = CommandLog::from_message("announcementschedule", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    if args.trim().is_empty() {
        match ctx.announcements.describe_schedule().await {
            Ok(description) => {
                feedback.info(&format!("Announcements go out {description}.")).await?;
            }
            Err(e) => {
                log_database_error("SELECT", "announcement_settings", &e.to_string(), None);
                feedback.error("Could not load the announcement schedule.").await?;
            }
        }
        return Ok(());
    }

    let schedule = match parse_announcement_schedule_input(&args) {
        Ok(schedule) => schedule,
        Err(e) => {
            log.invalid("args", &args, &e.to_string());
            feedback
                .validation_error(&e.to_string(), "Use /announcementschedule Mon,Thu 10:00")
                .await?;
            return Ok(());
        }
    };

    match ctx.announcements.update_schedule(&schedule).await {
        Ok(next) => {
            log.success(Some(&args));
            let message = match next {
                Some(at) => format!(
                    "Announcement schedule updated. Next run: {}",
                    format_datetime(&at.with_timezone(&ctx.reminders.timezone()))
                ),
                None => "No announcement days are configured, nothing is scheduled.".to_string(),
            };
            feedback.success(&message).await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not save the announcement schedule.").await?;
        }
    }
    Ok(())
}

pub async fn handle_add_referrer(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let log = CommandLog::from_message("addreferrer", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let (name, base_cpm) = match parse_referrer_input(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            log.invalid("args", &args, &e.to_string());
            feedback.validation_error(&e.to_string(), "Use /addreferrer Jane Doe | 0.55").await?;
            return Ok(());
        }
    };

    match Referrer::create(&ctx.db.pool, &name, base_cpm).await {
        Ok(id) => {
            log.success(Some(&format!("id={id}")));
            feedback
                .success(&format!("Referrer #{id} {name} added with base CPM {base_cpm}."))
                .await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not save the referrer. Please try again.").await?;
        }
    }
    Ok(())
}

pub async fn handle_add_referrals(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let log = CommandLog::from_message("addreferrals", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let (referrer_id, names) = match parse_referrals_input(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            log.invalid("args", &args, &e.to_string());
            feedback.validation_error(&e.to_string(), "Use /addreferrals 3 | Bob, Alice").await?;
            return Ok(());
        }
    };

    match Referrer::find_by_id(&ctx.db.pool, referrer_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            feedback.error(&format!("Referrer #{referrer_id} does not exist.")).await?;
            return Ok(());
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not load the referrer. Please try again.").await?;
            return Ok(());
        }
    }

    match Referral::add_many(&ctx.db.pool, referrer_id, &names).await {
        Ok(count) => {
            log.success(Some(&format!("count={count}")));
            feedback
                .success(&format!("Recorded {count} referral(s) for referrer #{referrer_id}."))
                .await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not save the referrals. Please try again.").await?;
        }
    }
    Ok(())
}

pub async fn handle_edit_cpm(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let log = CommandLog::from_message("editcpm", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let (referrer_id, base_cpm) = match parse_edit_cpm_input(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            log.invalid("args", &args, &e.to_string());
            feedback.validation_error(&e.to_string(), "Use /editcpm 3 | 0.65").await?;
            return Ok(());
        }
    };

    let referrer = match Referrer::find_by_id(&ctx.db.pool, referrer_id).await {
        Ok(Some(referrer)) => referrer,
        Ok(None) => {
            feedback.error(&format!("Referrer #{referrer_id} does not exist.")).await?;
            return Ok(());
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not load the referrer. Please try again.").await?;
            return Ok(());
        }
    };

    match Referrer::update_base_cpm(&ctx.db.pool, referrer_id, base_cpm).await {
        Ok(true) => {
            log.success(Some(&format!("id={referrer_id} base_cpm={base_cpm}")));
            feedback
                .success(&format!("{}'s base CPM updated to {base_cpm}.", referrer.name))
                .await?;
        }
        Ok(false) => {
            feedback.error(&format!("Referrer #{referrer_id} does not exist.")).await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not update the base CPM. Please try again.").await?;
        }
    }
    Ok(())
}

pub async fn handle_remove_referrals(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let log = CommandLog::from_message("removereferrals", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let (referrer_id, names) = match parse_referrals_input(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            log.invalid("args", &args, &e.to_string());
            feedback.validation_error(&e.to_string(), "Use /removereferrals 3 | Bob, Alice").await?;
            return Ok(());
        }
    };

    let referrer = match Referrer::find_by_id(&ctx.db.pool, referrer_id).await {
        Ok(Some(referrer)) => referrer,
        Ok(None) => {
            feedback.error(&format!("Referrer #{referrer_id} does not exist.")).await?;
            return Ok(());
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not load the referrer. Please try again.").await?;
            return Ok(());
        }
    };

    let removed_by = sender_id(&msg).unwrap_or(0);
    match Referral::remove_by_names(&ctx.db.pool, referrer_id, &names, removed_by, Some("removed by command")).await {
        Ok(0) => {
            log.success(Some("count=0"));
            feedback
                .info("No matching active referrals found. They may already be removed.")
                .await?;
        }
        Ok(count) => {
            log.success(Some(&format!("count={count}")));
            feedback
                .success(&format!("Removed {count} referral(s) for {}.", referrer.name))
                .await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not remove the referrals. Please try again.").await?;
        }
    }
    Ok(())
}

pub async fn handle_remove_referrer(bot: Bot, msg: Message, args: String, ctx: &BotContext) -> ResponseResult<()> {
    let log = CommandLog::from_message("removereferrer", &msg);
    let feedback = CommandFeedback::new(bot.clone(), msg.chat.id);

    let referrer_id = match parse_referrer_id(&args) {
        Ok(id) => id,
        Err(e) => {
            log.invalid("args", &args, &e.to_string());
            feedback.validation_error(&e.to_string(), "Use /removereferrer 3").await?;
            return Ok(());
        }
    };

    let name = match Referrer::find_by_id(&ctx.db.pool, referrer_id).await {
        Ok(Some(referrer)) => referrer.name,
        Ok(None) => {
            feedback.info("Referrer already removed or missing.").await?;
            return Ok(());
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not load the referrer. Please try again.").await?;
            return Ok(());
        }
    };

    match Referrer::remove(&ctx.db.pool, referrer_id, sender_id(&msg).unwrap_or(0)).await {
        Ok(true) => {
            log.success(Some(&format!("id={referrer_id}")));
            feedback
                .success(&format!("{name} and their referrals have been removed."))
                .await?;
        }
        Ok(false) => {
            feedback.info("Referrer already removed or missing.").await?;
        }
        Err(e) => {
            log.failure(&e.to_string());
            feedback.error("Could not remove the referrer. Please try again.").await?;
        }
    }
    Ok(())
}
