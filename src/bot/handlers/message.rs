use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::commands::{admin, referrals, reminders, Command, WELCOME_TEXT};
use crate::bot::permissions::{has_admin_access, sender_id, NOT_ALLOWED};
use crate::bot::tracking::track_chat;
use crate::bot::{BotContext, HandlerResult};
use crate::utils::logging::CommandLog;

pub async fn command_handler(bot: Bot, msg: Message, cmd: Command, ctx: BotContext) -> HandlerResult {
    track_chat(&ctx.db, &msg.chat).await;

    let user_id = sender_id(&msg);
    if !cmd.is_public() && !has_admin_access(&ctx, user_id, msg.chat.id.0).await {
        CommandLog::from_message(cmd.name(), &msg).denied();
        bot.send_message(msg.chat.id, NOT_ALLOWED).await?;
        return Ok(());
    }

    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Start => {
            bot.send_message(msg.chat.id, WELCOME_TEXT).await?;
        }
        Command::Reminders => reminders::handle_reminders(bot, msg, &ctx).await?,
        Command::Remind(args) => reminders::handle_remind(bot, msg, args, &ctx).await?,
        Command::Leaderboard => referrals::handle_leaderboard(bot, msg, &ctx).await?,
        Command::Announce(args) => referrals::handle_announce(bot, msg, args, &ctx).await?,
        Command::AnnouncementSchedule(args) => {
            referrals::handle_announcement_schedule(bot, msg, args, &ctx).await?
        }
        Command::AddReferrer(args) => referrals::handle_add_referrer(bot, msg, args, &ctx).await?,
        Command::AddReferrals(args) => referrals::handle_add_referrals(bot, msg, args, &ctx).await?,
        Command::EditCpm(args) => referrals::handle_edit_cpm(bot, msg, args, &ctx).await?,
        Command::RemoveReferrals(args) => referrals::handle_remove_referrals(bot, msg, args, &ctx).await?,
        Command::RemoveReferrer(args) => referrals::handle_remove_referrer(bot, msg, args, &ctx).await?,
        Command::Admins => admin::handle_admins(bot, msg, &ctx).await?,
        Command::AddAdmin(args) => admin::handle_add_admin(bot, msg, args, &ctx).await?,
        Command::ApproveChat => admin::handle_approve_chat(bot, msg, &ctx).await?,
    }
    Ok(())
}
