pub mod admin;
pub mod referrals;
pub mod reminders;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Referral bot commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "List reminders with enable/disable and delete buttons")]
    Reminders,
    #[command(description = "Create a reminder: <kind> <when> [all] | <text>")]
    Remind(String),
    #[command(description = "Show the referral leaderboard")]
    Leaderboard,
    #[command(description = "Broadcast a referral announcement now: [referrer id]")]
    Announce(String),
    #[command(description = "Show or set the announcement schedule: [<days> HH:MM]")]
    AnnouncementSchedule(String),
    #[command(description = "Add a referrer: <name> | <base cpm>")]
    AddReferrer(String),
    #[command(description = "Record referrals: <referrer id> | <name>, <name>")]
    AddReferrals(String),
    #[command(description = "Change a referrer's base CPM: <referrer id> | <base cpm>")]
    EditCpm(String),
    #[command(description = "Remove referrals by name: <referrer id> | <name>, <name>")]
    RemoveReferrals(String),
    #[command(description = "Remove a referrer and their referrals: <referrer id>")]
    RemoveReferrer(String),
    #[command(description = "List admins and approved chats")]
    Admins,
    #[command(description = "Grant admin rights: <user id>, or reply to a user")]
    AddAdmin(String),
    #[command(description = "Approve this chat for admin commands")]
    ApproveChat,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Start => "start",
            Command::Reminders => "reminders",
            Command::Remind(_) => "remind",
            Command::Leaderboard => "leaderboard",
            Command::Announce(_) => "announce",
            Command::AnnouncementSchedule(_) => "announcementschedule",
            Command::AddReferrer(_) => "addreferrer",
            Command::AddReferrals(_) => "addreferrals",
            Command::EditCpm(_) => "editcpm",
            Command::RemoveReferrals(_) => "removereferrals",
            Command::RemoveReferrer(_) => "removereferrer",
            Command::Admins => "admins",
            Command::AddAdmin(_) => "addadmin",
            Command::ApproveChat => "approvechat",
        }
    }

    /// Commands anyone may run; everything else needs admin access.
    pub fn is_public(&self) -> bool {
        matches!(self, Command::Help | Command::Start)
    }
}

pub const REMIND_USAGE: &str = "/remind once 2025-01-31 09:00 | Payday\n\
    /remind daily 09:00 | Standup\n\
    /remind weekly Monday 09:00 | Weekly sync\n\
    /remind biweekly Monday 09:00 | Payroll\n\
    /remind twice Mon,Thu 09:00 | Fuel report\n\
    Add 'all' before '|' to include INACTIVE groups. Reply to a photo to attach it.";

pub const WELCOME_TEXT: &str = "👋 Referral bot is running.\n\n\
    Use /remind to schedule a broadcast, /reminders to manage them and \
    /leaderboard to see the referral standings.\nUse /help to see all commands.";
