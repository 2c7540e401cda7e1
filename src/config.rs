use anyhow::{anyhow, Result};
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::datetime::{parse_time_of_day, parse_weekday};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/referrals.db";
const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_ANNOUNCEMENT_DAYS: &str = "Monday,Thursday";
const DEFAULT_UPLOAD_DIR: &str = "./data/uploads/reminders";

/// Referral programme constants used for bonus maths and announcement copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralTerms {
    /// How many referrals make one CPM step
    pub referrals_per_cpm_step: i64,
    /// CPM added per completed step
    pub cpm_step_value: i64,
    /// Cash paid per referred driver
    pub cash_bonus: i64,
}

impl Default for ReferralTerms {
    fn default() -> Self {
        Self {
            referrals_per_cpm_step: 2,
            cpm_step_value: 2,
            cash_bonus: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub http_port: u16,
    pub timezone: Tz,
    pub admin_ids: Vec<i64>,
    pub approved_chat_ids: Vec<i64>,
    pub broadcast_retry_count: u32,
    pub broadcast_retry_delay: Duration,
    pub announcement_days: Vec<Weekday>,
    pub announcement_time: NaiveTime,
    pub referral_terms: ReferralTerms,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let database_url = env_or_default("DATABASE_URL", DEFAULT_DATABASE_URL);

        let http_port = env_or_default("HTTP_PORT", "3000")
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid HTTP_PORT"))?;

        let timezone_name = env_or_default("TIMEZONE", DEFAULT_TIMEZONE);
        let timezone: Tz = timezone_name
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid TIMEZONE: {}", timezone_name.trim()))?;

        let broadcast_retry_count: u32 = env_or_default("BROADCAST_RETRY_COUNT", "3")
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid BROADCAST_RETRY_COUNT"))?;
        if broadcast_retry_count == 0 {
            return Err(anyhow!("BROADCAST_RETRY_COUNT must be at least 1"));
        }

        let broadcast_retry_delay = env_or_default("BROADCAST_RETRY_DELAY", "2")
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| anyhow!("Invalid BROADCAST_RETRY_DELAY"))?;

        let announcement_time_raw = env_or_default("ANNOUNCEMENT_TIME", "10:00");
        let announcement_time = parse_time_of_day(&announcement_time_raw)
            .ok_or_else(|| anyhow!("Invalid ANNOUNCEMENT_TIME: expected HH:MM"))?;

        let defaults = ReferralTerms::default();
        let referral_terms = ReferralTerms {
            referrals_per_cpm_step: parse_int_var("REFERRALS_PER_CPM_STEP", defaults.referrals_per_cpm_step)?,
            cpm_step_value: parse_int_var("CPM_STEP_VALUE", defaults.cpm_step_value)?,
            cash_bonus: parse_int_var("REFERRAL_CASH_BONUS", defaults.cash_bonus)?,
        };

        Ok(Config {
            telegram_bot_token: token,
            database_url,
            http_port,
            timezone,
            admin_ids: parse_id_list(&env::var("ADMIN_IDS").unwrap_or_default()),
            approved_chat_ids: parse_id_list(&env::var("APPROVED_CHAT_IDS").unwrap_or_default()),
            broadcast_retry_count,
            broadcast_retry_delay,
            announcement_days: parse_announcement_days(&env_or_default(
                "ANNOUNCEMENT_DAYS",
                DEFAULT_ANNOUNCEMENT_DAYS,
            )),
            announcement_time,
            referral_terms,
            upload_dir: PathBuf::from(env_or_default("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
        })
    }
}

/// Reads `name`, falling back to `default` when unset or blank.
fn env_or_default(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn parse_int_var(name: &str, default: i64) -> Result<i64> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {}", name)),
        _ => Ok(default),
    }
}

/// Parses a comma separated id list, silently skipping entries that are not integers.
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| item.parse().ok())
        .collect()
}

/// Parses weekday names (`Mon`, `Monday`, `0`..`6`), skipping unknown entries.
pub fn parse_announcement_days(raw: &str) -> Vec<Weekday> {
    let mut days = Vec::new();
    for day in raw.split(',').filter_map(parse_weekday) {
        if !days.contains(&day) {
            days.push(day);
        }
    }
    days
}
