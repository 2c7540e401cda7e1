use anyhow::{anyhow, Result};
use chrono::{DateTime, Offset, Utc, Weekday};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};

use crate::database::models::{AnnouncementSchedule, Schedule};
use crate::utils::datetime::{parse_local_datetime, parse_time_of_day, parse_weekday};

/// Telegram's limit for a plain message.
pub const MAX_MESSAGE_LENGTH: usize = 4096;
/// Telegram's limit for a photo caption.
pub const MAX_CAPTION_LENGTH: usize = 1024;

/// Trailing keyword in the `/remind` header that also targets INACTIVE groups.
pub const INCLUDE_INACTIVE_FLAG: &str = "all";

/// Parsed `/remind` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub schedule: Schedule,
    pub text: String,
    pub ignore_inactive: bool,
}

/// Parses `<kind> <when> [all] | <text>`.
///
/// Examples: `once 2025-01-31 09:00 | Payday`, `daily 09:00 | Standup`,
/// `weekly Monday 09:00 | ...`, `biweekly Mon 09:00 | ...`,
/// `twice Mon,Thu 09:00 all | ...`.
pub fn parse_reminder_request(input: &str, tz: &Tz, now: DateTime<Utc>) -> Result<ReminderRequest> {
    let (header, text) = input
        .split_once('|')
        .ok_or_else(|| anyhow!("Separate the schedule and the text with '|'"))?;

    let text = text.trim().to_string();
    validate_reminder_text(&text, false)?;

    let mut tokens: Vec<&str> = header.split_whitespace().collect();
    let ignore_inactive = match tokens.last() {
        Some(last) if last.eq_ignore_ascii_case(INCLUDE_INACTIVE_FLAG) => {
            tokens.pop();
            false
        }
        _ => true,
    };

    let (kind, args) = tokens
        .split_first()
        .ok_or_else(|| anyhow!("Reminder type is required (once, daily, weekly, biweekly, twice)"))?;

    let schedule = match kind.to_lowercase().as_str() {
        "once" => {
            let [date, time] = args else {
                return Err(anyhow!("Use: once YYYY-MM-DD HH:MM"));
            };
            let run_at = parse_local_datetime(&format!("{date} {time}"), tz)
                .ok_or_else(|| anyhow!("Invalid date/time '{} {}', expected YYYY-MM-DD HH:MM", date, time))?;
            if run_at.with_timezone(&Utc) <= now {
                return Err(anyhow!("The reminder time must be in the future"));
            }
            let offset = run_at.offset().fix();
            Schedule::Once {
                run_at: run_at.with_timezone(&offset),
            }
        }
        "daily" => {
            let [time] = args else {
                return Err(anyhow!("Use: daily HH:MM"));
            };
            Schedule::Daily { time: require_time(time)? }
        }
        "weekly" | "biweekly" => {
            let [day, time] = args else {
                return Err(anyhow!("Use: {} <weekday> HH:MM", kind.to_lowercase()));
            };
            let weekday = parse_weekday(day).ok_or_else(|| anyhow!("Unknown weekday '{}'", day))?;
            let time = require_time(time)?;
            if kind.eq_ignore_ascii_case("weekly") {
                Schedule::Weekly { weekday, time }
            } else {
                Schedule::Biweekly {
                    weekday,
                    time,
                    every_n_weeks: 2,
                }
            }
        }
        "twice" => {
            let [days, time] = args else {
                return Err(anyhow!("Use: twice <weekday>,<weekday> HH:MM"));
            };
            Schedule::Twice {
                weekdays: parse_weekday_set(days)?,
                time: require_time(time)?,
            }
        }
        other => {
            return Err(anyhow!(
                "Unknown reminder type '{}' (once, daily, weekly, biweekly, twice)",
                other
            ))
        }
    };

    Ok(ReminderRequest {
        schedule,
        text,
        ignore_inactive,
    })
}

fn require_time(input: &str) -> Result<chrono::NaiveTime> {
    parse_time_of_day(input).ok_or_else(|| anyhow!("Invalid time '{}', expected HH:MM", input))
}

/// Comma separated weekdays, kept in the given order without duplicates. At least two.
pub fn parse_weekday_set(input: &str) -> Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day = parse_weekday(part).ok_or_else(|| anyhow!("Unknown weekday '{}'", part))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.len() < 2 {
        return Err(anyhow!("List at least two different weekdays, e.g. Mon,Thu"));
    }
    Ok(days)
}

pub fn validate_reminder_text(text: &str, has_photo: bool) -> Result<()> {
    let text = text.trim();

    if text.is_empty() {
        return Err(anyhow!("Reminder text cannot be empty"));
    }

    let limit = if has_photo { MAX_CAPTION_LENGTH } else { MAX_MESSAGE_LENGTH };
    if text.chars().count() > limit {
        return Err(anyhow!("Reminder text cannot be longer than {} characters", limit));
    }

    Ok(())
}

/// Resolves a stored media reference to a file inside `upload_dir`.
///
/// Only the final path component of `candidate` is used, and the result must
/// exist and stay under the upload directory after symlinks are resolved.
pub fn resolve_media_path(upload_dir: &Path, candidate: &Path) -> Option<PathBuf> {
    let file_name = candidate.file_name()?;
    let root = upload_dir.canonicalize().ok()?;
    let resolved = root.join(file_name).canonicalize().ok()?;
    (resolved.starts_with(&root) && resolved.is_file()).then_some(resolved)
}

/// Parses `<name> | <base cpm>`.
pub fn parse_referrer_input(input: &str) -> Result<(String, f64)> {
    let (name, cpm) = input
        .split_once('|')
        .ok_or_else(|| anyhow!("Use: <name> | <base cpm>"))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Referrer name cannot be empty"));
    }
    if name.chars().count() > 100 {
        return Err(anyhow!("Referrer name cannot be longer than 100 characters"));
    }

    Ok((name.to_string(), parse_base_cpm(cpm)?))
}

fn parse_base_cpm(raw: &str) -> Result<f64> {
    let base_cpm: f64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("Base CPM must be a number"))?;
    if !base_cpm.is_finite() || base_cpm < 0.0 {
        return Err(anyhow!("Base CPM must be zero or more"));
    }
    Ok(base_cpm)
}

pub fn parse_referrer_id(raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(anyhow!("Referrer id must be a positive number")),
    }
}

/// Parses `<referrer id> | <base cpm>`.
pub fn parse_edit_cpm_input(input: &str) -> Result<(i64, f64)> {
    let (id, cpm) = input
        .split_once('|')
        .ok_or_else(|| anyhow!("Use: <referrer id> | <base cpm>"))?;
    Ok((parse_referrer_id(id)?, parse_base_cpm(cpm)?))
}

/// Parses `<referrer id> | <name>, <name>, ...`.
pub fn parse_referrals_input(input: &str) -> Result<(i64, Vec<String>)> {
    let (id, names) = input
        .split_once('|')
        .ok_or_else(|| anyhow!("Use: <referrer id> | <name>, <name>"))?;

    let referrer_id = parse_referrer_id(id)?;

    let names: Vec<String> = names
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return Err(anyhow!("List at least one referred name"));
    }

    Ok((referrer_id, names))
}

/// Parses `<days> <HH:MM>` for the announcement schedule.
pub fn parse_announcement_schedule_input(input: &str) -> Result<AnnouncementSchedule> {
    let (days, time) = input
        .trim()
        .rsplit_once(char::is_whitespace)
        .ok_or_else(|| anyhow!("Use: <days> HH:MM, e.g. Mon,Thu 10:00"))?;

    let time = require_time(time.trim())?;

    let mut parsed = Vec::new();
    for part in days.trim().split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day = parse_weekday(part).ok_or_else(|| anyhow!("Unknown weekday '{}'", part))?;
        if !parsed.contains(&day) {
            parsed.push(day);
        }
    }
    if parsed.is_empty() {
        return Err(anyhow!("List at least one weekday"));
    }
    Ok(AnnouncementSchedule { days: parsed, time })
}

pub fn validate_telegram_chat_id(chat_id: i64) -> Result<()> {
    // Telegram chat IDs should be non-zero
    if chat_id == 0 {
        return Err(anyhow!("Chat ID cannot be zero"));
    }

    // Positive IDs should be within reasonable range for user chats (up to 2^31-1)
    if chat_id > 2147483647 {
        return Err(anyhow!("Invalid user chat ID range"));
    }

    // Supergroups and channels sit around -100xxxxxxxxxx
    if chat_id < -2000000000000 {
        return Err(anyhow!("Chat ID out of valid range"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn tz() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_daily_request() {
        let request = parse_reminder_request("daily 09:00 | Standup", &tz(), now()).unwrap();
        assert_eq!(
            request.schedule,
            Schedule::Daily { time: NaiveTime::from_hms_opt(9, 0, 0).unwrap() }
        );
        assert_eq!(request.text, "Standup");
        assert!(request.ignore_inactive);
    }

    #[test]
    fn test_include_inactive_flag() {
        let request = parse_reminder_request("twice Mon,Thu 09:00 all | Hello", &tz(), now()).unwrap();
        assert!(!request.ignore_inactive);
        assert_eq!(
            request.schedule,
            Schedule::Twice {
                weekdays: vec![Weekday::Mon, Weekday::Thu],
                time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_once_in_past_is_rejected() {
        let err = parse_reminder_request("once 2025-01-14 09:00 | Late", &tz(), now()).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn test_missing_separator_or_text() {
        assert!(parse_reminder_request("daily 09:00 Standup", &tz(), now()).is_err());
        assert!(parse_reminder_request("daily 09:00 |   ", &tz(), now()).is_err());
        assert!(parse_reminder_request("hourly 09:00 | x", &tz(), now()).is_err());
        assert!(parse_reminder_request("weekly Someday 09:00 | x", &tz(), now()).is_err());
    }

    #[test]
    fn test_weekday_set_needs_two_days() {
        assert!(parse_weekday_set("Mon").is_err());
        assert!(parse_weekday_set("Mon,mon").is_err());
        assert_eq!(parse_weekday_set("thu, mon").unwrap(), vec![Weekday::Thu, Weekday::Mon]);
    }

    #[test]
    fn test_caption_limit_applies_to_photos() {
        let long = "a".repeat(MAX_CAPTION_LENGTH + 1);
        assert!(validate_reminder_text(&long, false).is_ok());
        assert!(validate_reminder_text(&long, true).is_err());
    }

    #[test]
    fn test_resolve_media_path_stays_inside_upload_dir() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        fs::write(uploads.join("a.jpg"), b"jpg").unwrap();
        fs::write(dir.path().join("secret.jpg"), b"nope").unwrap();

        assert!(resolve_media_path(&uploads, Path::new("a.jpg")).is_some());
        assert!(resolve_media_path(&uploads, Path::new("/elsewhere/a.jpg")).is_some());
        assert!(resolve_media_path(&uploads, Path::new("../secret.jpg")).is_none());
        assert!(resolve_media_path(&uploads, Path::new("missing.jpg")).is_none());
        assert!(resolve_media_path(&uploads, Path::new("..")).is_none());
    }

    #[test]
    fn test_parse_referrer_and_referrals() {
        assert_eq!(parse_referrer_input("Jane Doe | 0.55").unwrap(), ("Jane Doe".to_string(), 0.55));
        assert!(parse_referrer_input(" | 1").is_err());
        assert!(parse_referrer_input("Jane | -1").is_err());

        let (id, names) = parse_referrals_input("3 | Bob, , Alice").unwrap();
        assert_eq!(id, 3);
        assert_eq!(names, vec!["Bob".to_string(), "Alice".to_string()]);
        assert!(parse_referrals_input("x | Bob").is_err());
    }

    #[test]
    fn test_parse_edit_cpm_and_referrer_id() {
        assert_eq!(parse_edit_cpm_input(" 4 | 0.7 ").unwrap(), (4, 0.7));
        assert!(parse_edit_cpm_input("4 0.7").is_err());
        assert!(parse_edit_cpm_input("4 | NaN").is_err());
        assert!(parse_edit_cpm_input("0 | 0.7").is_err());

        assert_eq!(parse_referrer_id(" 12 ").unwrap(), 12);
        assert!(parse_referrer_id("").is_err());
        assert!(parse_referrer_id("-3").is_err());
    }

    #[test]
    fn test_parse_announcement_schedule_input() {
        let schedule = parse_announcement_schedule_input("Mon, thu 10:30").unwrap();
        assert_eq!(schedule.days, vec![Weekday::Mon, Weekday::Thu]);
        assert_eq!(schedule.time, NaiveTime::from_hms_opt(10, 30, 0).unwrap());

        assert!(parse_announcement_schedule_input(", 10:00").is_err());
        assert!(parse_announcement_schedule_input("Mon").is_err());
        assert!(parse_announcement_schedule_input("Funday 10:00").is_err());
    }

    #[test]
    fn test_validate_telegram_chat_id() {
        assert!(validate_telegram_chat_id(123456789).is_ok());
        assert!(validate_telegram_chat_id(-1001234567890).is_ok());
        assert!(validate_telegram_chat_id(0).is_err());
    }
}
