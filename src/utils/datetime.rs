use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

const WEEKDAY_SHORT_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parses `HH:MM` (24h clock).
pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").ok()
}

pub fn format_time_of_day(time: &NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Accepts full names, three letter abbreviations and `0`..`6` (0 = Monday).
pub fn parse_weekday(input: &str) -> Option<Weekday> {
    let upper = input.trim().to_uppercase();
    if let Ok(index) = upper.parse::<i64>() {
        return weekday_from_index(index);
    }
    match upper.as_str() {
        "MON" | "MONDAY" => Some(Weekday::Mon),
        "TUE" | "TUESDAY" => Some(Weekday::Tue),
        "WED" | "WEDNESDAY" => Some(Weekday::Wed),
        "THU" | "THURSDAY" => Some(Weekday::Thu),
        "FRI" | "FRIDAY" => Some(Weekday::Fri),
        "SAT" | "SATURDAY" => Some(Weekday::Sat),
        "SUN" | "SUNDAY" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Stored weekday index (0 = Monday .. 6 = Sunday).
pub fn weekday_from_index(index: i64) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_index(weekday: Weekday) -> i64 {
    i64::from(weekday.num_days_from_monday())
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_SHORT_NAMES[weekday.num_days_from_monday() as usize]
}

pub fn format_weekday_list(days: &[Weekday]) -> String {
    days.iter()
        .map(|day| weekday_name(*day))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses `YYYY-MM-DD HH:MM` as wall-clock time in `tz`.
///
/// Returns `None` for malformed input and for local times skipped by a DST jump.
pub fn parse_local_datetime(input: &str, tz: &Tz) -> Option<DateTime<Tz>> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), "%Y-%m-%d %H:%M").ok()?;
    tz.from_local_datetime(&naive).earliest()
}

pub fn format_datetime<T: TimeZone>(dt: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    dt.format("%A, %B %d at %H:%M").to_string()
}
