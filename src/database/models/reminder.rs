use chrono::{DateTime, FixedOffset, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use sqlx::FromRow;
use std::path::PathBuf;
use thiserror::Error;

use crate::utils::datetime::{
    format_time_of_day, format_weekday_list, parse_time_of_day, weekday_from_index, weekday_index,
    weekday_name,
};

/// When a reminder fires. Each kind carries only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schedule {
    Once { run_at: DateTime<FixedOffset> },
    Daily { time: NaiveTime },
    Weekly { weekday: Weekday, time: NaiveTime },
    Biweekly { weekday: Weekday, time: NaiveTime, every_n_weeks: u32 },
    Twice { weekdays: Vec<Weekday>, time: NaiveTime },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("unknown reminder type '{0}'")]
    UnknownKind(String),
    #[error("{kind} reminder is missing {field}")]
    MissingField { kind: &'static str, field: &'static str },
    #[error("invalid time of day '{0}'")]
    InvalidTime(String),
    #[error("invalid run_at '{0}'")]
    InvalidRunAt(String),
    #[error("invalid weekday '{0}'")]
    InvalidWeekday(String),
}

/// Flat column values for the `reminders` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleColumns {
    pub kind: &'static str,
    pub run_at: Option<String>,
    pub time_of_day: Option<String>,
    pub weekday: Option<i64>,
    pub weekdays: Option<String>,
    pub every_n_weeks: i64,
}

impl Schedule {
    pub fn kind(&self) -> &'static str {
        match self {
            Schedule::Once { .. } => "once",
            Schedule::Daily { .. } => "daily",
            Schedule::Weekly { .. } => "weekly",
            Schedule::Biweekly { .. } => "biweekly",
            Schedule::Twice { .. } => "twice",
        }
    }

    pub fn is_one_shot(&self) -> bool {
        matches!(self, Schedule::Once { .. })
    }

    /// Human readable summary used in reminder listings.
    pub fn describe(&self, tz: &Tz) -> String {
        match self {
            Schedule::Once { run_at } => format!(
                "[Once] {} {}",
                run_at.with_timezone(tz).format("%Y-%m-%d %H:%M"),
                tz.name()
            ),
            Schedule::Daily { time } => format!("[Daily] {}", format_time_of_day(time)),
            Schedule::Weekly { weekday, time } => {
                format!("[Weekly {}] {}", weekday_name(*weekday), format_time_of_day(time))
            }
            Schedule::Biweekly { weekday, time, .. } => {
                format!("[Bi-weekly {}] {}", weekday_name(*weekday), format_time_of_day(time))
            }
            Schedule::Twice { weekdays, time } => {
                format!("[Schedule {}] {}", format_weekday_list(weekdays), format_time_of_day(time))
            }
        }
    }

    pub fn to_columns(&self) -> ScheduleColumns {
        let mut columns = ScheduleColumns {
            kind: self.kind(),
            run_at: None,
            time_of_day: None,
            weekday: None,
            weekdays: None,
            every_n_weeks: 1,
        };
        match self {
            Schedule::Once { run_at } => columns.run_at = Some(run_at.to_rfc3339()),
            Schedule::Daily { time } => columns.time_of_day = Some(format_time_of_day(time)),
            Schedule::Weekly { weekday, time } => {
                columns.time_of_day = Some(format_time_of_day(time));
                columns.weekday = Some(weekday_index(*weekday));
            }
            Schedule::Biweekly { weekday, time, every_n_weeks } => {
                columns.time_of_day = Some(format_time_of_day(time));
                columns.weekday = Some(weekday_index(*weekday));
                columns.every_n_weeks = i64::from(*every_n_weeks);
            }
            Schedule::Twice { weekdays, time } => {
                columns.time_of_day = Some(format_time_of_day(time));
                columns.weekdays = Some(
                    weekdays
                        .iter()
                        .map(|day| weekday_index(*day).to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                );
            }
        }
        columns
    }
}

/// Raw `reminders` row. Convert with [`ReminderRow::into_reminder`].
#[derive(Debug, Clone, FromRow)]
pub struct ReminderRow {
    pub id: i64,
    pub text: String,
    pub kind: String,
    pub run_at: Option<String>,
    pub time_of_day: Option<String>,
    pub weekday: Option<i64>,
    pub weekdays: Option<String>,
    pub every_n_weeks: Option<i64>,
    pub active: bool,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub media_path: Option<String>,
    pub ignore_inactive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub id: i64,
    pub text: String,
    pub schedule: Schedule,
    pub active: bool,
    pub media_path: Option<PathBuf>,
    pub ignore_inactive: bool,
    pub created_by: Option<i64>,
    pub created_at: String,
}

/// Fields for inserting a reminder. New reminders always start active.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub text: String,
    pub schedule: Schedule,
    pub created_by: i64,
    pub media_path: Option<PathBuf>,
    pub ignore_inactive: bool,
}

impl ReminderRow {
    pub fn schedule(&self) -> Result<Schedule, ScheduleError> {
        let kind = self.kind.as_str();
        if kind == "once" {
            let raw = self.run_at.as_deref().ok_or(ScheduleError::MissingField {
                kind: "once",
                field: "run_at",
            })?;
            let run_at = DateTime::parse_from_rfc3339(raw)
                .map_err(|_| ScheduleError::InvalidRunAt(raw.to_string()))?;
            return Ok(Schedule::Once { run_at });
        }

        let static_kind = match kind {
            "daily" => "daily",
            "weekly" => "weekly",
            "biweekly" => "biweekly",
            "twice" => "twice",
            other => return Err(ScheduleError::UnknownKind(other.to_string())),
        };
        let raw_time = self.time_of_day.as_deref().ok_or(ScheduleError::MissingField {
            kind: static_kind,
            field: "time_of_day",
        })?;
        let time = parse_time_of_day(raw_time)
            .ok_or_else(|| ScheduleError::InvalidTime(raw_time.to_string()))?;

        match static_kind {
            "daily" => Ok(Schedule::Daily { time }),
            "weekly" => Ok(Schedule::Weekly {
                weekday: self.stored_weekday(static_kind)?,
                time,
            }),
            "biweekly" => Ok(Schedule::Biweekly {
                weekday: self.stored_weekday(static_kind)?,
                time,
                every_n_weeks: match self.every_n_weeks {
                    Some(n) if n >= 1 => u32::try_from(n).unwrap_or(2),
                    _ => 2,
                },
            }),
            _ => {
                let raw_days = self.weekdays.as_deref().unwrap_or_default();
                let mut weekdays = Vec::new();
                for part in raw_days.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let day = part
                        .parse::<i64>()
                        .ok()
                        .and_then(weekday_from_index)
                        .ok_or_else(|| ScheduleError::InvalidWeekday(part.to_string()))?;
                    if !weekdays.contains(&day) {
                        weekdays.push(day);
                    }
                }
                if weekdays.is_empty() {
                    return Err(ScheduleError::MissingField {
                        kind: "twice",
                        field: "weekdays",
                    });
                }
                Ok(Schedule::Twice { weekdays, time })
            }
        }
    }

    fn stored_weekday(&self, kind: &'static str) -> Result<Weekday, ScheduleError> {
        let index = self
            .weekday
            .ok_or(ScheduleError::MissingField { kind, field: "weekday" })?;
        weekday_from_index(index).ok_or_else(|| ScheduleError::InvalidWeekday(index.to_string()))
    }

    pub fn into_reminder(self) -> Result<Reminder, ScheduleError> {
        let schedule = self.schedule()?;
        Ok(Reminder {
            id: self.id,
            text: self.text,
            schedule,
            active: self.active,
            media_path: self.media_path.map(PathBuf::from),
            ignore_inactive: self.ignore_inactive,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

const SELECT_REMINDER: &str = "SELECT id, text, type AS kind, run_at, time_of_day, weekday, weekdays, \
     every_n_weeks, active, created_by, created_at, media_path, ignore_inactive FROM reminders";

impl Reminder {
    pub fn job_id(&self) -> String {
        reminder_job_id(self.id)
    }

    pub async fn create(pool: &sqlx::SqlitePool, new: &NewReminder) -> Result<i64, sqlx::Error> {
        let columns = new.schedule.to_columns();
        let created_at = Utc::now().to_rfc3339();
        let media_path = new
            .media_path
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());

        let result = sqlx::query(
            "INSERT INTO reminders \
             (text, type, run_at, time_of_day, weekday, weekdays, every_n_weeks, active, created_by, created_at, media_path, ignore_inactive) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)",
        )
        .bind(&new.text)
        .bind(columns.kind)
        .bind(&columns.run_at)
        .bind(&columns.time_of_day)
        .bind(columns.weekday)
        .bind(&columns.weekdays)
        .bind(columns.every_n_weeks)
        .bind(new.created_by)
        .bind(&created_at)
        .bind(&media_path)
        .bind(new.ignore_inactive)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All reminders, newest first.
    pub async fn find_all(pool: &sqlx::SqlitePool) -> Result<Vec<ReminderRow>, sqlx::Error> {
        sqlx::query_as::<_, ReminderRow>(&format!("{SELECT_REMINDER} ORDER BY id DESC"))
            .fetch_all(pool)
            .await
    }

    pub async fn find_active(pool: &sqlx::SqlitePool) -> Result<Vec<ReminderRow>, sqlx::Error> {
        sqlx::query_as::<_, ReminderRow>(&format!("{SELECT_REMINDER} WHERE active = 1 ORDER BY id"))
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        id: i64,
    ) -> Result<Option<ReminderRow>, sqlx::Error> {
        sqlx::query_as::<_, ReminderRow>(&format!("{SELECT_REMINDER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_active(
        pool: &sqlx::SqlitePool,
        id: i64,
        active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE reminders SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn delete(pool: &sqlx::SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub fn reminder_job_id(reminder_id: i64) -> String {
    format!("reminder_{reminder_id}")
}
