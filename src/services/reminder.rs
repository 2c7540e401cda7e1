use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::database::connection::DatabaseManager;
use crate::database::models::*;
use crate::services::broadcast::{BroadcastReport, Broadcaster};
use crate::services::delivery::OutboundMessage;
use crate::services::recurrence::{plan_registration, Registration};
use crate::services::scheduler::{JobCallback, JobScheduler};
use crate::utils::logging::{log_database_error, log_database_operation, log_job_event, log_system_event};
use crate::utils::validation::{resolve_media_path, validate_reminder_text};

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("{0}")]
    Validation(String),
    #[error("media file must be an existing file inside {0}")]
    InvalidMedia(PathBuf),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of registering one reminder with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { next_fire: DateTime<Utc> },
    /// One-shot already in the past; the reminder was deactivated.
    Expired,
    /// Schedule could not be turned into a trigger; nothing is registered.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub scheduled: usize,
    pub expired: usize,
    pub skipped: usize,
}

/// Owns the reminder lifecycle: every active reminder has exactly one job
/// registered under `reminder_<id>`, inactive and deleted ones have none.
#[derive(Clone)]
pub struct ReminderService {
    db: Arc<DatabaseManager>,
    scheduler: JobScheduler,
    broadcaster: Arc<Broadcaster>,
    timezone: Tz,
    upload_dir: PathBuf,
}

impl ReminderService {
    pub fn new(
        db: Arc<DatabaseManager>,
        scheduler: JobScheduler,
        broadcaster: Arc<Broadcaster>,
        timezone: Tz,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            scheduler,
            broadcaster,
            timezone,
            upload_dir,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        &self.upload_dir
    }

    /// Validates, stores and schedules a new reminder.
    pub async fn create_reminder(&self, mut new: NewReminder) -> Result<Reminder, ReminderError> {
        new.text = new.text.trim().to_string();
        validate_reminder_text(&new.text, new.media_path.is_some())
            .map_err(|e| ReminderError::Validation(e.to_string()))?;

        if let Some(media) = &new.media_path {
            let resolved = resolve_media_path(&self.upload_dir, media)
                .ok_or_else(|| ReminderError::InvalidMedia(self.upload_dir.clone()))?;
            new.media_path = Some(resolved);
        }

        let id = Reminder::create(&self.db.pool, &new).await?;
        log_database_operation("INSERT", "reminders", Some(&format!("id={} type={}", id, new.schedule.kind())));

        let mut reminder = Reminder {
            id,
            text: new.text,
            schedule: new.schedule,
            active: true,
            media_path: new.media_path,
            ignore_inactive: new.ignore_inactive,
            created_by: Some(new.created_by),
            created_at: Utc::now().to_rfc3339(),
        };

        if self.schedule_reminder(&reminder).await? == ScheduleOutcome::Expired {
            reminder.active = false;
        }
        Ok(reminder)
    }

    /// Registers (or replaces) the job for `reminder`.
    ///
    /// A one-shot whose time has passed is deactivated instead.
    pub async fn schedule_reminder(&self, reminder: &Reminder) -> Result<ScheduleOutcome, ReminderError> {
        let job_id = reminder.job_id();

        match plan_registration(&reminder.schedule, self.timezone, Utc::now()) {
            Ok(Registration::Trigger(trigger)) => {
                match self.scheduler.schedule(&job_id, trigger, self.fire_callback(reminder.id)) {
                    Some(next_fire) => Ok(ScheduleOutcome::Scheduled { next_fire }),
                    None => Ok(ScheduleOutcome::Skipped),
                }
            }
            Ok(Registration::Expired) => {
                self.scheduler.unschedule(&job_id);
                Reminder::set_active(&self.db.pool, reminder.id, false).await?;
                log_job_event("expired", &job_id, Some("one-time reminder is in the past, deactivated"));
                Ok(ScheduleOutcome::Expired)
            }
            Err(e) => {
                self.scheduler.unschedule(&job_id);
                log_job_event("skipped", &job_id, Some(&e.to_string()));
                Ok(ScheduleOutcome::Skipped)
            }
        }
    }

    fn fire_callback(&self, reminder_id: i64) -> JobCallback {
        let service = self.clone();
        Arc::new(move || {
            let service = service.clone();
            async move {
                service.fire_reminder(reminder_id).await;
            }
            .boxed()
        })
    }

    /// Next fire time of the reminder's job, if one is registered.
    pub fn next_fire(&self, reminder_id: i64) -> Option<DateTime<Utc>> {
        self.scheduler.next_fire(&reminder_job_id(reminder_id))
    }

    pub fn unschedule_reminder(&self, reminder_id: i64) -> bool {
        self.scheduler.unschedule(&reminder_job_id(reminder_id))
    }

    /// Re-registers every active reminder. Called once at startup.
    pub async fn restore_reminders(&self) -> Result<RestoreSummary, ReminderError> {
        let rows = Reminder::find_active(&self.db.pool).await?;
        let mut summary = RestoreSummary::default();

        for row in rows {
            let id = row.id;
            let reminder = match row.into_reminder() {
                Ok(reminder) => reminder,
                Err(e) => {
                    log_job_event("skipped", &reminder_job_id(id), Some(&format!("unreadable schedule: {e}")));
                    self.unschedule_reminder(id);
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.schedule_reminder(&reminder).await? {
                ScheduleOutcome::Scheduled { .. } => summary.scheduled += 1,
                ScheduleOutcome::Expired => summary.expired += 1,
                ScheduleOutcome::Skipped => summary.skipped += 1,
            }
        }

        log_system_event(
            "Reminders restored",
            Some(&format!(
                "{} scheduled, {} expired, {} skipped",
                summary.scheduled, summary.expired, summary.skipped
            )),
        );
        Ok(summary)
    }

    /// Enables or disables a reminder. Returns `None` for unknown ids.
    pub async fn set_active(&self, reminder_id: i64, active: bool) -> Result<Option<Reminder>, ReminderError> {
        let Some(row) = Reminder::find_by_id(&self.db.pool, reminder_id).await? else {
            return Ok(None);
        };

        let mut reminder = match row.into_reminder() {
            Ok(reminder) => reminder,
            Err(e) => {
                self.unschedule_reminder(reminder_id);
                return Err(ReminderError::Validation(format!(
                    "reminder {reminder_id} has an unreadable schedule: {e}"
                )));
            }
        };

        Reminder::set_active(&self.db.pool, reminder_id, active).await?;
        reminder.active = active;

        if !active {
            self.unschedule_reminder(reminder_id);
            return Ok(Some(reminder));
        }

        if self.schedule_reminder(&reminder).await? == ScheduleOutcome::Expired {
            reminder.active = false;
        }
        Ok(Some(reminder))
    }

    pub async fn toggle_reminder(&self, reminder_id: i64) -> Result<Option<Reminder>, ReminderError> {
        let Some(row) = Reminder::find_by_id(&self.db.pool, reminder_id).await? else {
            return Ok(None);
        };
        self.set_active(reminder_id, !row.active).await
    }

    /// Deletes the row and its job. Returns whether the reminder existed.
    pub async fn delete_reminder(&self, reminder_id: i64) -> Result<bool, ReminderError> {
        let deleted = Reminder::delete(&self.db.pool, reminder_id).await?;
        self.unschedule_reminder(reminder_id);
        if deleted {
            log_database_operation("DELETE", "reminders", Some(&format!("id={reminder_id}")));
        }
        Ok(deleted)
    }

    /// Job body: broadcast the reminder, then retire it if it was one-shot.
    ///
    /// Reads the reminder fresh so a toggle or delete that raced the fire wins.
    pub async fn fire_reminder(&self, reminder_id: i64) -> Option<BroadcastReport> {
        let row = match Reminder::find_by_id(&self.db.pool, reminder_id).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::debug!("Reminder {} no longer exists, nothing to send", reminder_id);
                return None;
            }
            Err(e) => {
                log_database_error("SELECT", "reminders", &e.to_string(), Some(&format!("id={reminder_id}")));
                return None;
            }
        };

        let reminder = match row.into_reminder() {
            Ok(reminder) => reminder,
            Err(e) => {
                tracing::warn!("Reminder {} has an unreadable schedule: {}", reminder_id, e);
                return None;
            }
        };
        if !reminder.active {
            return None;
        }

        let mut message = OutboundMessage::text(reminder.text.clone());
        if let Some(path) = &reminder.media_path {
            if path.is_file() {
                message = message.with_photo(path.clone());
            } else {
                tracing::warn!(
                    "Reminder {} media {} is missing, sending text only",
                    reminder_id,
                    path.display()
                );
            }
        }

        let report = self.broadcaster.broadcast(&message, reminder.ignore_inactive).await;

        if reminder.schedule.is_one_shot() {
            if let Err(e) = Reminder::set_active(&self.db.pool, reminder_id, false).await {
                log_database_error("UPDATE", "reminders", &e.to_string(), Some(&format!("id={reminder_id}")));
            }
            self.unschedule_reminder(reminder_id);
        }

        Some(report)
    }
}
