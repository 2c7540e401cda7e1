#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use common::{setup_test_db, FakeChannel};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use referral_bot::database::connection::DatabaseManager;
use referral_bot::database::models::{
    reminder_job_id, Admin, ApprovedChat, NewReminder, Reminder, Schedule, TrackedChat,
};
use referral_bot::services::broadcast::{BroadcastPolicy, Broadcaster};
use referral_bot::services::reminder::{ReminderError, ReminderService, RestoreSummary};
use referral_bot::services::scheduler::JobScheduler;

struct Harness {
    db: Arc<DatabaseManager>,
    channel: Arc<FakeChannel>,
    scheduler: JobScheduler,
    service: ReminderService,
    upload_dir: PathBuf,
    _temp_dir: TempDir,
}

fn tz() -> Tz {
    "America/New_York".parse().unwrap()
}

async fn harness() -> Harness {
    let (db, temp_dir) = setup_test_db().await;
    let upload_dir = temp_dir.path().join("uploads");
    std::fs::create_dir_all(&upload_dir).unwrap();

    let channel = FakeChannel::new();
    let broadcaster = Arc::new(Broadcaster::new(
        channel.clone(),
        db.clone(),
        BroadcastPolicy::default(),
        vec![],
        vec![],
    ));
    let scheduler = JobScheduler::new();
    let service = ReminderService::new(db.clone(), scheduler.clone(), broadcaster, tz(), upload_dir.clone());

    TrackedChat::upsert(&db.pool, -1001, "supergroup", Some("Drivers North")).await.unwrap();
    TrackedChat::upsert(&db.pool, -1002, "group", Some("Drivers South")).await.unwrap();

    Harness {
        db,
        channel,
        scheduler,
        service,
        upload_dir,
        _temp_dir: temp_dir,
    }
}

fn nine() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn new_reminder(schedule: Schedule) -> NewReminder {
    NewReminder {
        text: "Submit your logs".to_string(),
        schedule,
        created_by: 7,
        media_path: None,
        ignore_inactive: true,
    }
}

#[tokio::test]
async fn test_create_registers_one_job() {
    let h = harness().await;

    let reminder = h
        .service
        .create_reminder(new_reminder(Schedule::Daily { time: nine() }))
        .await
        .unwrap();

    assert!(reminder.active);
    assert_eq!(h.scheduler.job_ids(), vec![reminder_job_id(reminder.id)]);
    assert!(h.service.next_fire(reminder.id).unwrap() > Utc::now());
}

#[tokio::test]
async fn test_create_rejects_blank_text_and_foreign_media() {
    let h = harness().await;

    let mut blank = new_reminder(Schedule::Daily { time: nine() });
    blank.text = "   ".to_string();
    assert!(matches!(
        h.service.create_reminder(blank).await,
        Err(ReminderError::Validation(_))
    ));

    let mut foreign = new_reminder(Schedule::Daily { time: nine() });
    foreign.media_path = Some(PathBuf::from("/etc/passwd"));
    assert!(matches!(
        h.service.create_reminder(foreign).await,
        Err(ReminderError::InvalidMedia(_))
    ));

    assert!(Reminder::find_all(&h.db.pool).await.unwrap().is_empty());
    assert!(h.scheduler.is_empty());
}

#[tokio::test]
async fn test_restore_deactivates_past_one_time_reminders() {
    let h = harness().await;

    let past = (Utc::now() - Duration::hours(1)).into();
    let expired_id = Reminder::create(&h.db.pool, &new_reminder(Schedule::Once { run_at: past }))
        .await
        .unwrap();
    let daily_id = Reminder::create(&h.db.pool, &new_reminder(Schedule::Daily { time: nine() }))
        .await
        .unwrap();
    let disabled_id = Reminder::create(
        &h.db.pool,
        &new_reminder(Schedule::Weekly { weekday: Weekday::Fri, time: nine() }),
    )
    .await
    .unwrap();
    Reminder::set_active(&h.db.pool, disabled_id, false).await.unwrap();

    let summary = h.service.restore_reminders().await.unwrap();

    assert_eq!(
        summary,
        RestoreSummary {
            scheduled: 1,
            expired: 1,
            skipped: 0
        }
    );
    assert_eq!(h.scheduler.job_ids(), vec![reminder_job_id(daily_id)]);
    let expired = Reminder::find_by_id(&h.db.pool, expired_id).await.unwrap().unwrap();
    assert!(!expired.active);
}

#[tokio::test]
async fn test_restore_is_idempotent() {
    let h = harness().await;
    for schedule in [
        Schedule::Daily { time: nine() },
        Schedule::Biweekly { weekday: Weekday::Mon, time: nine(), every_n_weeks: 2 },
        Schedule::Twice { weekdays: vec![Weekday::Mon, Weekday::Thu], time: nine() },
    ] {
        Reminder::create(&h.db.pool, &new_reminder(schedule)).await.unwrap();
    }

    h.service.restore_reminders().await.unwrap();
    h.service.restore_reminders().await.unwrap();

    assert_eq!(h.scheduler.len(), 3);
}

#[tokio::test]
async fn test_one_time_reminder_fires_once() {
    let h = harness().await;
    let run_at = (Utc::now() + Duration::hours(2)).into();
    let reminder = h
        .service
        .create_reminder(new_reminder(Schedule::Once { run_at }))
        .await
        .unwrap();

    let report = h.service.fire_reminder(reminder.id).await.unwrap();

    assert_eq!(report.delivered.len(), 2);
    assert!(h.scheduler.is_empty());
    let row = Reminder::find_by_id(&h.db.pool, reminder.id).await.unwrap().unwrap();
    assert!(!row.active);

    let summary = h.service.restore_reminders().await.unwrap();
    assert_eq!(summary.scheduled, 0);
    assert!(h.service.fire_reminder(reminder.id).await.is_none());
}

#[tokio::test]
async fn test_toggle_and_delete_keep_jobs_in_sync() {
    let h = harness().await;
    let reminder = h
        .service
        .create_reminder(new_reminder(Schedule::Daily { time: nine() }))
        .await
        .unwrap();
    let job_id = reminder_job_id(reminder.id);

    let disabled = h.service.toggle_reminder(reminder.id).await.unwrap().unwrap();
    assert!(!disabled.active);
    assert!(!h.scheduler.contains(&job_id));
    assert!(h.service.fire_reminder(reminder.id).await.is_none());

    let enabled = h.service.toggle_reminder(reminder.id).await.unwrap().unwrap();
    assert!(enabled.active);
    assert!(h.scheduler.contains(&job_id));

    assert!(h.service.delete_reminder(reminder.id).await.unwrap());
    assert!(!h.scheduler.contains(&job_id));
    assert!(!h.service.delete_reminder(reminder.id).await.unwrap());
    assert!(h.service.toggle_reminder(reminder.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_toggle_leaves_unreadable_reminder_untouched() {
    let h = harness().await;
    let reminder = h
        .service
        .create_reminder(new_reminder(Schedule::Daily { time: nine() }))
        .await
        .unwrap();
    sqlx::query("UPDATE reminders SET time_of_day = 'quarter past' WHERE id = ?")
        .bind(reminder.id)
        .execute(&h.db.pool)
        .await
        .unwrap();

    assert!(matches!(
        h.service.set_active(reminder.id, false).await,
        Err(ReminderError::Validation(_))
    ));
    let row = Reminder::find_by_id(&h.db.pool, reminder.id).await.unwrap().unwrap();
    assert!(row.active);
    assert!(!h.scheduler.contains(&reminder_job_id(reminder.id)));
}

#[tokio::test]
async fn test_missing_media_falls_back_to_text() {
    let h = harness().await;
    let photo = h.upload_dir.join("flyer.jpg");
    std::fs::write(&photo, b"jpeg").unwrap();

    let mut new = new_reminder(Schedule::Daily { time: nine() });
    new.media_path = Some(PathBuf::from("flyer.jpg"));
    let reminder = h.service.create_reminder(new).await.unwrap();
    assert!(reminder.media_path.is_some());

    h.service.fire_reminder(reminder.id).await.unwrap();
    assert!(h.channel.delivered().iter().all(|sent| sent.photo.is_some()));

    std::fs::remove_file(&photo).unwrap();
    h.service.fire_reminder(reminder.id).await.unwrap();
    let sent = h.channel.delivered();
    assert_eq!(sent.len(), 4);
    assert!(sent[2..].iter().all(|sent| sent.photo.is_none() && sent.text == "Submit your logs"));
}

#[tokio::test]
async fn test_twice_weekly_reminder_broadcasts_on_tick() {
    let h = harness().await;

    // Chats that are active but must never receive the broadcast.
    TrackedChat::upsert(&h.db.pool, -1003, "group", Some("Dispatch Staff")).await.unwrap();
    ApprovedChat::add(&h.db.pool, -1003, Some("Dispatch Staff"), 7).await.unwrap();
    TrackedChat::upsert(&h.db.pool, 555, "private", Some("Ops Lead")).await.unwrap();
    Admin::add(&h.db.pool, 555, Some("opslead"), 7).await.unwrap();
    TrackedChat::upsert(&h.db.pool, -1004, "group", Some("*INACTIVE* Drivers East")).await.unwrap();
    let reminder = h
        .service
        .create_reminder(new_reminder(Schedule::Twice {
            weekdays: vec![Weekday::Mon, Weekday::Thu],
            time: nine(),
        }))
        .await
        .unwrap();

    let first = h.service.next_fire(reminder.id).unwrap();
    let local = first.with_timezone(&tz());
    assert!(matches!(local.weekday(), Weekday::Mon | Weekday::Thu));
    assert_eq!((local.hour(), local.minute()), (9, 0));

    assert_eq!(h.scheduler.tick(first - Duration::seconds(1)).await, 0);
    assert_eq!(h.scheduler.tick(first).await, 1);

    let mut delivered = h.channel.delivered_chat_ids();
    delivered.sort();
    assert_eq!(delivered, vec![-1002, -1001]);
    assert_eq!(h.channel.attempts_for(-1003), 0);
    assert_eq!(h.channel.attempts_for(555), 0);
    assert_eq!(h.channel.attempts_for(-1004), 0);
    assert!(h.service.next_fire(reminder.id).unwrap() > first);
}
