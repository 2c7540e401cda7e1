//! In-process job table.
//!
//! Jobs are keyed by a string id and carry a [`Trigger`] plus an async
//! callback. A `tokio-cron-scheduler` ticker wakes every few seconds and calls
//! [`JobScheduler::tick`], which runs whatever is due. Ticks never overlap: a
//! tick that finds the previous one still running is skipped, and the jobs it
//! would have fired stay due until the next tick gets through.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler as CronTicker, JobSchedulerError};

use crate::utils::datetime::weekday_name;
use crate::utils::logging::log_job_event;

/// How often the ticker checks the job table.
pub const TICK_SCHEDULE: &str = "*/10 * * * * *";

/// Cron candidates checked per lookup before a trigger counts as spent.
const CRON_LOOKAHEAD: usize = 32;

/// Work attached to a job. Called once per fire.
pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("a weekly trigger needs at least one weekday")]
    NoWeekdays,
    #[error("interval must be positive")]
    EmptyInterval,
}

/// When a job fires.
#[derive(Clone)]
pub enum Trigger {
    /// Fires once at an absolute instant.
    Date { run_at: DateTime<Utc> },
    /// Calendar rule evaluated as wall-clock time in `timezone`.
    Cron {
        expression: String,
        schedule: CronSchedule,
        timezone: Tz,
    },
    /// Fires at `anchor` and every `every` after it, keeping the anchor's
    /// local time of day across DST changes.
    Interval {
        anchor: DateTime<Tz>,
        every: ChronoDuration,
    },
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Date { run_at } => f.debug_struct("Date").field("run_at", run_at).finish(),
            Trigger::Cron { expression, timezone, .. } => f
                .debug_struct("Cron")
                .field("expression", expression)
                .field("timezone", timezone)
                .finish(),
            Trigger::Interval { anchor, every } => f
                .debug_struct("Interval")
                .field("anchor", anchor)
                .field("every", every)
                .finish(),
        }
    }
}

impl Trigger {
    pub fn date(run_at: DateTime<Utc>) -> Self {
        Trigger::Date { run_at }
    }

    /// Six-field cron expression (`sec min hour day month weekday`).
    pub fn cron(expression: &str, timezone: Tz) -> Result<Self, TriggerError> {
        let schedule = CronSchedule::from_str(expression).map_err(|e| TriggerError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Trigger::Cron {
            expression: expression.to_string(),
            schedule,
            timezone,
        })
    }

    /// Every day at `time`.
    pub fn daily(time: NaiveTime, timezone: Tz) -> Result<Self, TriggerError> {
        Self::cron(&format!("0 {} {} * * *", time.minute(), time.hour()), timezone)
    }

    /// Every listed weekday at `time`.
    pub fn on_weekdays(days: &[Weekday], time: NaiveTime, timezone: Tz) -> Result<Self, TriggerError> {
        if days.is_empty() {
            return Err(TriggerError::NoWeekdays);
        }
        let day_list = days.iter().map(|day| weekday_name(*day)).collect::<Vec<_>>().join(",");
        Self::cron(
            &format!("0 {} {} * * {}", time.minute(), time.hour(), day_list),
            timezone,
        )
    }

    pub fn interval(anchor: DateTime<Tz>, every: ChronoDuration) -> Result<Self, TriggerError> {
        if every <= ChronoDuration::zero() {
            return Err(TriggerError::EmptyInterval);
        }
        Ok(Trigger::Interval { anchor, every })
    }

    /// First fire strictly after `after`, or `None` when the trigger is spent.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Date { run_at } => (*run_at > after).then_some(*run_at),
            Trigger::Cron { schedule, timezone, .. } => next_cron_fire(schedule, timezone, after),
            Trigger::Interval { anchor, every } => next_interval_fire(anchor, *every, after),
        }
    }
}

/// Walks cron candidates as naive wall-clock times and resolves each one in
/// `timezone`, so a day whose fire time falls in a DST gap or overlap still
/// fires exactly once.
fn next_cron_fire(schedule: &CronSchedule, timezone: &Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    // Start an hour early: after a fire in the repeated hour, the wall clock reads earlier than it did.
    let wall_after = after.with_timezone(timezone).naive_local() - ChronoDuration::hours(1);
    schedule
        .after(&Utc.from_utc_datetime(&wall_after))
        .take(CRON_LOOKAHEAD)
        .filter_map(|wall| localize(timezone, &wall.naive_utc()))
        .map(|at| at.with_timezone(&Utc))
        .find(|at| *at > after)
}

fn next_interval_fire(anchor: &DateTime<Tz>, every: ChronoDuration, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let anchor_utc = anchor.with_timezone(&Utc);
    if anchor_utc > after {
        return Some(anchor_utc);
    }

    let timezone = anchor.timezone();
    let base = anchor.naive_local();
    let step = every.num_seconds();
    if step <= 0 {
        return None;
    }

    let elapsed = (after.with_timezone(&timezone).naive_local() - base).num_seconds();
    let mut periods = (elapsed / step).max(0);

    // The local-time estimate can be off by one period around DST changes.
    for _ in 0..4 {
        let local = base.checked_add_signed(ChronoDuration::seconds(step.checked_mul(periods)?))?;
        if let Some(candidate) = localize(&timezone, &local) {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > after {
                return Some(candidate);
            }
        }
        periods += 1;
    }
    None
}

/// Resolves a wall-clock time, moving times inside a DST gap forward an hour.
pub fn localize(timezone: &Tz, local: &NaiveDateTime) -> Option<DateTime<Tz>> {
    timezone
        .from_local_datetime(local)
        .earliest()
        .or_else(|| timezone.from_local_datetime(&(*local + ChronoDuration::hours(1))).earliest())
}

struct ScheduledJob {
    trigger: Trigger,
    next_fire: DateTime<Utc>,
    callback: JobCallback,
}

/// Process-wide job table plus the ticker driving it.
#[derive(Clone, Default)]
pub struct JobScheduler {
    jobs: Arc<Mutex<HashMap<String, ScheduledJob>>>,
    tick_gate: Arc<tokio::sync::Mutex<()>>,
    ticker: Arc<tokio::sync::Mutex<Option<CronTicker>>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, ScheduledJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `job_id`, replacing any job already under that id.
    ///
    /// Returns the first fire time. A trigger with no future fire is not
    /// stored and `None` is returned.
    pub fn schedule(&self, job_id: &str, trigger: Trigger, callback: JobCallback) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        let mut jobs = self.jobs();
        jobs.remove(job_id);

        let Some(next_fire) = trigger.next_fire_after(now) else {
            log_job_event("skipped", job_id, Some("trigger has no future fire time"));
            return None;
        };

        log_job_event(
            "registered",
            job_id,
            Some(&format!("{:?}, next fire {}", trigger, next_fire.to_rfc3339())),
        );
        jobs.insert(
            job_id.to_string(),
            ScheduledJob {
                trigger,
                next_fire,
                callback,
            },
        );
        Some(next_fire)
    }

    /// Removes `job_id`. Unknown ids are ignored.
    pub fn unschedule(&self, job_id: &str) -> bool {
        let removed = self.jobs().remove(job_id).is_some();
        if removed {
            log_job_event("removed", job_id, None);
        }
        removed
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs().contains_key(job_id)
    }

    pub fn next_fire(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.jobs().get(job_id).map(|job| job.next_fire)
    }

    /// Registered ids, sorted.
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Runs every job due at `now`, waiting for a running tick to finish first.
    ///
    /// Returns how many callbacks ran.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let _gate = self.tick_gate.lock().await;
        self.run_due(now).await
    }

    /// Like [`tick`](Self::tick), but gives up immediately when another tick
    /// is in progress.
    pub async fn try_tick(&self, now: DateTime<Utc>) -> Option<usize> {
        let Ok(_gate) = self.tick_gate.try_lock() else {
            tracing::debug!("JOB: tick skipped, previous tick still running");
            return None;
        };
        Some(self.run_due(now).await)
    }

    async fn run_due(&self, now: DateTime<Utc>) -> usize {
        let due = {
            let mut jobs = self.jobs();
            let mut due = Vec::new();
            let mut spent = Vec::new();

            for (job_id, job) in jobs.iter_mut() {
                if job.next_fire > now {
                    continue;
                }
                due.push((job_id.clone(), job.callback.clone()));
                match job.trigger.next_fire_after(now) {
                    Some(next) => job.next_fire = next,
                    None => spent.push(job_id.clone()),
                }
            }
            for job_id in spent {
                jobs.remove(&job_id);
            }
            due
        };

        let fired = due.len();
        for (job_id, callback) in due {
            log_job_event("fired", &job_id, None);
            callback().await;
        }
        fired
    }

    /// Starts the background ticker.
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        let mut ticker_slot = self.ticker.lock().await;
        if ticker_slot.is_some() {
            return Ok(());
        }

        let ticker = CronTicker::new().await?;
        let table = self.clone();
        let tick_job = Job::new_async(TICK_SCHEDULE, move |_uuid, _lock| {
            let table = table.clone();
            Box::pin(async move {
                table.try_tick(Utc::now()).await;
            })
        })?;
        ticker.add(tick_job).await?;
        ticker.start().await?;

        *ticker_slot = Some(ticker);
        tracing::info!("Job scheduler started - ticking on '{}'", TICK_SCHEDULE);
        Ok(())
    }

    /// Stops the ticker and drops every registered job.
    pub async fn stop(&self) -> Result<(), JobSchedulerError> {
        if let Some(mut ticker) = self.ticker.lock().await.take() {
            ticker.shutdown().await?;
        }
        self.jobs().clear();
        tracing::info!("Job scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: Arc<AtomicUsize>) -> JobCallback {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    fn new_york() -> Tz {
        "America/New_York".parse().unwrap()
    }

    #[test]
    fn test_date_trigger_only_fires_in_future() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let trigger = Trigger::date(at);
        assert_eq!(trigger.next_fire_after(at - ChronoDuration::seconds(1)), Some(at));
        assert_eq!(trigger.next_fire_after(at), None);
    }

    #[test]
    fn test_weekday_cron_trigger_uses_local_time() {
        let tz = new_york();
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let trigger = Trigger::on_weekdays(&[Weekday::Mon, Weekday::Thu], time, tz).unwrap();

        // Wednesday 2025-01-15 12:00 New York
        let after = tz.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap().with_timezone(&Utc);
        let next = trigger.next_fire_after(after).unwrap().with_timezone(&tz);
        assert_eq!(next, tz.with_ymd_and_hms(2025, 1, 16, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_empty_weekday_list_is_rejected() {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(
            Trigger::on_weekdays(&[], time, new_york()).unwrap_err(),
            TriggerError::NoWeekdays
        );
    }

    #[test]
    fn test_interval_keeps_wall_clock_across_dst() {
        let tz = new_york();
        let anchor = tz.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let trigger = Trigger::interval(anchor, ChronoDuration::weeks(2)).unwrap();

        let first = trigger.next_fire_after(anchor.with_timezone(&Utc)).unwrap();
        // Two weeks later is after the March 9 switch to daylight time.
        assert_eq!(first.with_timezone(&tz), tz.with_ymd_and_hms(2025, 3, 17, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_interval_before_anchor_returns_anchor() {
        let tz = new_york();
        let anchor = tz.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let trigger = Trigger::interval(anchor, ChronoDuration::weeks(1)).unwrap();
        let before = anchor.with_timezone(&Utc) - ChronoDuration::days(3);
        assert_eq!(trigger.next_fire_after(before), Some(anchor.with_timezone(&Utc)));
    }

    #[tokio::test]
    async fn test_schedule_replaces_existing_job() {
        let scheduler = JobScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let later = Utc::now() + ChronoDuration::hours(1);
        let much_later = Utc::now() + ChronoDuration::hours(5);

        scheduler.schedule("job", Trigger::date(later), counting_callback(counter.clone()));
        scheduler.schedule("job", Trigger::date(much_later), counting_callback(counter));

        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.next_fire("job"), Some(much_later));
    }

    #[tokio::test]
    async fn test_tick_runs_due_jobs_and_drops_spent_ones() {
        let scheduler = JobScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let at = Utc::now() + ChronoDuration::minutes(5);

        scheduler.schedule("once", Trigger::date(at), counting_callback(counter.clone()));

        assert_eq!(scheduler.tick(at - ChronoDuration::seconds(1)).await, 0);
        assert_eq!(scheduler.tick(at).await, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!scheduler.contains("once"));
    }

    #[test]
    fn test_unschedule_unknown_id_is_quiet() {
        let scheduler = JobScheduler::new();
        assert!(!scheduler.unschedule("missing"));
    }
}
