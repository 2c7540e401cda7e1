//! Turns a stored reminder schedule into a scheduler trigger.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::database::models::Schedule;
use crate::services::scheduler::{localize, Trigger, TriggerError};

/// What registering a schedule at a given instant amounts to.
#[derive(Debug, Clone)]
pub enum Registration {
    Trigger(Trigger),
    /// A one-shot whose time has already passed.
    Expired,
}

/// Builds the trigger for `schedule`, evaluated at `now` in `timezone`.
pub fn plan_registration(schedule: &Schedule, timezone: Tz, now: DateTime<Utc>) -> Result<Registration, TriggerError> {
    match schedule {
        Schedule::Once { run_at } => {
            let run_at = run_at.with_timezone(&Utc);
            if run_at <= now {
                Ok(Registration::Expired)
            } else {
                Ok(Registration::Trigger(Trigger::date(run_at)))
            }
        }
        Schedule::Daily { time } => Trigger::daily(*time, timezone).map(Registration::Trigger),
        Schedule::Weekly { weekday, time } => {
            Trigger::on_weekdays(&[*weekday], *time, timezone).map(Registration::Trigger)
        }
        Schedule::Twice { weekdays, time } => {
            Trigger::on_weekdays(weekdays, *time, timezone).map(Registration::Trigger)
        }
        Schedule::Biweekly { weekday, time, every_n_weeks } => {
            let anchor = next_occurrence(*weekday, *time, timezone, now);
            let weeks = i64::from((*every_n_weeks).max(1));
            Trigger::interval(anchor, ChronoDuration::weeks(weeks)).map(Registration::Trigger)
        }
    }
}

/// Next `weekday` at `time` strictly after `now`, as wall-clock time in `timezone`.
pub fn next_occurrence(weekday: Weekday, time: NaiveTime, timezone: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
    let local_now = now.with_timezone(&timezone);
    let today = local_now.date_naive();
    let days_ahead = (7 + i64::from(weekday.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
        % 7;

    let mut date = today + ChronoDuration::days(days_ahead);
    loop {
        if let Some(candidate) = localize(&timezone, &date.and_time(time)) {
            if candidate > local_now {
                return candidate;
            }
        }
        date += ChronoDuration::days(7);
    }
}
