//! Referral leaderboard text and the automatic announcement job.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use futures::FutureExt;
use std::sync::Arc;
use teloxide::utils::html::escape;

use crate::config::ReferralTerms;
use crate::database::connection::DatabaseManager;
use crate::database::models::{AnnouncementSchedule, LeaderboardEntry, Referral, Referrer};
use crate::services::broadcast::{BroadcastReport, Broadcaster};
use crate::services::delivery::OutboundMessage;
use crate::services::scheduler::{JobCallback, JobScheduler, Trigger};
use crate::utils::datetime::{format_time_of_day, format_weekday_list};
use crate::utils::logging::{log_database_error, log_job_event};

pub const ANNOUNCEMENT_JOB_ID: &str = "referral_announcements";

const LEADERBOARD_LIMIT: i64 = 10;
const ANNOUNCEMENT_NAME_LIMIT: usize = 10;

pub fn bonus_cpm(terms: &ReferralTerms, referral_count: i64) -> i64 {
    (referral_count / terms.referrals_per_cpm_step.max(1)) * terms.cpm_step_value
}

pub fn cash_bonus(terms: &ReferralTerms, referral_count: i64) -> i64 {
    referral_count * terms.cash_bonus
}

/// `12500` -> `12,500`
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn leaderboard_text(entries: &[LeaderboardEntry], terms: &ReferralTerms) -> String {
    if entries.is_empty() {
        return "<b>TOP Referrals:</b>\n\nNo referrers yet.".to_string();
    }

    let mut lines = vec!["<b>TOP Referrals:</b>\n".to_string()];
    for (idx, entry) in entries.iter().enumerate() {
        let bonus = bonus_cpm(terms, entry.referral_count);
        lines.push(format!(
            "{}. {} – {} referrals, +{} CPM ({} → {})",
            idx + 1,
            escape(&entry.name),
            entry.referral_count,
            bonus,
            entry.base_cpm,
            entry.base_cpm + bonus as f64
        ));
    }
    lines.join("\n")
}

/// Congratulation post for one referrer, with the current top three.
pub fn announcement_text(
    referrer: &Referrer,
    referred_names: &[String],
    top: &[LeaderboardEntry],
    terms: &ReferralTerms,
) -> String {
    let count = referred_names.len() as i64;
    let bonus = bonus_cpm(terms, count);
    let bullets = if referred_names.is_empty() {
        "• No referrals yet.".to_string()
    } else {
        referred_names
            .iter()
            .take(ANNOUNCEMENT_NAME_LIMIT)
            .map(|name| format!("• {}", escape(name)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let top_lines = (0..3)
        .map(|idx| match top.get(idx) {
            Some(entry) => format!(
                "{}. {} – {} referrals, +{} CPM!",
                idx + 1,
                escape(&entry.name),
                entry.referral_count,
                bonus_cpm(terms, entry.referral_count)
            ),
            None => format!("{}. –", idx + 1),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "🎉 <b>Congratulations to {name} for bringing {count} referrals!</b>\n\n\
         👥 <b>Referred Friends:</b>\n{bullets}\n\n\
         💵 <b>Referral Bonus:</b> ${cash} total (${per_driver} per driver)\n\
         📈 <b>CPM Bonus:</b> +{bonus} CPM ({base} → {new_cpm})\n\n\
         📝 <b>Program Highlights:</b>\n\
         • Bring {step} friends → +{step_value} CPM\n\
         • Bring {double_step} friends → +{double_value} CPM\n\
         • Bring more friends and keep stacking your CPM + cash bonuses!\n\n\
         🏆 <b>Top Referrals right now:</b>\n{top_lines}\n\n\
         🎯 <b>Want to refer someone?</b> Contact your HR Team!",
        name = escape(&referrer.name),
        cash = format_thousands(cash_bonus(terms, count)),
        per_driver = format_thousands(terms.cash_bonus),
        base = referrer.base_cpm,
        new_cpm = referrer.base_cpm + bonus as f64,
        step = terms.referrals_per_cpm_step,
        step_value = terms.cpm_step_value,
        double_step = terms.referrals_per_cpm_step * 2,
        double_value = terms.cpm_step_value * 2,
    )
}

/// Sent on schedule when nobody has referrals yet.
pub fn generic_reminder_text(terms: &ReferralTerms) -> String {
    format!(
        "Referral reminder!\n\nBring your friends on board and increase your CPM.\n\
         Every {} friends = +{} CPM and ${} cash per driver. Reach out to HR to get started.",
        terms.referrals_per_cpm_step,
        terms.cpm_step_value,
        format_thousands(terms.cash_bonus)
    )
}

#[derive(Clone)]
pub struct AnnouncementService {
    db: Arc<DatabaseManager>,
    scheduler: JobScheduler,
    broadcaster: Arc<Broadcaster>,
    timezone: Tz,
    default_schedule: AnnouncementSchedule,
    terms: ReferralTerms,
}

impl AnnouncementService {
    pub fn new(
        db: Arc<DatabaseManager>,
        scheduler: JobScheduler,
        broadcaster: Arc<Broadcaster>,
        timezone: Tz,
        default_days: Vec<Weekday>,
        default_time: NaiveTime,
        terms: ReferralTerms,
    ) -> Self {
        Self {
            db,
            scheduler,
            broadcaster,
            timezone,
            default_schedule: AnnouncementSchedule {
                days: default_days,
                time: default_time,
            },
            terms,
        }
    }

    pub fn terms(&self) -> &ReferralTerms {
        &self.terms
    }

    /// Stored override when it names at least one day, configured defaults otherwise.
    pub async fn current_schedule(&self) -> Result<AnnouncementSchedule, sqlx::Error> {
        Ok(match AnnouncementSchedule::load(&self.db.pool).await? {
            Some(stored) if !stored.days.is_empty() => stored,
            _ => self.default_schedule.clone(),
        })
    }

    pub async fn describe_schedule(&self) -> Result<String, sqlx::Error> {
        let schedule = self.current_schedule().await?;
        Ok(format!(
            "{} at {}",
            format_weekday_list(&schedule.days),
            format_time_of_day(&schedule.time)
        ))
    }

    pub async fn update_schedule(&self, schedule: &AnnouncementSchedule) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        schedule.save(&self.db.pool).await?;
        self.refresh_job().await
    }

    /// Re-registers the announcement job from the current schedule.
    ///
    /// Returns the next fire time, or `None` when no day is configured.
    pub async fn refresh_job(&self) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        self.scheduler.unschedule(ANNOUNCEMENT_JOB_ID);

        let schedule = self.current_schedule().await?;
        let trigger = match Trigger::on_weekdays(&schedule.days, schedule.time, self.timezone) {
            Ok(trigger) => trigger,
            Err(e) => {
                log_job_event("skipped", ANNOUNCEMENT_JOB_ID, Some(&e.to_string()));
                return Ok(None);
            }
        };

        let service = self.clone();
        let callback: JobCallback = Arc::new(move || {
            let service = service.clone();
            async move {
                service.send_scheduled_announcement().await;
            }
            .boxed()
        });
        Ok(self.scheduler.schedule(ANNOUNCEMENT_JOB_ID, trigger, callback))
    }

    pub async fn leaderboard(&self) -> Result<String, sqlx::Error> {
        let entries = Referrer::leaderboard(&self.db.pool, LEADERBOARD_LIMIT).await?;
        Ok(leaderboard_text(&entries, &self.terms))
    }

    pub async fn announcement_for(&self, referrer_id: i64) -> Result<String, sqlx::Error> {
        let Some(referrer) = Referrer::find_by_id(&self.db.pool, referrer_id).await? else {
            return Ok("Referral program update coming soon.".to_string());
        };
        let names = Referral::names_for_referrer(&self.db.pool, referrer_id).await?;
        let top = Referrer::leaderboard(&self.db.pool, 3).await?;
        Ok(announcement_text(&referrer, &names, &top, &self.terms))
    }

    /// Text for the top referrer, or the generic reminder when nobody has referrals.
    pub async fn scheduled_text(&self) -> Result<String, sqlx::Error> {
        match Referrer::top(&self.db.pool).await? {
            Some(top) if top.referral_count > 0 => self.announcement_for(top.id).await,
            _ => Ok(generic_reminder_text(&self.terms)),
        }
    }

    pub async fn broadcast_text(&self, text: String) -> BroadcastReport {
        self.broadcaster.broadcast(&OutboundMessage::text(text), true).await
    }

    async fn send_scheduled_announcement(&self) {
        match self.scheduled_text().await {
            Ok(text) => {
                self.broadcast_text(text).await;
            }
            Err(e) => log_database_error("SELECT", "referrers", &e.to_string(), Some("scheduled announcement")),
        }
    }
}
