use chrono::{NaiveTime, Utc, Weekday};

use crate::utils::datetime::{
    format_time_of_day, parse_time_of_day, weekday_from_index, weekday_index,
};

/// Stored override for the automatic referral announcement schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementSchedule {
    pub days: Vec<Weekday>,
    pub time: NaiveTime,
}

impl AnnouncementSchedule {
    /// Returns `None` when no override is stored or the stored row is unreadable.
    pub async fn load(pool: &sqlx::SqlitePool) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT days, time_of_day FROM announcement_settings WHERE id = 1",
        )
        .fetch_optional(pool)
        .await?;

        Ok(row.and_then(|(days, time_of_day)| {
            let time = parse_time_of_day(&time_of_day)?;
            let days = days
                .split(',')
                .filter_map(|part| part.trim().parse::<i64>().ok())
                .filter_map(weekday_from_index)
                .collect();
            Some(Self { days, time })
        }))
    }

    pub async fn save(&self, pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
        let days = self
            .days
            .iter()
            .map(|day| weekday_index(*day).to_string())
            .collect::<Vec<_>>()
            .join(",");
        sqlx::query(
            r#"
            INSERT INTO announcement_settings (id, days, time_of_day, updated_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                days = excluded.days,
                time_of_day = excluded.time_of_day,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(days)
        .bind(format_time_of_day(&self.time))
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
        Ok(())
    }
}
