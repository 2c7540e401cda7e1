use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Referrer {
    pub id: i64,
    pub name: String,
    pub base_cpm: f64,
    pub created_at: String,
}

/// A referrer together with the number of live referrals credited to them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: i64,
    pub name: String,
    pub base_cpm: f64,
    pub referral_count: i64,
}

impl Referrer {
    pub async fn create(
        pool: &sqlx::SqlitePool,
        name: &str,
        base_cpm: f64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO referrers (name, base_cpm, created_at) VALUES (?, ?, ?)")
            .bind(name.trim())
            .bind(base_cpm)
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Skips soft-removed referrers.
    pub async fn find_by_id(
        pool: &sqlx::SqlitePool,
        id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Referrer>(
            "SELECT id, name, base_cpm, created_at FROM referrers WHERE id = ? AND is_removed = 0",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn leaderboard(
        pool: &sqlx::SqlitePool,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT r.id, r.name, r.base_cpm, COUNT(f.id) AS referral_count
            FROM referrers r
            LEFT JOIN referrals f ON f.referrer_id = r.id AND f.is_removed = 0
            WHERE r.is_removed = 0
            GROUP BY r.id
            ORDER BY referral_count DESC, r.name ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn top(pool: &sqlx::SqlitePool) -> Result<Option<LeaderboardEntry>, sqlx::Error> {
        Ok(Self::leaderboard(pool, 1).await?.into_iter().next())
    }

    /// Returns false when the referrer is missing or removed.
    pub async fn update_base_cpm(
        pool: &sqlx::SqlitePool,
        id: i64,
        base_cpm: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE referrers SET base_cpm = ? WHERE id = ? AND is_removed = 0")
            .bind(base_cpm)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-removes the referrer and every live referral credited to them.
    /// Returns false when the referrer was already removed or never existed.
    pub async fn remove(
        pool: &sqlx::SqlitePool,
        id: i64,
        removed_by: i64,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut tx = pool.begin().await?;

        let removed = sqlx::query(
            "UPDATE referrers SET is_removed = 1, removed_at = ?, removed_by = ? \
             WHERE id = ? AND is_removed = 0",
        )
        .bind(&now)
        .bind(removed_by)
        .bind(id)
        .execute(&mut tx)
        .await?
        .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE referrals SET is_removed = 1, removed_at = ?, removed_by = ?, removed_reason = 'referrer removed' \
             WHERE referrer_id = ? AND is_removed = 0",
        )
        .bind(&now)
        .bind(removed_by)
        .bind(id)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

pub struct Referral;

impl Referral {
    /// Inserts the non-blank names in one transaction and returns how many were stored.
    pub async fn add_many(
        pool: &sqlx::SqlitePool,
        referrer_id: i64,
        names: &[String],
    ) -> Result<u64, sqlx::Error> {
        let cleaned: Vec<&str> = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if cleaned.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = pool.begin().await?;
        for name in &cleaned {
            sqlx::query("INSERT INTO referrals (referrer_id, referred_name, created_at) VALUES (?, ?, ?)")
                .bind(referrer_id)
                .bind(*name)
                .bind(&now)
                .execute(&mut tx)
                .await?;
        }
        tx.commit().await?;
        Ok(cleaned.len() as u64)
    }

    /// Live referral names, newest first.
    pub async fn names_for_referrer(
        pool: &sqlx::SqlitePool,
        referrer_id: i64,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT referred_name FROM referrals WHERE referrer_id = ? AND is_removed = 0 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(referrer_id)
        .fetch_all(pool)
        .await
    }

    /// Soft-removes live referrals whose name matches one of `names`,
    /// ignoring case and surrounding whitespace. Returns how many went.
    pub async fn remove_by_names(
        pool: &sqlx::SqlitePool,
        referrer_id: i64,
        names: &[String],
        removed_by: i64,
        reason: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let cleaned: Vec<String> = names
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        if cleaned.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().to_rfc3339();
        let mut removed = 0;
        let mut tx = pool.begin().await?;
        for name in &cleaned {
            removed += sqlx::query(
                "UPDATE referrals SET is_removed = 1, removed_at = ?, removed_by = ?, removed_reason = ? \
                 WHERE referrer_id = ? AND is_removed = 0 AND LOWER(TRIM(referred_name)) = ?",
            )
            .bind(&now)
            .bind(removed_by)
            .bind(reason)
            .bind(referrer_id)
            .bind(name)
            .execute(&mut tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}
