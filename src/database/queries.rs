use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::errors::Result;
use crate::models::{UserQuota, DEFAULT_PREMIUM_DAYS, DEFAULT_WORD_ALLOWANCE};

const QUOTA_COLUMNS: &str = "email, words_left, total_words_used, is_premium, premium_expiry, \
                             subscription_id, last_used, created_at";

#[derive(Debug, FromRow)]
pub struct UpsertedQuota {
    #[sqlx(flatten)]
    pub quota: UserQuota,
    pub inserted: bool,
}

pub struct QuotaQueries;

impl QuotaQueries {
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserQuota>> {
        let quota = sqlx::query_as::<_, UserQuota>(&format!(
            "SELECT {QUOTA_COLUMNS} FROM user_quotas WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(quota)
    }

    /// Inserts a default record unless one exists and returns the stored row.
    /// The no-op update makes `RETURNING` yield the existing row too.
    pub async fn get_or_create(
        pool: &PgPool,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<UpsertedQuota> {
        let row = sqlx::query_as::<_, UpsertedQuota>(&format!(
            r#"
            INSERT INTO user_quotas (email, words_left, total_words_used, is_premium, last_used, created_at)
            VALUES ($1, $2, 0, FALSE, $3, $3)
            ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
            RETURNING {QUOTA_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(email)
        .bind(DEFAULT_WORD_ALLOWANCE)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    /// Single conditional update; mirrors [`UserQuota::apply_usage`].
    pub async fn record_usage(
        pool: &PgPool,
        email: &str,
        words_used: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UserQuota>> {
        let quota = sqlx::query_as::<_, UserQuota>(&format!(
            r#"
            UPDATE user_quotas SET
                words_left = CASE
                    WHEN is_premium AND (premium_expiry IS NULL OR premium_expiry > $3) THEN words_left
                    ELSE GREATEST(words_left - $2, 0)
                END,
                total_words_used = total_words_used + $2,
                last_used = $3
            WHERE email = $1
            RETURNING {QUOTA_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(words_used)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(quota)
    }

    /// Single conditional update; mirrors [`UserQuota::apply_upgrade`].
    pub async fn upgrade_to_premium(
        pool: &PgPool,
        email: &str,
        subscription_id: Option<&str>,
        duration_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UserQuota>> {
        let quota = sqlx::query_as::<_, UserQuota>(&format!(
            r#"
            UPDATE user_quotas SET
                premium_expiry = CASE
                    WHEN is_premium AND premium_expiry IS NOT NULL AND premium_expiry > $2
                        THEN premium_expiry + make_interval(days => $3::int)
                    ELSE $2 + make_interval(days => $3::int)
                END,
                is_premium = TRUE,
                words_left = $4,
                subscription_id = COALESCE($5, subscription_id),
                last_used = $2
            WHERE email = $1
            RETURNING {QUOTA_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(now)
        .bind(duration_days)
        .bind(DEFAULT_WORD_ALLOWANCE)
        .bind(subscription_id)
        .fetch_optional(pool)
        .await?;

        Ok(quota)
    }

    /// Extends the window of an eligible subscriber. `None` when the row is
    /// missing or not eligible; callers tell the two apart.
    pub async fn renew_subscription(
        pool: &PgPool,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserQuota>> {
        let quota = sqlx::query_as::<_, UserQuota>(&format!(
            r#"
            UPDATE user_quotas SET
                premium_expiry = COALESCE(premium_expiry, $2) + make_interval(days => $3::int)
            WHERE email = $1 AND is_premium AND subscription_id IS NOT NULL
            RETURNING {QUOTA_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(now)
        .bind(DEFAULT_PREMIUM_DAYS)
        .fetch_optional(pool)
        .await?;

        Ok(quota)
    }
}
