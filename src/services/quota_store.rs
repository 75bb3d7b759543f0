use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::database::{queries::QuotaQueries, Database};
use crate::errors::{AppError, Result};
use crate::models::{UserQuota, MAX_WORDS_PER_UPDATE};

static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// Trims and lowercases; the result is the record key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes `email` and checks it has a `local@domain.tld` shape.
pub fn validate_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !EMAIL_SHAPE.is_match(&email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    Ok(email)
}

fn validate_words_used(words_used: i64) -> Result<()> {
    if words_used < 0 {
        return Err(AppError::Validation("Words used cannot be negative".to_string()));
    }
    if words_used > MAX_WORDS_PER_UPDATE {
        return Err(AppError::Validation(format!(
            "Words used cannot exceed {MAX_WORDS_PER_UPDATE}"
        )));
    }
    Ok(())
}

fn validate_duration(duration_days: i64) -> Result<()> {
    if duration_days < 1 {
        return Err(AppError::Validation(
            "Duration must be at least one day".to_string(),
        ));
    }
    Ok(())
}

/// Persisted per-email word budgets.
///
/// Every mutation is a single atomic read-modify-write per email, so
/// overlapping requests for the same user never lose updates.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get_or_create(&self, email: &str) -> Result<UserQuota>;

    async fn record_usage(&self, email: &str, words_used: i64) -> Result<UserQuota>;

    async fn upgrade_to_premium(
        &self,
        email: &str,
        subscription_id: Option<String>,
        duration_days: i64,
    ) -> Result<UserQuota>;

    /// Applies a due subscription renewal. `Ok(None)` when nothing was due.
    async fn renew_subscription(&self, email: &str) -> Result<Option<UserQuota>>;

    async fn health_check(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct PgQuotaStore {
    database: Database,
}

impl PgQuotaStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Applies a renewal as of `now`. `None` when no renewal is due that day.
    pub async fn renew_subscription_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserQuota>> {
        let email = normalize_email(email);
        let pool = self.database.pool().await?;

        let current = QuotaQueries::find_by_email(pool, &email)
            .await?
            .ok_or(AppError::NotFound)?;
        if !current.renewal_due(now) {
            return Ok(None);
        }

        let renewed = QuotaQueries::renew_subscription(pool, &email, now).await?;
        if let Some(ref quota) = renewed {
            tracing::info!(email = %email, premium_expiry = ?quota.premium_expiry, "Premium renewed");
        }
        Ok(renewed)
    }
}

#[async_trait]
impl QuotaStore for PgQuotaStore {
    async fn get_or_create(&self, email: &str) -> Result<UserQuota> {
        let email = validate_email(email)?;
        let pool = self.database.pool().await?;
        let row = QuotaQueries::get_or_create(pool, &email, Utc::now()).await?;

        if row.inserted {
            tracing::info!(email = %email, "New user created");
        } else {
            tracing::debug!(email = %email, "Existing user found");
        }

        Ok(row.quota)
    }

    async fn record_usage(&self, email: &str, words_used: i64) -> Result<UserQuota> {
        validate_words_used(words_used)?;
        let email = normalize_email(email);
        let pool = self.database.pool().await?;

        let quota = QuotaQueries::record_usage(pool, &email, words_used, Utc::now())
            .await?
            .ok_or(AppError::NotFound)?;

        tracing::info!(
            email = %email,
            words_used,
            words_left = quota.words_left,
            "Words updated"
        );
        Ok(quota)
    }

    async fn upgrade_to_premium(
        &self,
        email: &str,
        subscription_id: Option<String>,
        duration_days: i64,
    ) -> Result<UserQuota> {
        validate_duration(duration_days)?;
        let email = normalize_email(email);
        let pool = self.database.pool().await?;

        let quota = QuotaQueries::upgrade_to_premium(
            pool,
            &email,
            subscription_id.as_deref(),
            duration_days,
            Utc::now(),
        )
        .await?
        .ok_or(AppError::NotFound)?;

        tracing::info!(email = %email, premium_expiry = ?quota.premium_expiry, "User upgraded to premium");
        Ok(quota)
    }

    async fn renew_subscription(&self, email: &str) -> Result<Option<UserQuota>> {
        self.renew_subscription_at(email, Utc::now()).await
    }

    async fn health_check(&self) -> Result<()> {
        self.database.ping().await
    }
}

/// Process-local store. Each entry is mutated under its shard lock.
#[derive(Default)]
pub struct MemoryQuotaStore {
    records: DashMap<String, UserQuota>,
    clock: Option<DateTime<Utc>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose notion of "now" is pinned, for date-dependent behaviour.
    pub fn with_clock(now: DateTime<Utc>) -> Self {
        Self {
            records: DashMap::new(),
            clock: Some(now),
        }
    }

    /// Seeds or replaces a record as-is.
    pub fn insert(&self, quota: UserQuota) {
        self.records.insert(normalize_email(&quota.email), quota);
    }

    pub fn get(&self, email: &str) -> Option<UserQuota> {
        self.records
            .get(&normalize_email(email))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn update<F>(&self, email: &str, apply: F) -> Result<UserQuota>
    where
        F: FnOnce(&mut UserQuota),
    {
        let mut entry = self
            .records
            .get_mut(&normalize_email(email))
            .ok_or(AppError::NotFound)?;
        apply(entry.value_mut());
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn get_or_create(&self, email: &str) -> Result<UserQuota> {
        let email = validate_email(email)?;
        let now = self.now();
        let entry = self
            .records
            .entry(email.clone())
            .or_insert_with(|| UserQuota::new(email, now));
        Ok(entry.value().clone())
    }

    async fn record_usage(&self, email: &str, words_used: i64) -> Result<UserQuota> {
        validate_words_used(words_used)?;
        let now = self.now();
        self.update(email, |quota| quota.apply_usage(words_used, now))
    }

    async fn upgrade_to_premium(
        &self,
        email: &str,
        subscription_id: Option<String>,
        duration_days: i64,
    ) -> Result<UserQuota> {
        validate_duration(duration_days)?;
        let now = self.now();
        self.update(email, |quota| {
            quota.apply_upgrade(subscription_id, duration_days, now)
        })
    }

    async fn renew_subscription(&self, email: &str) -> Result<Option<UserQuota>> {
        let now = self.now();
        let mut renewed = false;
        let quota = self.update(email, |quota| {
            if quota.renewal_due(now) {
                quota.apply_renewal(now);
                renewed = true;
            }
        })?;
        Ok(renewed.then_some(quota))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
