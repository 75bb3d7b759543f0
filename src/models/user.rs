use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Words granted to a new account and restored on every premium upgrade.
pub const DEFAULT_WORD_ALLOWANCE: i64 = 10_000;

/// Length of a premium window when no duration is given.
pub const DEFAULT_PREMIUM_DAYS: i64 = 30;

/// Days of the month on which a subscription renewal is applied.
pub const RENEWAL_DAYS_OF_MONTH: [u32; 2] = [20, 21];

/// Largest `wordsUsed` accepted in a single usage update.
pub const MAX_WORDS_PER_UPDATE: i64 = 1_000_000;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Per-email word budget and premium status.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserQuota {
    pub email: String,
    pub words_left: i64,
    pub total_words_used: i64,
    pub is_premium: bool,
    pub premium_expiry: Option<DateTime<Utc>>,
    pub subscription_id: Option<String>,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserQuota {
    pub fn new(email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            words_left: DEFAULT_WORD_ALLOWANCE,
            total_words_used: 0,
            is_premium: false,
            premium_expiry: None,
            subscription_id: None,
            last_used: now,
            created_at: now,
        }
    }

    /// Premium counts only while the flag is set and the expiry, if any, is ahead of `now`.
    pub fn is_active_premium(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expiry.map_or(true, |expiry| expiry > now)
    }

    /// Whole days left on the premium window, rounded up. Zero or negative once expired.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        let remaining = (self.premium_expiry? - now).num_milliseconds();
        let whole = remaining.div_euclid(MILLIS_PER_DAY);
        Some(if remaining.rem_euclid(MILLIS_PER_DAY) > 0 {
            whole + 1
        } else {
            whole
        })
    }

    /// Charges `words` against the record. Active premium only counts usage.
    pub fn apply_usage(&mut self, words: i64, now: DateTime<Utc>) {
        if !self.is_active_premium(now) {
            self.words_left -= words.min(self.words_left);
        }
        self.total_words_used = self.total_words_used.saturating_add(words);
        self.last_used = now;
    }

    pub fn apply_upgrade(
        &mut self,
        subscription_id: Option<String>,
        duration_days: i64,
        now: DateTime<Utc>,
    ) {
        let window = Duration::days(duration_days);
        self.premium_expiry = Some(match self.premium_expiry {
            Some(expiry) if self.is_premium && expiry > now => expiry + window,
            _ => now + window,
        });
        self.is_premium = true;
        self.words_left = DEFAULT_WORD_ALLOWANCE;
        if subscription_id.is_some() {
            self.subscription_id = subscription_id;
        }
        self.last_used = now;
    }

    pub fn renewal_due(&self, now: DateTime<Utc>) -> bool {
        RENEWAL_DAYS_OF_MONTH.contains(&now.day())
            && self.is_premium
            && self.subscription_id.is_some()
    }

    pub fn apply_renewal(&mut self, now: DateTime<Utc>) {
        let base = self.premium_expiry.unwrap_or(now);
        self.premium_expiry = Some(base + Duration::days(DEFAULT_PREMIUM_DAYS));
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct InitUserRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: UserQuota,
    pub days_until_expiry: Option<i64>,
}

impl UserResponse {
    pub fn new(user: UserQuota, now: DateTime<Utc>) -> Self {
        let days_until_expiry = user.days_until_expiry(now);
        Self {
            user,
            days_until_expiry,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWordsRequest {
    pub email: Option<String>,
    pub words_used: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWordsResponse {
    pub message: String,
    pub words_left: i64,
    pub words_used: i64,
    pub total_words_used: i64,
    pub is_premium: bool,
    pub user: UserQuota,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePremiumRequest {
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    pub duration: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePremiumResponse {
    pub message: String,
    pub email: String,
    pub is_premium: bool,
    pub premium_expiry: Option<DateTime<Utc>>,
    pub words_left: i64,
    pub user: UserQuota,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RenewPremiumRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenewPremiumResponse {
    pub renewed: bool,
    pub premium_expiry: Option<DateTime<Utc>>,
    pub user: UserQuota,
}
