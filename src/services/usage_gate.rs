use chrono::{DateTime, Utc};

use crate::models::UserQuota;

/// Number of whitespace-separated tokens in `text`.
pub fn count_words(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InsufficientWords,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::InsufficientWords => "insufficient_words",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow { word_count: i64 },
    Deny { reason: DenyReason, message: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow { .. })
    }
}

/// Decides whether `text` may be processed against `quota`. Never mutates.
pub fn evaluate(text: &str, quota: &UserQuota, now: DateTime<Utc>) -> GateDecision {
    let word_count = count_words(text);

    if quota.is_active_premium(now) || quota.words_left >= word_count {
        return GateDecision::Allow { word_count };
    }

    GateDecision::Deny {
        reason: DenyReason::InsufficientWords,
        message: format!(
            "Not enough words remaining. You need {} words but have {} left. \
             Upgrade to Premium for unlimited usage!",
            word_count, quota.words_left
        ),
    }
}
