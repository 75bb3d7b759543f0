//! Per-request sequencing: identity, gate, compose, upstream, charge.
//!
//! The store is read before the upstream call and written after it; nothing
//! is held across the call. Usage is charged once, with the word count of the
//! caller's original text, and only when generation succeeded.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::errors::{AppError, Result};
use crate::models::{Tone, UserQuota};
use crate::services::identity::IdentityResolver;
use crate::services::metrics::{MetricsService, RequestTimer};
use crate::services::prompt_composer;
use crate::services::quota_store::QuotaStore;
use crate::services::upstream::TextGenerator;
use crate::services::usage_gate::{self, DenyReason, GateDecision};

/// Proof that a caller passed identity and gate checks for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub email: String,
    pub quota: UserQuota,
    pub word_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Granted(Ticket),
    AuthRequired,
    Denied { reason: DenyReason, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HumanizeOutcome {
    Humanized { text: String, quota: UserQuota },
    AuthRequired,
    Denied { reason: DenyReason, message: String },
    /// Generation failed; the caller gets its own text back, uncharged.
    UpstreamFailed { original: String },
}

/// Result of the generation half of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Fulfilment {
    Humanized { text: String, quota: UserQuota },
    UpstreamFailed { original: String },
}

impl From<Fulfilment> for HumanizeOutcome {
    fn from(fulfilment: Fulfilment) -> Self {
        match fulfilment {
            Fulfilment::Humanized { text, quota } => HumanizeOutcome::Humanized { text, quota },
            Fulfilment::UpstreamFailed { original } => HumanizeOutcome::UpstreamFailed { original },
        }
    }
}

impl HumanizeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            HumanizeOutcome::Humanized { .. } => "success",
            HumanizeOutcome::AuthRequired => "auth_required",
            HumanizeOutcome::Denied { .. } => "denied",
            HumanizeOutcome::UpstreamFailed { .. } => "upstream_failed",
        }
    }
}

/// Holds one slot of the in-flight gauge; released on drop, including when
/// the request future is cancelled mid-call.
struct InFlight<'a> {
    counter: &'a AtomicI64,
    metrics: &'a MetricsService,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicI64, metrics: &'a MetricsService) -> Self {
        metrics.set_in_flight(counter.fetch_add(1, Ordering::SeqCst) + 1);
        Self { counter, metrics }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics
            .set_in_flight(self.counter.fetch_sub(1, Ordering::SeqCst) - 1);
    }
}

pub struct Orchestrator {
    store: Arc<dyn QuotaStore>,
    generator: Arc<dyn TextGenerator>,
    metrics: Arc<MetricsService>,
    in_flight: AtomicI64,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        generator: Arc<dyn TextGenerator>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            store,
            generator,
            metrics,
            in_flight: AtomicI64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn QuotaStore> {
        &self.store
    }

    /// Upstream calls currently awaiting a reply.
    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves the caller and checks `text` against their quota. Never charges.
    pub async fn admit(&self, identity: &dyn IdentityResolver, text: &str) -> Result<Admission> {
        let email = match identity.resolve().await {
            Ok(email) => email,
            Err(AppError::AuthRequired) => return Ok(Admission::AuthRequired),
            Err(e) => return Err(e),
        };

        if text.trim().is_empty() {
            return Err(AppError::Validation("Text is required".to_string()));
        }

        let quota = self.store.get_or_create(&email).await?;

        match usage_gate::evaluate(text, &quota, Utc::now()) {
            GateDecision::Allow { word_count } => Ok(Admission::Granted(Ticket {
                email: quota.email.clone(),
                quota,
                word_count,
            })),
            GateDecision::Deny { reason, message } => {
                tracing::info!(email = %email, reason = reason.as_str(), "Request denied by usage gate");
                Ok(Admission::Denied { reason, message })
            }
        }
    }

    /// Generates the rewrite for an admitted `text` and charges the ticket on success.
    pub async fn fulfil(&self, ticket: Ticket, text: &str, tone: Tone) -> Fulfilment {
        let prompt = prompt_composer::compose(text, tone);

        let in_flight = InFlight::enter(&self.in_flight, &self.metrics);
        let timer = RequestTimer::new("upstream".to_string());
        let generated = self.generator.generate(&prompt).await;
        self.metrics
            .record_upstream_latency(timer.elapsed(), generated.is_ok());
        drop(in_flight);

        let rewritten = match generated {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::error!(email = %ticket.email, error = %e, "Upstream generation failed");
                self.metrics.record_error(e.kind());
                return Fulfilment::UpstreamFailed {
                    original: text.to_string(),
                };
            }
        };

        let quota = match self
            .store
            .record_usage(&ticket.email, ticket.word_count)
            .await
        {
            Ok(quota) => {
                self.metrics
                    .record_words_charged(ticket.word_count, quota.is_active_premium(Utc::now()));
                quota
            }
            Err(e) => {
                tracing::error!(
                    email = %ticket.email,
                    words = ticket.word_count,
                    error = %e,
                    "Failed to record usage after successful generation"
                );
                self.metrics.record_error(e.kind());
                ticket.quota
            }
        };

        Fulfilment::Humanized {
            text: rewritten,
            quota,
        }
    }

    /// Runs the whole request: admit, then fulfil.
    pub async fn humanize(
        &self,
        identity: &dyn IdentityResolver,
        text: &str,
        tone: Tone,
    ) -> Result<HumanizeOutcome> {
        let outcome = match self.admit(identity, text).await? {
            Admission::Granted(ticket) => self.fulfil(ticket, text, tone).await.into(),
            Admission::AuthRequired => HumanizeOutcome::AuthRequired,
            Admission::Denied { reason, message } => HumanizeOutcome::Denied { reason, message },
        };

        self.metrics.record_humanize(outcome.label());
        Ok(outcome)
    }
}
