use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;

use crate::{
    config::IdentityConfig,
    errors::{AppError, Result},
    services::{
        identity::GoogleIdentityResolver, metrics::MetricsService, orchestrator::Orchestrator,
        quota_store::QuotaStore, upstream::TextGenerator,
    },
};

pub mod docs;
pub mod health;
pub mod humanize;
pub mod metrics;
pub mod prompt;
pub mod user;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuotaStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub orchestrator: Arc<Orchestrator>,
    pub identity: IdentityConfig,
    pub identity_client: Client,
    pub metrics: Arc<MetricsService>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        generator: Arc<dyn TextGenerator>,
        identity: IdentityConfig,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsService::new());
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            generator.clone(),
            metrics.clone(),
        ));
        let identity_client = GoogleIdentityResolver::http_client(&identity)?;

        Ok(Self {
            store,
            generator,
            orchestrator,
            identity,
            identity_client,
            metrics,
            metrics_handle: None,
        })
    }

    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Identity resolver bound to one request's access token.
    pub fn identity_resolver(&self, access_token: Option<String>) -> GoogleIdentityResolver {
        GoogleIdentityResolver::new(self.identity_client.clone(), &self.identity, access_token)
    }
}

/// Unwraps a JSON body, turning malformed or mistyped payloads into a 400.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

pub(crate) async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
