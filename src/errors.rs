use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;

pub const PROMPT_FAILURE_MESSAGE: &str = "An error occurred while processing the prompt.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Upstream error (status {status:?}): {body}")]
    Upstream { status: Option<u16>, body: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn upstream(status: Option<u16>, body: impl Into<String>) -> Self {
        AppError::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Migration(_) => "store",
            AppError::Validation(_) => "validation",
            AppError::NotFound => "not_found",
            AppError::AuthRequired => "auth_required",
            AppError::QuotaExceeded(_) => "quota_exceeded",
            AppError::Upstream { .. } => "upstream",
            AppError::Config(_) => "config",
            AppError::MethodNotAllowed => "method_not_allowed",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Migration(ref e) => {
                tracing::error!("Migration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "User not found"),
            AppError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                "Please sign in to Chrome to use this extension",
            ),
            AppError::QuotaExceeded(ref message) => {
                let status = StatusCode::PAYMENT_REQUIRED;
                let body = Json(json!({
                    "error": "insufficient_words",
                    "message": message,
                    "status": status.as_u16()
                }));
                return (status, body).into_response();
            }
            AppError::Upstream { status, ref body } => {
                tracing::error!(upstream_status = ?status, "Upstream error: {}", body);
                (StatusCode::INTERNAL_SERVER_ERROR, PROMPT_FAILURE_MESSAGE)
            }
            AppError::Config(ref e) => {
                tracing::error!("Configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
