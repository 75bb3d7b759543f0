use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{
    errors::{AppError, Result, PROMPT_FAILURE_MESSAGE},
    handlers::{json_body, AppState},
    middleware::auth::BearerToken,
    models::{HumanizeRequest, HumanizeResponse},
    services::orchestrator::HumanizeOutcome,
};

/// Identity check, quota gate, rewrite and charge in one call.
#[utoipa::path(
    post,
    path = "/api/humanize",
    request_body = HumanizeRequest,
    responses(
        (status = 200, description = "Rewritten text and updated quota", body = HumanizeResponse),
        (status = 400, description = "Missing text"),
        (status = 401, description = "No resolvable identity"),
        (status = 402, description = "Not enough words left"),
        (status = 500, description = "Upstream failure; original text is returned")
    ),
    security(("bearer" = [])),
    tag = "prompt"
)]
pub async fn humanize(
    State(state): State<AppState>,
    token: BearerToken,
    payload: std::result::Result<Json<HumanizeRequest>, JsonRejection>,
) -> Result<Response> {
    let request = json_body(payload)?;
    let text = request.text.unwrap_or_default();
    let identity = state.identity_resolver(token.into_inner());

    let outcome = state
        .orchestrator
        .humanize(&identity, &text, request.tone)
        .await?;

    let response = match outcome {
        HumanizeOutcome::Humanized { text, quota } => {
            let is_premium = quota.is_active_premium(chrono::Utc::now());
            Json(HumanizeResponse {
                text,
                words_left: quota.words_left,
                is_premium,
                total_words_used: quota.total_words_used,
            })
            .into_response()
        }
        HumanizeOutcome::AuthRequired => AppError::AuthRequired.into_response(),
        HumanizeOutcome::Denied { message, .. } => AppError::QuotaExceeded(message).into_response(),
        HumanizeOutcome::UpstreamFailed { original } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": PROMPT_FAILURE_MESSAGE, "text": original })),
        )
            .into_response(),
    };

    Ok(response)
}
