use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};

use crate::{
    errors::{AppError, Result},
    handlers::{json_body, AppState},
    models::{PromptRequest, PromptResponse},
};

/// Forwards a ready-made prompt to the upstream provider. No quota is involved.
#[utoipa::path(
    post,
    path = "/api/prompt",
    request_body = PromptRequest,
    responses(
        (status = 200, description = "Generated text", body = PromptResponse),
        (status = 400, description = "Missing prompt"),
        (status = 500, description = "Upstream failure")
    ),
    tag = "prompt"
)]
pub async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<PromptResponse>> {
    let prompt = json_body(payload)?
        .prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Prompt is required".to_string()))?;

    let text = state.generator.generate(&prompt).await?;
    Ok(Json(PromptResponse { text }))
}

/// Bare `OPTIONS` (without preflight headers) still answers with the CORS headers.
pub async fn options() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        ],
    )
}
