use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use chrono::Utc;

use crate::{
    errors::{AppError, Result},
    handlers::{json_body, AppState},
    models::{
        InitUserRequest, RenewPremiumRequest, RenewPremiumResponse, UpdateWordsRequest,
        UpdateWordsResponse, UpgradePremiumRequest, UpgradePremiumResponse, UserResponse,
        DEFAULT_PREMIUM_DAYS,
    },
};

fn required_email(email: Option<String>) -> Result<String> {
    email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Email is required".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/user/init",
    request_body = InitUserRequest,
    responses(
        (status = 200, description = "Existing or newly created user", body = UserResponse),
        (status = 400, description = "Missing or malformed email")
    ),
    tag = "user"
)]
pub async fn init(
    State(state): State<AppState>,
    payload: std::result::Result<Json<InitUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    let request = json_body(payload)?;
    let email = required_email(request.email)?;

    let user = state.store.get_or_create(&email).await?;
    Ok(Json(UserResponse::new(user, Utc::now())))
}

#[utoipa::path(
    post,
    path = "/api/user/update-words",
    request_body = UpdateWordsRequest,
    responses(
        (status = 200, description = "Usage recorded", body = UpdateWordsResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 404, description = "Unknown user")
    ),
    tag = "user"
)]
pub async fn update_words(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateWordsRequest>, JsonRejection>,
) -> Result<Json<UpdateWordsResponse>> {
    let request = json_body(payload)?;
    let (email, words_used) = match (request.email, request.words_used) {
        (Some(email), Some(words_used)) if !email.trim().is_empty() => (email, words_used),
        _ => {
            return Err(AppError::Validation(
                "Email and wordsUsed are required".to_string(),
            ))
        }
    };

    let user = state.store.record_usage(&email, words_used).await?;
    let is_premium = user.is_active_premium(Utc::now());
    let message = if is_premium {
        "Premium user - no words deducted"
    } else {
        "Words updated successfully"
    };

    Ok(Json(UpdateWordsResponse {
        message: message.to_string(),
        words_left: user.words_left,
        words_used,
        total_words_used: user.total_words_used,
        is_premium,
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/api/user/upgrade-premium",
    request_body = UpgradePremiumRequest,
    responses(
        (status = 200, description = "Premium window started or extended", body = UpgradePremiumResponse),
        (status = 400, description = "Missing email or invalid duration"),
        (status = 404, description = "Unknown user")
    ),
    tag = "user"
)]
pub async fn upgrade_premium(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpgradePremiumRequest>, JsonRejection>,
) -> Result<Json<UpgradePremiumResponse>> {
    let request = json_body(payload)?;
    let email = required_email(request.email)?;
    let duration = request.duration.unwrap_or(DEFAULT_PREMIUM_DAYS);
    let subscription_id = request.subscription_id.filter(|id| !id.is_empty());

    let user = state
        .store
        .upgrade_to_premium(&email, subscription_id, duration)
        .await?;
    state.metrics.record_premium_upgrade();

    Ok(Json(UpgradePremiumResponse {
        message: "Successfully upgraded to premium".to_string(),
        email: user.email.clone(),
        is_premium: user.is_premium,
        premium_expiry: user.premium_expiry,
        words_left: user.words_left,
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/api/user/renew-premium",
    request_body = RenewPremiumRequest,
    responses(
        (status = 200, description = "Renewal applied or not due", body = RenewPremiumResponse),
        (status = 400, description = "Missing email"),
        (status = 404, description = "Unknown user")
    ),
    tag = "user"
)]
pub async fn renew_premium(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RenewPremiumRequest>, JsonRejection>,
) -> Result<Json<RenewPremiumResponse>> {
    let request = json_body(payload)?;
    let email = required_email(request.email)?;

    let (renewed, user) = match state.store.renew_subscription(&email).await? {
        Some(user) => (true, user),
        None => (false, state.store.get_or_create(&email).await?),
    };

    Ok(Json(RenewPremiumResponse {
        renewed,
        premium_expiry: user.premium_expiry,
        user,
    }))
}
