use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::handlers::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up")),
    tag = "health"
)]
pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Quota store reachable"),
        (status = 503, description = "Quota store unavailable")
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let (status, store_status) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    let overall = if status == StatusCode::OK { "ready" } else { "not_ready" };

    (
        status,
        Json(json!({
            "status": overall,
            "checks": { "store": store_status },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
