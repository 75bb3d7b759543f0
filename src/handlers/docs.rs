use axum::Router;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
        crate::handlers::prompt::generate,
        crate::handlers::humanize::humanize,
        crate::handlers::user::init,
        crate::handlers::user::update_words,
        crate::handlers::user::upgrade_premium,
        crate::handlers::user::renew_premium,
    ),
    components(
        schemas(
            crate::models::Tone,
            crate::models::PromptRequest,
            crate::models::PromptResponse,
            crate::models::HumanizeRequest,
            crate::models::HumanizeResponse,
            crate::models::UserQuota,
            crate::models::UserResponse,
            crate::models::InitUserRequest,
            crate::models::UpdateWordsRequest,
            crate::models::UpdateWordsResponse,
            crate::models::UpgradePremiumRequest,
            crate::models::UpgradePremiumResponse,
            crate::models::RenewPremiumRequest,
            crate::models::RenewPremiumResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "prompt", description = "Text generation endpoints"),
        (name = "user", description = "Word quota and premium endpoints"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Humanize Proxy API",
        version = "1.0.0",
        description = "Quota-metered rewriting proxy in front of an LLM provider"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

pub fn create_docs_router() -> Router<AppState> {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
