pub mod config;
pub mod database;
pub mod errors;
pub mod extension;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    http::{header, Method},
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use handlers::{method_not_allowed, AppState};

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let api = Router::new()
        .route(
            "/api/prompt",
            post(handlers::prompt::generate)
                .options(handlers::prompt::options)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/humanize",
            post(handlers::humanize::humanize).fallback(method_not_allowed),
        )
        .route(
            "/api/user/init",
            post(handlers::user::init).fallback(method_not_allowed),
        )
        .route(
            "/api/user/update-words",
            post(handlers::user::update_words).fallback(method_not_allowed),
        )
        .route(
            "/api/user/upgrade-premium",
            post(handlers::user::upgrade_premium).fallback(method_not_allowed),
        )
        .route(
            "/api/user/renew-premium",
            post(handlers::user::renew_premium).fallback(method_not_allowed),
        )
        .route("/health", get(handlers::health::liveness))
        .route("/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    api.merge(handlers::docs::create_docs_router())
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
