use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use humanize_proxy::{
    config::Config,
    create_app,
    database::Database,
    handlers::AppState,
    services::{quota_store::PgQuotaStore, upstream::UpstreamClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let database = Database::new(&config.database_url, config.database_max_connections);
    if let Err(e) = database.pool().await {
        tracing::warn!("Database not reachable at startup, will retry on first use: {}", e);
    }

    let store = Arc::new(PgQuotaStore::new(database));
    let generator = Arc::new(UpstreamClient::new(config.upstream.clone())?);
    tracing::info!(provider = ?generator.provider(), model = %config.upstream.model, "Upstream configured");

    let state = AppState::new(store, generator, config.identity.clone())?
        .with_metrics_handle(metrics_handle);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("humanize_proxy=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received interrupt signal");
}
