use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;

use crate::errors::{AppError, Result};

pub mod queries;

/// Process-wide PostgreSQL handle.
///
/// The pool is opened (and migrations applied) on first use. Clones share the
/// same cell, so concurrent first callers wait on a single connection attempt.
#[derive(Clone)]
pub struct Database {
    url: Arc<str>,
    max_connections: u32,
    pool: Arc<OnceCell<PgPool>>,
}

impl Database {
    pub fn new(database_url: &str, max_connections: u32) -> Self {
        Self {
            url: Arc::from(database_url),
            max_connections,
            pool: Arc::new(OnceCell::new()),
        }
    }

    pub async fn pool(&self) -> Result<&PgPool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .connect(&self.url)
                    .await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                tracing::info!(max_connections = self.max_connections, "PostgreSQL connected");
                Ok::<_, AppError>(pool)
            })
            .await
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool().await?).await?;
        Ok(())
    }
}
