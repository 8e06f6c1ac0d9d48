//! Postgres pool setup for the SQL-backed store.

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub type DbPool = PgPool;

/// Upper bound for a liveness check issued by `/api/health`.
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Connect with the configured bounds. Fails fast when the server is
/// unreachable so startup does not hang behind an empty pool.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .test_before_acquire(true);

    let pool = options.connect_with(config.connect_options()).await?;

    tracing::info!(
        url = %config.display_url(),
        max = config.max_connections,
        "Connected to workflow database"
    );
    Ok(pool)
}

/// Round-trip a trivial statement, giving up after [`PING_TIMEOUT`].
pub async fn ping(pool: &DbPool) -> bool {
    let check = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool);
    matches!(tokio::time::timeout(PING_TIMEOUT, check).await, Ok(Ok(1)))
}
