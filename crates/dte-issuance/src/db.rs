//! # Database Pool
//!
//! The database is **optional**. With `DATABASE_URL` set, folio ledgers and
//! submission records live in Postgres and several service instances can
//! issue for the same account. Without it, the service runs on in-memory
//! stores (development and tests); nothing survives a restart.

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the connection pool and run the embedded migrations.
///
/// Returns `None` if `DATABASE_URL` is not set.
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set; running with in-memory stores. \
                 Folio counters and submissions will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}
