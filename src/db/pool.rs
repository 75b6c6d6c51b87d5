//! Async database connection pool.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::Pool;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

/// Async connection pool type alias.
///
/// bb8::Pool is reference counted internally, so cloning is cheap and
/// holders can derive Clone without additional Arc wrapping.
pub type AsyncDbPool = Pool<AsyncPgConnection>;

/// Builds the connection pool described by `config`.
///
/// The pool opens `min_connections` idle connections eagerly, so an
/// unreachable database fails here rather than on the first request.
pub async fn establish_async_connection_pool(config: &DatabaseConfig) -> AppResult<AsyncDbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.as_str());

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(Duration::from_secs(config.connection_timeout))
        .build(manager)
        .await
        .map_err(|e| AppError::ConnectionPool {
            source: anyhow::Error::new(e).context("Failed to build database connection pool"),
        })?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool ready"
    );
    Ok(pool)
}
