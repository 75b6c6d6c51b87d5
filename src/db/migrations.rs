//! Embedded schema migrations.
//!
//! diesel_migrations drives a synchronous `PgConnection`, so every helper
//! here runs on the blocking thread pool.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::error::{AppError, AppResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Names of migrations not yet applied to the database at `url`.
pub async fn pending_migrations(url: &str) -> AppResult<Vec<String>> {
    with_connection(url, |conn| {
        let pending = conn
            .pending_migrations(MIGRATIONS)
            .map_err(|e| migration_error("check pending migrations", e))?;
        Ok(pending.iter().map(|m| m.name().to_string()).collect())
    })
    .await
}

/// Applies every pending migration and returns the applied versions.
pub async fn run_pending_migrations(url: &str) -> AppResult<Vec<String>> {
    with_connection(url, |conn| {
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| migration_error("run pending migrations", e))?;
        Ok(applied.iter().map(|v| v.to_string()).collect())
    })
    .await
}

/// Reverts the last `steps` applied migrations, newest first.
pub async fn revert_migrations(url: &str, steps: u32) -> AppResult<Vec<String>> {
    if steps == 0 {
        return Err(AppError::Validation {
            field: "rollback_steps".to_string(),
            reason: "Number of rollback steps must be greater than 0".to_string(),
        });
    }

    with_connection(url, move |conn| {
        let applied = conn
            .applied_migrations()
            .map_err(|e| migration_error("get applied migrations", e))?;

        if applied.len() < steps as usize {
            return Err(AppError::Validation {
                field: "rollback_steps".to_string(),
                reason: format!(
                    "Cannot rollback {} migrations - only {} applied migrations available",
                    steps,
                    applied.len()
                ),
            });
        }

        let mut reverted = Vec::with_capacity(steps as usize);
        for _ in 0..steps {
            let version = conn
                .revert_last_migration(MIGRATIONS)
                .map_err(|e| migration_error("revert migration", e))?;
            reverted.push(version.to_string());
        }
        Ok(reverted)
    })
    .await
}

async fn with_connection<T, F>(url: &str, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
{
    let url = url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&url).map_err(|e| AppError::Database {
            operation: "establish connection for migrations".to_string(),
            source: anyhow::Error::new(e),
        })?;
        f(&mut conn)
    })
    .await
    .map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })?
}

fn migration_error(operation: &str, e: Box<dyn std::error::Error + Send + Sync>) -> AppError {
    AppError::Database {
        operation: operation.to_string(),
        source: anyhow::anyhow!("Migration error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_rollback_steps_rejected_before_connecting() {
        let result = revert_migrations("postgres://localhost/unused", 0).await;
        match result {
            Err(AppError::Validation { field, reason }) => {
                assert_eq!(field, "rollback_steps");
                assert!(reason.contains("must be greater than 0"));
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }
}
