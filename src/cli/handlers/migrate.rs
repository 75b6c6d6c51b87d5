//! Migrate command handler

use crate::config::Settings;
use crate::db::{pending_migrations, revert_migrations, run_pending_migrations};
use crate::error::AppResult;

pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Applies pending migrations, lists them (`dry_run`) or reverts the
    /// last `rollback` ones.
    ///
    /// # Errors
    /// - Database configuration or connection errors
    /// - Migration execution errors
    /// - Rollback of more migrations than are applied
    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> AppResult<()> {
        self.config.database.validate()?;
        let url = self.config.database.url.as_str();

        if dry_run {
            let pending = pending_migrations(url).await?;
            if pending.is_empty() {
                println!("Schema is current, nothing pending.");
            } else {
                println!("{} migration(s) would be applied:", pending.len());
                pending.iter().for_each(|name| println!("  {name}"));
            }
            return Ok(());
        }

        if let Some(steps) = rollback {
            let reverted = revert_migrations(url, steps).await?;
            println!("Reverted {} migration(s):", reverted.len());
            reverted.iter().for_each(|version| println!("  {version}"));
            return Ok(());
        }

        let applied = run_pending_migrations(url).await?;
        if applied.is_empty() {
            println!("Schema is current, nothing applied.");
        } else {
            println!("Applied {} migration(s):", applied.len());
            applied.iter().for_each(|version| println!("  {version}"));
        }
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    #[test]
    fn test_migrate_handler_new() {
        let config = create_valid_config();
        let handler = MigrateCommandHandler::new(config.clone());
        assert_eq!(handler.config(), &config);
    }

    #[tokio::test]
    async fn test_zero_rollback_steps_rejected() {
        let handler = MigrateCommandHandler::new(create_valid_config());
        match handler.execute(false, Some(0)).await {
            Err(AppError::Validation { field, reason }) => {
                assert_eq!(field, "rollback_steps");
                assert!(reason.contains("must be greater than 0"));
            }
            other => panic!("Expected validation error for zero rollback steps, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_database_url_rejected_before_connecting() {
        let mut config = create_valid_config();
        config.database.url = "mysql://localhost/test".to_string();
        let handler = MigrateCommandHandler::new(config);
        let err = handler.execute(true, None).await.unwrap_err();
        assert!(
            matches!(&err, AppError::Configuration { key, .. } if key == "database.url"),
            "got {err:?}"
        );
    }
}
