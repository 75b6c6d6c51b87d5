//! Serve command handler
//!
//! Validates the configuration (dry run) or runs the HTTP server. While
//! the server runs, SIGHUP reloads the log level from the configuration.

use crate::cli::config_merger::ConfigurationMerger;
use crate::cli::parser::Cli;
use crate::config::{Environment, Settings};
use crate::logger::LogLevelHandle;
use crate::server::Server;

/// What a SIGHUP needs to rebuild the settings and retune the logger.
pub struct LogReload {
    pub cli: Cli,
    pub handle: LogLevelHandle,
}

pub struct ServeCommandHandler {
    config: Settings,
    environment: Environment,
    reload: Option<LogReload>,
}

impl ServeCommandHandler {
    pub fn new(config: Settings, environment: Environment) -> Self {
        Self {
            config,
            environment,
            reload: None,
        }
    }

    /// Enables SIGHUP log level reloading for [`execute`](Self::execute).
    pub fn with_log_reload(mut self, cli: Cli, handle: LogLevelHandle) -> Self {
        self.reload = Some(LogReload { cli, handle });
        self
    }

    /// Runs the server, or only validates when `dry_run` is set.
    pub async fn execute(self, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            return self.validate_only();
        }

        #[cfg(unix)]
        let reload_task = match self.reload {
            Some(reload) => Some(spawn_log_level_reload(reload)?),
            None => None,
        };

        let result = Server::new(self.config, self.environment).run().await;

        #[cfg(unix)]
        if let Some(task) = reload_task {
            task.abort();
        }

        result
    }

    /// Validate configuration without starting the server
    pub fn validate_only(&self) -> anyhow::Result<()> {
        self.config.validate()?;

        println!("✓ Configuration is valid ({} environment)", self.environment);
        println!("✓ Server would bind to: {}", self.config.server.address());
        println!(
            "✓ Database pool: {}-{} connections, auto-migrate {}",
            self.config.database.min_connections,
            self.config.database.max_connections,
            if self.config.database.auto_migrate { "on" } else { "off" }
        );
        println!(
            "✓ Logger: level {}, console {}, file {}",
            self.config.logger.level,
            self.config.logger.console.enabled,
            self.config.logger.file.enabled
        );
        println!(
            "✓ Bulk creation accepts up to {} records",
            self.config.hierarchy.max_batch_size
        );
        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

/// Re-reads the configuration for `cli` and applies its log level.
pub fn reload_log_level(cli: &Cli, handle: &LogLevelHandle) -> anyhow::Result<String> {
    let settings = ConfigurationMerger::from_cli(cli)?.merge_cli_args(cli)?;
    handle.set_level(&settings.logger.level)?;
    Ok(settings.logger.level)
}

#[cfg(unix)]
fn spawn_log_level_reload(reload: LogReload) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match reload_log_level(&reload.cli, &reload.handle) {
                Ok(level) => tracing::info!(level = %level, "Log level reloaded on SIGHUP"),
                Err(e) => tracing::warn!(error = %e, "Ignoring configuration reload"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::ENV_TEST_LOCK;
    use crate::logger::with_test_handle;
    use clap::Parser;
    use std::io::Write;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    #[test]
    fn test_serve_handler_new() {
        let config = create_valid_config();
        let handler = ServeCommandHandler::new(config.clone(), Environment::Test);
        assert_eq!(handler.config(), &config);
    }

    #[tokio::test]
    async fn test_serve_handler_dry_run() {
        let handler = ServeCommandHandler::new(create_valid_config(), Environment::Test);
        assert!(handler.execute(true).await.is_ok());
    }

    #[tokio::test]
    async fn test_serve_handler_dry_run_invalid_config() {
        let mut config = create_valid_config();
        config.server.port = 0;
        let handler = ServeCommandHandler::new(config, Environment::Test);
        assert!(handler.execute(true).await.is_err());
    }

    fn write_config(dir: &tempfile::TempDir, level: &str) -> std::path::PathBuf {
        let path = dir.path().join("catalog.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[database]\nurl = \"postgres://localhost/catalog\"\n\n[logger]\nlevel = \"{}\"",
            level
        )
        .unwrap();
        path
    }

    #[test]
    fn test_reload_applies_level_from_file() {
        let _lock = ENV_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "warn");
        let cli = Cli::try_parse_from(["catalog-rs", "--config", path.to_str().unwrap()]).unwrap();

        with_test_handle("info", |handle| {
            assert_eq!(reload_log_level(&cli, handle).unwrap(), "warn");
            let current = handle.current_level().unwrap().to_lowercase();
            assert!(current.contains("warn"), "unexpected filter {current}");
        });
    }

    #[test]
    fn test_reload_keeps_cli_overrides() {
        let _lock = ENV_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "warn");
        let cli = Cli::try_parse_from([
            "catalog-rs",
            "--config",
            path.to_str().unwrap(),
            "serve",
            "--log-level",
            "trace",
        ])
        .unwrap();

        with_test_handle("info", |handle| {
            assert_eq!(reload_log_level(&cli, handle).unwrap(), "trace");
        });
    }

    #[test]
    fn test_reload_with_broken_file_keeps_level() {
        let _lock = ENV_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "loud");
        let cli = Cli::try_parse_from(["catalog-rs", "--config", path.to_str().unwrap()]).unwrap();

        with_test_handle("info", |handle| {
            assert!(reload_log_level(&cli, handle).is_err());
            let current = handle.current_level().unwrap().to_lowercase();
            assert!(current.contains("info"), "unexpected filter {current}");
        });
    }
}
