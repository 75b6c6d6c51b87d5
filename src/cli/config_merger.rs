//! Configuration merger for CLI arguments and config files
//!
//! Command line flags sit on top of the file and `CATALOG_*` layers loaded
//! by [`ConfigLoader`].

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, Environment, Settings};

/// Base settings plus the environment they were loaded for.
pub struct ConfigurationMerger {
    base_config: Settings,
    environment: Environment,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings, environment: Environment) -> Self {
        Self {
            base_config,
            environment,
        }
    }

    /// Loads the base settings selected by `--config` and `--env`.
    ///
    /// `--config` switches the loader to single-file mode; otherwise the
    /// layered files under `CATALOG_CONFIG_DIR` (or `config/`) are used.
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let loader = match cli.config {
            Some(ref path) => ConfigLoader::from_file(path),
            None => ConfigLoader::new()?,
        };
        let loader = match cli.env {
            Some(env) => loader.with_environment(env.into()),
            None => loader,
        };

        let base_config = loader.load()?;
        Ok(Self::new(base_config, loader.environment()))
    }

    /// Applies CLI overrides and validates the result.
    ///
    /// Precedence for the log level: `serve --log-level`, then
    /// `--verbose`/`--quiet`, then the loaded configuration.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }

        if let Some(Commands::Serve {
            host,
            port,
            log_level,
            ..
        }) = &cli.command
        {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(level) = log_level {
                config.logger.level = level.as_str().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::ENV_TEST_LOCK;
    use clap::Parser;
    use std::io::Write;

    fn create_valid_base_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    fn merge(args: &[&str]) -> Result<Settings, ConfigError> {
        let merger = ConfigurationMerger::new(create_valid_base_config(), Environment::Test);
        let cli = Cli::try_parse_from(args).unwrap();
        merger.merge_cli_args(&cli)
    }

    #[test]
    fn test_configuration_merger_new() {
        let base_config = create_valid_base_config();
        let merger = ConfigurationMerger::new(base_config.clone(), Environment::Staging);
        assert_eq!(merger.config(), &base_config);
        assert_eq!(merger.environment(), Environment::Staging);
    }

    #[test]
    fn test_verbose_and_quiet_flags() {
        assert_eq!(merge(&["catalog-rs", "--verbose"]).unwrap().logger.level, "debug");
        assert_eq!(merge(&["catalog-rs", "--quiet"]).unwrap().logger.level, "error");
    }

    #[test]
    fn test_serve_overrides() {
        let merged = merge(&["catalog-rs", "serve", "--host", "0.0.0.0", "--port", "8080"]).unwrap();
        assert_eq!(merged.server.host, "0.0.0.0");
        assert_eq!(merged.server.port, 8080);
    }

    #[test]
    fn test_command_log_level_overrides_global() {
        let merged = merge(&["catalog-rs", "--verbose", "serve", "--log-level", "warn"]).unwrap();
        assert_eq!(merged.logger.level, "warn");
    }

    #[test]
    fn test_migrate_leaves_server_untouched() {
        let merged = merge(&["catalog-rs", "migrate"]).unwrap();
        assert_eq!(merged.server, create_valid_base_config().server);
    }

    #[test]
    fn test_merged_settings_are_validated() {
        let merger = ConfigurationMerger::new(Settings::default(), Environment::Test);
        let cli = Cli::try_parse_from(["catalog-rs"]).unwrap();
        let err = merger.merge_cli_args(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "database.url"));
    }

    #[test]
    fn test_from_cli_loads_single_file_and_environment() {
        let _lock = ENV_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 4100\n\n[database]\nurl = \"postgres://localhost/catalog\"\n\n[logger]\nlevel = \"warn\""
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "catalog-rs",
            "--config",
            path.to_str().unwrap(),
            "--env",
            "prod",
        ])
        .unwrap();
        let merger = ConfigurationMerger::from_cli(&cli).unwrap();
        assert_eq!(merger.environment(), Environment::Production);
        assert_eq!(merger.config().server.port, 4100);
        assert_eq!(merger.config().logger.level, "warn");
    }
}
