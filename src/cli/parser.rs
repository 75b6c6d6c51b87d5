//! CLI argument parsing with clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Category tree service with closure-table hierarchy queries
#[derive(Parser, Debug, Clone)]
#[command(name = "catalog-rs")]
#[command(about = "Category tree service with closure-table hierarchy queries")]
#[command(long_about = "
catalog-rs serves a category tree over HTTP. Categories are stored in
PostgreSQL together with a closure table, which answers descendant queries
for any set of parents in a single lookup.

EXAMPLES:
    # Start the server with default configuration
    catalog-rs serve

    # Start server on custom host and port
    catalog-rs serve --host 0.0.0.0 --port 8080

    # Use a single configuration file
    catalog-rs --config /etc/catalog-rs/production.toml serve

    # Validate configuration without starting the server
    catalog-rs --env staging serve --dry-run

    # Apply pending migrations, or preview them
    catalog-rs migrate
    catalog-rs migrate --dry-run

    # Roll back the last 2 migrations
    catalog-rs migrate --rollback 2

While serving, SIGHUP re-reads the configuration and applies its log level.
")]
#[command(version = crate::clap_long_version())]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load this single TOML file instead of the layered files under
    /// `config/`. `CATALOG_*` environment variables still apply on top.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection (`CATALOG_APP_ENV`)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the web server (default)
    ///
    /// Examples:
    ///   catalog-rs serve                           # Start with defaults
    ///   catalog-rs serve --host 0.0.0.0 --port 80  # Bind to all interfaces on port 80
    ///   catalog-rs serve --dry-run                 # Validate config without starting
    Serve {
        /// Host address to bind to
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port number to listen on
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override, wins over --verbose/--quiet
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Database migration operations
    ///
    /// Examples:
    ///   catalog-rs migrate                    # Apply all pending migrations
    ///   catalog-rs migrate --dry-run          # Show pending migrations without applying
    ///   catalog-rs migrate --rollback 3       # Roll back the last 3 migrations
    Migrate {
        /// Show pending migrations without applying
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to roll back (1-100)
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = super::validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve {
            host: None,
            port: None,
            log_level: None,
            dry_run: false,
        }
    }
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Cli {
    /// Subcommand to run; no subcommand means `serve` with defaults.
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    /// Checks argument combinations clap cannot express on its own
    /// (struct literals built in code bypass clap's conflict rules).
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Migrate {
            dry_run: true,
            rollback: Some(_),
        }) = self.command
        {
            return Err("Cannot use --dry-run and --rollback together".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["catalog-rs", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["catalog-rs", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["catalog-rs"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.env.is_none());
        assert!(matches!(
            cli.command_or_default(),
            Commands::Serve { dry_run: false, host: None, port: None, log_level: None }
        ));
    }

    #[test]
    fn test_serve_command() {
        let cli = Cli::try_parse_from([
            "catalog-rs",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
            "--log-level",
            "warning",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Serve {
                host,
                port,
                log_level,
                dry_run,
            }) => {
                assert_eq!(host, Some("0.0.0.0".to_string()));
                assert_eq!(port, Some(8080));
                assert_eq!(log_level, Some(LogLevel::Warn));
                assert!(!dry_run);
            }
            other => panic!("Expected serve command, got {:?}", other),
        }
    }

    #[test]
    fn test_migrate_command() {
        let cli = Cli::try_parse_from(["catalog-rs", "migrate", "--dry-run"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Migrate { dry_run: true, rollback: None })
        ));
    }

    #[test]
    fn test_migrate_dry_run_conflicts_with_rollback() {
        let err = Cli::try_parse_from(["catalog-rs", "migrate", "--dry-run", "--rollback", "2"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["catalog-rs", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_environment_aliases() {
        let cli = Cli::try_parse_from(["catalog-rs", "--env", "stage"]).unwrap();
        assert_eq!(cli.env, Some(Environment::Staging));
        assert_eq!(
            crate::config::Environment::from(Environment::Production),
            crate::config::Environment::Production
        );
    }

    #[test]
    fn test_validate_rejects_hand_built_conflicts() {
        let cli = Cli {
            command: Some(Commands::Migrate {
                dry_run: true,
                rollback: Some(5),
            }),
            config: None,
            env: None,
            verbose: false,
            quiet: false,
        };
        assert!(cli.validate().is_err());
    }
}
