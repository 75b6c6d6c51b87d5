//! Command line interface: parsing, configuration merging and dispatch.

pub mod config_merger;
pub mod executor;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use executor::execute_command;
pub use parser::{Cli, Commands, Environment, LogLevel};

use anyhow::Context;

use crate::config::Settings;
use crate::logger::{LogLevelHandle, init_logger};

/// Loads configuration for `cli` and applies its overrides.
///
/// Returns the merged settings with the environment they were loaded for.
pub fn load_and_merge_config(cli: &Cli) -> anyhow::Result<(Settings, crate::config::Environment)> {
    let merger = ConfigurationMerger::from_cli(cli).context("Configuration error")?;
    let settings = merger
        .merge_cli_args(cli)
        .context("Configuration merge error")?;
    Ok((settings, merger.environment()))
}

/// Installs the global logger described by `settings`.
pub fn init_logger_from_settings(settings: &Settings) -> anyhow::Result<LogLevelHandle> {
    let logger_config = settings
        .logger
        .clone()
        .into_logger_config()
        .context("Logger configuration error")?;
    init_logger(logger_config).context("Logger initialization error")
}
