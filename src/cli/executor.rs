//! Command dispatch after parsing, configuration loading and logger setup.

use super::handlers::{MigrateCommandHandler, ServeCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::{Environment, Settings};
use crate::logger::LogLevelHandle;

/// Runs the command selected by `cli`; no subcommand runs `serve`.
pub async fn execute_command(
    cli: &Cli,
    settings: Settings,
    environment: Environment,
    log_handle: LogLevelHandle,
) -> anyhow::Result<()> {
    cli.validate().map_err(anyhow::Error::msg)?;
    warn_about_risky_args(cli);

    match cli.command_or_default() {
        Commands::Serve { dry_run, .. } => {
            ServeCommandHandler::new(settings, environment)
                .with_log_reload(cli.clone(), log_handle)
                .execute(dry_run)
                .await
        }
        Commands::Migrate { dry_run, rollback } => {
            MigrateCommandHandler::new(settings)
                .execute(dry_run, rollback)
                .await?;
            Ok(())
        }
    }
}

fn warn_about_risky_args(cli: &Cli) {
    match &cli.command {
        Some(Commands::Serve {
            port: Some(port), ..
        }) if *port < 1024 => {
            tracing::warn!(port, "Binding to a privileged port usually requires root");
        }
        Some(Commands::Migrate {
            rollback: Some(steps),
            ..
        }) if *steps > 50 => {
            tracing::warn!(steps, "Rolling back many migrations at once");
        }
        _ => {}
    }
}
