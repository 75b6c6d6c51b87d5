use clap::Parser;

use catalog_rs::cli::{Cli, execute_command, init_logger_from_settings, load_and_merge_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, environment) = load_and_merge_config(&cli)?;
    let log_handle = init_logger_from_settings(&settings)?;

    execute_command(&cli, settings, environment, log_handle)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Command failed"))
}
