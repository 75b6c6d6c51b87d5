//! Command handlers for CLI operations

pub mod migrate;
pub mod serve;

pub use migrate::MigrateCommandHandler;
pub use serve::{ServeCommandHandler, reload_log_level};
