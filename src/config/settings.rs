//! Typed view of the configuration tree.
//!
//! Every section derives `Deserialize` with per-field defaults so a
//! partial TOML file, or none at all, still yields usable [`Settings`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

/// Fallback values referenced from `#[serde(default = ...)]`.
mod defaults {
    pub(super) fn app_name() -> String {
        env!("CARGO_PKG_NAME").to_string()
    }

    pub(super) fn app_version() -> String {
        crate::pkg_version().to_string()
    }

    pub(super) fn host() -> String {
        "127.0.0.1".into()
    }

    pub(super) const fn port() -> u16 {
        3000
    }

    pub(super) const fn request_timeout_secs() -> u64 {
        30
    }

    pub(super) const fn keep_alive_secs() -> u64 {
        75
    }

    pub(super) const fn pool_max() -> u32 {
        10
    }

    pub(super) const fn pool_min() -> u32 {
        1
    }

    pub(super) const fn connect_timeout_secs() -> u64 {
        30
    }

    pub(super) fn level() -> String {
        "info".into()
    }

    pub(super) const fn enabled() -> bool {
        true
    }

    pub(super) fn log_path() -> String {
        "logs/catalog.log".into()
    }

    pub(super) fn log_format() -> String {
        "json".into()
    }

    pub(super) const fn max_batch_size() -> usize {
        500
    }
}

/// `[application]`: identity reported by health checks and startup logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "defaults::app_name")]
    pub name: String,
    #[serde(default = "defaults::app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: defaults::app_name(),
            version: defaults::app_version(),
        }
    }
}

/// `[server]`: HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
    /// Seconds a request may run before it is answered with 408.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout: u64,
    /// Seconds; informational, reported at startup.
    #[serde(default = "defaults::keep_alive_secs")]
    pub keep_alive_timeout: u64,
}

impl ServerConfig {
    /// `host:port`, suitable for `TcpListener::bind`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            request_timeout: defaults::request_timeout_secs(),
            keep_alive_timeout: defaults::keep_alive_secs(),
        }
    }
}

/// `[database]`: PostgreSQL location and pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Empty until a file or `CATALOG_DATABASE__URL` provides it.
    #[serde(default)]
    pub url: String,
    #[serde(default = "defaults::pool_max")]
    pub max_connections: u32,
    #[serde(default = "defaults::pool_min")]
    pub min_connections: u32,
    /// Seconds to wait when checking a connection out of the pool.
    #[serde(default = "defaults::connect_timeout_secs")]
    pub connection_timeout: u64,
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: defaults::pool_max(),
            min_connections: defaults::pool_min(),
            connection_timeout: defaults::connect_timeout_secs(),
            auto_migrate: false,
        }
    }
}

/// `[logger.console]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    #[serde(default = "defaults::enabled")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

/// `[logger.file]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "defaults::log_path")]
    pub path: String,
    #[serde(default = "defaults::enabled")]
    pub append: bool,
    #[serde(default = "defaults::log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: defaults::log_path(),
            append: true,
            format: defaults::log_format(),
        }
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format)
            .map_err(|e| ConfigError::validation("logger.file", e.to_string()))
    }
}

/// `[logger]`: raw strings as written in the file; see [`LoggerConfig`]
/// for the checked runtime form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    #[serde(default = "defaults::level")]
    pub level: String,
    #[serde(default)]
    pub console: ConsoleSettings,
    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: defaults::level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", e.to_string()))
    }
}

/// `[hierarchy]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Upper bound on records in one bulk create call.
    #[serde(default = "defaults::max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_batch_size: defaults::max_batch_size(),
        }
    }
}

/// Root of the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logger: LoggerSettings,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
}
