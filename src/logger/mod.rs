//! Logging built on `tracing-subscriber`.
//!
//! One global subscriber carries a console layer, an optional file layer
//! (full, compact or JSON lines) and a reloadable level filter. The
//! [`LogLevelHandle`] returned by [`init_logger`] changes the level of a
//! running process.

pub mod config;
pub mod error;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig, parse_level};
pub use error::LoggerError;

use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Runtime control over the global level filter.
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    /// Replaces the active filter with `level` (a plain level name).
    pub fn set_level(&self, level: &str) -> Result<(), LoggerError> {
        let filter = level_filter(level)?;
        self.inner
            .reload(filter)
            .map_err(|e| LoggerError::reload(e.to_string()))
    }

    /// Directive string of the active filter, `None` once the subscriber is gone.
    pub fn current_level(&self) -> Option<String> {
        self.inner.with_current(|filter| filter.to_string()).ok()
    }
}

fn level_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    let level = parse_level(level)?;
    Ok(EnvFilter::default().add_directive(LevelFilter::from_level(level).into()))
}

/// Installs the global subscriber described by `config`.
///
/// Fails when the configuration is invalid, when the log file cannot be
/// opened, or when a global subscriber is already installed.
pub fn init_logger(config: LoggerConfig) -> anyhow::Result<LogLevelHandle> {
    config.validate()?;

    let (filter_layer, handle) = reload::Layer::new(level_filter(&config.level)?);

    // File layer goes first so console ANSI settings do not leak into
    // formatted span fields of the file output.
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);
    if config.file.enabled {
        layers.push(file_layer(&config.file)?);
    }
    if config.console.enabled {
        layers.push(console_layer(&config.console));
    }

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(layers)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    Ok(LogLevelHandle { inner: handle })
}

fn console_layer(config: &ConsoleConfig) -> BoxedLayer {
    let use_ansi = config.colored && std::io::stdout().is_terminal();

    fmt::layer()
        .with_ansi(use_ansi)
        .with_target(true)
        .with_level(true)
        .boxed()
}

fn file_layer(config: &FileConfig) -> Result<BoxedLayer, LoggerError> {
    let writer = Mutex::new(open_log_file(config)?);
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);

    Ok(match config.format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    })
}

fn open_log_file(config: &FileConfig) -> Result<File, LoggerError> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if config.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    Ok(options.open(&config.path)?)
}

/// Runs `f` under a scoped subscriber whose level is driven by the handle.
#[cfg(test)]
pub(crate) fn with_test_handle<F, R>(initial_level: &str, f: F) -> R
where
    F: FnOnce(&LogLevelHandle) -> R,
{
    let filter = level_filter(initial_level).expect("valid initial level");
    let (filter_layer, inner) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::sink));

    let handle = LogLevelHandle { inner };
    tracing::subscriber::with_default(subscriber, || f(&handle))
}
