//! # Logger
//!
//! Installs the process-wide `tracing` subscriber: an `EnvFilter`, an optional compact console
//! layer and an optional rolling file layer (text or JSON) written through a non-blocking worker.
//!
//! * Build programmatically with [`Logger::builder`] or from a [`LoggingConfig`] section with
//!   [`Logger::from_config`].
//! * `RUST_LOG` is honoured unless an explicit filter directive is configured.
//! * Optional `profiling` support requires building with `--cfg tokio_unstable`.
//!
//! ## Example
//!
//! ```rust
//! # use tally_logger::{Logger, LevelFilter};
//! let _logger = Logger::builder()
//!     .name("my-app")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod builder;
mod error;

pub use crate::builder::{LoggerBuilder, NoFile, NoName, WithFile, WithName};
pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use std::str::FromStr;
use tally_domain::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;

/// Handle to the installed logging system.
///
/// Owns the background file worker; drop it only on shutdown.
#[must_use = "Dropping this handle will stop background logging threads."]
#[derive(Debug)]
pub struct Logger {
    pub(crate) guard: Option<WorkerGuard>,
}

impl Logger {
    /// Starts a typed builder. The name prefixes rolling files (`my-app.2026-01-01.log`).
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Installs the subscriber described by a `[logging]` configuration section.
    ///
    /// # Errors
    /// Same as [`LoggerBuilder::init`], plus [`LoggerError::InvalidConfiguration`] for an
    /// unknown level name.
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggerError> {
        let level = parse_level(&config.level)?;
        let mut builder = Self::builder().name(&config.name).level(level).console(config.console);
        if let Some(filter) = &config.env_filter {
            builder = builder.env_filter(filter);
        }

        match &config.directory {
            Some(dir) => builder.path(dir).max_files(config.max_files).json(config.json).init(),
            None => builder.init(),
        }
    }

    /// Best-effort synchronization point before shutdown; buffers flush on drop.
    pub fn flush(&self) {
        tracing::debug!("Logger flushed");
    }

    #[must_use]
    pub const fn guard(&self) -> Option<&WorkerGuard> {
        self.guard.as_ref()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

/// Parses `trace|debug|info|warn|error|off`, case-insensitive.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggerError> {
    LevelFilter::from_str(level.trim()).map_err(|_| LoggerError::InvalidConfiguration {
        message: format!("Unknown log level '{level}'").into(),
        context: None,
    })
}
