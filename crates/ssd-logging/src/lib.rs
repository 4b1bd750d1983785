//! Logging setup for the SSD emulator
//!
//! # Features
//!
//! - **Console Output**: Compact or pretty human-readable events on stderr
//! - **Shell Log File**: `[yy.mm.dd HH:MM] header : message` lines in `latest.log`
//! - **Size Rotation**: `latest.log` is rotated to `until_*.log` past 10 KiB,
//!   older rotations are renamed to `.zip`
//!
//! # Quick Start
//!
//! ```ignore
//! use ssd_logging::{LogConfig, SsdSubscriberBuilder};
//!
//! // Keep the guard alive for as long as events should reach the file
//! let _guard = SsdSubscriberBuilder::new()
//!     .with_config(LogConfig::shell("./logs".into()))
//!     .try_init()?;
//!
//! tracing::info!(header = "shell::write", "DONE");
//! ```

pub mod config;
pub mod format;
pub mod rotation;

pub use config::{ConsoleConfig, FileConfig, LogConfig, RotationStrategy};
pub use format::ShellLogFormat;
pub use rotation::SizeRotatingFile;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be opened
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber is already installed
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Builder for configuring and initializing the tracing subscriber
pub struct SsdSubscriberBuilder {
    config: LogConfig,
}

impl SsdSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: compact output to console, no file
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Try to install the subscriber globally
    ///
    /// Returns the file writer's guard when file output is configured; it
    /// must be kept alive for buffered lines to be written.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let console = &self.config.console;
        let (compact_layer, pretty_layer) = match (console.enabled, console.pretty) {
            (false, _) => (None, None),
            (true, false) => (
                Some(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_ansi(console.ansi)
                        .with_target(true)
                        .with_writer(std::io::stderr),
                ),
                None,
            ),
            (true, true) => (
                None,
                Some(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_ansi(console.ansi)
                        .with_writer(std::io::stderr),
                ),
            ),
        };

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let file = SizeRotatingFile::open(file_config)?;
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                let layer = tracing_subscriber::fmt::layer()
                    .event_format(ShellLogFormat::new())
                    .with_ansi(false)
                    .with_writer(non_blocking);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(compact_layer)
            .with(pretty_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;

        Ok(guard)
    }
}

impl Default for SsdSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from several tests; only the first call installs anything.
pub fn init_testing() {
    let _ = SsdSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
