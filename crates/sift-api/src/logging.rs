//! Logging configuration for Sift
//!
//! Query composition and execution log through `tracing`: statements and
//! their timings at `debug`, slow queries and clamped pages at `warn`, bulk
//! updates at `info`. This module installs a subscriber for applications that
//! do not bring their own.

use sift_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output destination
#[derive(Debug, Clone)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a daily rotated file
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level filter
    pub level: String,
    /// Level for the query layer alone, overriding `level` for its targets
    pub query_level: Option<String>,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            query_level: None,
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Create config with info level and stdout output
    pub fn info() -> Self {
        Self::default()
    }

    /// Create config with debug level
    pub fn debug() -> Self {
        Self {
            level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// Create config with warn level
    pub fn warn() -> Self {
        Self {
            level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Set log output to file with rotation
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Set log output to both stdout and file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set log level filter
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    /// Set the level of statement and timing logs independently
    ///
    /// `LogConfig::warn().with_query_level("debug")` shows every statement
    /// while keeping the rest of the application quiet.
    pub fn with_query_level<S: Into<String>>(mut self, level: S) -> Self {
        self.query_level = Some(level.into());
        self
    }

    /// Filter directive built from `level` and `query_level`.
    pub fn directive(&self) -> String {
        match &self.query_level {
            Some(query) => format!("{},sift={},sift_core={}", self.level, query, query),
            None => self.level.clone(),
        }
    }

    /// Initialize global logging with this configuration
    ///
    /// `RUST_LOG` takes precedence over the configured levels. Returns a guard
    /// when logging to a file; keep it alive for as long as logs should be
    /// flushed. Fails if the directive is invalid or a global subscriber is
    /// already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sift::logging::LogConfig;
    ///
    /// let _guard = LogConfig::info().with_query_level("debug").init()?;
    /// # Ok::<(), sift::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.directive())
                .map_err(|e| Error::Config(format!("invalid log level: {}", e)))?,
        };
        let registry = tracing_subscriber::registry().with(env_filter);

        let (installed, guard) = match self.output {
            LogOutput::Stdout => {
                let installed = match self.format {
                    LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
                    LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                };
                (installed, None)
            }
            LogOutput::File(path) => {
                let (writer, guard) = file_writer(&path);
                let installed = match self.format {
                    LogFormat::Pretty => registry
                        .with(fmt::layer().with_writer(writer).pretty())
                        .try_init(),
                    LogFormat::Compact => registry
                        .with(fmt::layer().with_writer(writer).compact())
                        .try_init(),
                };
                (installed, Some(guard))
            }
            LogOutput::Both(path) => {
                let (writer, guard) = file_writer(&path);
                let installed = registry
                    .with(fmt::layer())
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .try_init();
                (installed, Some(guard))
            }
        };

        installed.map_err(|e| Error::Config(format!("cannot install subscriber: {}", e)))?;
        Ok(guard)
    }
}

fn file_writer(path: &Path) -> (NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(
        path.parent().unwrap_or_else(|| Path::new(".")),
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sift.log"),
    );
    tracing_appender::non_blocking(appender)
}
