//! Structured logging initialization.
//!
//! Configures the tracing subscriber for structured logging output.
//! The RUST_LOG environment variable takes precedence over configuration
//! file settings.

use serde::Deserialize;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// Human-readable multi-field output.
    Pretty,
    /// Machine-readable JSON lines.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter level when RUST_LOG is not set (e.g. "info",
    /// "async_select=debug").
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include the event target (module path) in output.
    #[serde(default = "default_true")]
    pub target: bool,

    /// Include thread names in output. The dispatch tasks are named, so this
    /// is usually worth keeping on.
    #[serde(default = "default_true")]
    pub thread_names: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            target: true,
            thread_names: true,
        }
    }
}

/// Initialize the logging subsystem.
///
/// The RUST_LOG environment variable takes precedence over the configured
/// level. Calling this more than once is an error in tracing-subscriber;
/// use [`try_init`] from tests.
pub fn init(config: &LoggingConfig) {
    try_init(config).expect("logging already initialized");
}

/// Like [`init`] but reports failure instead of panicking when a global
/// subscriber is already installed.
pub fn try_init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(&config.level)
    };

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(config.target)
                    .with_thread_names(config.thread_names),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(config.target)
                    .with_thread_names(config.thread_names),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(config.target)
                    .with_thread_names(config.thread_names),
            )
            .try_init()?,
    }

    Ok(())
}
