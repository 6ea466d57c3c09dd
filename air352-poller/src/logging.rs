//! Logging infrastructure for the 352Air poller
//!
//! Library code only emits `tracing` events. Applications that want them on
//! stderr call one of the initializers here once at startup.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose diagnostics with source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Initialize logging with the specified mode
///
/// Development mode defaults to `info`, Debug mode to `debug`.
///
/// # Environment Variables
///
/// - `AIR352_LOG_LEVEL`: Override the filter (e.g. `air352_poller=debug`)
/// - `RUST_LOG`: Used when `AIR352_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    let default_level = match mode {
        LoggingMode::Debug => "debug",
        _ => "info",
    };
    init_logging_with_level(mode, default_level)
}

/// Initialize logging with the specified mode and fallback filter
///
/// `default_level` applies only when neither `AIR352_LOG_LEVEL` nor
/// `RUST_LOG` is set.
pub fn init_logging_with_level(
    mode: LoggingMode,
    default_level: &str,
) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter(default_level);

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter(default_level);

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from the `AIR352_LOG_MODE` environment variable
///
/// Accepts "silent", "development" and "debug"; anything else is Silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(mode_from_env().unwrap_or(LoggingMode::Silent))
}

/// Mode named by `AIR352_LOG_MODE`, if it is set to a known mode
pub fn mode_from_env() -> Option<LoggingMode> {
    mode_from_str(std::env::var("AIR352_LOG_MODE").ok().as_deref())
}

fn mode_from_str(value: Option<&str>) -> Option<LoggingMode> {
    match value? {
        "silent" => Some(LoggingMode::Silent),
        "development" => Some(LoggingMode::Development),
        "debug" => Some(LoggingMode::Debug),
        _ => None,
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> EnvFilter {
    if let Ok(level) = std::env::var("AIR352_LOG_LEVEL") {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
