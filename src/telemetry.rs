//! Tracing subscriber setup for hosts embedding the board.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log level or a full filter directive.
pub const LOG_FILTER_ENV: &str = "NEXTSLOT_LOG";

const DEFAULT_LEVEL: &str = "warn";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Another global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs a global fmt subscriber filtered by [`LOG_FILTER_ENV`].
///
/// A bare level (`debug`, `warning`, ...) applies to every target; any other
/// value is used as an [`EnvFilter`] directive. Unset or unparsable values
/// fall back to `warn`.
///
/// # Errors
///
/// Returns [`TelemetryError::Install`] when a global subscriber already
/// exists.
pub fn init_tracing() -> Result<(), TelemetryError> {
    let raw = std::env::var(LOG_FILTER_ENV).ok();
    tracing_subscriber::registry()
        .with(build_filter(raw.as_deref()))
        .with(fmt::layer().with_target(true))
        .try_init()?;
    Ok(())
}

fn build_filter(raw: Option<&str>) -> EnvFilter {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => EnvFilter::new(DEFAULT_LEVEL),
        Some(value) => normalize_log_level(value).map_or_else(
            || EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL)),
            EnvFilter::new,
        ),
    }
}

/// Maps common spellings of a log level to its canonical name.
#[must_use]
pub fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}
