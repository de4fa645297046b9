//! Error types for the telemetry runtime.

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors that can occur in the telemetry runtime.
///
/// Producers only ever see `InvalidValue` (synchronous input validation)
/// and `Config` (eager construction-time validation). `Append` failures are
/// caught by the dispatch workers and reported through the fallback channel,
/// never surfaced to a producer.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Malformed producer input, e.g. a negative counter delta.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Invalid construction parameters, e.g. a zero rate limit.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A named appender or collector was expected but is not registered.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An appender failed while handling an event.
    #[error("Append error: {0}")]
    Append(String),
}

impl From<std::io::Error> for TelemetryError {
    fn from(e: std::io::Error) -> Self {
        TelemetryError::Append(e.to_string())
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(e: serde_json::Error) -> Self {
        TelemetryError::Append(e.to_string())
    }
}
