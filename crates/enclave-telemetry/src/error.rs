//! Telemetry error types.

use thiserror::Error;

/// Errors raised while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Bad level, directive, or log directory.
    #[error("logging configuration error: {0}")]
    ConfigError(String),

    /// A global subscriber is already installed.
    #[error("logging initialization error: {0}")]
    InitError(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
