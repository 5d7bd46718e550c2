//! Policy loading errors.

use std::path::PathBuf;

/// Errors raised while loading or compiling policy tables.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("failed to read policy table {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The policy TOML is malformed.
    #[error("failed to parse policy table: {0}")]
    Parse(#[from] toml::de::Error),

    /// A glob pattern failed to compile.
    #[error("invalid policy pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Underlying glob error.
        #[source]
        source: globset::Error,
    },
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
