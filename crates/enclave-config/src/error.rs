use std::io;
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A configuration file, or the merged tree, is not valid TOML for
    /// [`Config`](crate::Config).
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        /// File that failed, or a placeholder for the merged tree.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A configuration file is larger than the loader accepts.
    #[error("{path} is {size} bytes; config files are limited to {limit} bytes")]
    TooLarge {
        /// Offending file.
        path: String,
        /// Its size.
        size: usize,
        /// The cap.
        limit: usize,
    },

    /// An `ENCLAVE_*` variable holds a value of the wrong type.
    #[error("{var}={value:?} is not a valid {expected}")]
    Env {
        /// Variable name.
        var: String,
        /// Raw value.
        value: String,
        /// What the field needs, e.g. `"port number"`.
        expected: &'static str,
    },

    /// A setting parsed but is out of range or inconsistent.
    #[error("{field}: {message}")]
    Invalid {
        /// Dotted field path, e.g. `bridge.remote_port`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The user's home directory is unknown, so `~/.enclave` cannot be found.
    #[error("cannot locate the home directory for ~/.enclave")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
