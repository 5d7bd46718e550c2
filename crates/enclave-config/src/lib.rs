//! Layered configuration for the Enclave engine and bridge.
//!
//! A single [`Config`] covers the engine limits, policy overrides, remote
//! bridge settings and logging.
//!
//! # Usage
//!
//! ```rust,no_run
//! use enclave_config::Config;
//!
//! let resolved = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("shell: {}", resolved.config.engine.shell);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Project** (`<root>/.enclave/config.toml`)
//! 2. **User** (`~/.enclave/config.toml`)
//! 3. **Environment variables** (`ENCLAVE_*`), fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate depends on no other internal crate. Conversion into engine and
//! logging types happens in the binary.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered merging with provenance.
pub mod merge;
/// Resolved configuration display.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use merge::ConfigLayer;
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(project_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(project_root, None)
    }

    /// Load configuration with an explicit user configuration directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(
        project_root: Option<&std::path::Path>,
        config_dir: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(project_root, Some(config_dir))
    }

    /// Load configuration from a single file, without layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
