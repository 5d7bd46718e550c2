//! Config file discovery and layered loading.
//!
//! 1. Parse `defaults.toml` as the base
//! 2. Merge `~/.enclave/config.toml` (user)
//! 3. Merge `<project>/.enclave/config.toml` (project)
//! 4. Apply env var fallbacks for fields no file set
//! 5. Deserialize the merged tree and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Directory name holding user and project configuration.
pub const CONFIG_DIR: &str = ".enclave";

/// Load the configuration with layered file precedence.
///
/// `project_root` enables the project layer. `home_override` replaces the
/// user's `~/.enclave` directory.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// merged configuration fails validation.
pub fn load(project_root: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    load_with_env(project_root, home_override, &collect_env_vars())
}

pub(crate) fn load_with_env(
    project_root: Option<&Path>,
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::Parse {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", ConfigLayer::Defaults, &mut field_sources);

    let user_dir = match home_override {
        Some(dir) => dir.to_path_buf(),
        None => home_directory()?.join(CONFIG_DIR),
    };
    let user_path = user_dir.join("config.toml");
    if let Some(overlay) = try_load_file(&user_path)? {
        deep_merge_tracking(&mut merged, &overlay, "", ConfigLayer::User, &mut field_sources);
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "loaded user config");
    }

    if let Some(root) = project_root {
        let project_path = root.join(CONFIG_DIR).join("config.toml");
        if let Some(overlay) = try_load_file(&project_path)? {
            deep_merge_tracking(
                &mut merged,
                &overlay,
                "",
                ConfigLayer::Project,
                &mut field_sources,
            );
            loaded_files.push(project_path.display().to_string());
            info!(path = %project_path.display(), "loaded project config");
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a single file, without layering.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    check_size(path, &content)?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Read a file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source: e,
            });
        },
    };
    check_size(path, &content)?;

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

fn check_size(path: &Path, content: &str) -> ConfigResult<()> {
    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: path.display().to_string(),
            size: content.len(),
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }
    Ok(())
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_with_no_files() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load_with_env(None, Some(home.path()), &no_env()).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources["engine.shell"],
            ConfigLayer::Defaults
        );
    }

    #[test]
    fn test_project_layer_overrides_user() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "[engine]\ncommand_timeout_secs = 60\nshell = \"bash\"\n",
        )
        .unwrap();
        fs::create_dir(project.path().join(CONFIG_DIR)).unwrap();
        fs::write(
            project.path().join(CONFIG_DIR).join("config.toml"),
            "[engine]\ncommand_timeout_secs = 90\n",
        )
        .unwrap();

        let resolved =
            load_with_env(Some(project.path()), Some(home.path()), &no_env()).unwrap();
        assert_eq!(resolved.config.engine.command_timeout_secs, 90);
        assert_eq!(resolved.config.engine.shell, "bash");
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources["engine.command_timeout_secs"],
            ConfigLayer::Project
        );
    }

    #[test]
    fn test_env_fallback_only_for_unset_fields() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join("config.toml"), "[logging]\nlevel = \"warn\"\n").unwrap();
        let env: HashMap<String, String> = [
            ("ENCLAVE_LOG_LEVEL".to_owned(), "trace".to_owned()),
            ("ENCLAVE_BRIDGE_REMOTE_PORT".to_owned(), "5500".to_owned()),
        ]
        .into_iter()
        .collect();

        let resolved = load_with_env(None, Some(home.path()), &env).unwrap();
        assert_eq!(resolved.config.logging.level, "warn");
        assert_eq!(resolved.config.bridge.remote_port, 5500);
    }

    #[test]
    fn test_bad_env_port_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let env: HashMap<String, String> =
            [("ENCLAVE_BRIDGE_LOCAL_PORT".to_owned(), "70000".to_owned())]
                .into_iter()
                .collect();
        let err = load_with_env(None, Some(home.path()), &env).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "ENCLAVE_BRIDGE_LOCAL_PORT"));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let home = tempfile::tempdir().unwrap();
        let padding = "#".repeat(1_048_577);
        fs::write(home.path().join("config.toml"), padding).unwrap();
        let err = load_with_env(None, Some(home.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge { size: 1_048_577, .. }));
    }

    #[test]
    fn test_malformed_file_names_path() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join("config.toml"), "[engine\n").unwrap();
        let err = load_with_env(None, Some(home.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path.ends_with("config.toml")));
    }

    #[test]
    fn test_invalid_value_fails_validation() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join("config.toml"), "[logging]\nformat = \"xml\"\n").unwrap();
        let err = load_with_env(None, Some(home.path()), &no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        fs::write(dir.path().join("config.toml"), data).unwrap();
        let result = try_load_file(&dir.path().join("config.toml"));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
