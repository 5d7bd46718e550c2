//! Environment variable fallbacks.
//!
//! Environment variables are fallback, not override: they only fill fields
//! that no configuration file set.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};

/// What an environment variable's value must parse as.
#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Text,
    Seconds,
    Port,
}

impl EnvKind {
    fn coerce(self, var: &str, raw: &str) -> ConfigResult<toml::Value> {
        let bad = |expected| ConfigError::Env {
            var: var.to_owned(),
            value: raw.to_owned(),
            expected,
        };
        match self {
            Self::Text => Ok(toml::Value::String(raw.to_owned())),
            Self::Seconds => raw
                .trim()
                .parse::<u32>()
                .map(|n| toml::Value::Integer(i64::from(n)))
                .map_err(|_| bad("number of seconds")),
            Self::Port => raw
                .trim()
                .parse::<u16>()
                .map(|n| toml::Value::Integer(i64::from(n)))
                .map_err(|_| bad("port number")),
        }
    }
}

/// `(variable, dotted field path, value kind)`.
const ENV_MAPPINGS: &[(&str, &str, EnvKind)] = &[
    ("ENCLAVE_LOG_LEVEL", "logging.level", EnvKind::Text),
    ("ENCLAVE_LOG_FORMAT", "logging.format", EnvKind::Text),
    ("ENCLAVE_SHELL", "engine.shell", EnvKind::Text),
    (
        "ENCLAVE_COMMAND_TIMEOUT_SECS",
        "engine.command_timeout_secs",
        EnvKind::Seconds,
    ),
    ("ENCLAVE_BRIDGE_HOST", "bridge.host", EnvKind::Text),
    ("ENCLAVE_BRIDGE_LOCAL_PORT", "bridge.local_port", EnvKind::Port),
    ("ENCLAVE_BRIDGE_REMOTE_PORT", "bridge.remote_port", EnvKind::Port),
];

/// Fill fields that only hold their embedded default from `ENCLAVE_*`
/// variables.
///
/// Returns the number of variables applied.
///
/// # Errors
///
/// Returns [`ConfigError::Env`] if a numeric variable does not parse.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for &(var, field, kind) in ENV_MAPPINGS {
        if !matches!(sources.get(field), None | Some(ConfigLayer::Defaults)) {
            continue;
        }
        let Some(raw) = env_vars.get(var) else {
            continue;
        };

        debug!(var, field, "applying env var fallback");
        set_field(merged, field, kind.coerce(var, raw)?);
        sources.insert(field.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    Ok(count)
}

/// Set a dotted field in the TOML tree, creating intermediate tables.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_fallback_fills_defaulted_field() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".into(), ConfigLayer::Defaults);

        let env = make_env(&[("ENCLAVE_LOG_LEVEL", "debug")]);
        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap(), 1);
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(sources["logging.level"], ConfigLayer::Environment);
    }

    #[test]
    fn test_file_value_wins_over_env() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".into(), ConfigLayer::Project);

        let env = make_env(&[("ENCLAVE_LOG_LEVEL", "debug")]);
        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap(), 0);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_numeric_coercion() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();
        let env = make_env(&[
            ("ENCLAVE_BRIDGE_LOCAL_PORT", "4100"),
            ("ENCLAVE_COMMAND_TIMEOUT_SECS", "45"),
        ]);
        apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap();
        assert_eq!(merged["bridge"]["local_port"].as_integer(), Some(4100));
        assert_eq!(merged["engine"]["command_timeout_secs"].as_integer(), Some(45));
    }

    #[test]
    fn test_non_numeric_timeout_rejected() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();
        let env = make_env(&[("ENCLAVE_COMMAND_TIMEOUT_SECS", "soon")]);
        let err = apply_env_fallbacks(&mut merged, &mut sources, &env).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ENCLAVE_COMMAND_TIMEOUT_SECS=\"soon\" is not a valid number of seconds"
        );
        assert!(sources.is_empty());
    }
}
