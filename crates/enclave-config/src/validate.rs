//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validate a merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::Invalid`] found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_engine(config)?;
    validate_bridge(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_engine(config: &Config) -> ConfigResult<()> {
    let e = &config.engine;

    for (field, value) in [
        ("engine.command_timeout_secs", e.command_timeout_secs),
        ("engine.max_command_timeout_secs", e.max_command_timeout_secs),
        ("engine.confirmation_ttl_secs", e.confirmation_ttl_secs),
    ] {
        if value == 0 {
            return Err(invalid(field, "timeout must be greater than zero"));
        }
    }

    if e.command_timeout_secs > e.max_command_timeout_secs {
        return Err(invalid(
            "engine.command_timeout_secs",
            format!(
                "default timeout {}s exceeds max_command_timeout_secs {}s",
                e.command_timeout_secs, e.max_command_timeout_secs
            ),
        ));
    }

    if e.shell.trim().is_empty() {
        return Err(invalid("engine.shell", "shell must not be empty"));
    }

    if e.listing_entries == 0 || e.structure_entries == 0 {
        return Err(invalid(
            "engine.listing_entries",
            "entry caps must be greater than zero",
        ));
    }

    if e.max_output_chars == 0 {
        return Err(invalid(
            "engine.max_output_chars",
            "output cap must be greater than zero",
        ));
    }

    Ok(())
}

fn validate_bridge(config: &Config) -> ConfigResult<()> {
    let b = &config.bridge;

    if b.local_port == 0 || b.remote_port == 0 {
        return Err(invalid("bridge.local_port", "ports must be non-zero"));
    }

    if b.is_loopback() && b.local_port == b.remote_port {
        return Err(invalid(
            "bridge.remote_port",
            format!(
                "local and remote port are both {} on a loopback host",
                b.local_port
            ),
        ));
    }

    if b.heartbeat_secs == 0 {
        return Err(invalid("bridge.heartbeat_secs", "must be greater than zero"));
    }
    if b.connect_timeout_secs == 0 {
        return Err(invalid("bridge.connect_timeout_secs", "must be greater than zero"));
    }
    if b.server_name.trim().is_empty() {
        return Err(invalid("bridge.server_name", "must not be empty"));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !LOG_FORMATS.contains(&l.format.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }

    if !LOG_LEVELS.contains(&l.level.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: {}",
                l.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.engine.command_timeout_secs = 0;
        assert_eq!(field_of(validate(&config)), "engine.command_timeout_secs");
    }

    #[test]
    fn test_default_above_ceiling_rejected() {
        let mut config = Config::default();
        config.engine.command_timeout_secs = 900;
        assert_eq!(field_of(validate(&config)), "engine.command_timeout_secs");
    }

    #[test]
    fn test_equal_ports_on_loopback_rejected() {
        let mut config = Config::default();
        config.bridge.remote_port = config.bridge.local_port;
        assert!(validate(&config).is_ok());

        config.bridge.host = Some("127.0.0.1".into());
        assert_eq!(field_of(validate(&config)), "bridge.remote_port");
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".into();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }
}
