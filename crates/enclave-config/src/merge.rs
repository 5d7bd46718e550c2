//! Layered merging with per-field provenance.

use std::collections::HashMap;

use serde::Serialize;

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// User-level configuration (`~/.enclave/config.toml`).
    User,
    /// Project-level configuration (`<root>/.enclave/config.toml`).
    Project,
    /// Environment variable fallback.
    Environment,
}

impl std::fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user (~/.enclave/config.toml)"),
            Self::Project => write!(f, "project (.enclave/config.toml)"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Tracks which layer set each field's value, keyed by dotted path.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Deep-merge `overlay` into `base`, recording which layer set each leaf.
///
/// Tables merge per field; scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    if overlay_val.is_table() {
                        deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                    } else {
                        *base_val = overlay_val.clone();
                        sources.insert(path, layer);
                    }
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            sources.insert(prefix.to_owned(), layer);
        },
    }
}

/// Record every leaf under `val` as coming from `layer`.
pub fn record_leaves(val: &toml::Value, prefix: &str, layer: ConfigLayer, sources: &mut FieldSources) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer);
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_tables_merge_per_field() {
        let mut base = parse("[engine]\nshell = \"sh\"\ncommand_timeout_secs = 30\n");
        let mut sources = FieldSources::new();
        record_leaves(&base, "", ConfigLayer::Defaults, &mut sources);

        let overlay = parse("[engine]\ncommand_timeout_secs = 90\n");
        deep_merge_tracking(&mut base, &overlay, "", ConfigLayer::Project, &mut sources);

        assert_eq!(base["engine"]["shell"].as_str(), Some("sh"));
        assert_eq!(base["engine"]["command_timeout_secs"].as_integer(), Some(90));
        assert_eq!(sources["engine.shell"], ConfigLayer::Defaults);
        assert_eq!(sources["engine.command_timeout_secs"], ConfigLayer::Project);
    }

    #[test]
    fn test_arrays_replace() {
        let mut base = parse("[policy]\nextra_confirm_verbs = [\"a\", \"b\"]\n");
        let overlay = parse("[policy]\nextra_confirm_verbs = [\"c\"]\n");
        let mut sources = FieldSources::new();
        deep_merge_tracking(&mut base, &overlay, "", ConfigLayer::User, &mut sources);
        assert_eq!(
            base["policy"]["extra_confirm_verbs"].as_array().map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn test_new_table_records_leaves() {
        let mut base = parse("[engine]\nshell = \"sh\"\n");
        let overlay = parse("[bridge]\nlocal_port = 4000\nserver_name = \"dev\"\n");
        let mut sources = FieldSources::new();
        deep_merge_tracking(&mut base, &overlay, "", ConfigLayer::User, &mut sources);
        assert_eq!(sources["bridge.local_port"], ConfigLayer::User);
        assert_eq!(sources["bridge.server_name"], ConfigLayer::User);
    }
}
