//! Temporarily pointing an MCP client configuration at the bridge.
//!
//! The client config is a JSON document with an `mcpServers` object. While a
//! bridge session is up, one entry in it names the local relay; when the
//! session ends, the entry is put back exactly as it was (or removed if it
//! did not exist). Writes hold an exclusive `fs2` lock on a sibling `.lk` file
//! and replace the file atomically.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{BridgeError, BridgeResult};

/// Key holding the server table in the client configuration.
pub const SERVERS_KEY: &str = "mcpServers";

/// An applied client configuration change that can be undone.
#[derive(Debug)]
#[must_use = "an applied patch should be restored when the session ends"]
pub struct ClientConfigPatch {
    path: PathBuf,
    server_name: String,
    previous: Option<Value>,
}

impl ClientConfigPatch {
    /// Set `mcpServers.<server_name>` to `entry`, remembering what was there.
    ///
    /// A missing file is created. Other keys are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ClientConfig`] if the file is unreadable, is not
    /// a JSON object, or cannot be written.
    pub fn apply(path: &Path, server_name: &str, entry: Value) -> BridgeResult<Self> {
        let previous = update(path, |servers| {
            Ok(servers.insert(server_name.to_string(), entry))
        })?;
        info!(path = %path.display(), server = server_name, "Client config points at bridge");
        Ok(Self {
            path: path.to_path_buf(),
            server_name: server_name.to_string(),
            previous,
        })
    }

    /// Path of the patched file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Put the entry back the way [`apply`](Self::apply) found it.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ClientConfig`] if the file cannot be rewritten.
    pub fn restore(self) -> BridgeResult<()> {
        let Self {
            path,
            server_name,
            previous,
        } = self;
        update(&path, |servers| {
            match previous {
                Some(value) => {
                    servers.insert(server_name.clone(), value);
                },
                None => {
                    servers.remove(&server_name);
                },
            }
            Ok(())
        })?;
        info!(path = %path.display(), server = %server_name, "Client config restored");
        Ok(())
    }
}

fn config_error(path: &Path, message: impl Into<String>) -> BridgeError {
    BridgeError::ClientConfig {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Load, modify and atomically save the server table under an exclusive lock.
fn update<T>(
    path: &Path,
    f: impl FnOnce(&mut Map<String, Value>) -> BridgeResult<T>,
) -> BridgeResult<T> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)
        .map_err(|e| config_error(path, format!("failed to create parent directory: {e}")))?;

    let _lock = lock_exclusive(path)?;

    let mut document = match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Map::new(),
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(config_error(path, "top level is not a JSON object")),
            Err(e) => return Err(config_error(path, format!("invalid JSON: {e}"))),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(config_error(path, format!("failed to read: {e}"))),
    };

    let servers = document
        .entry(SERVERS_KEY)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| config_error(path, format!("`{SERVERS_KEY}` is not an object")))?;
    let result = f(servers)?;

    let body = serde_json::to_string_pretty(&Value::Object(document))
        .map_err(|e| config_error(path, format!("failed to serialize: {e}")))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| config_error(path, format!("failed to create temp file: {e}")))?;
    tmp.write_all(body.as_bytes())
        .and_then(|()| tmp.write_all(b"\n"))
        .map_err(|e| config_error(path, format!("failed to write temp file: {e}")))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| config_error(path, format!("failed to sync temp file: {e}")))?;
    tmp.persist(path)
        .map_err(|e| config_error(path, format!("failed to replace file: {e}")))?;

    debug!(path = %path.display(), "Saved client config");
    Ok(result)
}

fn lock_exclusive(path: &Path) -> BridgeResult<File> {
    let lock_path = path.with_extension("lk");
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .read(true)
        .open(&lock_path)
        .map_err(|e| config_error(path, format!("failed to open lock file: {e}")))?;
    lock_file
        .lock_exclusive()
        .map_err(|e| config_error(path, format!("failed to acquire file lock: {e}")))?;
    Ok(lock_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn read(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_apply_creates_missing_file_and_restore_removes_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("claude").join("config.json");

        let patch = ClientConfigPatch::apply(&path, "enclave", json!({"command": "enclave"})).unwrap();
        assert_eq!(read(&path), json!({"mcpServers": {"enclave": {"command": "enclave"}}}));

        patch.restore().unwrap();
        assert_eq!(read(&path), json!({"mcpServers": {}}));
    }

    #[test]
    fn test_restore_puts_back_previous_entry_and_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let original = json!({
            "theme": "dark",
            "mcpServers": {
                "enclave": {"command": "old"},
                "other": {"command": "other"}
            }
        });
        std::fs::write(&path, original.to_string()).unwrap();

        let patch = ClientConfigPatch::apply(&path, "enclave", json!({"command": "new"})).unwrap();
        let patched = read(&path);
        assert_eq!(patched["mcpServers"]["enclave"], json!({"command": "new"}));
        assert_eq!(patched["mcpServers"]["other"], json!({"command": "other"}));
        assert_eq!(patched["theme"], json!("dark"));

        patch.restore().unwrap();
        assert_eq!(read(&path), original);
    }

    #[test]
    fn test_malformed_file_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ClientConfigPatch::apply(&path, "enclave", json!({})).unwrap_err();
        assert!(matches!(err, BridgeError::ClientConfig { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_servers_must_be_an_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"mcpServers": []}"#).unwrap();
        assert!(ClientConfigPatch::apply(&path, "enclave", json!({})).is_err());
    }
}
