//! Configuration types for the Enclave engine and bridge.
//!
//! These types have no dependencies on other internal crates; they are
//! converted to `EngineLimits`, `LogConfig` and the bridge settings at the
//! binary's startup boundary. Every struct implements [`Default`] so that a
//! bare `[section]` header produces a working configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Operation engine limits.
    pub engine: EngineSection,
    /// Command and git policy overrides.
    pub policy: PolicySection,
    /// Remote bridge settings.
    pub bridge: BridgeSection,
    /// Logging level, format and destination.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// EngineSection
// ---------------------------------------------------------------------------

/// Timeouts and bounds for the local engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Shell used for `run_command` (invoked as `<shell> -c <command>`).
    pub shell: String,
    /// Default command timeout.
    pub command_timeout_secs: u64,
    /// Ceiling for caller-supplied command timeouts.
    pub max_command_timeout_secs: u64,
    /// How long a request waits for a locked path before reporting `Busy`.
    pub busy_wait_ms: u64,
    /// Lifetime of an unconfirmed preview token.
    pub confirmation_ttl_secs: u64,
    /// Default depth for `list_directory`.
    pub listing_depth: usize,
    /// Entry cap for `list_directory`.
    pub listing_entries: usize,
    /// Default depth for `project_structure`.
    pub structure_depth: usize,
    /// Entry cap for `project_structure`.
    pub structure_entries: usize,
    /// Command output cap in bytes.
    pub max_output_chars: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            shell: "sh".to_owned(),
            command_timeout_secs: 30,
            max_command_timeout_secs: 600,
            busy_wait_ms: 2000,
            confirmation_ttl_secs: 600,
            listing_depth: 3,
            listing_entries: 1000,
            structure_depth: 3,
            structure_entries: 500,
            max_output_chars: 30_000,
        }
    }
}

// ---------------------------------------------------------------------------
// PolicySection
// ---------------------------------------------------------------------------

/// Policy table overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Replacement policy table. `None` uses the built-in tables.
    pub table: Option<String>,
    /// Extra command verbs that always need confirmation (glob patterns).
    pub extra_confirm_verbs: Vec<String>,
}

// ---------------------------------------------------------------------------
// BridgeSection
// ---------------------------------------------------------------------------

/// Remote bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Remote host the bridge connects to, when not given on the command line.
    pub host: Option<String>,
    /// Local end of the tunnel.
    pub local_port: u16,
    /// Port the remote bridge server binds on the remote loopback.
    pub remote_port: u16,
    /// Name or path of the engine binary on the remote host.
    pub remote_binary: String,
    /// Command run on the remote host when the binary is missing.
    pub install_command: Option<String>,
    /// Private key passed to `ssh -i`.
    pub identity_file: Option<String>,
    /// Interval between relay heartbeats.
    pub heartbeat_secs: u64,
    /// Timeout for SSH connects and for the tunnel to come up.
    pub connect_timeout_secs: u64,
    /// Client configuration file to point at the bridge while it runs.
    pub client_config: Option<String>,
    /// Entry name under `mcpServers` in the client configuration.
    pub server_name: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            host: None,
            local_port: 3000,
            remote_port: 5000,
            remote_binary: "enclave".to_owned(),
            install_command: None,
            identity_file: None,
            heartbeat_secs: 15,
            connect_timeout_secs: 10,
            client_config: None,
            server_name: "enclave".to_owned(),
        }
    }
}

impl BridgeSection {
    /// Whether the configured host is this machine.
    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.host
            .as_deref()
            .is_some_and(|h| matches!(h, "localhost" | "127.0.0.1" | "::1"))
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Directory for rolling log files. `None` logs to stderr.
    pub directory: Option<String>,
    /// Per-crate tracing directives (e.g. `["enclave_bridge=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directory: None,
            directives: Vec::new(),
        }
    }
}
