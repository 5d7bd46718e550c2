//! Bridge from `enclave_config::Config` to the engine, bridge and logging
//! types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use enclave_bridge::{AuthToken, ClientConfigTarget, ClientOptions, SessionOptions, TOKEN_ENV};
use enclave_config::Config;
use enclave_policy::{PolicyResult, PolicySet, PolicyTable};
use enclave_telemetry::{LogConfig, LogFormat};
use enclave_tools::{Engine, EngineLimits, SetupError};
use serde_json::{Value, json};

/// Engine limits from the `[engine]` section.
#[must_use]
pub fn to_engine_limits(config: &Config) -> EngineLimits {
    let engine = &config.engine;
    EngineLimits {
        command_timeout: Duration::from_secs(engine.command_timeout_secs),
        max_command_timeout: Duration::from_secs(engine.max_command_timeout_secs),
        busy_wait: Duration::from_millis(engine.busy_wait_ms),
        confirmation_ttl: Duration::from_secs(engine.confirmation_ttl_secs),
        listing_depth: engine.listing_depth,
        listing_entries: engine.listing_entries,
        structure_depth: engine.structure_depth,
        structure_entries: engine.structure_entries,
        max_output_chars: engine.max_output_chars,
        shell: engine.shell.clone(),
    }
}

/// Logging setup from the `[logging]` section.
#[must_use]
pub fn to_log_config(config: &Config) -> LogConfig {
    let logging = &config.logging;
    let format = logging.format.parse().unwrap_or(LogFormat::Compact);
    let mut log_config = LogConfig::new(logging.level.clone()).with_format(format);
    if let Some(directory) = &logging.directory {
        log_config = log_config.with_file_logging(directory);
    }
    for directive in &logging.directives {
        log_config = log_config.with_directive(directive.clone());
    }
    log_config
}

/// Command and git policy: the configured table (relative paths resolve
/// against the project root) or the built-in one, plus extra confirm verbs.
///
/// # Errors
///
/// Returns a policy error if the table cannot be loaded or compiled.
pub fn to_policy(config: &Config, root: &Path) -> PolicyResult<PolicySet> {
    let mut table = match &config.policy.table {
        Some(path) => PolicyTable::from_file(&root.join(path))?,
        None => PolicyTable::builtin()?,
    };
    table.add_confirm_verbs(&config.policy.extra_confirm_verbs);
    PolicySet::from_table(table)
}

/// An engine rooted at `root` with the configured policy and limits.
///
/// # Errors
///
/// Returns [`SetupError`] if the root or the policy is unusable.
pub fn to_engine(config: &Config, root: &Path) -> Result<Engine, SetupError> {
    Engine::builder(root)
        .with_policy(to_policy(config, root)?)
        .with_limits(to_engine_limits(config))
        .build()
}

/// Relay client options; the token comes from the environment.
#[must_use]
pub fn to_client_options(config: &Config) -> ClientOptions {
    ClientOptions::default()
        .with_token(AuthToken::from_env())
        .with_heartbeat(Duration::from_secs(config.bridge.heartbeat_secs))
        .with_connect_timeout(Duration::from_secs(config.bridge.connect_timeout_secs))
}

/// Session options for `connect`, including the client config entry when a
/// client config file is configured.
#[must_use]
pub fn to_session_options(config: &Config, program: &str) -> SessionOptions {
    let bridge = &config.bridge;
    let token = AuthToken::generate();
    let client_config = bridge.client_config.as_ref().map(|path| ClientConfigTarget {
        path: expand_home(path),
        server_name: bridge.server_name.clone(),
        entry: client_entry(program, bridge.local_port, &token),
    });
    SessionOptions::new(bridge.local_port, bridge.remote_port)
        .with_token(token)
        .with_heartbeat(Duration::from_secs(bridge.heartbeat_secs))
        .with_connect_timeout(Duration::from_secs(bridge.connect_timeout_secs))
        .with_client_config(client_config)
}

/// The `mcpServers` entry that launches a relaying front end.
#[must_use]
pub fn client_entry(program: &str, local_port: u16, token: &AuthToken) -> Value {
    json!({
        "command": program,
        "args": ["serve", "--bridge", format!("127.0.0.1:{local_port}")],
        "env": { TOKEN_ENV: token.expose() },
    })
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME")
            .map_or_else(|| PathBuf::from(path), |home| PathBuf::from(home).join(rest)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_policy::Verdict;

    #[test]
    fn test_engine_limits_follow_config() {
        let mut config = Config::default();
        config.engine.command_timeout_secs = 5;
        config.engine.busy_wait_ms = 250;
        config.engine.shell = "bash".into();
        let limits = to_engine_limits(&config);
        assert_eq!(limits.command_timeout, Duration::from_secs(5));
        assert_eq!(limits.busy_wait, Duration::from_millis(250));
        assert_eq!(limits.shell, "bash");
        assert_eq!(limits.max_command_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_log_config_follows_config() {
        let mut config = Config::default();
        config.logging.level = "debug".into();
        config.logging.format = "json".into();
        config.logging.directives = vec!["enclave_bridge=trace".into()];
        let log = to_log_config(&config);
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, ["enclave_bridge=trace"]);
    }

    #[test]
    fn test_extra_confirm_verbs_reach_the_gate() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.policy.extra_confirm_verbs = vec!["terraform".into()];
        let policy = to_policy(&config, dir.path()).unwrap();
        let verdict = policy.command.classify("terraform apply");
        assert_eq!(verdict.verdict, Verdict::NeedsConfirmation);
    }

    #[test]
    fn test_client_entry_points_at_local_port() {
        let token = AuthToken::new("secret").unwrap();
        let entry = client_entry("/usr/local/bin/enclave", 3000, &token);
        assert_eq!(entry["command"], "/usr/local/bin/enclave");
        assert_eq!(entry["args"], json!(["serve", "--bridge", "127.0.0.1:3000"]));
        assert_eq!(entry["env"][TOKEN_ENV], "secret");
    }

    #[test]
    fn test_session_options_patch_only_when_configured() {
        let mut config = Config::default();
        assert!(to_session_options(&config, "enclave").client_config.is_none());

        config.bridge.client_config = Some("/tmp/client.json".into());
        let options = to_session_options(&config, "enclave");
        let target = options.client_config.unwrap();
        assert_eq!(target.path, PathBuf::from("/tmp/client.json"));
        assert_eq!(target.server_name, "enclave");
        assert_eq!(
            target.entry["env"][TOKEN_ENV].as_str(),
            Some(options.token.expose())
        );
    }
}
