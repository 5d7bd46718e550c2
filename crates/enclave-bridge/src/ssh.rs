//! [`RemoteLauncher`] over the system `ssh` client.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::auth::{AuthToken, TOKEN_ENV};
use crate::error::{BridgeError, BridgeResult};
use crate::launcher::{RemoteLauncher, RemoteServer, Tunnel};

/// Timeout for short remote commands (lookups, starting, stopping).
const REMOTE_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for the install command.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
/// Grace period for the tunnel process to exit after being killed.
const TUNNEL_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Launches the remote bridge and tunnel with `ssh`.
#[derive(Debug, Clone)]
pub struct SshLauncher {
    host: String,
    remote_root: String,
    remote_binary: String,
    install_command: Option<String>,
    identity_file: Option<PathBuf>,
    connect_timeout: Duration,
}

impl SshLauncher {
    /// Launcher for `host` (anything `ssh` accepts, e.g. `user@box`), serving
    /// `remote_root` on the remote side.
    #[must_use]
    pub fn new(host: impl Into<String>, remote_root: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            remote_root: remote_root.into(),
            remote_binary: "enclave".to_string(),
            install_command: None,
            identity_file: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Engine binary name or path on the remote host.
    #[must_use]
    pub fn with_remote_binary(mut self, binary: impl Into<String>) -> Self {
        self.remote_binary = binary.into();
        self
    }

    /// Command to run remotely when the binary is missing.
    #[must_use]
    pub fn with_install_command(mut self, command: Option<String>) -> Self {
        self.install_command = command;
        self
    }

    /// Private key passed as `ssh -i`.
    #[must_use]
    pub fn with_identity_file(mut self, key: Option<PathBuf>) -> Self {
        self.identity_file = key;
        self
    }

    /// `ConnectTimeout` for every ssh invocation.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Options shared by every ssh invocation.
    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "ServerAliveInterval=10".to_string(),
        ];
        if let Some(key) = &self.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }

    /// Arguments for running `command` on the remote host.
    fn exec_args(&self, command: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push(self.host.clone());
        args.push(command.to_string());
        args
    }

    /// Arguments for a `-L` forward with no remote command.
    fn tunnel_args(&self, local_port: u16, remote_port: u16) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "-N".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-L".to_string(),
            format!("127.0.0.1:{local_port}:127.0.0.1:{remote_port}"),
            self.host.clone(),
        ]);
        args
    }

    /// Shell line that starts the bridge server detached and prints its pid.
    fn start_line(&self, port: u16, token: &AuthToken) -> String {
        let root = shell_words::quote(&self.remote_root);
        let binary = shell_words::quote(&self.remote_binary);
        let token = shell_words::quote(token.expose());
        let log = log_path(port);
        format!(
            "cd {root} && {TOKEN_ENV}={token} nohup {binary} bridge-server --root {root} --port {port} > {log} 2>&1 < /dev/null & echo $!"
        )
    }

    async fn run_remote(&self, command: &str, timeout: Duration) -> BridgeResult<String> {
        debug!(host = %self.host, command = %redact(command), "Running remote command");
        let mut cmd = Command::new("ssh");
        cmd.args(self.exec_args(command))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| {
                BridgeError::Remote(format!(
                    "`{}` timed out after {}s",
                    redact(command),
                    timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::Remote(format!(
                "`{}` failed ({}): {}",
                redact(command),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn binary_present(&self) -> bool {
        let check = format!("command -v {}", shell_words::quote(&self.remote_binary));
        matches!(self.run_remote(&check, REMOTE_COMMAND_TIMEOUT).await, Ok(path) if !path.is_empty())
    }
}

fn log_path(port: u16) -> String {
    format!("/tmp/enclave-bridge-{port}.log")
}

/// Hide the session token in logged command lines.
fn redact(command: &str) -> String {
    let marker = format!("{TOKEN_ENV}=");
    match command.find(&marker) {
        Some(start) => {
            let value_start = start.saturating_add(marker.len());
            let rest = command.get(value_start..).unwrap_or_default();
            let value_len = rest.find(' ').unwrap_or(rest.len());
            let tail = rest.get(value_len..).unwrap_or_default();
            format!("{}{marker}***{tail}", command.get(..start).unwrap_or_default())
        },
        None => command.to_string(),
    }
}

#[async_trait]
impl RemoteLauncher for SshLauncher {
    fn host(&self) -> &str {
        &self.host
    }

    async fn ensure_installed(&self) -> BridgeResult<()> {
        if self.binary_present().await {
            debug!(host = %self.host, binary = %self.remote_binary, "Remote engine present");
            return Ok(());
        }

        let Some(install) = &self.install_command else {
            return Err(BridgeError::Remote(format!(
                "{} not found on {} and no install command is configured",
                self.remote_binary, self.host
            )));
        };

        info!(host = %self.host, "Installing engine on remote host");
        self.run_remote(install, INSTALL_TIMEOUT).await?;
        if self.binary_present().await {
            Ok(())
        } else {
            Err(BridgeError::Remote(format!(
                "{} still not found on {} after install",
                self.remote_binary, self.host
            )))
        }
    }

    async fn start_server(&self, port: u16, token: &AuthToken) -> BridgeResult<RemoteServer> {
        let stdout = self
            .run_remote(&self.start_line(port, token), REMOTE_COMMAND_TIMEOUT)
            .await?;
        let pid = stdout
            .lines()
            .last()
            .and_then(|line| line.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                BridgeError::Remote(format!("could not read the remote server pid from {stdout:?}"))
            })?;
        info!(host = %self.host, pid, port, "Remote bridge server started");
        Ok(RemoteServer {
            pid: Some(pid),
            port,
            log_path: Some(log_path(port)),
        })
    }

    async fn stop_server(&self, server: &RemoteServer) -> BridgeResult<()> {
        let Some(pid) = server.pid else {
            return Ok(());
        };
        self.run_remote(&format!("kill {pid} 2>/dev/null || true"), REMOTE_COMMAND_TIMEOUT)
            .await?;
        info!(host = %self.host, pid, "Remote bridge server stopped");
        Ok(())
    }

    async fn open_tunnel(&self, local_port: u16, remote_port: u16) -> BridgeResult<Box<dyn Tunnel>> {
        let child = Command::new("ssh")
            .args(self.tunnel_args(local_port, remote_port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!(host = %self.host, local_port, remote_port, pid = child.id(), "SSH tunnel started");
        Ok(Box::new(SshTunnel { child }))
    }
}

/// An `ssh -N -L` child process.
#[derive(Debug)]
struct SshTunnel {
    child: Child,
}

#[async_trait]
impl Tunnel for SshTunnel {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn close(&mut self) {
        if !self.is_alive() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            warn!(error = %e, "Failed to signal SSH tunnel");
        }
        if tokio::time::timeout(TUNNEL_EXIT_GRACE, self.child.wait())
            .await
            .is_err()
        {
            warn!("SSH tunnel did not exit in time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher() -> SshLauncher {
        SshLauncher::new("dev@build-box", "/srv/my project")
            .with_identity_file(Some(PathBuf::from("/home/dev/.ssh/id_ed25519")))
            .with_connect_timeout(Duration::from_secs(7))
    }

    #[test]
    fn test_tunnel_args() {
        let args = launcher().tunnel_args(3000, 5000);
        let line = args.join(" ");
        assert!(line.contains("-o BatchMode=yes"));
        assert!(line.contains("-o ConnectTimeout=7"));
        assert!(line.contains("-i /home/dev/.ssh/id_ed25519"));
        assert!(line.contains("-o ExitOnForwardFailure=yes"));
        assert!(line.ends_with("-N -o ExitOnForwardFailure=yes -L 127.0.0.1:3000:127.0.0.1:5000 dev@build-box"));
    }

    #[test]
    fn test_start_line_quotes_paths() {
        let token = AuthToken::new("abc123").unwrap();
        let line = launcher().start_line(5000, &token);
        assert!(line.starts_with("cd '/srv/my project' && ENCLAVE_BRIDGE_TOKEN=abc123 nohup enclave bridge-server"));
        assert!(line.contains("--root '/srv/my project' --port 5000"));
        assert!(line.ends_with("& echo $!"));
    }

    #[test]
    fn test_exec_args_put_command_last() {
        let args = launcher().exec_args("command -v enclave");
        assert_eq!(args.last().map(String::as_str), Some("command -v enclave"));
        assert_eq!(args.get(args.len().saturating_sub(2)).map(String::as_str), Some("dev@build-box"));
    }

    #[test]
    fn test_redact_hides_token() {
        let token = AuthToken::new("topsecret").unwrap();
        let line = launcher().start_line(5000, &token);
        let shown = redact(&line);
        assert!(!shown.contains("topsecret"));
        assert!(shown.contains("ENCLAVE_BRIDGE_TOKEN=*** nohup"));
    }
}
