//! The seam between session setup and how a remote host is reached.

use async_trait::async_trait;

use crate::auth::AuthToken;
use crate::error::BridgeResult;

/// A bridge server started on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServer {
    /// Remote process id, when it could be captured.
    pub pid: Option<u32>,
    /// Port the server listens on.
    pub port: u16,
    /// Remote log file, if any.
    pub log_path: Option<String>,
}

/// A live local-to-remote port mapping.
#[async_trait]
pub trait Tunnel: Send {
    /// Whether the tunnel is still up.
    fn is_alive(&mut self) -> bool;

    /// Tear the tunnel down. Idempotent.
    async fn close(&mut self);
}

/// Performs the remote side of session setup and teardown.
///
/// [`SshLauncher`](crate::SshLauncher) is the production implementation;
/// tests substitute an in-process one.
#[async_trait]
pub trait RemoteLauncher: Send + Sync {
    /// Human-readable identity of the remote host.
    fn host(&self) -> &str;

    /// Make sure the engine binary is present on the remote host, installing
    /// it if configured to.
    async fn ensure_installed(&self) -> BridgeResult<()>;

    /// Start a bridge server bound to `port` on the remote loopback,
    /// requiring `token`.
    async fn start_server(&self, port: u16, token: &AuthToken) -> BridgeResult<RemoteServer>;

    /// Stop a server started by [`start_server`](Self::start_server).
    async fn stop_server(&self, server: &RemoteServer) -> BridgeResult<()>;

    /// Map `local_port` on this machine to `remote_port` on the remote
    /// loopback.
    async fn open_tunnel(&self, local_port: u16, remote_port: u16) -> BridgeResult<Box<dyn Tunnel>>;
}
