//! An in-process [`RemoteLauncher`] for exercising bridge sessions without
//! SSH.
//!
//! The "remote" server is a [`BridgeServer`] over an [`Engine`] rooted at a
//! local directory, and the "tunnel" is a TCP forwarder between two
//! pre-bound loopback ports. Steps can be made to fail, and the server or
//! tunnel can be killed mid-session.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use enclave_bridge::{
    AuthToken, BridgeError, BridgeResult, BridgeServer, RemoteLauncher, RemoteServer, SetupStep,
    Tunnel,
};
use enclave_tools::Engine;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tracing::debug;

type Shared<T> = Arc<Mutex<T>>;

/// Simulated remote host backed by a local project directory.
#[derive(Debug)]
pub struct LocalLauncher {
    root: PathBuf,
    local_port: u16,
    remote_port: u16,
    local: Mutex<Option<TcpListener>>,
    remote: Mutex<Option<TcpListener>>,
    server_stop: Mutex<Option<watch::Sender<bool>>>,
    tunnel: Mutex<Option<AbortHandle>>,
    fail_at: Option<SetupStep>,
    events: Shared<Vec<String>>,
}

impl LocalLauncher {
    /// Serve `root` and pre-bind both ports on the loopback.
    ///
    /// # Panics
    ///
    /// Panics if the listeners cannot be bound.
    pub async fn new(root: &Path) -> Self {
        let local = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind local port");
        let remote = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind remote port");
        let local_port = local.local_addr().expect("local addr").port();
        let remote_port = remote.local_addr().expect("remote addr").port();
        Self {
            root: root.to_path_buf(),
            local_port,
            remote_port,
            local: Mutex::new(Some(local)),
            remote: Mutex::new(Some(remote)),
            server_stop: Mutex::new(None),
            tunnel: Mutex::new(None),
            fail_at: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `step` fail. `WaitForPort` yields a tunnel that is already dead;
    /// `Handshake` starts the server with a different token.
    #[must_use]
    pub fn failing_at(mut self, step: SetupStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Port the session should use as its local end.
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Port the simulated remote server binds.
    #[must_use]
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Launcher calls so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Stop the server abruptly, dropping every open connection.
    pub fn crash_server(&self) {
        self.record("crash_server");
        if let Some(stop) = lock(&self.server_stop).take() {
            let _ = stop.send(true);
        }
    }

    /// Kill the tunnel without going through [`Tunnel::close`].
    pub fn kill_tunnel(&self) {
        self.record("kill_tunnel");
        if let Some(handle) = lock(&self.tunnel).take() {
            handle.abort();
        }
    }

    fn record(&self, event: &str) {
        lock(&self.events).push(event.to_string());
    }

    fn injected(&self, step: SetupStep) -> BridgeResult<()> {
        if self.fail_at == Some(step) {
            return Err(BridgeError::Remote(format!("injected failure at {step}")));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl RemoteLauncher for LocalLauncher {
    fn host(&self) -> &str {
        "local"
    }

    async fn ensure_installed(&self) -> BridgeResult<()> {
        self.record("ensure_installed");
        self.injected(SetupStep::Install)
    }

    async fn start_server(&self, port: u16, token: &AuthToken) -> BridgeResult<RemoteServer> {
        self.record("start_server");
        self.injected(SetupStep::StartServer)?;
        if port != self.remote_port {
            return Err(BridgeError::Remote(format!(
                "expected remote port {}, got {port}",
                self.remote_port
            )));
        }
        let listener = lock(&self.remote)
            .take()
            .ok_or_else(|| BridgeError::Remote("server already started".into()))?;
        let engine = Engine::new(&self.root)
            .map_err(|e| BridgeError::Remote(format!("engine failed to start: {e}")))?;

        let token = if self.fail_at == Some(SetupStep::Handshake) {
            AuthToken::generate()
        } else {
            token.clone()
        };
        let server = BridgeServer::new(Arc::new(engine), self.root.display().to_string())
            .with_token(Some(token));
        let (stop, shutdown) = watch::channel(false);
        *lock(&self.server_stop) = Some(stop);
        tokio::spawn(async move { server.serve(listener, shutdown).await });

        Ok(RemoteServer {
            pid: None,
            port,
            log_path: None,
        })
    }

    async fn stop_server(&self, _server: &RemoteServer) -> BridgeResult<()> {
        self.record("stop_server");
        if let Some(stop) = lock(&self.server_stop).take() {
            let _ = stop.send(true);
        }
        Ok(())
    }

    async fn open_tunnel(&self, local_port: u16, remote_port: u16) -> BridgeResult<Box<dyn Tunnel>> {
        self.record("open_tunnel");
        self.injected(SetupStep::OpenTunnel)?;
        if local_port != self.local_port {
            return Err(BridgeError::Remote(format!(
                "expected local port {}, got {local_port}",
                self.local_port
            )));
        }
        let listener = lock(&self.local)
            .take()
            .ok_or_else(|| BridgeError::Remote("tunnel already open".into()))?;

        let task = if self.fail_at == Some(SetupStep::WaitForPort) {
            drop(listener);
            tokio::spawn(async {})
        } else {
            tokio::spawn(forward(listener, remote_port))
        };
        *lock(&self.tunnel) = Some(task.abort_handle());

        Ok(Box::new(ForwardTunnel {
            task,
            events: Arc::clone(&self.events),
        }))
    }
}

/// Accept on `listener` and pipe each connection to `remote_port`.
///
/// Dropping the task drops the listener and every piped connection.
async fn forward(listener: TcpListener, remote_port: u16) {
    let mut pipes = JoinSet::new();
    loop {
        while pipes.try_join_next().is_some() {}
        let Ok((mut inbound, _)) = listener.accept().await else {
            return;
        };
        pipes.spawn(async move {
            match TcpStream::connect(("127.0.0.1", remote_port)).await {
                Ok(mut outbound) => {
                    let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                },
                Err(e) => debug!(error = %e, "Forward target unavailable"),
            }
        });
    }
}

/// The forwarding task, viewed as a tunnel.
struct ForwardTunnel {
    task: JoinHandle<()>,
    events: Shared<Vec<String>>,
}

#[async_trait]
impl Tunnel for ForwardTunnel {
    fn is_alive(&mut self) -> bool {
        !self.task.is_finished()
    }

    async fn close(&mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        lock(&self.events).push("close_tunnel".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TempProject;

    #[tokio::test]
    async fn test_ports_are_distinct_and_bound() {
        let project = TempProject::new();
        let launcher = LocalLauncher::new(project.root()).await;
        assert_ne!(launcher.local_port(), launcher.remote_port());
        assert!(TcpListener::bind(("127.0.0.1", launcher.local_port())).await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let project = TempProject::new();
        let launcher = LocalLauncher::new(project.root())
            .await
            .failing_at(SetupStep::Install);
        assert!(launcher.ensure_installed().await.is_err());
        assert_eq!(launcher.events(), ["ensure_installed"]);
    }
}
