//! Bridge session lifecycle: ordered setup with rollback, then background
//! supervision until teardown.
//!
//! A session moves through `Connecting → Active → Disconnected → Closed`.
//! Setup runs the [`SetupStep`]s in order; if any fails, everything already
//! done is undone in reverse and the error names the failed step. Once
//! active, a supervisor task watches the relay link and the tunnel. When
//! either drops, or [`BridgeSession::close`] is called, the supervisor
//! restores the client configuration, closes the tunnel and stops the remote
//! server.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthToken;
use crate::client::{BridgeClient, ClientOptions};
use crate::client_config::ClientConfigPatch;
use crate::error::{BridgeError, BridgeResult, SetupStep};
use crate::launcher::{RemoteLauncher, RemoteServer, Tunnel};

/// How often the supervisor checks the tunnel.
const TUNNEL_POLL: Duration = Duration::from_millis(250);
/// Delay between attempts while waiting for the port or the handshake.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Where a bridge session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Setup steps are running.
    Connecting,
    /// The relay is up and requests flow to the remote engine.
    Active,
    /// The link or tunnel dropped; teardown is under way.
    Disconnected {
        /// Why the link dropped.
        reason: String,
    },
    /// Everything has been torn down.
    Closed,
}

/// A client configuration entry installed for the life of the session.
#[derive(Debug, Clone)]
pub struct ClientConfigTarget {
    /// Path to the client's JSON configuration.
    pub path: PathBuf,
    /// Key under `mcpServers`.
    pub server_name: String,
    /// Entry pointing the client at the bridge.
    pub entry: Value,
}

/// Parameters for [`BridgeSession::establish`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Local end of the tunnel.
    pub local_port: u16,
    /// Port the remote server binds on the remote loopback.
    pub remote_port: u16,
    /// Token shared by the remote server and every relay client.
    pub token: AuthToken,
    /// Relay heartbeat interval.
    pub heartbeat: Duration,
    /// Deadline for the tunnel port to open and for the handshake to succeed.
    pub connect_timeout: Duration,
    /// Client configuration to patch while the session is active.
    pub client_config: Option<ClientConfigTarget>,
}

impl SessionOptions {
    /// Options for the given port pair with a fresh token.
    #[must_use]
    pub fn new(local_port: u16, remote_port: u16) -> Self {
        Self {
            local_port,
            remote_port,
            token: AuthToken::generate(),
            heartbeat: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            client_config: None,
        }
    }

    /// Use this token instead of a generated one.
    #[must_use]
    pub fn with_token(mut self, token: AuthToken) -> Self {
        self.token = token;
        self
    }

    /// Set the relay heartbeat interval.
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Set the readiness deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Patch this client configuration while the session is active.
    #[must_use]
    pub fn with_client_config(mut self, target: Option<ClientConfigTarget>) -> Self {
        self.client_config = target;
        self
    }

    fn client_options(&self) -> ClientOptions {
        ClientOptions::default()
            .with_token(Some(self.token.clone()))
            .with_heartbeat(self.heartbeat)
            .with_connect_timeout(self.connect_timeout)
    }
}

/// Everything setup has created so far, undone in reverse order.
#[derive(Default)]
struct Teardown {
    server: Option<RemoteServer>,
    tunnel: Option<Box<dyn Tunnel>>,
    patch: Option<ClientConfigPatch>,
}

impl Teardown {
    async fn run(&mut self, launcher: &dyn RemoteLauncher) {
        if let Some(patch) = self.patch.take() {
            let path = patch.path().display().to_string();
            if let Err(e) = patch.restore() {
                warn!(%path, error = %e, "Failed to restore client config");
            }
        }
        if let Some(mut tunnel) = self.tunnel.take() {
            tunnel.close().await;
            debug!("Tunnel closed");
        }
        if let Some(server) = self.server.take()
            && let Err(e) = launcher.stop_server(&server).await
        {
            warn!(pid = ?server.pid, error = %e, "Failed to stop remote bridge server");
        }
    }
}

/// A live bridge to a remote engine.
///
/// Dropping the session without calling [`close`](Self::close) still starts
/// teardown in the background.
pub struct BridgeSession {
    host: String,
    local_port: u16,
    client: BridgeClient,
    state: watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    supervisor: Option<JoinHandle<Option<String>>>,
    outcome: Option<Option<String>>,
}

impl std::fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("host", &self.host)
            .field("local_port", &self.local_port)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl BridgeSession {
    /// Run every setup step and start supervising the result.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Setup`] naming the step that failed. Anything
    /// set up before the failure has been rolled back.
    pub async fn establish(
        launcher: Arc<dyn RemoteLauncher>,
        options: SessionOptions,
    ) -> BridgeResult<Self> {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self::establish_observed(launcher, options, state).await
    }

    /// Like [`establish`](Self::establish), publishing state changes on
    /// `state` from the start of setup.
    ///
    /// # Errors
    ///
    /// Same as [`establish`](Self::establish).
    pub async fn establish_observed(
        launcher: Arc<dyn RemoteLauncher>,
        options: SessionOptions,
        state: watch::Sender<SessionState>,
    ) -> BridgeResult<Self> {
        let host = launcher.host().to_string();
        state.send_replace(SessionState::Connecting);
        info!(
            %host,
            local_port = options.local_port,
            remote_port = options.remote_port,
            "Establishing bridge session"
        );

        let mut teardown = Teardown::default();
        let client = match setup(&*launcher, &options, &mut teardown).await {
            Ok(client) => client,
            Err(e) => {
                warn!(%host, error = %e, "Bridge setup failed, rolling back");
                teardown.run(&*launcher).await;
                state.send_replace(SessionState::Closed);
                return Err(e);
            },
        };

        state.send_replace(SessionState::Active);
        info!(%host, root = client.root(), "Bridge session active");

        let shutdown = CancellationToken::new();
        let receiver = state.subscribe();
        let supervisor = tokio::spawn(supervise(
            launcher,
            client.clone(),
            teardown,
            state,
            shutdown.clone(),
        ));

        Ok(Self {
            host,
            local_port: options.local_port,
            client,
            state: receiver,
            shutdown,
            supervisor: Some(supervisor),
            outcome: None,
        })
    }

    /// Relay to the remote engine. Fails every request with
    /// `BridgeDisconnected` once the session is down.
    #[must_use]
    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    /// Remote host identity.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Local end of the tunnel.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.local_port))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait for the session to end on its own and tear down.
    ///
    /// Returns the disconnect reason, or `None` if the session was closed on
    /// request.
    pub async fn wait(&mut self) -> Option<String> {
        if let Some(handle) = self.supervisor.take() {
            let outcome = match handle.await {
                Ok(reason) => reason,
                Err(e) => Some(format!("supervisor failed: {e}")),
            };
            self.outcome = Some(outcome);
        }
        self.outcome.clone().flatten()
    }

    /// Tear the session down and wait until teardown finishes.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        let _ = self.wait().await;
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Run the setup steps in order, recording what needs undoing.
async fn setup(
    launcher: &dyn RemoteLauncher,
    options: &SessionOptions,
    teardown: &mut Teardown,
) -> BridgeResult<BridgeClient> {
    let deadline_after = |timeout: Duration| Instant::now().checked_add(timeout);

    debug!(step = %SetupStep::Install, "Bridge setup");
    launcher
        .ensure_installed()
        .await
        .map_err(|e| e.at(SetupStep::Install))?;

    debug!(step = %SetupStep::StartServer, "Bridge setup");
    let server = launcher
        .start_server(options.remote_port, &options.token)
        .await
        .map_err(|e| e.at(SetupStep::StartServer))?;
    teardown.server = Some(server);

    debug!(step = %SetupStep::OpenTunnel, "Bridge setup");
    let tunnel = teardown.tunnel.insert(
        launcher
            .open_tunnel(options.local_port, options.remote_port)
            .await
            .map_err(|e| e.at(SetupStep::OpenTunnel))?,
    );

    debug!(step = %SetupStep::WaitForPort, "Bridge setup");
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, options.local_port));
    wait_for_port(addr, &mut **tunnel, deadline_after(options.connect_timeout))
        .await
        .map_err(|e| e.at(SetupStep::WaitForPort))?;

    debug!(step = %SetupStep::Handshake, "Bridge setup");
    let client = handshake(
        addr,
        options.client_options(),
        &mut **tunnel,
        deadline_after(options.connect_timeout),
    )
    .await
    .map_err(|e| e.at(SetupStep::Handshake))?;

    if let Some(target) = &options.client_config {
        debug!(step = %SetupStep::PatchClientConfig, "Bridge setup");
        let patch = ClientConfigPatch::apply(&target.path, &target.server_name, target.entry.clone())
            .map_err(|e| e.at(SetupStep::PatchClientConfig))?;
        teardown.patch = Some(patch);
    }

    Ok(client)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

async fn wait_for_port(
    addr: SocketAddr,
    tunnel: &mut dyn Tunnel,
    deadline: Option<Instant>,
) -> BridgeResult<()> {
    loop {
        if !tunnel.is_alive() {
            return Err(BridgeError::Remote(
                "tunnel exited before the local port opened".into(),
            ));
        }
        if TcpStream::connect(addr).await.is_ok() {
            return Ok(());
        }
        if expired(deadline) {
            return Err(BridgeError::Disconnected(format!("{addr} never accepted a connection")));
        }
        tokio::time::sleep(RETRY_DELAY).await;
    }
}

/// Connect through the tunnel, retrying while the remote server starts up.
async fn handshake(
    addr: SocketAddr,
    options: ClientOptions,
    tunnel: &mut dyn Tunnel,
    deadline: Option<Instant>,
) -> BridgeResult<BridgeClient> {
    loop {
        match BridgeClient::connect(addr, options.clone()).await {
            Ok(client) => return Ok(client),
            Err(e @ BridgeError::Rejected(_)) => return Err(e),
            Err(e) if expired(deadline) || !tunnel.is_alive() => return Err(e),
            Err(e) => {
                debug!(error = %e, "Bridge handshake not ready, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            },
        }
    }
}

/// Watch the link and tunnel, then tear everything down.
async fn supervise(
    launcher: Arc<dyn RemoteLauncher>,
    client: BridgeClient,
    mut teardown: Teardown,
    state: watch::Sender<SessionState>,
    shutdown: CancellationToken,
) -> Option<String> {
    let mut ticker = tokio::time::interval(TUNNEL_POLL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            () = shutdown.cancelled() => break None,
            reason = client.closed() => break Some(reason),
            _ = ticker.tick() => {
                if let Some(tunnel) = teardown.tunnel.as_mut()
                    && !tunnel.is_alive()
                {
                    break Some("tunnel exited".to_string());
                }
            },
        }
    };

    match &reason {
        Some(reason) => {
            warn!(host = launcher.host(), %reason, "Bridge session disconnected");
            client.close(reason);
            state.send_replace(SessionState::Disconnected {
                reason: reason.clone(),
            });
        },
        None => client.close("bridge session closed"),
    }

    teardown.run(&*launcher).await;
    state.send_replace(SessionState::Closed);
    info!(host = launcher.host(), "Bridge session closed");
    reason
}
