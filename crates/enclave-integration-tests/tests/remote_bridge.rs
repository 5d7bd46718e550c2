//! Integration tests for remote sessions over an in-process launcher.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{kind, read, run, ticket, write};
use enclave_bridge::{
    BridgeError, BridgeSession, ClientConfigTarget, RemoteLauncher, SessionOptions, SessionState,
    SetupStep,
};
use enclave_core::{EngineError, ErrorKind, Operation};
use enclave_test::{LocalLauncher, TempProject, confirm, init_test_logging};
use serde_json::json;
use tokio::net::TcpStream;

fn options(launcher: &LocalLauncher) -> SessionOptions {
    SessionOptions::new(launcher.local_port(), launcher.remote_port())
        .with_connect_timeout(Duration::from_secs(5))
        .with_heartbeat(Duration::from_millis(200))
}

async fn establish(launcher: &Arc<LocalLauncher>) -> BridgeSession {
    let dyn_launcher: Arc<dyn RemoteLauncher> = launcher.clone();
    BridgeSession::establish(dyn_launcher, options(launcher))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_remote_operations_act_on_remote_root() {
    init_test_logging();
    let remote = TempProject::new().with_file("README.md", "# remote\n");
    let launcher = Arc::new(LocalLauncher::new(remote.root()).await);
    let session = establish(&launcher).await;
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(session.client().root(), remote.root().display().to_string());

    let response = run(session.client(), read("README.md")).await;
    assert_eq!(response.output(), Some("# remote\n"));

    let preview = run(session.client(), write("notes.txt", "hello")).await;
    let ticket = ticket(&preview);
    assert!(ticket.preview.starts_with("--- /dev/null"));
    assert!(run(session.client(), confirm(&ticket)).await.output().is_some());
    assert_eq!(remote.read("notes.txt"), "hello");

    let response = run(session.client(), read("../outside.txt")).await;
    assert_eq!(kind(&response), ErrorKind::OutsideProjectRoot);

    session.close().await;
}

#[tokio::test]
async fn test_server_crash_fails_next_operation() {
    init_test_logging();
    let remote = TempProject::new();
    let launcher = Arc::new(LocalLauncher::new(remote.root()).await);
    let mut session = establish(&launcher).await;
    assert!(run(session.client(), Operation::Ping).await.output().is_some());

    launcher.crash_server();
    let reason = tokio::time::timeout(Duration::from_secs(10), session.wait())
        .await
        .unwrap();
    assert!(reason.is_some());
    assert_eq!(session.state(), SessionState::Closed);

    let response = run(session.client(), Operation::Ping).await;
    assert_eq!(kind(&response), ErrorKind::BridgeDisconnected);
    assert_eq!(
        launcher.events(),
        [
            "ensure_installed",
            "start_server",
            "open_tunnel",
            "crash_server",
            "close_tunnel",
            "stop_server"
        ]
    );
}

#[tokio::test]
async fn test_killed_tunnel_ends_session() {
    init_test_logging();
    let remote = TempProject::new();
    let launcher = Arc::new(LocalLauncher::new(remote.root()).await);
    let mut session = establish(&launcher).await;

    launcher.kill_tunnel();
    let reason = tokio::time::timeout(Duration::from_secs(10), session.wait())
        .await
        .unwrap();
    assert!(reason.is_some());

    let response = run(session.client(), read("anything.txt")).await;
    assert_eq!(kind(&response), ErrorKind::BridgeDisconnected);
}

#[tokio::test]
async fn test_close_releases_local_port() {
    init_test_logging();
    let remote = TempProject::new();
    let launcher = Arc::new(LocalLauncher::new(remote.root()).await);
    let session = establish(&launcher).await;
    let addr = session.local_addr();
    assert!(TcpStream::connect(addr).await.is_ok());

    let mut states = session.subscribe();
    session.close().await;
    assert_eq!(*states.borrow_and_update(), SessionState::Closed);
    assert!(TcpStream::connect(addr).await.is_err());
    assert_eq!(
        launcher.events(),
        ["ensure_installed", "start_server", "open_tunnel", "close_tunnel", "stop_server"]
    );
}

#[tokio::test]
async fn test_client_config_points_at_session_while_it_lives() {
    init_test_logging();
    let remote = TempProject::new();
    let home = tempfile::tempdir().unwrap();
    let config_path = home.path().join("client.json");
    std::fs::write(
        &config_path,
        r#"{"theme": "dark", "mcpServers": {"other": {"command": "x"}}}"#,
    )
    .unwrap();

    let launcher = Arc::new(LocalLauncher::new(remote.root()).await);
    let entry = json!({
        "command": "enclave",
        "args": ["serve", "--bridge", format!("127.0.0.1:{}", launcher.local_port())],
    });
    let dyn_launcher: Arc<dyn RemoteLauncher> = launcher.clone();
    let session = BridgeSession::establish(
        dyn_launcher,
        options(&launcher).with_client_config(Some(ClientConfigTarget {
            path: config_path.clone(),
            server_name: "enclave".into(),
            entry: entry.clone(),
        })),
    )
    .await
    .unwrap();

    let patched: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(patched["mcpServers"]["enclave"], entry);
    assert_eq!(patched["mcpServers"]["other"]["command"], "x");
    assert_eq!(patched["theme"], "dark");

    session.close().await;

    let restored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    assert!(restored["mcpServers"].get("enclave").is_none());
    assert_eq!(restored["mcpServers"]["other"]["command"], "x");
}

async fn failed_setup(step: SetupStep) -> (BridgeError, Vec<String>, u16) {
    init_test_logging();
    let remote = TempProject::new();
    let launcher = Arc::new(LocalLauncher::new(remote.root()).await.failing_at(step));
    let local_port = launcher.local_port();
    let dyn_launcher: Arc<dyn RemoteLauncher> = launcher.clone();
    let err = match BridgeSession::establish(dyn_launcher, options(&launcher)).await {
        Ok(_) => panic!("setup at {step} should fail"),
        Err(e) => e,
    };
    (err, launcher.events(), local_port)
}

#[tokio::test]
async fn test_install_failure_reports_step() {
    let (err, events, _) = failed_setup(SetupStep::Install).await;
    assert!(matches!(
        err,
        BridgeError::Setup {
            step: SetupStep::Install,
            ..
        }
    ));
    assert_eq!(events, ["ensure_installed"]);

    let engine_error: EngineError = err.into();
    assert_eq!(engine_error.kind(), ErrorKind::RemoteSetupFailed);
}

#[tokio::test]
async fn test_tunnel_failure_stops_server() {
    let (err, events, _) = failed_setup(SetupStep::OpenTunnel).await;
    assert!(matches!(
        err,
        BridgeError::Setup {
            step: SetupStep::OpenTunnel,
            ..
        }
    ));
    assert_eq!(
        events,
        ["ensure_installed", "start_server", "open_tunnel", "stop_server"]
    );
}

#[tokio::test]
async fn test_dead_tunnel_rolls_back() {
    let (err, events, local_port) = failed_setup(SetupStep::WaitForPort).await;
    assert!(matches!(
        err,
        BridgeError::Setup {
            step: SetupStep::WaitForPort,
            ..
        }
    ));
    assert_eq!(
        events,
        ["ensure_installed", "start_server", "open_tunnel", "close_tunnel", "stop_server"]
    );
    assert!(TcpStream::connect(("127.0.0.1", local_port)).await.is_err());
}

#[tokio::test]
async fn test_rejected_handshake_rolls_back() {
    let (err, events, _) = failed_setup(SetupStep::Handshake).await;
    assert!(matches!(
        err,
        BridgeError::Setup {
            step: SetupStep::Handshake,
            ..
        }
    ));
    assert_eq!(
        events,
        ["ensure_installed", "start_server", "open_tunnel", "close_tunnel", "stop_server"]
    );
}
