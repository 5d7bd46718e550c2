//! `enclave connect`: bridge a remote project over SSH until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use enclave_bridge::{BridgeSession, SshLauncher, TOKEN_ENV};
use enclave_config::Config;

use super::shutdown_signal;
use crate::config_bridge;
use crate::theme::Theme;

/// Command-line overrides for `connect`.
#[derive(Debug, Default)]
pub(crate) struct ConnectArgs {
    pub(crate) host: Option<String>,
    pub(crate) remote_root: String,
    pub(crate) local_port: Option<u16>,
    pub(crate) remote_port: Option<u16>,
    pub(crate) identity: Option<PathBuf>,
    pub(crate) install_command: Option<String>,
    pub(crate) client_config: Option<String>,
}

/// How the session ended.
enum Ending {
    Interrupted,
    Lost(Option<String>),
}

/// Establish the session, hold it open, and tear it down on exit.
pub(crate) async fn run(config: &Config, args: ConnectArgs) -> Result<()> {
    let mut config = config.clone();
    let bridge = &mut config.bridge;
    if let Some(port) = args.local_port {
        bridge.local_port = port;
    }
    if let Some(port) = args.remote_port {
        bridge.remote_port = port;
    }
    if args.client_config.is_some() {
        bridge.client_config = args.client_config;
    }
    let host = args
        .host
        .or_else(|| bridge.host.clone())
        .context("no host given and bridge.host is not configured")?;

    let launcher = SshLauncher::new(host.clone(), args.remote_root.clone())
        .with_remote_binary(bridge.remote_binary.clone())
        .with_install_command(args.install_command.or_else(|| bridge.install_command.clone()))
        .with_identity_file(
            args.identity
                .or_else(|| bridge.identity_file.as_ref().map(PathBuf::from)),
        )
        .with_connect_timeout(Duration::from_secs(bridge.connect_timeout_secs));

    let program = std::env::current_exe()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "enclave".to_string());
    let options = config_bridge::to_session_options(&config, &program);
    let token = options.token.clone();
    let patched = options.client_config.as_ref().map(|t| t.path.clone());

    eprintln!("{}", Theme::info(&format!("Connecting to {host}...")));
    let mut session = BridgeSession::establish(Arc::new(launcher), options)
        .await
        .with_context(|| format!("bridge session to {host} failed"))?;

    println!(
        "{}",
        Theme::success(&format!(
            "Bridged {host}:{} to {} [{}]",
            session.client().root(),
            session.local_addr(),
            Theme::state(&session.state())
        ))
    );
    match patched {
        Some(path) => println!(
            "{}",
            Theme::info(&format!("Client config {} points at the bridge", path.display()))
        ),
        None => println!(
            "{}",
            Theme::dimmed(&format!(
                "{TOKEN_ENV}={} {program} serve --bridge {}",
                token.expose(),
                session.local_addr()
            ))
        ),
    }
    println!("{}", Theme::dimmed("Press Ctrl+C to disconnect."));

    let ending = tokio::select! {
        () = shutdown_signal() => Ending::Interrupted,
        reason = session.wait() => Ending::Lost(reason),
    };

    match ending {
        Ending::Interrupted => {
            eprintln!("\n{}", Theme::warning("Tearing down bridge..."));
            session.close().await;
            eprintln!("{}", Theme::success("Bridge closed"));
            Ok(())
        },
        Ending::Lost(reason) => {
            eprintln!("{}", Theme::state(&session.state()));
            bail!(
                "bridge session lost: {}",
                reason.as_deref().unwrap_or("closed")
            )
        },
    }
}
