//! `enclave bridge-server`: serve the engine to bridge clients over TCP.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use enclave_bridge::{AuthToken, BridgeServer, TOKEN_ENV};
use enclave_config::Config;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use super::shutdown_signal;
use crate::config_bridge;

/// Run until interrupted.
pub(crate) async fn run(root: &Path, config: &Config, port: Option<u16>, bind: IpAddr) -> Result<()> {
    let port = port.unwrap_or(config.bridge.remote_port);
    let token = AuthToken::from_env();
    if token.is_none() && !bind.is_loopback() {
        bail!("{TOKEN_ENV} must be set to listen on non-loopback address {bind}");
    }

    let engine = config_bridge::to_engine(config, root)?;
    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    let server = BridgeServer::new(Arc::new(engine.clone()), engine.root().display().to_string())
        .with_token(token);

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = stop.send(true);
    });

    server.serve(listener, shutdown).await?;
    Ok(())
}
