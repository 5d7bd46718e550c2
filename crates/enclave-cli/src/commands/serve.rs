//! `enclave serve`: the stdio front end over a local engine or a bridge.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use enclave_bridge::BridgeClient;
use enclave_config::Config;
use enclave_core::OperationService;
use tracing::info;

use crate::config_bridge;
use crate::stdio;

/// Serve stdin/stdout until stdin closes.
pub(crate) async fn run(root: &Path, config: &Config, bridge: Option<SocketAddr>) -> Result<()> {
    let service: Arc<dyn OperationService> = match bridge {
        Some(addr) => {
            let client = BridgeClient::connect(addr, config_bridge::to_client_options(config))
                .await
                .with_context(|| format!("failed to reach bridge at {addr}"))?;
            info!(%addr, remote_root = client.root(), "Relaying to remote engine");
            Arc::new(client)
        },
        None => {
            let engine = config_bridge::to_engine(config, root)?;
            info!(root = %engine.root().display(), "Serving local engine");
            Arc::new(engine)
        },
    };

    stdio::serve(service, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
