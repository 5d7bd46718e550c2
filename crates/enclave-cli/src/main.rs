//! Enclave CLI - confined project operations, locally or over a bridge.
//!
//! `enclave serve` speaks line-delimited JSON requests on stdio against an
//! engine rooted at the project directory, or relays them to a remote engine
//! with `--bridge`. `enclave connect` sets up that remote engine over SSH and
//! holds the tunnel open; `enclave bridge-server` is what it starts on the
//! other side.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
pub mod config_bridge;
mod exit;
mod stdio;
mod theme;

use commands::connect::ConnectArgs;
use commands::{bridge_server, check, connect, serve};
use theme::Theme;

/// Enclave - confined file, command and git operations for one project
#[derive(Parser)]
#[command(name = "enclave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve operation requests on stdin/stdout, one JSON object per line
    Serve {
        /// Relay to a bridge at this address instead of running locally
        #[arg(long)]
        bridge: Option<SocketAddr>,
    },

    /// Serve the engine to bridge clients (started on the remote host)
    BridgeServer {
        /// Port to listen on (defaults to bridge.remote_port)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
        bind: IpAddr,
    },

    /// Bridge a remote project over SSH until interrupted
    Connect {
        /// SSH destination (defaults to bridge.host)
        host: Option<String>,

        /// Project root on the remote host
        #[arg(long)]
        remote_root: String,

        /// Local end of the tunnel
        #[arg(long)]
        local_port: Option<u16>,

        /// Port for the remote bridge server
        #[arg(long)]
        remote_port: Option<u16>,

        /// SSH private key
        #[arg(short, long)]
        identity: Option<PathBuf>,

        /// Command that installs the engine when it is missing remotely
        #[arg(long)]
        install_command: Option<String>,

        /// Client configuration to point at the bridge while connected
        #[arg(long)]
        client_config: Option<String>,
    },

    /// Show the resolved configuration and check that the engine can start
    Check {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let root = match cli.root.clone().map_or_else(std::env::current_dir, Ok) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("cannot determine project root: {e}")));
            return ExitCode::from(exit::SETUP_FAILURE);
        },
    };

    let resolved = match enclave_config::Config::load(Some(&root)) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("configuration error: {e}")));
            return ExitCode::from(exit::SETUP_FAILURE);
        },
    };

    let mut log_config = config_bridge::to_log_config(&resolved.config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = enclave_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(cli.command, root, &resolved).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("{e:#}")));
            ExitCode::from(exit::code_for(&e))
        },
    }
}

async fn run(
    command: Commands,
    root: PathBuf,
    resolved: &enclave_config::ResolvedConfig,
) -> Result<()> {
    let config = &resolved.config;
    match command {
        Commands::Serve { bridge } => serve::run(&root, config, bridge).await,
        Commands::BridgeServer { port, bind } => {
            bridge_server::run(&root, config, port, bind).await
        },
        Commands::Connect {
            host,
            remote_root,
            local_port,
            remote_port,
            identity,
            install_command,
            client_config,
        } => {
            connect::run(
                config,
                ConnectArgs {
                    host,
                    remote_root,
                    local_port,
                    remote_port,
                    identity,
                    install_command,
                    client_config,
                },
            )
            .await
        },
        Commands::Check { format } => check::run(&root, resolved, &format),
    }
}
