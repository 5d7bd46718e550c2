//! Enclave Bridge - Run the operation engine on another machine.
//!
//! The bridge has two halves that speak the same length-prefixed JSON frames
//! ([`frame`]):
//!
//! - [`BridgeServer`] runs next to the remote project and hands every request
//!   to a local engine.
//! - [`BridgeClient`] runs next to the caller and implements
//!   [`OperationService`](enclave_core::OperationService) by relaying, so a
//!   front end cannot tell it apart from an in-process engine.
//!
//! [`BridgeSession`] ties them together over a tunnel: it installs and starts
//! the remote server through a [`RemoteLauncher`] (normally [`SshLauncher`]),
//! opens the tunnel, authenticates, optionally points a client configuration
//! at the bridge, and undoes all of it on teardown or failed setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use enclave_bridge::{BridgeSession, SessionOptions, SshLauncher};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = Arc::new(SshLauncher::new("dev@build-box", "/srv/project"));
//! let session = BridgeSession::establish(launcher, SessionOptions::new(3000, 5000)).await?;
//!
//! println!("serving {} via {}", session.client().root(), session.local_addr());
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod auth;
pub mod client_config;
pub mod error;
pub mod frame;
pub mod launcher;

mod client;
mod server;
mod session;
mod ssh;

pub use auth::{AuthToken, TOKEN_ENV};
pub use client::{BridgeClient, ClientOptions};
pub use client_config::ClientConfigPatch;
pub use error::{BridgeError, BridgeResult, SetupStep};
pub use frame::{BRIDGE_VERSION, Frame, MAX_FRAME_LEN};
pub use launcher::{RemoteLauncher, RemoteServer, Tunnel};
pub use server::{BridgeServer, DEFAULT_HANDSHAKE_TIMEOUT};
pub use session::{BridgeSession, ClientConfigTarget, SessionOptions, SessionState};
pub use ssh::SshLauncher;
