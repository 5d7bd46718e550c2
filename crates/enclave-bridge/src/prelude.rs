//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_bridge::prelude::*;` to import all essential types.

// Errors
pub use crate::{BridgeError, BridgeResult, SetupStep};

// Endpoints
pub use crate::{AuthToken, BridgeClient, BridgeServer, ClientOptions};

// Sessions
pub use crate::{
    BridgeSession, ClientConfigTarget, RemoteLauncher, SessionOptions, SessionState, SshLauncher,
};
