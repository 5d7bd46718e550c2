//! Bridge error types.

use std::fmt;

use enclave_core::EngineError;
use thiserror::Error;

/// A step of bridge session setup, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    /// Verify or install the engine on the remote host.
    Install,
    /// Start the remote bridge server.
    StartServer,
    /// Open the tunnel from the local port to the remote port.
    OpenTunnel,
    /// Wait for the local end of the tunnel to accept connections.
    WaitForPort,
    /// Authenticate with the remote bridge server.
    Handshake,
    /// Point the client configuration at the bridge.
    PatchClientConfig,
}

impl SetupStep {
    /// Stable name used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::StartServer => "start_server",
            Self::OpenTunnel => "open_tunnel",
            Self::WaitForPort => "wait_for_port",
            Self::Handshake => "handshake",
            Self::PatchClientConfig => "patch_client_config",
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Socket or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame exceeded the size cap.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Announced frame length.
        len: usize,
        /// Configured cap.
        max: usize,
    },

    /// A frame could not be encoded or decoded.
    #[error("malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    /// The peer sent a frame that is not valid at this point.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The server refused the handshake.
    #[error("handshake rejected: {0}")]
    Rejected(String),

    /// The connection is gone.
    #[error("bridge disconnected: {0}")]
    Disconnected(String),

    /// A remote command failed.
    #[error("remote command failed: {0}")]
    Remote(String),

    /// Session setup failed and was rolled back.
    #[error("setup failed during {step}: {reason}")]
    Setup {
        /// Step that failed.
        step: SetupStep,
        /// Underlying failure.
        reason: String,
    },

    /// The client configuration file could not be patched or restored.
    #[error("client config {path}: {message}")]
    ClientConfig {
        /// Path to the client configuration.
        path: String,
        /// What went wrong.
        message: String,
    },
}

impl BridgeError {
    /// Wrap this error as a failure of `step`.
    #[must_use]
    pub fn at(self, step: SetupStep) -> Self {
        match self {
            Self::Setup { .. } => self,
            other => Self::Setup {
                step,
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<BridgeError> for EngineError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Setup { step, reason } => Self::RemoteSetupFailed {
                step: step.to_string(),
                reason,
            },
            other => Self::BridgeDisconnected {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::ErrorKind;

    #[test]
    fn test_setup_error_names_step() {
        let err = BridgeError::Remote("ssh: connect refused".into()).at(SetupStep::OpenTunnel);
        assert_eq!(
            err.to_string(),
            "setup failed during open_tunnel: remote command failed: ssh: connect refused"
        );
        let engine: EngineError = err.into();
        assert_eq!(engine.kind(), ErrorKind::RemoteSetupFailed);
    }

    #[test]
    fn test_at_keeps_first_step() {
        let err = BridgeError::Setup {
            step: SetupStep::Install,
            reason: "missing".into(),
        }
        .at(SetupStep::Handshake);
        assert!(matches!(err, BridgeError::Setup { step: SetupStep::Install, .. }));
    }

    #[test]
    fn test_transport_errors_are_disconnects() {
        let engine: EngineError = BridgeError::Disconnected("eof".into()).into();
        assert_eq!(engine.kind(), ErrorKind::BridgeDisconnected);
    }
}
