//! Engine setup errors.

use enclave_policy::PolicyError;
use enclave_workspace::PathError;

/// Errors raised while assembling an engine session.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The project root is unusable.
    #[error("invalid project root: {0}")]
    Root(#[from] PathError),

    /// The policy tables failed to load.
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
}
