//! Process exit codes.

use enclave_bridge::BridgeError;
use enclave_config::ConfigError;
use enclave_policy::PolicyError;
use enclave_tools::SetupError;

/// Setup could not complete: bad configuration, unusable root or policy, or
/// a failed remote session setup.
pub(crate) const SETUP_FAILURE: u8 = 2;
/// Anything else.
pub(crate) const FAILURE: u8 = 1;

/// Exit code for an error that ended the process.
pub(crate) fn code_for(err: &anyhow::Error) -> u8 {
    let setup = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<BridgeError>(),
            Some(BridgeError::Setup { .. })
        ) || cause.is::<ConfigError>()
            || cause.is::<SetupError>()
            || cause.is::<PolicyError>()
    });
    if setup { SETUP_FAILURE } else { FAILURE }
}
