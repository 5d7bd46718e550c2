//! Confirmation errors.

use enclave_core::EngineError;

use crate::store::ExpiryReason;

/// Errors raised when redeeming a confirmation token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfirmError {
    /// No pending confirmation has this token (never issued, or consumed).
    #[error("unknown confirmation token: {token}")]
    UnknownToken {
        /// Token as given.
        token: String,
    },

    /// The token was superseded, timed out, or invalidated.
    #[error("confirmation token {token} expired: {reason}")]
    TokenExpired {
        /// Token as given.
        token: String,
        /// Why it expired.
        reason: ExpiryReason,
    },

    /// The restated fingerprint differs from the previewed one.
    #[error("fingerprint mismatch for {target}")]
    FingerprintMismatch {
        /// Target of the pending operation.
        target: String,
    },
}

/// Result type for confirmation operations.
pub type ConfirmResult<T> = Result<T, ConfirmError>;

impl From<ConfirmError> for EngineError {
    fn from(err: ConfirmError) -> Self {
        match err {
            ConfirmError::UnknownToken { token } => Self::UnknownToken { token },
            ConfirmError::TokenExpired { token, reason } => Self::TokenExpired {
                token,
                reason: reason.to_string(),
            },
            ConfirmError::FingerprintMismatch { target } => Self::FingerprintMismatch {
                target,
                reason: "the confirmed operation does not match the preview".to_string(),
            },
        }
    }
}
