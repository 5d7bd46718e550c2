//! Shared-secret authentication for bridge connections.

use std::fmt;

use subtle::ConstantTimeEq;

/// Environment variable carrying the session token.
pub const TOKEN_ENV: &str = "ENCLAVE_BRIDGE_TOKEN";

/// A shared session token.
///
/// Never printed; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap an existing secret. Empty secrets are treated as absent.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        (!secret.trim().is_empty()).then_some(Self(secret))
    }

    /// Generate a fresh random token for one session.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Read the token from [`TOKEN_ENV`].
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV).ok().and_then(Self::new)
    }

    /// The secret, for handing to a child process or a handshake.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Compare a presented token in constant time.
    #[must_use]
    pub fn verify(&self, presented: Option<&str>) -> bool {
        presented.is_some_and(|p| bool::from(self.0.as_bytes().ct_eq(p.as_bytes())))
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let token = AuthToken::new("s3cret").unwrap();
        assert!(token.verify(Some("s3cret")));
        assert!(!token.verify(Some("s3cre")));
        assert!(!token.verify(Some("s3cret!")));
        assert!(!token.verify(None));
    }

    #[test]
    fn test_empty_is_absent() {
        assert!(AuthToken::new("  ").is_none());
    }

    #[test]
    fn test_debug_redacted() {
        let token = AuthToken::generate();
        assert_eq!(token.expose().len(), 64);
        assert!(!format!("{token:?}").contains(token.expose()));
    }
}
