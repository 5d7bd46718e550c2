//! Token store for pending confirmations.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConfirmError, ConfirmResult};

/// Why a token can no longer be redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    /// A newer preview for the same target replaced it.
    Superseded,
    /// Its time-to-live elapsed.
    TimedOut,
    /// A confirm with the wrong fingerprint invalidated it.
    Invalidated,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superseded => f.write_str("superseded by a newer preview"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Invalidated => f.write_str("invalidated by a mismatched confirmation"),
        }
    }
}

/// A previewed operation waiting for confirmation.
#[derive(Debug, Clone)]
pub struct Pending<Op, P> {
    /// Single-use token.
    pub token: String,
    /// Path or command the token is scoped to.
    pub target: String,
    /// The operation to dispatch on confirm.
    pub operation: Op,
    /// Preview artifact shown to the caller.
    pub preview: P,
    /// Fingerprint the caller must restate.
    pub fingerprint: String,
    /// When the preview was computed.
    pub created_at: DateTime<Utc>,
    /// When the token stops being redeemable.
    pub expires_at: DateTime<Utc>,
}

/// What the caller receives from [`ConfirmationStore::propose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// Single-use token.
    pub token: String,
    /// Fingerprint to restate on confirm.
    pub fingerprint: String,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Entry<Op, P> {
    Pending(Pending<Op, P>),
    Expired {
        reason: ExpiryReason,
        at: DateTime<Utc>,
    },
}

/// Concurrent store of pending confirmations, generic over the operation
/// type and the preview artifact type.
///
/// Both maps are sharded ([`DashMap`]), so previews and confirms for
/// unrelated targets never contend on a single lock. Expired tokens are kept
/// as tombstones for a retention window so a late confirm reports
/// `TokenExpired` rather than `UnknownToken`.
pub struct ConfirmationStore<Op, P> {
    tokens: DashMap<String, Entry<Op, P>>,
    /// Current token per target.
    targets: DashMap<String, String>,
    ttl: TimeDelta,
    retention: TimeDelta,
}

impl<Op, P> fmt::Debug for ConfirmationStore<Op, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationStore")
            .field("entries", &self.tokens.len())
            .field("targets", &self.targets.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<Op, P> ConfirmationStore<Op, P>
where
    Op: Clone + Send + Sync,
    P: Clone + Send + Sync,
{
    /// Create a store whose tokens live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Self {
            tokens: DashMap::new(),
            targets: DashMap::new(),
            ttl,
            retention: ttl,
        }
    }

    /// Override how long tombstones are kept after expiry.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        self
    }

    /// Park an operation and issue a token for it.
    ///
    /// Any earlier pending token for the same target is superseded.
    pub fn propose(
        &self,
        target: impl Into<String>,
        operation: Op,
        preview: P,
        fingerprint: impl Into<String>,
    ) -> Proposal {
        let target = target.into();
        let fingerprint = fingerprint.into();
        let token = Uuid::new_v4().simple().to_string();
        let created_at = Utc::now();
        let expires_at = created_at
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.prune(created_at);

        self.tokens.insert(
            token.clone(),
            Entry::Pending(Pending {
                token: token.clone(),
                target: target.clone(),
                operation,
                preview,
                fingerprint: fingerprint.clone(),
                created_at,
                expires_at,
            }),
        );

        if let Some(previous) = self.targets.insert(target.clone(), token.clone()) {
            self.expire(&previous, ExpiryReason::Superseded, created_at);
            debug!(target = %target, superseded = %previous, "Superseded pending confirmation");
        }

        debug!(target = %target, token = %token, "Issued confirmation token");
        Proposal {
            token,
            fingerprint,
            expires_at,
        }
    }

    /// Redeem a token, consuming it.
    ///
    /// Exactly one concurrent caller can succeed for a given token.
    ///
    /// # Errors
    ///
    /// - [`ConfirmError::UnknownToken`] if never issued or already consumed
    /// - [`ConfirmError::TokenExpired`] if superseded, timed out, or invalidated
    /// - [`ConfirmError::FingerprintMismatch`] if `fingerprint` differs; the
    ///   token is invalidated so the caller must preview again
    pub fn redeem(&self, token: &str, fingerprint: &str) -> ConfirmResult<Pending<Op, P>> {
        let now = Utc::now();

        let removed = self.tokens.remove_if(token, |_, entry| {
            matches!(entry, Entry::Pending(p) if p.fingerprint == fingerprint && now <= p.expires_at)
        });
        if let Some((_, Entry::Pending(pending))) = removed {
            self.targets.remove_if(&pending.target, |_, current| current == token);
            info!(target = %pending.target, token = %token, "Confirmation redeemed");
            return Ok(pending);
        }

        let Some(mut entry) = self.tokens.get_mut(token) else {
            return Err(ConfirmError::UnknownToken {
                token: token.to_string(),
            });
        };

        let (target, timed_out) = match &*entry {
            Entry::Expired { reason, .. } => {
                return Err(ConfirmError::TokenExpired {
                    token: token.to_string(),
                    reason: *reason,
                });
            },
            Entry::Pending(pending) => (pending.target.clone(), now > pending.expires_at),
        };

        let reason = if timed_out {
            ExpiryReason::TimedOut
        } else {
            ExpiryReason::Invalidated
        };
        *entry = Entry::Expired { reason, at: now };
        drop(entry);
        self.targets.remove_if(&target, |_, current| current == token);

        if timed_out {
            return Err(ConfirmError::TokenExpired {
                token: token.to_string(),
                reason,
            });
        }
        info!(target = %target, token = %token, "Confirmation fingerprint mismatch");
        Err(ConfirmError::FingerprintMismatch { target })
    }

    /// Look at a pending confirmation without consuming it.
    #[must_use]
    pub fn peek(&self, token: &str) -> Option<Pending<Op, P>> {
        match self.tokens.get(token).as_deref() {
            Some(Entry::Pending(pending)) => Some(pending.clone()),
            _ => None,
        }
    }

    /// Current pending token for a target.
    #[must_use]
    pub fn token_for(&self, target: &str) -> Option<String> {
        self.targets.get(target).map(|t| t.value().clone())
    }

    /// Number of redeemable tokens.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|e| matches!(e.value(), Entry::Pending(_)))
            .count()
    }

    fn expire(&self, token: &str, reason: ExpiryReason, at: DateTime<Utc>) {
        if let Some(mut entry) = self.tokens.get_mut(token)
            && matches!(&*entry, Entry::Pending(_))
        {
            *entry = Entry::Expired { reason, at };
        }
    }

    /// Drop tombstones and stale entries older than the retention window.
    fn prune(&self, now: DateTime<Utc>) {
        let horizon = now
            .checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.tokens.retain(|_, entry| match entry {
            Entry::Expired { at, .. } => *at > horizon,
            Entry::Pending(p) => p.expires_at > horizon,
        });
        self.targets.retain(|_, token| {
            matches!(self.tokens.get(token.as_str()).as_deref(), Some(Entry::Pending(_)))
        });
    }
}
