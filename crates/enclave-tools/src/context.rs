//! The explicit session context every handler receives.

use enclave_approval::ConfirmationStore;
use enclave_core::{EngineError, EngineResult};
use enclave_edit::EditEngine;
use enclave_policy::PolicySet;
use enclave_workspace::{AccessMode, PathGuard};
use std::path::Path;

use crate::cancel::InFlight;
use crate::limits::EngineLimits;
use crate::locks::ResourceLocks;
use crate::pending::{FileTarget, Parked};

/// Everything one engine session owns: the project root (through its
/// guard), the policy tables, the confirmation store, and the lock table.
#[derive(Debug)]
pub struct SessionContext {
    pub(crate) guard: PathGuard,
    pub(crate) policy: PolicySet,
    pub(crate) limits: EngineLimits,
    pub(crate) confirmations: ConfirmationStore<Parked, String>,
    pub(crate) locks: ResourceLocks,
    pub(crate) in_flight: InFlight,
    pub(crate) edits: EditEngine,
}

impl SessionContext {
    pub(crate) fn new(guard: PathGuard, policy: PolicySet, limits: EngineLimits) -> Self {
        Self {
            confirmations: ConfirmationStore::new(limits.confirmation_ttl),
            locks: ResourceLocks::new(limits.busy_wait),
            in_flight: InFlight::default(),
            edits: EditEngine::new(),
            guard,
            policy,
            limits,
        }
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// Limits in force.
    #[must_use]
    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// Policy tables in force.
    #[must_use]
    pub fn policy(&self) -> &PolicySet {
        &self.policy
    }

    /// Number of previews waiting for confirmation.
    #[must_use]
    pub fn pending_confirmations(&self) -> usize {
        self.confirmations.pending_count()
    }

    /// Number of requests currently being handled.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Resolve a caller path through the guard.
    pub(crate) fn target(&self, requested: &str, mode: AccessMode) -> EngineResult<FileTarget> {
        let path = self.guard.resolve(requested, mode)?;
        let display = self.guard.relative(&path);
        Ok(FileTarget {
            requested: requested.to_string(),
            path,
            display,
        })
    }
}

/// Read a file that may not exist.
pub(crate) async fn read_optional(target: &FileTarget) -> EngineResult<Option<Vec<u8>>> {
    match tokio::fs::read(&target.path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EngineError::io(&target.display, &e)),
    }
}

#[cfg(test)]
pub(crate) fn test_context(root: &Path) -> SessionContext {
    let guard = PathGuard::new(root).unwrap();
    let policy = PolicySet::builtin().unwrap();
    let limits = EngineLimits::default().with_busy_wait(std::time::Duration::from_millis(100));
    SessionContext::new(guard, policy, limits)
}
