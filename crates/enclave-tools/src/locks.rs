//! Per-resource locks.
//!
//! Each path (or the repository, for git) has its own async mutex, so
//! unrelated files never serialize behind each other. A request that cannot
//! take a lock within the busy wait fails with a retryable `Busy`.

use dashmap::DashMap;
use enclave_core::{EngineError, EngineResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Lock key for git invocations.
pub(crate) const GIT_RESOURCE: &str = "<git>";

/// Lock table keyed by resource name.
#[derive(Debug)]
pub(crate) struct ResourceLocks {
    entries: DashMap<String, Arc<Mutex<()>>>,
    wait: Duration,
}

/// Holds every lock taken by one request until dropped.
#[derive(Debug)]
pub(crate) struct ResourceGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ResourceLocks {
    pub(crate) fn new(wait: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            wait,
        }
    }

    /// Lock every resource, in sorted order so two multi-path requests
    /// cannot deadlock.
    pub(crate) async fn acquire(&self, resources: &[String]) -> EngineResult<ResourceGuard> {
        self.prune();

        let mut keys: Vec<&String> = resources.iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let mutex = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let guard = tokio::time::timeout(self.wait, mutex.lock_owned())
                .await
                .map_err(|_| {
                    debug!(resource = %key, "Lock wait elapsed");
                    EngineError::Busy {
                        resource: key.clone(),
                    }
                })?;
            guards.push(guard);
        }
        Ok(ResourceGuard { _guards: guards })
    }

    /// Drop entries nobody holds.
    fn prune(&self) {
        self.entries.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
