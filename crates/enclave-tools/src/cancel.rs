//! Registry of in-flight requests for transport-initiated cancellation.

use dashmap::DashMap;
use enclave_core::RequestId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Slot {
    generation: u64,
    token: CancellationToken,
}

/// Cancellation tokens of requests currently being handled.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    slots: Arc<DashMap<RequestId, Slot>>,
    generation: AtomicU64,
}

/// Registration that unregisters itself when the request finishes.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    slots: Arc<DashMap<RequestId, Slot>>,
    id: RequestId,
    generation: u64,
    token: CancellationToken,
}

impl InFlightGuard {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let generation = self.generation;
        self.slots
            .remove_if(&self.id, |_, slot| slot.generation == generation);
    }
}

impl InFlight {
    /// Track a request. A reused id replaces the older registration.
    pub(crate) fn register(&self, id: &RequestId) -> InFlightGuard {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.slots.insert(
            id.clone(),
            Slot {
                generation,
                token: token.clone(),
            },
        );
        InFlightGuard {
            slots: Arc::clone(&self.slots),
            id: id.clone(),
            generation,
            token,
        }
    }

    /// Cancel a request. Returns whether it was in flight.
    pub(crate) fn cancel(&self, id: &RequestId) -> bool {
        match self.slots.get(id) {
            Some(slot) => {
                slot.token.cancel();
                true
            },
            None => false,
        }
    }

    /// Number of tracked requests.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_token() {
        let in_flight = InFlight::default();
        let id = RequestId::from("r1");
        let guard = in_flight.register(&id);
        assert!(in_flight.cancel(&id));
        assert!(guard.token().is_cancelled());
    }

    #[test]
    fn test_guard_unregisters() {
        let in_flight = InFlight::default();
        let id = RequestId::from("r1");
        {
            let _guard = in_flight.register(&id);
            assert_eq!(in_flight.len(), 1);
        }
        assert_eq!(in_flight.len(), 0);
        assert!(!in_flight.cancel(&id));
    }

    #[test]
    fn test_reused_id_keeps_newer_registration() {
        let in_flight = InFlight::default();
        let id = RequestId::from("dup");
        let old = in_flight.register(&id);
        let new = in_flight.register(&id);
        drop(old);
        assert!(in_flight.cancel(&id));
        assert!(new.token().is_cancelled());
    }
}
