//! Enclave Approval - Two-phase confirmation for mutating operations.
//!
//! A mutating operation is never executed on first request. Instead a preview
//! is computed and parked in a [`ConfirmationStore`] under a single-use
//! token. The caller then confirms with the token and the fingerprint it was
//! shown; exactly one confirm succeeds.
//!
//! # States
//!
//! ```text
//! Proposed --confirm--> Confirmed (token consumed)
//!    |
//!    +--new preview for same target--> Superseded
//!    +--TTL elapsed-------------------> TimedOut
//!    +--wrong fingerprint-------------> Invalidated
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use enclave_approval::ConfirmationStore;
//!
//! let store: ConfirmationStore<String, String> = ConfirmationStore::new(ttl);
//! let ticket = store.propose("notes.txt", op, diff, fingerprint);
//! let pending = store.redeem(&ticket.token, &ticket.fingerprint)?;
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod fingerprint;
pub mod store;

pub use error::{ConfirmError, ConfirmResult};
pub use fingerprint::{content_digest, fingerprint};
pub use store::{ConfirmationStore, ExpiryReason, Pending, Proposal};
