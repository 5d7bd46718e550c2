//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_approval::prelude::*;` to import all essential types.

// Store
pub use crate::{ConfirmationStore, ExpiryReason, Pending, Proposal};

// Fingerprints
pub use crate::{content_digest, fingerprint};

// Errors
pub use crate::{ConfirmError, ConfirmResult};
