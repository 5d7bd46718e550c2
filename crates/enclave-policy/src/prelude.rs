//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_policy::prelude::*;` to import all essential types.

// Gates
pub use crate::{CommandGate, GitPolicy, PolicySet};

// Results
pub use crate::{CommandVerdict, Verdict};

// Tables
pub use crate::PolicyTable;

// Errors
pub use crate::{PolicyError, PolicyResult};
