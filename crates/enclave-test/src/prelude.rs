//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_test::prelude::*;` to import all essential types.

// Fixtures
pub use crate::{TempProject, confirm, init_test_logging, request, test_engine};

// Mocks
pub use crate::{LocalLauncher, ScriptedService};
