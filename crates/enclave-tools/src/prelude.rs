//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_tools::prelude::*;` to import all essential types.

// Engine
pub use crate::{Engine, EngineBuilder, SessionContext, SetupError};

// Limits
pub use crate::EngineLimits;

// Catalog
pub use crate::{OperationSpec, catalog};
