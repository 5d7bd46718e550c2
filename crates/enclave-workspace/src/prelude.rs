//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_workspace::prelude::*;` to import all essential types.

// Resolution
pub use crate::{AccessMode, PathGuard};

// Tree rendering
pub use crate::{TreeOptions, render_tree};

// Errors
pub use crate::{PathError, PathResult};
