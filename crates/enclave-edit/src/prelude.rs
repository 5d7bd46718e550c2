//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_edit::prelude::*;` to import all essential types.

// Engine
pub use crate::{EditEngine, EditPreview};

// Edit blocks
pub use crate::{BlockChange, EditBlock, apply_block, parse_block_changes, parse_edit_blocks};

// Writes and diffs
pub use crate::{StagedWrite, unified_diff, write_atomic};

// Errors
pub use crate::{EditError, EditResult};
