//! Enclave Edit - Targeted text mutations for the operation engine.
//!
//! Every edit is computed against an in-memory copy of the current content
//! and only touches disk through [`StagedWrite`], which renames a fully
//! written temp file over the target.
//!
//! # Matching Order
//!
//! 1. Exact literal match of the pattern
//! 2. Whitespace-normalized line match (reindents the replacement)
//! 3. Regular expression, only when requested
//!
//! Function replacement uses a small brace/indentation state machine, see
//! [`function`]. It is a heuristic, not a parser.
//!
//! # Example
//!
//! ```rust,ignore
//! use enclave_edit::EditEngine;
//! use enclave_core::EditInstruction;
//!
//! let engine = EditEngine::default();
//! let preview = engine.preview("src/lib.rs", &edit, Some(&current))?;
//! println!("{}", preview.diff);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod atomic;
pub mod blocks;
pub mod diff;
pub mod engine;
pub mod error;
pub mod function;
pub mod inspect;
pub mod lines;
pub mod matcher;
pub mod patch;

pub use atomic::{StagedWrite, write_atomic};
pub use blocks::{BlockChange, EditBlock, apply_block, parse_block_changes, parse_edit_blocks};
pub use diff::{creation_diff, deletion_diff, unified_diff};
pub use engine::{EditEngine, EditPreview};
pub use error::{EditError, EditResult};
pub use function::{FunctionBlock, find_function};
pub use inspect::{InspectRequest, inspect};
pub use lines::LineEnding;
pub use matcher::{Site, find_sites, similar_lines};
pub use patch::{FilePatch, Hunk, HunkLine, apply_patch, parse_unified_diff};
