//! Enclave Workspace - Project-root confinement for every filesystem access.
//!
//! [`PathGuard`] is the single authority for "may this path be touched".
//! Nothing in the engine reaches the filesystem through a path that has not
//! been resolved here first.
//!
//! # Key Concepts
//!
//! - **Project root**: A canonical directory fixed for the guard's lifetime
//! - **Resolution**: `.`/`..` and symlinks are resolved before the containment check
//! - **Access mode**: What the caller intends, which decides whether a missing
//!   target is acceptable
//!
//! # Example
//!
//! ```rust,ignore
//! use enclave_workspace::{AccessMode, PathGuard};
//!
//! let guard = PathGuard::new("/home/user/project")?;
//!
//! let path = guard.resolve("src/main.rs", AccessMode::Read)?;
//! assert!(path.starts_with(guard.root()));
//!
//! // Escapes are rejected after symlinks and `..` are resolved
//! assert!(guard.resolve("../../etc/passwd", AccessMode::Read).is_err());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod error;
pub mod guard;
pub mod tree;

pub use error::{PathError, PathResult};
pub use guard::{AccessMode, PathGuard};
pub use tree::{TreeOptions, render_tree};
