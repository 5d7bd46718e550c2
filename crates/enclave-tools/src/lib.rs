//! Enclave Tools - The operation engine.
//!
//! [`Engine`] implements [`OperationService`](enclave_core::OperationService):
//! every request is resolved through the path guard, classified by the
//! command and git gates, and either answered directly or turned into a
//! preview with a single-use confirmation token. Nothing mutating touches the
//! project until a matching `confirm` arrives.
//!
//! # Example
//!
//! ```rust,no_run
//! use enclave_core::{Operation, OperationRequest, OperationService};
//! use enclave_tools::Engine;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new("/home/user/project")?;
//!
//! let response = engine
//!     .handle(OperationRequest::new(Operation::WriteFile {
//!         path: "notes.txt".into(),
//!         content: "hello\n".into(),
//!     }))
//!     .await;
//!
//! if let Some(ticket) = response.confirmation() {
//!     println!("{}", ticket.preview);
//!     engine
//!         .handle(OperationRequest::new(Operation::Confirm {
//!             token: ticket.token.clone(),
//!             fingerprint: ticket.fingerprint.clone(),
//!         }))
//!         .await;
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod catalog;
pub mod limits;
pub mod truncate;

mod cancel;
mod commands;
mod confirm;
mod context;
mod edits;
mod engine;
mod error;
mod exec;
mod files;
mod locks;
mod pending;

pub use catalog::{OperationSpec, catalog};
pub use context::SessionContext;
pub use engine::{Engine, EngineBuilder};
pub use error::SetupError;
pub use limits::{DEFAULT_COMMAND_TIMEOUT, EngineLimits, MAX_COMMAND_TIMEOUT, MAX_OUTPUT_CHARS};
pub use truncate::{cap_output, truncate_at_char_boundary};
