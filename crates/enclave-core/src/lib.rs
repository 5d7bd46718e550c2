//! Enclave Core - Shared protocol types for the sandboxed operation engine.
//!
//! Every front end (stdio server, remote bridge, tests) speaks the same
//! request/response shapes defined here. The engine never frames or
//! serializes on its own; it receives already-decoded [`OperationRequest`]s
//! and produces [`OperationResponse`]s.
//!
//! # Key Concepts
//!
//! - **Operation**: A named action plus typed arguments (read, write, run, ...)
//! - **Outcome**: Completed, needs confirmation, or failed with a structured error
//! - **Error kinds**: A closed taxonomy that callers can branch on
//!
//! # Example
//!
//! ```rust,ignore
//! use enclave_core::prelude::*;
//!
//! let request = OperationRequest::new(Operation::ReadFile {
//!     path: "src/main.rs".into(),
//!     offset: None,
//!     limit: None,
//! });
//!
//! let response = service.handle(request).await;
//! match response.outcome {
//!     Outcome::Completed { output } => println!("{output}"),
//!     Outcome::NeedsConfirmation { confirmation } => println!("{}", confirmation.preview),
//!     Outcome::Failed { error } => eprintln!("{}: {}", error.kind, error.message),
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod edit;
pub mod error;
pub mod operation;
pub mod response;
pub mod service;

pub use edit::{EditInstruction, MatchMode};
pub use error::{EngineError, EngineResult, ErrorKind, ErrorPayload, MatchSite};
pub use operation::{Operation, OperationRequest, RequestId};
pub use response::{ConfirmationTicket, OperationResponse, Outcome};
pub use service::OperationService;

/// Protocol version carried in bridge handshakes.
pub const PROTOCOL_VERSION: u32 = 1;
