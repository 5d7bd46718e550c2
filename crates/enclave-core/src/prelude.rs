//! Prelude module - commonly used types for convenient import.
//!
//! Use `use enclave_core::prelude::*;` to import all essential types.

// Requests
pub use crate::{Operation, OperationRequest, RequestId};

// Responses
pub use crate::{ConfirmationTicket, OperationResponse, Outcome};

// Edits
pub use crate::{EditInstruction, MatchMode};

// Errors
pub use crate::{EngineError, EngineResult, ErrorKind, ErrorPayload, MatchSite};

// Service seam
pub use crate::OperationService;
