//! Shared helpers for the integration tests.

#![allow(dead_code)]

use enclave_core::{ConfirmationTicket, ErrorKind, Operation, OperationResponse, OperationService};
use enclave_test::request;

/// Submit `operation` under a fresh request id.
pub async fn run(service: &dyn OperationService, operation: Operation) -> OperationResponse {
    service.handle(request(operation)).await
}

/// The error kind of a failed response.
pub fn kind(response: &OperationResponse) -> ErrorKind {
    match response.error() {
        Some(error) => error.kind,
        None => panic!("expected a failure, got {response:?}"),
    }
}

/// The ticket of a response that asked for confirmation.
pub fn ticket(response: &OperationResponse) -> ConfirmationTicket {
    match response.confirmation() {
        Some(ticket) => ticket.clone(),
        None => panic!("expected a confirmation ticket, got {response:?}"),
    }
}

pub fn read(path: &str) -> Operation {
    Operation::ReadFile {
        path: path.into(),
        offset: None,
        limit: None,
    }
}

pub fn write(path: &str, content: &str) -> Operation {
    Operation::WriteFile {
        path: path.into(),
        content: content.into(),
    }
}
