//! Responses returned for every request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorPayload};
use crate::operation::RequestId;

/// Everything a caller needs to confirm a previewed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationTicket {
    /// Single-use token.
    pub token: String,
    /// Fingerprint to restate on confirm.
    pub fingerprint: String,
    /// Path or command the token is scoped to.
    pub target: String,
    /// Diff, summary, or command text to review.
    pub preview: String,
    /// When the token stops being redeemable.
    pub expires_at: DateTime<Utc>,
}

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation ran.
    Completed {
        /// Operation output.
        output: String,
    },
    /// The operation is held until confirmed.
    NeedsConfirmation {
        /// Token and preview.
        confirmation: ConfirmationTicket,
    },
    /// The operation was rejected or failed.
    Failed {
        /// Structured error.
        error: ErrorPayload,
    },
}

/// A response correlated with its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResponse {
    /// Identifier of the originating request.
    pub id: RequestId,
    /// What happened.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl OperationResponse {
    /// A completed response.
    pub fn completed(id: RequestId, output: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Completed {
                output: output.into(),
            },
        }
    }

    /// A response holding a confirmation ticket.
    #[must_use]
    pub fn needs_confirmation(id: RequestId, confirmation: ConfirmationTicket) -> Self {
        Self {
            id,
            outcome: Outcome::NeedsConfirmation { confirmation },
        }
    }

    /// A failed response.
    #[must_use]
    pub fn failed(id: RequestId, error: &EngineError) -> Self {
        Self {
            id,
            outcome: Outcome::Failed {
                error: ErrorPayload::from(error),
            },
        }
    }

    /// Output text when completed.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Completed { output } => Some(output),
            _ => None,
        }
    }

    /// Ticket when confirmation is needed.
    #[must_use]
    pub fn confirmation(&self) -> Option<&ConfirmationTicket> {
        match &self.outcome {
            Outcome::NeedsConfirmation { confirmation } => Some(confirmation),
            _ => None,
        }
    }

    /// Error payload when failed.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorPayload> {
        match &self.outcome {
            Outcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_failed_response_wire_shape() {
        let response = OperationResponse::failed(
            RequestId::from("9"),
            &EngineError::UnknownToken {
                token: "abc".into(),
            },
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], "9");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"]["kind"], "UnknownToken");
        assert_eq!(value["error"]["context"]["token"], "abc");

        let parsed: OperationResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.error().unwrap().kind, ErrorKind::UnknownToken);
    }

    #[test]
    fn test_accessors() {
        let response = OperationResponse::completed(RequestId::from("1"), "hello");
        assert_eq!(response.output(), Some("hello"));
        assert!(response.error().is_none());
        assert!(response.confirmation().is_none());
    }
}
