//! Classification results.

use enclave_core::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy outcome, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Runs without review.
    Allowed,
    /// Runs only after an explicit confirmation.
    NeedsConfirmation,
    /// Never runs.
    Blocked,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => f.write_str("allowed"),
            Self::NeedsConfirmation => f.write_str("needs confirmation"),
            Self::Blocked => f.write_str("blocked"),
        }
    }
}

/// A verdict with its reason and the operator, verb or argument that decided it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandVerdict {
    /// The outcome.
    pub verdict: Verdict,
    /// Human-readable reason.
    pub reason: String,
    /// What triggered the verdict, if anything specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

impl CommandVerdict {
    /// An allowed verdict.
    pub fn allowed(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Allowed,
            reason: reason.into(),
            matched: None,
        }
    }

    /// A blocked verdict naming what matched.
    pub fn blocked(reason: impl Into<String>, matched: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Blocked,
            reason: reason.into(),
            matched: Some(matched.into()),
        }
    }

    /// A needs-confirmation verdict naming what matched.
    pub fn confirm(reason: impl Into<String>, matched: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::NeedsConfirmation,
            reason: reason.into(),
            matched: Some(matched.into()),
        }
    }

    /// Keep whichever of the two verdicts is more severe.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        if other.verdict > self.verdict {
            other
        } else {
            self
        }
    }

    /// Convert a blocked verdict into the error reported to callers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsafeCommand`] when the verdict is blocked.
    pub fn into_result(self, command: &str) -> Result<Self, EngineError> {
        if self.verdict == Verdict::Blocked {
            return Err(EngineError::UnsafeCommand {
                command: command.to_string(),
                matched: self.matched,
                reason: self.reason,
            });
        }
        Ok(self)
    }
}

impl fmt::Display for CommandVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.verdict, self.reason)
    }
}
