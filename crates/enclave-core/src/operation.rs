//! Inbound operation requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::edit::EditInstruction;

/// Caller-chosen identifier that correlates a request with its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A named operation plus its typed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Read a text file, optionally a 1-indexed line window.
    ReadFile {
        /// File path, relative to the project root or absolute.
        path: String,
        /// First line to return.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<usize>,
        /// Maximum number of lines.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    /// Render a directory as a bounded tree.
    ListDirectory {
        /// Directory path; the project root when omitted.
        #[serde(default = "default_dir")]
        path: String,
        /// Maximum depth to descend.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<usize>,
    },
    /// Render the whole project as a lazily walked, bounded tree.
    ProjectStructure {
        /// Maximum depth to descend.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<usize>,
        /// Maximum number of entries to emit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_entries: Option<usize>,
    },
    /// Create a directory and any missing parents.
    CreateDirectory {
        /// Directory path.
        path: String,
    },
    /// Write a whole file. Requires confirmation.
    WriteFile {
        /// File path.
        path: String,
        /// New content.
        content: String,
    },
    /// Delete a file or directory tree. Requires confirmation.
    DeletePath {
        /// Path to delete.
        path: String,
    },
    /// Run a single shell command in the project root.
    RunCommand {
        /// Command line.
        command: String,
        /// Timeout override in milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Run a git subcommand, e.g. `"log --oneline -5"`.
    Git {
        /// Subcommand and arguments.
        command: String,
    },
    /// Apply a targeted edit. Requires confirmation.
    SmartEdit {
        /// File path.
        path: String,
        /// The edit to apply.
        edit: EditInstruction,
    },
    /// Describe a file and locate a function or pattern without editing.
    InspectFile {
        /// File path.
        path: String,
        /// Function to locate.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function: Option<String>,
        /// Pattern to locate.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        /// Treat `pattern` as a regular expression.
        #[serde(default)]
        regex: bool,
    },
    /// Apply SEARCH/REPLACE blocks or a unified diff across one or more
    /// files. Requires confirmation.
    EditBlock {
        /// Block or diff text.
        content: String,
    },
    /// Redeem a confirmation token.
    Confirm {
        /// Token from a `needs_confirmation` response.
        token: String,
        /// Fingerprint from the same response.
        fingerprint: String,
    },
    /// Cancel an in-flight request.
    Cancel {
        /// Identifier of the request to cancel.
        target: RequestId,
    },
    /// List the supported operations and their input schemas.
    Describe,
    /// Liveness probe.
    Ping,
}

fn default_dir() -> String {
    ".".to_string()
}

impl Operation {
    /// Wire name of the operation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "read_file",
            Self::ListDirectory { .. } => "list_directory",
            Self::ProjectStructure { .. } => "project_structure",
            Self::CreateDirectory { .. } => "create_directory",
            Self::WriteFile { .. } => "write_file",
            Self::DeletePath { .. } => "delete_path",
            Self::RunCommand { .. } => "run_command",
            Self::Git { .. } => "git",
            Self::SmartEdit { .. } => "smart_edit",
            Self::InspectFile { .. } => "inspect_file",
            Self::EditBlock { .. } => "edit_block",
            Self::Confirm { .. } => "confirm",
            Self::Cancel { .. } => "cancel",
            Self::Describe => "describe",
            Self::Ping => "ping",
        }
    }

    /// Whether the operation always goes through the confirmation protocol.
    ///
    /// Commands and git invocations are gated by their verdict instead.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::WriteFile { .. }
                | Self::DeletePath { .. }
                | Self::SmartEdit { .. }
                | Self::EditBlock { .. }
        )
    }
}

/// An operation addressed by a request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Correlation identifier.
    pub id: RequestId,
    /// The operation itself.
    #[serde(flatten)]
    pub operation: Operation,
}

impl OperationRequest {
    /// Wrap an operation with a fresh identifier.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            id: RequestId::generate(),
            operation,
        }
    }

    /// Wrap an operation with a caller-chosen identifier.
    pub fn with_id(id: impl Into<RequestId>, operation: Operation) -> Self {
        Self {
            id: id.into(),
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = OperationRequest::with_id(
            "7",
            Operation::WriteFile {
                path: "notes.txt".into(),
                content: "hello".into(),
            },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["id"], "7");
        assert_eq!(value["op"], "write_file");
        assert_eq!(value["path"], "notes.txt");

        let parsed: OperationRequest = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_list_directory_defaults_to_root() {
        let request: OperationRequest =
            serde_json::from_str(r#"{"id":"1","op":"list_directory"}"#).unwrap();
        assert_eq!(
            request.operation,
            Operation::ListDirectory {
                path: ".".into(),
                max_depth: None
            }
        );
    }

    #[test]
    fn test_nested_edit_instruction() {
        let request: OperationRequest = serde_json::from_str(
            r#"{"id":"2","op":"smart_edit","path":"a.py","edit":{"kind":"insert","line":3,"content":"x = 1\n"}}"#,
        )
        .unwrap();
        assert_eq!(request.operation.name(), "smart_edit");
        assert!(request.operation.is_mutating());
    }

    #[test]
    fn test_unit_operations() {
        let request: OperationRequest = serde_json::from_str(r#"{"id":"3","op":"ping"}"#).unwrap();
        assert_eq!(request.operation, Operation::Ping);
        assert!(!request.operation.is_mutating());
    }
}
