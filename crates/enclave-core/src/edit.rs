//! Edit instructions carried by `smart_edit` requests.

use serde::{Deserialize, Serialize};

/// How many match sites a pattern operation may touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every match is affected.
    #[default]
    All,
    /// Exactly one match must exist; more is an ambiguity error.
    Single,
}

/// A targeted text mutation.
///
/// Line numbers are 1-indexed against the file's current line count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditInstruction {
    /// Replace the whole file (creating it if missing).
    Write {
        /// New file content.
        content: String,
    },
    /// Append to the end of the file.
    Append {
        /// Text to append.
        content: String,
    },
    /// Insert before the given line. `line_count + 1` appends.
    Insert {
        /// 1-indexed line to insert before.
        line: usize,
        /// Text to insert.
        content: String,
    },
    /// Replace occurrences of a pattern.
    Replace {
        /// Literal text or regular expression.
        pattern: String,
        /// Treat `pattern` as a regular expression.
        #[serde(default)]
        regex: bool,
        /// Let a regex span line boundaries.
        #[serde(default)]
        multiline: bool,
        /// Replacement text.
        content: String,
        /// All matches or a single required match.
        #[serde(default)]
        mode: MatchMode,
    },
    /// Delete occurrences of a pattern.
    Delete {
        /// Literal text or regular expression.
        pattern: String,
        /// Treat `pattern` as a regular expression.
        #[serde(default)]
        regex: bool,
        /// Let a regex span line boundaries.
        #[serde(default)]
        multiline: bool,
        /// All matches or a single required match.
        #[serde(default)]
        mode: MatchMode,
    },
    /// Delete an inclusive line range. `end` defaults to `start`.
    DeleteLines {
        /// First line to delete.
        start: usize,
        /// Last line to delete.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<usize>,
    },
    /// Replace a whole function block located by name.
    ReplaceFunction {
        /// Function name.
        name: String,
        /// Replacement block, declaration line included.
        content: String,
    },
}

impl EditInstruction {
    /// Short name of the edit kind, used in logs and previews.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Write { .. } => "write",
            Self::Append { .. } => "append",
            Self::Insert { .. } => "insert",
            Self::Replace { .. } => "replace",
            Self::Delete { .. } => "delete",
            Self::DeleteLines { .. } => "delete_lines",
            Self::ReplaceFunction { .. } => "replace_function",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_defaults() {
        let edit: EditInstruction = serde_json::from_str(
            r#"{"kind":"replace","pattern":"foo","content":"bar"}"#,
        )
        .unwrap();
        assert_eq!(
            edit,
            EditInstruction::Replace {
                pattern: "foo".into(),
                regex: false,
                multiline: false,
                content: "bar".into(),
                mode: MatchMode::All,
            }
        );
    }

    #[test]
    fn test_delete_lines_without_end() {
        let edit: EditInstruction =
            serde_json::from_str(r#"{"kind":"delete_lines","start":4}"#).unwrap();
        assert_eq!(edit, EditInstruction::DeleteLines { start: 4, end: None });
        assert_eq!(edit.kind_name(), "delete_lines");
    }
}
