//! Catalog of supported operations, served by `describe`.

use serde::Serialize;
use serde_json::{Value, json};

/// One operation as advertised to front ends.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSpec {
    /// Wire name (`"op"` tag value).
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Whether the operation goes through confirmation.
    pub mutating: bool,
    /// JSON schema of the arguments.
    pub input_schema: Value,
}

fn spec(name: &'static str, description: &'static str, mutating: bool, input_schema: Value) -> OperationSpec {
    OperationSpec {
        name,
        description,
        mutating,
        input_schema,
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Every operation the engine handles.
#[must_use]
pub fn catalog() -> Vec<OperationSpec> {
    vec![
        spec(
            "read_file",
            "Read a text file inside the project. Optional 1-based offset and limit select a line window.",
            false,
            object(
                json!({
                    "path": {"type": "string", "description": "File path, relative to the project root"},
                    "offset": {"type": "integer", "description": "First line to return (1-based)"},
                    "limit": {"type": "integer", "description": "Maximum number of lines"}
                }),
                &["path"],
            ),
        ),
        spec(
            "list_directory",
            "List a directory as a tree, directories first, with file sizes.",
            false,
            object(
                json!({
                    "path": {"type": "string", "description": "Directory path (default: project root)"},
                    "max_depth": {"type": "integer", "description": "Depth to descend (default: 3)"}
                }),
                &[],
            ),
        ),
        spec(
            "project_structure",
            "Show the project tree, skipping hidden and git-ignored entries.",
            false,
            object(
                json!({
                    "max_depth": {"type": "integer", "description": "Depth to descend (default: 3)"},
                    "max_entries": {"type": "integer", "description": "Entries to show (default: 500)"}
                }),
                &[],
            ),
        ),
        spec(
            "create_directory",
            "Create a directory and any missing parents. Existing directories are left alone.",
            false,
            object(json!({"path": {"type": "string"}}), &["path"]),
        ),
        spec(
            "write_file",
            "Write a whole file. Returns a diff and a confirmation token.",
            true,
            object(
                json!({
                    "path": {"type": "string"},
                    "content": {"type": "string"}
                }),
                &["path", "content"],
            ),
        ),
        spec(
            "delete_path",
            "Delete a file or directory tree. Returns a summary and a confirmation token.",
            true,
            object(json!({"path": {"type": "string"}}), &["path"]),
        ),
        spec(
            "run_command",
            "Run a single shell command in the project root. Chaining, substitution and \
             destructive redirection are rejected; destructive verbs need confirmation.",
            false,
            object(
                json!({
                    "command": {"type": "string"},
                    "timeout_ms": {"type": "integer", "description": "Timeout in milliseconds (default: 30000, max: 600000)"}
                }),
                &["command"],
            ),
        ),
        spec(
            "git",
            "Run a git subcommand, e.g. \"log --oneline -5\". Read-only subcommands run directly, \
             working-copy changes need confirmation, history rewrites are blocked.",
            false,
            object(json!({"command": {"type": "string"}}), &["command"]),
        ),
        spec(
            "smart_edit",
            "Edit a file by line number, pattern, regex or function name. Returns a diff and a confirmation token.",
            true,
            object(
                json!({
                    "path": {"type": "string"},
                    "edit": {
                        "type": "object",
                        "description": "Edit instruction tagged by kind",
                        "properties": {
                            "kind": {
                                "type": "string",
                                "enum": ["write", "append", "insert", "replace", "delete", "delete_lines", "replace_function"]
                            },
                            "content": {"type": "string"},
                            "line": {"type": "integer"},
                            "start": {"type": "integer"},
                            "end": {"type": "integer"},
                            "pattern": {"type": "string"},
                            "regex": {"type": "boolean"},
                            "multiline": {"type": "boolean"},
                            "mode": {"type": "string", "enum": ["all", "single"]},
                            "name": {"type": "string"}
                        },
                        "required": ["kind"]
                    }
                }),
                &["path", "edit"],
            ),
        ),
        spec(
            "inspect_file",
            "Describe a file and locate a function or pattern without editing it.",
            false,
            object(
                json!({
                    "path": {"type": "string"},
                    "function": {"type": "string"},
                    "pattern": {"type": "string"},
                    "regex": {"type": "boolean"}
                }),
                &["path"],
            ),
        ),
        spec(
            "edit_block",
            "Apply SEARCH/REPLACE blocks or a unified diff to one or more files under a single confirmation.",
            true,
            object(json!({"content": {"type": "string"}}), &["content"]),
        ),
        spec(
            "confirm",
            "Execute a previewed operation. The token is single-use.",
            false,
            object(
                json!({
                    "token": {"type": "string"},
                    "fingerprint": {"type": "string"}
                }),
                &["token", "fingerprint"],
            ),
        ),
        spec(
            "cancel",
            "Cancel an in-flight request by id.",
            false,
            object(json!({"target": {"type": "string"}}), &["target"]),
        ),
        spec("describe", "List supported operations.", false, object(json!({}), &[])),
        spec("ping", "Liveness probe.", false, object(json!({}), &[])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::Operation;

    #[test]
    fn test_names_are_unique() {
        let specs = catalog();
        let mut names: Vec<&str> = specs.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn test_mutating_flag_matches_operations() {
        let write = Operation::WriteFile {
            path: "a".into(),
            content: String::new(),
        };
        let spec = catalog().into_iter().find(|s| s.name == write.name()).unwrap();
        assert_eq!(spec.mutating, write.is_mutating());
        assert!(!catalog().iter().find(|s| s.name == "ping").unwrap().mutating);
    }

    #[test]
    fn test_schemas_are_objects() {
        for spec in catalog() {
            assert_eq!(spec.input_schema["type"], "object", "{}", spec.name);
        }
    }
}
