//! Serializable policy tables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PolicyError, PolicyResult};
use crate::verdict::Verdict;

/// The built-in policy table.
pub const DEFAULT_POLICY: &str = include_str!("default_policy.toml");

/// Complete policy: command rules and git rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTable {
    /// Shell command rules.
    pub command: CommandTable,
    /// Git subcommand rules.
    pub git: GitTable,
}

/// Rules for arbitrary shell commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandTable {
    /// Substrings that are never allowed in a command.
    #[serde(default)]
    pub blocked_operators: Vec<OperatorRule>,
    /// Redirection targets that are always tolerated.
    #[serde(default)]
    pub safe_redirect_targets: Vec<String>,
    /// Programs whose first non-flag argument is itself a command.
    #[serde(default)]
    pub wrappers: Vec<String>,
    /// Per-verb rules, first match wins.
    #[serde(default)]
    pub verbs: Vec<VerbRule>,
}

/// A forbidden operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorRule {
    /// Literal substring.
    pub operator: String,
    /// What it enables.
    pub reason: String,
}

/// A rule keyed on the invoked program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbRule {
    /// Glob matched against the program's file name.
    pub pattern: String,
    /// Verdict when the rule applies.
    pub verdict: Verdict,
    /// Reason reported with the verdict.
    pub reason: String,
    /// Flag groups that must all be present. Single-character names are
    /// short flags (combinable, `-rf`), longer names are `--long` flags.
    #[serde(default)]
    pub requires_flags: Vec<Vec<String>>,
}

/// Rules for git subcommands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitTable {
    /// Verdict for subcommands no rule matches.
    pub default_verdict: Verdict,
    /// Reason reported with the default verdict.
    pub default_reason: String,
    /// Argument globs that block any subcommand.
    #[serde(default)]
    pub blocked_args: Vec<String>,
    /// Ordered rules, first match wins.
    #[serde(default)]
    pub rules: Vec<GitRule>,
}

/// One git rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRule {
    /// Subcommand name.
    pub subcommand: String,
    /// The rule applies only if some argument matches one of these globs...
    #[serde(default)]
    pub any_args: Vec<String>,
    /// ...or some short-flag group contains one of these letters.
    #[serde(default)]
    pub any_short_flags: Vec<String>,
    /// The rule applies only if every argument matches one of these globs.
    #[serde(default)]
    pub only_args: Option<Vec<String>>,
    /// Verdict when the rule applies.
    pub verdict: Verdict,
    /// Reason reported with the verdict.
    pub reason: String,
}

impl PolicyTable {
    /// Parse the embedded default table.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] if the embedded table is malformed.
    pub fn builtin() -> PolicyResult<Self> {
        Self::from_toml_str(DEFAULT_POLICY)
    }

    /// Parse a table from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] on malformed TOML.
    pub fn from_toml_str(text: &str) -> PolicyResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a table file.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Read`] or [`PolicyError::Parse`].
    pub fn from_file(path: &Path) -> PolicyResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Append needs-confirmation rules for extra verbs.
    pub fn add_confirm_verbs(&mut self, verbs: &[String]) {
        for verb in verbs {
            self.command.verbs.push(VerbRule {
                pattern: verb.clone(),
                verdict: Verdict::NeedsConfirmation,
                reason: "configured as destructive".to_string(),
                requires_flags: Vec::new(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_parses() {
        let table = PolicyTable::builtin().unwrap();
        assert!(!table.command.blocked_operators.is_empty());
        assert!(table.command.verbs.iter().any(|v| v.pattern == "sudo"));
        assert_eq!(table.git.default_verdict, Verdict::NeedsConfirmation);
        assert!(table.git.rules.iter().any(|r| r.subcommand == "rebase"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(
            &path,
            r#"
[command]
[[command.verbs]]
pattern = "curl"
verdict = "blocked"
reason = "network"

[git]
default_verdict = "blocked"
default_reason = "locked down"
"#,
        )
        .unwrap();
        let table = PolicyTable::from_file(&path).unwrap();
        assert_eq!(table.command.verbs.len(), 1);
        assert!(table.git.rules.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = PolicyTable::from_file(Path::new("/nonexistent/policy.toml")).unwrap_err();
        assert!(matches!(err, PolicyError::Read { .. }));
    }

    #[test]
    fn test_add_confirm_verbs() {
        let mut table = PolicyTable::builtin().unwrap();
        let before = table.command.verbs.len();
        table.add_confirm_verbs(&["terraform".to_string()]);
        assert_eq!(table.command.verbs.len(), before + 1);
    }
}
