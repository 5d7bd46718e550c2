//! Enclave Policy - Lexical safety classification for commands and git.
//!
//! Policies are data: the built-in tables live in `default_policy.toml` and a
//! replacement file of the same shape can be loaded at startup. Control flow
//! never changes when a rule is added.
//!
//! # Classification
//!
//! - [`CommandGate`] classifies a shell command string
//! - [`GitPolicy`] classifies a git subcommand and its arguments
//!
//! Both return a [`CommandVerdict`]: allowed, blocked, or needs-confirmation,
//! plus a human-readable reason and the matched operator or verb.
//!
//! # Example
//!
//! ```rust,ignore
//! use enclave_policy::{PolicySet, Verdict};
//!
//! let policies = PolicySet::builtin()?;
//!
//! assert_eq!(policies.command.classify("ls -la").verdict, Verdict::Allowed);
//! assert_eq!(policies.command.classify("ls; rm -rf /").verdict, Verdict::Blocked);
//! assert_eq!(
//!     policies.git.classify("push", &["--force".into()]).verdict,
//!     Verdict::Blocked
//! );
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod command;
pub mod error;
pub mod git;
pub mod table;
pub mod verdict;

pub use command::CommandGate;
pub use error::{PolicyError, PolicyResult};
pub use git::{GitPolicy, split_git_command};
pub use table::{CommandTable, GitRule, GitTable, OperatorRule, PolicyTable, VerbRule};
pub use verdict::{CommandVerdict, Verdict};

use std::path::Path;

/// The command and git gates built from one policy table.
#[derive(Debug, Clone)]
pub struct PolicySet {
    /// Shell command classification.
    pub command: CommandGate,
    /// Git subcommand classification.
    pub git: GitPolicy,
}

impl PolicySet {
    /// Build both gates from a parsed table.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidPattern`] if a glob fails to compile.
    pub fn from_table(table: PolicyTable) -> PolicyResult<Self> {
        Ok(Self {
            command: CommandGate::new(table.command)?,
            git: GitPolicy::new(table.git)?,
        })
    }

    /// The built-in tables.
    ///
    /// # Errors
    ///
    /// Returns an error only if the embedded table is malformed.
    pub fn builtin() -> PolicyResult<Self> {
        Self::from_table(PolicyTable::builtin()?)
    }

    /// Load tables from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or compiled.
    pub fn from_file(path: &Path) -> PolicyResult<Self> {
        Self::from_table(PolicyTable::from_file(path)?)
    }
}
