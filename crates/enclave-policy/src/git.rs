//! Git subcommand classification.
//!
//! # Check Order
//!
//! 1. Missing subcommand or a global option in its place -> `Blocked`
//! 2. Any argument matching `blocked_args` -> `Blocked`
//! 3. First rule whose subcommand and argument conditions match
//! 4. Otherwise the table default (needs-confirmation in the built-in table)
//!
//! Unrecognized subcommands never fall through to `Allowed` unless the
//! table's default says so.

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::command::short_flags;
use crate::error::{PolicyError, PolicyResult};
use crate::table::{GitRule, GitTable};
use crate::verdict::{CommandVerdict, Verdict};

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: GitRule,
    any_args: Option<GlobSet>,
    only_args: Option<GlobSet>,
}

impl CompiledRule {
    fn matches(&self, subcommand: &str, args: &[String]) -> bool {
        if self.rule.subcommand != subcommand {
            return false;
        }

        let has_trigger = self.any_args.is_some() || !self.rule.any_short_flags.is_empty();
        if has_trigger {
            let by_glob = self
                .any_args
                .as_ref()
                .is_some_and(|set| args.iter().any(|a| set.is_match(a)));
            let by_flag = args.iter().filter_map(|a| short_flags(a)).any(|letters| {
                self.rule
                    .any_short_flags
                    .iter()
                    .any(|f| letters.contains(f.as_str()))
            });
            if !by_glob && !by_flag {
                return false;
            }
        }

        if let Some(only) = &self.only_args
            && !args.iter().all(|a| only.is_match(a))
        {
            return false;
        }
        true
    }
}

/// Classifies git invocations against a [`GitTable`].
#[derive(Debug, Clone)]
pub struct GitPolicy {
    blocked_args: GlobSet,
    rules: Vec<CompiledRule>,
    default_verdict: Verdict,
    default_reason: String,
}

impl GitPolicy {
    /// Compile a git table.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidPattern`] if an argument glob is invalid.
    pub fn new(table: GitTable) -> PolicyResult<Self> {
        let blocked_args = build_set(&table.blocked_args)?;
        let rules = table
            .rules
            .into_iter()
            .map(|rule| {
                let any_args = if rule.any_args.is_empty() {
                    None
                } else {
                    Some(build_set(&rule.any_args)?)
                };
                let only_args = rule.only_args.as_deref().map(build_set).transpose()?;
                Ok(CompiledRule {
                    rule,
                    any_args,
                    only_args,
                })
            })
            .collect::<PolicyResult<Vec<_>>>()?;

        Ok(Self {
            blocked_args,
            rules,
            default_verdict: table.default_verdict,
            default_reason: table.default_reason,
        })
    }

    /// Classify a subcommand and its arguments.
    #[must_use]
    pub fn classify(&self, subcommand: &str, args: &[String]) -> CommandVerdict {
        let verdict = self.classify_inner(subcommand, args);
        debug!(
            subcommand = %subcommand,
            args = ?args,
            verdict = %verdict,
            "Classified git command"
        );
        verdict
    }

    /// Split and classify a full `"<subcommand> <args...>"` line.
    #[must_use]
    pub fn classify_line(&self, line: &str) -> CommandVerdict {
        match split_git_command(line) {
            Ok(tokens) => match tokens.split_first() {
                Some((subcommand, args)) => self.classify(subcommand, args),
                None => CommandVerdict::blocked("missing git subcommand", ""),
            },
            Err(reason) => CommandVerdict::blocked(reason, line),
        }
    }

    fn classify_inner(&self, subcommand: &str, args: &[String]) -> CommandVerdict {
        if subcommand.is_empty() {
            return CommandVerdict::blocked("missing git subcommand", "");
        }
        if subcommand.starts_with('-') {
            return CommandVerdict::blocked(
                "global git options are not accepted before the subcommand",
                subcommand,
            );
        }
        if let Some(arg) = args.iter().find(|a| self.blocked_args.is_match(a.as_str())) {
            return CommandVerdict::blocked(
                format!("git argument {arg} can run programs or escape the project"),
                arg.clone(),
            );
        }

        match self.rules.iter().find(|r| r.matches(subcommand, args)) {
            Some(rule) => CommandVerdict {
                verdict: rule.rule.verdict,
                reason: format!("git {subcommand}: {}", rule.rule.reason),
                matched: Some(subcommand.to_string()),
            },
            None => CommandVerdict {
                verdict: self.default_verdict,
                reason: format!("git {subcommand}: {}", self.default_reason),
                matched: Some(subcommand.to_string()),
            },
        }
    }
}

/// Split a git command line into tokens, dropping a leading `git`.
///
/// # Errors
///
/// Returns a reason string when the quoting is unbalanced.
pub fn split_git_command(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = shell_words::split(line).map_err(|e| format!("cannot tokenize: {e}"))?;
    if tokens.first().is_some_and(|t| t == "git") {
        tokens.remove(0);
    }
    Ok(tokens)
}

fn build_set(patterns: &[String]) -> PolicyResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| PolicyError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| PolicyError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}
