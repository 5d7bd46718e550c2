//! Lexical classification of shell command strings.
//!
//! # Check Order
//!
//! 1. Empty command -> `Blocked`
//! 2. Any blocked operator (chaining, substitution, pipes) -> `Blocked`
//! 3. Unbalanced quoting -> `Blocked`
//! 4. Output redirection: `/dev/null` is fine, absolute, `~` or `..` targets
//!    are `Blocked`, anything else `NeedsConfirmation`
//! 5. Verb rules for the invoked program (and programs run by wrappers)
//! 6. Otherwise -> `Allowed`
//!
//! The most severe result of steps 4 and 5 wins. This is a lexical filter,
//! not a shell parser: a permitted command can still behave destructively.

use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};
use crate::table::{CommandTable, OperatorRule, VerbRule};
use crate::verdict::CommandVerdict;

/// File-descriptor duplication such as `2>&1`, which is not a file redirect.
static FD_DUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]*>&[0-9]+").expect("invalid regex"));

/// Output redirection and its target.
static REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[0-9]*>>?\s*("[^"]*"|'[^']*'|[^\s<>]+)?"#).expect("invalid regex")
});

#[derive(Debug, Clone)]
struct CompiledVerb {
    matcher: GlobMatcher,
    rule: VerbRule,
}

/// Classifies shell commands against a [`CommandTable`].
#[derive(Debug, Clone)]
pub struct CommandGate {
    operators: Vec<OperatorRule>,
    safe_redirect_targets: Vec<String>,
    wrappers: Vec<String>,
    verbs: Vec<CompiledVerb>,
}

impl CommandGate {
    /// Compile a command table.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidPattern`] if a verb glob is invalid.
    pub fn new(table: CommandTable) -> PolicyResult<Self> {
        let verbs = table
            .verbs
            .into_iter()
            .map(|rule| {
                let matcher = Glob::new(&rule.pattern)
                    .map_err(|source| PolicyError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    })?
                    .compile_matcher();
                Ok(CompiledVerb { matcher, rule })
            })
            .collect::<PolicyResult<Vec<_>>>()?;

        Ok(Self {
            operators: table.blocked_operators,
            safe_redirect_targets: table.safe_redirect_targets,
            wrappers: table.wrappers,
            verbs,
        })
    }

    /// Classify a command string.
    #[must_use]
    pub fn classify(&self, command: &str) -> CommandVerdict {
        let verdict = self.classify_inner(command);
        debug!(command = %command, verdict = %verdict, "Classified command");
        verdict
    }

    fn classify_inner(&self, command: &str) -> CommandVerdict {
        if command.trim().is_empty() {
            return CommandVerdict::blocked("empty command", "");
        }

        let scrubbed = FD_DUP.replace_all(command, " ");

        for rule in &self.operators {
            if scrubbed.contains(rule.operator.as_str()) {
                return CommandVerdict::blocked(
                    format!(
                        "{} (`{}`) is not allowed",
                        rule.reason,
                        rule.operator.escape_debug()
                    ),
                    rule.operator.clone(),
                );
            }
        }

        let tokens = match shell_words::split(&scrubbed) {
            Ok(tokens) => tokens,
            Err(e) => return CommandVerdict::blocked(format!("cannot tokenize: {e}"), command),
        };
        if tokens.is_empty() {
            return CommandVerdict::blocked("empty command", "");
        }

        let mut verdict = CommandVerdict::allowed("simple command");
        verdict = verdict.worst(self.classify_redirects(&scrubbed));
        for (position, verb) in self.command_words(&tokens) {
            let args = tokens.get(position.saturating_add(1)..).unwrap_or_default();
            if let Some(rule_verdict) = self.classify_verb(verb, args) {
                verdict = verdict.worst(rule_verdict);
            }
        }
        verdict
    }

    fn classify_redirects(&self, command: &str) -> CommandVerdict {
        let mut verdict = CommandVerdict::allowed("simple command");
        for caps in REDIRECT.captures_iter(command) {
            let Some(target) = caps.get(1) else {
                return CommandVerdict::blocked("redirection without a target", ">");
            };
            let target = target.as_str().trim_matches(|c| c == '"' || c == '\'');
            verdict = verdict.worst(self.classify_redirect_target(target));
        }
        verdict
    }

    fn classify_redirect_target(&self, target: &str) -> CommandVerdict {
        if self.safe_redirect_targets.iter().any(|t| t == target) {
            return CommandVerdict::allowed("redirect to a discard target");
        }
        let path = Path::new(target);
        if path.is_absolute() || target.starts_with('~') {
            return CommandVerdict::blocked(
                format!("redirection to {target} writes outside the project"),
                target,
            );
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return CommandVerdict::blocked(
                format!("redirection to {target} traverses out of the project"),
                target,
            );
        }
        CommandVerdict::confirm(format!("redirection overwrites {target}"), target)
    }

    /// Positions and names of every word that is executed as a program.
    fn command_words<'a>(&self, tokens: &'a [String]) -> Vec<(usize, &'a str)> {
        let mut words = Vec::new();
        let mut expecting_command = true;
        let mut after_wrapper = false;

        for (position, token) in tokens.iter().enumerate() {
            if !expecting_command {
                break;
            }
            if is_assignment(token) {
                continue;
            }
            if after_wrapper && (token.starts_with('-') || looks_like_duration(token)) {
                continue;
            }
            words.push((position, token.as_str()));
            after_wrapper = self.wrappers.iter().any(|w| w == program_name(token));
            expecting_command = after_wrapper;
        }
        words
    }

    fn classify_verb(&self, verb: &str, args: &[String]) -> Option<CommandVerdict> {
        let program = program_name(verb);
        self.verbs
            .iter()
            .find(|v| v.matcher.is_match(program) && flags_present(&v.rule.requires_flags, args))
            .map(|v| CommandVerdict {
                verdict: v.rule.verdict,
                reason: format!("{}: {}", program, v.rule.reason),
                matched: Some(program.to_string()),
            })
    }
}

fn program_name(token: &str) -> &str {
    Path::new(token)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(token)
}

fn is_assignment(token: &str) -> bool {
    token.split_once('=').is_some_and(|(name, _)| {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !name.starts_with(|c: char| c.is_ascii_digit())
    })
}

fn looks_like_duration(token: &str) -> bool {
    let digits = token.trim_end_matches(['s', 'm', 'h', 'd']);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Every group must be satisfied by a short flag letter or a long flag.
fn flags_present(groups: &[Vec<String>], args: &[String]) -> bool {
    groups.iter().all(|group| {
        group.iter().any(|flag| {
            if flag.chars().count() == 1 {
                args.iter().any(|arg| short_flags(arg).is_some_and(|s| s.contains(flag.as_str())))
            } else {
                args.iter().any(|arg| {
                    arg.strip_prefix("--")
                        .is_some_and(|long| long == flag || long.starts_with(&format!("{flag}=")))
                })
            }
        })
    })
}

/// The letters of a short-flag group such as `-rf`.
pub(crate) fn short_flags(arg: &str) -> Option<&str> {
    let rest = arg.strip_prefix('-')?;
    if rest.is_empty() || rest.starts_with('-') {
        return None;
    }
    Some(rest)
}
