//! Read-only file inspection for planning an edit.

use std::fmt::Write;

use crate::error::{EditError, EditResult};
use crate::function::find_function;
use crate::lines::{line_count, split_lines, strip_terminator};
use crate::matcher::{PatternOptions, find_sites, similar_lines};

/// Matches shown in full.
const SHOWN_MATCHES: usize = 3;

/// Similar lines offered when a pattern matches nothing.
const SIMILAR_LINES: usize = 5;

/// What to look for.
#[derive(Debug, Clone, Copy, Default)]
pub struct InspectRequest<'a> {
    /// Function whose block should be shown.
    pub function: Option<&'a str>,
    /// Pattern whose matches should be shown.
    pub pattern: Option<&'a str>,
    /// Treat `pattern` as a regular expression.
    pub regex: bool,
}

/// Describe `content`: size, line count, the requested function's block,
/// and pattern matches (or similar lines when nothing matches).
///
/// A missing or ambiguous function is reported in the text, not as an error.
///
/// # Errors
///
/// Returns [`EditError::InvalidRegex`] if a regex pattern does not compile.
pub fn inspect(path: &str, content: &str, request: &InspectRequest<'_>) -> EditResult<String> {
    let mut out = String::new();
    let _ = writeln!(out, "File: {path}");
    let _ = writeln!(out, "Size: {} bytes", content.len());
    let _ = writeln!(out, "Lines: {}", line_count(content));

    if let Some(name) = request.function {
        out.push('\n');
        describe_function(&mut out, content, name);
    }

    if let Some(pattern) = request.pattern {
        out.push('\n');
        let options = PatternOptions {
            regex: request.regex,
            multiline: false,
        };
        let sites = find_sites(content, pattern, "", options)?;
        if sites.is_empty() {
            let _ = writeln!(out, "Pattern {pattern:?}: no matches");
            let similar = similar_lines(content, pattern, SIMILAR_LINES);
            if !similar.is_empty() {
                let _ = writeln!(out, "Similar lines:");
                for line in similar {
                    let _ = writeln!(out, "  {line}");
                }
            }
        } else {
            let _ = writeln!(out, "Pattern {pattern:?}: {} matches", sites.len());
            for (number, site) in sites.iter().take(SHOWN_MATCHES).enumerate() {
                let described = site.describe(content);
                let _ = writeln!(
                    out,
                    "Match {} at line {}:",
                    number.saturating_add(1),
                    described.line
                );
                for line in described.context {
                    let _ = writeln!(out, "  {line}");
                }
            }
            if let Some(rest) = sites.len().checked_sub(SHOWN_MATCHES)
                && rest > 0
            {
                let _ = writeln!(out, "... and {rest} more");
            }
        }
    }

    Ok(out)
}

fn describe_function(out: &mut String, content: &str, name: &str) {
    match find_function(content, name) {
        Ok(block) => {
            let _ = writeln!(
                out,
                "Function {name}: lines {}-{}",
                block.start_line, block.end_line
            );
            let lines = split_lines(content);
            for number in block.start_line..=block.end_line {
                if let Some(line) = lines.get(number.saturating_sub(1)) {
                    let _ = writeln!(out, "{number:>6}\t{}", strip_terminator(line));
                }
            }
        },
        Err(EditError::AmbiguousMatch { sites, .. }) => {
            let lines: Vec<String> = sites.iter().map(|s| s.line.to_string()).collect();
            let _ = writeln!(
                out,
                "Function {name}: declared {} times (lines {})",
                sites.len(),
                lines.join(", ")
            );
        },
        Err(EditError::PatternNotFound { suggestions, .. }) => {
            let _ = writeln!(out, "Function {name}: not found");
            for line in suggestions {
                let _ = writeln!(out, "  {line}");
            }
        },
        Err(e) => {
            let _ = writeln!(out, "Function {name}: {e}");
        },
    }
}
