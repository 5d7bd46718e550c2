//! Line model shared by every edit.
//!
//! Lines keep their terminators (`split_inclusive`), so joining the pieces
//! reproduces the content byte for byte. The last line may be unterminated.

use std::fmt::Write;

/// Line terminator style of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// Detect from existing content. CRLF wins if it terminates the first line.
    #[must_use]
    pub fn detect(content: &str) -> Self {
        match content.find('\n') {
            Some(pos) if pos > 0 && content.as_bytes().get(pos.saturating_sub(1)) == Some(&b'\r') => {
                Self::CrLf
            },
            _ => Self::Lf,
        }
    }

    /// The terminator text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    /// Rewrite bare `\n` terminators in `text` to this style.
    #[must_use]
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::Lf => text.to_string(),
            Self::CrLf => {
                let mut out = String::with_capacity(text.len());
                for line in text.split_inclusive('\n') {
                    match line.strip_suffix('\n') {
                        Some(body) => {
                            out.push_str(body.strip_suffix('\r').unwrap_or(body));
                            out.push_str("\r\n");
                        },
                        None => out.push_str(line),
                    }
                }
                out
            },
        }
    }
}

/// Split into lines, terminators included.
#[must_use]
pub fn split_lines(content: &str) -> Vec<&str> {
    content.split_inclusive('\n').collect()
}

/// Number of lines. An empty file has zero lines.
#[must_use]
pub fn line_count(content: &str) -> usize {
    content.split_inclusive('\n').count()
}

/// Strip the terminator (`\n` or `\r\n`) from one line.
#[must_use]
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Whether the line carries a terminator.
#[must_use]
pub fn is_terminated(line: &str) -> bool {
    line.ends_with('\n')
}

/// Leading horizontal whitespace of a line.
#[must_use]
pub fn indent_of(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len().saturating_sub(trimmed.len())]
}

/// 1-indexed line number containing byte `offset`.
#[must_use]
pub fn line_of_offset(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        .saturating_add(1)
}

/// Byte offset where 1-indexed `line` starts. `line_count + 1` maps to the
/// end of the content.
#[must_use]
pub fn offset_of_line(lines: &[&str], line: usize) -> usize {
    lines
        .iter()
        .take(line.saturating_sub(1))
        .map(|l| l.len())
        .sum()
}

/// Numbered excerpt of `radius` lines either side of `first..=last`.
#[must_use]
pub fn context_lines(content: &str, first: usize, last: usize, radius: usize) -> Vec<String> {
    let lines = split_lines(content);
    let from = first.saturating_sub(radius).max(1);
    let to = last.saturating_add(radius).min(lines.len());
    let mut out = Vec::new();
    for number in from..=to {
        if let Some(line) = lines.get(number.saturating_sub(1)) {
            let mut entry = String::new();
            let _ = write!(entry, "{number:>4}: {}", strip_terminator(line));
            out.push(entry);
        }
    }
    out
}

/// Collapse runs of horizontal whitespace and trim both ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
