//! Edit errors.
//!
//! Edits operate on content, not paths, so these errors carry no path. The
//! engine attaches one with [`EditError::into_engine`].

use enclave_core::{EngineError, MatchSite};

/// Errors raised while computing an edit.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// The pattern (or function name) matched nothing.
    #[error("pattern not found: {pattern:?}")]
    PatternNotFound {
        /// Pattern as given.
        pattern: String,
        /// Similar lines that may have been meant.
        suggestions: Vec<String>,
    },

    /// A single-site edit matched more than one site.
    #[error("pattern matches {} sites: {pattern:?}", sites.len())]
    AmbiguousMatch {
        /// Pattern as given.
        pattern: String,
        /// Every match with context.
        sites: Vec<MatchSite>,
    },

    /// Line number outside `1..=line_count` (or `line_count + 1` for inserts).
    #[error("line {line} is out of range ({line_count} lines)")]
    LineOutOfRange {
        /// Offending line number.
        line: usize,
        /// Current number of lines.
        line_count: usize,
    },

    /// The regular expression did not compile.
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        /// Pattern as given.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// The edit needs existing content but the file is missing.
    #[error("file does not exist")]
    MissingFile,

    /// A patch that creates the file met existing content.
    #[error("file already exists; the diff creates it from /dev/null")]
    AlreadyExists,

    /// A diff hunk's context or removed line differs from the file.
    #[error("hunk {hunk} does not apply at line {line}: expected {expected:?}")]
    HunkMismatch {
        /// 1-indexed hunk within its file section.
        hunk: usize,
        /// 1-indexed file line that was compared.
        line: usize,
        /// Line the hunk expects.
        expected: String,
        /// Line actually there, if any.
        found: Option<String>,
    },

    /// An edit block could not be parsed.
    #[error("malformed edit block at line {line}: {reason}")]
    MalformedBlock {
        /// 1-indexed line in the block text.
        line: usize,
        /// What is wrong.
        reason: String,
    },

    /// Content is not valid UTF-8.
    #[error("file is not valid UTF-8 text")]
    NotText,

    /// Filesystem failure while staging or committing a write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for edit operations.
pub type EditResult<T> = Result<T, EditError>;

impl EditError {
    /// Convert into the protocol error, naming the file being edited.
    #[must_use]
    pub fn into_engine(self, path: &str) -> EngineError {
        match self {
            Self::PatternNotFound {
                pattern,
                suggestions,
            } => EngineError::PatternNotFound {
                path: path.to_string(),
                pattern,
                suggestions,
            },
            Self::AmbiguousMatch { pattern, sites } => EngineError::AmbiguousMatch {
                path: path.to_string(),
                pattern,
                sites,
            },
            Self::LineOutOfRange { line, line_count } => EngineError::LineOutOfRange {
                path: path.to_string(),
                line,
                line_count,
            },
            Self::MissingFile => EngineError::PathNotFound {
                path: path.to_string(),
            },
            Self::HunkMismatch {
                hunk,
                line,
                expected,
                found,
            } => EngineError::PatternNotFound {
                path: path.to_string(),
                pattern: expected,
                suggestions: vec![match found {
                    Some(found) => format!("hunk {hunk}, line {line}: {found}"),
                    None => format!("hunk {hunk}, line {line}: end of file"),
                }],
            },
            Self::Io(e) => EngineError::io(path, &e),
            other @ (Self::InvalidRegex { .. }
            | Self::MalformedBlock { .. }
            | Self::AlreadyExists
            | Self::NotText) => {
                EngineError::invalid(format!("{path}: {other}"))
            },
        }
    }
}
