//! Error taxonomy shared by every engine component.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Closed set of error kinds reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A path resolved outside the project root.
    OutsideProjectRoot,
    /// A required path does not exist.
    PathNotFound,
    /// A non-directory occupies a directory-creation target.
    WouldOverwriteFile,
    /// A command was rejected by the safety policy.
    UnsafeCommand,
    /// A child process exceeded its timeout and was killed.
    CommandTimedOut,
    /// An edit pattern matched nothing.
    PatternNotFound,
    /// An edit pattern matched more sites than allowed.
    AmbiguousMatch,
    /// A line number is outside the file.
    LineOutOfRange,
    /// No pending confirmation has this token.
    UnknownToken,
    /// The token was superseded or timed out.
    TokenExpired,
    /// The confirmed operation no longer matches its preview.
    FingerprintMismatch,
    /// The target is locked by another in-flight request.
    Busy,
    /// The remote bridge connection is gone.
    BridgeDisconnected,
    /// Bridge session setup failed and was rolled back.
    RemoteSetupFailed,
    /// The request was cancelled before completion.
    Cancelled,
    /// The request is malformed or refers to an unsupported target.
    InvalidRequest,
    /// An underlying filesystem or process error.
    Io,
}

impl ErrorKind {
    /// Whether a caller may retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Stable name as it appears on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutsideProjectRoot => "OutsideProjectRoot",
            Self::PathNotFound => "PathNotFound",
            Self::WouldOverwriteFile => "WouldOverwriteFile",
            Self::UnsafeCommand => "UnsafeCommand",
            Self::CommandTimedOut => "CommandTimedOut",
            Self::PatternNotFound => "PatternNotFound",
            Self::AmbiguousMatch => "AmbiguousMatch",
            Self::LineOutOfRange => "LineOutOfRange",
            Self::UnknownToken => "UnknownToken",
            Self::TokenExpired => "TokenExpired",
            Self::FingerprintMismatch => "FingerprintMismatch",
            Self::Busy => "Busy",
            Self::BridgeDisconnected => "BridgeDisconnected",
            Self::RemoteSetupFailed => "RemoteSetupFailed",
            Self::Cancelled => "Cancelled",
            Self::InvalidRequest => "InvalidRequest",
            Self::Io => "Io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One location where a pattern matched, with surrounding lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSite {
    /// 1-indexed line where the match starts.
    pub line: usize,
    /// Numbered context lines around the match.
    pub context: Vec<String>,
}

/// Errors produced while validating or executing an operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The resolved path escapes the project root.
    #[error("path is outside the project root: {path}")]
    OutsideProjectRoot {
        /// Path as requested.
        path: String,
    },

    /// The path does not exist and the operation requires it.
    #[error("path not found: {path}")]
    PathNotFound {
        /// Path as requested.
        path: String,
    },

    /// Directory creation would replace a non-directory.
    #[error("a non-directory already exists at {path}")]
    WouldOverwriteFile {
        /// Path as requested.
        path: String,
    },

    /// The command was rejected by the safety policy.
    #[error("unsafe command: {reason}")]
    UnsafeCommand {
        /// The command string.
        command: String,
        /// The operator or verb that triggered the rejection.
        matched: Option<String>,
        /// Human-readable reason.
        reason: String,
    },

    /// The child process was killed after its timeout.
    #[error("command timed out after {timeout_ms}ms: {command}")]
    CommandTimedOut {
        /// The command string.
        command: String,
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The pattern matched nothing.
    #[error("pattern not found in {path}: {pattern:?}")]
    PatternNotFound {
        /// File being edited.
        path: String,
        /// Pattern as given.
        pattern: String,
        /// Similar lines that may have been meant.
        suggestions: Vec<String>,
    },

    /// A single-site edit matched several sites.
    #[error("pattern matches {} sites in {path}: {pattern:?}", sites.len())]
    AmbiguousMatch {
        /// File being edited.
        path: String,
        /// Pattern as given.
        pattern: String,
        /// Every match with context.
        sites: Vec<MatchSite>,
    },

    /// Line number outside the current file.
    #[error("line {line} is out of range for {path} ({line_count} lines)")]
    LineOutOfRange {
        /// File being edited.
        path: String,
        /// Offending line number.
        line: usize,
        /// Current number of lines.
        line_count: usize,
    },

    /// No pending confirmation has this token.
    #[error("unknown confirmation token: {token}")]
    UnknownToken {
        /// Token as given.
        token: String,
    },

    /// The token was superseded or timed out.
    #[error("confirmation token expired: {token} ({reason})")]
    TokenExpired {
        /// Token as given.
        token: String,
        /// Why the token is no longer valid.
        reason: String,
    },

    /// The confirmed operation differs from what was previewed.
    #[error("fingerprint mismatch for {target}: {reason}")]
    FingerprintMismatch {
        /// Target of the pending operation.
        target: String,
        /// What changed.
        reason: String,
    },

    /// Another request holds the target.
    #[error("resource busy: {resource}")]
    Busy {
        /// Path or command being contended.
        resource: String,
    },

    /// The bridge connection dropped.
    #[error("bridge disconnected: {reason}")]
    BridgeDisconnected {
        /// What was observed.
        reason: String,
    },

    /// Bridge setup failed and was rolled back.
    #[error("remote setup failed during {step}: {reason}")]
    RemoteSetupFailed {
        /// Setup step that failed.
        step: String,
        /// Underlying failure.
        reason: String,
    },

    /// The request was cancelled.
    #[error("request cancelled: {request_id}")]
    Cancelled {
        /// Identifier of the cancelled request.
        request_id: String,
    },

    /// Malformed or unsupported request.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request.
        reason: String,
    },

    /// Filesystem or process failure.
    #[error("I/O error on {path}: {message}")]
    Io {
        /// Path or resource involved.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

impl EngineError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl fmt::Display, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    /// Shorthand for [`EngineError::InvalidRequest`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// The kind reported on the wire.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutsideProjectRoot { .. } => ErrorKind::OutsideProjectRoot,
            Self::PathNotFound { .. } => ErrorKind::PathNotFound,
            Self::WouldOverwriteFile { .. } => ErrorKind::WouldOverwriteFile,
            Self::UnsafeCommand { .. } => ErrorKind::UnsafeCommand,
            Self::CommandTimedOut { .. } => ErrorKind::CommandTimedOut,
            Self::PatternNotFound { .. } => ErrorKind::PatternNotFound,
            Self::AmbiguousMatch { .. } => ErrorKind::AmbiguousMatch,
            Self::LineOutOfRange { .. } => ErrorKind::LineOutOfRange,
            Self::UnknownToken { .. } => ErrorKind::UnknownToken,
            Self::TokenExpired { .. } => ErrorKind::TokenExpired,
            Self::FingerprintMismatch { .. } => ErrorKind::FingerprintMismatch,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::BridgeDisconnected { .. } => ErrorKind::BridgeDisconnected,
            Self::RemoteSetupFailed { .. } => ErrorKind::RemoteSetupFailed,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether the same request may simply be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Structured context a caller needs to act without re-querying.
    #[must_use]
    pub fn context(&self) -> Value {
        match self {
            Self::OutsideProjectRoot { path }
            | Self::PathNotFound { path }
            | Self::WouldOverwriteFile { path } => json!({ "path": path }),
            Self::UnsafeCommand {
                command, matched, ..
            } => json!({ "command": command, "matched": matched }),
            Self::CommandTimedOut {
                command,
                timeout_ms,
            } => json!({ "command": command, "timeout_ms": timeout_ms }),
            Self::PatternNotFound {
                path,
                pattern,
                suggestions,
            } => json!({ "path": path, "pattern": pattern, "suggestions": suggestions }),
            Self::AmbiguousMatch {
                path,
                pattern,
                sites,
            } => json!({ "path": path, "pattern": pattern, "matches": sites }),
            Self::LineOutOfRange {
                path,
                line,
                line_count,
            } => json!({ "path": path, "line": line, "line_count": line_count }),
            Self::UnknownToken { token } => json!({ "token": token }),
            Self::TokenExpired { token, reason } => json!({ "token": token, "reason": reason }),
            Self::FingerprintMismatch { target, reason } => {
                json!({ "target": target, "reason": reason })
            },
            Self::Busy { resource } => json!({ "resource": resource }),
            Self::BridgeDisconnected { reason } => json!({ "reason": reason }),
            Self::RemoteSetupFailed { step, reason } => json!({ "step": step, "reason": reason }),
            Self::Cancelled { request_id } => json!({ "request_id": request_id }),
            Self::InvalidRequest { reason } => json!({ "reason": reason }),
            Self::Io { path, message } => json!({ "path": path, "message": message }),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Wire form of an error: kind, message, and structured context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Whether the request may be retried unchanged.
    pub retryable: bool,
    /// Path, pattern, surrounding lines, or command.
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ErrorPayload {
    /// Build a payload directly from a kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
            context: Map::new(),
        }
    }
}

impl From<&EngineError> for ErrorPayload {
    fn from(err: &EngineError) -> Self {
        let context = match err.context() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            context,
        }
    }
}

impl From<EngineError> for ErrorPayload {
    fn from(err: EngineError) -> Self {
        Self::from(&err)
    }
}
