//! Path resolution errors.

use enclave_core::EngineError;

/// Errors raised while resolving a path against the project root.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// The resolved path lies outside the project root.
    #[error("path is outside the project root: {path}")]
    OutsideRoot {
        /// Path as requested.
        path: String,
    },

    /// The path does not exist and the access mode requires it.
    #[error("path not found: {path}")]
    NotFound {
        /// Path as requested.
        path: String,
    },

    /// A non-directory occupies a directory-creation target.
    #[error("a non-directory already exists at {path}")]
    WouldOverwriteFile {
        /// Path as requested.
        path: String,
    },

    /// The path is well-formed but unusable for the access mode.
    #[error("invalid path {path}: {reason}")]
    Invalid {
        /// Path as requested.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The project root itself could not be opened.
    #[error("cannot use {path} as project root: {source}")]
    Root {
        /// Root as configured.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for path resolution.
pub type PathResult<T> = Result<T, PathError>;

impl From<PathError> for EngineError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::OutsideRoot { path } => Self::OutsideProjectRoot { path },
            PathError::NotFound { path } => Self::PathNotFound { path },
            PathError::WouldOverwriteFile { path } => Self::WouldOverwriteFile { path },
            PathError::Invalid { path, reason } => Self::InvalidRequest {
                reason: format!("{path}: {reason}"),
            },
            PathError::Root { path, source } => Self::io(path, &source),
        }
    }
}
