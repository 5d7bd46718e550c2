//! Path resolution against a canonical project root.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{PathError, PathResult};

/// What the caller intends to do with a resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Read an existing file.
    Read,
    /// Write a file that may not exist yet.
    Write,
    /// Create a directory; a non-directory at the target is refused.
    CreateDirectory,
    /// List an existing directory; the root itself is allowed.
    List,
    /// Delete an existing entry other than the root.
    Delete,
}

impl AccessMode {
    fn allows_root(self) -> bool {
        matches!(self, Self::List | Self::CreateDirectory)
    }
}

/// Resolves every path argument and refuses anything outside the root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

/// Outcome of resolving the on-disk part of a path.
struct Resolved {
    path: PathBuf,
    /// Deepest existing ancestor (the path itself when it exists).
    existing: PathBuf,
    /// Whether every component exists on disk.
    exists: bool,
}

impl PathGuard {
    /// Create a guard for the given project root.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Root`] if the root cannot be canonicalized or is
    /// not a directory.
    pub fn new(root: impl AsRef<Path>) -> PathResult<Self> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|source| PathError::Root {
            path: root.display().to_string(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(PathError::Root {
                path: root.display().to_string(),
                source: std::io::Error::other("not a directory"),
            });
        }
        debug!(root = %canonical.display(), "Project root established");
        Ok(Self { root: canonical })
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an already resolved path is the root itself.
    #[must_use]
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }

    /// Render a resolved path relative to the root, `.` for the root itself.
    #[must_use]
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }

    /// Resolve a relative or absolute path for the given access mode.
    ///
    /// `.` and `..` segments and symlinks are resolved first; containment is
    /// then checked component-wise on the canonical result, so `/proj2` is
    /// never considered inside `/proj`. [`AccessMode::Delete`] keeps a
    /// trailing symlink unresolved so the link itself is removed.
    ///
    /// # Errors
    ///
    /// - [`PathError::OutsideRoot`] if the path escapes the root, is the root
    ///   when the mode does not allow it, or passes through a dangling symlink
    /// - [`PathError::NotFound`] if the mode requires an existing target
    /// - [`PathError::WouldOverwriteFile`] if directory creation meets a file
    /// - [`PathError::Invalid`] for NUL bytes or type mismatches
    pub fn resolve(&self, input: &str, mode: AccessMode) -> PathResult<PathBuf> {
        if input.contains('\0') {
            return Err(PathError::Invalid {
                path: input.to_string(),
                reason: "contains a NUL byte".to_string(),
            });
        }

        let requested = if input.trim().is_empty() {
            Path::new(".")
        } else {
            Path::new(input)
        };
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };

        let outside = || PathError::OutsideRoot {
            path: input.to_string(),
        };

        let Some(resolved) = resolve_lenient(&joined, mode != AccessMode::Delete) else {
            warn!(path = %input, "Path could not be resolved safely");
            return Err(outside());
        };

        if !resolved.path.starts_with(&self.root) {
            warn!(
                path = %input,
                resolved = %resolved.path.display(),
                "Rejected path outside project root"
            );
            return Err(outside());
        }
        if resolved.path == self.root && !mode.allows_root() {
            return Err(outside());
        }

        debug!(
            path = %input,
            resolved = %resolved.path.display(),
            ?mode,
            "Resolved path"
        );

        check_mode(input, &resolved, mode)?;
        Ok(resolved.path)
    }
}

fn check_mode(input: &str, resolved: &Resolved, mode: AccessMode) -> PathResult<()> {
    let invalid = |reason: &str| PathError::Invalid {
        path: input.to_string(),
        reason: reason.to_string(),
    };
    let blocked_by_file = !resolved.exists && !resolved.existing.is_dir();

    match mode {
        AccessMode::Read | AccessMode::Delete => {
            if !resolved.exists {
                return Err(PathError::NotFound {
                    path: input.to_string(),
                });
            }
        },
        AccessMode::List => {
            if !resolved.exists {
                return Err(PathError::NotFound {
                    path: input.to_string(),
                });
            }
            if !resolved.path.is_dir() {
                return Err(invalid("not a directory"));
            }
        },
        AccessMode::Write => {
            if resolved.exists && resolved.path.is_dir() {
                return Err(invalid("is a directory"));
            }
            if blocked_by_file {
                return Err(invalid("a parent component is not a directory"));
            }
        },
        AccessMode::CreateDirectory => {
            if (resolved.exists && !resolved.path.is_dir()) || blocked_by_file {
                return Err(PathError::WouldOverwriteFile {
                    path: input.to_string(),
                });
            }
        },
    }
    Ok(())
}

/// Walk `path` one component at a time, following every symlink met on
/// the way and folding `..` against the canonical result so far.
///
/// Components past the first missing one are applied lexically; they cannot
/// contain symlinks since they do not exist. With `follow_last` unset a
/// trailing symlink is kept as the link itself.
///
/// Returns `None` when a symlink cannot be followed (dangling or looping),
/// since its eventual target cannot be checked.
fn resolve_lenient(path: &Path, follow_last: bool) -> Option<Resolved> {
    let components: Vec<Component<'_>> = path.components().collect();
    let last = components.len().saturating_sub(1);
    let mut base = PathBuf::new();

    for (index, component) in components.iter().enumerate() {
        match component {
            Component::Prefix(_) | Component::RootDir => base.push(component.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                base.pop();
            },
            Component::Normal(name) => {
                base.push(name);
                let Ok(meta) = base.symlink_metadata() else {
                    continue;
                };
                if !meta.file_type().is_symlink() || (index == last && !follow_last) {
                    continue;
                }
                match base.canonicalize() {
                    Ok(target) => base = target,
                    Err(e) => {
                        debug!(path = %base.display(), error = %e, "Unfollowable symlink");
                        return None;
                    },
                }
            },
        }
    }

    let existing = base
        .ancestors()
        .find(|ancestor| ancestor.symlink_metadata().is_ok())
        .map(Path::to_path_buf)?;

    Some(Resolved {
        exists: existing == base,
        path: base,
        existing,
    })
}
