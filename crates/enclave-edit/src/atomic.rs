//! Atomic file replacement.
//!
//! Content is written to a temp file in the target's directory, flushed to
//! disk, and only then renamed over the target. Dropping a [`StagedWrite`]
//! without committing removes the temp file and leaves the target untouched,
//! which is how a cancelled edit is abandoned.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{EditError, EditResult};

/// A fully written temp file waiting to replace its target.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Write `content` next to `target` without touching `target`.
    ///
    /// Permissions of an existing target are carried over.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::Io`] if the temp file cannot be created or written.
    pub fn stage(target: &Path, content: &[u8]) -> EditResult<Self> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;

        if let Ok(meta) = std::fs::metadata(target) {
            std::fs::set_permissions(temp.path(), meta.permissions())?;
        }

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// The file this write will replace.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the target.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::Io`] if the rename fails; the target is unchanged.
    pub fn commit(self) -> EditResult<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| EditError::Io(e.error))?;
        debug!(path = %target.display(), "Committed atomic write");
        Ok(())
    }
}

/// Stage and commit in one step.
///
/// # Errors
///
/// See [`StagedWrite::stage`] and [`StagedWrite::commit`].
pub fn write_atomic(target: &Path, content: &[u8]) -> EditResult<()> {
    StagedWrite::stage(target, content)?.commit()
}
