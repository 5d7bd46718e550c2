//! Operations parked behind a confirmation token.

use enclave_approval::content_digest;
use enclave_workspace::AccessMode;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// A path that passed the guard at preview time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileTarget {
    /// Path as the caller wrote it.
    pub(crate) requested: String,
    /// Resolved absolute path.
    pub(crate) path: PathBuf,
    /// Path relative to the root, for messages.
    pub(crate) display: String,
}

/// One file of a multi-file edit.
#[derive(Debug, Clone)]
pub(crate) struct StagedFile {
    pub(crate) target: FileTarget,
    pub(crate) content: String,
}

/// What runs on confirm.
#[derive(Debug, Clone)]
pub(crate) enum PendingOp {
    /// Write content (whole-file writes and smart edits alike).
    Write(StagedFile),
    /// Remove a file or directory tree.
    Delete(FileTarget),
    /// Write several files.
    WriteMany(Vec<StagedFile>),
    /// Run a shell command.
    Command { command: String, timeout: Duration },
    /// Run a git subcommand.
    Git { args: Vec<String>, line: String },
}

/// A pending operation plus the on-disk state it was previewed against.
#[derive(Debug, Clone)]
pub(crate) struct Parked {
    pub(crate) op: PendingOp,
    pub(crate) digests: Vec<(PathBuf, String)>,
}

impl Parked {
    /// Park with digests of the content the preview was computed from.
    pub(crate) fn new(op: PendingOp, digests: Vec<(PathBuf, String)>) -> Self {
        Self { op, digests }
    }

    /// Park with digests taken from disk now.
    pub(crate) fn from_disk(op: PendingOp) -> Self {
        let digests = op
            .targets()
            .into_iter()
            .map(|t| (t.path.clone(), disk_digest(&t.path)))
            .collect();
        Self { op, digests }
    }
}

impl PendingOp {
    /// Files this operation touches.
    pub(crate) fn targets(&self) -> Vec<&FileTarget> {
        match self {
            Self::Write(file) => vec![&file.target],
            Self::Delete(target) => vec![target],
            Self::WriteMany(files) => files.iter().map(|f| &f.target).collect(),
            Self::Command { .. } | Self::Git { .. } => Vec::new(),
        }
    }

    /// Guard mode each target must still satisfy on confirm.
    pub(crate) fn access_mode(&self) -> AccessMode {
        match self {
            Self::Delete(_) => AccessMode::Delete,
            _ => AccessMode::Write,
        }
    }
}

/// What a preview produced: the target the token is scoped to, the parked
/// operation, and the text shown to the caller.
#[derive(Debug)]
pub(crate) struct Preview {
    pub(crate) target: String,
    pub(crate) parked: Parked,
    pub(crate) text: String,
}

/// Result of dispatching a request.
#[derive(Debug)]
pub(crate) enum Step {
    /// Ran to completion.
    Done(String),
    /// Needs a confirmation token.
    Confirm(Preview),
}

/// Digest of whatever is on disk at `path`.
///
/// Files hash their content; directories hash their recursive listing of
/// relative paths, kinds and sizes; a missing path is the "absent" marker.
pub(crate) fn disk_digest(path: &Path) -> String {
    match std::fs::symlink_metadata(path) {
        Err(_) => content_digest(None),
        Ok(meta) if meta.file_type().is_symlink() => match std::fs::read_link(path) {
            Ok(link) => content_digest(Some(format!("l {}", link.display()).as_bytes())),
            Err(e) => format!("unreadable:{}", e.kind()),
        },
        Ok(meta) if meta.is_dir() => {
            let mut listing = String::new();
            for entry in WalkDir::new(path).sort_by_file_name().into_iter().flatten() {
                let rel = entry.path().strip_prefix(path).unwrap_or(entry.path());
                let size = entry.metadata().map(|m| m.len()).unwrap_or_default();
                let kind = if entry.file_type().is_dir() { 'd' } else { 'f' };
                let _ = writeln!(listing, "{kind} {} {size}", rel.display());
            }
            content_digest(Some(listing.as_bytes()))
        },
        Ok(_) => match std::fs::read(path) {
            Ok(bytes) => content_digest(Some(&bytes)),
            Err(e) => format!("unreadable:{}", e.kind()),
        },
    }
}
