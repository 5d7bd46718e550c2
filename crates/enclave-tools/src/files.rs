//! File and directory operations.

use enclave_approval::content_digest;
use enclave_core::{EngineError, EngineResult};
use enclave_edit::{creation_diff, unified_diff};
use enclave_workspace::{AccessMode, TreeOptions, render_tree};
use std::fmt::Write;
use std::path::PathBuf;
use tracing::info;
use walkdir::WalkDir;

use crate::context::{SessionContext, read_optional};
use crate::pending::{Parked, PendingOp, Preview, StagedFile, Step};

/// Bytes inspected for NUL when detecting binary files.
const BINARY_PROBE: usize = 8192;
/// Characters of a file shown in a delete preview.
const DELETE_EXCERPT: usize = 200;

pub(crate) async fn read_file(
    ctx: &SessionContext,
    path: &str,
    offset: Option<usize>,
    limit: Option<usize>,
) -> EngineResult<String> {
    let target = ctx.target(path, AccessMode::Read)?;
    if target.path.is_dir() {
        return Err(EngineError::invalid(format!(
            "{}: is a directory; use list_directory",
            target.display
        )));
    }

    let raw = tokio::fs::read(&target.path)
        .await
        .map_err(|e| EngineError::io(&target.display, &e))?;
    let probe = raw.get(..raw.len().min(BINARY_PROBE)).unwrap_or_default();
    if probe.contains(&0) {
        return Err(EngineError::invalid(format!(
            "{} appears to be a binary file",
            target.display
        )));
    }
    let content = String::from_utf8(raw)
        .map_err(|_| EngineError::invalid(format!("{} is not valid UTF-8", target.display)))?;

    if offset.is_none() && limit.is_none() {
        return Ok(content);
    }

    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let first = offset.unwrap_or(1).max(1);
    let start = first.saturating_sub(1);
    if start >= lines.len() && !(lines.is_empty() && first == 1) {
        return Err(EngineError::LineOutOfRange {
            path: target.display,
            line: first,
            line_count: lines.len(),
        });
    }
    let take = limit.unwrap_or(usize::MAX);
    Ok(lines.iter().skip(start).take(take).copied().collect())
}

pub(crate) async fn list_directory(
    ctx: &SessionContext,
    path: &str,
    max_depth: Option<usize>,
) -> EngineResult<String> {
    let target = ctx.target(path, AccessMode::List)?;
    let options = TreeOptions::listing(
        max_depth.unwrap_or(ctx.limits.listing_depth),
        ctx.limits.listing_entries,
    );
    render_blocking(target.path, target.display, options).await
}

pub(crate) async fn project_structure(
    ctx: &SessionContext,
    max_depth: Option<usize>,
    max_entries: Option<usize>,
) -> EngineResult<String> {
    let root = ctx.root().to_path_buf();
    let label = root
        .file_name()
        .map_or_else(|| ".".to_string(), |n| n.to_string_lossy().into_owned());
    let options = TreeOptions::project(
        max_depth.unwrap_or(ctx.limits.structure_depth),
        max_entries.unwrap_or(ctx.limits.structure_entries),
    );
    render_blocking(root, label, options).await
}

async fn render_blocking(dir: PathBuf, label: String, options: TreeOptions) -> EngineResult<String> {
    let shown = label.clone();
    tokio::task::spawn_blocking(move || render_tree(&dir, &label, &options))
        .await
        .map_err(|e| EngineError::Io {
            path: shown,
            message: e.to_string(),
        })
}

pub(crate) async fn create_directory(ctx: &SessionContext, path: &str) -> EngineResult<String> {
    let target = ctx.target(path, AccessMode::CreateDirectory)?;
    if target.path.is_dir() {
        return Ok(format!("Directory already exists: {}", target.display));
    }
    tokio::fs::create_dir_all(&target.path)
        .await
        .map_err(|e| EngineError::io(&target.display, &e))?;
    info!(path = %target.display, "Created directory");
    Ok(format!("Created directory: {}", target.display))
}

pub(crate) async fn preview_write(
    ctx: &SessionContext,
    path: &str,
    content: &str,
) -> EngineResult<Step> {
    let target = ctx.target(path, AccessMode::Write)?;
    let current = read_optional(&target).await?;

    let text = match current.as_deref() {
        None => creation_diff(&target.display, content),
        Some(bytes) if bytes == content.as_bytes() => {
            return Ok(Step::Done(format!("No changes to {}", target.display)));
        },
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(old) => unified_diff(&target.display, old, content),
            Err(_) => format!(
                "Replace non-text file {} ({} bytes) with {} bytes of text\n",
                target.display,
                bytes.len(),
                content.len()
            ),
        },
    };

    let digests = vec![(target.path.clone(), content_digest(current.as_deref()))];
    Ok(Step::Confirm(Preview {
        target: target.display.clone(),
        parked: Parked::new(
            PendingOp::Write(StagedFile {
                target,
                content: content.to_string(),
            }),
            digests,
        ),
        text,
    }))
}

pub(crate) async fn preview_delete(ctx: &SessionContext, path: &str) -> EngineResult<Step> {
    let target = ctx.target(path, AccessMode::Delete)?;
    let meta = tokio::fs::symlink_metadata(&target.path)
        .await
        .map_err(|e| EngineError::io(&target.display, &e))?;

    let mut text = String::new();
    if meta.file_type().is_symlink() {
        let link = tokio::fs::read_link(&target.path)
            .await
            .map_err(|e| EngineError::io(&target.display, &e))?;
        let _ = writeln!(
            text,
            "Delete symlink {} -> {} (the target is kept)",
            target.display,
            link.display()
        );
    } else if meta.is_dir() {
        let (files, dirs) = WalkDir::new(&target.path)
            .min_depth(1)
            .into_iter()
            .flatten()
            .fold((0usize, 0usize), |(files, dirs), entry| {
                if entry.file_type().is_dir() {
                    (files, dirs.saturating_add(1))
                } else {
                    (files.saturating_add(1), dirs)
                }
            });
        let _ = writeln!(
            text,
            "Delete directory {}/ ({files} files, {dirs} subdirectories)",
            target.display
        );
    } else {
        let _ = writeln!(text, "Delete file {} ({} bytes)", target.display, meta.len());
        if let Some(bytes) = read_optional(&target).await?
            && let Ok(body) = std::str::from_utf8(&bytes)
            && !body.is_empty()
        {
            let excerpt: String = body.chars().take(DELETE_EXCERPT).collect();
            let _ = writeln!(text, "\n{excerpt}");
            if body.chars().nth(DELETE_EXCERPT).is_some() {
                text.push_str("...\n");
            }
        }
    }

    Ok(Step::Confirm(Preview {
        target: target.display.clone(),
        parked: Parked::from_disk(PendingOp::Delete(target)),
        text,
    }))
}
