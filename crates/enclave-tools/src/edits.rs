//! Smart edits, file inspection and multi-file edit blocks.

use enclave_approval::content_digest;
use enclave_core::{EditInstruction, EngineError, EngineResult};
use enclave_edit::{
    EditEngine, InspectRequest, creation_diff, inspect, parse_block_changes, unified_diff,
};
use enclave_workspace::AccessMode;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use crate::context::{SessionContext, read_optional};
use crate::pending::{FileTarget, Parked, PendingOp, Preview, StagedFile, Step};

/// Label used for errors in block text that names no file.
const BLOCK_SOURCE: &str = "edit block";

pub(crate) async fn preview_smart_edit(
    ctx: &SessionContext,
    path: &str,
    edit: &EditInstruction,
) -> EngineResult<Step> {
    let mode = match edit {
        EditInstruction::Write { .. } | EditInstruction::Append { .. } => AccessMode::Write,
        _ => AccessMode::Read,
    };
    let target = ctx.target(path, mode)?;
    let bytes = read_optional(&target).await?;
    let current = bytes
        .clone()
        .map(EditEngine::decode)
        .transpose()
        .map_err(|e| e.into_engine(&target.display))?;

    let preview = ctx
        .edits
        .preview(&target.display, edit, current.as_deref())
        .map_err(|e| e.into_engine(&target.display))?;
    if current.as_deref() == Some(preview.content.as_str()) {
        return Ok(Step::Done(format!("No changes to {}", target.display)));
    }

    debug!(
        path = %target.display,
        kind = edit.kind_name(),
        added = preview.added,
        removed = preview.removed,
        "Previewed edit"
    );
    let text = format!(
        "{} {}: +{} -{} lines\n\n{}",
        edit.kind_name(),
        target.display,
        preview.added,
        preview.removed,
        preview.diff
    );
    let digests = vec![(target.path.clone(), content_digest(bytes.as_deref()))];
    Ok(Step::Confirm(Preview {
        target: target.display.clone(),
        parked: Parked::new(
            PendingOp::Write(StagedFile {
                target,
                content: preview.content,
            }),
            digests,
        ),
        text,
    }))
}

pub(crate) async fn inspect_file(
    ctx: &SessionContext,
    path: &str,
    function: Option<&str>,
    pattern: Option<&str>,
    regex: bool,
) -> EngineResult<String> {
    let target = ctx.target(path, AccessMode::Read)?;
    let bytes = tokio::fs::read(&target.path)
        .await
        .map_err(|e| EngineError::io(&target.display, &e))?;
    let content = EditEngine::decode(bytes).map_err(|e| e.into_engine(&target.display))?;
    let request = InspectRequest {
        function,
        pattern,
        regex,
    };
    inspect(&target.display, &content, &request).map_err(|e| e.into_engine(&target.display))
}

/// One file touched by an edit block set.
struct BlockFile {
    target: FileTarget,
    original: Option<Vec<u8>>,
    current: Option<String>,
}

pub(crate) async fn preview_edit_blocks(ctx: &SessionContext, text: &str) -> EngineResult<Step> {
    let changes = parse_block_changes(text).map_err(|e| e.into_engine(BLOCK_SOURCE))?;

    let mut files: BTreeMap<PathBuf, BlockFile> = BTreeMap::new();
    for change in &changes {
        let target = ctx.target(change.path(), AccessMode::Write)?;
        let key = target.path.clone();
        if !files.contains_key(&key) {
            let original = read_optional(&target).await?;
            let current = original
                .clone()
                .map(EditEngine::decode)
                .transpose()
                .map_err(|e| e.into_engine(&target.display))?;
            files.insert(
                key.clone(),
                BlockFile {
                    target,
                    original,
                    current,
                },
            );
        }
        if let Some(file) = files.get_mut(&key) {
            let updated = change
                .apply(file.current.as_deref())
                .map_err(|e| e.into_engine(&file.target.display))?;
            file.current = Some(updated);
        }
    }

    let mut diff = String::new();
    let mut staged = Vec::new();
    let mut digests = Vec::new();
    for file in files.into_values() {
        let Some(content) = file.current else {
            continue;
        };
        let old = file.original.as_deref().map(String::from_utf8_lossy);
        if old.as_deref() == Some(content.as_str()) {
            continue;
        }
        diff.push_str(&match &old {
            Some(old) => unified_diff(&file.target.display, old, &content),
            None => creation_diff(&file.target.display, &content),
        });
        digests.push((file.target.path.clone(), content_digest(file.original.as_deref())));
        staged.push(StagedFile {
            target: file.target,
            content,
        });
    }

    if staged.is_empty() {
        return Ok(Step::Done("No changes from edit blocks".to_string()));
    }

    let names: Vec<&str> = staged.iter().map(|f| f.target.display.as_str()).collect();
    let target = names.join(", ");
    let text = format!(
        "{} block(s) across {} file(s): {target}\n\n{diff}",
        changes.len(),
        staged.len()
    );
    Ok(Step::Confirm(Preview {
        target,
        parked: Parked::new(PendingOp::WriteMany(staged), digests),
        text,
    }))
}
