//! Executing redeemed confirmations.
//!
//! The token is consumed before anything else happens, so a confirm that
//! fails afterwards (busy, changed on disk, cancelled) still requires a new
//! preview.

use enclave_core::{EngineError, EngineResult, RequestId};
use enclave_edit::StagedWrite;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::commands::{execute_command, execute_git};
use crate::context::SessionContext;
use crate::pending::{FileTarget, Parked, PendingOp, StagedFile, disk_digest};

pub(crate) async fn confirm(
    ctx: &SessionContext,
    request_id: &RequestId,
    token: &str,
    fingerprint: &str,
    cancel: &CancellationToken,
) -> EngineResult<String> {
    let pending = ctx.confirmations.redeem(token, fingerprint)?;
    let Parked { op, digests } = pending.operation;

    match op {
        PendingOp::Command { command, timeout } => {
            execute_command(ctx, request_id, &command, timeout, cancel).await
        },
        PendingOp::Git { args, line } => execute_git(ctx, request_id, &args, &line, cancel).await,
        op => {
            let keys: Vec<String> = op
                .targets()
                .iter()
                .map(|t| t.path.display().to_string())
                .collect();
            let _locks = ctx.locks.acquire(&keys).await?;
            verify_unchanged(ctx, &op, &digests)?;

            match op {
                PendingOp::Write(file) => write_files(request_id, vec![file], cancel).await,
                PendingOp::WriteMany(files) => write_files(request_id, files, cancel).await,
                PendingOp::Delete(target) => delete(request_id, &target, cancel).await,
                PendingOp::Command { .. } | PendingOp::Git { .. } => Err(EngineError::invalid(
                    "command confirmations are not file operations",
                )),
            }
        },
    }
}

/// Every target must still resolve to the same place and hold the content
/// the preview was computed from.
fn verify_unchanged(
    ctx: &SessionContext,
    op: &PendingOp,
    digests: &[(std::path::PathBuf, String)],
) -> EngineResult<()> {
    let mode = op.access_mode();
    for target in op.targets() {
        let resolved = ctx.guard.resolve(&target.requested, mode)?;
        if resolved != target.path {
            return Err(EngineError::FingerprintMismatch {
                target: target.display.clone(),
                reason: "the path now resolves to a different location".to_string(),
            });
        }
        let expected = digests.iter().find(|(path, _)| *path == target.path);
        if let Some((_, digest)) = expected
            && disk_digest(&target.path) != *digest
        {
            info!(path = %target.display, "Target changed since preview");
            return Err(EngineError::FingerprintMismatch {
                target: target.display.clone(),
                reason: "changed on disk since preview".to_string(),
            });
        }
    }
    Ok(())
}

async fn write_files(
    request_id: &RequestId,
    files: Vec<StagedFile>,
    cancel: &CancellationToken,
) -> EngineResult<String> {
    let cancelled = || EngineError::Cancelled {
        request_id: request_id.to_string(),
    };
    if cancel.is_cancelled() {
        info!("Edit abandoned before staging");
        return Err(cancelled());
    }

    let mut staged = Vec::with_capacity(files.len());
    for file in &files {
        if let Some(parent) = file.target.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::io(&file.target.display, &e))?;
        }
        let write = StagedWrite::stage(&file.target.path, file.content.as_bytes())
            .map_err(|e| e.into_engine(&file.target.display))?;
        staged.push((write, &file.target));
    }

    // Dropping the staged writes removes their temp files.
    if cancel.is_cancelled() {
        info!("Edit abandoned before commit");
        return Err(cancelled());
    }

    for (write, target) in staged {
        write.commit().map_err(|e| e.into_engine(&target.display))?;
        info!(path = %target.display, "Wrote file");
    }

    Ok(match files.as_slice() {
        [file] => format!(
            "Wrote {} bytes to {}",
            file.content.len(),
            file.target.display
        ),
        _ => {
            let names: Vec<&str> = files.iter().map(|f| f.target.display.as_str()).collect();
            format!("Updated {} files: {}", files.len(), names.join(", "))
        },
    })
}

async fn delete(
    request_id: &RequestId,
    target: &FileTarget,
    cancel: &CancellationToken,
) -> EngineResult<String> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled {
            request_id: request_id.to_string(),
        });
    }
    let meta = tokio::fs::symlink_metadata(&target.path)
        .await
        .map_err(|e| EngineError::io(&target.display, &e))?;
    let result = if meta.is_dir() {
        tokio::fs::remove_dir_all(&target.path).await
    } else {
        tokio::fs::remove_file(&target.path).await
    };
    result.map_err(|e| EngineError::io(&target.display, &e))?;
    info!(path = %target.display, "Deleted path");
    Ok(format!("Deleted {}", target.display))
}
