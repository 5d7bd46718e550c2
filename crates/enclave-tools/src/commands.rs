//! `run_command` and `git`: gate, then run or park.

use enclave_core::{EngineError, EngineResult, RequestId};
use enclave_policy::{Verdict, split_git_command};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::context::SessionContext;
use crate::exec::{self, Invocation};
use crate::locks::GIT_RESOURCE;
use crate::pending::{Parked, PendingOp, Preview, Step};

pub(crate) async fn run_command(
    ctx: &SessionContext,
    request_id: &RequestId,
    command: &str,
    timeout_ms: Option<u64>,
    cancel: &CancellationToken,
) -> EngineResult<Step> {
    let verdict = ctx.policy.command.classify(command).into_result(command)?;
    let timeout = ctx.limits.command_timeout(timeout_ms);

    if verdict.verdict == Verdict::Allowed {
        return execute_command(ctx, request_id, command, timeout, cancel)
            .await
            .map(Step::Done);
    }

    info!(command = %command, reason = %verdict.reason, "Command held for confirmation");
    Ok(Step::Confirm(Preview {
        target: command.to_string(),
        parked: Parked::from_disk(PendingOp::Command {
            command: command.to_string(),
            timeout,
        }),
        text: format!("$ {command}\n\n{}\n", verdict.reason),
    }))
}

pub(crate) async fn execute_command(
    ctx: &SessionContext,
    request_id: &RequestId,
    command: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> EngineResult<String> {
    let output = exec::run(
        exec::shell_command(&ctx.limits.shell, command, ctx.root()),
        Invocation {
            label: command,
            timeout,
            cancel,
            request_id,
        },
    )
    .await?;
    Ok(output.render(ctx.limits.max_output_chars))
}

pub(crate) async fn git(
    ctx: &SessionContext,
    request_id: &RequestId,
    line: &str,
    cancel: &CancellationToken,
) -> EngineResult<Step> {
    let label = format!("git {line}");
    let verdict = ctx.policy.git.classify_line(line).into_result(&label)?;
    let args = split_git_command(line).map_err(|reason| EngineError::UnsafeCommand {
        command: label.clone(),
        matched: None,
        reason,
    })?;

    if !ctx.root().join(".git").exists() {
        return Err(EngineError::invalid(
            "the project root is not a git work tree",
        ));
    }

    if verdict.verdict == Verdict::Allowed {
        return execute_git(ctx, request_id, &args, &label, cancel)
            .await
            .map(Step::Done);
    }

    info!(command = %label, reason = %verdict.reason, "Git command held for confirmation");
    Ok(Step::Confirm(Preview {
        target: label.clone(),
        text: format!("$ {label}\n\n{}\n", verdict.reason),
        parked: Parked::from_disk(PendingOp::Git {
            args,
            line: label,
        }),
    }))
}

pub(crate) async fn execute_git(
    ctx: &SessionContext,
    request_id: &RequestId,
    args: &[String],
    label: &str,
    cancel: &CancellationToken,
) -> EngineResult<String> {
    let _repo = ctx.locks.acquire(&[GIT_RESOURCE.to_string()]).await?;
    let output = exec::run(
        exec::git_command(args, ctx.root()),
        Invocation {
            label,
            timeout: ctx.limits.command_timeout,
            cancel,
            request_id,
        },
    )
    .await?;
    Ok(output.render(ctx.limits.max_output_chars))
}
