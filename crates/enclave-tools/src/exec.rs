//! Child process execution with timeout and cancellation.

use enclave_core::{EngineError, EngineResult, RequestId};
use std::fmt::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::truncate::cap_output;

/// Captured result of a finished child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessOutput {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    /// `None` when the child was killed by a signal.
    pub(crate) code: Option<i32>,
}

impl ProcessOutput {
    /// `STDOUT:` and `STDERR:` sections (when non-empty) and the exit code.
    pub(crate) fn render(&self, max_bytes: usize) -> String {
        let mut out = String::new();
        if !self.stdout.is_empty() {
            let _ = writeln!(out, "STDOUT:\n{}", self.stdout.trim_end_matches('\n'));
        }
        if !self.stderr.is_empty() {
            let _ = writeln!(out, "STDERR:\n{}", self.stderr.trim_end_matches('\n'));
        }
        match self.code {
            Some(code) => {
                let _ = write!(out, "Exit code: {code}");
            },
            None => out.push_str("Exit code: terminated by signal"),
        }
        cap_output(out, max_bytes)
    }
}

/// A prepared child process.
pub(crate) struct Invocation<'a> {
    /// Text used in errors and logs.
    pub(crate) label: &'a str,
    pub(crate) timeout: Duration,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) request_id: &'a RequestId,
}

/// A shell command line run through `shell -c` in `cwd`.
pub(crate) fn shell_command(shell: &str, command: &str, cwd: &Path) -> Command {
    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(command).current_dir(cwd);
    cmd
}

/// `git --no-pager <args>` in `cwd`, without a shell and without prompts.
pub(crate) fn git_command(args: &[String], cwd: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("--no-pager")
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_PAGER", "cat");
    cmd
}

/// Run `cmd` to completion, killing it on timeout or cancellation.
///
/// # Errors
///
/// - [`EngineError::CommandTimedOut`] when the timeout fires
/// - [`EngineError::Cancelled`] when the request is cancelled
/// - [`EngineError::Io`] when the process cannot be spawned
pub(crate) async fn run(mut cmd: Command, invocation: Invocation<'_>) -> EngineResult<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| EngineError::io(invocation.label, &e))?;
    debug!(command = %invocation.label, pid = ?child.id(), "Spawned child process");

    // Dropping the wait future drops the child, and kill_on_drop reaps it.
    tokio::select! {
        result = child.wait_with_output() => {
            let output = result.map_err(|e| EngineError::io(invocation.label, &e))?;
            let code = output.status.code();
            info!(command = %invocation.label, ?code, "Command finished");
            Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                code,
            })
        },
        () = tokio::time::sleep(invocation.timeout) => {
            warn!(command = %invocation.label, timeout = ?invocation.timeout, "Command timed out, killed");
            Err(EngineError::CommandTimedOut {
                command: invocation.label.to_string(),
                timeout_ms: u64::try_from(invocation.timeout.as_millis()).unwrap_or(u64::MAX),
            })
        },
        () = invocation.cancel.cancelled() => {
            info!(command = %invocation.label, "Command cancelled, killed");
            Err(EngineError::Cancelled {
                request_id: invocation.request_id.to_string(),
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::ErrorKind;

    fn invocation<'a>(
        label: &'a str,
        timeout: Duration,
        cancel: &'a CancellationToken,
        id: &'a RequestId,
    ) -> Invocation<'a> {
        Invocation {
            label,
            timeout,
            cancel,
            request_id: id,
        }
    }

    #[tokio::test]
    async fn test_stdout_stderr_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let id = RequestId::from("r");
        let line = "echo hello; echo oops >&2; exit 3";
        let output = run(
            shell_command("sh", line, dir.path()),
            invocation(line, Duration::from_secs(10), &cancel, &id),
        )
        .await
        .unwrap();
        assert_eq!(output.code, Some(3));
        let text = output.render(1000);
        assert_eq!(text, "STDOUT:\nhello\nSTDERR:\noops\nExit code: 3");
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let cancel = CancellationToken::new();
        let id = RequestId::from("r");
        let output = run(
            shell_command("sh", "ls", dir.path()),
            invocation("ls", Duration::from_secs(10), &cancel, &id),
        )
        .await
        .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let id = RequestId::from("r");
        let started = std::time::Instant::now();
        let err = run(
            shell_command("sh", "sleep 10", dir.path()),
            invocation("sleep 10", Duration::from_millis(100), &cancel, &id),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandTimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancel_kills() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let id = RequestId::from("r9");
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = run(
            shell_command("sh", "sleep 10", dir.path()),
            invocation("sleep 10", Duration::from_secs(30), &cancel, &id),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled { ref request_id } if request_id == "r9"));
    }

    #[test]
    fn test_render_truncates() {
        let output = ProcessOutput {
            stdout: "x".repeat(100),
            stderr: String::new(),
            code: Some(0),
        };
        let text = output.render(20);
        assert!(text.contains("output truncated"));
        assert!(!text.contains("STDERR"));
    }
}
