//! Integration tests for project-root confinement and the command policy.

mod common;

use common::{kind, read, run, write};
use enclave_core::{ErrorKind, Operation};
use enclave_test::{TempProject, test_engine};

#[tokio::test]
async fn test_parent_traversal_rejected() {
    let project = TempProject::new();
    let engine = project.engine();

    let response = run(&engine, read("../../etc/passwd")).await;
    assert_eq!(kind(&response), ErrorKind::OutsideProjectRoot);
}

#[tokio::test]
async fn test_absolute_path_outside_root_rejected() {
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
    let project = TempProject::new();
    let engine = project.engine();

    let target = outside.path().join("secret.txt");
    let response = run(&engine, read(&target.display().to_string())).await;
    assert_eq!(kind(&response), ErrorKind::OutsideProjectRoot);

    let response = run(&engine, write(&target.display().to_string(), "x")).await;
    assert_eq!(kind(&response), ErrorKind::OutsideProjectRoot);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "s");
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_out_of_root_rejected() {
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("data.txt"), "outside").unwrap();
    let project = TempProject::new();
    std::os::unix::fs::symlink(outside.path(), project.path("link")).unwrap();
    let engine = test_engine(project.root());

    let response = run(&engine, read("link/data.txt")).await;
    assert_eq!(kind(&response), ErrorKind::OutsideProjectRoot);
}

#[tokio::test]
async fn test_paths_inside_root_are_served() {
    let project = TempProject::new().with_file("src/main.rs", "fn main() {}\n");
    let engine = project.engine();

    let response = run(&engine, read("src/../src/main.rs")).await;
    assert_eq!(response.output(), Some("fn main() {}\n"));

    let response = run(
        &engine,
        Operation::ListDirectory {
            path: ".".into(),
            max_depth: None,
        },
    )
    .await;
    assert!(response.output().unwrap().contains("main.rs"));
}

#[tokio::test]
async fn test_chained_commands_never_run() {
    let project = TempProject::new();
    let engine = project.engine();

    for command in [
        "ls; rm -rf /",
        "ls && rm -rf .",
        "ls | sh",
        "echo $(touch pwned)",
        "echo `touch pwned`",
    ] {
        let response = run(
            &engine,
            Operation::RunCommand {
                command: command.into(),
                timeout_ms: None,
            },
        )
        .await;
        assert_eq!(kind(&response), ErrorKind::UnsafeCommand, "{command}");
    }
    assert!(!project.exists("pwned"));
}

#[tokio::test]
async fn test_allowed_command_runs_in_root() {
    let project = TempProject::new().with_file("marker.txt", "m");
    let engine = project.engine();

    let response = run(
        &engine,
        Operation::RunCommand {
            command: "ls".into(),
            timeout_ms: None,
        },
    )
    .await;
    let output = response.output().unwrap();
    assert!(output.contains("marker.txt"));
    assert!(output.contains("Exit code: 0"));
}

#[tokio::test]
async fn test_force_push_blocked() {
    let project = TempProject::new();
    let engine = project.engine();

    for command in ["push --force", "push --force origin main", "reset --hard HEAD~1"] {
        let response = run(
            &engine,
            Operation::Git {
                command: command.into(),
            },
        )
        .await;
        assert_eq!(kind(&response), ErrorKind::UnsafeCommand, "{command}");
    }
}
