//! Integration tests for smart edits, inspection and edit blocks, driven
//! through the engine with confirmation.

mod common;

use common::{kind, run, ticket};
use enclave_core::{EditInstruction, ErrorKind, MatchMode, Operation};
use enclave_test::{TempProject, confirm};
use enclave_tools::Engine;

const SERVICE: &str = "\
class Service:
    def start(self):
        self.running = True
        return self

    def stop(self):
        self.running = False
";

fn smart_edit(path: &str, edit: EditInstruction) -> Operation {
    Operation::SmartEdit {
        path: path.into(),
        edit,
    }
}

async fn apply(engine: &Engine, operation: Operation) {
    let preview = run(engine, operation).await;
    let response = run(engine, confirm(&ticket(&preview))).await;
    assert!(response.output().is_some(), "{response:?}");
}

#[tokio::test]
async fn test_single_replace_then_missing_pattern() {
    let project = TempProject::new().with_file("app.cfg", "mode = debug\nlevel = 2\n");
    let engine = project.engine();

    let replace = |pattern: &str| {
        smart_edit(
            "app.cfg",
            EditInstruction::Replace {
                pattern: pattern.into(),
                regex: false,
                multiline: false,
                content: "mode = release".into(),
                mode: MatchMode::Single,
            },
        )
    };

    apply(&engine, replace("mode = debug")).await;
    assert_eq!(project.read("app.cfg"), "mode = release\nlevel = 2\n");

    let response = run(&engine, replace("mode = debug")).await;
    assert_eq!(kind(&response), ErrorKind::PatternNotFound);
    assert_eq!(project.read("app.cfg"), "mode = release\nlevel = 2\n");
}

#[tokio::test]
async fn test_ambiguous_single_replace_reports_sites() {
    let project = TempProject::new().with_file("dup.txt", "x = 1\ny = 2\nx = 1\n");
    let engine = project.engine();

    let response = run(
        &engine,
        smart_edit(
            "dup.txt",
            EditInstruction::Replace {
                pattern: "x = 1".into(),
                regex: false,
                multiline: false,
                content: "x = 9".into(),
                mode: MatchMode::Single,
            },
        ),
    )
    .await;
    assert_eq!(kind(&response), ErrorKind::AmbiguousMatch);
    assert_eq!(project.read("dup.txt"), "x = 1\ny = 2\nx = 1\n");
}

#[tokio::test]
async fn test_replace_function_keeps_indentation() {
    let project = TempProject::new().with_file("service.py", SERVICE);
    let engine = project.engine();

    apply(
        &engine,
        smart_edit(
            "service.py",
            EditInstruction::ReplaceFunction {
                name: "start".into(),
                content: "def start(self):\n    self.running = True\n    self.log('up')\n    return self\n".into(),
            },
        ),
    )
    .await;

    assert_eq!(
        project.read("service.py"),
        "\
class Service:
    def start(self):
        self.running = True
        self.log('up')
        return self

    def stop(self):
        self.running = False
"
    );
}

#[tokio::test]
async fn test_insert_then_delete_restores_file() {
    let original = "first\nsecond\nthird\n";
    let project = TempProject::new().with_file("list.txt", original);
    let engine = project.engine();

    apply(
        &engine,
        smart_edit(
            "list.txt",
            EditInstruction::Insert {
                line: 2,
                content: "inserted".into(),
            },
        ),
    )
    .await;
    assert_eq!(project.read("list.txt"), "first\ninserted\nsecond\nthird\n");

    apply(
        &engine,
        smart_edit(
            "list.txt",
            EditInstruction::DeleteLines { start: 2, end: None },
        ),
    )
    .await;
    assert_eq!(project.read("list.txt"), original);
}

#[tokio::test]
async fn test_insert_past_end_is_out_of_range() {
    let project = TempProject::new().with_file("short.txt", "a\nb\n");
    let engine = project.engine();

    let response = run(
        &engine,
        smart_edit(
            "short.txt",
            EditInstruction::Insert {
                line: 10,
                content: "x".into(),
            },
        ),
    )
    .await;
    assert_eq!(kind(&response), ErrorKind::LineOutOfRange);
}

#[tokio::test]
async fn test_inspect_locates_function() {
    let project = TempProject::new().with_file("service.py", SERVICE);
    let engine = project.engine();

    let response = run(
        &engine,
        Operation::InspectFile {
            path: "service.py".into(),
            function: Some("stop".into()),
            pattern: None,
            regex: false,
        },
    )
    .await;
    let report = response.output().unwrap();
    assert!(report.starts_with("File: service.py\n"));
    assert!(report.contains("Function stop: lines 6-7"));
}

#[tokio::test]
async fn test_edit_block_spanning_two_files() {
    let project = TempProject::new().with_file("src/a.py", "import os\n\ndef old():\n    return 1\n");
    let engine = project.engine();

    let blocks = "\
src/a.py
<<<<<<< SEARCH
def old():
    return 1
=======
def new():
    return 2
>>>>>>> REPLACE

CHANGELOG.md
<<<<<<< SEARCH
=======
- renamed old to new
>>>>>>> REPLACE
";
    let preview = run(
        &engine,
        Operation::EditBlock {
            content: blocks.into(),
        },
    )
    .await;
    let ticket = ticket(&preview);
    assert!(ticket.preview.contains("src/a.py"));
    assert!(ticket.preview.contains("CHANGELOG.md"));
    assert!(!project.exists("CHANGELOG.md"));

    assert!(run(&engine, confirm(&ticket)).await.output().is_some());
    assert_eq!(project.read("src/a.py"), "import os\n\ndef new():\n    return 2\n");
    assert_eq!(project.read("CHANGELOG.md"), "- renamed old to new\n");
}

#[tokio::test]
async fn test_edit_block_failure_touches_nothing() {
    let project = TempProject::new()
        .with_file("a.txt", "alpha\n")
        .with_file("b.txt", "beta\n");
    let engine = project.engine();

    let blocks = "\
a.txt
<<<<<<< SEARCH
alpha
=======
ALPHA
>>>>>>> REPLACE

b.txt
<<<<<<< SEARCH
gamma
=======
GAMMA
>>>>>>> REPLACE
";
    let response = run(
        &engine,
        Operation::EditBlock {
            content: blocks.into(),
        },
    )
    .await;
    assert_eq!(kind(&response), ErrorKind::PatternNotFound);
    assert_eq!(project.read("a.txt"), "alpha\n");
    assert_eq!(project.read("b.txt"), "beta\n");
}

#[tokio::test]
async fn test_unified_diff_edits_and_creates_files() {
    let project = TempProject::new().with_file("src/lib.rs", "fn keep() {}\nfn old() {}\nfn tail() {}\n");
    let engine = project.engine();

    let diff = "\
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,3 @@
 fn keep() {}
-fn old() {}
+fn new() {}
 fn tail() {}
--- /dev/null
+++ b/docs/usage.md
@@ -0,0 +1,2 @@
+# Usage
+Call new().
";
    let preview = run(
        &engine,
        Operation::EditBlock {
            content: diff.into(),
        },
    )
    .await;
    let ticket = ticket(&preview);
    assert_eq!(ticket.target, "docs/usage.md, src/lib.rs");
    assert!(ticket.preview.contains("--- /dev/null\n+++ b/docs/usage.md"));
    assert!(!project.exists("docs/usage.md"));

    assert!(run(&engine, confirm(&ticket)).await.output().is_some());
    assert_eq!(project.read("src/lib.rs"), "fn keep() {}\nfn new() {}\nfn tail() {}\n");
    assert_eq!(project.read("docs/usage.md"), "# Usage\nCall new().\n");
}

#[tokio::test]
async fn test_unified_diff_with_stale_context_touches_nothing() {
    let project = TempProject::new()
        .with_file("a.txt", "alpha\nbeta\n")
        .with_file("b.txt", "one\ntwo\n");
    let engine = project.engine();

    let diff = "\
--- a/a.txt
+++ b/a.txt
@@ -1,2 +1,2 @@
-alpha
+ALPHA
 beta
--- a/b.txt
+++ b/b.txt
@@ -1,2 +1,2 @@
 one
-three
+THREE
";
    let response = run(
        &engine,
        Operation::EditBlock {
            content: diff.into(),
        },
    )
    .await;
    assert_eq!(kind(&response), ErrorKind::PatternNotFound);
    assert_eq!(project.read("a.txt"), "alpha\nbeta\n");
    assert_eq!(project.read("b.txt"), "one\ntwo\n");

    let creates_over_existing = "--- /dev/null\n+++ b/a.txt\n@@ -0,0 +1 @@\n+new\n";
    let response = run(
        &engine,
        Operation::EditBlock {
            content: creates_over_existing.into(),
        },
    )
    .await;
    assert_eq!(kind(&response), ErrorKind::InvalidRequest);
    assert_eq!(project.read("a.txt"), "alpha\nbeta\n");
}
