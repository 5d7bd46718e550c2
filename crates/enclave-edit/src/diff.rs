//! Unified diff previews.

use std::fmt::Write;

use similar::{ChangeTag, TextDiff};

/// Context lines around each hunk.
const CONTEXT_RADIUS: usize = 3;

/// Diff between two versions of `path`.
#[must_use]
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return format!("No changes to {path}\n");
    }
    render(&format!("a/{path}"), &format!("b/{path}"), old, new)
}

/// Diff for a file that does not exist yet.
#[must_use]
pub fn creation_diff(path: &str, new: &str) -> String {
    render("/dev/null", &format!("b/{path}"), "", new)
}

/// Diff for a file about to be removed.
#[must_use]
pub fn deletion_diff(path: &str, old: &str) -> String {
    render(&format!("a/{path}"), "/dev/null", old, "")
}

/// Lines added and removed.
#[must_use]
pub fn stats(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    let mut added: usize = 0;
    let mut removed: usize = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added = added.saturating_add(1),
            ChangeTag::Delete => removed = removed.saturating_add(1),
            ChangeTag::Equal => {},
        }
    }
    (added, removed)
}

fn render(from: &str, to: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();
    let _ = writeln!(output, "--- {from}");
    let _ = writeln!(output, "+++ {to}");
    for hunk in diff.unified_diff().context_radius(CONTEXT_RADIUS).iter_hunks() {
        let _ = write!(output, "{hunk}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff_headers_and_hunk() {
        let diff = unified_diff("notes.txt", "a\nb\nc\n", "a\nB\nc\n");
        assert!(diff.starts_with("--- a/notes.txt\n+++ b/notes.txt\n"));
        assert!(diff.contains("-b\n"));
        assert!(diff.contains("+B\n"));
        assert!(diff.contains("@@"));
    }

    #[test]
    fn test_creation_diff() {
        let diff = creation_diff("notes.txt", "hello");
        assert!(diff.starts_with("--- /dev/null\n+++ b/notes.txt\n"));
        assert!(diff.contains("+hello"));
    }

    #[test]
    fn test_deletion_diff() {
        let diff = deletion_diff("old.txt", "bye\n");
        assert!(diff.contains("+++ /dev/null"));
        assert!(diff.contains("-bye"));
    }

    #[test]
    fn test_no_changes() {
        assert_eq!(unified_diff("x", "same\n", "same\n"), "No changes to x\n");
    }

    #[test]
    fn test_stats() {
        assert_eq!(stats("a\nb\n", "a\nc\nd\n"), (2, 1));
    }
}
