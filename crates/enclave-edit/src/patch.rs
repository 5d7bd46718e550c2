//! Unified diff input for edit blocks.
//!
//! ```text
//! --- a/src/lib.rs
//! +++ b/src/lib.rs
//! @@ -3,2 +3,2 @@
//!  fn keep() {}
//! -fn old() {}
//! +fn new() {}
//! ```
//!
//! Hunks apply at the line numbers their headers state. Every context and
//! removed line must equal the file's line exactly: there is no offset
//! search and no fuzzy fallback. An old side of `/dev/null` creates the file.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{EditError, EditResult};
use crate::lines::{LineEnding, split_lines, strip_terminator};

static HUNK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("invalid regex")
});

const DEV_NULL: &str = "/dev/null";

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    /// Unchanged line that must be present.
    Context(String),
    /// Line that must be present and is dropped.
    Remove(String),
    /// Line that is inserted.
    Add(String),
}

/// A `@@` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-indexed first old line, as written in the header.
    pub old_start: usize,
    /// Body lines in order.
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    fn old_len(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| !matches!(l, HunkLine::Add(_)))
            .count()
    }

    /// 0-indexed line the hunk starts replacing at. A hunk with no old lines
    /// inserts after `old_start`.
    fn start_index(&self) -> usize {
        if self.old_len() == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }
}

/// Every hunk for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Path from the `+++` header, without a `b/` prefix.
    pub path: String,
    /// The old side is `/dev/null`.
    pub creates: bool,
    /// Hunks in ascending order.
    pub hunks: Vec<Hunk>,
}

/// Whether `text` carries unified diff file headers and hunks.
#[must_use]
pub fn is_unified_diff(text: &str) -> bool {
    let mut lines = text.lines().peekable();
    let mut headers = false;
    while let Some(line) = lines.next() {
        if line.starts_with("--- ") && lines.peek().is_some_and(|n| n.starts_with("+++ ")) {
            headers = true;
        }
        if headers && HUNK.is_match(line) {
            return true;
        }
    }
    false
}

/// Parse every file section in a unified diff.
///
/// # Errors
///
/// Returns [`EditError::MalformedBlock`] for a deletion (`+++ /dev/null`),
/// a header without hunks, a hunk whose body disagrees with its counts,
/// overlapping hunks, or text with no file headers at all.
pub fn parse_unified_diff(text: &str) -> EditResult<Vec<FilePatch>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut patches = Vec::new();
    let mut index = 0;

    while let Some(line) = lines.get(index) {
        let next = index.saturating_add(1);
        let new_header = lines.get(next).and_then(|l| l.strip_prefix("+++ "));
        let (Some(old), Some(new)) = (line.strip_prefix("--- "), new_header) else {
            index = next;
            continue;
        };
        // 1-indexed lines of the two headers.
        let (old_line, new_line) = (next, next.saturating_add(1));

        let path = match header_path(new) {
            "" => return Err(malformed(new_line, "missing file path in +++ header")),
            DEV_NULL => {
                return Err(malformed(
                    new_line,
                    "file deletion is not supported here, use delete_path",
                ));
            },
            path => path.to_string(),
        };
        let creates = header_path(old) == DEV_NULL;
        index = index.saturating_add(2);

        let mut hunks: Vec<Hunk> = Vec::new();
        let mut next_free = 0usize;
        while let Some(caps) = lines.get(index).and_then(|l| HUNK.captures(l)) {
            let hunk_line = index.saturating_add(1);
            let (hunk, consumed) = parse_hunk(&lines, index, &caps)?;
            if hunk.start_index() < next_free {
                return Err(malformed(hunk_line, "hunks overlap or are out of order"));
            }
            next_free = hunk.start_index().saturating_add(hunk.old_len());
            hunks.push(hunk);
            index = consumed;
        }

        if hunks.is_empty() {
            return Err(malformed(old_line, "no hunks after file header"));
        }
        patches.push(FilePatch {
            path,
            creates,
            hunks,
        });
    }

    if patches.is_empty() {
        return Err(malformed(1, "no unified diff file headers found"));
    }
    Ok(patches)
}

/// Parse one hunk starting at its `@@` line. Returns the hunk and the index
/// of the first line after it.
fn parse_hunk(lines: &[&str], header: usize, caps: &Captures<'_>) -> EditResult<(Hunk, usize)> {
    let hunk_line = header.saturating_add(1);
    let old_start = count(caps, 1);
    let mut old_left = count(caps, 2);
    let mut new_left = count(caps, 4);

    let mut body = Vec::new();
    let mut index = hunk_line;
    while old_left > 0 || new_left > 0 {
        let Some(raw) = lines.get(index) else {
            return Err(malformed(hunk_line, "hunk ends before its line counts"));
        };
        index = index.saturating_add(1);
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        let (old_step, new_step, line) = match raw.chars().next() {
            Some('\\') => continue,
            None => (1, 1, HunkLine::Context(String::new())),
            Some(' ') => (1, 1, HunkLine::Context(raw[1..].to_string())),
            Some('-') => (1, 0, HunkLine::Remove(raw[1..].to_string())),
            Some('+') => (0, 1, HunkLine::Add(raw[1..].to_string())),
            Some(_) => return Err(malformed(index, "unexpected line inside hunk")),
        };
        let too_long = || malformed(hunk_line, "hunk is longer than its header states");
        old_left = old_left.checked_sub(old_step).ok_or_else(too_long)?;
        new_left = new_left.checked_sub(new_step).ok_or_else(too_long)?;
        body.push(line);
    }

    while lines.get(index).is_some_and(|l| l.starts_with('\\')) {
        index = index.saturating_add(1);
    }

    Ok((
        Hunk {
            old_start,
            lines: body,
        },
        index,
    ))
}

/// Apply a patch to the current content of its file (`None` if missing).
///
/// Line endings follow the existing file; created files end with a newline.
///
/// # Errors
///
/// - [`EditError::MissingFile`] if the file is missing and the patch does not create it
/// - [`EditError::AlreadyExists`] if a creating patch meets a non-empty file
/// - [`EditError::LineOutOfRange`] if a hunk starts past the end of the file
/// - [`EditError::HunkMismatch`] if a context or removed line differs
pub fn apply_patch(current: Option<&str>, patch: &FilePatch) -> EditResult<String> {
    let content = match (current, patch.creates) {
        (None, false) => return Err(EditError::MissingFile),
        (Some(existing), true) if !existing.is_empty() => return Err(EditError::AlreadyExists),
        (current, _) => current.unwrap_or_default(),
    };

    let ending = LineEnding::detect(content);
    let original: Vec<&str> = split_lines(content)
        .into_iter()
        .map(strip_terminator)
        .collect();

    let mut out: Vec<&str> = Vec::with_capacity(original.len());
    let mut cursor = 0usize;
    for (number, hunk) in (1usize..).zip(&patch.hunks) {
        let start = hunk.start_index();
        let Some(before) = original.get(cursor..start) else {
            return Err(EditError::LineOutOfRange {
                line: hunk.old_start,
                line_count: original.len(),
            });
        };
        out.extend_from_slice(before);

        let mut at = start;
        for line in &hunk.lines {
            let expected = match line {
                HunkLine::Add(text) => {
                    out.push(text);
                    continue;
                },
                HunkLine::Context(text) | HunkLine::Remove(text) => text,
            };
            let found = original.get(at).copied();
            if found != Some(expected.as_str()) {
                return Err(EditError::HunkMismatch {
                    hunk: number,
                    line: at.saturating_add(1),
                    expected: expected.clone(),
                    found: found.map(String::from),
                });
            }
            if matches!(line, HunkLine::Context(_)) {
                out.push(expected);
            }
            at = at.saturating_add(1);
        }
        cursor = at;
    }
    out.extend_from_slice(original.get(cursor..).unwrap_or_default());

    let mut result = out.join(ending.as_str());
    if !out.is_empty() && (content.is_empty() || content.ends_with('\n')) {
        result.push_str(ending.as_str());
    }
    Ok(result)
}

fn header_path(raw: &str) -> &str {
    let name = raw.split('\t').next().unwrap_or(raw).trim();
    name.strip_prefix("a/")
        .or_else(|| name.strip_prefix("b/"))
        .unwrap_or(name)
}

fn count(caps: &Captures<'_>, group: usize) -> usize {
    caps.get(group)
        .map_or(Some(1), |m| m.as_str().parse().ok())
        .unwrap_or(usize::MAX)
}

fn malformed(line: usize, reason: &str) -> EditError {
    EditError::MalformedBlock {
        line,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENAME: &str = "\
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,3 @@
 fn keep() {}
-fn old() {}
+fn new() {}
 fn tail() {}
";

    #[test]
    fn test_detects_unified_diff() {
        assert!(is_unified_diff(RENAME));
        assert!(!is_unified_diff("a.txt\n<<<<<<< SEARCH\nx\n=======\ny\n>>>>>>> REPLACE\n"));
        assert!(!is_unified_diff("@@ -1 +1 @@\n-x\n+y\n"));
    }

    #[test]
    fn test_parse_single_file() {
        let patches = parse_unified_diff(RENAME).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].path, "src/lib.rs");
        assert!(!patches[0].creates);
        assert_eq!(patches[0].hunks[0].old_start, 1);
        assert_eq!(patches[0].hunks[0].lines[1], HunkLine::Remove("fn old() {}".into()));
    }

    #[test]
    fn test_apply_exact_hunk() {
        let patch = &parse_unified_diff(RENAME).unwrap()[0];
        let out = apply_patch(Some("fn keep() {}\nfn old() {}\nfn tail() {}\nfn end() {}\n"), patch)
            .unwrap();
        assert_eq!(out, "fn keep() {}\nfn new() {}\nfn tail() {}\nfn end() {}\n");
    }

    #[test]
    fn test_context_must_match_exactly() {
        let patch = &parse_unified_diff(RENAME).unwrap()[0];
        let err = apply_patch(Some("fn keep() {}\nfn  old() {}\nfn tail() {}\n"), patch)
            .unwrap_err();
        assert!(matches!(
            err,
            EditError::HunkMismatch { hunk: 1, line: 2, ref found, .. }
                if found.as_deref() == Some("fn  old() {}")
        ));
    }

    #[test]
    fn test_hunk_is_not_moved_to_another_offset() {
        let patch = &parse_unified_diff(RENAME).unwrap()[0];
        let shifted = "// header\nfn keep() {}\nfn old() {}\nfn tail() {}\n";
        assert!(matches!(
            apply_patch(Some(shifted), patch),
            Err(EditError::HunkMismatch { line: 1, .. })
        ));
    }

    #[test]
    fn test_create_from_dev_null() {
        let text = "--- /dev/null\n+++ b/docs/new.md\n@@ -0,0 +1,2 @@\n+# New\n+body\n";
        let patch = &parse_unified_diff(text).unwrap()[0];
        assert!(patch.creates);
        assert_eq!(apply_patch(None, patch).unwrap(), "# New\nbody\n");
        assert!(matches!(
            apply_patch(Some("taken\n"), patch),
            Err(EditError::AlreadyExists)
        ));
    }

    #[test]
    fn test_multiple_hunks_and_crlf() {
        let text = "\
--- a.txt
+++ a.txt
@@ -1,2 +1,2 @@
-one
+ONE
 two
@@ -4,0 +5 @@
+five
";
        let patch = &parse_unified_diff(text).unwrap()[0];
        let out = apply_patch(Some("one\r\ntwo\r\nthree\r\nfour\r\n"), patch).unwrap();
        assert_eq!(out, "ONE\r\ntwo\r\nthree\r\nfour\r\nfive\r\n");
    }

    #[test]
    fn test_parse_errors() {
        let deletion = "--- a/x.txt\n+++ /dev/null\n@@ -1 +0,0 @@\n-x\n";
        assert!(matches!(
            parse_unified_diff(deletion),
            Err(EditError::MalformedBlock { line: 2, .. })
        ));
        let short = "--- a/x.txt\n+++ b/x.txt\n@@ -1,3 +1,3 @@\n x\n";
        assert!(matches!(
            parse_unified_diff(short),
            Err(EditError::MalformedBlock { line: 3, .. })
        ));
        let overlap = "--- x\n+++ x\n@@ -1,2 +1,2 @@\n a\n b\n@@ -2 +2 @@\n-b\n+c\n";
        assert!(matches!(
            parse_unified_diff(overlap),
            Err(EditError::MalformedBlock { line: 6, .. })
        ));
        assert!(parse_unified_diff("plain text").is_err());
    }

    #[test]
    fn test_missing_file_needs_creation_header() {
        let patch = &parse_unified_diff(RENAME).unwrap()[0];
        assert!(matches!(apply_patch(None, patch), Err(EditError::MissingFile)));
    }
}
