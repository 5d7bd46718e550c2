//! The edit engine: instruction in, new content out.

use enclave_core::{EditInstruction, MatchMode};
use tracing::debug;

use crate::diff::{creation_diff, stats, unified_diff};
use crate::error::{EditError, EditResult};
use crate::function::replace_function;
use crate::lines::{LineEnding, is_terminated, offset_of_line, split_lines, strip_terminator};
use crate::matcher::{PatternOptions, find_sites, similar_lines, splice};

/// Suggestions attached to a pattern that matched nothing.
const SUGGESTIONS: usize = 5;

/// Result of previewing an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPreview {
    /// Content after the edit.
    pub content: String,
    /// Unified diff from the current content.
    pub diff: String,
    /// Lines added.
    pub added: usize,
    /// Lines removed.
    pub removed: usize,
}

/// Applies [`EditInstruction`]s to in-memory content.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditEngine;

impl EditEngine {
    /// Create an engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Apply `edit` to `current` (`None` when the file does not exist).
    ///
    /// Only `write` and `append` accept a missing file.
    ///
    /// # Errors
    ///
    /// - [`EditError::MissingFile`] for other edits on a missing file
    /// - [`EditError::PatternNotFound`] / [`EditError::AmbiguousMatch`] from matching
    /// - [`EditError::LineOutOfRange`] for bad line numbers
    /// - [`EditError::InvalidRegex`] for a bad regex
    pub fn apply(&self, edit: &EditInstruction, current: Option<&str>) -> EditResult<String> {
        debug!(kind = edit.kind_name(), exists = current.is_some(), "Applying edit");
        match edit {
            EditInstruction::Write { content } => Ok(content.clone()),
            EditInstruction::Append { content } => Ok(append(current.unwrap_or(""), content)),
            EditInstruction::Insert { line, content } => {
                insert(current.ok_or(EditError::MissingFile)?, *line, content)
            },
            EditInstruction::Replace {
                pattern,
                regex,
                multiline,
                content,
                mode,
            } => pattern_edit(
                current.ok_or(EditError::MissingFile)?,
                pattern,
                content,
                PatternOptions {
                    regex: *regex,
                    multiline: *multiline,
                },
                *mode,
            ),
            EditInstruction::Delete {
                pattern,
                regex,
                multiline,
                mode,
            } => pattern_edit(
                current.ok_or(EditError::MissingFile)?,
                pattern,
                "",
                PatternOptions {
                    regex: *regex,
                    multiline: *multiline,
                },
                *mode,
            ),
            EditInstruction::DeleteLines { start, end } => delete_lines(
                current.ok_or(EditError::MissingFile)?,
                *start,
                end.unwrap_or(*start),
            ),
            EditInstruction::ReplaceFunction { name, content } => {
                replace_function(current.ok_or(EditError::MissingFile)?, name, content)
            },
        }
    }

    /// Apply `edit` and render the change as a diff against `path`.
    ///
    /// # Errors
    ///
    /// See [`EditEngine::apply`].
    pub fn preview(
        &self,
        path: &str,
        edit: &EditInstruction,
        current: Option<&str>,
    ) -> EditResult<EditPreview> {
        let content = self.apply(edit, current)?;
        let diff = match current {
            Some(old) => unified_diff(path, old, &content),
            None => creation_diff(path, &content),
        };
        let (added, removed) = stats(current.unwrap_or(""), &content);
        Ok(EditPreview {
            content,
            diff,
            added,
            removed,
        })
    }

    /// Decode file bytes for editing.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::NotText`] for content that is not UTF-8.
    pub fn decode(bytes: Vec<u8>) -> EditResult<String> {
        String::from_utf8(bytes).map_err(|_| EditError::NotText)
    }
}

fn append(current: &str, text: &str) -> String {
    let ending = LineEnding::detect(current);
    let mut out = current.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push_str(ending.as_str());
    }
    out.push_str(&ending.apply(text));
    out
}

fn insert(content: &str, line: usize, text: &str) -> EditResult<String> {
    let lines = split_lines(content);
    let count = lines.len();
    if line == 0 || line > count.saturating_add(1) {
        return Err(EditError::LineOutOfRange {
            line,
            line_count: count,
        });
    }

    let ending = LineEnding::detect(content);
    let body = ending.apply(text);
    let at_open_end = line > count && !content.is_empty() && !content.ends_with('\n');
    let inserted = if at_open_end {
        // The file's last line has no terminator: the new text becomes the
        // new unterminated last line.
        format!("{}{}", ending.as_str(), strip_terminator(&body))
    } else if body.ends_with('\n') {
        body
    } else {
        format!("{body}{}", ending.as_str())
    };

    let offset = offset_of_line(&lines, line);
    let mut out = String::with_capacity(content.len().saturating_add(inserted.len()));
    out.push_str(&content[..offset]);
    out.push_str(&inserted);
    out.push_str(&content[offset..]);
    Ok(out)
}

fn delete_lines(content: &str, start: usize, end: usize) -> EditResult<String> {
    let lines = split_lines(content);
    let count = lines.len();
    if start == 0 || start > count {
        return Err(EditError::LineOutOfRange {
            line: start,
            line_count: count,
        });
    }
    if end < start || end > count {
        return Err(EditError::LineOutOfRange {
            line: end,
            line_count: count,
        });
    }

    let mut from = offset_of_line(&lines, start);
    let to = offset_of_line(&lines, end.saturating_add(1));
    let removes_open_end = end == count && lines.last().is_some_and(|l| !is_terminated(l));
    if removes_open_end
        && let Some(previous) = start.checked_sub(2).and_then(|i| lines.get(i))
    {
        // Keep the file unterminated: the previous line gives up its terminator.
        from = from.saturating_sub(previous.len().saturating_sub(strip_terminator(previous).len()));
    }

    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..from]);
    out.push_str(&content[to..]);
    Ok(out)
}

fn pattern_edit(
    content: &str,
    pattern: &str,
    replacement: &str,
    options: PatternOptions,
    mode: MatchMode,
) -> EditResult<String> {
    let sites = find_sites(content, pattern, replacement, options)?;
    if sites.is_empty() {
        return Err(EditError::PatternNotFound {
            pattern: pattern.to_string(),
            suggestions: similar_lines(content, pattern, SUGGESTIONS),
        });
    }
    if mode == MatchMode::Single && sites.len() > 1 {
        return Err(EditError::AmbiguousMatch {
            pattern: pattern.to_string(),
            sites: sites.iter().map(|s| s.describe(content)).collect(),
        });
    }
    debug!(sites = sites.len(), "Pattern edit matched");
    Ok(splice(content, &sites))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> EditEngine {
        EditEngine::new()
    }

    fn insert_at(line: usize, content: &str) -> EditInstruction {
        EditInstruction::Insert {
            line,
            content: content.to_string(),
        }
    }

    fn delete_line(line: usize) -> EditInstruction {
        EditInstruction::DeleteLines {
            start: line,
            end: None,
        }
    }

    fn replace(pattern: &str, content: &str, mode: MatchMode) -> EditInstruction {
        EditInstruction::Replace {
            pattern: pattern.to_string(),
            regex: false,
            multiline: false,
            content: content.to_string(),
            mode,
        }
    }

    #[test]
    fn test_write_creates() {
        let edit = EditInstruction::Write {
            content: "hello".into(),
        };
        assert_eq!(engine().apply(&edit, None).unwrap(), "hello");
    }

    #[test]
    fn test_append_adds_missing_newline() {
        let edit = EditInstruction::Append {
            content: "two\n".into(),
        };
        assert_eq!(engine().apply(&edit, Some("one")).unwrap(), "one\ntwo\n");
        assert_eq!(engine().apply(&edit, None).unwrap(), "two\n");
        assert_eq!(
            engine().apply(&edit, Some("one\r\n")).unwrap(),
            "one\r\ntwo\r\n"
        );
    }

    #[test]
    fn test_insert_delete_round_trip() {
        for original in ["a\nb\nc\n", "a\nb\nc", "", "only", "x\r\ny\r\n"] {
            let count = split_lines(original).len();
            for line in 1..=count.saturating_add(1) {
                let inserted = engine().apply(&insert_at(line, "NEW"), Some(original)).unwrap();
                let restored = engine().apply(&delete_line(line), Some(&inserted)).unwrap();
                assert_eq!(restored, original, "line {line} of {original:?}");
            }
        }
    }

    #[test]
    fn test_insert_places_before_line() {
        let out = engine().apply(&insert_at(2, "x"), Some("a\nb\n")).unwrap();
        assert_eq!(out, "a\nx\nb\n");
    }

    #[test]
    fn test_line_out_of_range() {
        let err = engine().apply(&insert_at(5, "x"), Some("a\nb\n")).unwrap_err();
        assert!(matches!(
            err,
            EditError::LineOutOfRange {
                line: 5,
                line_count: 2
            }
        ));
        assert!(engine().apply(&insert_at(0, "x"), Some("a\n")).is_err());
        assert!(engine().apply(&delete_line(3), Some("a\nb\n")).is_err());

        let backwards = EditInstruction::DeleteLines {
            start: 2,
            end: Some(1),
        };
        assert!(matches!(
            engine().apply(&backwards, Some("a\nb\n")),
            Err(EditError::LineOutOfRange { line: 1, .. })
        ));
    }

    #[test]
    fn test_delete_line_range() {
        let edit = EditInstruction::DeleteLines {
            start: 2,
            end: Some(3),
        };
        assert_eq!(engine().apply(&edit, Some("1\n2\n3\n4\n")).unwrap(), "1\n4\n");
    }

    #[test]
    fn test_single_replace_is_byte_exact() {
        let original = "keep  this\n\tmarker = 1\ntrailing   \n";
        let out = engine()
            .apply(&replace("marker = 1", "marker = 2", MatchMode::Single), Some(original))
            .unwrap();
        assert_eq!(out, "keep  this\n\tmarker = 2\ntrailing   \n");
    }

    #[test]
    fn test_single_mode_ambiguity_reports_sites() {
        let original = "a = 1\nb = 2\na = 1\n";
        let err = engine()
            .apply(&replace("a = 1", "a = 3", MatchMode::Single), Some(original))
            .unwrap_err();
        match err {
            EditError::AmbiguousMatch { sites, .. } => {
                assert_eq!(sites.len(), 2);
                assert_eq!(sites[0].line, 1);
                assert_eq!(sites[1].line, 3);
                assert!(!sites[1].context.is_empty());
            },
            other => panic!("unexpected {other:?}"),
        }

        let all = engine()
            .apply(&replace("a = 1", "a = 3", MatchMode::All), Some(original))
            .unwrap();
        assert_eq!(all, "a = 3\nb = 2\na = 3\n");
    }

    #[test]
    fn test_pattern_not_found_suggests() {
        let err = engine()
            .apply(&replace("let total = 0", "x", MatchMode::All), Some("let count = 0;\n"))
            .unwrap_err();
        match err {
            EditError::PatternNotFound { suggestions, .. } => {
                assert_eq!(suggestions, vec!["line 1: let count = 0;"]);
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_delete_pattern() {
        let edit = EditInstruction::Delete {
            pattern: r"\s*// TODO.*$".into(),
            regex: true,
            multiline: false,
            mode: MatchMode::All,
        };
        let out = engine().apply(&edit, Some("a(); // TODO x\nb();\n")).unwrap();
        assert_eq!(out, "a();\nb();\n");
    }

    #[test]
    fn test_replace_function_indentation() {
        let original = "class A:\n    def run(self):\n        return 1\n\n    def stop(self):\n        pass\n";
        let edit = EditInstruction::ReplaceFunction {
            name: "run".into(),
            content: "def run(self):\n    return 2\n".into(),
        };
        let out = engine().apply(&edit, Some(original)).unwrap();
        assert_eq!(
            out,
            "class A:\n    def run(self):\n        return 2\n\n    def stop(self):\n        pass\n"
        );
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = engine().apply(&delete_line(1), None).unwrap_err();
        assert!(matches!(err, EditError::MissingFile));
    }

    #[test]
    fn test_preview_diff() {
        let preview = engine()
            .preview("notes.txt", &replace("old", "new", MatchMode::All), Some("old\n"))
            .unwrap();
        assert_eq!(preview.content, "new\n");
        assert!(preview.diff.contains("-old"));
        assert!(preview.diff.contains("+new"));
        assert_eq!((preview.added, preview.removed), (1, 1));

        let created = engine()
            .preview(
                "notes.txt",
                &EditInstruction::Write {
                    content: "hello".into(),
                },
                None,
            )
            .unwrap();
        assert!(created.diff.starts_with("--- /dev/null"));
    }

    #[test]
    fn test_decode_rejects_binary() {
        assert!(matches!(
            EditEngine::decode(vec![0xff, 0xfe]),
            Err(EditError::NotText)
        ));
        assert_eq!(EditEngine::decode(b"ok".to_vec()).unwrap(), "ok");
    }
}
