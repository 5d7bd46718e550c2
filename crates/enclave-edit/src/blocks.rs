//! Search/replace edit blocks.
//!
//! ```text
//! src/lib.rs
//! <<<<<<< SEARCH
//! fn old() {}
//! =======
//! fn new() {}
//! >>>>>>> REPLACE
//! ```
//!
//! The file path is the nearest non-blank line above the `SEARCH` marker,
//! skipping markdown fences. Several blocks may target the same file; they
//! apply in order.
//!
//! Text without any `SEARCH` marker may instead be a unified diff, see
//! [`crate::patch`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EditError, EditResult};
use crate::lines::LineEnding;
use crate::matcher::{PatternOptions, find_sites, similar_lines, splice};
use crate::patch::{FilePatch, apply_patch, is_unified_diff, parse_unified_diff};

static SEARCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<{5,9} SEARCH\s*$").expect("invalid regex"));
static DIVIDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^={5,9}\s*$").expect("invalid regex"));
static REPLACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>{5,9} REPLACE\s*$").expect("invalid regex"));

/// Suggestions attached to a block that matched nothing.
const SUGGESTIONS: usize = 5;

/// One parsed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBlock {
    /// Path as written above the block.
    pub path: String,
    /// Text to find. Empty means "create or append".
    pub search: String,
    /// Replacement text.
    pub replace: String,
}

/// One file change from an edit block request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockChange {
    /// A SEARCH/REPLACE block.
    Replace(EditBlock),
    /// A unified diff section.
    Patch(FilePatch),
}

impl BlockChange {
    /// Path the change targets.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Replace(block) => &block.path,
            Self::Patch(patch) => &patch.path,
        }
    }

    /// Apply to the current content of the file (`None` if missing).
    ///
    /// # Errors
    ///
    /// See [`apply_block`] and [`apply_patch`].
    pub fn apply(&self, current: Option<&str>) -> EditResult<String> {
        match self {
            Self::Replace(block) => apply_block(current, block),
            Self::Patch(patch) => apply_patch(current, patch),
        }
    }
}

/// Parse SEARCH/REPLACE blocks, or a unified diff when the text has no
/// `SEARCH` marker.
///
/// # Errors
///
/// Returns [`EditError::MalformedBlock`] when neither format parses.
pub fn parse_block_changes(text: &str) -> EditResult<Vec<BlockChange>> {
    if !text.lines().any(|l| SEARCH.is_match(l)) && is_unified_diff(text) {
        let patches = parse_unified_diff(text)?;
        return Ok(patches.into_iter().map(BlockChange::Patch).collect());
    }
    let blocks = parse_edit_blocks(text)?;
    Ok(blocks.into_iter().map(BlockChange::Replace).collect())
}

/// Parse every block in `text`.
///
/// # Errors
///
/// Returns [`EditError::MalformedBlock`] for a block without a path, a
/// missing divider or end marker, or text containing no blocks at all.
pub fn parse_edit_blocks(text: &str) -> EditResult<Vec<EditBlock>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut index = 0;

    while let Some(line) = lines.get(index) {
        if !SEARCH.is_match(line) {
            index = index.saturating_add(1);
            continue;
        }
        let marker_line = index.saturating_add(1);
        let path = path_above(&lines, index).ok_or_else(|| EditError::MalformedBlock {
            line: marker_line,
            reason: "no file path above the SEARCH marker".to_string(),
        })?;

        let (search, divider) = collect_until(&lines, index.saturating_add(1), &DIVIDER)
            .ok_or_else(|| EditError::MalformedBlock {
                line: marker_line,
                reason: "missing ======= divider".to_string(),
            })?;
        let (replace, end) = collect_until(&lines, divider.saturating_add(1), &REPLACE)
            .ok_or_else(|| EditError::MalformedBlock {
                line: marker_line,
                reason: "missing >>>>>>> REPLACE marker".to_string(),
            })?;

        blocks.push(EditBlock {
            path,
            search,
            replace,
        });
        index = end.saturating_add(1);
    }

    if blocks.is_empty() {
        return Err(EditError::MalformedBlock {
            line: 1,
            reason: "no SEARCH/REPLACE blocks found".to_string(),
        });
    }
    Ok(blocks)
}

/// Apply one block to the current content of its file (`None` if missing).
///
/// A non-empty search must match exactly one site. An empty search creates
/// a missing file or appends to an existing one.
///
/// # Errors
///
/// - [`EditError::MissingFile`] if the file is missing and the search is not empty
/// - [`EditError::PatternNotFound`] / [`EditError::AmbiguousMatch`] from matching
pub fn apply_block(current: Option<&str>, block: &EditBlock) -> EditResult<String> {
    let replace = with_newline(&block.replace);

    if block.search.trim().is_empty() {
        return Ok(match current {
            None => replace,
            Some(existing) => {
                let mut out = existing.to_string();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push_str(LineEnding::detect(existing).as_str());
                }
                out.push_str(&LineEnding::detect(existing).apply(&replace));
                out
            },
        });
    }

    let content = current.ok_or(EditError::MissingFile)?;
    let search = with_newline(&block.search);
    let sites = find_sites(content, &search, &replace, PatternOptions::default())?;
    match sites.len() {
        0 => Err(EditError::PatternNotFound {
            pattern: block.search.clone(),
            suggestions: similar_lines(content, &block.search, SUGGESTIONS),
        }),
        1 => Ok(splice(content, &sites)),
        _ => Err(EditError::AmbiguousMatch {
            pattern: block.search.clone(),
            sites: sites.iter().map(|s| s.describe(content)).collect(),
        }),
    }
}

fn with_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

fn path_above(lines: &[&str], marker: usize) -> Option<String> {
    lines
        .iter()
        .take(marker)
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .filter(|l| !DIVIDER.is_match(l) && !REPLACE.is_match(l))
        .map(|l| l.trim_matches(|c| c == '`' || c == '*').trim().to_string())
        .filter(|l| !l.is_empty())
}

fn collect_until(lines: &[&str], from: usize, end: &Regex) -> Option<(String, usize)> {
    let mut body = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(from) {
        if end.is_match(line) {
            return Some((body.join("\n"), index));
        }
        body.push(*line);
    }
    None
}
