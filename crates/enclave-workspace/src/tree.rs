//! Bounded tree rendering for directory listings and the project structure.
//!
//! The walk is lazy: output stops as soon as the entry budget is spent, so a
//! huge tree costs no more than the entries actually shown.

use ignore::WalkBuilder;
use std::cmp::Ordering;
use std::fmt::Write;
use std::path::Path;
use tracing::debug;

/// Bounds and filters for a tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Maximum depth below the starting directory.
    pub max_depth: usize,
    /// Maximum number of entries to emit.
    pub max_entries: usize,
    /// Include dot-files and dot-directories.
    pub show_hidden: bool,
    /// Honor `.gitignore`, `.ignore` and git excludes.
    pub respect_ignore_files: bool,
    /// Append file sizes.
    pub show_sizes: bool,
}

impl TreeOptions {
    /// Options for an explicit directory listing: everything, with sizes.
    #[must_use]
    pub fn listing(max_depth: usize, max_entries: usize) -> Self {
        Self {
            max_depth,
            max_entries,
            show_hidden: true,
            respect_ignore_files: false,
            show_sizes: true,
        }
    }

    /// Options for the project overview: no hidden or ignored entries.
    #[must_use]
    pub fn project(max_depth: usize, max_entries: usize) -> Self {
        Self {
            max_depth,
            max_entries,
            show_hidden: false,
            respect_ignore_files: true,
            show_sizes: false,
        }
    }
}

/// Render `dir` as an indented tree, directories first, names compared
/// case-insensitively. `.git` internals are never shown.
#[must_use]
pub fn render_tree(dir: &Path, label: &str, options: &TreeOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{label}/");

    let walker = WalkBuilder::new(dir)
        .standard_filters(options.respect_ignore_files)
        .hidden(!options.show_hidden)
        .require_git(false)
        .max_depth(Some(options.max_depth))
        .filter_entry(|entry| entry.file_name() != ".git")
        .sort_by_file_path(directories_first)
        .build();

    let mut emitted: usize = 0;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            },
        };
        let depth = entry.depth();
        if depth == 0 {
            continue;
        }
        if emitted >= options.max_entries {
            let _ = writeln!(out, "... (truncated after {emitted} entries)");
            return out;
        }

        let indent = "  ".repeat(depth);
        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
        if is_dir {
            let _ = writeln!(out, "{indent}{name}/");
        } else if options.show_sizes {
            match entry.metadata() {
                Ok(meta) => {
                    let _ = writeln!(out, "{indent}{name} ({} bytes)", meta.len());
                },
                Err(_) => {
                    let _ = writeln!(out, "{indent}{name}");
                },
            }
        } else {
            let _ = writeln!(out, "{indent}{name}");
        }
        emitted = emitted.saturating_add(1);
    }

    if emitted == 0 {
        out.push_str("  (empty)\n");
    }
    out
}

fn directories_first(a: &Path, b: &Path) -> Ordering {
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| lowercase_name(a).cmp(&lowercase_name(b)))
}

fn lowercase_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
