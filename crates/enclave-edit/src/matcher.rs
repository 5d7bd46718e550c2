//! Pattern matching for replace and delete edits.
//!
//! # Strategies
//!
//! - **Exact**: literal substring, every non-overlapping occurrence.
//! - **Normalized**: whole-line windows compared after collapsing runs of
//!   horizontal whitespace. The replacement is reindented from the pattern's
//!   indentation to the matched lines' indentation.
//! - **Regex**: only when requested. Applied per line unless `multiline` is
//!   set, in which case `^`/`$` match at line boundaries and `.` matches a
//!   newline. `$1` style references in the replacement are expanded.
//!
//! Exact is tried before normalized; regex never falls back to either.

use std::collections::HashSet;

use enclave_core::MatchSite;
use regex::RegexBuilder;

use crate::error::{EditError, EditResult};
use crate::lines::{
    LineEnding, collapse_whitespace, context_lines, indent_of, is_terminated, line_of_offset,
    offset_of_line, split_lines, strip_terminator,
};

/// Lines of context shown either side of an ambiguous match.
pub const CONTEXT_RADIUS: usize = 2;

/// One matched byte range and the text that replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
    /// Replacement text for this site.
    pub replacement: String,
}

impl Site {
    /// Describe this site with numbered context lines.
    #[must_use]
    pub fn describe(&self, content: &str) -> MatchSite {
        let first = line_of_offset(content, self.start);
        let last = line_of_offset(content, self.end.saturating_sub(1).max(self.start));
        MatchSite {
            line: first,
            context: context_lines(content, first, last, CONTEXT_RADIUS),
        }
    }
}

/// How a pattern is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternOptions {
    /// Treat the pattern as a regular expression.
    pub regex: bool,
    /// Let a regex span line boundaries.
    pub multiline: bool,
}

/// Find every site for `pattern`, paired with its replacement.
///
/// # Errors
///
/// Returns [`EditError::InvalidRegex`] if a requested regex does not compile.
pub fn find_sites(
    content: &str,
    pattern: &str,
    replacement: &str,
    options: PatternOptions,
) -> EditResult<Vec<Site>> {
    let ending = LineEnding::detect(content);
    if options.regex {
        return find_regex(content, pattern, replacement, options.multiline, ending);
    }
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let exact = find_exact(content, pattern, replacement, ending);
    if !exact.is_empty() {
        return Ok(exact);
    }
    Ok(find_normalized(content, pattern, replacement, ending))
}

/// Replace each site in order. Sites must be sorted and non-overlapping.
#[must_use]
pub fn splice(content: &str, sites: &[Site]) -> String {
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for site in sites {
        out.push_str(&content[cursor..site.start]);
        out.push_str(&site.replacement);
        cursor = site.end;
    }
    out.push_str(&content[cursor..]);
    out
}

fn find_exact(content: &str, pattern: &str, replacement: &str, ending: LineEnding) -> Vec<Site> {
    let replacement = ending.apply(replacement);
    content
        .match_indices(pattern)
        .map(|(start, found)| Site {
            start,
            end: start.saturating_add(found.len()),
            replacement: replacement.clone(),
        })
        .collect()
}

fn find_normalized(
    content: &str,
    pattern: &str,
    replacement: &str,
    ending: LineEnding,
) -> Vec<Site> {
    let wants_terminator = pattern.ends_with('\n');
    let pattern_lines: Vec<&str> = pattern.split_inclusive('\n').map(strip_terminator).collect();
    let wanted: Vec<String> = pattern_lines.iter().map(|l| collapse_whitespace(l)).collect();
    if wanted.iter().all(String::is_empty) {
        return Vec::new();
    }
    let Some(anchor) = wanted.iter().position(|l| !l.is_empty()) else {
        return Vec::new();
    };
    let pattern_indent = pattern_lines.get(anchor).map_or("", |l| indent_of(l));

    let lines = split_lines(content);
    let normalized: Vec<String> = lines
        .iter()
        .map(|l| collapse_whitespace(strip_terminator(l)))
        .collect();
    let width = wanted.len();

    let mut sites = Vec::new();
    let mut index: usize = 0;
    while let Some(window_end) = index.checked_add(width)
        && window_end <= lines.len()
    {
        if normalized[index..window_end] != wanted[..] {
            index = index.saturating_add(1);
            continue;
        }

        let window = &lines[index..window_end];
        let start = offset_of_line(&lines, index.saturating_add(1));
        let mut end = start.saturating_add(window.iter().map(|l| l.len()).sum::<usize>());
        if !wants_terminator
            && let Some(last) = window.last()
            && is_terminated(last)
        {
            end = end.saturating_sub(last.len().saturating_sub(strip_terminator(last).len()));
        }
        let file_indent = window.get(anchor).map_or("", |l| indent_of(l));
        sites.push(Site {
            start,
            end,
            replacement: ending.apply(&reindent(replacement, pattern_indent, file_indent)),
        });
        index = window_end;
    }
    sites
}

/// Move `text` from indentation `from` to indentation `to`, keeping each
/// line's indentation relative to `from`.
#[must_use]
pub fn reindent(text: &str, from: &str, to: &str) -> String {
    if from == to {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if strip_terminator(line).trim().is_empty() {
            out.push_str(line);
        } else if let Some(rest) = line.strip_prefix(from) {
            out.push_str(to);
            out.push_str(rest);
        } else {
            out.push_str(to);
            out.push_str(line.trim_start_matches([' ', '\t']));
        }
    }
    out
}

fn find_regex(
    content: &str,
    pattern: &str,
    replacement: &str,
    multiline: bool,
    ending: LineEnding,
) -> EditResult<Vec<Site>> {
    let re = RegexBuilder::new(pattern)
        .multi_line(multiline)
        .dot_matches_new_line(multiline)
        .build()
        .map_err(|source| EditError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
    let replacement = ending.apply(replacement);

    let mut sites = Vec::new();
    let mut push = |base: usize, caps: &regex::Captures<'_>| {
        if let Some(whole) = caps.get(0) {
            let mut expanded = String::new();
            caps.expand(&replacement, &mut expanded);
            sites.push(Site {
                start: base.saturating_add(whole.start()),
                end: base.saturating_add(whole.end()),
                replacement: expanded,
            });
        }
    };

    if multiline {
        for caps in re.captures_iter(content) {
            push(0, &caps);
        }
    } else {
        let mut base = 0;
        for line in split_lines(content) {
            let body = strip_terminator(line);
            for caps in re.captures_iter(body) {
                push(base, &caps);
            }
            base = base.saturating_add(line.len());
        }
    }
    Ok(sites)
}

/// Lines of `content` most similar to `needle`, ranked by shared significant
/// words, formatted as `line N: text`. Identifiers are split at underscores
/// so `save_config` shares a word with `load_config`.
#[must_use]
pub fn similar_lines(content: &str, needle: &str, limit: usize) -> Vec<String> {
    let wanted = significant_words(needle);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, usize, &str)> = split_lines(content)
        .into_iter()
        .enumerate()
        .filter_map(|(index, line)| {
            let text = strip_terminator(line);
            let have = significant_words(text);
            let score = wanted.intersection(&have).count();
            (score > 0).then_some((score, index.saturating_add(1), text.trim()))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, number, text)| format!("line {number}: {text}"))
        .collect()
}

fn significant_words(text: &str) -> HashSet<String> {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let long: HashSet<String> = words
        .iter()
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .collect();
    if long.is_empty() {
        words.iter().map(|w| w.to_lowercase()).collect()
    } else {
        long
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal() -> PatternOptions {
        PatternOptions::default()
    }

    #[test]
    fn test_exact_all_occurrences() {
        let content = "foo bar foo\nfoo\n";
        let sites = find_sites(content, "foo", "baz", literal()).unwrap();
        assert_eq!(sites.len(), 3);
        assert_eq!(splice(content, &sites), "baz bar baz\nbaz\n");
    }

    #[test]
    fn test_single_occurrence_leaves_rest_identical() {
        let content = "alpha\n  beta  \ngamma\r\n";
        let sites = find_sites(content, "beta", "BETA", literal()).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(splice(content, &sites), "alpha\n  BETA  \ngamma\r\n");
    }

    #[test]
    fn test_normalized_tolerates_reindentation() {
        let content = "fn main() {\n    let x  =  1;\n    call(x);\n}\n";
        let pattern = "let x = 1;\ncall(x);\n";
        let sites = find_sites(content, pattern, "let y = 2;\nuse_it(y);\n", literal()).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(
            splice(content, &sites),
            "fn main() {\n    let y = 2;\n    use_it(y);\n}\n"
        );
    }

    #[test]
    fn test_normalized_without_trailing_newline_keeps_terminator() {
        let content = "a\n\tb   c\nd\n";
        let sites = find_sites(content, "b c", "x", literal()).unwrap();
        assert_eq!(splice(content, &sites), "a\n\tx\nd\n");
    }

    #[test]
    fn test_not_found_is_empty() {
        let sites = find_sites("abc\n", "zzz", "", literal()).unwrap();
        assert!(sites.is_empty());
        assert!(find_sites("abc\n", "", "x", literal()).unwrap().is_empty());
    }

    #[test]
    fn test_regex_per_line_with_captures() {
        let content = "version = 1\nname = x\nversion = 22\n";
        let options = PatternOptions {
            regex: true,
            multiline: false,
        };
        let sites = find_sites(content, r"^version = (\d+)$", "version = ${1}0", options).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(
            splice(content, &sites),
            "version = 10\nname = x\nversion = 220\n"
        );
    }

    #[test]
    fn test_regex_multiline_spans_lines() {
        let content = "start\nmiddle\nend\nrest\n";
        let options = PatternOptions {
            regex: true,
            multiline: true,
        };
        let sites = find_sites(content, r"start.*end\n", "", options).unwrap();
        assert_eq!(splice(content, &sites), "rest\n");

        let per_line = PatternOptions {
            regex: true,
            multiline: false,
        };
        assert!(find_sites(content, r"start.*end", "", per_line).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_regex() {
        let options = PatternOptions {
            regex: true,
            multiline: false,
        };
        let err = find_sites("x", "(", "", options).unwrap_err();
        assert!(matches!(err, EditError::InvalidRegex { .. }));
    }

    #[test]
    fn test_crlf_replacement_follows_file() {
        let content = "one\r\ntwo\r\n";
        let sites = find_sites(content, "one\r\n", "uno\ndos\n", literal()).unwrap();
        assert_eq!(splice(content, &sites), "uno\r\ndos\r\ntwo\r\n");
    }

    #[test]
    fn test_site_description_has_context() {
        let content = "1\n2\n3\ntarget\n5\n6\n7\n";
        let sites = find_sites(content, "target", "", literal()).unwrap();
        let site = sites[0].describe(content);
        assert_eq!(site.line, 4);
        assert_eq!(site.context.len(), 5);
        assert!(site.context[2].contains("target"));
    }

    #[test]
    fn test_similar_lines_ranked() {
        let content = "fn load_config() {}\nfn save_config(path) {}\nlet unrelated = 1;\n";
        let similar = similar_lines(content, "fn save_config(file)", 5);
        assert_eq!(similar[0], "line 2: fn save_config(path) {}");
        assert!(similar.iter().all(|l| !l.contains("unrelated")));
    }

    #[test]
    fn test_reindent_relative() {
        let text = "if x:\n    y()\n\nz()\n";
        assert_eq!(
            reindent(text, "", "    "),
            "    if x:\n        y()\n\n    z()\n"
        );
    }
}
