//! Function block location without a parser.
//!
//! A declaration line is any line matching one of a few language-agnostic
//! shapes for the given name:
//!
//! - keyword form: `def name`, `fn name`, `func name`, `function name`, with
//!   optional modifiers (`pub`, `async`, `static`, `export`, ...)
//! - typed form: `int name(`, `static void Type::name(`
//! - binding form: `const name = (...) =>`, `let name = function`
//! - method form: `name(...) {` with optional modifiers
//!
//! From a declaration the block is found by a small state machine over the
//! code text (strings and comments removed):
//!
//! ```text
//! Header --'{' at paren depth 0--> Braced (count braces until depth 0)
//!    |---line ends with ':'------> Indented (lines deeper than the header)
//!    |---';' at paren depth 0----> Prototype (skipped)
//!    +---EOF or no continuation--> Unterminated
//! ```
//!
//! Known limits: braces inside exotic literals (raw strings, regex literals,
//! heredocs) are counted, and one-line Python bodies (`def f(): return 1`)
//! are not recognized.

use enclave_core::MatchSite;
use regex::Regex;

use crate::error::{EditError, EditResult};
use crate::lines::{
    LineEnding, context_lines, indent_of, is_terminated, split_lines, strip_terminator,
};
use crate::matcher::{CONTEXT_RADIUS, similar_lines};

/// Lines after the declaration that may still belong to its signature.
const HEADER_LOOKAHEAD: usize = 20;

/// Number of suggestions attached to a miss.
const SUGGESTIONS: usize = 5;

const STATEMENT_WORDS: &[&str] = &[
    "return", "else", "new", "throw", "await", "yield", "case", "if", "while", "for", "switch",
    "delete", "typeof", "echo", "print", "assert", "raise", "not", "and", "or", "in", "is",
];

/// A located function block. Lines are 1-indexed and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBlock {
    /// Declaration line.
    pub start_line: usize,
    /// Last line of the block.
    pub end_line: usize,
    /// Byte offset of the declaration line.
    pub start: usize,
    /// Byte offset just past the last line (terminator included).
    pub end: usize,
    /// Leading whitespace of the declaration line.
    pub indent: String,
}

impl FunctionBlock {
    /// The block text.
    #[must_use]
    pub fn text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Found { end_line: usize },
    Prototype,
    Unterminated,
}

/// Locate the single function named `name`.
///
/// # Errors
///
/// - [`EditError::PatternNotFound`] if no declaration has a complete block
/// - [`EditError::AmbiguousMatch`] if several do
pub fn find_function(content: &str, name: &str) -> EditResult<FunctionBlock> {
    let patterns = declaration_patterns(name)?;
    let lines = split_lines(content);

    let mut blocks = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let text = strip_terminator(line);
        if !patterns.iter().any(|re| re.is_match(text)) || starts_with_statement(text) {
            continue;
        }
        match scan_block(&lines, index) {
            Scan::Found { end_line } => blocks.push((index, end_line)),
            Scan::Prototype | Scan::Unterminated => {},
        }
    }

    match blocks.as_slice() {
        [] => Err(EditError::PatternNotFound {
            pattern: name.to_string(),
            suggestions: similar_lines(content, name, SUGGESTIONS),
        }),
        [(start, end)] => Ok(block_at(&lines, *start, *end)),
        many => Err(EditError::AmbiguousMatch {
            pattern: name.to_string(),
            sites: many
                .iter()
                .map(|(start, _)| {
                    let line = start.saturating_add(1);
                    MatchSite {
                        line,
                        context: context_lines(content, line, line, CONTEXT_RADIUS),
                    }
                })
                .collect(),
        }),
    }
}

/// Replace the function named `name` with `replacement`, reindented to the
/// original declaration's indentation.
///
/// # Errors
///
/// See [`find_function`].
pub fn replace_function(content: &str, name: &str, replacement: &str) -> EditResult<String> {
    let block = find_function(content, name)?;
    let original = block.text(content);

    let mut text = String::new();
    let dedented = dedent(replacement);
    for line in dedented.split_inclusive('\n') {
        if !strip_terminator(line).trim().is_empty() {
            text.push_str(&block.indent);
        }
        text.push_str(line);
    }
    if is_terminated(original) && !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    let text = LineEnding::detect(content).apply(&text);

    let mut out = String::with_capacity(content.len().saturating_add(text.len()));
    out.push_str(&content[..block.start]);
    out.push_str(&text);
    out.push_str(&content[block.end..]);
    Ok(out)
}

/// Remove the common leading whitespace of all non-blank lines.
#[must_use]
pub fn dedent(text: &str) -> String {
    let common = text
        .split_inclusive('\n')
        .map(strip_terminator)
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l).chars().count())
        .min()
        .unwrap_or(0);
    if common == 0 {
        return text.to_string();
    }

    text.split_inclusive('\n')
        .map(|line| {
            let skip: usize = line
                .chars()
                .take(common)
                .take_while(|c| *c == ' ' || *c == '\t')
                .map(char::len_utf8)
                .sum();
            &line[skip..]
        })
        .collect()
}

fn block_at(lines: &[&str], start: usize, end: usize) -> FunctionBlock {
    let start_offset: usize = lines.iter().take(start).map(|l| l.len()).sum();
    let len: usize = lines
        .iter()
        .skip(start)
        .take(end.saturating_sub(start).saturating_add(1))
        .map(|l| l.len())
        .sum();
    FunctionBlock {
        start_line: start.saturating_add(1),
        end_line: end.saturating_add(1),
        start: start_offset,
        end: start_offset.saturating_add(len),
        indent: lines.get(start).map_or("", |l| indent_of(l)).to_string(),
    }
}

fn declaration_patterns(name: &str) -> EditResult<Vec<Regex>> {
    let name = regex::escape(name);
    let forms = [
        format!(
            r#"^\s*(?:(?:pub(?:\([^)]*\))?|export|default|public|private|protected|internal|static|async|unsafe|const|extern(?:\s+"[^"]*")?|abstract|final|override|virtual|inline|open|suspend)\s+)*(?:def|fn|func|fun|function\*?|sub|proc)\s+{name}\b"#
        ),
        format!(r"^\s*(?:[A-Za-z_][\w:<>,\*&\[\]]*\s+)+[\*&]*(?:[A-Za-z_]\w*::)*{name}\s*\("),
        format!(
            r"^\s*(?:(?:export|default)\s+)*(?:const|let|var)\s+{name}\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_]\w*\s*=>)"
        ),
        format!(
            r"^\s*(?:(?:static|async|public|private|protected|override|get|set)\s+)*{name}\s*\([^;]*\)\s*(?::[^{{]+)?\{{\s*$"
        ),
    ];
    forms
        .iter()
        .map(|form| {
            Regex::new(form).map_err(|source| EditError::InvalidRegex {
                pattern: form.clone(),
                source,
            })
        })
        .collect()
}

fn starts_with_statement(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|word| STATEMENT_WORDS.contains(&word))
}

fn scan_block(lines: &[&str], decl: usize) -> Scan {
    let mut lexer = Lexer::default();
    let decl_indent = lines.get(decl).map_or(0, |l| indent_of(l).len());
    let mut parens: i64 = 0;
    let last_header = decl.saturating_add(HEADER_LOOKAHEAD).min(lines.len().saturating_sub(1));

    let mut index = decl;
    while index <= last_header {
        let Some(line) = lines.get(index) else {
            return Scan::Unterminated;
        };
        let code = lexer.code(line);
        for (pos, c) in code.char_indices() {
            match c {
                '(' | '[' => parens = parens.saturating_add(1),
                ')' | ']' => parens = parens.saturating_sub(1),
                '{' if parens <= 0 => {
                    return braced_end(lines, index, &code[pos..], lexer);
                },
                ';' if parens <= 0 => return Scan::Prototype,
                _ => {},
            }
        }
        if parens <= 0 && code.trim_end().ends_with(':') {
            return indented_end(lines, index, decl_indent);
        }

        let next = index.saturating_add(1);
        let continues = parens > 0
            || lines.get(next).is_some_and(|n| {
                let text = strip_terminator(n);
                text.trim_start().starts_with('{') || indent_of(text).len() > decl_indent
            });
        if !continues {
            return Scan::Unterminated;
        }
        index = next;
    }
    Scan::Unterminated
}

fn braced_end(lines: &[&str], open_line: usize, rest: &str, mut lexer: Lexer) -> Scan {
    let mut depth: i64 = 0;
    let count = |code: &str, depth: &mut i64| -> bool {
        for c in code.chars() {
            match c {
                '{' => *depth = depth.saturating_add(1),
                '}' => {
                    *depth = depth.saturating_sub(1);
                    if *depth == 0 {
                        return true;
                    }
                },
                _ => {},
            }
        }
        false
    };

    if count(rest, &mut depth) {
        return Scan::Found {
            end_line: open_line,
        };
    }
    for (index, line) in lines.iter().enumerate().skip(open_line.saturating_add(1)) {
        let code = lexer.code(line);
        if count(&code, &mut depth) {
            return Scan::Found { end_line: index };
        }
    }
    Scan::Unterminated
}

fn indented_end(lines: &[&str], header_end: usize, base: usize) -> Scan {
    let mut last_body = None;
    let mut triple: Option<&str> = None;

    for (index, line) in lines.iter().enumerate().skip(header_end.saturating_add(1)) {
        let text = strip_terminator(line);
        if let Some(delimiter) = triple {
            if text.contains(delimiter) {
                triple = None;
            }
            last_body = Some(index);
            continue;
        }
        if text.trim().is_empty() {
            continue;
        }
        if indent_of(text).len() <= base {
            break;
        }
        for delimiter in ["\"\"\"", "'''"] {
            if text.matches(delimiter).count() % 2 == 1 {
                triple = Some(delimiter);
                break;
            }
        }
        last_body = Some(index);
    }

    match last_body {
        Some(end_line) => Scan::Found { end_line },
        None => Scan::Unterminated,
    }
}

/// Strips strings and comments from code lines, tracking block comments
/// across lines.
#[derive(Debug, Default, Clone, Copy)]
struct Lexer {
    block_comment: bool,
}

impl Lexer {
    fn code(&mut self, line: &str) -> String {
        let chars: Vec<char> = strip_terminator(line).chars().collect();
        let mut out = String::with_capacity(chars.len());
        let mut prev: Option<char> = None;
        let mut i = 0;

        while let Some(&c) = chars.get(i) {
            let next = chars.get(i.saturating_add(1)).copied();
            if self.block_comment {
                if c == '*' && next == Some('/') {
                    self.block_comment = false;
                    i = i.saturating_add(2);
                } else {
                    i = i.saturating_add(1);
                }
                continue;
            }
            match c {
                '/' if next == Some('/') => break,
                '/' if next == Some('*') => {
                    self.block_comment = true;
                    i = i.saturating_add(2);
                    continue;
                },
                '#' if !matches!(next, Some('[' | '!')) && prev.is_none_or(char::is_whitespace) => {
                    break;
                },
                '"' | '`' => {
                    i = skip_string(&chars, i, c);
                    out.push(' ');
                },
                '\'' if !is_lifetime(&chars, i) => {
                    i = skip_string(&chars, i, c);
                    out.push(' ');
                },
                _ => {
                    out.push(c);
                    i = i.saturating_add(1);
                },
            }
            prev = Some(c);
        }
        out
    }
}

fn skip_string(chars: &[char], open: usize, quote: char) -> usize {
    let mut i = open.saturating_add(1);
    while let Some(&c) = chars.get(i) {
        if c == '\\' {
            i = i.saturating_add(2);
        } else if c == quote {
            return i.saturating_add(1);
        } else {
            i = i.saturating_add(1);
        }
    }
    chars.len()
}

/// A quote that starts a lifetime or an apostrophe rather than a string.
fn is_lifetime(chars: &[char], quote: usize) -> bool {
    if quote > 0 && matches!(chars.get(quote.saturating_sub(1)), Some('&' | '<')) {
        return true;
    }
    let rest = chars.get(quote.saturating_add(1)..).unwrap_or_default();
    let ident = rest
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .count();
    if ident == 0 || rest.get(ident) == Some(&'\'') {
        return false;
    }
    !rest.contains(&'\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON: &str = "\
class Greeter:
    def greet(self, name):
        \"\"\"Say hello.

Keeps going.
\"\"\"
        if name:
            return f\"hi {name}\"

        return \"hi\"

    def other(self):
        pass
";

    const RUST: &str = "\
impl Parser {
    pub fn parse<'a>(&self, input: &'a str) -> Result<(), Error> {
        let close = \"}\";
        if input.is_empty() {
            return Err(Error::Empty);
        }
        Ok(())
    }

    fn helper(&self) {}
}
";

    #[test]
    fn test_python_method_block() {
        let block = find_function(PYTHON, "greet").unwrap();
        assert_eq!(block.start_line, 2);
        assert_eq!(block.end_line, 10);
        assert_eq!(block.indent, "    ");
    }

    #[test]
    fn test_braced_block_ignores_braces_in_strings() {
        let block = find_function(RUST, "parse").unwrap();
        assert_eq!(block.start_line, 2);
        assert_eq!(block.end_line, 8);

        let helper = find_function(RUST, "helper").unwrap();
        assert_eq!(helper.start_line, 10);
        assert_eq!(helper.end_line, 10);
    }

    #[test]
    fn test_replace_reindents_to_original() {
        let replacement = "def greet(self, name):\n    return name\n";
        let out = replace_function(PYTHON, "greet", replacement).unwrap();
        assert!(out.starts_with("class Greeter:\n    def greet(self, name):\n        return name\n\n    def other"));
    }

    #[test]
    fn test_replace_dedents_overindented_replacement() {
        let content = "fn a() {\n    1\n}\n";
        let out = replace_function(content, "a", "        fn a() {\n            2\n        }").unwrap();
        assert_eq!(out, "fn a() {\n    2\n}\n");
    }

    #[test]
    fn test_prototype_skipped() {
        let content = "int add(int a, int b);\n\nint add(int a, int b)\n{\n    return a + b;\n}\n";
        let block = find_function(content, "add").unwrap();
        assert_eq!(block.start_line, 3);
        assert_eq!(block.end_line, 6);
    }

    #[test]
    fn test_js_forms() {
        let content = "\
export const load = async (path) => {
  const data = { a: '{' };
  return data;
};

function save(x) {
  return x;
}
";
        let load = find_function(content, "load").unwrap();
        assert_eq!((load.start_line, load.end_line), (1, 4));
        let save = find_function(content, "save").unwrap();
        assert_eq!((save.start_line, save.end_line), (6, 8));
    }

    #[test]
    fn test_calls_are_not_declarations() {
        let content = "fn run() {\n    return helper(1);\n}\n";
        assert!(matches!(
            find_function(content, "helper"),
            Err(EditError::PatternNotFound { .. })
        ));
    }

    #[test]
    fn test_unterminated_block_not_found() {
        let content = "fn broken() {\n    if x {\n}\n";
        assert!(matches!(
            find_function(content, "broken"),
            Err(EditError::PatternNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_is_ambiguous() {
        let content = "class A:\n    def run(self):\n        pass\n\nclass B:\n    def run(self):\n        pass\n";
        match find_function(content, "run") {
            Err(EditError::AmbiguousMatch { sites, .. }) => {
                assert_eq!(sites.len(), 2);
                assert_eq!(sites[0].line, 2);
                assert_eq!(sites[1].line, 6);
            },
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_function_suggests() {
        let err = find_function(RUST, "parse_all").unwrap_err();
        match err {
            EditError::PatternNotFound { suggestions, .. } => {
                assert!(suggestions.iter().any(|s| s.contains("parse")));
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dedent() {
        assert_eq!(dedent("    a\n      b\n\n    c"), "a\n  b\n\nc");
        assert_eq!(dedent("a\n  b"), "a\n  b");
    }
}
