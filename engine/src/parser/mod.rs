//! Multi-language dependency parser
//!
//! A polymorphic front-end dispatching by language to one of five back-ends:
//! JavaScript/TypeScript, Python, Go, Rust, and a generic fallback. Each
//! back-end is a regex-driven line scanner, not a full AST. Parsers are
//! approximate but fast, robust to malformed input, and uniform across
//! languages: a malformed construct produces no extracted record and a
//! warning, never an aborted parse.
//!
//! Comments are stripped (line structure preserved) before any pattern
//! matching so commented-out imports are never extracted.

mod golang;
mod javascript;
mod python;
pub mod resolve;
mod rustlang;

use crate::types::{Language, ParseResult};

/// Parse file content for imports and exports
///
/// Languages without a dedicated back-end yield an empty result carrying the
/// language tag; the generator treats such files as leaves in the dependency
/// graph.
pub fn parse_source(content: &str, language: Language) -> ParseResult {
    match language {
        Language::JavaScript | Language::TypeScript => javascript::parse(content, language),
        Language::Python => python::parse(content),
        Language::Go => golang::parse(content),
        Language::Rust => rustlang::parse(content),
        other => ParseResult::for_language(other),
    }
}

/// 1-indexed line number of a byte offset
pub(crate) fn line_of_offset(source: &str, offset: usize) -> u32 {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count() as u32
        + 1
}

/// Strip `//` and `/* ... */` comments from C-family source
///
/// Stripped characters are replaced with spaces so byte offsets keep mapping
/// to the original line numbers. String literals are honored: comment
/// markers inside `'...'`, `"..."`, and (when `template_literals` is set)
/// `` `...` `` are left alone. Block comments nest when `nested_blocks` is
/// set (Rust) and do not otherwise (JavaScript, Go).
pub(crate) fn strip_c_comments(
    source: &str,
    nested_blocks: bool,
    template_literals: bool,
) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment(u32),
        Str(char),
        RawStr, // Go backtick string
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        out.push_str("  ");
                        state = State::LineComment;
                    }
                    Some('*') => {
                        chars.next();
                        out.push_str("  ");
                        state = State::BlockComment(1);
                    }
                    _ => out.push(c),
                },
                '\'' | '"' => {
                    out.push(c);
                    state = State::Str(c);
                }
                '`' if template_literals => {
                    out.push(c);
                    state = State::Str('`');
                }
                '`' if !template_literals => {
                    out.push(c);
                    state = State::RawStr;
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment(depth) => match c {
                '\n' => out.push('\n'),
                '*' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    if depth == 1 {
                        state = State::Code;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
                '/' if nested_blocks && chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment(depth + 1);
                }
                _ => out.push(' '),
            },
            State::Str(quote) => match c {
                '\\' => {
                    out.push(c);
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '\n' => {
                    out.push('\n');
                    // Unterminated single-line string: bail back to code
                    if quote != '`' {
                        state = State::Code;
                    }
                }
                _ => {
                    out.push(c);
                    if c == quote {
                        state = State::Code;
                    }
                }
            },
            State::RawStr => {
                out.push(c);
                if c == '`' {
                    state = State::Code;
                }
            }
        }
    }

    out
}

/// Strip `#` comments and triple-quoted strings from Python source
///
/// Triple-quoted blocks (docstrings) are blanked entirely; single-quoted
/// strings are preserved because `__all__` entries live in them.
pub(crate) fn strip_python_comments(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Comment,
        Str(char),
        TripleStr(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let bytes: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match state {
            State::Code => {
                if c == '#' {
                    out.push(' ');
                    state = State::Comment;
                } else if c == '"' || c == '\'' {
                    if bytes.get(i + 1) == Some(&c) && bytes.get(i + 2) == Some(&c) {
                        out.push_str("   ");
                        i += 2;
                        state = State::TripleStr(c);
                    } else {
                        out.push(c);
                        state = State::Str(c);
                    }
                } else {
                    out.push(c);
                }
            }
            State::Comment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    out.push(c);
                    if let Some(&next) = bytes.get(i + 1) {
                        out.push(next);
                        i += 1;
                    }
                } else if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(c);
                    if c == quote {
                        state = State::Code;
                    }
                }
            }
            State::TripleStr(quote) => {
                if c == '\n' {
                    out.push('\n');
                } else if c == quote
                    && bytes.get(i + 1) == Some(&quote)
                    && bytes.get(i + 2) == Some(&quote)
                {
                    out.push_str("   ");
                    i += 2;
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
        }
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    #[test]
    fn test_strip_line_comment() {
        let out = strip_c_comments("let a = 1; // comment\nlet b = 2;", false, true);
        assert!(out.contains("let a = 1;"));
        assert!(!out.contains("comment"));
        assert!(out.contains("let b = 2;"));
    }

    #[test]
    fn test_strip_preserves_lines() {
        let src = "a\n/* one\ntwo\nthree */\nb";
        let out = strip_c_comments(src, false, true);
        assert_eq!(out.lines().count(), src.lines().count());
        assert!(!out.contains("two"));
    }

    #[test]
    fn test_comment_markers_inside_strings_survive() {
        let out = strip_c_comments(r#"const url = "http://example.com";"#, false, true);
        assert!(out.contains("http://example.com"));
    }

    #[test]
    fn test_nested_block_comments() {
        let out = strip_c_comments("/* outer /* inner */ still */ fn x() {}", true, false);
        assert!(!out.contains("inner"));
        assert!(!out.contains("still"));
        assert!(out.contains("fn x()"));
    }

    #[test]
    fn test_go_raw_string_keeps_slashes() {
        let out = strip_c_comments("s := `// not a comment`", false, false);
        assert!(out.contains("// not a comment"));
    }

    #[test]
    fn test_python_strip() {
        let src = "import os  # the os module\nx = \"\"\"doc // #text\"\"\"\ny = '# not comment'";
        let out = strip_python_comments(src);
        assert!(out.contains("import os"));
        assert!(!out.contains("the os module"));
        assert!(!out.contains("doc"));
        assert!(out.contains("'# not comment'"));
    }

    #[test]
    fn test_generic_backend_is_a_leaf() {
        let result = parse_source("SELECT 1;", Language::Sql);
        assert_eq!(result.language, Some(Language::Sql));
        assert!(result.imports.is_empty());
        assert!(result.exports.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_line_of_offset() {
        let src = "a\nb\nc";
        assert_eq!(line_of_offset(src, 0), 1);
        assert_eq!(line_of_offset(src, 2), 2);
        assert_eq!(line_of_offset(src, 4), 3);
    }
}
