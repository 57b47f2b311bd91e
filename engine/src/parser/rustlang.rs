//! Rust back-end
//!
//! Handles `use` declarations (grouped, globbed, aliased) and top-level
//! `pub` items. Paths rooted at `crate`, `self`, or `super` classify as
//! internal; `std`, `core`, and `alloc` as stdlib; other roots as external
//! crates.

use regex::Regex;
use std::sync::LazyLock;

use super::{line_of_offset, strip_c_comments};
use crate::types::{Export, ExportKind, Import, ImportKind, Language, ParseResult, ParseWarning};

static RE_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+(?P<path>[\w:]+?)(?:::(?P<glob>\*)|::\{(?P<group>[^;]*?)\})?(?:\s+as\s+(?P<alias>[A-Za-z_]\w*))?\s*;",
    )
    .unwrap()
});

static RE_PUB_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^pub\s+(?:(?:async|unsafe|const)\s+)*(?P<kw>fn|struct|enum|trait|const|static|mod|type)\s+(?:mut\s+)?(?P<name>[A-Za-z_]\w*)",
    )
    .unwrap()
});

static RE_USE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\b").unwrap());

/// Parse Rust source
pub(super) fn parse(content: &str) -> ParseResult {
    let stripped = strip_c_comments(content, true, false);
    let mut result = ParseResult::for_language(Language::Rust);

    let mut imports: Vec<(usize, usize, Import)> = Vec::new();

    for caps in RE_USE.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let line = line_of_offset(&stripped, whole.start());
        let path = &caps["path"];

        let (source, symbols) = if caps.name("glob").is_some() {
            (path.to_owned(), vec!["*".to_owned()])
        } else if let Some(group) = caps.name("group") {
            (path.to_owned(), parse_use_group(group.as_str(), path))
        } else if let Some(alias) = caps.name("alias") {
            let (source, _) = split_leaf(path);
            (source, vec![alias.as_str().to_owned()])
        } else {
            let (source, leaf) = split_leaf(path);
            (source, vec![leaf])
        };

        imports.push((
            whole.start(),
            whole.end(),
            Import::new(source.as_str(), classify(path))
                .with_symbols(symbols)
                .at_line(line),
        ));
    }

    let mut exports: Vec<(usize, Export)> = Vec::new();
    for caps in RE_PUB_ITEM.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let kind = match &caps["kw"] {
            "fn" => ExportKind::Function,
            "struct" => ExportKind::Struct,
            "enum" => ExportKind::Enum,
            "trait" => ExportKind::Trait,
            "const" => ExportKind::Const,
            "static" => ExportKind::Static,
            "mod" => ExportKind::Module,
            _ => ExportKind::Type,
        };
        exports.push((
            whole.start(),
            Export::new(&caps["name"], kind).at_line(line_of_offset(&stripped, whole.start())),
        ));
    }

    let covered: Vec<(u32, u32)> = imports
        .iter()
        .map(|(start, end, _)| {
            (line_of_offset(&stripped, *start), line_of_offset(&stripped, *end))
        })
        .collect();
    for m in RE_USE_LINE.find_iter(&stripped) {
        let line = line_of_offset(&stripped, m.start());
        if !covered.iter().any(|(lo, hi)| line >= *lo && line <= *hi) {
            result
                .warnings
                .push(ParseWarning::new(Some(line), "malformed use declaration"));
        }
    }

    imports.sort_by_key(|(start, _, _)| *start);
    exports.sort_by_key(|(start, _)| *start);
    result.imports = imports.into_iter().map(|(_, _, import)| import).collect();
    result.exports = exports.into_iter().map(|(_, export)| export).collect();
    result
}

/// Split `a::b::C` into (`a::b`, `C`); a bare segment is its own leaf
fn split_leaf(path: &str) -> (String, String) {
    match path.rfind("::") {
        Some(idx) => (path[..idx].to_owned(), path[idx + 2..].to_owned()),
        None => (path.to_owned(), path.to_owned()),
    }
}

/// Local names from a `{A, B as C, self, nested::{D}}` group
///
/// Nested groups are flattened tolerantly: each comma part contributes its
/// trailing identifier.
fn parse_use_group(group: &str, parent_path: &str) -> Vec<String> {
    group
        .split(',')
        .filter_map(|part| {
            let part = part.trim().trim_matches(|c| c == '{' || c == '}').trim();
            if part.is_empty() {
                return None;
            }
            if let Some((_, alias)) = part.split_once(" as ") {
                return Some(alias.trim().to_owned());
            }
            let leaf = part.rsplit("::").next().unwrap_or(part);
            let leaf = leaf.trim_matches(|c| c == '{' || c == '}').trim();
            if leaf == "self" {
                // `use a::b::{self}` imports b itself
                return Some(split_leaf(parent_path).1);
            }
            if leaf == "*" || leaf.chars().all(|c| c.is_alphanumeric() || c == '_') {
                Some(leaf.to_owned())
            } else {
                None
            }
        })
        .collect()
}

/// Classify by path root: crate/self/super are internal, std/core/alloc are
/// stdlib, anything else is an external crate.
fn classify(path: &str) -> ImportKind {
    let root = path.split("::").next().unwrap_or(path);
    match root {
        "crate" | "self" | "super" => ImportKind::Internal,
        "std" | "core" | "alloc" => ImportKind::Stdlib,
        _ => ImportKind::External,
    }
}
