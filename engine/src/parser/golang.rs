//! Go back-end
//!
//! Handles single and block imports with optional aliases. Paths without a
//! dot in the first segment classify as stdlib; dotted hosts are external.
//! Exports follow Go's capitalization rule: any top-level `func`, `type`,
//! `var`, or `const` whose name starts with an uppercase letter.

use regex::Regex;
use std::sync::LazyLock;

use super::{line_of_offset, strip_c_comments};
use crate::types::{Export, ExportKind, Import, ImportKind, Language, ParseResult, ParseWarning};

static RE_IMPORT_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^import\s+(?:(?P<alias>[A-Za-z_]\w*|\.)\s+)?"(?P<path>[^"]+)""#).unwrap()
});

static RE_IMPORT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)import\s*\((?P<body>.*?)\)").unwrap());

static RE_BLOCK_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:(?P<alias>[A-Za-z_]\w*|\.|_)\s+)?"(?P<path>[^"]+)""#).unwrap()
});

static RE_FUNC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Z]\w*)\s*\(").unwrap()
});

static RE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^type\s+(?P<name>[A-Z]\w*)(?:\s+(?P<form>struct|interface)\b)?").unwrap()
});

static RE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?P<kw>var|const)\s+(?P<name>[A-Z]\w*)").unwrap());

// `var (` / `const (` declaration blocks
static RE_DECL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(?m)^(?P<kw>var|const)\s*\((?P<body>.*?)\)").unwrap());

static RE_DECL_BLOCK_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?P<name>[A-Z]\w*)").unwrap());

static RE_IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^import\b").unwrap());

/// Parse Go source
pub(super) fn parse(content: &str) -> ParseResult {
    let stripped = strip_c_comments(content, false, false);
    let mut result = ParseResult::for_language(Language::Go);

    let mut imports: Vec<(usize, usize, Import)> = Vec::new();
    // Byte ranges of recognized import statements, including block headers
    let mut covered_ranges: Vec<(usize, usize)> = Vec::new();

    for caps in RE_IMPORT_SINGLE.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        covered_ranges.push((whole.start(), whole.end()));
        imports.push((
            whole.start(),
            whole.end(),
            block_entry(
                caps.name("alias").map(|m| m.as_str()),
                &caps["path"],
                line_of_offset(&stripped, whole.start()),
            ),
        ));
    }

    for caps in RE_IMPORT_BLOCK.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        covered_ranges.push((whole.start(), whole.end()));
        let body = caps.name("body").unwrap();
        for entry in RE_BLOCK_ENTRY.captures_iter(body.as_str()) {
            let offset = body.start() + entry.get(0).unwrap().start();
            imports.push((
                offset,
                whole.end(),
                block_entry(
                    entry.name("alias").map(|m| m.as_str()),
                    &entry["path"],
                    line_of_offset(&stripped, offset),
                ),
            ));
        }
    }

    let mut exports: Vec<(usize, Export)> = Vec::new();
    for caps in RE_FUNC.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        exports.push((
            whole.start(),
            Export::new(&caps["name"], ExportKind::Function)
                .at_line(line_of_offset(&stripped, whole.start())),
        ));
    }
    for caps in RE_TYPE.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let kind = match caps.name("form").map(|m| m.as_str()) {
            Some("struct") => ExportKind::Struct,
            Some("interface") => ExportKind::Interface,
            _ => ExportKind::Type,
        };
        exports.push((
            whole.start(),
            Export::new(&caps["name"], kind).at_line(line_of_offset(&stripped, whole.start())),
        ));
    }
    for caps in RE_VAR.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let kind = if &caps["kw"] == "var" { ExportKind::Var } else { ExportKind::Const };
        exports.push((
            whole.start(),
            Export::new(&caps["name"], kind).at_line(line_of_offset(&stripped, whole.start())),
        ));
    }
    for caps in RE_DECL_BLOCK.captures_iter(&stripped) {
        let kind = if &caps["kw"] == "var" { ExportKind::Var } else { ExportKind::Const };
        let body = caps.name("body").unwrap();
        for entry in RE_DECL_BLOCK_ENTRY.captures_iter(body.as_str()) {
            let offset = body.start() + entry.get(0).unwrap().start();
            exports.push((
                offset,
                Export::new(&entry["name"], kind).at_line(line_of_offset(&stripped, offset)),
            ));
        }
    }

    let covered: Vec<(u32, u32)> = covered_ranges
        .iter()
        .map(|(start, end)| {
            (line_of_offset(&stripped, *start), line_of_offset(&stripped, *end))
        })
        .collect();
    for m in RE_IMPORT_LINE.find_iter(&stripped) {
        let line = line_of_offset(&stripped, m.start());
        if !covered.iter().any(|(lo, hi)| line >= *lo && line <= *hi) {
            result
                .warnings
                .push(ParseWarning::new(Some(line), "malformed import statement"));
        }
    }

    imports.sort_by_key(|(start, _, _)| *start);
    exports.sort_by_key(|(start, _)| *start);
    result.imports = imports.into_iter().map(|(_, _, import)| import).collect();
    result.exports = exports.into_iter().map(|(_, export)| export).collect();
    result
}

/// Build one Import from an import path plus optional alias
fn block_entry(alias: Option<&str>, path: &str, line: u32) -> Import {
    let symbol = match alias {
        Some(alias) => alias.to_owned(),
        None => path.rsplit('/').next().unwrap_or(path).to_owned(),
    };
    Import::new(path, classify(path))
        .with_symbols(vec![symbol])
        .at_line(line)
}

/// Stdlib paths have no dot in their first segment (`fmt`, `net/http`);
/// dotted hosts (`github.com/...`) are external modules.
fn classify(path: &str) -> ImportKind {
    if path.starts_with("./") || path.starts_with("../") {
        return ImportKind::Internal;
    }
    let first = path.split('/').next().unwrap_or(path);
    if first.contains('.') {
        ImportKind::External
    } else {
        ImportKind::Stdlib
    }
}
