//! Python back-end
//!
//! Handles `import X [as Y]` lists, `from X import ...` (including relative
//! and parenthesized multi-line forms), and export discovery: top-level
//! classes and functions (underscore-prefixed names skipped) plus `__all__`
//! entries, which are public regardless of the underscore rule.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::{line_of_offset, strip_python_comments};
use crate::types::{Export, ExportKind, Import, ImportKind, Language, ParseResult, ParseWarning};

/// Roots of the Python standard library relevant to classification
const PYTHON_STDLIB: &[&str] = &[
    "abc", "argparse", "asyncio", "base64", "collections", "configparser", "contextlib", "copy",
    "csv", "dataclasses", "datetime", "decimal", "enum", "functools", "glob", "hashlib", "http",
    "importlib", "inspect", "io", "itertools", "json", "logging", "math", "multiprocessing", "os",
    "pathlib", "pickle", "platform", "queue", "random", "re", "shutil", "signal", "socket",
    "sqlite3", "string", "struct", "subprocess", "sys", "tempfile", "threading", "time",
    "traceback", "types", "typing", "unittest", "urllib", "uuid", "warnings", "weakref", "xml",
    "zlib",
];

static RE_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^import\s+(?P<names>[\w.,\s]+?)\s*$").unwrap());

// `from X import (...)` first so the parenthesized multi-line form wins
static RE_FROM_IMPORT_PAREN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^from\s+(?P<module>\.*[\w.]*)\s+import\s*\((?P<names>[^)]*)\)").unwrap()
});

static RE_FROM_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^from\s+(?P<module>\.*[\w.]*)\s+import\s+(?P<names>[\w.*,\s]+?)\s*$").unwrap()
});

// Top-level (indent zero) definitions only
static RE_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^class\s+(?P<name>[A-Za-z_]\w*)").unwrap());

static RE_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)\s*\(").unwrap());

static RE_ALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)__all__\s*=\s*\[(?P<body>.*?)\]").unwrap());

static RE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).unwrap());

static RE_IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:import|from)\b").unwrap());

/// Parse Python source
pub(super) fn parse(content: &str) -> ParseResult {
    let stripped = strip_python_comments(content);
    let mut result = ParseResult::for_language(Language::Python);

    let mut imports: Vec<(usize, usize, Import)> = Vec::new();
    let mut consumed: HashSet<usize> = HashSet::new();

    for caps in RE_IMPORT.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let line = line_of_offset(&stripped, whole.start());
        consumed.insert(whole.start());
        // `import a, b as c` is one import per comma-separated name
        for name in caps["names"].split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let (module, alias) = match name.split_once(" as ") {
                Some((module, alias)) => (module.trim(), alias.trim()),
                None => (name, name),
            };
            imports.push((
                whole.start(),
                whole.end(),
                Import::new(module, classify(module))
                    .with_symbols(vec![alias.to_owned()])
                    .at_line(line),
            ));
        }
    }

    for caps in RE_FROM_IMPORT_PAREN.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        consumed.insert(whole.start());
        imports.push((
            whole.start(),
            whole.end(),
            from_import(&caps["module"], &caps["names"], line_of_offset(&stripped, whole.start())),
        ));
    }

    for caps in RE_FROM_IMPORT.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        if consumed.contains(&whole.start()) {
            continue;
        }
        imports.push((
            whole.start(),
            whole.end(),
            from_import(&caps["module"], &caps["names"], line_of_offset(&stripped, whole.start())),
        ));
    }

    // Exports: public top-level classes and functions
    let mut exports: Vec<(usize, Export)> = Vec::new();
    for caps in RE_CLASS.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let name = &caps["name"];
        if name.starts_with('_') {
            continue;
        }
        exports.push((
            whole.start(),
            Export::new(name, ExportKind::Class).at_line(line_of_offset(&stripped, whole.start())),
        ));
    }
    for caps in RE_DEF.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let name = &caps["name"];
        if name.starts_with('_') {
            continue;
        }
        exports.push((
            whole.start(),
            Export::new(name, ExportKind::Function)
                .at_line(line_of_offset(&stripped, whole.start())),
        ));
    }

    // `__all__` entries are exported regardless of the underscore rule
    if let Some(caps) = RE_ALL.captures(&stripped) {
        let body = caps.name("body").unwrap();
        let line = line_of_offset(&stripped, body.start());
        for quoted in RE_QUOTED.captures_iter(body.as_str()) {
            exports.push((
                body.start(),
                Export::new(&quoted[1], ExportKind::Named).at_line(line),
            ));
        }
    }

    // Import-opening lines that produced nothing are malformed
    let covered: Vec<(u32, u32)> = imports
        .iter()
        .map(|(start, end, _)| {
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

/// Build the Import for a `from MODULE import NAMES` statement
fn from_import(module: &str, names: &str, line: u32) -> Import {
    let symbols: Vec<String> = names
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let local = match part.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => part,
            };
            Some(local.to_owned())
        })
        .collect();
    Import::new(module, classify(module))
        .with_symbols(symbols)
        .at_line(line)
}

/// Classify a module path: leading dot is package-relative, stdlib roots are
/// stdlib, anything else is external.
fn classify(module: &str) -> ImportKind {
    if module.starts_with('.') {
        return ImportKind::Relative;
    }
    let root = module.split('.').next().unwrap_or(module);
    if PYTHON_STDLIB.contains(&root) {
        ImportKind::Stdlib
    } else {
        ImportKind::External
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_imports() {
        let result = parse("import os\nimport numpy as np\nimport json, sys\n");
        assert_eq!(result.imports.len(), 4);
        assert_eq!(result.imports[0].source, "os");
        assert_eq!(result.imports[0].kind, ImportKind::Stdlib);
        assert_eq!(result.imports[1].source, "numpy");
        assert_eq!(result.imports[1].symbols, vec!["np"]);
        assert_eq!(result.imports[1].kind, ImportKind::External);
        assert_eq!(result.imports[2].source, "json");
        assert_eq!(result.imports[3].source, "sys");
    }

    #[test]
    fn test_from_imports() {
        let result = parse("from pathlib import Path\nfrom flask import Flask, jsonify as j\n");
        assert_eq!(result.imports[0].source, "pathlib");
        assert_eq!(result.imports[0].symbols, vec!["Path"]);
        assert_eq!(result.imports[0].kind, ImportKind::Stdlib);
        assert_eq!(result.imports[1].symbols, vec!["Flask", "j"]);
        assert_eq!(result.imports[1].kind, ImportKind::External);
    }

    #[test]
    fn test_relative_imports() {
        let result = parse("from . import helpers\nfrom .models import User\nfrom ..core import db\n");
        assert!(result.imports.iter().all(|i| i.kind == ImportKind::Relative));
        assert_eq!(result.imports[1].source, ".models");
        assert_eq!(result.imports[2].source, "..core");
    }

    #[test]
    fn test_parenthesized_multiline_from() {
        let result = parse("from typing import (\n    List,\n    Optional,\n)\n");
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].symbols, vec!["List", "Optional"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_top_level_definitions() {
        let src = "class User:\n    def method(self):\n        pass\n\n\
                   def public_fn():\n    pass\n\n\
                   def _private_fn():\n    pass\n\n\
                   class _Hidden:\n    pass\n";
        let result = parse(src);
        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["User", "public_fn"]);
        assert_eq!(result.exports[0].kind, ExportKind::Class);
        assert_eq!(result.exports[1].kind, ExportKind::Function);
    }

    #[test]
    fn test_all_multiline() {
        let src = "__all__ = [\n    'alpha',\n    \"beta\",\n    '_even_private',\n]\n";
        let result = parse(src);
        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "_even_private"]);
        assert!(result.exports.iter().all(|e| e.is_public));
    }

    #[test]
    fn test_docstring_imports_ignored() {
        let src = "\"\"\"\nimport fake\nfrom fake import thing\n\"\"\"\nimport real\n";
        let result = parse(src);
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].source, "real");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_star_import() {
        let result = parse("from os.path import *\n");
        assert_eq!(result.imports[0].symbols, vec!["*"]);
        assert_eq!(result.imports[0].kind, ImportKind::Stdlib);
    }

    #[test]
    fn test_empty_file() {
        let result = parse("");
        assert!(result.imports.is_empty());
        assert!(result.exports.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_decorated_function_still_exports() {
        let src = "@app.route('/users')\ndef list_users():\n    pass\n\n@cached\nasync def fetch():\n    pass\n";
        let result = parse(src);
        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["list_users", "fetch"]);
    }

    #[test]
    fn test_dotted_module_import() {
        let result = parse("import os.path\nimport xml.etree.ElementTree as ET\n");
        assert_eq!(result.imports[0].source, "os.path");
        assert_eq!(result.imports[0].kind, ImportKind::Stdlib);
        assert_eq!(result.imports[1].symbols, vec!["ET"]);
    }
}
