//! JavaScript / TypeScript back-end
//!
//! Recognizes ES module syntax (static, namespace, side-effect, dynamic
//! imports, re-exports) plus CommonJS `require` / `module.exports`. Relative
//! specifiers (`./`, `../`, `/`) classify as internal; everything else,
//! including Node built-ins, classifies as external.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::{line_of_offset, strip_c_comments};
use crate::types::{Export, ExportKind, Import, ImportKind, Language, ParseResult, ParseWarning};

// Static import with a binding clause: default, named, namespace, or mixed.
// The clause alternatives are exact shapes; `import from 'x'` and unclosed
// brace lists fall through to the malformed-line check. `[^}]*` crosses
// newlines, so multi-line named import lists match.
static RE_IMPORT_STMT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*import\s+(?:type\s+)?(?P<clause>\{[^}]*\}|\*\s*as\s+[A-Za-z_$][\w$]*|[A-Za-z_$][\w$]*(?:\s*,\s*(?:\{[^}]*\}|\*\s*as\s+[A-Za-z_$][\w$]*))?)\s*from\s*['"](?P<src>[^'"]+)['"]"#,
    )
    .unwrap()
});

// Side-effect import: `import './styles.css';`
static RE_IMPORT_SIDE_EFFECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s*['"](?P<src>[^'"]+)['"]"#).unwrap()
});

// Dynamic import anywhere, optionally awaited
static RE_IMPORT_DYNAMIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s*\(\s*['"](?P<src>[^'"]+)['"]\s*\)"#).unwrap()
});

// CommonJS require bound to a name or destructuring pattern
static RE_REQUIRE_BOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:const|let|var)\s+(?P<binding>\{[^}]*\}|[A-Za-z_$][\w$]*)\s*=\s*require\s*\(\s*['"](?P<src>[^'"]+)['"]\s*\)"#,
    )
    .unwrap()
});

// Statement-level bare require
static RE_REQUIRE_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*require\s*\(\s*['"](?P<src>[^'"]+)['"]\s*\)"#).unwrap()
});

// `export * from 'mod'` / `export * as ns from 'mod'`
static RE_EXPORT_STAR_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*export\s*\*\s*(?:as\s+(?P<ns>[A-Za-z_$][\w$]*)\s+)?from\s*['"](?P<src>[^'"]+)['"]"#)
        .unwrap()
});

// `export { a, b } from 'mod'`
static RE_EXPORT_NAMED_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*export\s*(?:type\s*)?\{(?P<named>[^}]*)\}\s*from\s*['"](?P<src>[^'"]+)['"]"#)
        .unwrap()
});

// `export { a, b }` without a source (the `from` variant is consumed first)
static RE_EXPORT_BRACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*export\s*(?:type\s*)?\{(?P<named>[^}]*)\}").unwrap()
});

static RE_EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*export\s+default\b").unwrap());

// `export const X`, `export function X(`, `export class X`, TS declarations
static RE_EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*export\s+(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?P<kw>const|let|var|function|class|interface|type|enum)\s+\*?\s*(?P<name>[A-Za-z_$][\w$]*)",
    )
    .unwrap()
});

// `module.exports = {...}` or `module.exports = expr`
static RE_MODULE_EXPORTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"module\.exports\s*=\s*(?P<obj>\{[^}]*\})?").unwrap()
});

// `exports.name = ...`
static RE_EXPORTS_PROP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:module\.)?exports\.(?P<name>[A-Za-z_$][\w$]*)\s*=").unwrap()
});

static RE_IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*import\b").unwrap());

/// Parse JavaScript or TypeScript source
pub(super) fn parse(content: &str, language: Language) -> ParseResult {
    let stripped = strip_c_comments(content, false, true);
    let mut result = ParseResult::for_language(language);

    // (start offset, end offset, import) so source order survives the
    // multi-pass extraction and malformed lines can be identified after.
    let mut imports: Vec<(usize, usize, Import)> = Vec::new();
    let mut exports: Vec<(usize, Export)> = Vec::new();
    let mut consumed_starts: HashSet<usize> = HashSet::new();

    for caps in RE_IMPORT_STMT.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let src = &caps["src"];
        let symbols = parse_binding_clause(&caps["clause"]);
        consumed_starts.insert(whole.start());
        imports.push((
            whole.start(),
            whole.end(),
            Import::new(src, classify(src))
                .with_symbols(symbols)
                .at_line(line_of_offset(&stripped, whole.start())),
        ));
    }

    for caps in RE_IMPORT_SIDE_EFFECT.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        if consumed_starts.contains(&whole.start()) {
            continue;
        }
        let src = &caps["src"];
        consumed_starts.insert(whole.start());
        imports.push((
            whole.start(),
            whole.end(),
            Import::new(src, classify(src)).at_line(line_of_offset(&stripped, whole.start())),
        ));
    }

    for caps in RE_IMPORT_DYNAMIC.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let src = &caps["src"];
        let mut import =
            Import::new(src, classify(src)).at_line(line_of_offset(&stripped, whole.start()));
        import.is_dynamic = true;
        imports.push((whole.start(), whole.end(), import));
    }

    for caps in RE_REQUIRE_BOUND.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let src = &caps["src"];
        let symbols = parse_binding_clause(&caps["binding"]);
        imports.push((
            whole.start(),
            whole.end(),
            Import::new(src, classify(src))
                .with_symbols(symbols)
                .at_line(line_of_offset(&stripped, whole.start())),
        ));
    }

    for caps in RE_REQUIRE_BARE.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        // `const x = require(...)` indents the call; only statement-level
        // requires land here, and bound ones never start the line.
        let src = &caps["src"];
        imports.push((
            whole.start(),
            whole.end(),
            Import::new(src, classify(src)).at_line(line_of_offset(&stripped, whole.start())),
        ));
    }

    // Re-exports yield both halves: an import edge and an export record
    for caps in RE_EXPORT_STAR_FROM.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let src = &caps["src"];
        let line = line_of_offset(&stripped, whole.start());
        let name = caps
            .name("ns")
            .map(|m| m.as_str().to_owned())
            .unwrap_or_else(|| "*".to_owned());
        imports.push((
            whole.start(),
            whole.end(),
            Import::new(src, ImportKind::ReExport).at_line(line),
        ));
        exports.push((whole.start(), Export::new(name, ExportKind::ReExport).at_line(line)));
    }

    for caps in RE_EXPORT_NAMED_FROM.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let src = &caps["src"];
        let line = line_of_offset(&stripped, whole.start());
        let names = parse_named_list(&caps["named"]);
        consumed_starts.insert(whole.start());
        imports.push((
            whole.start(),
            whole.end(),
            Import::new(src, ImportKind::ReExport)
                .with_symbols(names.clone())
                .at_line(line),
        ));
        for name in names {
            exports.push((whole.start(), Export::new(name, ExportKind::ReExport).at_line(line)));
        }
    }

    for caps in RE_EXPORT_BRACES.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        if consumed_starts.contains(&whole.start()) {
            continue;
        }
        let line = line_of_offset(&stripped, whole.start());
        for name in parse_named_list(&caps["named"]) {
            exports.push((whole.start(), Export::new(name, ExportKind::Named).at_line(line)));
        }
    }

    for m in RE_EXPORT_DEFAULT.find_iter(&stripped) {
        exports.push((
            m.start(),
            Export::new("default", ExportKind::Default).at_line(line_of_offset(&stripped, m.start())),
        ));
    }

    for caps in RE_EXPORT_DECL.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let line = line_of_offset(&stripped, whole.start());
        let kind = match &caps["kw"] {
            "interface" => ExportKind::Interface,
            "type" => ExportKind::Type,
            "enum" => ExportKind::Enum,
            _ => ExportKind::Named,
        };
        exports.push((whole.start(), Export::new(&caps["name"], kind).at_line(line)));
    }

    for caps in RE_MODULE_EXPORTS.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        let line = line_of_offset(&stripped, whole.start());
        match caps.name("obj") {
            Some(obj) => {
                for name in parse_object_keys(obj.as_str()) {
                    exports.push((
                        whole.start(),
                        Export::new(name, ExportKind::CommonJs).at_line(line),
                    ));
                }
            }
            None => {
                exports.push((
                    whole.start(),
                    Export::new("module.exports", ExportKind::CommonJs).at_line(line),
                ));
            }
        }
    }

    for caps in RE_EXPORTS_PROP.captures_iter(&stripped) {
        let whole = caps.get(0).unwrap();
        exports.push((
            whole.start(),
            Export::new(&caps["name"], ExportKind::CommonJs)
                .at_line(line_of_offset(&stripped, whole.start())),
        ));
    }

    // Any line that opens an import statement but produced no record is
    // malformed input, reported as a warning rather than an error.
    let covered: Vec<(u32, u32)> = imports
        .iter()
        .map(|(start, end, _)| {
            (line_of_offset(&stripped, *start), line_of_offset(&stripped, *end))
        })
        .collect();
    for m in RE_IMPORT_LINE.find_iter(&stripped) {
        let line = line_of_offset(&stripped, m.start());
        let is_covered = covered.iter().any(|(lo, hi)| line >= *lo && line <= *hi);
        if !is_covered {
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

/// Classify an import specifier: relative/absolute paths are internal,
/// everything else (packages, `@scope/...`, Node built-ins, `node:*`) is
/// external.
fn classify(source: &str) -> ImportKind {
    if source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('/')
        || source == "."
        || source == ".."
    {
        ImportKind::Internal
    } else {
        ImportKind::External
    }
}

/// Extract local names from an import binding clause: `Default`,
/// `{ a, b as c }`, `* as NS`, `Default, { a }`, or a destructuring pattern.
fn parse_binding_clause(clause: &str) -> Vec<String> {
    let clause = clause.trim();
    if clause.is_empty() {
        return Vec::new();
    }

    let mut symbols = Vec::new();
    let (outside, inside) = match (clause.find('{'), clause.find('}')) {
        (Some(open), Some(close)) if close > open => {
            (format!("{} {}", &clause[..open], &clause[close + 1..]), &clause[open + 1..close])
        }
        _ => (clause.to_owned(), ""),
    };

    for part in outside.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(ns) = part.strip_prefix('*') {
            if let Some(name) = ns.trim().strip_prefix("as") {
                symbols.push(name.trim().to_owned());
            }
        } else if is_identifier(part) {
            symbols.push(part.to_owned());
        }
    }
    symbols.extend(parse_named_list(inside));
    symbols
}

/// Extract local names from a `{ a, b as c, type D }` list
fn parse_named_list(list: &str) -> Vec<String> {
    list.split(',')
        .filter_map(|part| {
            let part = part.trim().trim_start_matches("type ").trim();
            if part.is_empty() {
                return None;
            }
            let local = match part.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => part,
            };
            is_identifier(local).then(|| local.to_owned())
        })
        .collect()
}

/// Top-level keys of an object literal body (`a`, `b: x`, shorthand methods)
fn parse_object_keys(obj: &str) -> Vec<String> {
    obj.trim_matches(|c| c == '{' || c == '}')
        .split(',')
        .filter_map(|part| {
            let key = part.split(':').next()?.trim();
            let key = key.trim_start_matches("...").trim();
            is_identifier(key).then(|| key.to_owned())
        })
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_js(content: &str) -> ParseResult {
        parse(content, Language::JavaScript)
    }

    #[test]
    fn test_four_import_shapes() {
        let src = "import React from 'react';\n\
                   import { useState, useEffect } from 'react';\n\
                   import * as Utils from './utils';\n\
                   import './styles.css';\n";
        let result = parse_js(src);
        assert_eq!(result.imports.len(), 4);

        assert_eq!(result.imports[0].symbols, vec!["React"]);
        assert_eq!(result.imports[0].kind, ImportKind::External);

        assert!(result.imports[1].symbols.contains(&"useState".to_owned()));
        assert!(result.imports[1].symbols.contains(&"useEffect".to_owned()));

        assert_eq!(result.imports[2].source, "./utils");
        assert_eq!(result.imports[2].kind, ImportKind::Internal);
        assert_eq!(result.imports[2].symbols, vec!["Utils"]);

        assert_eq!(result.imports[3].source, "./styles.css");
        assert!(result.imports[3].symbols.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_aliased_named_import() {
        let result = parse_js("import { a, b as c } from 'pkg';");
        assert_eq!(result.imports[0].symbols, vec!["a", "c"]);
    }

    #[test]
    fn test_mixed_default_and_named() {
        let result = parse_js("import Default, { a } from './mod';");
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].symbols, vec!["Default", "a"]);
    }

    #[test]
    fn test_multiline_named_import() {
        let result = parse_js("import {\n  first,\n  second,\n} from './big';");
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].symbols, vec!["first", "second"]);
        assert_eq!(result.imports[0].line, Some(1));
    }

    #[test]
    fn test_dynamic_import() {
        let result = parse_js("const mod = await import('./lazy');\nimport('side');");
        assert_eq!(result.imports.len(), 2);
        assert!(result.imports.iter().all(|i| i.is_dynamic));
        assert_eq!(result.imports[0].source, "./lazy");
    }

    #[test]
    fn test_commonjs_require() {
        let src = "const fs = require('fs');\n\
                   const { join, resolve } = require('path');\n\
                   require('./side-effect');\n";
        let result = parse_js(src);
        assert_eq!(result.imports.len(), 3);
        assert_eq!(result.imports[0].symbols, vec!["fs"]);
        assert_eq!(result.imports[1].symbols, vec!["join", "resolve"]);
        assert!(result.imports[2].symbols.is_empty());
        // Node built-ins classify as external
        assert_eq!(result.imports[0].kind, ImportKind::External);
    }

    #[test]
    fn test_re_exports() {
        let src = "export * from './a';\nexport { x, y } from './b';\n";
        let result = parse_js(src);
        assert_eq!(result.imports.len(), 2);
        assert!(result.imports.iter().all(|i| i.kind == ImportKind::ReExport));
        let re_exports: Vec<_> = result
            .exports
            .iter()
            .filter(|e| e.kind == ExportKind::ReExport)
            .collect();
        assert_eq!(re_exports.len(), 3); // *, x, y
    }

    #[test]
    fn test_export_declarations() {
        let src = "export default function App() {}\n\
                   export const VERSION = '1.0';\n\
                   export function helper() {}\n\
                   export class Widget {}\n\
                   export { a, b };\n";
        let result = parse_js(src);
        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["default", "VERSION", "helper", "Widget", "a", "b"]);
        assert_eq!(result.exports[0].kind, ExportKind::Default);
        assert!(result.exports[1..].iter().all(|e| e.kind == ExportKind::Named));
    }

    #[test]
    fn test_module_exports() {
        let result = parse_js("module.exports = { alpha, beta: impl };");
        let names: Vec<&str> = result.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(result.exports.iter().all(|e| e.kind == ExportKind::CommonJs));

        let result = parse_js("module.exports = Router;\nexports.extra = 1;");
        assert_eq!(result.exports[0].name, "module.exports");
        assert_eq!(result.exports[1].name, "extra");
    }

    #[test]
    fn test_malformed_imports_warn_without_crashing() {
        let result = parse_js("import from 'x';\nimport { from 'broken';\n");
        assert!(result.imports.is_empty());
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].line, Some(1));
    }

    #[test]
    fn test_commented_imports_ignored() {
        let src = "// import dead from 'dead';\n/* import { gone } from 'gone'; */\nimport live from './live';\n";
        let result = parse_js(src);
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].source, "./live");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_and_comment_only_files() {
        assert!(parse_js("").imports.is_empty());
        let result = parse_js("// nothing here\n/* still nothing */\n");
        assert!(result.imports.is_empty());
        assert!(result.exports.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_import_in_string_ignored() {
        let result = parse_js("const s = \"import fake from 'fake'\";\n");
        assert!(result.imports.is_empty());
    }

    #[test]
    fn test_typescript_declarations() {
        let src = "export interface Props {}\nexport type Alias = string;\nexport enum Color { Red }\n";
        let result = parse(src, Language::TypeScript);
        assert_eq!(result.exports[0].kind, ExportKind::Interface);
        assert_eq!(result.exports[1].kind, ExportKind::Type);
        assert_eq!(result.exports[2].kind, ExportKind::Enum);
    }

    #[test]
    fn test_type_only_import() {
        let result = parse("import type { Props } from './types';", Language::TypeScript);
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].symbols, vec!["Props"]);
        assert_eq!(result.imports[0].kind, ImportKind::Internal);
    }

    #[test]
    fn test_scoped_package_is_external() {
        let result = parse_js("import { Injectable } from '@nestjs/common';");
        assert_eq!(result.imports[0].kind, ImportKind::External);
        assert_eq!(result.imports[0].source, "@nestjs/common");
    }

    #[test]
    fn test_line_numbers_recorded() {
        let src = "\n\nimport a from './a';\n\nimport b from './b';\n";
        let result = parse_js(src);
        assert_eq!(result.imports[0].line, Some(3));
        assert_eq!(result.imports[1].line, Some(5));
    }
}
