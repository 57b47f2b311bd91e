//! Import path resolution against the scanned file set
//!
//! Relative specifiers are normalized against the importing file's
//! directory, then probed with the extension and index-file conventions of
//! each language family. An unresolved specifier returns its normalized
//! best-effort path, which later surfaces as a broken reference.

use std::collections::HashSet;

/// Extensions probed, in order, after the as-is candidate
const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "py", "go", "rs"];

/// Resolve a `./`, `../`, or `/` specifier relative to `current_file`
///
/// Returns the first candidate present in `scanned`, else the normalized
/// path unchanged.
pub fn resolve_relative(
    import_path: &str,
    current_file: &str,
    scanned: &HashSet<String>,
) -> String {
    let base = if let Some(rooted) = import_path.strip_prefix('/') {
        // Leading slash means project-root relative
        normalize(rooted)
    } else {
        let dir = parent_dir(current_file);
        if dir.is_empty() {
            normalize(import_path)
        } else {
            normalize(&format!("{dir}/{import_path}"))
        }
    };

    if scanned.contains(&base) {
        return base;
    }
    for ext in RESOLVE_EXTENSIONS {
        let candidate = format!("{base}.{ext}");
        if scanned.contains(&candidate) {
            return candidate;
        }
    }
    for index in ["index.ts", "index.tsx", "index.js", "index.jsx", "__init__.py", "mod.rs"] {
        let candidate = if base.is_empty() {
            index.to_owned()
        } else {
            format!("{base}/{index}")
        };
        if scanned.contains(&candidate) {
            return candidate;
        }
    }
    base
}

/// Resolve a Python package-relative module (`.`, `.models`, `..core.db`)
pub fn resolve_python_relative(
    module: &str,
    current_file: &str,
    scanned: &HashSet<String>,
) -> String {
    let dots = module.chars().take_while(|c| *c == '.').count();
    let rest = &module[dots..];

    // One dot is the current package; each further dot climbs one level
    let mut dir = parent_dir(current_file).to_owned();
    for _ in 1..dots {
        dir = parent_dir(&dir).to_owned();
    }

    let base = if rest.is_empty() {
        dir
    } else if dir.is_empty() {
        rest.replace('.', "/")
    } else {
        format!("{}/{}", dir, rest.replace('.', "/"))
    };

    let module_file = format!("{base}.py");
    if scanned.contains(&module_file) {
        return module_file;
    }
    let package_init = if base.is_empty() {
        "__init__.py".to_owned()
    } else {
        format!("{base}/__init__.py")
    };
    if scanned.contains(&package_init) {
        return package_init;
    }
    module_file
}

/// Resolve a Rust module path (`crate::...`, `self::...`, `super::...`)
///
/// Best effort: `crate` maps to `src/`, `self` to the current directory,
/// `super` climbs one directory per repetition. Probes `<path>.rs` then
/// `<path>/mod.rs`, dropping trailing segments for item imports.
pub fn resolve_rust_internal(
    source: &str,
    current_file: &str,
    scanned: &HashSet<String>,
) -> String {
    let mut segments = source.split("::").peekable();
    let mut base = match segments.peek().copied() {
        Some("crate") => {
            segments.next();
            "src".to_owned()
        }
        Some("self") => {
            segments.next();
            parent_dir(current_file).to_owned()
        }
        Some("super") => {
            let mut dir = parent_dir(current_file).to_owned();
            while segments.peek() == Some(&"super") {
                segments.next();
                dir = parent_dir(&dir).to_owned();
            }
            dir
        }
        _ => parent_dir(current_file).to_owned(),
    };
    for segment in segments {
        if base.is_empty() {
            base = segment.to_owned();
        } else {
            base = format!("{base}/{segment}");
        }
    }

    let mut probe = base.clone();
    loop {
        let module_file = format!("{probe}.rs");
        if scanned.contains(&module_file) {
            return module_file;
        }
        let mod_file = format!("{probe}/mod.rs");
        if scanned.contains(&mod_file) {
            return mod_file;
        }
        match probe.rfind('/') {
            Some(idx) => probe.truncate(idx),
            None => break,
        }
    }
    // Crate roots for a bare `crate::Item`
    for root in ["src/lib.rs", "src/main.rs"] {
        if base.starts_with("src") && scanned.contains(root) {
            return (*root).to_owned();
        }
    }
    format!("{base}.rs")
}

/// Collapse `.` and `..` components; `..` below the root is dropped
fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}
