//! Filesystem scanner
//!
//! Enumerates eligible source files under a project root:
//! - Walks with `ignore` (hierarchical .gitignore semantics, `!` re-includes)
//! - Skips the built-in ignore set (node_modules, dist, target, ...) and
//!   dot-directories except `.github`
//! - Skips binary extensions and files over the size cap
//! - Derives language and role for every kept file
//!
//! For a fixed tree state the output is bit-identical across runs: results
//! are deduplicated by relative path and sorted lexicographically.

use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;

use crate::types::{FileRole, Language, ScannedFile};

/// Default cap: files at or above this size are skipped (2 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Directory names never descended into
const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "out",
    "target",
    ".next",
    ".cache",
    "coverage",
    "htmlcov",
    ".nyc_output",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".claude",
];

/// Extensions that mark binary content (images, media, archives, compiled artifacts)
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "icns", "webp", "tiff", "mp3", "wav", "ogg",
    "flac", "mp4", "avi", "mov", "mkv", "webm", "zip", "tar", "gz", "bz2", "xz", "7z", "rar",
    "jar", "war", "class", "o", "a", "so", "dylib", "dll", "exe", "bin", "dat", "pdf", "doc",
    "docx", "xls", "xlsx", "ppt", "pptx", "woff", "woff2", "ttf", "eot", "otf", "pyc", "pyo",
    "wasm", "db", "sqlite", "sqlite3",
];

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("project root does not exist: {0:?}")]
    RootMissing(PathBuf),

    #[error("project root is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("invalid ignore pattern {pattern:?}: {source}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Additional ignore globs, matched against the relative path
    pub extra_ignores: Vec<String>,
    /// Files at or above this size are skipped
    pub max_file_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { extra_ignores: Vec::new(), max_file_size: DEFAULT_MAX_FILE_SIZE }
    }
}

/// Result of a scan: the ordered file list plus non-fatal warnings
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Eligible files, deduplicated and sorted by relative path
    pub files: Vec<ScannedFile>,
    /// Per-file problems (unreadable files, etc.); the file is omitted
    pub warnings: Vec<String>,
}

/// Scan a project root and return eligible files
pub fn scan(root: &Path, options: &ScanOptions) -> Result<ScanOutcome, ScanError> {
    if !root.exists() {
        return Err(ScanError::RootMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let root = root
        .canonicalize()
        .map_err(|_| ScanError::RootMissing(root.to_path_buf()))?;

    let extra: Vec<glob::Pattern> = options
        .extra_ignores
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|source| ScanError::BadPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect::<Result<_, _>>()?;

    // Phase 1: sequential walk collecting candidate paths.
    let mut candidates: Vec<(PathBuf, String, u64, u64)> = Vec::new();
    let walker = WalkBuilder::new(&root)
        .follow_links(false)
        .hidden(false)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(false)
        .require_git(false)
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                keep_directory(&name)
            } else {
                true
            }
        })
        .build();

    let mut warnings = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warnings.push(format!("walk error: {err}"));
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let relative = match path.strip_prefix(&root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        let extension = extension_of(path);
        if BINARY_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }
        if extra.iter().any(|p| p.matches(&relative)) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warnings.push(format!("{relative}: cannot stat ({err})"));
                continue;
            }
        };
        if metadata.len() >= options.max_file_size {
            log::debug!("skipping {relative}: {} bytes over cap", metadata.len());
            continue;
        }

        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        candidates.push((path.to_path_buf(), relative, metadata.len(), modified_at));
    }

    // Phase 2: read contents in parallel for line counts. Unreadable files
    // become warnings and are omitted.
    let results: Vec<Result<ScannedFile, String>> = candidates
        .into_par_iter()
        .map(|(absolute, relative, size, modified_at)| {
            let lines = match std::fs::read_to_string(&absolute) {
                Ok(content) => count_lines(&content),
                Err(err) => {
                    // Non-UTF-8 content still counts as scannable metadata
                    if err.kind() == std::io::ErrorKind::InvalidData {
                        0
                    } else {
                        return Err(format!("{relative}: cannot read ({err})"));
                    }
                }
            };
            let file_name = relative.rsplit('/').next().unwrap_or(&relative).to_owned();
            let extension = extension_of(&absolute);
            let language = Language::detect(&file_name, &extension);
            let role = derive_role(&relative, &file_name, language);
            Ok(ScannedFile {
                relative_path: relative,
                absolute_path: absolute,
                size,
                extension,
                language,
                modified_at,
                role,
                lines,
            })
        })
        .collect();

    let mut files = Vec::new();
    for result in results {
        match result {
            Ok(file) => files.push(file),
            Err(warning) => warnings.push(warning),
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    files.dedup_by(|a, b| a.relative_path == b.relative_path);

    Ok(ScanOutcome { files, warnings })
}

/// Directory filter: built-in ignore set plus the dot-directory rule
fn keep_directory(name: &str) -> bool {
    if IGNORED_DIRS.contains(&name) {
        return false;
    }
    if name.starts_with('.') && name != "." && name != ".github" {
        return false;
    }
    true
}

/// Lowercase extension without the leading dot
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Count lines the way editors do: trailing newline does not add a line
fn count_lines(content: &str) -> u32 {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.bytes().filter(|b| *b == b'\n').count() as u32;
    if content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Derive a file's role from its path, name, and language
fn derive_role(relative: &str, file_name: &str, language: Language) -> FileRole {
    if is_test_path(relative, file_name) {
        return FileRole::Test;
    }
    if matches!(
        file_name,
        "Dockerfile" | "Makefile" | "Justfile" | "Cargo.toml" | "package.json" | "pyproject.toml"
            | "go.mod" | "go.sum" | "Cargo.lock"
    ) {
        return FileRole::Build;
    }
    if is_config_name(file_name) {
        return FileRole::Config;
    }
    if language == Language::Config && (!relative.contains('/') || relative.starts_with("config/"))
    {
        return FileRole::Config;
    }
    if language == Language::Markdown {
        return FileRole::Doc;
    }
    if matches!(language, Language::Css | Language::Html) || file_name.ends_with(".svg") {
        return FileRole::Asset;
    }
    if language == Language::Unknown {
        return FileRole::Unknown;
    }
    FileRole::Source
}

/// Test detection: tests/ or __tests__/ directories, *.test.*, *.spec.*
fn is_test_path(relative: &str, file_name: &str) -> bool {
    let in_test_dir = relative
        .split('/')
        .rev()
        .skip(1)
        .any(|seg| seg == "tests" || seg == "test" || seg == "__tests__");
    if in_test_dir {
        return true;
    }
    let mut parts = file_name.split('.');
    let _stem = parts.next();
    parts.any(|p| p == "test" || p == "spec")
}

/// Well-known config file names (.eslintrc*, tsconfig*.json, *.config.*)
fn is_config_name(file_name: &str) -> bool {
    if file_name.starts_with(".eslintrc") || file_name.starts_with(".prettierrc") {
        return true;
    }
    if file_name.starts_with("tsconfig") && file_name.ends_with(".json") {
        return true;
    }
    file_name.contains(".config.")
}
