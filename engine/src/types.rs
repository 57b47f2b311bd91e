//! Core type definitions for the project-maps engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single file discovered by the scanner
///
/// Identity is `relative_path`; records are immutable after the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedFile {
    /// Path relative to the project root, always `/`-separated
    pub relative_path: String,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Lowercase extension without the leading dot (empty if none)
    pub extension: String,
    /// Language derived from the extension table
    pub language: Language,
    /// Modification time (unix seconds)
    pub modified_at: u64,
    /// Role of the file in the project
    pub role: FileRole,
    /// Line count, measured once at scan time
    pub lines: u32,
}

impl ScannedFile {
    /// Filename without directories
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Directory portion of the relative path (empty for root-level files)
    pub fn parent_dir(&self) -> &str {
        match self.relative_path.rfind('/') {
            Some(idx) => &self.relative_path[..idx],
            None => "",
        }
    }
}

/// Language detected from a file's extension or name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Go,
    Rust,
    Sql,
    Markdown,
    Config,
    Build,
    Css,
    Html,
    Shell,
    Unknown,
}

impl Language {
    /// Detect language from a filename and its lowercase extension
    ///
    /// Extension-less build files (Dockerfile, Makefile) are recognized by
    /// name; everything else goes through the extension table.
    pub fn detect(file_name: &str, extension: &str) -> Self {
        match file_name {
            "Dockerfile" | "Makefile" | "Justfile" => Self::Build,
            _ => Self::from_extension(extension),
        }
    }

    /// Map a lowercase extension (no dot) through the extension table
    ///
    /// Unrecognized extensions yield [`Self::Unknown`]; the raw extension
    /// itself stays available on [`ScannedFile::extension`].
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "py" | "pyi" => Self::Python,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "sql" => Self::Sql,
            "md" | "rst" | "markdown" => Self::Markdown,
            "json" | "yaml" | "yml" | "toml" | "ini" | "env" => Self::Config,
            "css" | "scss" | "sass" | "less" => Self::Css,
            "html" | "htm" => Self::Html,
            "sh" | "bash" | "zsh" => Self::Shell,
            _ => Self::Unknown,
        }
    }

    /// Human-readable name, also used in artifact JSON
    pub fn name(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Sql => "sql",
            Self::Markdown => "markdown",
            Self::Config => "config",
            Self::Build => "build",
            Self::Css => "css",
            Self::Html => "html",
            Self::Shell => "shell",
            Self::Unknown => "unknown",
        }
    }

    /// Whether one of the dedicated dependency parsers handles this language
    pub fn has_dependency_parser(&self) -> bool {
        matches!(
            self,
            Self::JavaScript | Self::TypeScript | Self::Python | Self::Go | Self::Rust
        )
    }
}

/// Role a file plays in the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Source,
    Test,
    Config,
    Doc,
    Build,
    Asset,
    Unknown,
}

impl FileRole {
    /// Human-readable name, also used in artifact JSON
    pub fn name(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Test => "test",
            Self::Config => "config",
            Self::Doc => "doc",
            Self::Build => "build",
            Self::Asset => "asset",
            Self::Unknown => "unknown",
        }
    }
}

/// Classification of an import's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportKind {
    /// Resolves to a file inside the project
    #[serde(rename = "internal")]
    Internal,
    /// Third-party package
    #[serde(rename = "external")]
    External,
    /// Language standard library
    #[serde(rename = "stdlib")]
    Stdlib,
    /// Package-relative import (Python `from . import x`)
    #[serde(rename = "relative")]
    Relative,
    /// Import half of a re-export (`export * from 'x'`)
    #[serde(rename = "re-export-import")]
    ReExport,
}

impl ImportKind {
    /// Whether this import crosses a file boundary inside the project
    pub fn is_project_local(&self) -> bool {
        matches!(self, Self::Internal | Self::Relative | Self::ReExport)
    }
}

/// A single import extracted from a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
    /// Raw import string as written in the source
    pub source: String,
    /// Path relative to the project root, or the source unchanged when external
    pub resolved_path: String,
    /// Imported identifiers (local names when aliased)
    pub symbols: Vec<String>,
    /// Classification of the target
    #[serde(rename = "type")]
    pub kind: ImportKind,
    /// True for `import()` / `await import()`
    pub is_dynamic: bool,
    /// 1-indexed line number where the import was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Import {
    /// Create an import with the source doubling as the resolved path
    pub fn new(source: impl Into<String>, kind: ImportKind) -> Self {
        let source = source.into();
        Self {
            resolved_path: source.clone(),
            source,
            symbols: Vec::new(),
            kind,
            is_dynamic: false,
            line: None,
        }
    }

    /// Builder-style symbol list
    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    /// Builder-style line number
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Kind of exported item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportKind {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "named")]
    Named,
    #[serde(rename = "re-export")]
    ReExport,
    #[serde(rename = "commonjs")]
    CommonJs,
    #[serde(rename = "class")]
    Class,
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "const")]
    Const,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "interface")]
    Interface,
    #[serde(rename = "enum")]
    Enum,
    #[serde(rename = "struct")]
    Struct,
    #[serde(rename = "trait")]
    Trait,
    #[serde(rename = "module")]
    Module,
    #[serde(rename = "static")]
    Static,
    #[serde(rename = "var")]
    Var,
}

/// A single export extracted from a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    /// Identifier, or `"default"` for default exports
    pub name: String,
    /// Kind of exported item
    #[serde(rename = "type")]
    pub kind: ExportKind,
    /// 1-indexed line number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Language-dependent visibility (Go capitalization, Rust `pub`, ...)
    pub is_public: bool,
}

impl Export {
    /// Create a public export
    pub fn new(name: impl Into<String>, kind: ExportKind) -> Self {
        Self { name: name.into(), kind, line: None, is_public: true }
    }

    /// Builder-style line number
    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// A non-fatal problem encountered while parsing one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    /// 1-indexed line of the offending construct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// What went wrong
    pub message: String,
}

impl ParseWarning {
    pub fn new(line: Option<u32>, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

/// Result of parsing one file for dependencies
///
/// Malformed input never fails the parse; it yields a partial result with
/// warnings attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    /// Language the back-end parsed the file as
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// Imports in source order
    pub imports: Vec<Import>,
    /// Exports in source order
    pub exports: Vec<Export>,
    /// Non-fatal problems hit while scanning
    pub warnings: Vec<ParseWarning>,
}

impl ParseResult {
    /// Empty result tagged with a language
    pub fn for_language(language: Language) -> Self {
        Self { language: Some(language), ..Self::default() }
    }
}
