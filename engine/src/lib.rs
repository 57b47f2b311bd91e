//! Project-maps engine - persistent project-context maps for AI assistants
//!
//! This crate provides the core logic for building and querying a compact,
//! tiered, compressed JSON representation of a repository, including:
//!
//! - Gitignore-aware filesystem scanning with language and role detection
//! - Regex-driven dependency parsing for JavaScript/TypeScript, Python, Go,
//!   and Rust, with a generic fallback
//! - Eleven interlinked map artifacts plus optional database-schema maps
//! - A three-level, schema-driven JSON compressor with round-trip
//!   decompression
//! - Staleness scoring and git-diff-driven incremental refresh
//!
//! # Example
//!
//! ```rust,ignore
//! use projmap_engine::generator::{analyze, generate, AnalyzeOptions};
//! use projmap_engine::store::ArtifactStore;
//!
//! let analysis = analyze(Path::new("/path/to/repo"), &AnalyzeOptions::default())?;
//! let mut store = ArtifactStore::open(Path::new("/path/to/repo"));
//! let result = generate(&analysis, &mut store)?;
//! ```

// Core modules
pub mod compress;
pub mod generator;
pub mod graph;
pub mod parser;
pub mod scanner;
pub mod types;

// Persistence and lifecycle
pub mod git;
pub mod incremental;
pub mod query;
pub mod staleness;
pub mod store;
pub mod validate;

// Re-exports from core modules
pub use compress::schema::{CompressionSchema, ReferenceCategory, SchemaError};
pub use compress::{
    compress, decompress, ArtifactMetadata, CompressError, CompressedArtifact, CompressionLevel,
    CompressionOptions,
};
pub use generator::framework::{FrameworkDetection, ProjectType};
pub use generator::{analyze, generate, AnalyzeOptions, GenerateResult, ProjectAnalysis};
pub use graph::{BrokenImport, DependencyGraph, ReverseEntry};
pub use parser::parse_source;
pub use scanner::{scan, ScanError, ScanOptions, ScanOutcome};
pub use types::*;

// Re-exports from persistence and lifecycle modules
pub use git::{ChangedFile, FileStatus, GitError, GitRepo, NO_GIT};
pub use incremental::{refresh, RefreshError, RefreshMode, RefreshOutcome};
pub use query::{route_question, run_query, QueryError, QueryType};
pub use staleness::{assess, StalenessLevel, StalenessRecord, StalenessReport};
pub use store::{
    artifact_info, config_root, list_projects, maps_root, project_key, ArtifactStore, StoreError,
    ARTIFACTS,
};
pub use validate::{validate, ValidationReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default staleness threshold for `needs_refresh`
pub const DEFAULT_STALENESS_THRESHOLD: u8 = 30;
