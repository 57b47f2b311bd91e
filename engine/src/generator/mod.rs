//! Map generation
//!
//! One full run: scan, parse every file once, build the dependency graph,
//! then assemble the canonical artifacts in dependency order and write each
//! through the compression layer with an atomic rename. The generator keeps
//! no state beyond the output directory; a run either recomputes everything
//! or is driven by the incremental updater.

mod artifacts;
pub mod database;
pub mod framework;

use rayon::prelude::*;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::compress::ArtifactMetadata;
use crate::git::GitRepo;
use crate::graph::DependencyGraph;
use crate::parser::parse_source;
use crate::scanner::{scan, ScanError, ScanOptions};
use crate::staleness::format_iso8601;
use crate::store::{ArtifactStore, StoreError};
use crate::types::{ParseResult, ScannedFile};
use framework::{FrameworkDetection, ManifestSet, ProjectType};

/// Options for an analysis pass
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Scanner configuration
    pub scan: ScanOptions,
    /// Clock override, mainly for tests; defaults to the system clock
    pub now_unix: Option<u64>,
}

/// Everything the artifact builders need, computed once per run
pub struct ProjectAnalysis {
    pub root: PathBuf,
    pub project_name: String,
    pub files: Vec<ScannedFile>,
    pub parses: HashMap<String, ParseResult>,
    pub graph: DependencyGraph,
    pub framework: Option<FrameworkDetection>,
    pub project_type: ProjectType,
    pub entry_points: HashSet<String>,
    pub external_dependencies: Vec<String>,
    pub warnings: Vec<String>,
    pub git_hash: String,
    pub now_unix: u64,
}

/// One written artifact with its envelope metadata
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub name: String,
    pub metadata: ArtifactMetadata,
}

/// Result of a full generation run
#[derive(Debug)]
pub struct GenerateResult {
    pub artifacts: Vec<WrittenArtifact>,
    pub warnings: Vec<String>,
}

/// Scan and parse a project, producing the shared analysis
pub fn analyze(root: &Path, options: &AnalyzeOptions) -> Result<ProjectAnalysis, ScanError> {
    analyze_filtered(root, options, &HashSet::new())
}

/// Like [`analyze`], but leaves placeholder parse results for paths in
/// `skip_parse`; the incremental updater substitutes stored output for them
pub fn analyze_filtered(
    root: &Path,
    options: &AnalyzeOptions,
    skip_parse: &HashSet<String>,
) -> Result<ProjectAnalysis, ScanError> {
    let outcome = scan(root, &options.scan)?;
    let mut warnings = outcome.warnings;
    let files = outcome.files;

    // Parse in parallel; each file's content is read exactly once here
    let parsed: Vec<(String, ParseResult, Option<String>)> = files
        .par_iter()
        .map(|file| {
            if !file.language.has_dependency_parser()
                || skip_parse.contains(&file.relative_path)
            {
                return (
                    file.relative_path.clone(),
                    ParseResult::for_language(file.language),
                    None,
                );
            }
            match std::fs::read_to_string(&file.absolute_path) {
                Ok(content) => (
                    file.relative_path.clone(),
                    parse_source(&content, file.language),
                    None,
                ),
                Err(err) => (
                    file.relative_path.clone(),
                    ParseResult::for_language(file.language),
                    Some(format!("{}: cannot read for parsing ({err})", file.relative_path)),
                ),
            }
        })
        .collect();

    let mut parses = HashMap::with_capacity(parsed.len());
    for (path, parse, warning) in parsed {
        if let Some(warning) = warning {
            warnings.push(warning);
        }
        parses.insert(path, parse);
    }

    let graph = DependencyGraph::build(&files, &parses);

    let manifests = ManifestSet::read(root);
    let framework = framework::detect_framework(&manifests);
    let project_type = framework
        .as_ref()
        .map(|f| f.project_type)
        .unwrap_or_else(|| framework::fallback_project_type(&files));
    let entry_points = framework::entry_points(&files, &manifests);
    let external_dependencies = manifests.dependency_names();

    let project_name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_owned();

    let now_unix = options.now_unix.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    Ok(ProjectAnalysis {
        root: root.to_path_buf(),
        project_name,
        files,
        parses,
        graph,
        framework,
        project_type,
        entry_points,
        external_dependencies,
        warnings,
        git_hash: GitRepo::short_head_or_sentinel(root),
        now_unix,
    })
}

/// Build and write every artifact for the analysis
///
/// A failed write is fatal; artifacts already written in this run stay in
/// place since each went to its stable name atomically.
pub fn generate(
    analysis: &ProjectAnalysis,
    store: &mut ArtifactStore,
) -> Result<GenerateResult, StoreError> {
    store.ensure_schema()?;
    let generated = format_iso8601(analysis.now_unix);

    let bodies: Vec<(&str, Value)> = vec![
        ("summary", artifacts::build_summary(analysis)),
        ("quick-queries", artifacts::build_quick_queries(analysis)),
        ("tree", artifacts::build_tree(analysis)),
        ("existence-proofs", artifacts::build_existence_proofs(analysis)),
        ("metadata", artifacts::build_metadata(analysis)),
        ("content-summaries", artifacts::build_content_summaries(analysis)),
        ("indices", artifacts::build_indices(analysis)),
        ("dependencies-forward", artifacts::build_dependencies_forward(analysis)),
        ("dependencies-reverse", artifacts::build_dependencies_reverse(analysis)),
        ("relationships", artifacts::build_relationships(analysis)),
        ("issues", artifacts::build_issues(analysis)),
    ];

    let mut written = Vec::with_capacity(bodies.len() + 2);
    for (name, body) in &bodies {
        let metadata = store.write_artifact(name, body, &generated)?;
        log::debug!("wrote {name} at level {}", metadata.compression_level);
        written.push(WrittenArtifact { name: (*name).to_owned(), metadata });
    }

    if let Some((schema_body, mapping_body)) = database::build_database_artifacts(analysis) {
        for (name, body) in
            [("database-schema", schema_body), ("table-module-mapping", mapping_body)]
        {
            let metadata = store.write_artifact(name, &body, &generated)?;
            written.push(WrittenArtifact { name: name.to_owned(), metadata });
        }
    }

    let mut warnings = analysis.warnings.clone();
    if let Some(warning) = &store.schema_warning {
        warnings.push(warning.clone());
    }

    Ok(GenerateResult { artifacts: written, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "index.js", "import { a } from './src/a';\n");
        write(temp.path(), "src/a.js", "export const a = 1;\n");
        write(temp.path(), "src/b.py", "import os\n\ndef run():\n    pass\n");
        write(temp.path(), "README.md", "# fixture\n");
        temp
    }

    fn options() -> AnalyzeOptions {
        AnalyzeOptions { now_unix: Some(1_735_689_600), ..Default::default() }
    }

    #[test]
    fn test_analyze_parses_every_file() {
        let temp = fixture();
        let analysis = analyze(temp.path(), &options()).unwrap();
        assert_eq!(analysis.files.len(), 4);
        // Every scanned file has a parse result, parser-backed or not
        for file in &analysis.files {
            assert!(analysis.parses.contains_key(&file.relative_path));
        }
        assert_eq!(analysis.git_hash, "no-git");
        assert!(analysis.entry_points.contains("index.js"));
    }

    #[test]
    fn test_generate_writes_all_required_artifacts() {
        let temp = fixture();
        let maps = TempDir::new().unwrap();
        let analysis = analyze(temp.path(), &options()).unwrap();
        let mut store = ArtifactStore::open_dir(maps.path().join("k"));

        let result = generate(&analysis, &mut store).unwrap();
        assert_eq!(result.artifacts.len(), 11);
        for info in crate::store::ARTIFACTS.iter().filter(|a| a.required) {
            assert!(store.artifact_exists(info.name), "{} missing", info.name);
        }
        // No ORM in the fixture
        assert!(!store.artifact_exists("database-schema"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let temp = fixture();
        let maps = TempDir::new().unwrap();
        let dir = maps.path().join("k");

        let analysis = analyze(temp.path(), &options()).unwrap();
        let mut store = ArtifactStore::open_dir(dir.clone());
        generate(&analysis, &mut store).unwrap();

        let snapshot: Vec<(String, Vec<u8>)> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| {
                (e.file_name().to_string_lossy().to_string(), fs::read(e.path()).unwrap())
            })
            .collect();

        // Second full generation over the unchanged tree, same clock
        let analysis = analyze(temp.path(), &options()).unwrap();
        let mut store = ArtifactStore::open_dir(dir.clone());
        generate(&analysis, &mut store).unwrap();

        for (name, bytes) in snapshot {
            let fresh = fs::read(dir.join(&name)).unwrap();
            assert_eq!(bytes, fresh, "{name} not byte-identical");
        }
    }

    #[test]
    fn test_database_artifacts_when_orm_present() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "prisma/schema.prisma",
            "model User {\n  id Int @id\n  email String\n}\n",
        );
        write(temp.path(), "index.js", "console.log(1);\n");

        let maps = TempDir::new().unwrap();
        let analysis = analyze(temp.path(), &options()).unwrap();
        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        let result = generate(&analysis, &mut store).unwrap();

        assert!(result.artifacts.iter().any(|a| a.name == "database-schema"));
        let schema = store.read_artifact("database-schema").unwrap();
        assert_eq!(schema["orm"], "prisma");
        assert_eq!(schema["tables"][0]["name"], "User");

        let mapping = store.read_artifact("table-module-mapping").unwrap();
        assert_eq!(mapping["mappings"][0]["module"], "prisma");
    }
}
