//! Builders for the canonical map artifacts
//!
//! Each builder is a pure function from the project analysis to the
//! artifact's JSON body (the `metadata` envelope is attached by the store on
//! write). Collections are sorted at every boundary so repeated generation
//! over an unchanged tree is byte-identical.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::ProjectAnalysis;
use crate::staleness::StalenessRecord;
use crate::types::{FileRole, ScannedFile};

/// Files whose absence is worth proving
const COMMON_FILES: &[&str] = &[
    "README.md",
    "LICENSE",
    "CONTRIBUTING.md",
    "CHANGELOG.md",
    ".gitignore",
    ".env.example",
    "package.json",
    "tsconfig.json",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "Cargo.toml",
    "Dockerfile",
    "Makefile",
];

/// Cutoff for list answers (largest files, recent files)
const TOP_N: usize = 20;

/// Minimum share for a language to count as primary (percent)
const PRIMARY_LANGUAGE_MIN_PCT: f64 = 5.0;

pub(super) fn build_summary(analysis: &ProjectAnalysis) -> Value {
    let files = &analysis.files;
    let total_files = files.len() as u64;
    let total_lines: u64 = files.iter().map(|f| u64::from(f.lines)).sum();
    let total_size: u64 = files.iter().map(|f| f.size).sum();

    let count_role = |role: FileRole| files.iter().filter(|f| f.role == role).count();

    let staleness = StalenessRecord::new(&analysis.git_hash, total_files, analysis.now_unix);

    json!({
        "stats": {
            "totalFiles": total_files,
            "totalLines": total_lines,
            "primaryLanguages": primary_languages(files),
        },
        "quickStats": {
            "sourceFiles": count_role(FileRole::Source),
            "testFiles": count_role(FileRole::Test),
            "configFiles": count_role(FileRole::Config),
            "docFiles": count_role(FileRole::Doc),
            "buildFiles": count_role(FileRole::Build),
            "totalSizeBytes": total_size,
            "framework": analysis.framework.as_ref().map(|f| f.name.clone()),
        },
        "staleness": staleness,
    })
}

/// Languages holding at least 5% of source files, largest share first
fn primary_languages(files: &[ScannedFile]) -> Vec<Value> {
    let source: Vec<&ScannedFile> =
        files.iter().filter(|f| f.role == FileRole::Source).collect();
    let pool: Vec<&ScannedFile> =
        if source.is_empty() { files.iter().collect() } else { source };

    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for file in &pool {
        *counts.entry(file.language.name()).or_insert(0) += 1;
    }
    let total = pool.len() as f64;

    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .filter_map(|(language, count)| {
            let percentage = (count as f64 / total) * 100.0;
            (percentage >= PRIMARY_LANGUAGE_MIN_PCT).then(|| {
                json!({
                    "language": language,
                    "files": count,
                    "percentage": (percentage * 10.0).round() / 10.0,
                })
            })
        })
        .collect()
}

pub(super) fn build_quick_queries(analysis: &ProjectAnalysis) -> Value {
    let files = &analysis.files;

    let mut entry_points: Vec<&String> = analysis.entry_points.iter().collect();
    entry_points.sort();

    let mut largest: Vec<&ScannedFile> = files.iter().collect();
    largest.sort_by(|a, b| {
        b.size.cmp(&a.size).then_with(|| a.relative_path.cmp(&b.relative_path))
    });
    let largest: Vec<Value> = largest
        .iter()
        .take(TOP_N)
        .map(|f| json!({"path": f.relative_path, "size": f.size}))
        .collect();

    let mut recent: Vec<&ScannedFile> = files.iter().collect();
    recent.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
    let recent: Vec<Value> = recent
        .iter()
        .take(TOP_N)
        .map(|f| json!({"path": f.relative_path, "modifiedAt": f.modified_at}))
        .collect();

    // The type classifier survives even when no framework rule matched
    let framework = match &analysis.framework {
        Some(detected) => serde_json::json!(detected),
        None => json!({
            "name": Value::Null,
            "confidence": 0,
            "type": analysis.project_type,
        }),
    };

    json!({
        "answers": {
            "entryPoints": entry_points,
            "framework": framework,
            "testLocation": test_location(files),
            "largestFiles": largest,
            "recentFiles": recent,
            "topLevelStructure": top_level_structure(files),
            "languages": language_counts(files),
        }
    })
}

/// The directory holding most test files, if the project has any
fn test_location(files: &[ScannedFile]) -> Option<String> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for file in files.iter().filter(|f| f.role == FileRole::Test) {
        *counts.entry(file.parent_dir()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(dir, _)| if dir.is_empty() { ".".to_owned() } else { dir.to_owned() })
}

fn top_level_structure(files: &[ScannedFile]) -> Vec<Value> {
    let mut dirs: BTreeMap<&str, u64> = BTreeMap::new();
    let mut top_files: Vec<&str> = Vec::new();
    for file in files {
        match file.relative_path.split_once('/') {
            Some((dir, _)) => *dirs.entry(dir).or_insert(0) += 1,
            None => top_files.push(&file.relative_path),
        }
    }
    top_files.sort_unstable();

    let mut out: Vec<Value> = dirs
        .into_iter()
        .map(|(name, count)| json!({"name": name, "type": "dir", "fileCount": count}))
        .collect();
    out.extend(top_files.into_iter().map(|name| json!({"name": name, "type": "file"})));
    out
}

fn language_counts(files: &[ScannedFile]) -> Vec<Value> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for file in files {
        *counts.entry(file.language.name()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .map(|(language, count)| json!({"language": language, "files": count}))
        .collect()
}

pub(super) fn build_tree(analysis: &ProjectAnalysis) -> Value {
    #[derive(Default)]
    struct DirNode {
        dirs: BTreeMap<String, DirNode>,
        files: Vec<String>,
    }

    impl DirNode {
        fn insert(&mut self, path: &str) {
            match path.split_once('/') {
                Some((dir, rest)) => {
                    self.dirs.entry(dir.to_owned()).or_default().insert(rest);
                }
                None => self.files.push(path.to_owned()),
            }
        }

        fn file_count(&self) -> u64 {
            self.files.len() as u64
                + self.dirs.values().map(DirNode::file_count).sum::<u64>()
        }

        fn to_value(&self, name: &str) -> Value {
            let mut children: Vec<Value> =
                self.dirs.iter().map(|(child, node)| node.to_value(child)).collect();
            let mut files = self.files.clone();
            files.sort_unstable();
            children.extend(files.into_iter().map(|f| json!({"name": f, "type": "file"})));
            json!({
                "name": name,
                "type": "dir",
                "fileCount": self.file_count(),
                "children": children,
            })
        }
    }

    let mut root = DirNode::default();
    for file in &analysis.files {
        root.insert(&file.relative_path);
    }

    json!({ "tree": root.to_value(&analysis.project_name) })
}

pub(super) fn build_existence_proofs(analysis: &ProjectAnalysis) -> Value {
    let present: Vec<&str> =
        analysis.files.iter().map(|f| f.relative_path.as_str()).collect();
    let missing: Vec<&str> = COMMON_FILES
        .iter()
        .copied()
        .filter(|common| !analysis.files.iter().any(|f| f.relative_path == *common))
        .collect();

    json!({ "present": present, "missingCommon": missing })
}

pub(super) fn build_metadata(analysis: &ProjectAnalysis) -> Value {
    let files: Vec<Value> = analysis
        .files
        .iter()
        .map(|f| {
            json!({
                "path": f.relative_path,
                "type": f.language.name(),
                "role": f.role.name(),
                "lines": f.lines,
                "size": f.size,
                "language": f.language.name(),
                "modifiedAt": f.modified_at,
            })
        })
        .collect();

    json!({ "files": files })
}

pub(super) fn build_content_summaries(analysis: &ProjectAnalysis) -> Value {
    let mut summaries = Map::new();
    for file in &analysis.files {
        if !file.language.has_dependency_parser() {
            continue;
        }
        let Some(parse) = analysis.parses.get(&file.relative_path) else {
            continue;
        };

        let exports: Vec<Value> = parse
            .exports
            .iter()
            .map(|e| json!({"name": e.name, "type": e.kind, "line": e.line}))
            .collect();
        let imports: Vec<&str> = parse.imports.iter().map(|i| i.source.as_str()).collect();
        let top_entities: Vec<&str> =
            parse.exports.iter().take(5).map(|e| e.name.as_str()).collect();

        summaries.insert(
            file.relative_path.clone(),
            json!({
                "exports": exports,
                "imports": imports,
                "topEntities": top_entities,
            }),
        );
    }

    json!({ "summaries": summaries })
}

pub(super) fn build_indices(analysis: &ProjectAnalysis) -> Value {
    let files = &analysis.files;

    let mut by_type: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut by_role: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for file in files {
        by_type.entry(file.language.name()).or_default().push(&file.relative_path);
        by_role.entry(file.role.name()).or_default().push(&file.relative_path);
    }

    let size_buckets = [
        ("<1KB", 0u64, 1024u64),
        ("1-10KB", 1024, 10 * 1024),
        ("10-100KB", 10 * 1024, 100 * 1024),
        (">=100KB", 100 * 1024, u64::MAX),
    ];
    let by_size: Vec<Value> = size_buckets
        .iter()
        .map(|(bucket, lo, hi)| {
            let bucket_files: Vec<&str> = files
                .iter()
                .filter(|f| f.size >= *lo && f.size < *hi)
                .map(|f| f.relative_path.as_str())
                .collect();
            json!({"bucket": bucket, "files": bucket_files})
        })
        .collect();

    const DAY: u64 = 86_400;
    let recency_buckets =
        [("<1d", DAY), ("<7d", 7 * DAY), ("<30d", 30 * DAY), ("<90d", 90 * DAY)];
    let mut assigned: Vec<bool> = vec![false; files.len()];
    let mut by_recency: Vec<Value> = Vec::with_capacity(recency_buckets.len() + 1);
    for (bucket, max_age) in recency_buckets {
        let mut bucket_files: Vec<&str> = Vec::new();
        for (idx, file) in files.iter().enumerate() {
            if !assigned[idx] && analysis.now_unix.saturating_sub(file.modified_at) < max_age {
                assigned[idx] = true;
                bucket_files.push(file.relative_path.as_str());
            }
        }
        by_recency.push(json!({"bucket": bucket, "files": bucket_files}));
    }
    let older: Vec<&str> = files
        .iter()
        .enumerate()
        .filter(|(idx, _)| !assigned[*idx])
        .map(|(_, f)| f.relative_path.as_str())
        .collect();
    by_recency.push(json!({"bucket": "older", "files": older}));

    json!({
        "byType": by_type,
        "byRole": by_role,
        "bySize": by_size,
        "byRecency": by_recency,
    })
}

pub(super) fn build_dependencies_forward(analysis: &ProjectAnalysis) -> Value {
    let mut dependencies = Map::new();
    for (file, imports) in &analysis.graph.forward {
        if imports.is_empty() {
            continue;
        }
        dependencies.insert(file.clone(), json!({ "imports": imports }));
    }
    json!({ "dependencies": dependencies })
}

pub(super) fn build_dependencies_reverse(analysis: &ProjectAnalysis) -> Value {
    let mut dependencies = Map::new();
    for (file, imported_by) in &analysis.graph.reverse {
        dependencies.insert(file.clone(), json!({ "importedBy": imported_by }));
    }
    json!({ "dependencies": dependencies })
}

pub(super) fn build_relationships(analysis: &ProjectAnalysis) -> Value {
    let graph = &analysis.graph;

    let coupled: Vec<Value> = graph
        .tightly_coupled()
        .into_iter()
        .map(|(a, b)| json!({"files": [a, b]}))
        .collect();

    // Directory-level modules and the modules they reach
    let mut modules: BTreeMap<String, (u64, std::collections::BTreeSet<String>)> =
        BTreeMap::new();
    for file in &analysis.files {
        let module = module_of(&file.relative_path);
        modules.entry(module).or_default().0 += 1;
    }
    for (from, to) in graph.internal_edges() {
        let from_module = module_of(from);
        let to_module = module_of(to);
        if from_module != to_module {
            modules.entry(from_module).or_default().1.insert(to_module);
        }
    }
    let modules: Vec<Value> = modules
        .into_iter()
        .map(|(name, (files, depends_on))| {
            json!({"name": name, "files": files, "dependsOn": depends_on})
        })
        .collect();

    let avg = (graph.average_dependencies() * 100.0).round() / 100.0;
    json!({
        "maxDepth": graph.max_depth(),
        "avgDeps": avg,
        "tightlyCoupled": coupled,
        "modules": modules,
    })
}

fn module_of(path: &str) -> String {
    match path.split_once('/') {
        Some((dir, _)) => dir.to_owned(),
        None => ".".to_owned(),
    }
}

pub(super) fn build_issues(analysis: &ProjectAnalysis) -> Value {
    let cycles = analysis.graph.find_cycles();

    let mut parse_warnings: Vec<Value> = Vec::new();
    let mut parsed: Vec<(&String, &crate::types::ParseResult)> =
        analysis.parses.iter().collect();
    parsed.sort_by_key(|(file, _)| *file);
    for (file, parse) in parsed {
        for warning in &parse.warnings {
            parse_warnings.push(json!({
                "file": file,
                "line": warning.line,
                "message": warning.message,
            }));
        }
    }

    json!({
        "brokenImports": analysis.graph.broken,
        "circularDependencies": cycles,
        "unusedFiles": analysis.graph.unused_files(&analysis.files, &analysis.entry_points),
        "parseWarnings": parse_warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{analyze, AnalyzeOptions};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn sample_project() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "package.json",
            r#"{"name": "sample", "main": "index.js", "dependencies": {"react": "18.0.0"}}"#,
        );
        write(temp.path(), "index.js", "import { helper } from './src/utils';\n");
        write(
            temp.path(),
            "src/utils.js",
            "import axios from 'axios';\nexport function helper() {}\n",
        );
        write(temp.path(), "src/orphan.js", "export const unused = 1;\n");
        write(temp.path(), "src/app.test.js", "import { helper } from './utils';\n");
        write(temp.path(), "README.md", "# Sample\n");
        temp
    }

    fn analysis_of(temp: &TempDir) -> ProjectAnalysis {
        analyze(temp.path(), &AnalyzeOptions { now_unix: Some(1_735_689_600), ..Default::default() })
            .unwrap()
    }

    #[test]
    fn test_summary_stats() {
        let temp = sample_project();
        let summary = build_summary(&analysis_of(&temp));
        assert_eq!(summary["stats"]["totalFiles"], 6);
        assert_eq!(summary["staleness"]["gitHash"], "no-git");
        let languages = summary["stats"]["primaryLanguages"].as_array().unwrap();
        assert_eq!(languages[0]["language"], "javascript");
    }

    #[test]
    fn test_quick_queries_answers() {
        let temp = sample_project();
        let queries = build_quick_queries(&analysis_of(&temp));
        let answers = &queries["answers"];
        assert!(answers["entryPoints"]
            .as_array()
            .unwrap()
            .contains(&json!("index.js")));
        assert_eq!(answers["framework"]["name"], "React");
        assert_eq!(answers["testLocation"], "src");
        assert_eq!(answers["largestFiles"].as_array().unwrap().len(), 6);
        let structure = answers["topLevelStructure"].as_array().unwrap();
        assert_eq!(structure[0]["name"], "src");
        assert_eq!(structure[0]["type"], "dir");
    }

    #[test]
    fn test_tree_nesting() {
        let temp = sample_project();
        let tree = build_tree(&analysis_of(&temp));
        assert_eq!(tree["tree"]["type"], "dir");
        assert_eq!(tree["tree"]["fileCount"], 6);
        let children = tree["tree"]["children"].as_array().unwrap();
        // Directories come first
        assert_eq!(children[0]["name"], "src");
        assert_eq!(children[0]["fileCount"], 3);
    }

    #[test]
    fn test_existence_proofs() {
        let temp = sample_project();
        let proofs = build_existence_proofs(&analysis_of(&temp));
        let present = proofs["present"].as_array().unwrap();
        assert!(present.contains(&json!("README.md")));
        let missing = proofs["missingCommon"].as_array().unwrap();
        assert!(missing.contains(&json!("Dockerfile")));
        assert!(!missing.contains(&json!("README.md")));
    }

    #[test]
    fn test_metadata_files() {
        let temp = sample_project();
        let metadata = build_metadata(&analysis_of(&temp));
        let files = metadata["files"].as_array().unwrap();
        assert_eq!(files.len(), 6);
        let utils = files
            .iter()
            .find(|f| f["path"] == "src/utils.js")
            .unwrap();
        assert_eq!(utils["type"], "javascript");
        assert_eq!(utils["role"], "source");
        assert_eq!(utils["lines"], 2);
    }

    #[test]
    fn test_content_summaries() {
        let temp = sample_project();
        let summaries = build_content_summaries(&analysis_of(&temp));
        let utils = &summaries["summaries"]["src/utils.js"];
        assert_eq!(utils["exports"][0]["name"], "helper");
        assert_eq!(utils["imports"][0], "axios");
        assert_eq!(utils["topEntities"][0], "helper");
        // Markdown has no entry
        assert!(summaries["summaries"].get("README.md").is_none());
    }

    #[test]
    fn test_indices_buckets() {
        let temp = sample_project();
        let indices = build_indices(&analysis_of(&temp));
        assert!(indices["byType"]["javascript"].as_array().unwrap().len() >= 4);
        assert!(indices["byRole"]["test"]
            .as_array()
            .unwrap()
            .contains(&json!("src/app.test.js")));
        let by_size = indices["bySize"].as_array().unwrap();
        assert_eq!(by_size[0]["bucket"], "<1KB");
        let by_recency = indices["byRecency"].as_array().unwrap();
        assert_eq!(by_recency.len(), 5);
    }

    #[test]
    fn test_dependency_artifacts_mirror() {
        let temp = sample_project();
        let analysis = analysis_of(&temp);
        let forward = build_dependencies_forward(&analysis);
        let reverse = build_dependencies_reverse(&analysis);

        let imports = forward["dependencies"]["index.js"]["imports"].as_array().unwrap();
        let internal = imports
            .iter()
            .find(|i| i["type"] == "internal")
            .unwrap();
        assert_eq!(internal["resolvedPath"], "src/utils.js");

        let imported_by =
            reverse["dependencies"]["src/utils.js"]["importedBy"].as_array().unwrap();
        assert!(imported_by.iter().any(|e| e["file"] == "index.js"));
    }

    #[test]
    fn test_relationships_modules() {
        let temp = sample_project();
        let relationships = build_relationships(&analysis_of(&temp));
        assert!(relationships["maxDepth"].as_u64().unwrap() >= 1);
        let modules = relationships["modules"].as_array().unwrap();
        let root = modules.iter().find(|m| m["name"] == ".").unwrap();
        assert!(root["dependsOn"].as_array().unwrap().contains(&json!("src")));
    }

    #[test]
    fn test_issues_unused_and_clean() {
        let temp = sample_project();
        let issues = build_issues(&analysis_of(&temp));
        assert!(issues["unusedFiles"]
            .as_array()
            .unwrap()
            .contains(&json!("src/orphan.js")));
        assert!(issues["brokenImports"].as_array().unwrap().is_empty());
        assert!(issues["circularDependencies"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_broken_import_surfaces() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.js", "import { x } from './missing';\n");
        let issues = build_issues(&analysis_of(&temp));
        let broken = issues["brokenImports"].as_array().unwrap();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0]["resolvedPath"], "missing");
    }
}
