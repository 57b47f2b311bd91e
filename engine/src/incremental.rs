//! Incremental refresh
//!
//! Re-parses only the files git reports as touched since the stored hash,
//! reusing the previous generation's parse output for everything else. When
//! the change ratio exceeds 30%, or git state is unusable (no repository,
//! stored hash rewritten away, no previous maps), the updater falls back to
//! a full refresh and reports it.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::generator::{analyze, generate, AnalyzeOptions, GenerateResult};
use crate::git::{FileStatus, GitRepo, NO_GIT};
use crate::scanner::ScanError;
use crate::store::{ArtifactStore, StoreError};
use crate::types::{Export, Import, ParseResult, ParseWarning};

/// Change ratio above which incremental falls back to full
const FULL_REFRESH_RATIO: f64 = 0.30;

/// How a refresh was performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    Full,
    Incremental,
}

impl RefreshMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

/// Refresh errors
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a refresh run
#[derive(Debug)]
pub struct RefreshOutcome {
    /// Mode actually used (a forced incremental may still report full)
    pub mode: RefreshMode,
    /// Changed paths that drove the update (empty for full refreshes)
    pub changed: Vec<String>,
    /// Written artifacts with their metadata
    pub result: GenerateResult,
}

/// Decide the refresh mode from the change ratio
///
/// `changed` counts modified + added + deleted paths.
pub fn choose_mode(changed: usize, total_files: u64) -> RefreshMode {
    if total_files == 0 {
        return RefreshMode::Full;
    }
    if changed as f64 / total_files as f64 > FULL_REFRESH_RATIO {
        RefreshMode::Full
    } else {
        RefreshMode::Incremental
    }
}

/// Refresh the maps for a project
///
/// `force` pins the mode; `None` derives it from the git change ratio. Any
/// condition that makes incremental unsound degrades to full with a warning.
pub fn refresh(
    root: &Path,
    store: &mut ArtifactStore,
    options: &AnalyzeOptions,
    force: Option<RefreshMode>,
) -> Result<RefreshOutcome, RefreshError> {
    let mut warnings = Vec::new();

    let stored = read_staleness(store);
    let changed = stored.as_ref().and_then(|(hash, _)| {
        if hash == NO_GIT {
            return None;
        }
        changed_since(root, hash)
    });

    let mode = match (force, &stored, &changed) {
        (Some(RefreshMode::Full), _, _) | (_, None, _) => RefreshMode::Full,
        (_, Some(_), None) => {
            warnings.push("git state unusable, falling back to full refresh".to_owned());
            RefreshMode::Full
        }
        (_, Some((_, total)), Some(changed)) => {
            // A forced incremental still honors the fallback ratio
            choose_mode(changed.len(), *total)
        }
    };

    let outcome = match mode {
        RefreshMode::Full => {
            let analysis = analyze(root, options)?;
            let mut result = generate(&analysis, store)?;
            result.warnings.extend(warnings);
            RefreshOutcome { mode, changed: Vec::new(), result }
        }
        RefreshMode::Incremental => {
            let changed = changed.unwrap_or_default();
            let mut result = incremental_pass(root, store, options, &changed)?;
            result.warnings.extend(warnings);
            RefreshOutcome { mode, changed, result }
        }
    };

    Ok(outcome)
}

/// Stored git hash and file count from the summary artifact, if present
fn read_staleness(store: &ArtifactStore) -> Option<(String, u64)> {
    let summary = store.read_artifact("summary").ok()?;
    let staleness = summary.get("staleness")?;
    let hash = staleness.get("gitHash")?.as_str()?.to_owned();
    let count = staleness.get("fileCount")?.as_u64()?;
    Some((hash, count))
}

/// Paths touched between the stored hash and the working tree
///
/// `None` when git cannot answer (missing binary, rewritten history).
fn changed_since(root: &Path, stored_hash: &str) -> Option<Vec<String>> {
    let repo = GitRepo::open(root).ok()?;
    let mut paths = HashSet::new();

    for file in repo.diff_since(stored_hash).ok()? {
        paths.insert(file.path);
    }
    // Working-tree changes ride on top of committed ones
    if let Ok(status) = repo.status() {
        for file in status {
            if file.status != FileStatus::Unknown {
                paths.insert(file.path);
            }
        }
    }

    let mut paths: Vec<String> = paths.into_iter().collect();
    paths.sort();
    Some(paths)
}

/// The incremental path: re-parse only changed files, reuse stored parse
/// output for the rest, then rebuild every artifact from the merged state
///
/// The scan itself stays full: it is cheap relative to parsing and the tree
/// artifacts need the complete file list anyway. Files previously
/// summarized and not touched by git skip the parser entirely.
fn incremental_pass(
    root: &Path,
    store: &mut ArtifactStore,
    options: &AnalyzeOptions,
    changed: &[String],
) -> Result<GenerateResult, RefreshError> {
    let stored_imports = stored_forward_imports(store);
    let stored_exports = stored_export_summaries(store);
    let stored_warnings = stored_parse_warnings(store);

    // content-summaries carries an entry for every previously parsed file,
    // so its keys delimit what can be reused
    let changed_set: HashSet<&str> = changed.iter().map(String::as_str).collect();
    let reuse: HashSet<String> = stored_exports
        .keys()
        .filter(|path| !changed_set.contains(path.as_str()))
        .cloned()
        .collect();

    let mut analysis = crate::generator::analyze_filtered(root, options, &reuse)?;

    for file in &analysis.files {
        let path = file.relative_path.as_str();
        if !reuse.contains(path) {
            continue;
        }
        let reused = ParseResult {
            language: Some(file.language),
            imports: stored_imports.get(path).cloned().unwrap_or_default(),
            exports: stored_exports.get(path).cloned().unwrap_or_default(),
            warnings: stored_warnings.get(path).cloned().unwrap_or_default(),
        };
        analysis.parses.insert(path.to_owned(), reused);
    }

    // Edges derive from the merged parse set
    analysis.graph = crate::graph::DependencyGraph::build(&analysis.files, &analysis.parses);

    let result = generate(&analysis, store)?;
    Ok(result)
}

fn stored_forward_imports(store: &ArtifactStore) -> HashMap<String, Vec<Import>> {
    let mut map = HashMap::new();
    let Ok(doc) = store.read_artifact("dependencies-forward") else {
        return map;
    };
    let Some(dependencies) = doc.get("dependencies").and_then(Value::as_object) else {
        return map;
    };
    for (file, entry) in dependencies {
        if let Some(imports) = entry.get("imports") {
            if let Ok(imports) = serde_json::from_value::<Vec<Import>>(imports.clone()) {
                map.insert(file.clone(), imports);
            }
        }
    }
    map
}

fn stored_export_summaries(store: &ArtifactStore) -> HashMap<String, Vec<Export>> {
    let mut map = HashMap::new();
    let Ok(doc) = store.read_artifact("content-summaries") else {
        return map;
    };
    let Some(summaries) = doc.get("summaries").and_then(Value::as_object) else {
        return map;
    };
    for (file, entry) in summaries {
        if let Some(exports) = entry.get("exports") {
            if let Ok(mut exports) = serde_json::from_value::<Vec<ExportSummary>>(exports.clone())
            {
                map.insert(
                    file.clone(),
                    exports.drain(..).map(ExportSummary::into_export).collect(),
                );
            }
        }
    }
    map
}

fn stored_parse_warnings(store: &ArtifactStore) -> HashMap<String, Vec<ParseWarning>> {
    let mut map: HashMap<String, Vec<ParseWarning>> = HashMap::new();
    let Ok(doc) = store.read_artifact("issues") else {
        return map;
    };
    let Some(warnings) = doc.get("parseWarnings").and_then(Value::as_array) else {
        return map;
    };
    for warning in warnings {
        let (Some(file), Some(message)) = (
            warning.get("file").and_then(Value::as_str),
            warning.get("message").and_then(Value::as_str),
        ) else {
            continue;
        };
        let line = warning.get("line").and_then(Value::as_u64).map(|l| l as u32);
        map.entry(file.to_owned())
            .or_default()
            .push(ParseWarning::new(line, message));
    }
    map
}

/// Export as persisted in content-summaries (visibility is not stored there)
#[derive(serde::Deserialize)]
struct ExportSummary {
    name: String,
    #[serde(rename = "type")]
    kind: crate::types::ExportKind,
    line: Option<u32>,
}

impl ExportSummary {
    fn into_export(self) -> Export {
        Export { name: self.name, kind: self.kind, line: self.line, is_public: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::TempDir;

    #[test]
    fn test_choose_mode_threshold() {
        assert_eq!(choose_mode(5, 100), RefreshMode::Incremental);
        assert_eq!(choose_mode(30, 100), RefreshMode::Incremental);
        assert_eq!(choose_mode(31, 100), RefreshMode::Full);
        assert_eq!(choose_mode(35, 100), RefreshMode::Full);
        assert_eq!(choose_mode(0, 0), RefreshMode::Full);
    }

    fn git(dir: &Path, args: &[&str]) {
        Command::new("git").current_dir(dir).args(args).output().unwrap();
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn git_fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "index.js", "import { a } from './a';\n");
        write(temp.path(), "a.js", "export const a = 1;\n");
        write(temp.path(), "b.js", "export const b = 2;\n");
        write(temp.path(), "c.js", "export const c = 3;\n");
        git(temp.path(), &["init"]);
        git(temp.path(), &["config", "user.email", "t@t.t"]);
        git(temp.path(), &["config", "user.name", "t"]);
        git(temp.path(), &["add", "."]);
        git(temp.path(), &["commit", "-m", "init"]);
        temp
    }

    fn options() -> AnalyzeOptions {
        AnalyzeOptions { now_unix: Some(1_735_689_600), ..Default::default() }
    }

    #[test]
    fn test_first_refresh_is_full() {
        let temp = git_fixture();
        let maps = TempDir::new().unwrap();
        let mut store = ArtifactStore::open_dir(maps.path().join("k"));

        let outcome = refresh(temp.path(), &mut store, &options(), None).unwrap();
        assert_eq!(outcome.mode, RefreshMode::Full);
        assert!(store.artifact_exists("summary"));
    }

    #[test]
    fn test_zero_change_incremental_is_byte_idempotent() {
        let temp = git_fixture();
        let maps = TempDir::new().unwrap();
        let dir = maps.path().join("k");
        let mut store = ArtifactStore::open_dir(dir.clone());
        refresh(temp.path(), &mut store, &options(), None).unwrap();

        let snapshot: Vec<(String, Vec<u8>)> = fs::read_dir(&dir)
            .unwrap()
            .flatten()
            .map(|e| {
                (e.file_name().to_string_lossy().to_string(), fs::read(e.path()).unwrap())
            })
            .collect();

        let mut store = ArtifactStore::open_dir(dir.clone());
        let outcome =
            refresh(temp.path(), &mut store, &options(), Some(RefreshMode::Incremental))
                .unwrap();
        assert_eq!(outcome.mode, RefreshMode::Incremental);
        assert!(outcome.changed.is_empty());

        for (name, bytes) in snapshot {
            let fresh = fs::read(dir.join(&name)).unwrap();
            assert_eq!(bytes, fresh, "{name} changed across a no-op refresh");
        }
    }

    #[test]
    fn test_small_change_stays_incremental() {
        let temp = git_fixture();
        let maps = TempDir::new().unwrap();
        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        refresh(temp.path(), &mut store, &options(), None).unwrap();

        write(temp.path(), "a.js", "export const a = 42;\nexport const extra = 1;\n");

        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        let outcome = refresh(temp.path(), &mut store, &options(), None).unwrap();
        assert_eq!(outcome.mode, RefreshMode::Incremental);
        assert_eq!(outcome.changed, vec!["a.js"]);

        let summaries = store.read_artifact("content-summaries").unwrap();
        let exports = summaries["summaries"]["a.js"]["exports"].as_array().unwrap();
        assert_eq!(exports.len(), 2);
    }

    #[test]
    fn test_large_change_falls_back_to_full() {
        let temp = git_fixture();
        let maps = TempDir::new().unwrap();
        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        refresh(temp.path(), &mut store, &options(), None).unwrap();

        // 3 of 4 files changed: over the 30% threshold
        write(temp.path(), "a.js", "export const a = 9;\n");
        write(temp.path(), "b.js", "export const b = 9;\n");
        write(temp.path(), "c.js", "export const c = 9;\n");

        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        let outcome = refresh(temp.path(), &mut store, &options(), None).unwrap();
        assert_eq!(outcome.mode, RefreshMode::Full);
    }

    #[test]
    fn test_staleness_record_updates_after_refresh() {
        let temp = git_fixture();
        let maps = TempDir::new().unwrap();
        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        refresh(temp.path(), &mut store, &options(), None).unwrap();

        write(temp.path(), "d.js", "export const d = 4;\n");
        git(temp.path(), &["add", "."]);
        git(temp.path(), &["commit", "-m", "add d"]);

        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        refresh(temp.path(), &mut store, &options(), None).unwrap();

        let summary = store.read_artifact("summary").unwrap();
        assert_eq!(summary["staleness"]["fileCount"], 5);
        let repo = GitRepo::open(temp.path()).unwrap();
        assert_eq!(summary["staleness"]["gitHash"], repo.short_head().unwrap().as_str());
    }
}
