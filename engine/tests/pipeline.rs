//! End-to-end pipeline tests
//!
//! Drive the whole core on a synthetic multi-language project: scan, parse,
//! generate, then check the cross-artifact invariants a consumer relies on.

use projmap_engine::generator::{analyze, generate, AnalyzeOptions};
use projmap_engine::incremental::{refresh, RefreshMode};
use projmap_engine::query::{run_query, QueryType};
use projmap_engine::staleness::{assess, StalenessRecord};
use projmap_engine::store::ArtifactStore;
use projmap_engine::validate::validate;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const NOW: u64 = 1_735_689_600; // 2025-01-01T00:00:00Z

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A project mixing all four parsed languages plus config and docs
fn polyglot_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let base = temp.path();

    write(
        base,
        "package.json",
        r#"{"name": "polyglot", "main": "index.js", "dependencies": {"express": "^4.18.0"}}"#,
    );
    write(base, "index.js", "import { router } from './src/router';\nrouter();\n");
    write(
        base,
        "src/router.js",
        "import express from 'express';\nimport { db } from './db';\nexport const router = () => db;\n",
    );
    write(
        base,
        "src/db.js",
        "import { router } from './router';\nexport const db = {};\n",
    );
    write(
        base,
        "scripts/sync.py",
        "import os\nfrom pathlib import Path\n\ndef sync_all():\n    pass\n",
    );
    write(
        base,
        "tools/report/main.go",
        "package main\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n\nfunc Run() {\n\tfmt.Println(http.StatusOK)\n}\n",
    );
    write(
        base,
        "native/src/lib.rs",
        "pub mod codec;\n\npub fn init() {}\n",
    );
    write(base, "native/src/codec.rs", "use std::io::Read;\n\npub struct Codec;\n");
    write(base, "README.md", "# Polyglot\n");
    write(base, ".gitignore", "dist/\n");
    write(base, "dist/bundle.js", "ignored\n");

    temp
}

fn generated(project: &TempDir) -> (TempDir, ArtifactStore) {
    let maps = TempDir::new().unwrap();
    let analysis = analyze(
        project.path(),
        &AnalyzeOptions { now_unix: Some(NOW), ..Default::default() },
    )
    .unwrap();
    let mut store = ArtifactStore::open_dir(maps.path().join("maps"));
    generate(&analysis, &mut store).unwrap();
    (maps, store)
}

#[test]
fn test_full_pipeline_generates_valid_maps() {
    let project = polyglot_project();
    let (_maps, store) = generated(&project);

    let report = validate(&store);
    assert!(report.fatal.is_empty(), "{:?}", report.fatal);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
}

#[test]
fn test_gitignored_files_stay_out_of_every_artifact() {
    let project = polyglot_project();
    let (_maps, store) = generated(&project);

    let proofs = store.read_artifact("existence-proofs").unwrap();
    let present = proofs["present"].as_array().unwrap();
    assert!(!present.iter().any(|p| p.as_str().unwrap().starts_with("dist/")));

    let metadata = store.read_artifact("metadata").unwrap();
    assert!(!metadata["files"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["path"].as_str().unwrap().starts_with("dist/")));
}

#[test]
fn test_forward_reverse_mirror_across_artifacts() {
    let project = polyglot_project();
    let (_maps, store) = generated(&project);

    let forward = store.read_artifact("dependencies-forward").unwrap();
    let reverse = store.read_artifact("dependencies-reverse").unwrap();

    let imports = forward["dependencies"]["index.js"]["imports"].as_array().unwrap();
    let edge = imports.iter().find(|i| i["type"] == "internal").unwrap();
    assert_eq!(edge["resolvedPath"], "src/router.js");

    let imported_by =
        reverse["dependencies"]["src/router.js"]["importedBy"].as_array().unwrap();
    assert!(imported_by.iter().any(|e| e["file"] == "index.js"));

    // External edges never appear in reverse
    assert!(reverse["dependencies"].get("express").is_none());
}

#[test]
fn test_cycle_between_router_and_db_is_reported() {
    let project = polyglot_project();
    let (_maps, store) = generated(&project);

    let issues = store.read_artifact("issues").unwrap();
    let cycles = issues["circularDependencies"].as_array().unwrap();
    assert_eq!(cycles.len(), 1);
    let members: Vec<&str> =
        cycles[0].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert!(members.contains(&"src/router.js"));
    assert!(members.contains(&"src/db.js"));
}

#[test]
fn test_multi_language_content_summaries() {
    let project = polyglot_project();
    let (_maps, store) = generated(&project);

    let doc = store.read_artifact("content-summaries").unwrap();
    let summaries = doc["summaries"].as_object().unwrap();

    assert!(summaries["scripts/sync.py"]["exports"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["name"] == "sync_all"));
    assert!(summaries["tools/report/main.go"]["exports"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["name"] == "Run"));
    assert!(summaries["native/src/codec.rs"]["exports"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["name"] == "Codec"));
    // Markdown files have no summaries
    assert!(summaries.get("README.md").is_none());
}

#[test]
fn test_fresh_map_scores_zero_staleness() {
    let project = polyglot_project();
    let (_maps, store) = generated(&project);

    let summary = store.read_artifact("summary").unwrap();
    let record: StalenessRecord =
        serde_json::from_value(summary["staleness"].clone()).unwrap();

    let total = summary["stats"]["totalFiles"].as_u64().unwrap();
    let report = assess(&record, &record.git_hash, total, NOW);
    assert_eq!(report.score, 0);
    assert!(!report.needs_refresh(30));
}

#[test]
fn test_queries_answer_from_generated_maps() {
    let project = polyglot_project();
    let (_maps, store) = generated(&project);

    let framework = run_query(&store, QueryType::Framework).unwrap();
    assert_eq!(framework["name"], "Express");
    assert_eq!(framework["type"], "server");

    let languages = run_query(&store, QueryType::Languages).unwrap();
    let names: Vec<&str> = languages
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|l| l["language"].as_str())
        .collect();
    for expected in ["javascript", "python", "go", "rust"] {
        assert!(names.contains(&expected), "{expected} missing from {names:?}");
    }

    let structure = run_query(&store, QueryType::Structure).unwrap();
    let top: Vec<&str> = structure
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["name"].as_str())
        .collect();
    assert!(top.contains(&"src"));
    assert!(top.contains(&"package.json"));
}

#[test]
fn test_incremental_refresh_after_commit() {
    let project = polyglot_project();
    let base = project.path();
    let git = |args: &[&str]| {
        std::process::Command::new("git").current_dir(base).args(args).output().unwrap();
    };
    git(&["init"]);
    git(&["config", "user.email", "t@t.t"]);
    git(&["config", "user.name", "t"]);
    git(&["add", "."]);
    git(&["commit", "-m", "init"]);

    let maps = TempDir::new().unwrap();
    let dir = maps.path().join("maps");
    let options = AnalyzeOptions { now_unix: Some(NOW), ..Default::default() };
    let mut store = ArtifactStore::open_dir(dir.clone());
    refresh(base, &mut store, &options, None).unwrap();

    // One new export in one file: well under the 30% fallback
    write(base, "src/db.js", "import { router } from './router';\nexport const db = {};\nexport const tx = {};\n");

    let mut store = ArtifactStore::open_dir(dir);
    let outcome = refresh(base, &mut store, &options, None).unwrap();
    assert_eq!(outcome.mode, RefreshMode::Incremental);
    assert_eq!(outcome.changed, vec!["src/db.js"]);

    let doc = store.read_artifact("content-summaries").unwrap();
    let exports = doc["summaries"]["src/db.js"]["exports"].as_array().unwrap();
    assert_eq!(exports.len(), 2);

    // The cycle survives the incremental rebuild
    let issues = store.read_artifact("issues").unwrap();
    assert_eq!(issues["circularDependencies"].as_array().unwrap().len(), 1);
}

#[test]
fn test_large_tree_compresses_above_level_one() {
    let project = TempDir::new().unwrap();
    for i in 0..300 {
        write(
            project.path(),
            &format!("src/modules/module{i}.js"),
            &format!("import {{ dep }} from './module{}';\nexport const value{i} = {i};\n", (i + 1) % 300),
        );
    }

    let (_maps, store) = generated(&project);
    let stats = store.stats().unwrap();
    let metadata_stats =
        stats.artifacts.iter().find(|a| a.name == "metadata").unwrap();
    assert!(metadata_stats.compression_level >= 2);
    assert!(metadata_stats.compressed_size < metadata_stats.original_size);

    // Decompression still restores the full document
    let metadata = store.read_artifact("metadata").unwrap();
    assert_eq!(metadata["files"].as_array().unwrap().len(), 300);
}
