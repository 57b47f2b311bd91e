//! Map integrity validation
//!
//! Checks that every required artifact is present and decompressable, that
//! forward and reverse dependency maps mirror each other, and surfaces the
//! broken references the generator recorded. Missing or unparseable
//! required artifacts are fatal; consistency findings are reported.

use serde_json::Value;
use serde::Serialize;

use crate::store::{ArtifactStore, ARTIFACTS};

/// Result of validating one project's maps
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// True when nothing at all was flagged
    pub passed: bool,
    /// Missing or unparseable required artifacts; fatal
    pub fatal: Vec<String>,
    /// Consistency violations
    pub errors: Vec<String>,
    /// Non-blocking findings (broken imports, unused files)
    pub warnings: Vec<String>,
    /// Artifacts that were checked
    pub checked: Vec<String>,
}

impl ValidationReport {
    /// Whether a required artifact was missing or unreadable
    pub fn is_fatal(&self) -> bool {
        !self.fatal.is_empty()
    }
}

/// Validate every artifact of a project
pub fn validate(store: &ArtifactStore) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut docs: std::collections::BTreeMap<&str, Value> = std::collections::BTreeMap::new();
    for info in ARTIFACTS {
        if !store.artifact_exists(info.name) {
            if info.required {
                report.fatal.push(format!("required artifact missing: {}", info.name));
            }
            continue;
        }
        match store.read_artifact(info.name) {
            Ok(doc) => {
                report.checked.push(info.name.to_owned());
                docs.insert(info.name, doc);
            }
            Err(err) => {
                report.fatal.push(format!("artifact {} unreadable: {err}", info.name));
            }
        }
    }

    for (name, doc) in &docs {
        check_envelope(name, doc, &mut report);
    }

    if let (Some(forward), Some(reverse)) =
        (docs.get("dependencies-forward"), docs.get("dependencies-reverse"))
    {
        let present: std::collections::HashSet<&str> = docs
            .get("existence-proofs")
            .and_then(|doc| doc.get("present"))
            .and_then(Value::as_array)
            .map(|paths| paths.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        check_mirror(forward, reverse, &present, &mut report);
    }

    if let Some(issues) = docs.get("issues") {
        if let Some(broken) = issues.get("brokenImports").and_then(Value::as_array) {
            if !broken.is_empty() {
                report.warnings.push(format!("{} broken import(s) recorded", broken.len()));
            }
        }
        if let Some(unused) = issues.get("unusedFiles").and_then(Value::as_array) {
            if !unused.is_empty() {
                report.warnings.push(format!("{} unused file(s) recorded", unused.len()));
            }
        }
    }

    report.passed =
        report.fatal.is_empty() && report.errors.is_empty() && report.warnings.is_empty();
    report
}

/// Envelope sanity: metadata fields the loader relies on
fn check_envelope(name: &str, doc: &Value, report: &mut ValidationReport) {
    let Some(metadata) = doc.get("metadata") else {
        report.errors.push(format!("{name}: no metadata envelope"));
        return;
    };
    match metadata.get("compressionLevel").and_then(Value::as_u64) {
        Some(level @ 1..=3) => {
            let method = metadata.get("method").and_then(Value::as_str).unwrap_or("");
            let expected = match level {
                1 => "minification",
                2 => "key-abbreviation",
                _ => "value-deduplication",
            };
            if method != expected {
                report.errors.push(format!(
                    "{name}: level {level} disagrees with method {method:?}"
                ));
            }
        }
        other => {
            report
                .errors
                .push(format!("{name}: invalid compressionLevel {other:?}"));
        }
    }
    if metadata.get("generated").and_then(Value::as_str).is_none() {
        report.errors.push(format!("{name}: missing generated timestamp"));
    }
}

/// Forward/reverse mirror invariant over internal edges
fn check_mirror(
    forward: &Value,
    reverse: &Value,
    present: &std::collections::HashSet<&str>,
    report: &mut ValidationReport,
) {
    let empty = serde_json::Map::new();
    let forward_map = forward
        .get("dependencies")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let reverse_map = reverse
        .get("dependencies")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    // Every internal forward edge (A -> B) needs A under reverse[B]
    for (file, entry) in forward_map {
        let imports = entry.get("imports").and_then(Value::as_array);
        for import in imports.into_iter().flatten() {
            let kind = import.get("type").and_then(Value::as_str).unwrap_or("");
            if !matches!(kind, "internal" | "relative" | "re-export-import") {
                continue;
            }
            let Some(target) = import.get("resolvedPath").and_then(Value::as_str) else {
                continue;
            };
            if !present.contains(target) {
                // Unresolved import: the generator records it under issues
                continue;
            }
            let mirrored = reverse_map
                .get(target)
                .and_then(|e| e.get("importedBy"))
                .and_then(Value::as_array)
                .map(|entries| {
                    entries.iter().any(|e| {
                        e.get("file").and_then(Value::as_str) == Some(file.as_str())
                    })
                })
                .unwrap_or(false);
            if !mirrored {
                report.errors.push(format!(
                    "forward edge {file} -> {target} has no reverse entry"
                ));
            }
        }
    }

    // Every reverse entry needs its forward edge
    for (target, entry) in reverse_map {
        let imported_by = entry.get("importedBy").and_then(Value::as_array);
        for importer in imported_by.into_iter().flatten() {
            let Some(file) = importer.get("file").and_then(Value::as_str) else {
                continue;
            };
            let mirrored = forward_map
                .get(file)
                .and_then(|e| e.get("imports"))
                .and_then(Value::as_array)
                .map(|imports| {
                    imports.iter().any(|i| {
                        i.get("resolvedPath").and_then(Value::as_str) == Some(target.as_str())
                    })
                })
                .unwrap_or(false);
            if !mirrored {
                report.errors.push(format!(
                    "reverse entry {target} <- {file} has no forward edge"
                ));
            }
        }
    }
}
