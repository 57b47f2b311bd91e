//! Artifact persistence
//!
//! Maps live under `<config_root>/project-maps/<ProjectKey>/`, one JSON file
//! per artifact, each wrapped in the compression envelope. Writes stage to
//! `<name>.json.tmp` and rename into place, so a crash never corrupts the
//! previous generation. The ProjectKey is a deterministic xxh3 digest of the
//! canonical absolute project path.

use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use crate::compress::schema::CompressionSchema;
use crate::compress::{
    compress, decompress, ArtifactMetadata, CompressError, CompressedArtifact, CompressionOptions,
};

/// Engine version stamped into artifact metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema file co-located with the artifacts
pub const SCHEMA_FILE: &str = ".compression-schema.json";

/// One canonical artifact: name, load tier, whether generation always
/// produces it
#[derive(Debug, Clone, Copy)]
pub struct ArtifactInfo {
    pub name: &'static str,
    pub tier: u8,
    pub required: bool,
}

/// The canonical artifact set, in generation order
pub const ARTIFACTS: &[ArtifactInfo] = &[
    ArtifactInfo { name: "summary", tier: 1, required: true },
    ArtifactInfo { name: "quick-queries", tier: 1, required: true },
    ArtifactInfo { name: "tree", tier: 2, required: true },
    ArtifactInfo { name: "existence-proofs", tier: 2, required: true },
    ArtifactInfo { name: "metadata", tier: 3, required: true },
    ArtifactInfo { name: "content-summaries", tier: 3, required: true },
    ArtifactInfo { name: "indices", tier: 3, required: true },
    ArtifactInfo { name: "dependencies-forward", tier: 4, required: true },
    ArtifactInfo { name: "dependencies-reverse", tier: 4, required: true },
    ArtifactInfo { name: "relationships", tier: 4, required: true },
    ArtifactInfo { name: "issues", tier: 4, required: true },
    ArtifactInfo { name: "database-schema", tier: 4, required: false },
    ArtifactInfo { name: "table-module-mapping", tier: 4, required: false },
];

/// Look up an artifact by name
pub fn artifact_info(name: &str) -> Option<&'static ArtifactInfo> {
    ARTIFACTS.iter().find(|a| a.name == name)
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Compress(#[from] CompressError),

    #[error("artifact not found: {0}")]
    MissingArtifact(String),

    #[error("artifact {0} has an invalid envelope: {1}")]
    InvalidEnvelope(String, serde_json::Error),
}

/// Root of the user's config directory
///
/// `$PROJECT_MAPS_HOME` wins, then `$CLAUDE_CONFIG_DIR`, then `~/.claude`.
pub fn config_root() -> PathBuf {
    if let Ok(home) = std::env::var("PROJECT_MAPS_HOME") {
        return PathBuf::from(home);
    }
    if let Ok(dir) = std::env::var("CLAUDE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
}

/// Directory holding every project's maps
pub fn maps_root() -> PathBuf {
    config_root().join("project-maps")
}

/// Deterministic 12-hex-digit key for a project path
pub fn project_key(project_path: &Path) -> String {
    let canonical = project_path
        .canonicalize()
        .unwrap_or_else(|_| project_path.to_path_buf());
    let digest = xxh3_64(canonical.to_string_lossy().as_bytes());
    format!("{digest:016x}")[..12].to_owned()
}

/// Handle on one project's artifact directory
pub struct ArtifactStore {
    dir: PathBuf,
    schema: Option<CompressionSchema>,
    /// Set when a schema file exists but cannot be used
    pub schema_warning: Option<String>,
}

impl ArtifactStore {
    /// Open the store for a project path (resolves the ProjectKey)
    pub fn open(project_path: &Path) -> Self {
        Self::open_dir(maps_root().join(project_key(project_path)))
    }

    /// Open a store rooted at an explicit directory
    pub fn open_dir(dir: PathBuf) -> Self {
        let schema_path = dir.join(SCHEMA_FILE);
        let (schema, schema_warning) = if schema_path.exists() {
            match CompressionSchema::load(&schema_path) {
                Ok(schema) => (Some(schema), None),
                Err(err) => (
                    None,
                    Some(format!("compression schema unusable, staying at level 1: {err}")),
                ),
            }
        } else {
            (None, None)
        };
        Self { dir, schema, schema_warning }
    }

    /// Directory artifacts are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The loaded schema, if any
    pub fn schema(&self) -> Option<&CompressionSchema> {
        self.schema.as_ref()
    }

    /// Write the built-in schema file if none exists yet and load it
    ///
    /// A present-but-invalid schema file is left alone; the store stays at
    /// level 1 and `schema_warning` explains why.
    pub fn ensure_schema(&mut self) -> Result<(), StoreError> {
        if self.schema.is_some() || self.schema_warning.is_some() {
            return Ok(());
        }
        let schema = CompressionSchema::builtin();
        let text = serde_json::to_string_pretty(&schema.to_file_json())
            .expect("schema file serializes");
        self.write_raw(SCHEMA_FILE, &text)?;
        self.schema = Some(schema);
        Ok(())
    }

    /// Compress and atomically write one artifact
    pub fn write_artifact(
        &self,
        name: &str,
        body: &Value,
        generated: &str,
    ) -> Result<ArtifactMetadata, StoreError> {
        self.write_artifact_with(name, body, generated, CompressionOptions::default())
    }

    /// Compress with explicit options and atomically write one artifact
    pub fn write_artifact_with(
        &self,
        name: &str,
        body: &Value,
        generated: &str,
        options: CompressionOptions,
    ) -> Result<ArtifactMetadata, StoreError> {
        let artifact = compress(body, self.schema.as_ref(), options, VERSION, generated)?;
        let text = serde_json::to_string(&artifact).map_err(CompressError::Json)?;
        self.write_raw(&format!("{name}.json"), &text)?;
        Ok(artifact.metadata)
    }

    /// Read one artifact's envelope without decompressing
    pub fn read_envelope(&self, name: &str) -> Result<CompressedArtifact, StoreError> {
        let path = self.dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(StoreError::MissingArtifact(name.to_owned()));
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        serde_json::from_str(&text)
            .map_err(|err| StoreError::InvalidEnvelope(name.to_owned(), err))
    }

    /// Read and decompress one artifact; the envelope metadata is re-injected
    /// as the document's `metadata` field
    pub fn read_artifact(&self, name: &str) -> Result<Value, StoreError> {
        let envelope = self.read_envelope(name)?;
        let body = decompress(&envelope, self.schema.as_ref())?;

        let mut doc = serde_json::Map::new();
        doc.insert(
            "metadata".to_owned(),
            serde_json::to_value(&envelope.metadata).map_err(CompressError::Json)?,
        );
        if let Value::Object(fields) = body {
            for (key, value) in fields {
                if key != "metadata" {
                    doc.insert(key, value);
                }
            }
        }
        Ok(Value::Object(doc))
    }

    /// Whether an artifact file exists
    pub fn artifact_exists(&self, name: &str) -> bool {
        self.dir.join(format!("{name}.json")).exists()
    }

    /// Compression statistics across every present artifact
    pub fn stats(&self) -> Result<StatsReport, StoreError> {
        let mut artifacts = Vec::new();
        let mut total_original = 0u64;
        let mut total_compressed = 0u64;

        for info in ARTIFACTS {
            if !self.artifact_exists(info.name) {
                continue;
            }
            let envelope = self.read_envelope(info.name)?;
            total_original += envelope.metadata.original_size;
            total_compressed += envelope.metadata.compressed_size;
            artifacts.push(ArtifactStats {
                name: info.name.to_owned(),
                tier: info.tier,
                compression_level: envelope.metadata.compression_level,
                method: envelope.metadata.method,
                original_size: envelope.metadata.original_size,
                compressed_size: envelope.metadata.compressed_size,
                compression_ratio: envelope.metadata.compression_ratio,
            });
        }

        let overall_ratio = if total_original == 0 {
            1.0
        } else {
            ((total_compressed as f64 / total_original as f64) * 100.0).round() / 100.0
        };
        Ok(StatsReport { artifacts, total_original, total_compressed, overall_ratio })
    }

    /// Stage-and-rename write of a file in the store directory
    fn write_raw(&self, file_name: &str, text: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|source| StoreError::Io { path: self.dir.clone(), source })?;

        let target = self.dir.join(file_name);
        let tmp = self.dir.join(format!("{file_name}.tmp"));
        if let Err(source) = std::fs::write(&tmp, text) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Io { path: tmp, source });
        }
        if let Err(source) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Io { path: target, source });
        }
        Ok(())
    }
}

/// Compression statistics for one artifact
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStats {
    pub name: String,
    pub tier: u8,
    pub compression_level: u8,
    pub method: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: f64,
}

/// Totals across all artifacts of one project
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub artifacts: Vec<ArtifactStats>,
    pub total_original: u64,
    pub total_compressed: u64,
    pub overall_ratio: f64,
}

/// One project directory under the maps root
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub key: String,
    pub artifacts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
}

/// Enumerate project directories under the maps root
pub fn list_projects() -> Result<Vec<ProjectEntry>, StoreError> {
    let root = maps_root();
    if !root.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&root)
        .map_err(|source| StoreError::Io { path: root.clone(), source })?;

    let mut projects = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let key = entry.file_name().to_string_lossy().to_string();
        let store = ArtifactStore::open_dir(entry.path());
        let artifacts = ARTIFACTS
            .iter()
            .filter(|info| store.artifact_exists(info.name))
            .count();
        let generated = store
            .read_envelope("summary")
            .ok()
            .map(|envelope| envelope.metadata.generated);
        projects.push(ProjectEntry { key, artifacts, generated });
    }
    projects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> ArtifactStore {
        let mut store = ArtifactStore::open_dir(temp.path().join("maps"));
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_project_key_is_stable_and_hex() {
        let temp = TempDir::new().unwrap();
        let first = project_key(temp.path());
        let second = project_key(temp.path());
        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

        let other = TempDir::new().unwrap();
        assert_ne!(first, project_key(other.path()));
    }

    #[test]
    fn test_write_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let body = json!({"stats": {"totalFiles": 3}, "staleness": {"gitHash": "no-git"}});
        store.write_artifact("summary", &body, "2025-01-01T00:00:00Z").unwrap();

        let doc = store.read_artifact("summary").unwrap();
        assert_eq!(doc["stats"]["totalFiles"], 3);
        assert_eq!(doc["metadata"]["generated"], "2025-01-01T00:00:00Z");
        assert_eq!(doc["metadata"]["compressionLevel"], 1);
    }

    #[test]
    fn test_no_tmp_left_behind() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.write_artifact("tree", &json!({"tree": {}}), "now").unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert!(matches!(
            store.read_artifact("issues"),
            Err(StoreError::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_invalid_schema_degrades_with_warning() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("maps");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SCHEMA_FILE), "{broken").unwrap();

        let store = ArtifactStore::open_dir(dir);
        assert!(store.schema().is_none());
        assert!(store.schema_warning.is_some());

        // Large documents still compress, at level 1 only
        let big: Vec<_> = (0..2000).map(|i| json!({"path": format!("f{i}.ts")})).collect();
        let metadata = store
            .write_artifact("metadata", &json!({"files": big}), "now")
            .unwrap();
        assert_eq!(metadata.compression_level, 1);
    }

    #[test]
    fn test_stats_totals() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.write_artifact("summary", &json!({"stats": {}}), "now").unwrap();
        store.write_artifact("issues", &json!({"brokenImports": []}), "now").unwrap();

        let report = store.stats().unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert!(report.total_original > 0);
        assert!(report.overall_ratio > 0.0);
    }

    #[test]
    fn test_artifact_table_has_eleven_required() {
        let required = ARTIFACTS.iter().filter(|a| a.required).count();
        assert_eq!(required, 11);
        assert_eq!(artifact_info("summary").unwrap().tier, 1);
        assert!(artifact_info("nope").is_none());
    }
}
