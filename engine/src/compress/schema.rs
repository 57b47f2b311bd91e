//! Compression schema: the abbreviation table and reference categories
//!
//! The schema is loaded once and passed as an explicit, immutable argument
//! into compress/decompress; tests construct their own instances instead of
//! mutating process-wide state. Both directions of the key table are held,
//! and the table is validated to be injective at load time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Reference-table category for level-3 value deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReferenceCategory {
    #[serde(rename = "fileTypes")]
    FileTypes,
    #[serde(rename = "fileRoles")]
    FileRoles,
    #[serde(rename = "commonPaths")]
    CommonPaths,
    #[serde(rename = "frequentImports")]
    FrequentImports,
}

impl ReferenceCategory {
    pub const ALL: [Self; 4] =
        [Self::FileTypes, Self::FileRoles, Self::CommonPaths, Self::FrequentImports];

    /// Name used in reference tables and `@<category>:<index>` tokens
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileTypes => "fileTypes",
            Self::FileRoles => "fileRoles",
            Self::CommonPaths => "commonPaths",
            Self::FrequentImports => "frequentImports",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// The conventional mapping from (long) object keys to the reference
/// category their string values dedupe into
const KEY_CATEGORIES: &[(&str, ReferenceCategory)] = &[
    ("type", ReferenceCategory::FileTypes),
    ("language", ReferenceCategory::FileTypes),
    ("extension", ReferenceCategory::FileTypes),
    ("role", ReferenceCategory::FileRoles),
    ("path", ReferenceCategory::CommonPaths),
    ("file", ReferenceCategory::CommonPaths),
    ("resolvedPath", ReferenceCategory::CommonPaths),
    ("testLocation", ReferenceCategory::CommonPaths),
    ("source", ReferenceCategory::FrequentImports),
    ("imports", ReferenceCategory::FrequentImports),
    ("dependencies", ReferenceCategory::FrequentImports),
];

/// Built-in abbreviation table (long key -> 1-3 char abbreviation)
const BUILTIN_MAPPINGS: &[(&str, &str)] = &[
    ("path", "p"),
    ("type", "t"),
    ("role", "r"),
    ("lines", "ln"),
    ("size", "s"),
    ("language", "lg"),
    ("languages", "lgs"),
    ("modifiedAt", "m"),
    ("extension", "x"),
    ("imports", "i"),
    ("exports", "e"),
    ("importedBy", "ib"),
    ("dependencies", "d"),
    ("symbols", "sy"),
    ("source", "sr"),
    ("resolvedPath", "rp"),
    ("isDynamic", "dy"),
    ("files", "f"),
    ("file", "fl"),
    ("name", "n"),
    ("line", "l"),
    ("children", "c"),
    ("fileCount", "fc"),
    ("summaries", "sm"),
    ("topEntities", "te"),
    ("entryPoints", "ep"),
    ("framework", "fw"),
    ("testLocation", "tl"),
    ("largestFiles", "lf"),
    ("recentFiles", "rf"),
    ("topLevelStructure", "ts"),
    ("totalFiles", "tf"),
    ("totalLines", "tln"),
    ("primaryLanguages", "pl"),
    ("answers", "a"),
    ("stats", "st"),
    ("quickStats", "qs"),
    ("present", "pr"),
    ("missingCommon", "mc"),
    ("byType", "bt"),
    ("byRole", "br"),
    ("bySize", "bs"),
    ("byRecency", "brc"),
    ("brokenImports", "bi"),
    ("circularDependencies", "cd"),
    ("unusedFiles", "uf"),
    ("parseWarnings", "pw"),
    ("tightlyCoupled", "tc"),
    ("maxDepth", "mdp"),
    ("avgDeps", "ad"),
];

/// Schema errors
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("cannot read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("abbreviation table is not injective: {0:?} maps twice")]
    DuplicateAbbreviation(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaFile {
    version: String,
    #[serde(rename = "keyMappings")]
    key_mappings: KeyMappings,
    #[serde(rename = "valueReferences", default)]
    value_references: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyMappings {
    mappings: BTreeMap<String, String>,
}

/// Immutable compression schema shared by compressor and decompressor
#[derive(Debug, Clone)]
pub struct CompressionSchema {
    /// Schema format version
    pub version: String,
    long_to_abbrev: BTreeMap<String, String>,
    abbrev_to_long: BTreeMap<String, String>,
    categories: BTreeMap<String, ReferenceCategory>,
}

impl CompressionSchema {
    /// The schema shipped with the tool
    pub fn builtin() -> Self {
        let mappings: BTreeMap<String, String> = BUILTIN_MAPPINGS
            .iter()
            .map(|(long, short)| ((*long).to_owned(), (*short).to_owned()))
            .collect();
        Self::from_mappings("1.0", mappings).expect("builtin table is injective")
    }

    /// Load a schema from its JSON file
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path)?;
        let file: SchemaFile = serde_json::from_str(&text)?;
        Self::from_mappings(&file.version, file.key_mappings.mappings)
    }

    /// Build from an explicit mapping table, validating injectivity
    pub fn from_mappings(
        version: &str,
        mappings: BTreeMap<String, String>,
    ) -> Result<Self, SchemaError> {
        let mut abbrev_to_long = BTreeMap::new();
        for (long, short) in &mappings {
            if abbrev_to_long.insert(short.clone(), long.clone()).is_some() {
                return Err(SchemaError::DuplicateAbbreviation(short.clone()));
            }
        }

        // Categories attach to long keys and follow them through abbreviation
        let mut categories = BTreeMap::new();
        for (long, category) in KEY_CATEGORIES {
            categories.insert((*long).to_owned(), *category);
            if let Some(short) = mappings.get(*long) {
                categories.insert(short.clone(), *category);
            }
        }

        Ok(Self {
            version: version.to_owned(),
            long_to_abbrev: mappings,
            abbrev_to_long,
            categories,
        })
    }

    /// Serialize to the on-disk schema file format
    pub fn to_file_json(&self) -> serde_json::Value {
        serde_json::json!({
            "version": self.version,
            "keyMappings": { "mappings": self.long_to_abbrev },
            "valueReferences": {
                "fileTypes": [],
                "fileRoles": [],
                "commonPaths": [],
                "frequentImports": [],
            },
        })
    }

    /// Abbreviation for a long key, if any
    pub fn abbreviate(&self, key: &str) -> Option<&str> {
        self.long_to_abbrev.get(key).map(String::as_str)
    }

    /// Long key for an abbreviation, if any
    pub fn expand(&self, key: &str) -> Option<&str> {
        self.abbrev_to_long.get(key).map(String::as_str)
    }

    /// Reference category for a key (long or abbreviated form)
    pub fn category_for(&self, key: &str) -> Option<ReferenceCategory> {
        self.categories.get(key).copied()
    }
}
