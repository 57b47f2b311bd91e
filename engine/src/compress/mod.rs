//! Schema-driven JSON compression
//!
//! Three stacked levels, each declared in the artifact's metadata envelope:
//!
//! 1. **Minification** - serialize with no indentation
//! 2. **Key abbreviation** - rewrite known object keys to their 1-3 char
//!    abbreviations from the schema; unknown keys pass through verbatim
//! 3. **Value deduplication** - strings occurring three or more times move
//!    into a category-specific references table and are replaced in place by
//!    `@<category>:<index>` tokens
//!
//! Compression and decompression are symmetric: `decompress(compress(v))`
//! yields `v` for any JSON value (modulo JSON's elision of undefined).
//! Without a schema only level 1 is available.

pub mod schema;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use schema::{CompressionSchema, ReferenceCategory};

/// Strings must occur at least this many times to enter a reference table
pub const DEDUP_THRESHOLD: usize = 3;

/// Auto-selection boundaries on the minified document size
const LEVEL2_MIN_BYTES: usize = 5 * 1024;
const LEVEL3_MIN_BYTES: usize = 20 * 1024;

/// Compression level of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompressionLevel {
    /// Minified JSON only
    Minification,
    /// Minification plus key abbreviation
    KeyAbbreviation,
    /// Abbreviation plus value deduplication
    ValueDeduplication,
}

impl CompressionLevel {
    /// Numeric level as persisted in metadata (1..3)
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Minification => 1,
            Self::KeyAbbreviation => 2,
            Self::ValueDeduplication => 3,
        }
    }

    /// Method name as persisted in metadata
    pub fn method(&self) -> &'static str {
        match self {
            Self::Minification => "minification",
            Self::KeyAbbreviation => "key-abbreviation",
            Self::ValueDeduplication => "value-deduplication",
        }
    }

    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Minification),
            2 => Some(Self::KeyAbbreviation),
            3 => Some(Self::ValueDeduplication),
            _ => None,
        }
    }
}

/// Caller overrides for level selection
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionOptions {
    /// Use level 2 regardless of document size
    pub force_abbreviation: bool,
    /// Use level 3 regardless of document size
    pub force_deduplication: bool,
}

/// Compression errors
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("artifact was compressed at level {0} but no schema is available")]
    SchemaRequired(u8),

    #[error("unknown compression level {0}")]
    UnknownLevel(u8),
}

/// Metadata envelope attached to every compressed artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Tool version that wrote the artifact
    pub version: String,
    /// Generation timestamp (ISO-8601)
    pub generated: String,
    /// Level used (1..3)
    pub compression_level: u8,
    /// Level method name
    pub method: String,
    /// Pretty-printed size of the original document
    pub original_size: u64,
    /// Minified size of the stored body
    pub compressed_size: u64,
    /// compressedSize / originalSize: the fraction of the original remaining
    pub compression_ratio: f64,
}

/// A compressed artifact as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedArtifact {
    /// Always true; marks the envelope format
    pub compressed: bool,
    /// Transformed document body
    pub data: Value,
    /// Level-3 reference tables, keyed by category name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<BTreeMap<String, Vec<String>>>,
    /// Envelope metadata
    pub metadata: ArtifactMetadata,
}

/// Compress a document, selecting the level from its minified size unless
/// forced. Without a schema the document stays at level 1.
pub fn compress(
    body: &Value,
    schema: Option<&CompressionSchema>,
    options: CompressionOptions,
    version: &str,
    generated: &str,
) -> Result<CompressedArtifact, CompressError> {
    let pretty = serde_json::to_string_pretty(body)?;
    let minified = serde_json::to_string(body)?;

    let level = match schema {
        None => CompressionLevel::Minification,
        Some(_) => {
            if options.force_deduplication {
                CompressionLevel::ValueDeduplication
            } else if options.force_abbreviation {
                CompressionLevel::KeyAbbreviation
            } else if minified.len() >= LEVEL3_MIN_BYTES {
                CompressionLevel::ValueDeduplication
            } else if minified.len() >= LEVEL2_MIN_BYTES {
                CompressionLevel::KeyAbbreviation
            } else {
                CompressionLevel::Minification
            }
        }
    };

    let (data, references) = match level {
        CompressionLevel::Minification => (body.clone(), None),
        CompressionLevel::KeyAbbreviation => {
            let schema = schema.expect("level 2 implies a schema");
            (abbreviate_keys(body, schema), None)
        }
        CompressionLevel::ValueDeduplication => {
            let schema = schema.expect("level 3 implies a schema");
            let abbreviated = abbreviate_keys(body, schema);
            let (deduped, references) = deduplicate_values(&abbreviated, schema);
            (deduped, (!references.is_empty()).then_some(references))
        }
    };

    let compressed_size = serde_json::to_string(&data)?.len() as u64;
    let original_size = pretty.len() as u64;
    let ratio = if original_size == 0 {
        1.0
    } else {
        round2(compressed_size as f64 / original_size as f64)
    };

    Ok(CompressedArtifact {
        compressed: true,
        data,
        references,
        metadata: ArtifactMetadata {
            version: version.to_owned(),
            generated: generated.to_owned(),
            compression_level: level.as_u8(),
            method: level.method().to_owned(),
            original_size,
            compressed_size,
            compression_ratio: ratio,
        },
    })
}

/// Reverse every compression step and return the original document body
pub fn decompress(
    artifact: &CompressedArtifact,
    schema: Option<&CompressionSchema>,
) -> Result<Value, CompressError> {
    let level = CompressionLevel::from_u8(artifact.metadata.compression_level)
        .ok_or(CompressError::UnknownLevel(artifact.metadata.compression_level))?;

    let mut body = artifact.data.clone();
    if let Some(references) = &artifact.references {
        body = expand_references(&body, references);
    }
    if level >= CompressionLevel::KeyAbbreviation {
        let schema = schema.ok_or(CompressError::SchemaRequired(level.as_u8()))?;
        body = expand_keys(&body, schema);
    }
    Ok(body)
}

/// Recursively rewrite known keys to their abbreviations
fn abbreviate_keys(value: &Value, schema: &CompressionSchema) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                let key = schema.abbreviate(key).unwrap_or(key).to_owned();
                out.insert(key, abbreviate_keys(inner, schema));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| abbreviate_keys(v, schema)).collect())
        }
        other => other.clone(),
    }
}

/// Recursively rewrite abbreviated keys back to their long forms
fn expand_keys(value: &Value, schema: &CompressionSchema) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                let key = schema.expand(key).unwrap_or(key).to_owned();
                out.insert(key, expand_keys(inner, schema));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| expand_keys(v, schema)).collect())
        }
        other => other.clone(),
    }
}

/// Move repeated strings into per-category reference tables
///
/// A string leaf participates when its enclosing key maps to a category and
/// the (category, string) pair occurs at least [`DEDUP_THRESHOLD`] times in
/// the whole document. Indices are assigned in document order, so output is
/// deterministic.
fn deduplicate_values(
    value: &Value,
    schema: &CompressionSchema,
) -> (Value, BTreeMap<String, Vec<String>>) {
    let mut counts: BTreeMap<(ReferenceCategory, String), usize> = BTreeMap::new();
    count_strings(value, None, schema, &mut counts);

    let mut tables: BTreeMap<ReferenceCategory, Vec<String>> = BTreeMap::new();
    let replaced = replace_strings(value, None, schema, &counts, &mut tables);

    let references = tables
        .into_iter()
        .map(|(category, strings)| (category.name().to_owned(), strings))
        .collect();
    (replaced, references)
}

fn count_strings(
    value: &Value,
    context: Option<ReferenceCategory>,
    schema: &CompressionSchema,
    counts: &mut BTreeMap<(ReferenceCategory, String), usize>,
) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                count_strings(inner, schema.category_for(key), schema, counts);
            }
        }
        Value::Array(items) => {
            for item in items {
                count_strings(item, context, schema, counts);
            }
        }
        Value::String(s) => {
            if let Some(category) = context {
                *counts.entry((category, s.clone())).or_insert(0) += 1;
            }
        }
        _ => {}
    }
}

fn replace_strings(
    value: &Value,
    context: Option<ReferenceCategory>,
    schema: &CompressionSchema,
    counts: &BTreeMap<(ReferenceCategory, String), usize>,
    tables: &mut BTreeMap<ReferenceCategory, Vec<String>>,
) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                out.insert(
                    key.clone(),
                    replace_strings(inner, schema.category_for(key), schema, counts, tables),
                );
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_strings(item, context, schema, counts, tables))
                .collect(),
        ),
        Value::String(s) => {
            if let Some(category) = context {
                let count = counts.get(&(category, s.clone())).copied().unwrap_or(0);
                if count >= DEDUP_THRESHOLD {
                    let table = tables.entry(category).or_default();
                    let index = match table.iter().position(|entry| entry == s) {
                        Some(index) => index,
                        None => {
                            table.push(s.clone());
                            table.len() - 1
                        }
                    };
                    return Value::String(format!("@{}:{}", category.name(), index));
                }
            }
            Value::String(s.clone())
        }
        other => other.clone(),
    }
}

/// Replace `@<category>:<index>` tokens with their table entries
fn expand_references(value: &Value, references: &BTreeMap<String, Vec<String>>) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                out.insert(key.clone(), expand_references(inner, references));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items.iter().map(|item| expand_references(item, references)).collect(),
        ),
        Value::String(s) => {
            if let Some(token) = s.strip_prefix('@') {
                if let Some((category, index)) = token.split_once(':') {
                    if let (Some(table), Ok(index)) =
                        (references.get(category), index.parse::<usize>())
                    {
                        if let Some(entry) = table.get(index) {
                            return Value::String(entry.clone());
                        }
                    }
                }
            }
            Value::String(s.clone())
        }
        other => other.clone(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
