//! Query routing over generated maps
//!
//! Quick query types answer straight out of the `quick-queries` artifact;
//! extended types read the deeper map artifacts. `ask` routes a natural-
//! language question onto a query type by keyword match.

use serde_json::{json, Value};
use thiserror::Error;

use crate::store::{ArtifactStore, StoreError};

/// Every supported query type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    EntryPoints,
    Framework,
    Tests,
    Largest,
    Recent,
    Structure,
    Languages,
    BackendLayers,
    Modules,
    Components,
    Database,
    Dependencies,
    Issues,
    Relationships,
}

impl QueryType {
    pub const ALL: [Self; 14] = [
        Self::EntryPoints,
        Self::Framework,
        Self::Tests,
        Self::Largest,
        Self::Recent,
        Self::Structure,
        Self::Languages,
        Self::BackendLayers,
        Self::Modules,
        Self::Components,
        Self::Database,
        Self::Dependencies,
        Self::Issues,
        Self::Relationships,
    ];

    /// CLI-facing name
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntryPoints => "entry-points",
            Self::Framework => "framework",
            Self::Tests => "tests",
            Self::Largest => "largest",
            Self::Recent => "recent",
            Self::Structure => "structure",
            Self::Languages => "languages",
            Self::BackendLayers => "backend-layers",
            Self::Modules => "modules",
            Self::Components => "components",
            Self::Database => "database",
            Self::Dependencies => "dependencies",
            Self::Issues => "issues",
            Self::Relationships => "relationships",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|q| q.name() == name)
    }

    /// All valid names, for error messages
    pub fn valid_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|q| q.name()).collect()
    }
}

/// Query errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown query type {given:?}; valid types: {}", valid.join(", "))]
    UnknownType {
        given: String,
        valid: Vec<&'static str>,
    },

    #[error("no answer for {0}; regenerate the maps")]
    MissingAnswer(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Answer a query from the stored maps
pub fn run_query(store: &ArtifactStore, query: QueryType) -> Result<Value, QueryError> {
    match query {
        QueryType::EntryPoints => quick_answer(store, "entryPoints"),
        QueryType::Framework => quick_answer(store, "framework"),
        QueryType::Tests => quick_answer(store, "testLocation"),
        QueryType::Largest => quick_answer(store, "largestFiles"),
        QueryType::Recent => quick_answer(store, "recentFiles"),
        QueryType::Structure => quick_answer(store, "topLevelStructure"),
        QueryType::Languages => quick_answer(store, "languages"),
        QueryType::BackendLayers | QueryType::Modules => {
            let doc = store.read_artifact("relationships")?;
            field(doc, "modules")
        }
        QueryType::Components => components(store),
        QueryType::Database => {
            if !store.artifact_exists("database-schema") {
                return Ok(json!({"orm": Value::Null, "tables": []}));
            }
            Ok(strip_metadata(store.read_artifact("database-schema")?))
        }
        QueryType::Dependencies => {
            let doc = store.read_artifact("dependencies-forward")?;
            field(doc, "dependencies")
        }
        QueryType::Issues => Ok(strip_metadata(store.read_artifact("issues")?)),
        QueryType::Relationships => Ok(strip_metadata(store.read_artifact("relationships")?)),
    }
}

/// Look up one pre-computed answer in quick-queries
fn quick_answer(store: &ArtifactStore, key: &'static str) -> Result<Value, QueryError> {
    let doc = store.read_artifact("quick-queries")?;
    doc.get("answers")
        .and_then(|answers| answers.get(key))
        .cloned()
        .ok_or(QueryError::MissingAnswer(key))
}

fn field(doc: Value, key: &'static str) -> Result<Value, QueryError> {
    doc.get(key).cloned().ok_or(QueryError::MissingAnswer(key))
}

fn strip_metadata(doc: Value) -> Value {
    match doc {
        Value::Object(mut map) => {
            map.shift_remove("metadata");
            Value::Object(map)
        }
        other => other,
    }
}

/// Component-role files, answered from the metadata artifact
fn components(store: &ArtifactStore) -> Result<Value, QueryError> {
    let doc = store.read_artifact("metadata")?;
    let files = doc
        .get("files")
        .and_then(Value::as_array)
        .ok_or(QueryError::MissingAnswer("files"))?;
    let components: Vec<Value> = files
        .iter()
        .filter(|f| {
            f.get("path")
                .and_then(Value::as_str)
                .map(|p| {
                    let lower = p.to_lowercase();
                    lower.contains("component") || lower.contains("/widgets/")
                })
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    Ok(json!({ "components": components }))
}

/// Keyword routing for `ask`: the first matching rule wins
const INTENT_RULES: &[(&[&str], QueryType)] = &[
    (&["entry point", "entry", "start", "where does"], QueryType::EntryPoints),
    (&["framework", "stack", "built with"], QueryType::Framework),
    (&["test"], QueryType::Tests),
    (&["largest", "biggest", "big file"], QueryType::Largest),
    (&["recent", "lately", "last changed", "modified"], QueryType::Recent),
    (&["structure", "layout", "organized", "folder", "directories", "tree"], QueryType::Structure),
    (&["language"], QueryType::Languages),
    (&["database", "schema", "table", "orm"], QueryType::Database),
    (&["circular", "broken", "unused", "issue", "problem", "warning"], QueryType::Issues),
    (&["coupl", "relationship", "connected"], QueryType::Relationships),
    (&["import", "depend"], QueryType::Dependencies),
    (&["layer"], QueryType::BackendLayers),
    (&["component"], QueryType::Components),
    (&["module"], QueryType::Modules),
];

/// Pick a query type for a natural-language question
pub fn route_question(question: &str) -> Option<QueryType> {
    let lower = question.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, query)| *query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{analyze, generate, AnalyzeOptions};
    use std::fs;
    use tempfile::TempDir;

    fn generated_store() -> (TempDir, ArtifactStore) {
        let project = TempDir::new().unwrap();
        fs::write(
            project.path().join("package.json"),
            r#"{"name": "q", "dependencies": {"express": "4.0.0"}}"#,
        )
        .unwrap();
        fs::write(project.path().join("index.js"), "import './app';\n").unwrap();
        fs::write(project.path().join("app.js"), "export const app = 1;\n").unwrap();

        let maps = TempDir::new().unwrap();
        let analysis = analyze(
            project.path(),
            &AnalyzeOptions { now_unix: Some(1_735_689_600), ..Default::default() },
        )
        .unwrap();
        let mut store = ArtifactStore::open_dir(maps.path().join("k"));
        generate(&analysis, &mut store).unwrap();
        // TempDirs must outlive the store
        (maps, store)
    }

    #[test]
    fn test_quick_query_answers() {
        let (_maps, store) = generated_store();
        let framework = run_query(&store, QueryType::Framework).unwrap();
        assert_eq!(framework["name"], "Express");

        let entries = run_query(&store, QueryType::EntryPoints).unwrap();
        assert!(entries.as_array().unwrap().contains(&serde_json::json!("index.js")));
    }

    #[test]
    fn test_extended_queries() {
        let (_maps, store) = generated_store();
        let issues = run_query(&store, QueryType::Issues).unwrap();
        assert!(issues.get("brokenImports").is_some());
        assert!(issues.get("metadata").is_none());

        let deps = run_query(&store, QueryType::Dependencies).unwrap();
        assert!(deps.get("index.js").is_some());
    }

    #[test]
    fn test_database_query_without_orm() {
        let (_maps, store) = generated_store();
        let db = run_query(&store, QueryType::Database).unwrap();
        assert_eq!(db["orm"], Value::Null);
    }

    #[test]
    fn test_query_names_round_trip() {
        for query in QueryType::ALL {
            assert_eq!(QueryType::from_name(query.name()), Some(query));
        }
        assert_eq!(QueryType::from_name("nope"), None);
    }

    #[test]
    fn test_route_question() {
        assert_eq!(route_question("What framework is this built with?"), Some(QueryType::Framework));
        assert_eq!(route_question("where are the tests"), Some(QueryType::Tests));
        assert_eq!(route_question("show me circular dependencies"), Some(QueryType::Issues));
        assert_eq!(route_question("what does index.js import"), Some(QueryType::Dependencies));
        assert_eq!(route_question("largest files?"), Some(QueryType::Largest));
        assert_eq!(route_question("how is the project organized"), Some(QueryType::Structure));
        assert_eq!(route_question("tell me a joke"), None);
    }
}
