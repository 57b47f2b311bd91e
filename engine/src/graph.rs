//! Dependency graph construction and analysis
//!
//! Builds the forward map (file -> imports) and its derived transpose
//! (file -> importedBy) from per-file parse results. Internal edges appear
//! in both directions; external and stdlib edges appear only in forward.
//! Backs cycle detection, broken-import reporting, unused-file detection,
//! and the coupling metrics of the relationships artifact.

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::parser::resolve;
use crate::types::{FileRole, Import, ImportKind, Language, ParseResult, ScannedFile};

/// Reverse-edge entry: one importer of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseEntry {
    /// Importing file
    pub file: String,
    /// Symbols it pulls in
    pub symbols: Vec<String>,
}

/// An internal import whose target is not in the scanned set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenImport {
    /// Importing file
    pub file: String,
    /// Import specifier as written
    pub import: String,
    /// Best-effort normalized target that was not found
    pub resolved_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// The project dependency graph
///
/// Both maps are keyed by relative path strings; the reverse map is derived
/// from forward, never maintained independently.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// file -> imports, with `resolved_path` filled in
    pub forward: BTreeMap<String, Vec<Import>>,
    /// file -> files importing it
    pub reverse: BTreeMap<String, Vec<ReverseEntry>>,
    /// Internal imports that resolve to nothing
    pub broken: Vec<BrokenImport>,
}

impl DependencyGraph {
    /// Build the graph from scanner and parser output
    pub fn build(files: &[ScannedFile], parses: &HashMap<String, ParseResult>) -> Self {
        let scanned: HashSet<String> =
            files.iter().map(|f| f.relative_path.clone()).collect();
        let language_of: HashMap<&str, Language> = files
            .iter()
            .map(|f| (f.relative_path.as_str(), f.language))
            .collect();

        let mut graph = Self::default();

        for file in files {
            let Some(parse) = parses.get(&file.relative_path) else {
                continue;
            };
            let mut imports = Vec::with_capacity(parse.imports.len());
            for import in &parse.imports {
                let mut import = import.clone();
                if import.kind.is_project_local() {
                    let language =
                        language_of.get(file.relative_path.as_str()).copied().unwrap_or(Language::Unknown);
                    import.resolved_path =
                        resolve_local(&import, language, &file.relative_path, &scanned);
                    if scanned.contains(&import.resolved_path) {
                        graph
                            .reverse
                            .entry(import.resolved_path.clone())
                            .or_default()
                            .push(ReverseEntry {
                                file: file.relative_path.clone(),
                                symbols: import.symbols.clone(),
                            });
                    } else if import.kind != ImportKind::ReExport
                        || looks_relative(&import.source)
                    {
                        graph.broken.push(BrokenImport {
                            file: file.relative_path.clone(),
                            import: import.source.clone(),
                            resolved_path: import.resolved_path.clone(),
                            line: import.line,
                        });
                    }
                }
                imports.push(import);
            }
            graph.forward.insert(file.relative_path.clone(), imports);
        }

        for entries in graph.reverse.values_mut() {
            entries.sort_by(|a, b| a.file.cmp(&b.file));
        }
        graph.broken.sort_by(|a, b| {
            a.file.cmp(&b.file).then_with(|| a.import.cmp(&b.import))
        });

        graph
    }

    /// Internal edges as (from, to) pairs, deterministic order
    pub fn internal_edges(&self) -> Vec<(&str, &str)> {
        let mut edges = Vec::new();
        for (file, imports) in &self.forward {
            for import in imports {
                if import.kind.is_project_local() && self.forward.contains_key(&import.resolved_path)
                {
                    edges.push((file.as_str(), import.resolved_path.as_str()));
                }
            }
        }
        edges
    }

    /// Detect cycles among internal edges with an iterative DFS
    ///
    /// Every reported path is a true cycle; cycles are deduplicated by their
    /// member set. A self-import is a cycle of length one.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let (graph, indices) = self.to_petgraph();
        let mut order: Vec<&String> = self.forward.keys().collect();
        order.sort();

        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut seen_signatures: HashSet<Vec<String>> = HashSet::new();
        let mut visited: HashSet<NodeIndex> = HashSet::new();

        for start_name in order {
            let start = indices[start_name.as_str()];
            if visited.contains(&start) {
                continue;
            }

            // Explicit stack of (node, neighbor iterator position)
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
            let mut on_path: Vec<NodeIndex> = Vec::new();
            let mut on_path_set: HashSet<NodeIndex> = HashSet::new();

            let mut neighbors: Vec<NodeIndex> = graph.neighbors(start).collect();
            neighbors.sort_by_key(|n| graph[*n].clone());
            stack.push((start, neighbors, 0));
            on_path.push(start);
            on_path_set.insert(start);
            visited.insert(start);

            while let Some((_, neighbors, cursor)) = stack.last_mut() {
                if *cursor >= neighbors.len() {
                    let (node, _, _) = stack.pop().unwrap();
                    on_path.pop();
                    on_path_set.remove(&node);
                    continue;
                }
                let next = neighbors[*cursor];
                *cursor += 1;

                if on_path_set.contains(&next) {
                    // Cycle: slice of the current path from the repeat onward
                    let from = on_path.iter().position(|n| *n == next).unwrap();
                    let cycle: Vec<String> =
                        on_path[from..].iter().map(|n| graph[*n].clone()).collect();
                    let mut signature = cycle.clone();
                    signature.sort();
                    if seen_signatures.insert(signature) {
                        cycles.push(cycle);
                    }
                    continue;
                }
                if visited.contains(&next) {
                    continue;
                }
                visited.insert(next);
                let mut next_neighbors: Vec<NodeIndex> = graph.neighbors(next).collect();
                next_neighbors.sort_by_key(|n| graph[*n].clone());
                stack.push((next, next_neighbors, 0));
                on_path.push(next);
                on_path_set.insert(next);
            }
        }

        cycles
    }

    /// Source-role files nobody imports, excluding entry points
    pub fn unused_files(
        &self,
        files: &[ScannedFile],
        entry_points: &HashSet<String>,
    ) -> Vec<String> {
        files
            .iter()
            .filter(|f| f.role == FileRole::Source)
            .filter(|f| f.language.has_dependency_parser())
            .filter(|f| {
                self.reverse
                    .get(&f.relative_path)
                    .map(|v| v.is_empty())
                    .unwrap_or(true)
            })
            .filter(|f| !entry_points.contains(&f.relative_path))
            .map(|f| f.relative_path.clone())
            .collect()
    }

    /// Longest internal dependency chain (cycle-safe)
    pub fn max_depth(&self) -> u32 {
        let (graph, _) = self.to_petgraph();
        let mut memo: HashMap<NodeIndex, u32> = HashMap::new();
        let mut best = 0;
        for node in graph.node_indices() {
            best = best.max(depth_from(&graph, node, &mut memo, &mut HashSet::new()));
        }
        best
    }

    /// Mean internal import count across files with any imports
    pub fn average_dependencies(&self) -> f64 {
        let counts: Vec<usize> = self
            .forward
            .values()
            .map(|imports| {
                imports
                    .iter()
                    .filter(|i| i.kind.is_project_local())
                    .count()
            })
            .collect();
        let total: usize = counts.iter().sum();
        if counts.is_empty() {
            0.0
        } else {
            total as f64 / counts.len() as f64
        }
    }

    /// Mutually importing file pairs, each reported once
    pub fn tightly_coupled(&self) -> Vec<(String, String)> {
        let edges: HashSet<(&str, &str)> = self.internal_edges().into_iter().collect();
        let mut pairs = Vec::new();
        for (from, to) in &edges {
            if from < to && edges.contains(&(*to, *from)) {
                pairs.push(((*from).to_owned(), (*to).to_owned()));
            }
        }
        pairs.sort();
        pairs
    }

    fn to_petgraph(&self) -> (DiGraph<String, ()>, HashMap<&str, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        for file in self.forward.keys() {
            let idx = graph.add_node(file.clone());
            indices.insert(file.as_str(), idx);
        }
        for (from, to) in self.internal_edges() {
            graph.add_edge(indices[from], indices[to], ());
        }
        (graph, indices)
    }
}

fn depth_from(
    graph: &DiGraph<String, ()>,
    node: NodeIndex,
    memo: &mut HashMap<NodeIndex, u32>,
    in_progress: &mut HashSet<NodeIndex>,
) -> u32 {
    if let Some(&depth) = memo.get(&node) {
        return depth;
    }
    if !in_progress.insert(node) {
        // Back edge: cycles contribute no extra depth
        return 0;
    }
    let mut best = 0;
    for next in graph.neighbors(node) {
        best = best.max(1 + depth_from(graph, next, memo, in_progress));
    }
    in_progress.remove(&node);
    memo.insert(node, best);
    best
}

/// Dispatch local-import resolution by language and kind
fn resolve_local(
    import: &Import,
    language: Language,
    current_file: &str,
    scanned: &HashSet<String>,
) -> String {
    match (language, import.kind) {
        (Language::Python, ImportKind::Relative) => {
            resolve::resolve_python_relative(&import.source, current_file, scanned)
        }
        (Language::Rust, ImportKind::Internal) => {
            resolve::resolve_rust_internal(&import.source, current_file, scanned)
        }
        _ if looks_relative(&import.source) => {
            resolve::resolve_relative(&import.source, current_file, scanned)
        }
        _ => import.source.clone(),
    }
}

fn looks_relative(source: &str) -> bool {
    source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('/')
        || source == "."
        || source == ".."
}
