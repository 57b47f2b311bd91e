//! Framework detection and entry-point discovery
//!
//! Detection is a rule table rather than a conditional ladder: each rule
//! names a dependency pattern in one manifest kind, the project type it
//! implies, and a confidence score. Rules are evaluated in order; the
//! best-scoring match wins. Detection is best effort, never guaranteed.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::types::ScannedFile;

/// Project type classifier attached to the framework answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "frontend-spa")]
    FrontendSpa,
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "cli")]
    Cli,
    #[serde(rename = "library")]
    Library,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ProjectType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrontendSpa => "frontend-spa",
            Self::Server => "server",
            Self::Cli => "cli",
            Self::Library => "library",
            Self::Unknown => "unknown",
        }
    }
}

/// Which manifest a rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestKind {
    PackageJson,
    Requirements,
    PyProject,
    GoMod,
    CargoToml,
}

/// One detection rule
struct FrameworkRule {
    dependency: &'static str,
    manifest: ManifestKind,
    name: &'static str,
    project_type: ProjectType,
    confidence: u8,
}

/// The rule table, evaluated in order; order breaks confidence ties
const RULES: &[FrameworkRule] = &[
    // JavaScript / TypeScript
    FrameworkRule { dependency: "next", manifest: ManifestKind::PackageJson, name: "Next.js", project_type: ProjectType::FrontendSpa, confidence: 90 },
    FrameworkRule { dependency: "nuxt", manifest: ManifestKind::PackageJson, name: "Nuxt", project_type: ProjectType::FrontendSpa, confidence: 90 },
    FrameworkRule { dependency: "@nestjs/core", manifest: ManifestKind::PackageJson, name: "NestJS", project_type: ProjectType::Server, confidence: 90 },
    FrameworkRule { dependency: "react", manifest: ManifestKind::PackageJson, name: "React", project_type: ProjectType::FrontendSpa, confidence: 80 },
    FrameworkRule { dependency: "vue", manifest: ManifestKind::PackageJson, name: "Vue", project_type: ProjectType::FrontendSpa, confidence: 80 },
    FrameworkRule { dependency: "svelte", manifest: ManifestKind::PackageJson, name: "Svelte", project_type: ProjectType::FrontendSpa, confidence: 80 },
    FrameworkRule { dependency: "express", manifest: ManifestKind::PackageJson, name: "Express", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "fastify", manifest: ManifestKind::PackageJson, name: "Fastify", project_type: ProjectType::Server, confidence: 85 },
    // Python
    FrameworkRule { dependency: "django", manifest: ManifestKind::Requirements, name: "Django", project_type: ProjectType::Server, confidence: 90 },
    FrameworkRule { dependency: "django", manifest: ManifestKind::PyProject, name: "Django", project_type: ProjectType::Server, confidence: 90 },
    FrameworkRule { dependency: "fastapi", manifest: ManifestKind::Requirements, name: "FastAPI", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "fastapi", manifest: ManifestKind::PyProject, name: "FastAPI", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "flask", manifest: ManifestKind::Requirements, name: "Flask", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "flask", manifest: ManifestKind::PyProject, name: "Flask", project_type: ProjectType::Server, confidence: 85 },
    // Go
    FrameworkRule { dependency: "github.com/gin-gonic/gin", manifest: ManifestKind::GoMod, name: "Gin", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "github.com/labstack/echo", manifest: ManifestKind::GoMod, name: "Echo", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "github.com/go-chi/chi", manifest: ManifestKind::GoMod, name: "Chi", project_type: ProjectType::Server, confidence: 85 },
    // Rust
    FrameworkRule { dependency: "axum", manifest: ManifestKind::CargoToml, name: "Axum", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "rocket", manifest: ManifestKind::CargoToml, name: "Rocket", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "actix-web", manifest: ManifestKind::CargoToml, name: "Actix Web", project_type: ProjectType::Server, confidence: 85 },
    FrameworkRule { dependency: "clap", manifest: ManifestKind::CargoToml, name: "Clap CLI", project_type: ProjectType::Cli, confidence: 60 },
];

/// A detected framework with its type classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkDetection {
    /// Framework display name
    pub name: String,
    /// Heuristic confidence (0-100)
    pub confidence: u8,
    /// Project type implied by the winning rule
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

/// Manifests found at the project root, with their dependency text
#[derive(Debug, Default)]
pub struct ManifestSet {
    package_json_deps: Vec<String>,
    requirements: String,
    pyproject: String,
    go_mod: String,
    cargo_deps: Vec<String>,
    package_json: Option<serde_json::Value>,
    pyproject_doc: Option<toml::Value>,
    cargo_doc: Option<toml::Value>,
}

impl ManifestSet {
    /// Read whatever manifests exist under the root
    pub fn read(root: &Path) -> Self {
        let mut set = Self::default();

        if let Ok(text) = std::fs::read_to_string(root.join("package.json")) {
            if let Ok(doc) = serde_json::from_str::<serde_json::Value>(&text) {
                for section in ["dependencies", "devDependencies"] {
                    if let Some(deps) = doc.get(section).and_then(|d| d.as_object()) {
                        set.package_json_deps.extend(deps.keys().cloned());
                    }
                }
                set.package_json = Some(doc);
            }
        }
        if let Ok(text) = std::fs::read_to_string(root.join("requirements.txt")) {
            set.requirements = text.to_lowercase();
        }
        if let Ok(text) = std::fs::read_to_string(root.join("pyproject.toml")) {
            set.pyproject = text.to_lowercase();
            set.pyproject_doc = toml::from_str(&text).ok();
        }
        if let Ok(text) = std::fs::read_to_string(root.join("go.mod")) {
            set.go_mod = text;
        }
        if let Ok(text) = std::fs::read_to_string(root.join("Cargo.toml")) {
            if let Ok(doc) = toml::from_str::<toml::Value>(&text) {
                if let Some(deps) = doc.get("dependencies").and_then(|d| d.as_table()) {
                    set.cargo_deps.extend(deps.keys().cloned());
                }
                set.cargo_doc = Some(doc);
            }
        }

        set
    }

    /// Every external dependency name the manifests declare, deduplicated
    pub fn dependency_names(&self) -> Vec<String> {
        fn package_name(spec: &str) -> Option<String> {
            let name: String = spec
                .trim()
                .chars()
                .take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
                .collect();
            (!name.is_empty()).then_some(name)
        }

        let mut deps = self.package_json_deps.clone();
        deps.extend(self.cargo_deps.iter().cloned());
        deps.extend(self.requirements.lines().filter_map(package_name));
        if let Some(doc) = &self.pyproject_doc {
            if let Some(list) = doc
                .get("project")
                .and_then(|p| p.get("dependencies"))
                .and_then(|d| d.as_array())
            {
                deps.extend(
                    list.iter()
                        .filter_map(|v| v.as_str())
                        .filter_map(package_name)
                        .map(|d| d.to_lowercase()),
                );
            }
        }
        for line in self.go_mod.lines() {
            let line = line.trim();
            if let Some(module) = line.strip_prefix("require ") {
                if let Some(path) = module.split_whitespace().next() {
                    deps.push(path.to_owned());
                }
            } else if let Some(path) = line.split_whitespace().next() {
                if path.contains('.') && path.contains('/') {
                    deps.push(path.to_owned());
                }
            }
        }

        deps.sort();
        deps.dedup();
        deps
    }

    fn matches(&self, rule: &FrameworkRule) -> bool {
        match rule.manifest {
            ManifestKind::PackageJson => {
                self.package_json_deps.iter().any(|d| d == rule.dependency)
            }
            ManifestKind::Requirements => self
                .requirements
                .lines()
                .any(|l| l.trim_start().starts_with(rule.dependency)),
            ManifestKind::PyProject => self.pyproject.contains(rule.dependency),
            ManifestKind::GoMod => self.go_mod.contains(rule.dependency),
            ManifestKind::CargoToml => self.cargo_deps.iter().any(|d| d == rule.dependency),
        }
    }
}

/// Best-scoring framework across every rule, if any matches
pub fn detect_framework(manifests: &ManifestSet) -> Option<FrameworkDetection> {
    let mut best: Option<&FrameworkRule> = None;
    for rule in RULES {
        if !manifests.matches(rule) {
            continue;
        }
        if best.map(|b| rule.confidence > b.confidence).unwrap_or(true) {
            best = Some(rule);
        }
    }
    best.map(|rule| FrameworkDetection {
        name: rule.name.to_owned(),
        confidence: rule.confidence,
        project_type: rule.project_type,
    })
}

/// Project type when no framework rule matched
pub fn fallback_project_type(files: &[ScannedFile]) -> ProjectType {
    let has = |rel: &str| files.iter().any(|f| f.relative_path == rel);
    if has("src/main.rs") || has("main.go") || files.iter().any(|f| f.relative_path.starts_with("cmd/")) {
        return ProjectType::Cli;
    }
    if has("src/lib.rs") || has("setup.py") {
        return ProjectType::Library;
    }
    ProjectType::Unknown
}

/// Entry points: top-level `index.*` / `main.*` plus whatever the manifests
/// declare (`package.json` main/bin, `pyproject.toml` scripts, `Cargo.toml`
/// bins, the go module root)
pub fn entry_points(files: &[ScannedFile], manifests: &ManifestSet) -> HashSet<String> {
    let scanned: HashSet<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
    let mut entries = HashSet::new();

    for file in files {
        let stem = file.file_name().split('.').next().unwrap_or("");
        let top_level = !file.relative_path.contains('/')
            || file.parent_dir() == "src";
        if top_level && (stem == "index" || stem == "main") {
            entries.insert(file.relative_path.clone());
        }
    }

    if let Some(doc) = &manifests.package_json {
        if let Some(main) = doc.get("main").and_then(|m| m.as_str()) {
            insert_if_scanned(&mut entries, &scanned, main);
        }
        match doc.get("bin") {
            Some(serde_json::Value::String(bin)) => {
                insert_if_scanned(&mut entries, &scanned, bin);
            }
            Some(serde_json::Value::Object(bins)) => {
                for bin in bins.values().filter_map(|b| b.as_str()) {
                    insert_if_scanned(&mut entries, &scanned, bin);
                }
            }
            _ => {}
        }
    }

    if let Some(doc) = &manifests.pyproject_doc {
        for table in [
            doc.get("project").and_then(|p| p.get("scripts")),
            doc.get("tool")
                .and_then(|t| t.get("poetry"))
                .and_then(|p| p.get("scripts")),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(scripts) = table.as_table() {
                for target in scripts.values().filter_map(|v| v.as_str()) {
                    // "pkg.module:function" -> pkg/module.py
                    let module = target.split(':').next().unwrap_or(target);
                    let path = format!("{}.py", module.replace('.', "/"));
                    insert_if_scanned(&mut entries, &scanned, &path);
                }
            }
        }
    }

    if let Some(doc) = &manifests.cargo_doc {
        if let Some(bins) = doc.get("bin").and_then(|b| b.as_array()) {
            for bin in bins {
                if let Some(path) = bin.get("path").and_then(|p| p.as_str()) {
                    insert_if_scanned(&mut entries, &scanned, path);
                }
            }
        }
        if scanned.contains("src/main.rs") {
            entries.insert("src/main.rs".to_owned());
        }
        if scanned.contains("src/lib.rs") {
            entries.insert("src/lib.rs".to_owned());
        }
    }

    if !manifests.go_mod.is_empty() && scanned.contains("main.go") {
        entries.insert("main.go".to_owned());
    }

    entries
}

fn insert_if_scanned(entries: &mut HashSet<String>, scanned: &HashSet<&str>, path: &str) {
    let normalized = path.trim_start_matches("./");
    if scanned.contains(normalized) {
        entries.insert(normalized.to_owned());
    }
}
