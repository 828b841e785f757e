//! Auto-discovery of projects under a root directory (spec §4.3): walks the
//! tree looking for manifest files, scores a project type and confidence
//! per directory, and emits a workspace-config draft.

use crate::model::{IndexingConfig, Project, ProjectType, Relationship, SearchConfig, Workspace};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One manifest file this engine knows how to read, and the languages/
/// project type it implies on its own (before dependency-scanning can
/// refine the guess).
struct MarkerRule {
    file_name: &'static str,
    languages: &'static [&'static str],
    default_type: ProjectType,
}

static MARKERS: Lazy<Vec<MarkerRule>> = Lazy::new(|| {
    vec![
        MarkerRule { file_name: "Cargo.toml", languages: &["rust"], default_type: ProjectType::Library },
        MarkerRule { file_name: "package.json", languages: &["javascript", "typescript"], default_type: ProjectType::WebFrontend },
        MarkerRule { file_name: "pyproject.toml", languages: &["python"], default_type: ProjectType::Library },
        MarkerRule { file_name: "setup.py", languages: &["python"], default_type: ProjectType::Library },
        MarkerRule { file_name: "requirements.txt", languages: &["python"], default_type: ProjectType::Application },
        MarkerRule { file_name: "go.mod", languages: &["go"], default_type: ProjectType::ApiServer },
        MarkerRule { file_name: "pom.xml", languages: &["java"], default_type: ProjectType::ApiServer },
        MarkerRule { file_name: "build.gradle", languages: &["java", "kotlin"], default_type: ProjectType::ApiServer },
    ]
});

/// HTTP-server-framework dependency names that, when present in a
/// manifest, upgrade a guess from `library`/`application` to `api_server`.
const API_SERVER_HINTS: &[&str] = &["axum", "actix-web", "express", "fastapi", "flask", "gin", "echo"];

/// A discovered project before it's accepted into a workspace, with the
/// confidence the heuristics have in the guessed type.
#[derive(Debug, Clone)]
pub struct DiscoveredProject {
    pub id: String,
    pub path: PathBuf,
    pub project_type: ProjectType,
    pub languages: Vec<String>,
    pub confidence: f32,
    pub manifest_dependencies: Vec<String>,
    /// Other discovered projects' ids whose directory name matched one of
    /// this project's manifest dependency tokens.
    pub inferred_dependencies: Vec<String>,
}

/// Walks `root` to `max_depth` looking for manifest files, infers a type,
/// language set, and confidence for each, and infers intra-workspace
/// dependencies by matching manifest dependency names against other
/// discovered project directory names.
pub fn discover(root: &Path, max_depth: Option<usize>) -> Vec<DiscoveredProject> {
    let max_depth = max_depth.unwrap_or(4);
    let mut found = Vec::new();
    walk(root, root, 0, max_depth, &mut found);
    infer_cross_project_dependencies(&mut found);
    found
}

fn walk(root: &Path, dir: &Path, depth: usize, max_depth: usize, found: &mut Vec<DiscoveredProject>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };

    let mut matched_rules = Vec::new();
    for marker in MARKERS.iter() {
        if dir.join(marker.file_name).is_file() {
            matched_rules.push(marker);
        }
    }

    if !matched_rules.is_empty() {
        found.push(build_discovered(root, dir, &matched_rules));
        return; // a manifest marks a project boundary; don't descend into it.
    }

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "node_modules" || name == "target" || name == "vendor" {
                continue;
            }
            walk(root, &path, depth + 1, max_depth, found);
        }
    }
}

fn build_discovered(root: &Path, dir: &Path, matched: &[&MarkerRule]) -> DiscoveredProject {
    let languages: Vec<String> = matched
        .iter()
        .flat_map(|m| m.languages.iter().map(|s| s.to_string()))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let manifest_text = matched
        .iter()
        .filter_map(|m| std::fs::read_to_string(dir.join(m.file_name)).ok())
        .collect::<Vec<_>>()
        .join("\n");

    let is_api_server = API_SERVER_HINTS.iter().any(|hint| manifest_text.contains(hint));
    let has_web_build_config = dir.join("vite.config.ts").is_file()
        || dir.join("vite.config.js").is_file()
        || dir.join("webpack.config.js").is_file()
        || dir.join("next.config.js").is_file();

    let project_type = if has_web_build_config {
        ProjectType::WebFrontend
    } else if is_api_server {
        ProjectType::ApiServer
    } else {
        matched[0].default_type
    };

    // Confidence grows with how many independent signals agree, capped at 1.0.
    let mut confidence = 0.55_f32;
    if matched.len() > 1 {
        confidence += 0.1;
    }
    if is_api_server || has_web_build_config {
        confidence += 0.25;
    }
    confidence = confidence.min(1.0);

    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let id = relative
        .to_str()
        .unwrap_or("project")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();
    let id = if id.is_empty() { "root".to_string() } else { id };

    let manifest_dependencies = extract_dependency_names(&manifest_text);

    DiscoveredProject {
        id,
        path: dir.to_path_buf(),
        project_type,
        languages,
        confidence,
        manifest_dependencies,
        inferred_dependencies: Vec::new(),
    }
}

/// Crude cross-manifest dependency-name extraction: pulls bareword and
/// quoted tokens that look like package names out of a manifest's text.
/// Good enough to catch `"some-lib"` style entries without a per-language
/// manifest parser.
fn extract_dependency_names(manifest_text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in manifest_text.lines() {
        let trimmed = line.trim();
        if let Some(eq) = trimmed.find('=') {
            let key = trimmed[..eq].trim().trim_matches('"');
            if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                names.push(key.to_string());
            }
        }
    }
    names
}

fn infer_cross_project_dependencies(found: &mut [DiscoveredProject]) {
    let names_by_id: HashMap<String, String> = found
        .iter()
        .filter_map(|p| p.path.file_name().map(|n| (n.to_string_lossy().to_string(), p.id.clone())))
        .collect();

    let deps: Vec<(usize, String)> = found
        .iter()
        .enumerate()
        .flat_map(|(idx, p)| {
            p.manifest_dependencies
                .iter()
                .filter_map(|dep| names_by_id.get(dep).filter(|&target| target != &p.id).cloned())
                .map(move |target| (idx, target))
        })
        .collect();

    for (idx, target) in deps {
        found[idx].inferred_dependencies.push(target);
    }
}

/// Renders discovered projects into a workspace config draft valid against
/// the workspace schema (spec §4.1), with no relationships populated; the
/// caller decides whether to accept inferred dependencies as relationships.
pub fn to_workspace_draft(name: &str, discovered: &[DiscoveredProject]) -> Workspace {
    let projects = discovered
        .iter()
        .map(|d| Project {
            id: d.id.clone(),
            name: d.id.clone(),
            path: d.path.clone(),
            project_type: d.project_type,
            languages: d.languages.clone(),
            dependencies: d.inferred_dependencies.clone(),
            indexing: IndexingConfig::default(),
            metadata: serde_json::Map::new(),
        })
        .collect();

    Workspace {
        version: "1.0.0".to_string(),
        name: name.to_string(),
        projects,
        relationships: Vec::<Relationship>::new(),
        search: SearchConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_a_cargo_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        let found = discover(dir.path(), None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].languages, vec!["rust".to_string()]);
    }

    #[test]
    fn web_frontend_marker_wins_over_package_json_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join("vite.config.ts"), "").unwrap();
        let found = discover(dir.path(), None);
        assert_eq!(found[0].project_type, ProjectType::WebFrontend);
    }

    #[test]
    fn nested_projects_are_each_found_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("services/api")).unwrap();
        std::fs::create_dir_all(dir.path().join("apps/web")).unwrap();
        std::fs::write(dir.path().join("services/api/go.mod"), "module api\n").unwrap();
        std::fs::write(dir.path().join("apps/web/package.json"), "{}").unwrap();
        let found = discover(dir.path(), None);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn draft_is_schema_valid_shape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        let found = discover(dir.path(), None);
        let draft = to_workspace_draft("discovered", &found);
        assert_eq!(draft.projects.len(), 1);
        assert!(draft.relationships.is_empty());
    }
}
