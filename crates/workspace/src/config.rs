use crate::error::{Result, WorkspaceError};
use crate::model::{Project, Relationship, Workspace};
use cortex_graph::{RelationshipType, RelationshipGraph};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// A loaded workspace config plus the path it was loaded from, since a
/// `Workspace` is identified by its config file's location (spec §3).
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub workspace: Workspace,
    pub path: PathBuf,
}

impl WorkspaceConfig {
    /// Loads a JSON workspace file, resolves relative project paths against
    /// the config file's directory, and validates. `check_paths` controls
    /// whether nonexistent project paths are treated as a validation error
    /// (spec §4.1: "optional, controlled by a flag").
    pub async fn load(path: impl AsRef<Path>, check_paths: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await?;
        let mut workspace: Workspace = serde_json::from_slice(&bytes)?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        for project in &mut workspace.projects {
            if project.path.is_relative() {
                project.path = base_dir.join(&project.path);
            }
        }

        let config = Self { workspace, path };
        config.validate(check_paths)?;
        Ok(config)
    }

    /// Writes the workspace config as UTF-8, LF-terminated JSON with
    /// two-space indentation (spec §6).
    pub async fn save(&self) -> Result<()> {
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut buf,
            serde_json::ser::PrettyFormatter::with_indent(b"  "),
        );
        serde::Serialize::serialize(&self.workspace, &mut serializer)?;
        buf.push(b'\n');
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, buf).await?;
        Ok(())
    }

    pub fn validate(&self, check_paths: bool) -> Result<()> {
        validate_version(&self.workspace.version)?;

        let mut seen_ids = HashSet::new();
        for project in &self.workspace.projects {
            if !Project::is_valid_id(&project.id) {
                return Err(WorkspaceError::SchemaViolation(format!(
                    "project id `{}` must contain only letters, digits, and underscores",
                    project.id
                )));
            }
            if !seen_ids.insert(project.id.clone()) {
                return Err(WorkspaceError::DuplicateId(project.id.clone()));
            }
            if check_paths && !project.path.exists() {
                return Err(WorkspaceError::NonexistentProjectPath(
                    project.path.display().to_string(),
                ));
            }
            for dep_id in &project.dependencies {
                if !seen_ids.contains(dep_id) && !self.workspace.projects.iter().any(|p| &p.id == dep_id) {
                    return Err(WorkspaceError::UnknownIdReference(dep_id.clone()));
                }
            }
        }

        for relationship in &self.workspace.relationships {
            if relationship.from_id == relationship.to_id {
                return Err(WorkspaceError::SelfReferentialRelationship(
                    relationship.from_id.clone(),
                ));
            }
            if !seen_ids.contains(&relationship.from_id) {
                return Err(WorkspaceError::UnknownIdReference(relationship.from_id.clone()));
            }
            if !seen_ids.contains(&relationship.to_id) {
                return Err(WorkspaceError::UnknownIdReference(relationship.to_id.clone()));
            }
        }

        self.build_graph().map_err(|err| match err {
            cortex_graph::GraphError::CyclicDependency(path) => WorkspaceError::CyclicDependency { path },
            cortex_graph::GraphError::SelfReferential(id) => {
                WorkspaceError::SelfReferentialRelationship(id)
            }
            other => WorkspaceError::SchemaViolation(other.to_string()),
        })?;

        Ok(())
    }

    /// Builds the relationship graph implied by this config: every
    /// project's `dependencies` list becomes a `Dependency` edge, and every
    /// entry in `relationships` becomes an edge of its declared type.
    pub fn build_graph(&self) -> cortex_graph::Result<RelationshipGraph> {
        let mut graph = RelationshipGraph::new();
        for project in &self.workspace.projects {
            graph.add_node(project.id.clone());
        }
        for project in &self.workspace.projects {
            for dep_id in &project.dependencies {
                graph.add_edge(&project.id, dep_id, RelationshipType::Dependency, 1.0)?;
            }
        }
        for relationship in &self.workspace.relationships {
            if relationship.relationship_type == RelationshipType::Dependency
                && self
                    .workspace
                    .projects
                    .iter()
                    .find(|p| p.id == relationship.from_id)
                    .map(|p| p.dependencies.contains(&relationship.to_id))
                    .unwrap_or(false)
            {
                continue; // already added from Project.dependencies
            }
            graph.add_edge(
                &relationship.from_id,
                &relationship.to_id,
                relationship.relationship_type,
                relationship.weight,
            )?;
        }
        Ok(graph)
    }

    #[must_use]
    pub fn get_project(&self, id: &str) -> Option<&Project> {
        self.workspace.projects.iter().find(|p| p.id == id)
    }

    /// BFS over `dependencies` edges. `transitive = false` returns only the
    /// project's direct dependencies.
    #[must_use]
    pub fn dependencies(&self, id: &str, transitive: bool) -> Vec<String> {
        let Some(start) = self.get_project(id) else {
            return Vec::new();
        };
        if !transitive {
            return start.dependencies.clone();
        }

        let mut visited = HashSet::new();
        let mut queue: VecDeque<String> = start.dependencies.iter().cloned().collect();
        let mut out = Vec::new();
        while let Some(dep_id) = queue.pop_front() {
            if !visited.insert(dep_id.clone()) {
                continue;
            }
            out.push(dep_id.clone());
            if let Some(dep_project) = self.get_project(&dep_id) {
                for next in &dep_project.dependencies {
                    if !visited.contains(next) {
                        queue.push_back(next.clone());
                    }
                }
            }
        }
        out
    }

    /// Projects whose `dependencies` list includes `id`.
    #[must_use]
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.workspace
            .projects
            .iter()
            .filter(|p| p.dependencies.iter().any(|d| d == id))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Relationships optionally filtered by endpoint project id and/or type.
    #[must_use]
    pub fn relationships(&self, id: Option<&str>, kind: Option<RelationshipType>) -> Vec<&Relationship> {
        self.workspace
            .relationships
            .iter()
            .filter(|r| id.map(|id| r.from_id == id || r.to_id == id).unwrap_or(true))
            .filter(|r| kind.map(|k| r.relationship_type == k).unwrap_or(true))
            .collect()
    }
}

fn validate_version(version: &str) -> Result<()> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return Err(WorkspaceError::SchemaViolation(format!(
            "version `{version}` does not match MAJOR.MINOR.PATCH"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IndexingConfig, ProjectType};

    fn project(id: &str, deps: &[&str]) -> Project {
        Project {
            id: id.to_string(),
            name: id.to_string(),
            path: PathBuf::from(id),
            project_type: ProjectType::Application,
            languages: vec![],
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            indexing: IndexingConfig::default(),
            metadata: serde_json::Map::new(),
        }
    }

    fn workspace(projects: Vec<Project>) -> WorkspaceConfig {
        WorkspaceConfig {
            workspace: Workspace {
                version: "2.0.0".to_string(),
                name: "W".to_string(),
                projects,
                relationships: vec![],
                search: crate::model::SearchConfig::default(),
            },
            path: PathBuf::from("/tmp/.context-workspace.json"),
        }
    }

    #[test]
    fn empty_workspace_validates() {
        let config = workspace(vec![]);
        config.validate(false).unwrap();
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let config = workspace(vec![project("a", &[]), project("a", &[])]);
        let err = config.validate(false).unwrap_err();
        assert!(matches!(err, WorkspaceError::DuplicateId(_)));
    }

    #[test]
    fn cyclic_dependency_reports_the_cycle() {
        let config = workspace(vec![project("a", &["b"]), project("b", &["c"]), project("c", &["a"])]);
        let err = config.validate(false).unwrap_err();
        match err {
            WorkspaceError::CyclicDependency { path } => {
                assert!(path.join(" -> ").contains("a"));
                assert!(path.join(" -> ").contains("b"));
                assert!(path.join(" -> ").contains("c"));
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn transitive_dependencies_follow_the_chain() {
        let config = workspace(vec![project("a", &["b"]), project("b", &["c"]), project("c", &[])]);
        let mut deps = config.dependencies("a", true);
        deps.sort();
        assert_eq!(deps, vec!["b", "c"]);
    }

    #[test]
    fn dependents_reverses_the_dependency_edge() {
        let config = workspace(vec![project("a", &["b"]), project("c", &["b"]), project("b", &[])]);
        let mut dependents = config.dependents("b");
        dependents.sort();
        assert_eq!(dependents, vec!["a", "c"]);
    }

    #[test]
    fn unknown_dependency_reference_is_rejected() {
        let config = workspace(vec![project("a", &["ghost"])]);
        let err = config.validate(false).unwrap_err();
        assert!(matches!(err, WorkspaceError::UnknownIdReference(_)));
    }

    #[test]
    fn malformed_version_is_rejected() {
        let mut config = workspace(vec![]);
        config.workspace.version = "2.0".to_string();
        let err = config.validate(false).unwrap_err();
        assert!(matches!(err, WorkspaceError::SchemaViolation(_)));
    }
}
