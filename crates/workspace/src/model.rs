use cortex_graph::RelationshipType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    WebFrontend,
    ApiServer,
    Library,
    Documentation,
    MobileApp,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: Priority::Medium,
            exclude: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_priority() -> Priority {
    Priority::Medium
}

/// One source tree with its own vector collection and indexing state.
/// Owned exclusively by the `Workspace` it's listed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Project {
    /// `true` iff `id` is made up only of letters, digits, and underscores.
    #[must_use]
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relationship {
    pub from_id: String,
    pub to_id: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
    pub weight: f32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultScope {
    Project,
    Dependencies,
    Workspace,
    Related,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default = "default_scope")]
    pub default_scope: DefaultScope,
    #[serde(default = "default_true")]
    pub cross_project_ranking: bool,
    #[serde(default = "default_relationship_boost")]
    pub relationship_boost: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_scope: DefaultScope::Project,
            cross_project_ranking: true,
            relationship_boost: default_relationship_boost(),
        }
    }
}

fn default_scope() -> DefaultScope {
    DefaultScope::Project
}

fn default_relationship_boost() -> f32 {
    1.5
}

/// The collection of related projects indexed together. Identified by the
/// path of its config file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Workspace {
    pub version: String,
    pub name: String,
    pub projects: Vec<Project>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub search: SearchConfig,
}
