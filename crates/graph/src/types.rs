use serde::{Deserialize, Serialize};

/// Typed relationship between two projects. `Dependency` is the only type
/// whose edges must form a DAG; the others may cycle freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Imports,
    ApiClient,
    SharedDatabase,
    EventDriven,
    SemanticSimilarity,
    Dependency,
}

impl RelationshipType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::ApiClient => "api_client",
            Self::SharedDatabase => "shared_database",
            Self::EventDriven => "event_driven",
            Self::SemanticSimilarity => "semantic_similarity",
            Self::Dependency => "dependency",
        }
    }

    /// Only `Dependency` edges are required to keep the graph acyclic.
    #[must_use]
    pub const fn is_dependency(self) -> bool {
        matches!(self, Self::Dependency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectNode {
    pub project_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectEdge {
    pub relationship: RelationshipType,
    pub weight: f32,
}
