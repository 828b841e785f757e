//! # Cortex Graph
//!
//! Directed, typed-edge relationship graph over the projects in a
//! workspace: imports, api_client, shared_database, event_driven,
//! semantic_similarity, and dependency edges.
//!
//! ## Architecture
//!
//! ```text
//! WorkspaceConfig
//!     │
//!     ├──> RelationshipGraph (petgraph)
//!     │      ├─ Nodes: projects
//!     │      └─ Edges: typed, weighted relationships
//!     │
//!     └──> queries
//!            ├─ shortest_path / all_simple_paths
//!            ├─ topological_order (dependency edges only)
//!            ├─ find_dependency_cycle
//!            └─ reachable (cached)
//! ```

mod error;
mod project_graph;
mod types;

pub use error::{GraphError, Result};
pub use project_graph::{GraphDocument, GraphDocumentEdge, RelationshipGraph};
pub use types::{ProjectEdge, ProjectNode, RelationshipType};
