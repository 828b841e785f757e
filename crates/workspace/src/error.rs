use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Closed set of ways a workspace config can fail to load or validate
/// (spec §4.1).
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("relationship references unknown project id: {0}")]
    UnknownIdReference(String),

    #[error("duplicate project id: {0}")]
    DuplicateId(String),

    #[error("self-referential relationship on project: {0}")]
    SelfReferentialRelationship(String),

    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("project path does not exist: {0}")]
    NonexistentProjectPath(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectAlreadyExists(String),

    #[error("indexer is busy: {0}")]
    Busy(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("indexer error: {0}")]
    Indexer(#[from] cortex_indexer::IndexerError),

    #[error("graph error: {0}")]
    Graph(#[from] cortex_graph::GraphError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] cortex_vector_store::VectorStoreError),

    #[error("relational store error: {0}")]
    RelationalStore(#[from] cortex_relational_store::RelationalStoreError),
}
