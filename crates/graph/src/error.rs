use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("project not found in graph: {0}")]
    ProjectNotFound(String),

    #[error("relationship is self-referential: {0}")]
    SelfReferential(String),

    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
