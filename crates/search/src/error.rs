use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("template validation failed: {0}")]
    InvalidTemplate(String),

    #[error("workspace error: {0}")]
    Workspace(#[from] cortex_workspace::WorkspaceError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] cortex_vector_store::VectorStoreError),

    #[error("relational store error: {0}")]
    RelationalStore(#[from] cortex_relational_store::RelationalStoreError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
