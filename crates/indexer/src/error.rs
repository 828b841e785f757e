use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] cortex_code_chunker::ChunkerError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] cortex_vector_store::VectorStoreError),

    #[error("Relational store error: {0}")]
    RelationalStoreError(#[from] cortex_relational_store::RelationalStoreError),

    #[error("Embedding backend error: {0}")]
    EmbeddingError(String),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("indexer is busy: an index() call is already in progress for this project")]
    Busy,

    #[error("indexer has not been initialized")]
    NotInitialized,

    #[error("index budget exceeded")]
    BudgetExceeded,

    #[error("{0}")]
    Other(String),
}
