use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelationalStoreError>;

#[derive(Error, Debug)]
pub enum RelationalStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("key not found: {0}")]
    NotFound(String),
}
