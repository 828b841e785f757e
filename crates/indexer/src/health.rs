use serde::{Deserialize, Serialize};

/// Self-diagnostic snapshot folded into `workspace.status` responses.
/// Surfaces the same conditions that would otherwise only show up as
/// domain error codes `1004`/`1005`/`1006` once a query actually fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub embedding_backend_reachable: bool,
    pub embedding_model_id: String,
    pub vector_store_dimension: Option<usize>,
    pub last_error: Option<String>,
}

impl HealthSnapshot {
    #[must_use]
    pub fn healthy(embedding_model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            embedding_backend_reachable: true,
            embedding_model_id: embedding_model_id.into(),
            vector_store_dimension: Some(dimension),
            last_error: None,
        }
    }

    #[must_use]
    pub fn unreachable(embedding_model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            embedding_backend_reachable: false,
            embedding_model_id: embedding_model_id.into(),
            vector_store_dimension: None,
            last_error: Some(reason.into()),
        }
    }
}
