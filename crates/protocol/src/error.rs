use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC error codes the engine can return. The negative range is
/// standard JSON-RPC; 1001-1006 are cortex-specific domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ValidationFailed,
    ProjectNotFound,
    IndexingInProgress,
    DimensionMismatch,
    EmbeddingBackendUnavailable,
    StorageUnavailable,
}

impl ErrorCode {
    pub const fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ValidationFailed => 1001,
            Self::ProjectNotFound => 1002,
            Self::IndexingInProgress => 1003,
            Self::DimensionMismatch => 1004,
            Self::EmbeddingBackendUnavailable => 1005,
            Self::StorageUnavailable => 1006,
        }
    }
}

#[derive(Debug, Error, Serialize, Deserialize, Clone)]
#[error("{message} (code {code})")]
pub struct ProtocolError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProtocolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
