//! Vector storage, embedding backends, and the templates that turn code
//! chunks and graph nodes into embeddable text for the cortex engine.

mod embedding;
mod error;
#[cfg(feature = "local-embeddings")]
mod ort_backend;
mod store;
mod templates;

pub use embedding::{EmbeddingBackend, HashingEmbeddingBackend};
pub use error::{Result, VectorStoreError};
#[cfg(feature = "local-embeddings")]
pub use ort_backend::OrtEmbeddingBackend;
pub use store::{collection_name, LocalVectorStore, SearchFilter, VectorEntry, VectorPayload, VectorStore};
pub use templates::{
    DocumentKind, DocumentTemplates, EmbeddingTemplates, GraphNodeTemplates, QueryKind, QueryTemplates,
    EMBEDDING_TEMPLATES_SCHEMA_VERSION,
};

// Chunk types live in `cortex-code-chunker`; re-exported here so callers that
// only depend on this crate for the embedding pipeline don't need a direct
// dependency on the chunker crate as well.
pub use cortex_code_chunker::{ChunkMetadata, ChunkType, CodeChunk};
