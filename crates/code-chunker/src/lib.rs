//! Structural, tree-sitter-backed chunking of source files into the units
//! the rest of the cortex pipeline indexes and embeds.

mod chunk;
mod chunker;
mod contextual_imports;
mod error;
mod language;

pub use chunk::{ChunkMetadata, ChunkType, CodeChunk};
pub use chunker::{Chunker, ChunkerConfig, ChunkingStrategy, OverlapStrategy};
pub use contextual_imports::{
    extract_identifiers_from_import, extract_imports_from_lines, filter_relevant_imports,
};
pub use error::{ChunkerError, Result};
pub use language::Language;
