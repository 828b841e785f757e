use crate::language::Language;
use serde::{Deserialize, Serialize};

/// Structural category of a chunk, when the source AST exposes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Method,
    Struct,
    Enum,
    Trait,
    Impl,
    Class,
    Module,
    Block,
}

impl ChunkType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Impl => "impl",
            Self::Class => "class",
            Self::Module => "module",
            Self::Block => "block",
        }
    }
}

/// Metadata attached to a chunk, consumed by embedding templates and the ranker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkMetadata {
    pub file_path: String,
    pub language: Option<Language>,
    pub start_line: usize,
    pub end_line: usize,
    pub chunk_type: Option<ChunkType>,
    pub symbol_name: Option<String>,
    pub parent_scope: Option<String>,
    pub qualified_name: Option<String>,
    pub documentation: Option<String>,
    #[serde(default)]
    pub context_imports: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tags inherited from a bundling/grouping pass upstream of the chunker
    /// (e.g. "api-surface", "migration"); populated by callers, not derived here.
    #[serde(default)]
    pub bundle_tags: Vec<String>,
    /// Paths of other files this chunk is known to relate to (same symbol
    /// across a rename, a test file for this module); populated by callers.
    #[serde(default)]
    pub related_paths: Vec<String>,
}

/// A contiguous slice of source code plus the metadata describing where it
/// came from and what symbol (if any) it represents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl CodeChunk {
    /// Derive a stable chunk id from its location and content so that
    /// re-chunking identical source reproduces identical ids.
    pub fn derive_id(file_path: &str, start_line: usize, end_line: usize, content: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(file_path.as_bytes());
        hasher.update(b"\0");
        hasher.update(start_line.to_le_bytes().as_slice());
        hasher.update(end_line.to_le_bytes().as_slice());
        hasher.update(content.as_bytes());
        hasher.finalize().to_hex()[..32].to_string()
    }
}
