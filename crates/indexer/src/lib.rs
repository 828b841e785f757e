//! # Cortex Indexer
//!
//! Project indexing for semantic code search: scan -> chunk -> embed ->
//! upsert, plus the incremental-state and watermark bookkeeping that lets
//! re-indexing skip unchanged files.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware, exclude globs, deny list)
//!     │      └─> FileRecord[]
//!     │
//!     ├──> Chunker (tree-sitter structural, falls back to sliding window)
//!     │      └─> CodeChunk[]
//!     │
//!     └──> Embedding Backend -> Vector Store (batched upsert)
//!            └─> Searchable collection
//! ```

mod error;
mod health;
mod index_state;
mod indexer;
mod scanner;
mod state;
mod watcher;
mod watermark_io;

pub use error::{IndexerError, Result};
pub use health::HealthSnapshot;
pub use index_state::{
    assess_staleness, IndexSnapshot, IndexState, ReindexAttempt, ReindexResult, StaleAssessment,
    StaleReason, ToolMeta, Watermark, INDEX_STATE_SCHEMA_VERSION,
};
pub use indexer::ProjectIndexer;
pub use scanner::{FileRecord, FileScanner};
pub use state::{IndexSummary, IndexerStatus, IndexingState};
pub use watcher::ProjectWatcher;
pub use watermark_io::{
    compute_project_watermark, index_watermark_path_for_store, read_index_watermark,
    write_index_watermark, PersistedIndexWatermark,
};
