use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// States of the project indexer state machine (spec §4.11).
///
/// `uninitialized -> initializing -> ready <-> indexing`, with `failed`
/// reachable from `initializing` and `indexing`. `initialize()` is the only
/// transition permitted from `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerStatus {
    Uninitialized,
    Initializing,
    Ready,
    Indexing,
    Failed,
}

/// Per-project indexing state, persisted in `cortex-relational-store`'s
/// `indexing_state` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingState {
    pub status: IndexerStatus,
    pub files_indexed: u64,
    pub errors: Vec<String>,
    pub last_full_scan_ts: Option<i64>,
    pub per_file: HashMap<String, String>,
}

impl Default for IndexingState {
    fn default() -> Self {
        Self {
            status: IndexerStatus::Uninitialized,
            files_indexed: 0,
            errors: Vec::new(),
            last_full_scan_ts: None,
            per_file: HashMap::new(),
        }
    }
}

/// Outcome of a single `index()` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub chunks_indexed: u64,
    pub errors: Vec<String>,
}
