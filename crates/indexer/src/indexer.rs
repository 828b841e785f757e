use crate::error::{IndexerError, Result};
use crate::health::HealthSnapshot;
use crate::scanner::{FileRecord, FileScanner};
use crate::state::{IndexSummary, IndexerStatus, IndexingState};
use crate::watcher::ProjectWatcher;
use cortex_code_chunker::{Chunker, ChunkerConfig, CodeChunk};
use cortex_relational_store::{RelationalStore, Table};
use cortex_vector_store::{
    collection_name, EmbeddingBackend, SearchFilter, VectorEntry, VectorPayload, VectorStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, Semaphore};

/// Upserts flush once this many chunks have accumulated, bounding how much
/// embedded-but-unpersisted work can pile up before a batch hits the store.
const UPSERT_BATCH_SIZE: usize = 64;

/// Per-file chunk+embed work is spawned in bounded waves of this size, the
/// indexer's share of the workspace-wide embed/upsert concurrency cap.
const DEFAULT_CONCURRENCY: usize = 8;

/// Orchestrates scan -> chunk -> embed -> upsert for a single project, and
/// owns its `IndexingState` (spec §4.5, §4.11).
pub struct ProjectIndexer {
    project_id: String,
    root: PathBuf,
    exclude: Vec<String>,
    chunker: Chunker,
    vector_store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingBackend>,
    relational: Arc<dyn RelationalStore>,
    concurrency: Arc<Semaphore>,
    status: RwLock<IndexerStatus>,
    run_lock: Mutex<()>,
    watcher: Mutex<Option<ProjectWatcher>>,
}

impl ProjectIndexer {
    pub fn new(
        project_id: impl Into<String>,
        root: impl Into<PathBuf>,
        exclude: Vec<String>,
        vector_store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingBackend>,
        relational: Arc<dyn RelationalStore>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            root: root.into(),
            exclude,
            chunker: Chunker::new(ChunkerConfig::for_embeddings()),
            vector_store,
            embedding,
            relational,
            concurrency: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            status: RwLock::new(IndexerStatus::Uninitialized),
            run_lock: Mutex::new(()),
            watcher: Mutex::new(None),
        }
    }

    /// Starts a debounced file watcher that calls `index()` on change.
    /// Requires an `Arc` handle since the watcher task outlives this call.
    pub async fn start_monitoring(self: &Arc<Self>) -> Result<()> {
        let mut guard = self.watcher.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let watcher = ProjectWatcher::start(Arc::clone(self))?;
        *guard = Some(watcher);
        Ok(())
    }

    pub async fn stop_monitoring(&self) {
        if let Some(watcher) = self.watcher.lock().await.take() {
            watcher.stop().await;
        }
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Loads or creates the project's vector collection and verifies its
    /// dimension matches the embedding backend. On mismatch, the
    /// collection is recreated and a full re-index is scheduled.
    pub async fn initialize(&self) -> Result<()> {
        *self.status.write().await = IndexerStatus::Initializing;

        let name = collection_name(&self.project_id);
        let dim = self.embedding.dimension();

        let existing_dim = match self.vector_store.collection_dimension(&name).await {
            Ok(existing) => existing,
            Err(err) => {
                *self.status.write().await = IndexerStatus::Failed;
                return Err(err.into());
            }
        };
        let dimension_mismatch = existing_dim.is_some_and(|existing| existing != dim);

        if dimension_mismatch {
            if let Err(err) = self.vector_store.delete_collection(&name).await {
                *self.status.write().await = IndexerStatus::Failed;
                return Err(err.into());
            }
        }

        match self.vector_store.create_collection(&name, dim).await {
            Ok(()) => {}
            Err(err) => {
                *self.status.write().await = IndexerStatus::Failed;
                return Err(err.into());
            }
        }

        let mut state = self.load_state().await?;
        if dimension_mismatch || state.status == IndexerStatus::Failed {
            // A dimension mismatch, just detected or left over from a
            // previous failed initialize, forces a full rescan on the next
            // index(): the collection was just recreated empty, so every
            // file's stored hash would otherwise wrongly look unchanged.
            state.per_file.clear();
            state.last_full_scan_ts = None;
        }
        state.status = IndexerStatus::Ready;
        self.save_state(&state).await?;
        *self.status.write().await = IndexerStatus::Ready;
        Ok(())
    }

    /// Incremental by default: files whose content hash matches the stored
    /// state are skipped. Errors on a single file are logged and skipped;
    /// an error from the vector store aborts the batch and fails the
    /// indexer. Returns once per-file state has been persisted.
    pub async fn index(&self, paths: Option<Vec<String>>) -> Result<IndexSummary> {
        let _guard = self.run_lock.try_lock().map_err(|_| IndexerError::Busy)?;

        {
            let current = *self.status.read().await;
            if current == IndexerStatus::Uninitialized || current == IndexerStatus::Failed {
                return Err(IndexerError::NotInitialized);
            }
        }
        *self.status.write().await = IndexerStatus::Indexing;

        let result = self.index_inner(paths).await;

        match &result {
            Ok(_) => *self.status.write().await = IndexerStatus::Ready,
            Err(_) => *self.status.write().await = IndexerStatus::Failed,
        }
        result
    }

    async fn index_inner(&self, paths: Option<Vec<String>>) -> Result<IndexSummary> {
        let mut state = self.load_state().await?;
        let scanner = FileScanner::with_excludes(&self.root, &self.exclude);
        let mut records = scanner.scan_records().await?;

        if let Some(scoped) = &paths {
            records.retain(|r| scoped.iter().any(|p| glob_matches(p, &r.relative_path)));
        }

        let mut to_process = Vec::new();
        let mut skipped = 0u64;
        for record in records {
            match state.per_file.get(&record.relative_path) {
                Some(hash) if hash == &record.content_hash => skipped += 1,
                _ => to_process.push(record),
            }
        }

        let mut summary = IndexSummary {
            files_skipped: skipped,
            ..IndexSummary::default()
        };

        let mut pending_chunks: Vec<VectorEntry> = Vec::new();
        let collection = collection_name(&self.project_id);

        for wave in to_process.chunks(DEFAULT_CONCURRENCY) {
            let mut tasks = Vec::with_capacity(wave.len());
            for record in wave {
                let record = record.clone();
                let permit = self.concurrency.clone().acquire_owned().await.ok();
                let chunker_config = self.chunker.config().clone();
                let project_id = self.project_id.clone();
                let embedding = self.embedding.clone();
                tasks.push(tokio::spawn(async move {
                    let _permit = permit;
                    chunk_and_embed(&chunker_config, &project_id, &record, embedding.as_ref()).await
                }));
            }

            for (record, task) in wave.iter().zip(tasks) {
                match task.await {
                    Ok(Ok(entries)) => {
                        state.per_file.insert(record.relative_path.clone(), record.content_hash.clone());
                        summary.files_indexed += 1;
                        summary.chunks_indexed += entries.len() as u64;
                        pending_chunks.extend(entries);
                    }
                    Ok(Err(err)) => {
                        log::warn!("failed to index {}: {err}", record.relative_path);
                        summary.errors.push(format!("{}: {err}", record.relative_path));
                    }
                    Err(join_err) => {
                        summary.errors.push(format!("{}: task panicked: {join_err}", record.relative_path));
                    }
                }

                if pending_chunks.len() >= UPSERT_BATCH_SIZE {
                    let batch = std::mem::take(&mut pending_chunks);
                    self.vector_store.upsert(&collection, batch).await?;
                }
            }
        }

        if !pending_chunks.is_empty() {
            self.vector_store.upsert(&collection, pending_chunks).await?;
        }

        state.status = IndexerStatus::Ready;
        state.files_indexed = state.per_file.len() as u64;
        state.errors = summary.errors.clone();
        state.last_full_scan_ts = Some(now_unix());
        self.save_state(&state).await?;

        Ok(summary)
    }

    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        k: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<VectorEntry>> {
        let name = collection_name(&self.project_id);
        Ok(self.vector_store.search(&name, &query_vector, k, filter.as_ref()).await?)
    }

    pub async fn status(&self) -> Result<IndexingState> {
        self.load_state().await
    }

    pub async fn health(&self) -> HealthSnapshot {
        match self.embedding.embed("healthcheck").await {
            Ok(_) => HealthSnapshot::healthy(self.embedding.model_id(), self.embedding.dimension()),
            Err(err) => HealthSnapshot::unreachable(self.embedding.model_id(), err.to_string()),
        }
    }

    pub async fn remove(&self) -> Result<()> {
        let name = collection_name(&self.project_id);
        self.vector_store.delete_collection(&name).await?;
        self.relational
            .delete(Table::IndexingState, &self.project_id)
            .await?;
        Ok(())
    }

    async fn load_state(&self) -> Result<IndexingState> {
        match self.relational.get(Table::IndexingState, &self.project_id).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(IndexingState::default()),
        }
    }

    async fn save_state(&self, state: &IndexingState) -> Result<()> {
        let value = serde_json::to_value(state)?;
        self.relational
            .put(Table::IndexingState, &self.project_id, value)
            .await?;
        Ok(())
    }
}

async fn chunk_and_embed(
    config: &ChunkerConfig,
    project_id: &str,
    record: &FileRecord,
    embedding: &dyn EmbeddingBackend,
) -> Result<Vec<VectorEntry>> {
    let chunker = Chunker::new(config.clone());
    let chunks: Vec<CodeChunk> = chunker.chunk_str(&record.content, Some(&record.relative_path))?;

    let mut entries = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let vector = embedding
            .embed(&chunk.content)
            .await
            .map_err(|e| IndexerError::EmbeddingError(e.to_string()))?;
        let id = blake3::hash(format!("{project_id}:{}", chunk.id).as_bytes())
            .to_hex()
            .to_string();
        entries.push(VectorEntry {
            id,
            vector,
            payload: VectorPayload {
                project_id: project_id.to_string(),
                file_path: chunk.metadata.file_path.clone(),
                language: chunk.metadata.language.map(|l| l.as_str().to_string()),
                symbol_name: chunk.metadata.symbol_name.clone(),
                line_range: (chunk.metadata.start_line, chunk.metadata.end_line),
                content_hash: record.content_hash.clone(),
            },
            score: None,
        });
    }
    Ok(entries)
}

fn glob_matches(pattern: &str, path: &str) -> bool {
    globset::Glob::new(pattern)
        .map(|g| g.compile_matcher().is_match(path))
        .unwrap_or(false)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_relational_store::SqliteRelationalStore;
    use cortex_vector_store::{HashingEmbeddingBackend, LocalVectorStore};

    async fn make_indexer(root: &std::path::Path) -> ProjectIndexer {
        let vector_dir = root.join(".vectors");
        let vector_store = Arc::new(LocalVectorStore::open(&vector_dir).await.unwrap());
        let embedding = Arc::new(HashingEmbeddingBackend::new(32));
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().await.unwrap());
        ProjectIndexer::new("p1", root, vec![], vector_store, embedding, relational)
    }

    #[tokio::test]
    async fn zero_file_project_reaches_ready_with_no_files_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = make_indexer(dir.path()).await;
        indexer.initialize().await.unwrap();
        let summary = indexer.index(None).await.unwrap();
        assert_eq!(summary.files_indexed, 0);
        let state = indexer.status().await.unwrap();
        assert_eq!(state.status, IndexerStatus::Ready);
    }

    #[tokio::test]
    async fn indexing_a_python_file_makes_it_searchable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();
        let indexer = make_indexer(dir.path()).await;
        indexer.initialize().await.unwrap();
        let summary = indexer.index(None).await.unwrap();
        assert_eq!(summary.files_indexed, 1);

        let state = indexer.status().await.unwrap();
        assert_eq!(state.files_indexed, 1);

        let query = indexer.embedding.embed("foo").await.unwrap();
        let results = indexer.search(query, 5, None).await.unwrap();
        assert!(results.iter().any(|r| r.payload.file_path.ends_with("a.py")));
    }

    #[tokio::test]
    async fn reindex_with_no_changes_skips_every_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();
        let indexer = make_indexer(dir.path()).await;
        indexer.initialize().await.unwrap();
        indexer.index(None).await.unwrap();

        let second = indexer.index(None).await.unwrap();
        assert_eq!(second.files_indexed, 0);
        assert_eq!(second.files_skipped, 1);
    }

    #[tokio::test]
    async fn editing_a_file_triggers_reindex_of_just_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "def foo():\n    pass\n").unwrap();
        let indexer = make_indexer(dir.path()).await;
        indexer.initialize().await.unwrap();
        indexer.index(None).await.unwrap();

        std::fs::write(&path, "def foo():\n    return 1\n").unwrap();
        let second = indexer.index(None).await.unwrap();
        assert_eq!(second.files_indexed, 1);
        assert_eq!(second.files_skipped, 0);
    }

    #[tokio::test]
    async fn concurrent_index_calls_return_busy() {
        let dir = tempfile::tempdir().unwrap();
        for n in 0..20 {
            std::fs::write(dir.path().join(format!("f{n}.py")), "def f():\n    pass\n").unwrap();
        }
        let indexer = Arc::new(make_indexer(dir.path()).await);
        indexer.initialize().await.unwrap();

        let a = Arc::clone(&indexer);
        let b = Arc::clone(&indexer);
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.index(None).await }),
            tokio::spawn(async move { b.index(None).await })
        );
        let results = [r1.unwrap(), r2.unwrap()];
        let busy_count = results.iter().filter(|r| matches!(r, Err(IndexerError::Busy))).count();
        assert!(busy_count <= 1);
    }

    #[tokio::test]
    async fn index_before_initialize_fails() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = make_indexer(dir.path()).await;
        let err = indexer.index(None).await.unwrap_err();
        assert!(matches!(err, IndexerError::NotInitialized));
    }

    #[tokio::test]
    async fn embedding_dimension_change_forces_a_full_reindex() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();

        let vector_store = Arc::new(LocalVectorStore::open(dir.path().join(".vectors")).await.unwrap());
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().await.unwrap());

        let first = ProjectIndexer::new(
            "p1",
            dir.path(),
            vec![],
            Arc::clone(&vector_store) as Arc<dyn cortex_vector_store::VectorStore>,
            Arc::new(HashingEmbeddingBackend::new(32)),
            Arc::clone(&relational) as Arc<dyn cortex_relational_store::RelationalStore>,
        );
        first.initialize().await.unwrap();
        first.index(None).await.unwrap();

        // Simulate a config change to a differently-dimensioned embedding
        // backend for the same project/collection/state.
        let second = ProjectIndexer::new(
            "p1",
            dir.path(),
            vec![],
            vector_store,
            Arc::new(HashingEmbeddingBackend::new(64)),
            relational,
        );
        second.initialize().await.unwrap();
        let summary = second.index(None).await.unwrap();
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.files_skipped, 0);
    }
}
