//! Same collaborator wiring as `cortex-mcp-server`'s engine, trimmed to
//! what a one-shot CLI invocation needs: no per-user context map, since a
//! CLI process doesn't live long enough to hold cross-request session state.

use cortex_relational_store::{RelationalStore, SqliteRelationalStore};
use cortex_search::{CacheLayer, InProcessRemoteCache, QueryPipeline, TemplateRegistry};
use cortex_vector_store::{EmbeddingBackend, HashingEmbeddingBackend, LocalVectorStore, VectorStore};
use cortex_workspace::{WorkspaceConfig, WorkspaceManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const EMBEDDING_DIMENSION: usize = 256;

pub struct Engine {
    data_dir: PathBuf,
    relational: Arc<dyn RelationalStore>,
    embedding: Arc<dyn EmbeddingBackend>,
}

impl Engine {
    pub async fn open(data_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;
        let relational = Arc::new(SqliteRelationalStore::open(data_dir.join("cortex.db")).await?);
        let embedding = Arc::new(HashingEmbeddingBackend::new(EMBEDDING_DIMENSION));
        Ok(Self { data_dir, relational, embedding })
    }

    /// Loads a workspace config and builds the manager + pipeline pair
    /// around it. Returns both, since most commands need the manager and
    /// `search`/`search-template` additionally need the pipeline.
    pub async fn load_workspace(
        &self,
        path: impl AsRef<Path>,
        check_paths: bool,
    ) -> cortex_workspace::Result<(Arc<WorkspaceConfig>, Arc<WorkspaceManager>, Arc<QueryPipeline>)> {
        let config = Arc::new(WorkspaceConfig::load(path, check_paths).await?);
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(LocalVectorStore::open(self.data_dir.join("vectors")).await?);
        let manager = Arc::new(WorkspaceManager::new(
            (*config).clone(),
            vector_store,
            Arc::clone(&self.embedding),
            Arc::clone(&self.relational),
        ));
        let cache = Arc::new(CacheLayer::new(Arc::new(InProcessRemoteCache::new()), Arc::clone(&self.relational)));
        let templates = Arc::new(TemplateRegistry::new(Arc::clone(&self.relational)));
        let pipeline = Arc::new(QueryPipeline::new(
            Arc::clone(&manager),
            Arc::clone(&self.embedding),
            cache,
            templates,
        ));
        Ok((config, manager, pipeline))
    }
}
