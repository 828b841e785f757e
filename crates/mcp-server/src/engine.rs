//! Wires the collaborators every dispatched method needs: the workspace
//! manager (once a config is loaded), the query pipeline, and per-user
//! session context. One `Engine` per server process.

use cortex_relational_store::{RelationalStore, SqliteRelationalStore};
use cortex_search::{CacheLayer, InProcessRemoteCache, QueryPipeline, TemplateRegistry, UserContext};
use cortex_vector_store::{EmbeddingBackend, HashingEmbeddingBackend, LocalVectorStore, VectorStore};
use cortex_workspace::WorkspaceConfig;
use cortex_workspace::WorkspaceManager;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const EMBEDDING_DIMENSION: usize = 256;

pub struct Engine {
    data_dir: PathBuf,
    relational: Arc<dyn RelationalStore>,
    embedding: Arc<dyn EmbeddingBackend>,
    manager: RwLock<Option<Arc<WorkspaceManager>>>,
    pipeline: RwLock<Option<Arc<QueryPipeline>>>,
    contexts: RwLock<HashMap<String, UserContext>>,
}

impl Engine {
    pub async fn open(data_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;
        let relational = Arc::new(SqliteRelationalStore::open(data_dir.join("cortex.db")).await?);
        let embedding = Arc::new(HashingEmbeddingBackend::new(EMBEDDING_DIMENSION));
        Ok(Self {
            data_dir,
            relational,
            embedding,
            manager: RwLock::new(None),
            pipeline: RwLock::new(None),
            contexts: RwLock::new(HashMap::new()),
        })
    }

    /// Loads a workspace config from `path`, building a fresh
    /// `WorkspaceManager` + `QueryPipeline` pair around it.
    pub async fn load_workspace(&self, path: impl AsRef<Path>, check_paths: bool) -> cortex_workspace::Result<Arc<WorkspaceConfig>> {
        let config = WorkspaceConfig::load(path, check_paths).await?;
        self.install_workspace(config.clone()).await?;
        Ok(Arc::new(config))
    }

    pub async fn save_workspace(&self, config: WorkspaceConfig) -> cortex_workspace::Result<()> {
        config.save().await?;
        self.install_workspace(config).await?;
        Ok(())
    }

    async fn install_workspace(&self, config: WorkspaceConfig) -> cortex_workspace::Result<()> {
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(LocalVectorStore::open(self.data_dir.join("vectors")).await?);
        let manager = Arc::new(WorkspaceManager::new(
            config,
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
        *self.manager.write().await = Some(manager);
        *self.pipeline.write().await = Some(pipeline);
        Ok(())
    }

    pub async fn manager(&self) -> Option<Arc<WorkspaceManager>> {
        self.manager.read().await.clone()
    }

    pub async fn pipeline(&self) -> Option<Arc<QueryPipeline>> {
        self.pipeline.read().await.clone()
    }

    /// Clones out the current `UserContext` for `user_id`, creating an
    /// empty one on first use.
    pub async fn context_for(&self, user_id: &str) -> UserContext {
        self.contexts
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserContext::new(user_id))
    }

    pub async fn store_context(&self, ctx: UserContext) {
        self.contexts.write().await.insert(ctx.user_id.clone(), ctx);
    }
}
