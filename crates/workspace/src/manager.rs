use crate::config::WorkspaceConfig;
use crate::error::{Result, WorkspaceError};
use crate::model::Priority;
use cortex_indexer::{IndexSummary, IndexerStatus, ProjectIndexer};
use cortex_relational_store::RelationalStore;
use cortex_vector_store::{EmbeddingBackend, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owns one `ProjectIndexer` per enabled project and fans workspace-level
/// operations out to them (spec §4.6). Shares a single vector store,
/// embedding backend, and relational store across every project; each
/// project only gets its own collection namespace and indexing-state row.
pub struct WorkspaceManager {
    config: RwLock<WorkspaceConfig>,
    indexers: RwLock<HashMap<String, Arc<ProjectIndexer>>>,
    vector_store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingBackend>,
    relational: Arc<dyn RelationalStore>,
}

/// Per-project outcome of a fan-out call that must not fail the whole
/// operation just because one project couldn't initialize or index.
#[derive(Debug, Clone)]
pub struct ProjectOutcome<T> {
    pub project_id: String,
    pub result: std::result::Result<T, String>,
}

impl WorkspaceManager {
    pub fn new(
        config: WorkspaceConfig,
        vector_store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingBackend>,
        relational: Arc<dyn RelationalStore>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            indexers: RwLock::new(HashMap::new()),
            vector_store,
            embedding,
            relational,
        }
    }

    async fn indexer_for(&self, project_id: &str) -> Result<Arc<ProjectIndexer>> {
        if let Some(indexer) = self.indexers.read().await.get(project_id) {
            return Ok(Arc::clone(indexer));
        }
        let config = self.config.read().await;
        let project = config
            .get_project(project_id)
            .ok_or_else(|| WorkspaceError::ProjectNotFound(project_id.to_string()))?
            .clone();
        drop(config);

        let indexer = Arc::new(ProjectIndexer::new(
            project.id.clone(),
            project.path.clone(),
            project.indexing.exclude.clone(),
            Arc::clone(&self.vector_store),
            Arc::clone(&self.embedding),
            Arc::clone(&self.relational),
        ));
        self.indexers
            .write()
            .await
            .insert(project_id.to_string(), Arc::clone(&indexer));
        Ok(indexer)
    }

    /// Initializes every enabled project's indexer. `lazy = true` skips
    /// projects whose indexer already exists (spec §4.6's "initialize may
    /// be eager or lazy").
    pub async fn initialize(self: &Arc<Self>, lazy: bool) -> Vec<ProjectOutcome<()>> {
        let project_ids: Vec<String> = {
            let config = self.config.read().await;
            config
                .workspace
                .projects
                .iter()
                .filter(|p| p.indexing.enabled)
                .map(|p| p.id.clone())
                .collect()
        };

        if lazy {
            return project_ids
                .into_iter()
                .map(|id| ProjectOutcome { project_id: id, result: Ok(()) })
                .collect();
        }

        let mut set = tokio::task::JoinSet::new();
        for id in project_ids {
            let manager = Arc::clone(self);
            set.spawn(async move {
                let result = match manager.indexer_for(&id).await {
                    Ok(indexer) => indexer.initialize().await.map_err(|e| e.to_string()),
                    Err(err) => Err(err.to_string()),
                };
                ProjectOutcome { project_id: id, result }
            });
        }
        let mut outcomes = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            if let Ok(outcome) = joined {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Indexes every enabled project. `parallel = true` runs all projects
    /// concurrently (priority order has no effect on wall time, only on
    /// which projects get started first when the concurrency cap binds);
    /// `parallel = false` runs sequentially in dependency-topological order
    /// so a project never re-indexes before what it depends on.
    pub async fn index_all(self: &Arc<Self>, parallel: bool) -> Result<Vec<ProjectOutcome<IndexSummary>>> {
        let config = self.config.read().await;
        let mut project_ids: Vec<String> = config
            .workspace
            .projects
            .iter()
            .filter(|p| p.indexing.enabled)
            .map(|p| p.id.clone())
            .collect();

        if parallel {
            project_ids.sort_by_key(|id| {
                let priority = config
                    .get_project(id)
                    .map(|p| p.indexing.priority)
                    .unwrap_or(Priority::Medium);
                std::cmp::Reverse(priority)
            });
        } else if let Ok(graph) = config.build_graph() {
            if let Some(order) = graph.topological_order() {
                let enabled: std::collections::HashSet<_> = project_ids.iter().cloned().collect();
                project_ids = order.into_iter().filter(|id| enabled.contains(id)).collect();
            }
        }
        drop(config);

        if parallel {
            let mut set = tokio::task::JoinSet::new();
            for id in project_ids {
                let manager = Arc::clone(self);
                set.spawn(async move { manager.index_one(&id).await });
            }
            let mut outcomes = Vec::with_capacity(set.len());
            while let Some(joined) = set.join_next().await {
                if let Ok(outcome) = joined {
                    outcomes.push(outcome);
                }
            }
            Ok(outcomes)
        } else {
            let mut outcomes = Vec::with_capacity(project_ids.len());
            for id in &project_ids {
                outcomes.push(self.index_one(id).await);
            }
            Ok(outcomes)
        }
    }

    /// Indexes a single project, independent of `index_all`'s fan-out.
    pub async fn index_one(&self, project_id: &str) -> ProjectOutcome<IndexSummary> {
        let result = match self.indexer_for(project_id).await {
            Ok(indexer) => indexer.index(None).await.map_err(|e| e.to_string()),
            Err(err) => Err(err.to_string()),
        };
        ProjectOutcome { project_id: project_id.to_string(), result }
    }

    /// Resolves `scope` to a set of target project ids and fans a raw
    /// vector search out to each target's indexer, returning unranked
    /// results. Ranking and caching are `cortex-search`'s job.
    pub async fn search_workspace(
        &self,
        project_id: &str,
        scope: crate::model::DefaultScope,
        query_vector: Vec<f32>,
        k: usize,
    ) -> Result<Vec<cortex_vector_store::VectorEntry>> {
        let targets = self.resolve_scope(project_id, scope).await?;
        let mut all = Vec::new();
        for target in targets {
            let indexer = self.indexer_for(&target).await?;
            all.extend(indexer.search(query_vector.clone(), k, None).await?);
        }
        Ok(all)
    }

    async fn resolve_scope(&self, project_id: &str, scope: crate::model::DefaultScope) -> Result<Vec<String>> {
        use crate::model::DefaultScope;
        let config = self.config.read().await;
        if config.get_project(project_id).is_none() {
            return Err(WorkspaceError::ProjectNotFound(project_id.to_string()));
        }
        match scope {
            DefaultScope::Project => Ok(vec![project_id.to_string()]),
            DefaultScope::Dependencies => {
                let mut deps = config.dependencies(project_id, true);
                deps.push(project_id.to_string());
                Ok(deps)
            }
            DefaultScope::Related => {
                let mut graph = config.build_graph()?;
                let mut related: Vec<String> = graph.reachable(project_id, 1)?.into_iter().collect();
                related.push(project_id.to_string());
                Ok(related)
            }
            DefaultScope::Workspace => Ok(config
                .workspace
                .projects
                .iter()
                .filter(|p| p.indexing.enabled)
                .map(|p| p.id.clone())
                .collect()),
        }
    }

    pub async fn add_project(&self, project: crate::model::Project) -> Result<()> {
        let mut config = self.config.write().await;
        if config.get_project(&project.id).is_some() {
            return Err(WorkspaceError::ProjectAlreadyExists(project.id));
        }
        config.workspace.projects.push(project);
        config.validate(false)?;
        Ok(())
    }

    pub async fn remove_project(&self, project_id: &str) -> Result<()> {
        let mut indexers = self.indexers.write().await;
        if let Some(indexer) = indexers.remove(project_id) {
            indexer.stop_monitoring().await;
            indexer.remove().await?;
        }
        drop(indexers);

        let mut config = self.config.write().await;
        let before = config.workspace.projects.len();
        config.workspace.projects.retain(|p| p.id != project_id);
        if config.workspace.projects.len() == before {
            return Err(WorkspaceError::ProjectNotFound(project_id.to_string()));
        }
        config
            .workspace
            .relationships
            .retain(|r| r.from_id != project_id && r.to_id != project_id);
        Ok(())
    }

    /// Drops and rebuilds a project's indexer handle, picking up config
    /// changes (excludes, priority) without restarting the process.
    pub async fn reload_project(&self, project_id: &str) -> Result<()> {
        let mut indexers = self.indexers.write().await;
        if let Some(indexer) = indexers.remove(project_id) {
            indexer.stop_monitoring().await;
        }
        drop(indexers);
        self.indexer_for(project_id).await?;
        Ok(())
    }

    pub async fn status(&self, project_id: &str) -> Result<(IndexerStatus, cortex_indexer::IndexingState)> {
        let indexer = self.indexer_for(project_id).await?;
        let state = indexer.status().await?;
        Ok((state.status, state))
    }

    pub async fn config(&self) -> WorkspaceConfig {
        self.config.read().await.clone()
    }
}
