//! The top-level Query Pipeline (spec §4.7): Parse -> Expand -> Embed ->
//! Retrieve -> Rank -> Cache.

use crate::cache::{fingerprint, CacheLayer, CachedPayload};
use crate::context::UserContext;
use crate::error::{Result, SearchError};
use crate::query::{self, ParsedQuery};
use crate::rank::{self, RankCandidate, RankedResult, TeamFrequencyTable};
use crate::templates::TemplateRegistry;
use cortex_vector_store::EmbeddingBackend;
use cortex_workspace::{DefaultScope, WorkspaceManager};
use std::collections::HashMap;
use std::sync::Arc;

/// Synonym/acronym expansion adds at most this many extra terms to a query.
const EXPANSION_CAP: usize = 6;
/// Candidates are over-fetched by this factor before ranking, so boosts
/// have real headroom to reorder results (spec §4.7's "retrieve, then rank").
const RETRIEVE_OVERFETCH: usize = 3;
const DEFAULT_CACHE_TTL_MS: i64 = 5 * 60 * 1000;

pub struct QueryPipeline {
    workspace: Arc<WorkspaceManager>,
    embedding: Arc<dyn EmbeddingBackend>,
    cache: Arc<CacheLayer>,
    templates: Arc<TemplateRegistry>,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub project_id: String,
    pub scope: DefaultScope,
    pub user_id: String,
    pub k: usize,
}

impl QueryPipeline {
    #[must_use]
    pub fn new(
        workspace: Arc<WorkspaceManager>,
        embedding: Arc<dyn EmbeddingBackend>,
        cache: Arc<CacheLayer>,
        templates: Arc<TemplateRegistry>,
    ) -> Self {
        Self { workspace, embedding, cache, templates }
    }

    /// Runs the full pipeline for a free-text query against `ctx`.
    pub async fn search(&self, request: &SearchRequest, ctx: &mut UserContext, now_unix_ms: i64) -> Result<Vec<RankedResult>> {
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let parsed = query::parse(&request.query);
        let scope_tag = format!("{:?}", request.scope);
        let context_digest = context_digest(ctx);
        let key = fingerprint(&normalized(&request.query), &scope_tag, &context_digest, request.k);

        if let Some(cached) = self.cache.get(&key).await? {
            ctx.record_query(request.query.clone(), now_unix_ms);
            self.cache.record_query(&request.user_id, &normalized(&request.query)).await;
            return Ok(cached.results);
        }

        let expanded = query::expand(&request.query, &parsed.keywords, EXPANSION_CAP);
        let query_vector = self.embedding.embed(&expanded).await?;

        let overfetch_k = request.k.saturating_mul(RETRIEVE_OVERFETCH).max(request.k);
        let entries = self
            .workspace
            .search_workspace(&request.project_id, request.scope, query_vector, overfetch_k)
            .await?;

        let candidates: Vec<RankCandidate> = entries
            .into_iter()
            .map(|entry| RankCandidate {
                chunk_id: entry.id,
                project_id: entry.payload.project_id,
                file_path: entry.payload.file_path,
                symbol_name: entry.payload.symbol_name,
                base_score: entry.score.unwrap_or(0.0),
                // The vector store doesn't carry file mtimes; the recency
                // boost simply doesn't fire without one.
                modified_at_unix_ms: None,
                snippet: String::new(),
            })
            .collect();

        let config = self.workspace.config().await;
        let mut graph = config.build_graph().map_err(cortex_workspace::WorkspaceError::from)?;
        let team_frequency = TeamFrequencyTable::new();

        let ranked = rank::rank(candidates, ctx, &team_frequency, &mut graph, &parsed.keywords, now_unix_ms, request.k);

        let file_paths: Vec<String> = ranked.iter().map(|r| r.file_path.clone()).collect();
        let payload = CachedPayload { results: ranked.clone(), file_paths, cached_at_unix_ms: now_unix_ms };
        let is_template = self.templates.match_heuristic(&request.query).await.first().is_some();
        self.cache.put(&key, payload, DEFAULT_CACHE_TTL_MS, is_template).await?;

        ctx.record_query(request.query.clone(), now_unix_ms);
        self.cache.record_query(&request.user_id, &normalized(&request.query)).await;

        Ok(ranked)
    }

    /// Runs a named template against `params`, reusing the same
    /// retrieve/rank/cache machinery as a free-text query.
    pub async fn search_template(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        project_id: &str,
        scope: DefaultScope,
        user_id: &str,
        k: usize,
        ctx: &mut UserContext,
        now_unix_ms: i64,
    ) -> Result<Vec<RankedResult>> {
        let template = self
            .templates
            .get(name)
            .await?
            .ok_or_else(|| SearchError::UnknownTemplate(name.to_string()))?;
        let rendered = template.build_query(params);
        let request = SearchRequest {
            query: rendered,
            project_id: project_id.to_string(),
            scope,
            user_id: user_id.to_string(),
            k,
        };
        self.search(&request, ctx, now_unix_ms).await
    }

    /// Returns the parsed intent/entities for a query without running the
    /// rest of the pipeline; useful for clients that want to show the user
    /// what was understood before committing to a search.
    #[must_use]
    pub fn parse(query: &str) -> ParsedQuery {
        query::parse(query)
    }

    pub async fn predicted_next_queries(&self, user_id: &str, query: &str, k: usize) -> Vec<String> {
        self.cache.predicted_next(user_id, &normalized(query), k).await
    }

    /// Drops cached results referencing `file_path` (spec edge case: after
    /// `context.update(file_edited, F)`, a fresh query for anything that
    /// surfaced `F` must miss L1 and L2).
    pub async fn invalidate_file(&self, file_path: &str) {
        self.cache.invalidate(&[file_path.to_string()]).await;
    }
}

fn normalized(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Stable digest over only the context fields the ranker consults, so the
/// cache key doesn't churn on unrelated `UserContext` mutations.
fn context_digest(ctx: &UserContext) -> String {
    format!(
        "{}|{}|{}",
        ctx.current_file.as_deref().unwrap_or(""),
        ctx.current_project.as_deref().unwrap_or(""),
        ctx.recent_files.len()
    )
}
