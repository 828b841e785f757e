//! Maps the seven JSON-RPC methods in spec §6 onto `Engine` calls. No
//! transport logic here: the caller hands us a parsed `Request` and gets
//! back a `Response`, ready to serialize over whatever framing it uses.

use crate::engine::Engine;
use cortex_protocol::{
    ContextEvent, ContextUpdateParams, ContextUpdateResult, ErrorCode, ProjectStatus, ProtocolError, Request,
    Response, SearchParams, SearchResult, SearchResultItem, SearchScope, SearchTemplateParams,
    SearchTemplateResult, WorkspaceDiscoverParams, WorkspaceDiscoverResult, WorkspaceIndexParams,
    WorkspaceIndexResult, WorkspaceLoadParams, WorkspaceLoadResult, WorkspaceSaveParams, WorkspaceSaveResult,
    WorkspaceStatusParams, WorkspaceStatusResult,
};
use cortex_search::{RankedResult, SearchRequest};
use cortex_workspace::{DefaultScope, WorkspaceConfig};
use std::collections::HashMap;
use std::path::PathBuf;

pub async fn handle(engine: &Engine, request: Request) -> Response {
    let id = request.id.clone();
    match dispatch(engine, request).await {
        Ok(result) => Response::success(id, result),
        Err(error) => Response::failure(id, error),
    }
}

async fn dispatch(engine: &Engine, request: Request) -> Result<serde_json::Value, ProtocolError> {
    match request.method.as_str() {
        "workspace.discover" => handle_discover(request.params).await,
        "workspace.load" => handle_load(engine, request.params).await,
        "workspace.save" => handle_save(engine, request.params).await,
        "workspace.index" => handle_index(engine, request.params).await,
        "workspace.status" => handle_status(engine, request.params).await,
        "search" => handle_search(engine, request.params).await,
        "search.template" => handle_search_template(engine, request.params).await,
        "context.update" => handle_context_update(engine, request.params).await,
        other => Err(ProtocolError::new(ErrorCode::MethodNotFound, format!("unknown method: {other}"))),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(params).map_err(|err| ProtocolError::new(ErrorCode::InvalidParams, err.to_string()))
}

async fn handle_discover(params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: WorkspaceDiscoverParams = parse_params(params)?;
    let root = PathBuf::from(&params.root_path);
    let discovered = cortex_workspace::discover(&root, params.max_depth);
    let projects = discovered
        .iter()
        .map(|d| cortex_protocol::DiscoveredProject {
            id: d.id.clone(),
            root_path: d.path.display().to_string(),
            project_type: format!("{:?}", d.project_type),
            confidence: d.confidence,
        })
        .collect();
    let result = WorkspaceDiscoverResult { projects };
    serde_json::to_value(result).map_err(internal)
}

async fn handle_load(engine: &Engine, params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: WorkspaceLoadParams = parse_params(params)?;
    let config = engine
        .load_workspace(&params.path, false)
        .await
        .map_err(workspace_error)?;
    let result = WorkspaceLoadResult { workspace: serde_json::to_value(&config.workspace).map_err(internal)? };
    serde_json::to_value(result).map_err(internal)
}

async fn handle_save(engine: &Engine, params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: WorkspaceSaveParams = parse_params(params)?;
    let workspace = serde_json::from_value(params.workspace).map_err(|err| ProtocolError::new(ErrorCode::InvalidParams, err.to_string()))?;
    let config = WorkspaceConfig { workspace, path: PathBuf::from(&params.path) };
    config.validate(false).map_err(workspace_error)?;
    engine.save_workspace(config).await.map_err(workspace_error)?;
    let result = WorkspaceSaveResult { saved: true };
    serde_json::to_value(result).map_err(internal)
}

async fn handle_index(engine: &Engine, params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: WorkspaceIndexParams = parse_params(params)?;
    let manager = engine.manager().await.ok_or_else(no_workspace_loaded)?;

    let outcomes = if let Some(project_id) = &params.project_id {
        vec![manager.index_one(project_id).await]
    } else {
        manager.index_all(params.parallel).await.map_err(workspace_error)?
    };

    let first = outcomes.into_iter().next().ok_or_else(|| {
        ProtocolError::new(ErrorCode::ProjectNotFound, "no enabled projects to index")
    })?;
    let summary = first.result.map_err(|message| ProtocolError::new(ErrorCode::InternalError, message))?;
    let result = WorkspaceIndexResult {
        project_id: first.project_id,
        files_indexed: summary.files_indexed as usize,
        chunks_indexed: summary.chunks_indexed as usize,
        status: "ready".to_string(),
    };
    serde_json::to_value(result).map_err(internal)
}

async fn handle_status(engine: &Engine, params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: WorkspaceStatusParams = parse_params(params)?;
    let manager = engine.manager().await.ok_or_else(no_workspace_loaded)?;
    let config = manager.config().await;

    let project_ids: Vec<String> = match &params.project_id {
        Some(id) => vec![id.clone()],
        None => config.workspace.projects.iter().map(|p| p.id.clone()).collect(),
    };

    let mut projects = Vec::with_capacity(project_ids.len());
    for id in project_ids {
        let (status, state) = manager.status(&id).await.map_err(workspace_error)?;
        projects.push(ProjectStatus {
            project_id: id,
            state: format!("{status:?}").to_lowercase(),
            files_indexed: state.files_indexed as usize,
            last_full_scan_ts: state.last_full_scan_ts,
        });
    }
    let result = WorkspaceStatusResult { projects };
    serde_json::to_value(result).map_err(internal)
}

fn to_default_scope(scope: SearchScope) -> DefaultScope {
    match scope {
        SearchScope::Project => DefaultScope::Project,
        SearchScope::Dependencies => DefaultScope::Dependencies,
        SearchScope::Related => DefaultScope::Related,
        SearchScope::Workspace => DefaultScope::Workspace,
    }
}

fn to_result_items(ranked: Vec<RankedResult>) -> Vec<SearchResultItem> {
    ranked
        .into_iter()
        .map(|r| SearchResultItem {
            chunk_id: r.chunk_id,
            file_path: r.file_path,
            symbol_name: None,
            content: r.snippet,
            base_score: r.base_score,
            final_score: r.final_score,
            boost_breakdown: r.boost_breakdown,
        })
        .collect()
}

async fn handle_search(engine: &Engine, params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: SearchParams = parse_params(params)?;
    let pipeline = engine.pipeline().await.ok_or_else(no_workspace_loaded)?;
    let user_id = params.user_id.unwrap_or_else(|| "anonymous".to_string());
    let mut ctx = engine.context_for(&user_id).await;

    let request = SearchRequest {
        query: params.query,
        project_id: params.project_id,
        scope: to_default_scope(params.scope),
        user_id: user_id.clone(),
        k: params.k,
    };
    let now_unix_ms = now_unix_ms();
    let ranked = pipeline.search(&request, &mut ctx, now_unix_ms).await.map_err(search_error)?;
    engine.store_context(ctx).await;

    let result = SearchResult { results: to_result_items(ranked), cache_hit: false };
    serde_json::to_value(result).map_err(internal)
}

async fn handle_search_template(engine: &Engine, params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: SearchTemplateParams = parse_params(params)?;
    let pipeline = engine.pipeline().await.ok_or_else(no_workspace_loaded)?;

    let string_params: HashMap<String, String> = params
        .arguments
        .iter()
        .map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
        .collect();
    let project_id = params
        .arguments
        .get("project_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProtocolError::new(ErrorCode::InvalidParams, "arguments.project_id is required"))?
        .to_string();
    let user_id = params
        .arguments
        .get("user_id")
        .and_then(|v| v.as_str())
        .unwrap_or("anonymous")
        .to_string();
    let k = params.arguments.get("k").and_then(|v| v.as_u64()).unwrap_or(10) as usize;

    let mut ctx = engine.context_for(&user_id).await;
    let now_unix_ms = now_unix_ms();
    let ranked = pipeline
        .search_template(&params.name, &string_params, &project_id, DefaultScope::Project, &user_id, k, &mut ctx, now_unix_ms)
        .await
        .map_err(search_error)?;
    engine.store_context(ctx).await;

    let result = SearchTemplateResult { results: to_result_items(ranked) };
    serde_json::to_value(result).map_err(internal)
}

async fn handle_context_update(engine: &Engine, params: serde_json::Value) -> Result<serde_json::Value, ProtocolError> {
    let params: ContextUpdateParams = parse_params(params)?;
    let mut ctx = engine.context_for(&params.user_id).await;
    let now_unix_ms = now_unix_ms();

    match &params.event {
        ContextEvent::FileOpened { file_path } => {
            ctx.current_file = Some(file_path.clone());
            ctx.touch_file(file_path.clone(), now_unix_ms);
        }
        ContextEvent::FileClosed { file_path } => {
            if ctx.current_file.as_deref() == Some(file_path.as_str()) {
                ctx.current_file = None;
            }
        }
        ContextEvent::FileEdited { file_path } => {
            ctx.touch_file(file_path.clone(), now_unix_ms);
            if let Some(pipeline) = engine.pipeline().await {
                pipeline.invalidate_file(file_path).await;
            }
        }
        ContextEvent::QueryIssued { query } => {
            ctx.record_query(query.clone(), now_unix_ms);
        }
    }
    engine.store_context(ctx).await;

    let result = ContextUpdateResult { accepted: true };
    serde_json::to_value(result).map_err(internal)
}

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn no_workspace_loaded() -> ProtocolError {
    ProtocolError::new(ErrorCode::ProjectNotFound, "no workspace loaded; call workspace.load first")
}

fn internal(err: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::new(ErrorCode::InternalError, err.to_string())
}

fn workspace_error(err: cortex_workspace::WorkspaceError) -> ProtocolError {
    use cortex_workspace::WorkspaceError;
    match err {
        WorkspaceError::ProjectNotFound(id) => ProtocolError::new(ErrorCode::ProjectNotFound, format!("project not found: {id}")),
        WorkspaceError::Busy(id) => ProtocolError::new(ErrorCode::IndexingInProgress, format!("project busy: {id}")),
        // A cyclic dependency is a workspace-config validation failure, not its own wire-level code.
        WorkspaceError::CyclicDependency { path } => {
            ProtocolError::new(ErrorCode::ValidationFailed, format!("cyclic dependency: {}", path.join(" -> ")))
        }
        WorkspaceError::VectorStore(vector_err) => vector_store_error(vector_err),
        WorkspaceError::RelationalStore(_) => ProtocolError::new(ErrorCode::StorageUnavailable, err.to_string()),
        other => ProtocolError::new(ErrorCode::ValidationFailed, other.to_string()),
    }
}

fn vector_store_error(err: cortex_vector_store::VectorStoreError) -> ProtocolError {
    use cortex_vector_store::VectorStoreError;
    match err {
        VectorStoreError::DimensionMismatch { expected, actual } => ProtocolError::new(
            ErrorCode::DimensionMismatch,
            format!("vector dimension mismatch: expected {expected}, got {actual}"),
        ),
        VectorStoreError::EmbeddingError(message) => ProtocolError::new(ErrorCode::EmbeddingBackendUnavailable, message),
        other => ProtocolError::new(ErrorCode::StorageUnavailable, other.to_string()),
    }
}

fn search_error(err: cortex_search::SearchError) -> ProtocolError {
    use cortex_search::SearchError;
    match err {
        SearchError::EmptyQuery => ProtocolError::new(ErrorCode::InvalidParams, "query must not be empty"),
        SearchError::UnknownTemplate(name) => ProtocolError::new(ErrorCode::InvalidParams, format!("unknown template: {name}")),
        SearchError::Workspace(workspace_err) => workspace_error(workspace_err),
        SearchError::VectorStore(vector_err) => vector_store_error(vector_err),
        other => ProtocolError::new(ErrorCode::InternalError, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn engine_with_project(root: &std::path::Path) -> (Engine, std::path::PathBuf) {
        let project_dir = root.join("demo");
        tokio::fs::create_dir_all(&project_dir).await.unwrap();
        tokio::fs::write(project_dir.join("lib.rs"), "fn handler() { auth_check(); }").await.unwrap();

        let workspace_path = root.join(".cortex-workspace.json");
        let workspace = json!({
            "version": "1.0.0",
            "name": "demo-workspace",
            "projects": [{
                "id": "demo",
                "name": "demo",
                "path": "demo",
                "type": "library",
            }],
        });
        tokio::fs::write(&workspace_path, serde_json::to_vec(&workspace).unwrap()).await.unwrap();

        let engine = Engine::open(root.join(".cortex-data")).await.unwrap();
        (engine, workspace_path)
    }

    #[tokio::test]
    async fn load_then_index_then_search_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let (engine, workspace_path) = engine_with_project(tmp.path()).await;

        let load_request = Request::new(
            "workspace.load",
            json!({"path": workspace_path.to_string_lossy()}),
            json!(1),
        );
        let response = handle(&engine, load_request).await;
        assert!(response.error.is_none(), "{:?}", response.error);

        let manager = engine.manager().await.unwrap();
        manager.initialize(true).await;
        let outcome = manager.index_one("demo").await;
        assert!(outcome.result.is_ok(), "{:?}", outcome.result);

        let search_request = Request::new(
            "search",
            json!({"query": "auth check", "project_id": "demo"}),
            json!(2),
        );
        let response = handle(&engine, search_request).await;
        assert!(response.error.is_none(), "{:?}", response.error);
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::open(tmp.path().join(".cortex-data")).await.unwrap();
        let response = handle(&engine, Request::new("nope", json!({}), json!(1))).await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn search_before_load_reports_project_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::open(tmp.path().join(".cortex-data")).await.unwrap();
        let response = handle(&engine, Request::new("search", json!({"query": "x", "project_id": "demo"}), json!(1))).await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn context_update_file_edited_invalidates_the_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let (engine, workspace_path) = engine_with_project(tmp.path()).await;
        handle(&engine, Request::new("workspace.load", json!({"path": workspace_path.to_string_lossy()}), json!(1))).await;

        let response = handle(
            &engine,
            Request::new(
                "context.update",
                json!({"user_id": "u1", "event": {"type": "file_edited", "file_path": "demo/lib.rs"}}),
                json!(2),
            ),
        )
        .await;
        assert!(response.error.is_none(), "{:?}", response.error);
    }
}
