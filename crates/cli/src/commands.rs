//! One function per subcommand. Each opens its own `Engine`, does the work,
//! and prints to stdout; there's no long-lived process state between
//! invocations the way there is in `cortex-mcp-server`.

use crate::cli::{Command, ScopeArg};
use crate::engine::Engine;
use cortex_search::{SearchRequest, UserContext};
use cortex_workspace::DefaultScope;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

pub async fn run(data_dir: PathBuf, command: Command) -> anyhow::Result<()> {
    let engine = Engine::open(data_dir).await?;
    match command {
        Command::Discover { root, max_depth } => discover(&root, max_depth),
        Command::Load { workspace, check_paths } => load(&engine, &workspace, check_paths).await,
        Command::Index { workspace, project, parallel } => index(&engine, &workspace, project, parallel).await,
        Command::Status { workspace, project } => status(&engine, &workspace, project).await,
        Command::Search { workspace, query, project, scope, user, k } => {
            search(&engine, &workspace, &query, &project, scope, &user, k).await
        }
        Command::SearchTemplate { workspace, name, project, args, user, k } => {
            search_template(&engine, &workspace, &name, &project, args, &user, k).await
        }
    }
}

fn discover(root: &PathBuf, max_depth: Option<usize>) -> anyhow::Result<()> {
    let found = cortex_workspace::discover(root, max_depth);
    if found.is_empty() {
        println!("No projects found under {}", root.display());
        return Ok(());
    }
    for project in &found {
        println!(
            "{:<20} {:<14} {:<6.2} {}",
            project.id,
            format!("{:?}", project.project_type),
            project.confidence,
            project.path.display()
        );
    }
    Ok(())
}

async fn load(engine: &Engine, workspace: &PathBuf, check_paths: bool) -> anyhow::Result<()> {
    let (config, _manager, _pipeline) = engine.load_workspace(workspace, check_paths).await?;
    println!(
        "workspace `{}` ok: {} project(s)",
        config.workspace.name,
        config.workspace.projects.len()
    );
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.green} {msg}")
            .expect("static spinner template is valid"),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

async fn index(engine: &Engine, workspace: &PathBuf, project: Option<String>, parallel: bool) -> anyhow::Result<()> {
    let (_config, manager, _pipeline) = engine.load_workspace(workspace, false).await?;
    manager.initialize(true).await;

    let bar = spinner("indexing");
    let outcomes = match project {
        Some(id) => vec![manager.index_one(&id).await],
        None => manager.index_all(parallel).await?,
    };
    bar.finish_and_clear();

    for outcome in outcomes {
        match outcome.result {
            Ok(summary) => println!(
                "{}: {} file(s) indexed, {} skipped, {} chunk(s), {} error(s)",
                outcome.project_id, summary.files_indexed, summary.files_skipped, summary.chunks_indexed, summary.errors.len()
            ),
            Err(message) => println!("{}: failed: {message}", outcome.project_id),
        }
    }
    Ok(())
}

async fn status(engine: &Engine, workspace: &PathBuf, project: Option<String>) -> anyhow::Result<()> {
    let (config, manager, _pipeline) = engine.load_workspace(workspace, false).await?;
    let ids: Vec<String> = match project {
        Some(id) => vec![id],
        None => config.workspace.projects.iter().map(|p| p.id.clone()).collect(),
    };
    for id in ids {
        let (status, state) = manager.status(&id).await?;
        println!(
            "{:<20} {:<14} {:>6} file(s) indexed, last scan {}",
            id,
            format!("{status:?}"),
            state.files_indexed,
            state
                .last_full_scan_ts
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "never".to_string())
        );
    }
    Ok(())
}

fn to_default_scope(scope: ScopeArg) -> DefaultScope {
    match scope {
        ScopeArg::Project => DefaultScope::Project,
        ScopeArg::Dependencies => DefaultScope::Dependencies,
        ScopeArg::Related => DefaultScope::Related,
        ScopeArg::Workspace => DefaultScope::Workspace,
    }
}

async fn search(
    engine: &Engine,
    workspace: &PathBuf,
    query: &str,
    project: &str,
    scope: ScopeArg,
    user: &str,
    k: usize,
) -> anyhow::Result<()> {
    let (_config, _manager, pipeline) = engine.load_workspace(workspace, false).await?;
    let mut ctx = UserContext::new(user);
    let request = SearchRequest {
        query: query.to_string(),
        project_id: project.to_string(),
        scope: to_default_scope(scope),
        user_id: user.to_string(),
        k,
    };
    let now_unix_ms = now_unix_ms();
    let results = pipeline.search(&request, &mut ctx, now_unix_ms).await?;
    print_results(&results);
    Ok(())
}

async fn search_template(
    engine: &Engine,
    workspace: &PathBuf,
    name: &str,
    project: &str,
    args: Vec<(String, String)>,
    user: &str,
    k: usize,
) -> anyhow::Result<()> {
    let (_config, _manager, pipeline) = engine.load_workspace(workspace, false).await?;
    let mut ctx = UserContext::new(user);
    let params: std::collections::HashMap<String, String> = args.into_iter().collect();
    let now_unix_ms = now_unix_ms();
    let results = pipeline
        .search_template(name, &params, project, DefaultScope::Project, user, k, &mut ctx, now_unix_ms)
        .await?;
    print_results(&results);
    Ok(())
}

fn print_results(results: &[cortex_search::RankedResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>2}. {:<8.4} {} ({})",
            rank + 1,
            result.final_score,
            result.file_path,
            result.chunk_id
        );
    }
}

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
