//! Argument surface. One subcommand per spec §6 JSON-RPC method, plus
//! `discover` since that's the entry point before a workspace file exists.

use clap::{Parser, Subcommand};
use cortex_protocol::SearchScope;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cortex", version, about = "Multi-project code intelligence engine")]
pub struct Cli {
    /// Directory holding the SQLite and vector-store state. Defaults to
    /// `./.cortex`, override with `CORTEX_DATA_DIR`.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Walk a directory tree looking for project manifests.
    Discover {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Validate and register a workspace config file for subsequent commands.
    Load {
        workspace: PathBuf,
        /// Fail if a project's path doesn't exist on disk.
        #[arg(long)]
        check_paths: bool,
    },
    /// Index one project, or every enabled project if `--project` is omitted.
    Index {
        workspace: PathBuf,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        parallel: bool,
    },
    /// Report each project's indexing state.
    Status {
        workspace: PathBuf,
        #[arg(long)]
        project: Option<String>,
    },
    /// Run a free-text query through the full query pipeline.
    Search {
        workspace: PathBuf,
        query: String,
        #[arg(long)]
        project: String,
        #[arg(long, value_enum, default_value = "project")]
        scope: ScopeArg,
        #[arg(long, default_value = "cli-user")]
        user: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
    /// Run a curated or custom search template.
    SearchTemplate {
        workspace: PathBuf,
        name: String,
        #[arg(long)]
        project: String,
        /// Template parameters as `key=value`, repeatable.
        #[arg(long = "arg", value_parser = parse_key_val)]
        args: Vec<(String, String)>,
        #[arg(long, default_value = "cli-user")]
        user: String,
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum ScopeArg {
    Project,
    Dependencies,
    Related,
    Workspace,
}

impl From<ScopeArg> for SearchScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Project => SearchScope::Project,
            ScopeArg::Dependencies => SearchScope::Dependencies,
            ScopeArg::Related => SearchScope::Related,
            ScopeArg::Workspace => SearchScope::Workspace,
        }
    }
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    Ok((key.to_string(), value.to_string()))
}
