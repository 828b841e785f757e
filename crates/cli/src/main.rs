//! Cortex CLI.
//!
//! A thin front end over the same workspace/search engine
//! `cortex-mcp-server` exposes over JSON-RPC, for scripting and local use
//! without an MCP client in the loop.

mod cli;
mod commands;
mod engine;

use clap::Parser;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = cli::Cli::parse();
    let data_dir = args
        .data_dir
        .unwrap_or_else(|| env::var("CORTEX_DATA_DIR").unwrap_or_else(|_| ".cortex".to_string()).into());

    if let Err(err) = commands::run(data_dir, args.command).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    Ok(())
}
