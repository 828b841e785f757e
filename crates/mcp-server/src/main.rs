//! Cortex MCP server.
//!
//! Reads newline-delimited JSON-RPC 2.0 objects from stdin and dispatches
//! them to the cortex workspace/search engine (spec §6's seven methods),
//! writing one JSON-RPC response per line to stdout.
//!
//! Wire framing (message boundaries, transport negotiation) is treated as
//! an external concern: this binary is the dispatch core a real MCP
//! transport would sit in front of.
//!
//! ## Usage
//!
//! ```json
//! {"mcpServers": {"cortex": {"command": "cortex-mcp-server"}}}
//! ```

mod dispatch;
mod engine;

use engine::Engine;
use std::env;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn print_help() {
    println!("cortex-mcp-server");
    println!();
    println!("Usage: cortex-mcp-server [--version|--help]");
    println!();
    println!("Reads newline-delimited JSON-RPC requests on stdin, writes responses on stdout.");
    println!("Data directory defaults to ./.cortex, override with CORTEX_DATA_DIR.");
}

fn handle_cli_args() -> Option<i32> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return None;
    }
    match args[0].as_str() {
        "--version" | "-V" => {
            println!("cortex-mcp-server {}", env!("CARGO_PKG_VERSION"));
            Some(0)
        }
        "--help" | "-h" => {
            print_help();
            Some(0)
        }
        other => {
            eprintln!("Unknown argument: {other}");
            print_help();
            Some(2)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Some(exit_code) = handle_cli_args() {
        std::process::exit(exit_code);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let data_dir = env::var("CORTEX_DATA_DIR").unwrap_or_else(|_| ".cortex".to_string());
    let engine = Engine::open(data_dir).await?;

    log::info!("cortex-mcp-server starting");

    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<cortex_protocol::Request>(&line) {
            Ok(request) => dispatch::handle(&engine, request).await,
            Err(err) => cortex_protocol::Response::failure(
                serde_json::Value::Null,
                cortex_protocol::ProtocolError::new(cortex_protocol::ErrorCode::ParseError, err.to_string()),
            ),
        };
        let serialized = serde_json::to_string(&response)?;
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    log::info!("cortex-mcp-server stopped");
    Ok(())
}
