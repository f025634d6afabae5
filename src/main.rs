//! bili-mcp - Bilibili video tools over MCP
//!
//! Exposes subtitles, danmaku, popular comments, and categorized search as
//! read-only MCP tools on stdio.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use bili_mcp::config::Config;
use bili_mcp::core::client::BiliClient;
use bili_mcp::server;

/// Bilibili video tools over MCP (stdio transport).
#[derive(Parser, Debug)]
#[command(name = "bili-mcp")]
#[command(version, about, long_about = None)]
struct Cli {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _cli = Cli::parse();

    // stdout carries the MCP stream; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bili_mcp=info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let client = Arc::new(BiliClient::new(&config)?);

    tracing::info!("starting bili-mcp stdio server");
    server::serve_stdio(client)
        .await
        .map_err(|e| anyhow::anyhow!("MCP server failed: {e}"))?;
    Ok(())
}
