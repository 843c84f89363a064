//! sqlchat MCP server
//!
//! Model Context Protocol server that lets a client chat with a relational
//! database: questions become SQL and natural-language answers, and plot
//! requests become PNG charts.

use std::sync::Arc;

use rust_mcp_sdk::mcp_server::{hyper_server, HyperServerOptions};
use sqlchat_chart::ChartAnalyst;
use sqlchat_core::ChatModel;
use tracing::info;

mod config;
mod llm;
mod logging;
mod mcp;
mod sessions;

use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config_path =
        std::env::var("SQLCHAT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;
    config.apply_logging_env();
    logging::init();

    let api_key = Config::llm_api_key()?;
    let llm: Arc<dyn ChatModel> = Arc::new(llm::OpenAiChatModel::new(&config.llm, api_key));
    info!(
        config = %config_path,
        model = %llm.model_name(),
        api_base = %config.llm.api_base,
        "LLM configured"
    );

    std::fs::create_dir_all(&config.charts.directory)?;
    let analytics = Arc::new(
        ChartAnalyst::new(llm.clone(), config.charts.directory.clone())
            .with_max_retries(config.charts.max_retries),
    );

    let handler = mcp::SqlChatServerHandler::new(llm, analytics, config.database.clone());
    let server_info = mcp::SqlChatServerHandler::server_info();

    info!(
        "Starting sqlchat MCP server on {}:{}",
        config.server.host, config.server.port
    );
    info!(
        charts = %config.charts.directory.display(),
        read_only = config.database.read_only,
        "server settings"
    );

    let server = hyper_server::create_server(
        server_info,
        handler,
        HyperServerOptions {
            host: config.server.host.clone(),
            port: config.server.port,
            sse_support: true,
            ..Default::default()
        },
    );

    server.start().await?;

    Ok(())
}
