//! deepspec — Gemini chat console with MCP tool calling.
//!
//! Usage:
//!   deepspec [chat]     Interactive console (default)
//!   deepspec server     Serve the external tools over MCP
//!   deepspec status     Check the configured MCP server once

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use deepspec::agent::ConversationLoop;
use deepspec::config::{self, DeepspecConfig, CONFIG_FILE};
use deepspec::console::App;
use deepspec::mcp::client::{result_failed, result_text};
use deepspec::mcp::{server, ConnectionManager, HttpConnector, McpClient};
use deepspec::tools::{self, ToolDispatcher, HEALTH_TOOL};
use deepspec::vertex::VertexClient;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "deepspec")]
#[command(version = "0.1.0")]
#[command(about = "Gemini chat console with MCP tool calling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to deepspec home directory.
    #[arg(long, default_value_os_t = config::default_home_dir())]
    home: PathBuf,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the interactive chat console.
    Chat,

    /// Run the MCP server.
    Server,

    /// Check the configured MCP server and exit.
    Status,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load(&cli.home)?;
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            // stdout belongs to the console, so logs go to a file.
            let _guard = init_file_logging(&config, log_level)?;
            cmd_chat(config).await
        }
        Commands::Server => {
            init_stderr_logging(log_level);
            cmd_server(config).await
        }
        Commands::Status => {
            init_stderr_logging(log_level);
            cmd_status(config).await
        }
    }
}

fn env_filter(log_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
}

fn init_stderr_logging(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn init_file_logging(
    config: &DeepspecConfig,
    log_level: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let path = PathBuf::from(config.resolved_log_file());
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .context("log_file must name a file")?
        .to_owned();

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(guard)
}

fn load(home_dir: &Path) -> Result<DeepspecConfig> {
    let config_path = home_dir.join(CONFIG_FILE);
    config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_chat(config: DeepspecConfig) -> Result<()> {
    info!("Starting chat console (mcp: {})", config.mcp_server_url);

    let connector = HttpConnector::new(&config.mcp_server_url, config.request_timeout());
    let manager = Arc::new(ConnectionManager::new(Arc::new(connector)));

    let internal = Arc::new(tools::internal_registry());
    let conversation = VertexClient::new(&config, internal.definitions()).map(|client| {
        info!("Using model {}", client.model());
        ConversationLoop::new(
            Arc::new(client),
            ToolDispatcher::new(internal.clone()),
            config.max_tool_rounds,
        )
    });

    deepspec::console::render::banner(
        conversation.as_ref().ok().map(|_| config.model_name.as_str()),
        &config.mcp_server_url,
    );

    App::run(manager, conversation, config.health_check_interval()).await
}

async fn cmd_server(config: DeepspecConfig) -> Result<()> {
    let registry = Arc::new(tools::external_registry());
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutting down MCP server...");
        shutdown.cancel();
    });

    server::serve(
        &config.server_addr,
        registry,
        config.session_idle_timeout(),
        cancel,
    )
    .await
}

async fn cmd_status(config: DeepspecConfig) -> Result<()> {
    let shown = config.redacted();

    println!();
    println!("{}", "=== deepspec status ===".bold());
    println!();
    println!("  {}:", "Backend".bold());
    if shown.has_backend() {
        println!("    Project:  {}", shown.gcp_project_id);
        println!("    Location: {}", shown.gcp_location);
        println!("    Model:    {}", shown.model_name);
        println!("    Token:    {}", or_dash(&shown.access_token));
    } else {
        println!("    {}", "not configured".yellow());
    }
    println!();
    println!("  {}:", "MCP".bold());
    println!("    Endpoint: {}", shown.mcp_server_url);

    let healthy = match check_server(&config).await {
        Ok(report) => {
            println!("    Server:   {}", report.server);
            println!("    Tools:    {}", report.tools.join(", "));
            if !report.detail.is_empty() {
                println!("    Detail:   {}", report.detail);
            }
            report.healthy
        }
        Err(e) => {
            println!("    Error:    {}", e.to_string().red());
            false
        }
    };
    println!("    Health:   {}", colorize_health(healthy));
    println!();

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct ServerReport {
    server: String,
    tools: Vec<String>,
    healthy: bool,
    detail: String,
}

/// One handshake, tool listing and health call, then close the session.
async fn check_server(config: &DeepspecConfig) -> Result<ServerReport> {
    let client = McpClient::connect(&config.mcp_server_url, config.request_timeout())
        .await
        .context("MCP handshake failed")?;

    let tools = client.list_tools().await?;
    let health = client.call_tool(HEALTH_TOOL, Default::default()).await?;

    let server = match client.server_info().await {
        Some(info) => format!("{} {}", info.name, info.version),
        None => "-".to_string(),
    };
    let healthy = !result_failed(&health);
    let report = ServerReport {
        server,
        tools: tools.into_iter().map(|t| t.name.to_string()).collect(),
        healthy,
        detail: if healthy { String::new() } else { result_text(&health) },
    };

    if let Err(e) = client.close().await {
        warn!("Failed to close MCP session: {}", e);
    }
    Ok(report)
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn colorize_health(healthy: bool) -> String {
    if healthy {
        "online".green().to_string()
    } else {
        "offline".red().bold().to_string()
    }
}
