use anyhow::Context;
use clap::{Parser, Subcommand};
use miga_adapter_pg::ConnectionProvider;
use miga_core::config::{self, DATABASE_URL_ENV};
use miga_core::Transport;
use miga_mcp::{McpServer, SseServer, SseServerState, ToolExecutor, ToolRegistry};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "miga", version, about = "Miga MCP tool server")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP over stdio for a single trusted local client.
    ///
    /// Uses a persistent connection pool; refuses to start when
    /// DATABASE_URL is not set.
    Stdio,

    /// Serve MCP over SSE for multiple remote clients.
    ///
    /// Requires MCP_API_KEY; the database connection string is resolved
    /// from DATABASE_URL per tool invocation and the pool is torn down
    /// after each call.
    Sse {
        /// Bind host.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Bind port.
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Stdio => run_stdio().await,
        Command::Sse { host, port } => run_sse(&host, port).await,
    }
}

async fn run_stdio() -> anyhow::Result<()> {
    // Persistent mode fails fast: without a connection string there is
    // nothing this process can serve.
    let database_url = config::database_url()
        .context("stdio transport requires a database connection string")?;

    let provider = ConnectionProvider::connect_persistent(&database_url)
        .await
        .context("failed to connect persistent pool")?;

    tracing::info!("connected persistent database pool");

    let registry = ToolRegistry::builtin(Transport::Stdio);
    let server = McpServer::new(ToolExecutor::new(registry, provider));

    server.run_stdio().await?;
    Ok(())
}

async fn run_sse(host: &str, port: u16) -> anyhow::Result<()> {
    // A server that cannot authenticate anyone is misconfigured.
    let api_key = config::api_key().context("SSE transport requires MCP_API_KEY")?;

    // Per-request lifecycle: the connection string is read from the
    // environment at invocation time; a missing value surfaces to the
    // caller as an error result, not a crash.
    let provider = ConnectionProvider::per_request(DATABASE_URL_ENV);

    let registry = ToolRegistry::builtin(Transport::Sse);
    let server = McpServer::new(ToolExecutor::new(registry, provider));
    let state = Arc::new(SseServerState::new(server, api_key));

    SseServer::new(host, port, state).run().await?;
    Ok(())
}
