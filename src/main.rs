use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent4ba::config::Settings;
use agent4ba::engine::HierarchyEngine;
use agent4ba::models::{SummarizeProjectInput, DEFAULT_SUMMARY_DEPTH};
use agent4ba::tools::{Tool, Toolbox, TracingAudit, DEFAULT_RUN_ID};
use agent4ba::{api, mcp};

#[derive(Parser)]
#[command(name = "a4ba")]
#[command(about = "Project hierarchy backend for AI-assisted business analysis")]
struct Cli {
    /// SQLite database file (overrides A4BA_DATABASE)
    #[arg(long, global = true)]
    database: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API (overrides A4BA_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Start MCP server via stdio
    Mcp,
    /// Print a project's outline and per-type counts
    Summary {
        project_id: i64,

        /// Number of levels to render
        #[arg(short, long, default_value_t = DEFAULT_SUMMARY_DEPTH)]
        depth: usize,
    },
}

/// Initialize tracing with output to stderr (for MCP mode) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "agent4ba=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // MCP mode: log to stderr so stdout is clean for protocol
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    tracing::info!("Starting Agent4BA server on port {}", settings.port);

    let db = settings.open_database()?;
    let app = api::create_router_with_settings(db, &settings);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", settings.port)).await?;
    tracing::info!(
        "Agent4BA server listening on http://127.0.0.1:{}",
        settings.port
    );

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // MCP mode needs stderr for logging since stdout is the protocol channel.
    // The summary command prints its result on stdout too.
    let use_stderr = matches!(
        cli.command,
        Some(Commands::Mcp) | Some(Commands::Summary { .. })
    );
    init_tracing(use_stderr);

    let mut settings = Settings::from_env();
    if cli.database.is_some() {
        settings.database = cli.database;
    }

    match cli.command {
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                settings.port = port;
            }
            serve(settings).await?;
        }
        Some(Commands::Mcp) => {
            let db = settings.open_database()?;
            mcp::run_stdio_server(db).await?;
        }
        Some(Commands::Summary { project_id, depth }) => {
            let db = settings.open_database()?;
            // Local reads are logged, not persisted as run steps.
            let tools = Toolbox::new(HierarchyEngine::new(db), Arc::new(TracingAudit));
            let input = SummarizeProjectInput { project_id, depth };
            let summary = tools.invoke(DEFAULT_RUN_ID, Tool::SummarizeProject, &input, |engine| {
                engine.summarize_project(input.project_id, input.depth)
            })?;

            if !summary.text.is_empty() {
                println!("{}", summary.text);
                println!();
            }
            for (item_type, count) in &summary.counts {
                println!("{:<12}{}", item_type.to_string(), count);
            }
        }
        None => serve(settings).await?,
    }

    Ok(())
}
