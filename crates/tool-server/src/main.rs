//! fs-tool-server
//!
//! Serves the filesystem tools over stdin/stdout. Stdout carries protocol
//! replies only; logs go to stderr and `$LOG_DIR/filesystem_mcp.log`.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tool_server::ProtocolServer;

const LOG_FILE: &str = "filesystem_mcp.log";

fn init_tracing() -> anyhow::Result<PathBuf> {
    let log_dir = PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| ".".into()));
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let log_path = init_tracing()?;
    tracing::info!("=== Filesystem tool server starting ===");
    tracing::info!(log_file = %log_path.display(), "logging initialized");
    if let Ok(cwd) = std::env::current_dir() {
        tracing::info!(cwd = %cwd.display(), "working directory");
    }

    let registry = fs_tools::filesystem_registry();
    tracing::info!("Registered {} tools:", registry.len());
    for name in registry.names() {
        tracing::info!("  • {}", name);
    }

    let server = ProtocolServer::new(Arc::new(registry));
    let result = server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "server loop ended with an error");
    }
    tracing::info!("Filesystem tool server shutting down");
    result.map_err(Into::into)
}
