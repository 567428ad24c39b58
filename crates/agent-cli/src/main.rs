//! fs-agent
//!
//! Terminal front end: spawns the filesystem tool server, connects a
//! chat-completions model and runs an interactive session.

mod prompt;
mod repl;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{Driver, DriverConfig, WindowConfig};
use agent_runtime::{ChatCompletionsGraph, ModelConfig, ToolServerClient, WorkerCommand};

const WORKER_BIN: &str = "fs-tool-server";

#[derive(Parser, Debug)]
#[command(name = "fs-agent")]
#[command(about = "Chat with a model that can work with your filesystem")]
#[command(version)]
struct Args {
    /// Tool server binary (default: fs-tool-server next to this executable)
    #[arg(long)]
    server: Option<PathBuf>,

    /// Non-system messages kept from earlier turns; 0 keeps everything
    #[arg(long, default_value_t = 8)]
    history_limit: usize,

    /// Drop tool calls and results from the carried history
    #[arg(long)]
    no_tool_history: bool,

    /// Seconds allowed for one turn
    #[arg(long, default_value_t = 60)]
    turn_timeout_secs: u64,

    /// Seconds allowed for the tool server to start and initialize
    #[arg(long, default_value_t = 30)]
    connect_timeout_secs: u64,

    /// Model id (overrides FS_AGENT_MODEL)
    #[arg(long)]
    model: Option<String>,
}

impl Args {
    fn window(&self) -> WindowConfig {
        WindowConfig {
            limit: Some(self.history_limit),
            include_tool_messages: !self.no_tool_history,
            hard_cap: None,
        }
    }

    fn server_path(&self) -> PathBuf {
        self.server.clone().unwrap_or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BIN)))
                .unwrap_or_else(|| PathBuf::from(WORKER_BIN))
        })
    }
}

/// Logs go to `<log_dir>/debug.log`; only warnings reach the terminal.
fn init_tracing(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("debug.log"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(tracing_subscriber::EnvFilter::new(
                    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
                )),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_dir = PathBuf::from(std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".into()));
    init_tracing(&log_dir)?;
    tracing::info!("=== fs-agent starting ===");

    let mut model = ModelConfig::from_env()?;
    if let Some(name) = &args.model {
        model = model.with_model(name);
    }
    tracing::info!(backend = ?model.backend, model = %model.model, "model configured");

    println!("\nFilesystem Agent (Delta Streaming)");
    println!("=====================================\n");
    println!("Type 'exit' to quit the program.\n");

    let command = WorkerCommand::new(args.server_path()).env("LOG_DIR", log_dir.display().to_string());
    let connect_timeout = Duration::from_secs(args.connect_timeout_secs);
    let client = match ToolServerClient::spawn(command, connect_timeout).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "tool server startup failed");
            println!("\nError: {}", e.user_message());
            return Ok(());
        }
    };
    tracing::info!(tools = client.tool_specs().len(), "tool server started");

    let graph = ChatCompletionsGraph::new(model, client.tool_specs())?;
    let driver = Driver::new(
        Arc::new(graph),
        client.clone(),
        DriverConfig {
            system_prompt: Some(prompt::system_prompt(chrono::Utc::now())),
            window: args.window(),
            turn_timeout: Duration::from_secs(args.turn_timeout_secs),
            ..DriverConfig::default()
        },
    );

    let result = repl::run(&driver).await;

    drop(driver);
    if let Ok(client) = Arc::try_unwrap(client) {
        client.shutdown().await;
    }
    tracing::info!("program exit");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["fs-agent"]).unwrap();
        assert_eq!(args.history_limit, 8);
        assert_eq!(args.turn_timeout_secs, 60);
        assert_eq!(args.connect_timeout_secs, 30);
        assert_eq!(args.window(), WindowConfig::default());
        assert!(args.server_path().ends_with(WORKER_BIN));
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "fs-agent",
            "--server",
            "/opt/bin/worker",
            "--history-limit",
            "0",
            "--no-tool-history",
            "--model",
            "gpt-4o-mini",
        ])
        .unwrap();
        assert_eq!(args.server_path(), PathBuf::from("/opt/bin/worker"));
        assert_eq!(args.window().limit, Some(0));
        assert!(!args.window().include_tool_messages);
        assert_eq!(args.model.as_deref(), Some("gpt-4o-mini"));
    }
}
