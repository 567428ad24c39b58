//! # agent-runtime
//!
//! The pieces that touch the outside world: the worker client stub, the
//! model backend and the environment configuration.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{ChatCompletionsGraph, ModelConfig, ToolServerClient, WorkerCommand};
//!
//! let tools = ToolServerClient::spawn(WorkerCommand::new("fs-tool-server"), Duration::from_secs(30)).await?;
//! let graph = ChatCompletionsGraph::new(ModelConfig::from_env()?, tools.tool_specs())?;
//! let driver = Driver::new(Arc::new(graph), Arc::new(tools), DriverConfig::default());
//! ```

pub mod client;
pub mod config;
pub mod openai;

pub use client::{ToolServerClient, WorkerCommand};
pub use config::{Backend, ModelConfig};
pub use openai::ChatCompletionsGraph;

// Re-export core types for convenience
pub use agent_core::{AgentError, Driver, DriverConfig, History, Result, ToolDispatcher};
