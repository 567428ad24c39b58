//! # agent-core
//!
//! Core agent logic: the tool registry, the worker wire protocol, the
//! history windower and the execution-graph driver.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Driver                              │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  Windower   │──│  ModelGraph      │──│ ToolDispatcher  │  │
//! │  │  (history)  │  │  (Strategy)      │  │ (registry/RPC)  │  │
//! │  └─────────────┘  └──────────────────┘  └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ModelGraph` trait keeps the driver independent of the model backend;
//! `ToolDispatcher` lets the same driver call tools in-process or through a
//! worker process speaking the line protocol in [`protocol`].

pub mod accumulator;
pub mod driver;
pub mod error;
pub mod graph;
pub mod history;
pub mod message;
pub mod protocol;
pub mod tool;

pub use driver::{Driver, DriverConfig, TurnEvent, TurnOutcome, TurnStatus};
pub use error::{AgentError, Result};
pub use graph::{GraphRun, ModelGraph, Node, ToolReturn};
pub use history::{History, WindowConfig};
pub use message::{Arguments, Message, MessagePart, Role};
pub use tool::{ParameterSchema, Tool, ToolDispatcher, ToolRegistry, ToolSpec};
