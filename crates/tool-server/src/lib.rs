//! # tool-server
//!
//! Worker side of the tool protocol: reads one JSON request per line,
//! dispatches it to a [`agent_core::ToolRegistry`] and writes one JSON reply
//! per line. The `fs-tool-server` binary serves the filesystem tools over stdio.

pub mod server;

pub use server::{ProtocolServer, ServerState};
