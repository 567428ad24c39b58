//! Execution graph interface
//!
//! A model backend exposes one turn as a sequence of nodes. The driver pulls
//! nodes one at a time; after a [`Node::CallTools`] that carried tool calls it
//! hands the results back with [`GraphRun::resume`] before pulling again.
//!
//! ```text
//!   ModelRequest ──▶ CallTools ──(tool calls)──▶ ModelRequest ──▶ ...
//!                        │
//!                        └──(text only)──▶ End
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Message, MessagePart};

/// One observable unit of progress in a turn
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// A request is about to be sent to the model
    ModelRequest,

    /// The model answered; parts are `Text` and `ToolCall` in model order
    CallTools { parts: Vec<MessagePart> },

    /// The turn is over
    End { output: String },
}

impl Node {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ModelRequest => "model_request",
            Self::CallTools { .. } => "call_tools",
            Self::End { .. } => "end",
        }
    }
}

/// Result of one tool call, fed back into the graph
#[derive(Clone, Debug, PartialEq)]
pub struct ToolReturn {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: serde_json::Value,
}

impl From<ToolReturn> for MessagePart {
    fn from(ret: ToolReturn) -> Self {
        Self::tool_return(ret.tool_call_id, ret.tool_name, ret.content)
    }
}

/// One in-progress turn against the model
#[async_trait]
pub trait GraphRun: Send {
    /// Advance to the next node
    async fn next_node(&mut self) -> Result<Node>;

    /// Deliver the returns for the tool calls of the last `CallTools` node
    fn resume(&mut self, returns: Vec<ToolReturn>);
}

/// Strategy trait for model backends
///
/// The driver works exclusively through this interface; it never performs
/// inference itself.
#[async_trait]
pub trait ModelGraph: Send + Sync {
    /// Begin a turn with the given (already windowed) history and user prompt
    async fn start(&self, history: &[Message], user_prompt: &str) -> Result<Box<dyn GraphRun>>;
}
