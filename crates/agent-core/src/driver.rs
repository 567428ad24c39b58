//! Execution-graph driver
//!
//! Runs one conversational turn: windows the history, starts a graph run,
//! and walks its nodes. Text is streamed out as it arrives; tool calls are
//! dispatched one at a time and their results fed back before the next node
//! is requested. Only a turn that reaches its end node is committed to history.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::accumulator::TurnAccumulator;
use crate::error::{AgentError, Result};
use crate::graph::{GraphRun, ModelGraph, Node, ToolReturn};
use crate::history::{History, WindowConfig};
use crate::message::{Arguments, Message, MessagePart};
use crate::tool::ToolDispatcher;

/// Driver configuration
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Installed as the first message when the history has none
    pub system_prompt: Option<String>,

    /// Window applied to the previous history before each turn
    pub window: WindowConfig,

    /// Bound on a whole turn, tool calls included
    pub turn_timeout: Duration,

    /// Maximum graph nodes per turn before giving up
    pub max_nodes: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            window: WindowConfig::default(),
            turn_timeout: Duration::from_secs(60),
            max_nodes: 50,
        }
    }
}

/// Progress reported while a turn runs
#[derive(Clone, Debug, PartialEq)]
pub enum TurnEvent {
    /// A text fragment from the model
    Text(String),
    /// A tool call about to be dispatched
    ToolCall {
        id: String,
        name: String,
        arguments: Arguments,
    },
    /// A tool call finished
    ToolResult {
        id: String,
        name: String,
        is_error: bool,
    },
    /// The turn failed or timed out
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    Failed(String),
    TimedOut,
}

/// What a turn hands back to the caller
#[derive(Debug)]
pub struct TurnOutcome {
    /// Everything shown to the user, including a trailing error notice on failure
    pub output: String,
    /// History to pass into the next turn
    pub history: History,
    pub status: TurnStatus,
}

impl TurnOutcome {
    pub fn is_committed(&self) -> bool {
        self.status == TurnStatus::Completed
    }
}

/// Report progress without waiting on the receiver. A full channel drops the
/// event; the committed history never depends on what the listener saw.
fn emit(events: &mpsc::Sender<TurnEvent>, event: TurnEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            tracing::warn!(?event, "event channel full, dropping turn event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::trace!("event receiver gone");
        }
    }
}

/// Drives turns against a model graph. Holds no state between turns.
pub struct Driver {
    graph: Arc<dyn ModelGraph>,
    tools: Arc<dyn ToolDispatcher>,
    config: DriverConfig,
}

impl Driver {
    pub fn new(
        graph: Arc<dyn ModelGraph>,
        tools: Arc<dyn ToolDispatcher>,
        config: DriverConfig,
    ) -> Self {
        Self {
            graph,
            tools,
            config,
        }
    }

    /// Get configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Run one turn. On failure or timeout the returned history is `previous`, untouched.
    pub async fn run_turn(
        &self,
        user_input: &str,
        previous: History,
        events: &mpsc::Sender<TurnEvent>,
    ) -> TurnOutcome {
        let mut base = previous.windowed(&self.config.window);
        if let Some(prompt) = &self.config.system_prompt {
            base.ensure_system_prompt(prompt);
        }
        tracing::info!(
            previous = previous.len(),
            windowed = base.len(),
            "starting turn"
        );

        let mut acc = TurnAccumulator::new();
        let result = tokio::time::timeout(
            self.config.turn_timeout,
            self.drive(&mut acc, base.messages(), user_input, events),
        )
        .await;

        let err = match result {
            Ok(Ok(())) => {
                let (output, turn) = acc.finalize(user_input);
                tracing::info!(
                    output_len = output.len(),
                    new_messages = turn.len(),
                    "turn complete"
                );
                base.commit(turn);
                return TurnOutcome {
                    output,
                    history: base,
                    status: TurnStatus::Completed,
                };
            }
            Ok(Err(e)) => e,
            Err(_) => AgentError::TurnTimeout(self.config.turn_timeout.as_secs()),
        };

        let (message, status) = match &err {
            AgentError::TurnTimeout(_) => (err.user_message(), TurnStatus::TimedOut),
            _ => (err.to_string(), TurnStatus::Failed(err.to_string())),
        };
        tracing::error!(
            error = %err,
            retryable = err.is_retryable(),
            pending_calls = acc.pending(),
            "turn aborted"
        );
        emit(events, TurnEvent::Error(message.clone()));

        TurnOutcome {
            output: format!("{}\n\nError: {}", acc.output(), message),
            history: previous,
            status,
        }
    }

    async fn drive(
        &self,
        acc: &mut TurnAccumulator,
        history: &[Message],
        user_input: &str,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<()> {
        let mut run = self.graph.start(history, user_input).await?;

        for step in 0..self.config.max_nodes {
            let node = run.next_node().await?;
            tracing::debug!(step, kind = node.kind(), "graph node");

            match node {
                Node::ModelRequest => {}
                Node::CallTools { parts } => {
                    self.handle_call_tools(acc, run.as_mut(), parts, events)
                        .await?;
                }
                Node::End { output } => {
                    tracing::debug!(final_len = output.len(), "end node reached");
                    return Ok(());
                }
            }
        }

        Err(AgentError::MaxIterations(self.config.max_nodes))
    }

    async fn handle_call_tools(
        &self,
        acc: &mut TurnAccumulator,
        run: &mut dyn GraphRun,
        parts: Vec<MessagePart>,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<()> {
        let mut returns = Vec::new();

        for part in parts {
            match part {
                MessagePart::Text { content } => {
                    if content.trim().is_empty() {
                        continue;
                    }
                    acc.add_text(content.clone());
                    emit(events, TurnEvent::Text(content));
                }
                MessagePart::ToolCall {
                    tool_call_id,
                    tool_name,
                    arguments,
                } => {
                    let tool_call_id = if tool_call_id.is_empty() {
                        uuid::Uuid::new_v4().to_string()
                    } else {
                        tool_call_id
                    };
                    tracing::info!(tool = %tool_name, id = %tool_call_id, "tool call");
                    let slot = acc.add_tool_call(&tool_call_id, &tool_name, arguments.clone());
                    emit(
                        events,
                        TurnEvent::ToolCall {
                            id: tool_call_id.clone(),
                            name: tool_name.clone(),
                            arguments: arguments.clone(),
                        },
                    );

                    let value = self.call_tool(&tool_name, arguments).await?;
                    let is_error = value.get("error").is_some();
                    acc.add_tool_result(slot, value.clone());
                    emit(
                        events,
                        TurnEvent::ToolResult {
                            id: tool_call_id.clone(),
                            name: tool_name.clone(),
                            is_error,
                        },
                    );

                    returns.push(ToolReturn {
                        tool_call_id,
                        tool_name,
                        content: value,
                    });
                }
                MessagePart::SystemPrompt { .. }
                | MessagePart::UserPrompt { .. }
                | MessagePart::ToolReturn { .. } => {
                    tracing::warn!("ignoring request-side part in model response");
                }
            }
        }

        if !returns.is_empty() {
            run.resume(returns);
        }
        Ok(())
    }

    /// Dispatch one call. Dispatch-level failures go back to the model as an
    /// error payload; transport failures abort the turn.
    async fn call_tool(&self, name: &str, arguments: Arguments) -> Result<Value> {
        match self.tools.dispatch(name, arguments).await {
            Ok(value) => Ok(value),
            Err(
                e @ (AgentError::UnknownOperation(_)
                | AgentError::InvalidParameters { .. }
                | AgentError::Remote(_)),
            ) => {
                tracing::warn!(tool = %name, error = %e, "tool dispatch failed");
                Ok(json!({"error": e.to_string()}))
            }
            Err(e) => Err(e),
        }
    }
}
