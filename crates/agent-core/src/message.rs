//! Conversation Messages
//!
//! Standard message format used across the agent system. A message is a
//! role tag plus an ordered list of parts; tool calls and their returns are
//! parts, which is what lets the windower reason about pairing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tool call arguments as key-value pairs
pub type Arguments = HashMap<String, serde_json::Value>;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input and tool returns
    User,
    /// Assistant (LLM) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One part of a message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "kebab-case")]
pub enum MessagePart {
    SystemPrompt {
        content: String,
    },
    UserPrompt {
        content: String,
    },
    Text {
        content: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        arguments: Arguments,
    },
    ToolReturn {
        tool_call_id: String,
        tool_name: String,
        content: serde_json::Value,
    },
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Arguments,
    ) -> Self {
        Self::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    pub fn tool_return(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self::ToolReturn {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content,
        }
    }

    /// Whether this part belongs to a tool exchange
    pub const fn is_tool_part(&self) -> bool {
        matches!(self, Self::ToolCall { .. } | Self::ToolReturn { .. })
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Ordered parts
    pub parts: Vec<MessagePart>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            role,
            parts,
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(
            Role::System,
            vec![MessagePart::SystemPrompt {
                content: content.into(),
            }],
        )
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(
            Role::User,
            vec![MessagePart::UserPrompt {
                content: content.into(),
            }],
        )
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![MessagePart::text(content)])
    }

    /// Create an assistant message carrying one tool call
    pub fn tool_call(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Arguments,
    ) -> Self {
        Self::new(
            Role::Assistant,
            vec![MessagePart::tool_call(tool_call_id, tool_name, arguments)],
        )
    }

    /// Create a tool return message
    pub fn tool_return(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self::new(
            Role::User,
            vec![MessagePart::tool_return(tool_call_id, tool_name, content)],
        )
    }

    pub fn is_system(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, MessagePart::SystemPrompt { .. }))
    }

    pub fn has_tool_parts(&self) -> bool {
        self.parts.iter().any(MessagePart::is_tool_part)
    }

    /// Ids of the tool calls carried by this message
    pub fn tool_call_ids(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            MessagePart::ToolCall { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
    }

    /// Ids referenced by the tool returns carried by this message
    pub fn tool_return_ids(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            MessagePart::ToolReturn { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of all `Text` parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }
}
