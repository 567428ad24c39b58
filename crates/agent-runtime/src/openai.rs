//! OpenAI-compatible chat-completions backend
//!
//! Implements `ModelGraph` over the `/chat/completions` endpoint, which
//! OpenAI, OpenRouter and Ollama's `/v1` API all serve. One model response
//! becomes one `CallTools` node; a response without tool calls ends the run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use agent_core::protocol::WireToolSpec;
use agent_core::{
    AgentError, Arguments, GraphRun, Message, MessagePart, ModelGraph, Node, Result, Role,
    ToolReturn,
};

use crate::config::ModelConfig;

/// Chat-completions model backend
pub struct ChatCompletionsGraph {
    client: reqwest::Client,
    config: Arc<ModelConfig>,
    tools: Arc<Vec<Value>>,
}

impl ChatCompletionsGraph {
    pub fn new(config: ModelConfig, tool_specs: &[WireToolSpec]) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        tracing::info!(
            model = %config.model,
            url = %config.completions_url(),
            tools = tool_specs.len(),
            "chat-completions backend ready"
        );

        Ok(Self {
            client,
            config: Arc::new(config),
            tools: Arc::new(tool_specs.iter().map(tool_definition).collect()),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[async_trait]
impl ModelGraph for ChatCompletionsGraph {
    async fn start(&self, history: &[Message], user_prompt: &str) -> Result<Box<dyn GraphRun>> {
        let mut messages = convert_messages(history);
        messages.push(json!({"role": "user", "content": user_prompt}));

        Ok(Box::new(ChatRun {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            tools: Arc::clone(&self.tools),
            messages,
            phase: Phase::NeedRequest,
        }))
    }
}

#[derive(Debug, PartialEq)]
enum Phase {
    NeedRequest,
    Requesting,
    AwaitReturns,
    Finished(String),
    Done,
}

struct ChatRun {
    client: reqwest::Client,
    config: Arc<ModelConfig>,
    tools: Arc<Vec<Value>>,
    messages: Vec<Value>,
    phase: Phase,
}

impl ChatRun {
    fn request_body(&self) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": self.messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        if !self.tools.is_empty() {
            body["tools"] = json!(*self.tools);
        }
        body
    }

    async fn send(&self) -> Result<ChatResponse> {
        tracing::debug!(messages = self.messages.len(), "sending chat completion request");

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body())
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "chat completion request failed");
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                AgentError::ProviderUnavailable(format!("{status}: {body}"))
            } else {
                AgentError::Provider(format!("{status}: {body}"))
            });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| AgentError::Provider(format!("malformed response: {e}")))
    }

    /// Record the model's answer and turn it into a node
    fn apply(&mut self, response: ChatResponse) -> Result<Node> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("response has no choices".into()))?;
        tracing::debug!(finish_reason = ?choice.finish_reason, "model responded");

        let text = choice.message.content.unwrap_or_default();
        let calls: Vec<(String, String, Arguments)> = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let id = if call.id.is_empty() {
                    uuid::Uuid::new_v4().to_string()
                } else {
                    call.id
                };
                let args = parse_arguments(&call.function.name, &call.function.arguments);
                (id, call.function.name, args)
            })
            .collect();

        let mut assistant = json!({"role": "assistant", "content": text});
        if !calls.is_empty() {
            assistant["tool_calls"] = calls
                .iter()
                .map(|(id, name, args)| tool_call_json(id, name, args))
                .collect();
        }
        self.messages.push(assistant);

        let mut parts = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            parts.push(MessagePart::text(text.clone()));
        }
        self.phase = if calls.is_empty() {
            Phase::Finished(text)
        } else {
            Phase::AwaitReturns
        };
        parts.extend(
            calls
                .into_iter()
                .map(|(id, name, args)| MessagePart::tool_call(id, name, args)),
        );

        Ok(Node::CallTools { parts })
    }
}

#[async_trait]
impl GraphRun for ChatRun {
    async fn next_node(&mut self) -> Result<Node> {
        match std::mem::replace(&mut self.phase, Phase::Done) {
            Phase::NeedRequest => {
                self.phase = Phase::Requesting;
                Ok(Node::ModelRequest)
            }
            Phase::Requesting => {
                let response = self.send().await?;
                self.apply(response)
            }
            Phase::AwaitReturns => {
                self.phase = Phase::AwaitReturns;
                Err(AgentError::Protocol(
                    "advanced before tool returns were delivered".into(),
                ))
            }
            Phase::Finished(output) => Ok(Node::End { output }),
            Phase::Done => Err(AgentError::Protocol("run already ended".into())),
        }
    }

    fn resume(&mut self, returns: Vec<ToolReturn>) {
        for ret in returns {
            self.messages.push(tool_result_json(&ret.tool_call_id, &ret.content));
        }
        self.phase = Phase::NeedRequest;
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    #[serde(default)]
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn tool_definition(spec: &WireToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.input_schema,
        }
    })
}

fn tool_call_json(id: &str, name: &str, args: &Arguments) -> Value {
    json!({
        "id": id,
        "type": "function",
        "function": {
            "name": name,
            "arguments": serde_json::to_string(args).unwrap_or_else(|_| "{}".into()),
        }
    })
}

fn tool_result_json(id: &str, content: &Value) -> Value {
    json!({
        "role": "tool",
        "tool_call_id": id,
        "content": content.to_string(),
    })
}

/// Models send arguments as a JSON string; anything unparseable becomes empty
/// and the registry reports what is missing.
fn parse_arguments(tool: &str, raw: &str) -> Arguments {
    if raw.trim().is_empty() {
        return Arguments::new();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(tool, error = %e, "unparseable tool arguments");
        Arguments::new()
    })
}

/// History in chat-completions form. Tool returns become `tool` role messages.
fn convert_messages(history: &[Message]) -> Vec<Value> {
    let mut out = Vec::with_capacity(history.len());

    for msg in history {
        let mut text = String::new();
        let mut calls = Vec::new();
        let mut returns = Vec::new();

        for part in &msg.parts {
            match part {
                MessagePart::SystemPrompt { content }
                | MessagePart::UserPrompt { content }
                | MessagePart::Text { content } => text.push_str(content),
                MessagePart::ToolCall {
                    tool_call_id,
                    tool_name,
                    arguments,
                } => calls.push(tool_call_json(tool_call_id, tool_name, arguments)),
                MessagePart::ToolReturn {
                    tool_call_id,
                    content,
                    ..
                } => returns.push(tool_result_json(tool_call_id, content)),
            }
        }

        match msg.role {
            Role::System => out.push(json!({"role": "system", "content": text})),
            Role::Assistant => {
                let mut value = json!({"role": "assistant", "content": text});
                if !calls.is_empty() {
                    value["tool_calls"] = Value::Array(calls);
                }
                out.push(value);
            }
            Role::User => {
                if !text.is_empty() || returns.is_empty() {
                    out.push(json!({"role": "user", "content": text}));
                }
                out.extend(returns);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;

    fn run() -> ChatRun {
        ChatRun {
            client: reqwest::Client::new(),
            config: Arc::new(ModelConfig::new(Backend::OpenAi, "key")),
            tools: Arc::new(vec![]),
            messages: vec![],
            phase: Phase::NeedRequest,
        }
    }

    fn response(value: Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_convert_history_with_tool_exchange() {
        let mut args = Arguments::new();
        args.insert("directory".into(), json!("."));
        let history = vec![
            Message::system("prompt"),
            Message::user("what is here?"),
            Message::assistant("Let me look."),
            Message::tool_call("call_1", "list_files", args),
            Message::tool_return("call_1", "list_files", json!({"files": ["a"]})),
        ];

        let out = convert_messages(&history);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], json!({"role": "system", "content": "prompt"}));
        assert_eq!(out[3]["tool_calls"][0]["function"]["name"], json!("list_files"));
        assert_eq!(
            out[3]["tool_calls"][0]["function"]["arguments"],
            json!("{\"directory\":\".\"}")
        );
        assert_eq!(
            out[4],
            json!({"role": "tool", "tool_call_id": "call_1", "content": "{\"files\":[\"a\"]}"})
        );
    }

    #[test]
    fn test_tool_definition_shape() {
        let spec = WireToolSpec {
            name: "read_file".into(),
            description: "Read the contents of a file".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        };
        assert_eq!(tool_definition(&spec)["function"]["name"], json!("read_file"));
        assert_eq!(tool_definition(&spec)["type"], json!("function"));
    }

    #[tokio::test]
    async fn test_tool_call_response_waits_for_returns() {
        let mut run = run();
        assert_eq!(run.next_node().await.unwrap(), Node::ModelRequest);

        let node = run
            .apply(response(json!({
                "choices": [{
                    "finish_reason": "tool_calls",
                    "message": {
                        "content": "Checking.",
                        "tool_calls": [
                            {"id": "c1", "type": "function",
                             "function": {"name": "read_file", "arguments": "{\"file_path\":\"a.txt\"}"}},
                            {"type": "function",
                             "function": {"name": "list_files", "arguments": ""}}
                        ]
                    }
                }]
            })))
            .unwrap();

        let Node::CallTools { parts } = node else {
            panic!("expected CallTools");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], MessagePart::text("Checking."));
        match &parts[2] {
            MessagePart::ToolCall {
                tool_call_id,
                arguments,
                ..
            } => {
                assert!(!tool_call_id.is_empty());
                assert!(arguments.is_empty());
            }
            other => panic!("expected tool call, got {other:?}"),
        }

        assert!(run.next_node().await.is_err());
        run.resume(vec![ToolReturn {
            tool_call_id: "c1".into(),
            tool_name: "read_file".into(),
            content: json!({"content": "hi"}),
        }]);
        assert_eq!(run.next_node().await.unwrap(), Node::ModelRequest);
        assert_eq!(run.messages.last().unwrap()["role"], json!("tool"));
    }

    #[tokio::test]
    async fn test_text_response_ends_the_run() {
        let mut run = run();
        run.next_node().await.unwrap();
        let node = run
            .apply(response(json!({
                "choices": [{"message": {"content": "All done."}, "finish_reason": "stop"}]
            })))
            .unwrap();
        assert_eq!(
            node,
            Node::CallTools {
                parts: vec![MessagePart::text("All done.")]
            }
        );
        assert_eq!(
            run.next_node().await.unwrap(),
            Node::End {
                output: "All done.".into()
            }
        );
        assert!(run.next_node().await.is_err());
    }

    #[test]
    fn test_empty_choices_is_a_provider_error() {
        let err = run().apply(response(json!({"choices": []}))).unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }
}
