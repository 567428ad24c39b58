//! Tool System
//!
//! Tools are registered once at startup and looked up by name. The registry
//! validates parameters against each tool's spec before the handler runs, so
//! handlers only ever see input whose required fields are present and typed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::Arguments;
use crate::protocol::WireToolSpec;

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str, default: Value) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: false,
            default: Some(default),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        }
    }
}

/// Tool definition (for discovery and LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSpec {
    /// JSON Schema object describing the parameters
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({"type": param.param_type, "description": param.description}),
            );
        }

        let mut schema = json!({"type": "object", "properties": properties});
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    /// Render as the worker announces it in the `initialize` response
    pub fn to_wire(&self) -> WireToolSpec {
        WireToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }

    /// Check parameters against the schema.
    ///
    /// Optional parameters that are absent are filled from their defaults.
    pub fn validate(&self, mut params: Arguments) -> Result<Arguments> {
        for param in &self.parameters {
            match params.get(&param.name) {
                Some(value) if !param.accepts(value) => {
                    return Err(AgentError::invalid_parameters(
                        &self.name,
                        format!(
                            "parameter '{}' must be of type {}",
                            param.name, param.param_type
                        ),
                    ));
                }
                Some(_) => {}
                None if param.required => {
                    return Err(AgentError::invalid_parameters(
                        &self.name,
                        format!("missing required parameter '{}'", param.name),
                    ));
                }
                None => {
                    if let Some(default) = &param.default {
                        params.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(params)
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's spec; called once at registration
    fn spec(&self) -> ToolSpec;

    /// Execute the tool with already-validated arguments, returning its result payload
    async fn execute(&self, params: &Arguments) -> Result<Value>;
}

/// Anything that can run a named operation: the in-process registry or a
/// client stub talking to a worker process.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, function_name: &str, parameters: Arguments) -> Result<Value>;
}

struct Registered {
    spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

/// Registry for available tools, read-only once built
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Registered>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool. A later registration under the same name replaces the earlier one.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let spec = tool.spec();
        tracing::debug!(tool = %spec.name, "registering tool");
        if let Some(&idx) = self.index.get(&spec.name) {
            self.tools[idx] = Registered { spec, tool };
        } else {
            self.index.insert(spec.name.clone(), self.tools.len());
            self.tools.push(Registered { spec, tool });
        }
    }

    /// Get a tool's spec by name
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&idx| &self.tools[idx].spec)
    }

    /// All specs, in registration order
    pub fn specs(&self) -> Vec<&ToolSpec> {
        self.tools.iter().map(|r| &r.spec).collect()
    }

    /// Wire rendering of all specs, in registration order
    pub fn wire_specs(&self) -> Vec<WireToolSpec> {
        self.tools.iter().map(|r| r.spec.to_wire()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|r| r.spec.name.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolDispatcher for ToolRegistry {
    async fn dispatch(&self, function_name: &str, parameters: Arguments) -> Result<Value> {
        let Some(&idx) = self.index.get(function_name) else {
            return Err(AgentError::UnknownOperation(function_name.to_string()));
        };
        let entry = &self.tools[idx];

        // Validate first
        let params = entry.spec.validate(parameters)?;

        entry.tool.execute(&params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".into(),
                description: "Echo the message back".into(),
                parameters: vec![
                    ParameterSchema::required("message", "string", "Text to echo"),
                    ParameterSchema::optional("times", "integer", "Repeat count", json!(1)),
                ],
            }
        }

        async fn execute(&self, params: &Arguments) -> Result<Value> {
            Ok(json!({"message": params["message"], "times": params["times"]}))
        }
    }

    fn args(value: Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        assert_eq!(registry.len(), 1);
        assert!(registry.spec("echo").is_some());
        assert!(registry.spec("unknown").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn test_input_schema_lists_required() {
        let schema = EchoTool.spec().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["message"]["type"], "string");
        assert_eq!(schema["required"], json!(["message"]));
    }

    #[tokio::test]
    async fn test_dispatch_fills_defaults() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let out = registry
            .dispatch("echo", args(json!({"message": "hi"})))
            .await
            .unwrap();
        assert_eq!(out, json!({"message": "hi", "times": 1}));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_operation() {
        let registry = ToolRegistry::new();
        let err = registry.dispatch("nope", Arguments::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownOperation(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_missing_and_mistyped() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let err = registry.dispatch("echo", Arguments::new()).await.unwrap_err();
        assert!(err.to_string().contains("missing required parameter 'message'"));

        let err = registry
            .dispatch("echo", args(json!({"message": 5})))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters { .. }));
    }
}
