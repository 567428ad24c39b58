//! Worker wire protocol
//!
//! One JSON document per line in each direction. The client sends a
//! [`Request`]; the worker answers every request with exactly one line: an
//! [`InitializeResult`] for `initialize`, otherwise a [`Response`] envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

pub const SCHEMA_VERSION: &str = "v1";
pub const CAPABILITY_FUNCTION_CALLING: &str = "function_calling";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_EXECUTE_FUNCTION: &str = "execute_function";

/// Request sent to the worker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl Request {
    pub fn initialize() -> Self {
        Self {
            method: Some(METHOD_INITIALIZE.into()),
            ..Default::default()
        }
    }

    pub fn execute(function_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            method: Some(METHOD_EXECUTE_FUNCTION.into()),
            function_name: Some(function_name.into()),
            parameters: Some(parameters),
        }
    }
}

/// Result/error envelope. Exactly one side is present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub const fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn invalid_json(detail: impl std::fmt::Display) -> Self {
        Self::err(format!("Invalid JSON: {detail}"))
    }

    pub fn unknown_method(method: Option<&str>) -> Self {
        Self::err(format!("Unknown method: {}", method.unwrap_or("None")))
    }

    /// Unwrap the envelope into the result payload
    pub fn into_result(self) -> Result<Value> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(AgentError::Remote(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(AgentError::Protocol(
                "response carries neither result nor error".into(),
            )),
        }
    }
}

/// Tool spec as announced on the wire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Answer to `initialize`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    pub schema_version: String,
    pub capabilities: Vec<String>,
    pub tool_specs: Vec<WireToolSpec>,
}

impl InitializeResult {
    pub fn new(tool_specs: Vec<WireToolSpec>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.into(),
            capabilities: vec![CAPABILITY_FUNCTION_CALLING.into()],
            tool_specs,
        }
    }
}

/// Any line the worker writes
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Initialize(InitializeResult),
    Envelope(Response),
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Envelope(response)
    }
}
