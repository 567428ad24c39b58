//! Protocol server loop
//!
//! ```text
//!   AwaitingLine ──(line)──▶ handle ──▶ write reply ──▶ AwaitingLine
//!        │
//!        └──(end of stream)──▶ ShuttingDown
//! ```
//!
//! Requests are handled strictly one at a time. Each dispatch runs in its own
//! task so a panicking handler becomes an error reply instead of taking the
//! loop down.

use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use agent_core::protocol::{
    InitializeResult, METHOD_EXECUTE_FUNCTION, METHOD_INITIALIZE, Reply, Request, Response,
};
use agent_core::{AgentError, Arguments, Result, ToolDispatcher, ToolRegistry};

/// Where the loop stands after a step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    AwaitingLine,
    ShuttingDown,
}

/// Serves one client over a line-oriented duplex stream
pub struct ProtocolServer {
    registry: Arc<ToolRegistry>,
}

impl ProtocolServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Run until the input ends. Only a failed write to `writer` is an error.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(tools = self.registry.len(), "protocol server loop starting");
        let mut buf = Vec::new();

        while self.step(&mut reader, &mut writer, &mut buf).await? == ServerState::AwaitingLine {}

        tracing::info!("protocol server shutting down");
        Ok(())
    }

    async fn step<R, W>(&self, reader: &mut R, writer: &mut W, buf: &mut Vec<u8>) -> Result<ServerState>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        buf.clear();
        tracing::debug!("waiting for input line");
        let read = match reader.read_until(b'\n', buf).await {
            Ok(read) => read,
            Err(e) => {
                tracing::error!(error = %e, "input stream failed, shutting down");
                return Ok(ServerState::ShuttingDown);
            }
        };
        if read == 0 {
            tracing::info!("end of input stream");
            return Ok(ServerState::ShuttingDown);
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            return Ok(ServerState::AwaitingLine);
        }

        let reply = self.handle_line(buf).await;
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        tracing::debug!(bytes = out.len(), "sending response");
        writer.write_all(&out).await?;
        writer.flush().await?;

        Ok(ServerState::AwaitingLine)
    }

    /// Turn one raw input line into exactly one reply
    pub async fn handle_line(&self, line: &[u8]) -> Reply {
        let value: Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, line = %String::from_utf8_lossy(line).trim_end(), "invalid JSON");
                return Response::invalid_json(e).into();
            }
        };
        let Value::Object(mut fields) = value else {
            return Response::err(AgentError::Protocol("request must be a JSON object".into()).to_string())
                .into();
        };
        // Non-string names still get the unknown method/function reply, rendered raw.
        for key in ["method", "function_name"] {
            if let Some(field) = fields.get_mut(key) {
                if !field.is_string() && !field.is_null() {
                    *field = Value::String(field.to_string());
                }
            }
        }
        let request: Request = match serde_json::from_value(Value::Object(fields)) {
            Ok(request) => request,
            Err(e) => return Response::err(AgentError::Protocol(e.to_string()).to_string()).into(),
        };

        self.handle_request(request).await
    }

    pub async fn handle_request(&self, request: Request) -> Reply {
        tracing::info!(method = ?request.method, "handling request");

        match request.method.as_deref() {
            Some(METHOD_INITIALIZE) => {
                Reply::Initialize(InitializeResult::new(self.registry.wire_specs()))
            }
            Some(METHOD_EXECUTE_FUNCTION) => {
                let response = match self.execute(request.function_name, request.parameters).await {
                    Ok(result) => Response::ok(result),
                    Err(e) => {
                        tracing::warn!(error = %e, "execute_function failed");
                        Response::err(e.to_string())
                    }
                };
                response.into()
            }
            other => {
                tracing::warn!(method = ?other, "unknown method");
                Response::unknown_method(other).into()
            }
        }
    }

    async fn execute(&self, function_name: Option<String>, parameters: Option<Value>) -> Result<Value> {
        let name = function_name.ok_or_else(|| AgentError::UnknownOperation("None".into()))?;
        let params: Arguments = match parameters {
            None | Some(Value::Null) => Arguments::new(),
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(_) => {
                return Err(AgentError::invalid_parameters(&name, "parameters must be an object"));
            }
        };
        tracing::info!(function = %name, ?params, "executing function");

        let registry = Arc::clone(&self.registry);
        let task = tokio::spawn(async move { registry.dispatch(&name, params).await });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                let detail = panic_message(e.into_panic());
                tracing::error!(%detail, "handler panicked");
                Err(AgentError::Other(format!("Server error: {detail}")))
            }
            Err(e) => Err(AgentError::Other(format!("Server error: {e}"))),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{Tool, ToolSpec};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, BufReader};

    struct Explodes;

    #[async_trait]
    impl Tool for Explodes {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "explode".into(),
                description: "Always panics".into(),
                parameters: vec![],
            }
        }

        async fn execute(&self, _params: &Arguments) -> Result<Value> {
            panic!("kaboom")
        }
    }

    fn server() -> ProtocolServer {
        let mut registry = fs_tools::filesystem_registry();
        registry.register(Explodes);
        ProtocolServer::new(Arc::new(registry))
    }

    async fn run(input: &str) -> Vec<Value> {
        let mut out = Vec::new();
        server().serve(input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_bad_json_then_valid_line() {
        let replies = run("{bad json\n{\"method\": \"initialize\"}\n").await;
        assert_eq!(replies.len(), 2);
        assert!(
            replies[0]["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid JSON: ")
        );
        assert_eq!(replies[1]["schema_version"], json!("v1"));
        assert_eq!(replies[1]["capabilities"], json!(["function_calling"]));
        assert_eq!(replies[1]["tool_specs"][0]["name"], json!("list_files"));
    }

    #[tokio::test]
    async fn test_unknown_method_and_function() {
        let input = concat!(
            "{\"method\": \"ping\"}\n",
            "{}\n",
            "{\"method\": \"execute_function\", \"function_name\": \"rm_rf\"}\n",
            "{\"method\": \"execute_function\"}\n",
            "{\"method\": 1}\n",
            "{\"method\": \"execute_function\", \"function_name\": [\"read_file\"]}\n",
            "{\"method\": \"execute_function\", \"function_name\": \"list_files\", \"parameters\": {\"directory\": \"/nonexistent\"}}\n",
        );
        let replies = run(input).await;
        assert_eq!(
            replies,
            vec![
                json!({"error": "Unknown method: ping"}),
                json!({"error": "Unknown method: None"}),
                json!({"error": "Unknown function: rm_rf"}),
                json!({"error": "Unknown function: None"}),
                json!({"error": "Unknown method: 1"}),
                json!({"error": "Unknown function: [\"read_file\"]"}),
                json!({"result": {
                    "files": [],
                    "directories": [],
                    "path": "/nonexistent",
                    "error": "Directory '/nonexistent' not found"
                }}),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_parameters_and_non_object_requests() {
        let input = concat!(
            "{\"method\": \"execute_function\", \"function_name\": \"read_file\", \"parameters\": {}}\n",
            "{\"method\": \"execute_function\", \"function_name\": \"read_file\", \"parameters\": [1]}\n",
            "[\"initialize\"]\n",
            "\n",
            "   \n",
        );
        let replies = run(input).await;
        assert_eq!(replies.len(), 3);
        assert_eq!(
            replies[0],
            json!({"error": "Invalid parameters for read_file: missing required parameter 'file_path'"})
        );
        assert_eq!(
            replies[1],
            json!({"error": "Invalid parameters for read_file: parameters must be an object"})
        );
        assert!(
            replies[2]["error"]
                .as_str()
                .unwrap()
                .starts_with("Protocol error")
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_the_loop() {
        let input = concat!(
            "{\"method\": \"execute_function\", \"function_name\": \"explode\"}\n",
            "{\"method\": \"execute_function\", \"function_name\": \"get_file_info\", \"parameters\": {\"file_path\": \"/nonexistent\"}}\n",
        );
        let replies = run(input).await;
        assert_eq!(replies[0], json!({"error": "Server error: kaboom"}));
        assert_eq!(
            replies[1],
            json!({"result": {"error": "File '/nonexistent' not found"}})
        );
    }

    #[tokio::test]
    async fn test_each_reply_is_flushed_before_the_next_request() {
        let (client, server_side) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server_side);
        let handle = tokio::spawn(async move {
            server()
                .serve(BufReader::new(server_read), server_write)
                .await
        });

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut client_read = BufReader::new(client_read);

        for _ in 0..2 {
            client_write
                .write_all(b"{\"method\": \"initialize\"}\n")
                .await
                .unwrap();
            let mut line = String::new();
            client_read.read_line(&mut line).await.unwrap();
            let reply: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(reply["tool_specs"].as_array().unwrap().len(), 5);
        }

        // Closing our side ends the loop cleanly.
        client_write.shutdown().await.unwrap();
        handle.await.unwrap().unwrap();
        let mut rest = Vec::new();
        client_read.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
