//! File read tool

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSpec};

use crate::{absolute_display, str_param};

/// Reads a whole text file
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "read_file".into(),
            description: "Read the contents of a file".into(),
            parameters: vec![ParameterSchema::required(
                "file_path",
                "string",
                "Path to the file to read",
            )],
        }
    }

    async fn execute(&self, params: &Arguments) -> CoreResult<Value> {
        let file_path = str_param(params, "file_path", "");
        tracing::info!(file_path, "reading file");
        Ok(read(file_path).await)
    }
}

async fn read(file_path: &str) -> Value {
    let path = Path::new(file_path);

    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(file_path, "file not found");
            return json!({"error": format!("File '{file_path}' not found")});
        }
        Err(e) => return json!({"error": e.to_string()}),
    };
    if !meta.is_file() {
        tracing::warn!(file_path, "not a file");
        return json!({"error": format!("'{file_path}' is not a file")});
    }

    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            tracing::info!(file_path, bytes = meta.len(), "read file");
            json!({
                "content": content,
                "size": meta.len(),
                "path": absolute_display(path),
            })
        }
        Err(e) => {
            tracing::error!(file_path, error = %e, "failed to read file");
            json!({"error": e.to_string()})
        }
    }
}
