//! File write tool

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSpec};

use crate::{absolute_display, str_param};

/// Writes text to a file, creating parent directories as needed
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "write_file".into(),
            description: "Write content to a file".into(),
            parameters: vec![
                ParameterSchema::required("file_path", "string", "Path to the file to write"),
                ParameterSchema::required("content", "string", "Content to write to the file"),
            ],
        }
    }

    async fn execute(&self, params: &Arguments) -> CoreResult<Value> {
        let file_path = str_param(params, "file_path", "");
        let content = str_param(params, "content", "");
        tracing::info!(file_path, bytes = content.len(), "writing file");
        Ok(write(file_path, content).await)
    }
}

async fn write(file_path: &str, content: &str) -> Value {
    let path = Path::new(file_path);

    match write_creating_parents(path, content).await {
        Ok(()) => {
            let message = format!("Successfully wrote {} bytes to {file_path}", content.len());
            tracing::info!(file_path, bytes = content.len(), "wrote file");
            json!({
                "success": true,
                "message": message,
                "path": absolute_display(path),
            })
        }
        Err(e) => {
            tracing::error!(file_path, error = %e, "failed to write file");
            json!({
                "success": false,
                "message": format!("Failed to write to {file_path}"),
                "error": e.to_string(),
            })
        }
    }
}

async fn write_creating_parents(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !tokio::fs::try_exists(parent).await.unwrap_or(false) {
            tracing::info!(parent = %parent.display(), "creating parent directories");
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, content).await
}
