//! File metadata tool

use std::io::ErrorKind;
use std::path::Path;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde_json::{Value, json};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSpec};

use crate::{absolute_display, str_param};

/// Reports size, modification time and kind of a path
pub struct GetFileInfoTool;

#[async_trait]
impl Tool for GetFileInfoTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "get_file_info".into(),
            description: "Get information about a file or directory".into(),
            parameters: vec![ParameterSchema::required(
                "file_path",
                "string",
                "Path to the file or directory",
            )],
        }
    }

    async fn execute(&self, params: &Arguments) -> CoreResult<Value> {
        let file_path = str_param(params, "file_path", "");
        tracing::info!(file_path, "getting file info");
        Ok(info(file_path).await)
    }
}

async fn info(file_path: &str) -> Value {
    let path = Path::new(file_path);

    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(file_path, "file not found");
            return json!({"error": format!("File '{file_path}' not found")});
        }
        Err(e) => {
            tracing::error!(file_path, error = %e, "failed to stat path");
            return json!({"error": e.to_string()});
        }
    };

    // Seconds since the epoch, fractional part kept
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64());

    json!({
        "name": path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        "size": meta.len(),
        "modified": modified,
        "is_file": meta.is_file(),
        "is_dir": meta.is_dir(),
        "path": absolute_display(path),
    })
}
