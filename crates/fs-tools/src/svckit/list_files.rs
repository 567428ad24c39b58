//! Directory listing tool

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};

use agent_core::{Arguments, ParameterSchema, Result as CoreResult, Tool, ToolSpec};

use crate::{absolute_display, str_param};

/// Lists the files and subdirectories directly inside a directory
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "list_files".into(),
            description: "List files and directories in the specified directory".into(),
            parameters: vec![ParameterSchema::optional(
                "directory",
                "string",
                "Directory path to list (default: current directory)",
                json!("."),
            )],
        }
    }

    async fn execute(&self, params: &Arguments) -> CoreResult<Value> {
        let directory = str_param(params, "directory", ".");
        tracing::info!(directory, "listing files");
        Ok(list(directory).await)
    }
}

fn failure(directory: &str, error: String) -> Value {
    json!({
        "files": [],
        "directories": [],
        "path": directory,
        "error": error,
    })
}

async fn list(directory: &str) -> Value {
    let path = Path::new(directory);

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            tracing::warn!(directory, "not a directory");
            return failure(directory, format!("'{directory}' is not a directory"));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(directory, "directory not found");
            return failure(directory, format!("Directory '{directory}' not found"));
        }
        Err(e) => {
            tracing::error!(directory, error = %e, "failed to stat directory");
            return failure(directory, e.to_string());
        }
    }

    let mut files = Vec::new();
    let mut directories = Vec::new();

    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(directory, error = %e, "failed to read directory");
            return failure(directory, e.to_string());
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(directory, error = %e, "failed to read directory entry");
                return failure(directory, e.to_string());
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();

        // Follow symlinks; a dangling link is neither a file nor a directory.
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => files.push(name),
            Ok(meta) if meta.is_dir() => directories.push(name),
            _ => {}
        }
    }

    files.sort();
    directories.sort();
    tracing::info!(
        directory,
        files = files.len(),
        directories = directories.len(),
        "listed directory"
    );

    json!({
        "files": files,
        "directories": directories,
        "path": absolute_display(path),
    })
}
