//! # fs-tools
//!
//! Filesystem primitives exposed as `agent_core::Tool`s.
//!
//! Every handler is total: missing paths, wrong file kinds and I/O failures
//! come back inside the result payload's `error` field, never as an `Err`.
//!
//! | Tool | Parameters | Result |
//! |------|------------|--------|
//! | `list_files` | `directory = "."` | `{files, directories, path, error?}` |
//! | `read_file` | `file_path` | `{content, size, path}` or `{error}` |
//! | `write_file` | `file_path`, `content` | `{success, message, path?, error?}` |
//! | `get_file_info` | `file_path` | `{name, size, modified, is_file, is_dir, path}` or `{error}` |

use std::path::Path;

use agent_core::{Arguments, ToolRegistry};

pub mod svckit;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{GetFileInfoTool, ListFilesTool, ReadFileTool, WriteFileTool};
}

/// Registry with the four filesystem tools, in wire order
pub fn filesystem_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tools::ListFilesTool);
    registry.register(tools::ReadFileTool);
    registry.register(tools::WriteFileTool);
    registry.register(tools::GetFileInfoTool);
    registry
}

/// Absolute form of `path` against the current directory, symlinks left as they are.
pub(crate) fn absolute_display(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// String parameter; the registry has already checked presence and type.
pub(crate) fn str_param<'a>(params: &'a Arguments, name: &str, fallback: &'a str) -> &'a str {
    params
        .get(name)
        .and_then(serde_json::Value::as_str)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolDispatcher;
    use serde_json::json;

    fn args(value: serde_json::Value) -> Arguments {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_registry_order() {
        let registry = filesystem_registry();
        assert_eq!(
            registry.names(),
            vec!["list_files", "read_file", "write_file", "get_file_info"]
        );
    }

    #[test]
    fn test_wire_schema_matches_published_format() {
        let registry = filesystem_registry();
        let specs = registry.wire_specs();
        assert_eq!(
            specs[0].input_schema,
            json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "Directory path to list (default: current directory)"
                    }
                }
            })
        );
        assert_eq!(
            specs[2].input_schema["required"],
            json!(["file_path", "content"])
        );
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/note.txt");
        let path_str = path.to_str().unwrap();
        let content = "héllo\nworld";
        let registry = filesystem_registry();

        let written = registry
            .dispatch(
                "write_file",
                args(json!({"file_path": path_str, "content": content})),
            )
            .await
            .unwrap();
        assert_eq!(written["success"], json!(true));

        let read = registry
            .dispatch("read_file", args(json!({"file_path": path_str})))
            .await
            .unwrap();
        assert_eq!(read["content"], json!(content));
        assert_eq!(read["size"], json!(content.len()));
    }

    #[tokio::test]
    async fn test_file_info_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"12345").unwrap();
        let registry = filesystem_registry();
        let params = args(json!({"file_path": path.to_str().unwrap()}));

        let first = registry.dispatch("get_file_info", params.clone()).await.unwrap();
        let second = registry.dispatch("get_file_info", params).await.unwrap();
        for key in ["size", "is_file", "is_dir", "modified"] {
            assert_eq!(first[key], second[key], "{key} changed between calls");
        }
        assert_eq!(first["size"], json!(5));
    }

    #[tokio::test]
    async fn test_missing_required_parameter_is_rejected_before_the_handler() {
        let err = filesystem_registry()
            .dispatch("read_file", Arguments::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameters for read_file"));
    }
}
