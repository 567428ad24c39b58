//! Service Kit - Filesystem Tools
//!
//! One `agent_core::Tool` per filesystem primitive.

mod file_info;
mod list_files;
mod read_file;
mod write_file;

pub use file_info::GetFileInfoTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;
