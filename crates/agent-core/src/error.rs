//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Operation-level failures (missing file, unreadable directory) are not
/// represented here: handlers report those inside their result payload.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Malformed request/response framing
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No handler registered under this name
    #[error("Unknown function: {0}")]
    UnknownOperation(String),

    /// Required parameter absent or of the wrong type
    #[error("Invalid parameters for {function}: {detail}")]
    InvalidParameters { function: String, detail: String },

    /// Error envelope returned by the worker process, passed through verbatim
    #[error("{0}")]
    Remote(String),

    /// Turn exceeded its time bound
    #[error("Turn timed out after {0} seconds")]
    TurnTimeout(u64),

    /// Worker process could not be started or did not answer `initialize`
    #[error("Startup failure: {0}")]
    StartupFailure(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Maximum number of graph nodes reached in one turn
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    pub fn invalid_parameters(function: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidParameters {
            function: function.into(),
            detail: detail.into(),
        }
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::TurnTimeout(_) | Self::Io(_)
        )
    }

    /// Only a startup failure ends the session; everything else is per request or per turn.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StartupFailure(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::UnknownOperation(name) => format!("The tool '{name}' is not available."),
            Self::InvalidParameters { detail, .. } => format!("Invalid tool input: {detail}"),
            Self::TurnTimeout(_) => "Response timed out. Please try again.".into(),
            Self::StartupFailure(_) => {
                "Timed out or failed while starting the tool server. Please check the logs and try again."
                    .into()
            }
            Self::MaxIterations(_) => {
                "The request took too long to process. Please try a simpler query.".into()
            }
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_wire_messages() {
        assert_eq!(
            AgentError::UnknownOperation("delete_everything".into()).to_string(),
            "Unknown function: delete_everything"
        );
        assert_eq!(
            AgentError::invalid_parameters("read_file", "missing required parameter 'file_path'")
                .to_string(),
            "Invalid parameters for read_file: missing required parameter 'file_path'"
        );
    }

    #[test]
    fn test_classification() {
        assert!(AgentError::TurnTimeout(60).is_retryable());
        assert!(!AgentError::TurnTimeout(60).is_fatal());
        assert!(AgentError::StartupFailure("no binary".into()).is_fatal());
        assert!(!AgentError::UnknownOperation("x".into()).is_retryable());
    }
}
