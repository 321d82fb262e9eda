//! Error types for tool operations

use crate::error::{OrcaError, UnifiedError};

/// Error type for tool operations
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid arguments provided to the tool
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Tool not found
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Tool timeout
    #[error("Tool execution timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cancelled
    #[error("Tool execution cancelled")]
    Cancelled,
}

impl UnifiedError for ToolError {
    fn error_code(&self) -> &str {
        match self {
            ToolError::InvalidArguments(_) => "TOOL_INVALID_ARGS",
            ToolError::ExecutionFailed(_) => "TOOL_EXEC_FAILED",
            ToolError::NotFound(_) => "TOOL_NOT_FOUND",
            ToolError::Timeout(_) => "TOOL_TIMEOUT",
            ToolError::PermissionDenied(_) => "TOOL_PERMISSION_DENIED",
            ToolError::Io(_) => "TOOL_IO_ERROR",
            ToolError::Json(_) => "TOOL_JSON_ERROR",
            ToolError::Cancelled => "TOOL_CANCELLED",
        }
    }

    fn message(&self) -> &str {
        match self {
            ToolError::InvalidArguments(msg) => msg,
            ToolError::ExecutionFailed(msg) => msg,
            ToolError::NotFound(name) => name,
            ToolError::Timeout(_) => "Tool execution timed out",
            ToolError::PermissionDenied(msg) => msg,
            ToolError::Io(_) => "IO error occurred",
            ToolError::Json(_) => "JSON error occurred",
            ToolError::Cancelled => "Tool execution cancelled",
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Timeout(_) | ToolError::Io(_))
    }
}

impl ToolError {
    /// Convert into the crate error, attributing it to a tool
    pub fn into_orca_error(self, tool_name: &str) -> OrcaError {
        match self {
            ToolError::InvalidArguments(msg) => OrcaError::validation(msg),
            ToolError::NotFound(name) => OrcaError::not_found_resource("tool", name),
            ToolError::PermissionDenied(msg) => OrcaError::permission_denied(tool_name, msg, None),
            ToolError::Cancelled => OrcaError::Cancelled,
            other => {
                let retryable = other.is_retryable();
                OrcaError::tool_execution(tool_name, other.to_string(), retryable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_is_retryable() {
        let err = ToolError::Timeout(Duration::from_secs(1));
        assert!(err.is_retryable());
        match err.into_orca_error("Bash") {
            OrcaError::ToolExecution { retryable, .. } => assert!(retryable),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_arguments_maps_to_validation() {
        let err = ToolError::InvalidArguments("missing path".into()).into_orca_error("Read");
        assert_eq!(err.error_code(), "ORCA_VALIDATION");
    }
}
