//! Constructor methods for OrcaError

use super::types::OrcaError;
use crate::agent::TerminationReason;

impl OrcaError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific field
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(
        tool_name: impl Into<String>,
        message: impl Into<String>,
        matched_rule: Option<String>,
    ) -> Self {
        Self::PermissionDenied {
            tool_name: tool_name.into(),
            message: message.into(),
            matched_rule,
        }
    }

    /// Create a tool execution error
    pub fn tool_execution(
        tool_name: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Create a loop termination error
    pub fn loop_termination(reason: TerminationReason, message: impl Into<String>) -> Self {
        Self::LoopTermination {
            reason,
            message: message.into(),
        }
    }

    /// Create an orphaned session error
    pub fn orphan_session(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OrphanSession {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource_type: None,
        }
    }

    /// Create a not found error with resource type
    pub fn not_found_resource(
        resource_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            message: message.into(),
            resource_type: Some(resource_type.into()),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a model client error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            retryable: false,
        }
    }

    /// Create a retryable model client error (rate limit, overload)
    pub fn llm_retryable(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            retryable: true,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an IO error for a path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }
}
