//! UnifiedError trait implementation for OrcaError

use super::types::{OrcaError, UnifiedError};

impl UnifiedError for OrcaError {
    fn error_code(&self) -> &str {
        match self {
            Self::Validation { .. } => "ORCA_VALIDATION",
            Self::PermissionDenied { .. } => "ORCA_PERMISSION_DENIED",
            Self::ToolExecution { .. } => "ORCA_TOOL_EXECUTION",
            Self::LoopTermination { .. } => "ORCA_LOOP_TERMINATION",
            Self::OrphanSession { .. } => "ORCA_ORPHAN_SESSION",
            Self::DuplicateTool(_) => "ORCA_DUPLICATE_TOOL",
            Self::NotFound { .. } => "ORCA_NOT_FOUND",
            Self::Config { .. } => "ORCA_CONFIG",
            Self::Storage { .. } => "ORCA_STORAGE",
            Self::Llm { .. } => "ORCA_LLM",
            Self::InvalidState { .. } => "ORCA_INVALID_STATE",
            Self::Cancelled => "ORCA_CANCELLED",
            Self::Io { .. } => "ORCA_IO",
            Self::Json { .. } => "ORCA_JSON",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. } => message,
            Self::PermissionDenied { message, .. } => message,
            Self::ToolExecution { message, .. } => message,
            Self::LoopTermination { message, .. } => message,
            Self::OrphanSession { message, .. } => message,
            Self::DuplicateTool(name) => name,
            Self::NotFound { message, .. } => message,
            Self::Config { message } => message,
            Self::Storage { message } => message,
            Self::Llm { message, .. } => message,
            Self::InvalidState { message } => message,
            Self::Cancelled => "Operation was cancelled",
            Self::Io { message, .. } => message,
            Self::Json { message } => message,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::ToolExecution { retryable, .. } => *retryable,
            Self::Llm { retryable, .. } => *retryable,
            Self::Io { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TerminationReason;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            OrcaError::validation("missing").error_code(),
            "ORCA_VALIDATION"
        );
        assert_eq!(
            OrcaError::DuplicateTool("Read".into()).error_code(),
            "ORCA_DUPLICATE_TOOL"
        );
        assert_eq!(OrcaError::Cancelled.error_code(), "ORCA_CANCELLED");
    }

    #[test]
    fn test_retryable_follows_flag() {
        assert!(OrcaError::tool_execution("Bash", "timed out", true).is_retryable());
        assert!(!OrcaError::tool_execution("Bash", "exit 1", false).is_retryable());
        assert!(!OrcaError::permission_denied("Bash", "denied", None).is_retryable());
        assert!(
            !OrcaError::loop_termination(TerminationReason::LoopDetected, "repeat").is_retryable()
        );
    }

    #[test]
    fn test_display_includes_reason() {
        let err = OrcaError::loop_termination(TerminationReason::MaxTurnsExceeded, "cap hit");
        assert_eq!(err.to_string(), "Loop terminated: max_turns_exceeded: cap hit");
    }
}
