//! Core error types and traits

use thiserror::Error;

use crate::agent::TerminationReason;

/// Result type alias for Orca operations
pub type OrcaResult<T> = Result<T, OrcaError>;

/// Unified error trait implemented by every error in the crate.
pub trait UnifiedError: std::error::Error + Send + Sync {
    /// Get the error code for programmatic handling
    fn error_code(&self) -> &str;

    /// Get the human-readable error message
    fn message(&self) -> &str;

    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Main error type for the orchestration core
#[derive(Error, Debug, Clone)]
pub enum OrcaError {
    /// Malformed or missing tool parameters
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// An explicit deny rule matched the invocation
    #[error("Permission denied for {tool_name}: {message}")]
    PermissionDenied {
        tool_name: String,
        message: String,
        matched_rule: Option<String>,
    },

    /// Tool runtime failure or timeout
    #[error("Tool execution failed for {tool_name}: {message}")]
    ToolExecution {
        tool_name: String,
        message: String,
        retryable: bool,
    },

    /// The agentic loop stopped for a non-success reason
    #[error("Loop terminated: {reason}: {message}")]
    LoopTermination {
        reason: TerminationReason,
        message: String,
    },

    /// A persisted session claims to be running but has no live task
    #[error("Orphaned session {session_id}: {message}")]
    OrphanSession { session_id: String, message: String },

    /// A tool with this name is already registered
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        resource_type: Option<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Session store errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Model client errors
    #[error("LLM error: {message}")]
    Llm { message: String, retryable: bool },

    /// Operation not allowed in the current state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },
}

impl From<std::io::Error> for OrcaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for OrcaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for OrcaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
