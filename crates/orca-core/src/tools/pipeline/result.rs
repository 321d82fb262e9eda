//! Execution results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OrcaError, UnifiedError};
use crate::llm::Message;

/// Stage at which, and reason why, an execution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No tool with that name
    NotFound,
    /// The permission mode does not expose the tool
    ModeRestricted,
    /// Parameters failed schema validation
    Validation,
    /// A deny rule matched
    PermissionDenied,
    /// The confirmation handler refused, or none was available
    ConfirmationRefused,
    /// The per-call timeout elapsed
    Timeout,
    /// The caller's cancellation token fired
    Cancelled,
    /// The tool itself reported an error
    Tool,
}

/// Outcome of one pipeline invocation
#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    pub execution_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<OrcaError>,
    pub failure: Option<FailureKind>,
    /// Whether the output was cut to the configured limit
    pub truncated: bool,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

impl ToolExecutionResult {
    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.is_retryable())
    }

    /// Whether the execution stopped because of cancellation
    pub fn is_cancelled(&self) -> bool {
        self.failure == Some(FailureKind::Cancelled)
    }

    /// Text handed back to the model
    pub fn content(&self) -> String {
        if self.success {
            return self.output.clone().unwrap_or_default();
        }
        let message = self
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Tool execution failed".to_string());
        match &self.output {
            Some(output) if !output.is_empty() => format!("Error: {}\n{}", message, output),
            _ => format!("Error: {}", message),
        }
    }

    /// Convert into a tool-result message for the conversation
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.tool_name, self.content())
    }
}
