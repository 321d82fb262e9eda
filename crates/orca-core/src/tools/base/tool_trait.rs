//! Core Tool trait definition

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::category::ToolCategory;
use super::error::ToolError;
use crate::tools::permission::RiskLevel;
use crate::tools::types::{ToolCall, ToolResult, ToolSchema};

/// Capability interface every tool implements
///
/// Built-in tools, namespaced external tools and test doubles are all
/// dispatched through this trait; the pipeline only looks at the capabilities
/// declared here.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's unique name (e.g., "Read")
    fn name(&self) -> &str;

    /// Get the tool's description for the model
    fn description(&self) -> &str;

    /// Get the tool's JSON schema for input parameters
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with already validated arguments
    ///
    /// # Errors
    ///
    /// Returns `ToolError` if execution fails or resources are unavailable.
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError>;

    /// Whether this tool only reads data without side effects
    fn is_read_only(&self) -> bool {
        false
    }

    /// Category used for indexing and signature projection
    fn category(&self) -> ToolCategory {
        ToolCategory::Other
    }

    /// Free-form tags for indexing
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    /// Static risk classification
    fn risk_level(&self) -> RiskLevel {
        if self.is_read_only() {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }

    /// Per-call timeout; `None` uses the pipeline default
    fn max_execution_duration(&self) -> Option<Duration> {
        None
    }
}

/// Shared tool handle
pub type SharedTool = Arc<dyn Tool>;
