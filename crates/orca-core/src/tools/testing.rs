//! Tool doubles for unit tests

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::tools::base::{Tool, ToolCategory, ToolError};
use crate::tools::permission::RiskLevel;
use crate::tools::types::{ToolCall, ToolParameter, ToolResult, ToolSchema};

/// Configurable tool that echoes its call id
#[derive(Clone)]
pub(crate) struct FakeTool {
    name: String,
    read_only: bool,
    category: ToolCategory,
    tags: Vec<String>,
    risk: Option<RiskLevel>,
    delay: Option<Duration>,
    timeout: Option<Duration>,
    output: Option<String>,
    failure: Option<String>,
    params: Vec<ToolParameter>,
    calls: Arc<AtomicUsize>,
}

impl FakeTool {
    fn new(name: &str, read_only: bool, category: ToolCategory) -> Self {
        Self {
            name: name.to_string(),
            read_only,
            category,
            tags: Vec::new(),
            risk: None,
            delay: None,
            timeout: None,
            output: None,
            failure: None,
            params: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn read_only(name: &str) -> Self {
        Self::new(name, true, ToolCategory::FileRead)
    }

    pub fn writer(name: &str) -> Self {
        Self::new(name, false, ToolCategory::FileEdit)
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn with_param(mut self, param: ToolParameter) -> Self {
        self.params.push(param);
        self
    }

    /// Shared counter of completed `execute` entries
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Tool for FakeTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "test tool"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(&self.name, "test tool", self.params.clone())
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(ToolError::ExecutionFailed(message.clone()));
        }
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| format!("{} done: {}", self.name, call.id));
        Ok(ToolResult::success(&call.id, &self.name, output))
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn category(&self) -> ToolCategory {
        self.category
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    fn risk_level(&self) -> RiskLevel {
        self.risk.unwrap_or(if self.read_only {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        })
    }

    fn max_execution_duration(&self) -> Option<Duration> {
        self.timeout
    }
}
