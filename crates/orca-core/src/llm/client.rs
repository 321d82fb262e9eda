//! Model client collaborator

use async_trait::async_trait;
use std::sync::Arc;

use super::messages::Message;
use super::usage::TokenUsage;
use crate::error::OrcaResult;
use crate::tools::types::{ToolCall, ToolDeclaration};

/// A model reply: either plain content, tool calls, or both
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    /// Assistant text
    pub content: String,
    /// Tool calls requested by the model, in issuance order
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this request
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    /// Create a content-only response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Create a response carrying tool calls
    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            usage: None,
        }
    }

    /// Attach usage
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Whether the model asked for tools
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Sends a conversation to a language model.
///
/// Implementations own the provider wire protocol, retries and streaming.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the conversation with the tool declarations the model may use
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> OrcaResult<ModelResponse>;
}

/// Shared model client type
pub type SharedModelClient = Arc<dyn ModelClient>;
