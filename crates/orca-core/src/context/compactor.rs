//! Compaction collaborator interface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::CompactionConfig;
use crate::error::OrcaResult;
use crate::llm::{Message, MessageRole, estimate_message_tokens};

/// Prefix of the message that carries a compaction summary
pub const SUMMARY_PREFIX: &str = "[Conversation summary]";

/// Why compaction ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionTrigger {
    /// Projected usage crossed the configured threshold
    Auto,
    /// Requested by the user
    Manual,
}

/// Result of compacting a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionOutcome {
    /// Summary of the dropped messages, if one was produced
    pub summary: Option<String>,
    /// Messages kept verbatim, in order
    pub retained: Vec<Message>,
    pub pre_tokens: usize,
    pub post_tokens: usize,
}

impl CompactionOutcome {
    /// Conversation to continue with: leading system messages, then the
    /// summary, then the remaining retained messages
    pub fn into_messages(self) -> Vec<Message> {
        let Some(summary) = self.summary else {
            return self.retained;
        };
        let split = self
            .retained
            .iter()
            .position(|m| m.role != MessageRole::System)
            .unwrap_or(self.retained.len());

        let mut messages = Vec::with_capacity(self.retained.len() + 1);
        let mut retained = self.retained.into_iter();
        messages.extend(retained.by_ref().take(split));
        messages.push(Message::user(format!("{}\n{}", SUMMARY_PREFIX, summary)));
        messages.extend(retained);
        messages
    }

    /// Tokens removed by the compaction
    pub fn tokens_saved(&self) -> usize {
        self.pre_tokens.saturating_sub(self.post_tokens)
    }
}

/// Summarises or trims a conversation to fit a token budget
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Compactor: Send + Sync {
    async fn compact(
        &self,
        messages: &[Message],
        trigger: CompactionTrigger,
        budget: usize,
    ) -> OrcaResult<CompactionOutcome>;
}

/// Shared compactor type
pub type SharedCompactor = Arc<dyn Compactor>;

/// Whether projected usage crosses the configured trigger
pub fn needs_compaction(messages: &[Message], config: &CompactionConfig) -> bool {
    config.enabled && estimate_message_tokens(messages) > config.trigger_tokens()
}
