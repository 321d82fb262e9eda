//! Token usage accounting

use serde::{Deserialize, Serialize};

use super::messages::Message;

/// Token usage reported by the model client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate another usage record
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Rough token estimate for a piece of text (about four characters per token)
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Rough token estimate for a conversation, including per-message overhead
pub fn estimate_message_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| {
            let calls: usize = m
                .tool_calls
                .iter()
                .map(|c| {
                    estimate_tokens(&c.name)
                        + estimate_tokens(&serde_json::to_string(&c.arguments).unwrap_or_default())
                })
                .sum();
            4 + estimate_tokens(&m.content) + calls
        })
        .sum()
}
