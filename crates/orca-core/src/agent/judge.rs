//! Model-assisted repetition check

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::OrcaResult;
use crate::llm::{Message, MessageRole, SharedModelClient};

const JUDGE_PROMPT: &str = "You review transcripts of a coding agent. Answer YES if the agent \
is stuck repeating the same actions without making progress, otherwise answer NO. \
Reply with a single word.";

/// Characters of each message shown to the judge
const EXCERPT_CHARS: usize = 500;

/// Decides whether recent turns show the agent going in circles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepetitionJudge: Send + Sync {
    async fn is_looping(&self, recent: &[Message]) -> OrcaResult<bool>;
}

/// Shared judge type
pub type SharedRepetitionJudge = Arc<dyn RepetitionJudge>;

/// Asks the model itself for a YES/NO verdict
pub struct ModelRepetitionJudge {
    client: SharedModelClient,
    window: usize,
}

impl ModelRepetitionJudge {
    /// Judge the last `window` messages with `client`
    pub fn new(client: SharedModelClient, window: usize) -> Self {
        Self {
            client,
            window: window.max(1),
        }
    }

    fn transcript(&self, recent: &[Message]) -> String {
        let start = recent.len().saturating_sub(self.window);
        recent[start..]
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| {
                let mut line = format!("[{}] ", m.role);
                line.extend(m.content.chars().take(EXCERPT_CHARS));
                for call in &m.tool_calls {
                    line.push_str(&format!(
                        " <call {} {}>",
                        call.name,
                        serde_json::to_string(&call.arguments).unwrap_or_default()
                    ));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl RepetitionJudge for ModelRepetitionJudge {
    async fn is_looping(&self, recent: &[Message]) -> OrcaResult<bool> {
        let messages = [
            Message::system(JUDGE_PROMPT),
            Message::user(self.transcript(recent)),
        ];
        let response = self.client.send(&messages, &[]).await?;
        let verdict = response.content.trim().to_ascii_uppercase().starts_with("YES");
        debug!(verdict, "model repetition check");
        Ok(verdict)
    }
}
