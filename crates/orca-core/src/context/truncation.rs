//! Naive truncation fallback

use super::compactor::CompactionOutcome;
use crate::llm::{Message, MessageRole, estimate_message_tokens};

/// Notice inserted where messages were dropped
pub const TRUNCATION_NOTICE: &str = "[Earlier conversation truncated to fit the context window]";

/// Keep system messages and the `keep_recent` most recent others.
///
/// Tool results at the start of the kept tail are dropped too, since the
/// assistant message that issued them is gone.
pub fn truncate_naive(messages: &[Message], keep_recent: usize) -> CompactionOutcome {
    let pre_tokens = estimate_message_tokens(messages);

    let (system, rest): (Vec<&Message>, Vec<&Message>) = messages
        .iter()
        .partition(|m| m.role == MessageRole::System);

    let start = rest.len().saturating_sub(keep_recent);
    let mut tail = &rest[start..];
    while let Some(first) = tail.first() {
        if first.role != MessageRole::Tool {
            break;
        }
        tail = &tail[1..];
    }

    let dropped = rest.len() - tail.len();
    let mut retained: Vec<Message> = system.into_iter().cloned().collect();
    if dropped > 0 {
        retained.push(Message::user(format!(
            "{} ({} messages removed)",
            TRUNCATION_NOTICE, dropped
        )));
    }
    retained.extend(tail.iter().map(|m| (*m).clone()));

    let post_tokens = estimate_message_tokens(&retained);
    CompactionOutcome {
        summary: None,
        retained,
        pre_tokens,
        post_tokens,
    }
}
