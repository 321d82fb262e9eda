//! Model-facing types and the model client collaborator
//!
//! The core never talks to a provider directly. It hands a conversation and
//! the mode-filtered tool declarations to a [`ModelClient`] and gets back either
//! plain content or tool calls.

mod client;
mod messages;
mod usage;

pub use client::{ModelClient, ModelResponse, SharedModelClient};
#[cfg(test)]
pub(crate) use client::MockModelClient;
pub use messages::{Message, MessageRole};
pub use usage::{TokenUsage, estimate_message_tokens, estimate_tokens};
