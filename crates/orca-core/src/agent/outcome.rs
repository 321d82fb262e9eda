//! Loop outcome

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::state::TerminationReason;
use crate::error::OrcaError;
use crate::llm::{Message, TokenUsage};

/// Counters describing a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopMetadata {
    pub loop_id: String,
    pub termination_reason: TerminationReason,
    pub turns: u32,
    pub tool_calls: usize,
    pub compactions: u32,
    pub usage: TokenUsage,
    pub duration: Duration,
}

/// Result of a loop run.
///
/// Termination conditions are reported here rather than returned as `Err`,
/// so the conversation so far is never lost.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub success: bool,
    /// Last assistant text
    pub final_message: Option<String>,
    /// `LoopTermination` for every non-success reason
    pub error: Option<OrcaError>,
    pub metadata: LoopMetadata,
    /// Full conversation at termination
    pub messages: Vec<Message>,
}

impl LoopOutcome {
    pub fn reason(&self) -> TerminationReason {
        self.metadata.termination_reason
    }
}
