//! Loop state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::llm::TokenUsage;

/// Why a loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model replied without tool calls
    Success,
    /// The turn cap was reached and not extended
    MaxTurnsExceeded,
    /// The model client failed
    ApiError,
    /// Repetition detection fired
    LoopDetected,
    /// Cancellation observed at a turn boundary or during a model call
    Aborted,
    /// Cancellation observed while tools were executing
    Canceled,
    /// The loop was started with chat disabled
    ChatDisabled,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::MaxTurnsExceeded => "max_turns_exceeded",
            Self::ApiError => "api_error",
            Self::LoopDetected => "loop_detected",
            Self::Aborted => "aborted",
            Self::Canceled => "canceled",
            Self::ChatDisabled => "chat_disabled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the loop stopped because someone cancelled it
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Aborted | Self::Canceled)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum LoopStatus {
    #[default]
    Idle,
    Running,
    WaitingTool,
    WaitingConfirm,
    Terminated(TerminationReason),
}

impl LoopStatus {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

/// Observable loop status, shared with the pipeline so confirmation waits show up
#[derive(Debug, Clone)]
pub struct StatusTracker {
    tx: Arc<watch::Sender<LoopStatus>>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LoopStatus::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, status: LoopStatus) {
        self.tx.send_if_modified(|current| {
            // terminal is final
            if current.is_terminated() || *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    pub fn current(&self) -> LoopStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.tx.subscribe()
    }
}

/// Per-invocation counters
#[derive(Debug, Clone)]
pub struct LoopState {
    pub loop_id: String,
    pub turn: u32,
    /// -1 unlimited, 0 tools disabled, N cap (grows when extended)
    pub max_turns: i32,
    pub tool_calls: usize,
    pub compactions: u32,
    pub usage: TokenUsage,
    pub started_at: Instant,
}

impl LoopState {
    pub fn new(loop_id: impl Into<String>, max_turns: i32) -> Self {
        Self {
            loop_id: loop_id.into(),
            turn: 0,
            max_turns,
            tool_calls: 0,
            compactions: 0,
            usage: TokenUsage::default(),
            started_at: Instant::now(),
        }
    }

    /// Whether tool calling is enabled at all
    pub fn tools_enabled(&self) -> bool {
        self.max_turns != 0
    }

    /// Whether the next turn would exceed the cap
    pub fn turn_budget_exhausted(&self) -> bool {
        self.max_turns > 0 && self.turn >= self.max_turns as u32
    }

    /// Raise the cap by `extra` turns
    pub fn extend(&mut self, extra: u32) {
        if self.max_turns > 0 {
            self.max_turns = self.max_turns.saturating_add(i32::try_from(extra).unwrap_or(i32::MAX));
        }
    }

    /// Advance to the next turn and return its 1-based number
    pub fn begin_turn(&mut self) -> u32 {
        self.turn += 1;
        self.turn
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
