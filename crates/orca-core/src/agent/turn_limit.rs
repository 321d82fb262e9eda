//! Turn-limit extension

use async_trait::async_trait;
use std::sync::Arc;

/// Answer to a reached turn cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnLimitDecision {
    /// Allow this many more turns
    Extend(u32),
    /// Terminate with `max_turns_exceeded`
    Stop,
}

/// Consulted when a loop reaches its turn cap
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TurnLimitHandler: Send + Sync {
    async fn on_turn_limit(&self, turns_used: u32, max_turns: u32) -> TurnLimitDecision;
}

/// Shared handler type
pub type SharedTurnLimitHandler = Arc<dyn TurnLimitHandler>;
