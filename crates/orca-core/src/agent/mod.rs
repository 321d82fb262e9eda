//! The agentic loop
//!
//! A loop alternates model calls and tool executions until the model replies
//! without tool calls or a stop condition fires: the turn cap, a model error,
//! repetition, or cancellation.

mod judge;
mod loop_detection;
mod options;
mod outcome;
mod runner;
mod state;
mod turn_limit;

#[cfg(test)]
mod tests;

pub use judge::{ModelRepetitionJudge, RepetitionJudge, SharedRepetitionJudge};
pub use loop_detection::{LoopDetector, Repetition};
pub use options::{LoopContext, LoopOptions};
pub use outcome::{LoopMetadata, LoopOutcome};
pub use runner::{AgenticLoop, SharedAgenticLoop, drop_unanswered_tool_calls};
pub use state::{LoopState, LoopStatus, StatusTracker, TerminationReason};
pub use turn_limit::{SharedTurnLimitHandler, TurnLimitDecision, TurnLimitHandler};

#[cfg(test)]
pub(crate) use judge::MockRepetitionJudge;
#[cfg(test)]
pub(crate) use turn_limit::MockTurnLimitHandler;
