//! Orca Core Library
//!
//! Orchestration core of an interactive coding agent: the agentic loop, the
//! permission-gated tool execution pipeline, and the background task manager.
//! Model providers, session persistence and confirmation prompts are reached
//! through collaborator traits so the surrounding CLI or UI can plug in its own.

pub mod agent;
pub mod background;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod llm;
pub mod logging;
pub mod modes;
pub mod session;
pub mod subagent;
pub mod tools;

// Re-export commonly used types
pub use agent::{
    AgenticLoop, LoopContext, LoopOptions, LoopOutcome, LoopStatus, TerminationReason,
};
pub use background::{BackgroundAgentManager, BackgroundAgentOptions, BackgroundTaskHandle};
pub use config::OrcaConfig;
pub use error::{OrcaError, OrcaResult, UnifiedError};
pub use events::{EventBus, LifecycleEvent, SharedEventBus};
pub use llm::{Message, MessageRole, ModelClient, ModelResponse};
pub use modes::PermissionMode;
pub use session::{AgentSession, AgentStatus, SessionStore};
pub use tools::{
    PermissionChecker, ShellProcessManager, Tool, ToolCall, ToolExecutionPipeline, ToolRegistry,
};
