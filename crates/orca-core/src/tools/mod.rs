//! Tool system: registry, permissions, confirmation and the execution pipeline

pub mod base;
pub mod confirmation;
pub mod permission;
pub mod pipeline;
pub mod registry;
pub mod shell;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use base::{SharedTool, Tool, ToolCategory, ToolError};
pub use confirmation::{
    AutoApproveHandler, AutoDenyHandler, ConfirmationHandler, ConfirmationRequest,
    ConfirmationResponse, ConfirmationScope, SessionApprovals, SharedConfirmationHandler,
};
pub use permission::{
    MatchType, PermissionBehavior, PermissionCheckResult, PermissionChecker,
    PermissionRulesConfig, RiskLevel, ToolInvocationDescriptor,
};
pub use pipeline::{
    ExecutionContext, ExecutionHistory, FailureKind, PipelineStats, SharedToolPipeline,
    ToolExecutionPipeline, ToolExecutionResult,
};
pub use registry::{NamespacedTool, SharedToolRegistry, ToolRegistry};
pub use shell::{OutputChunk, ShellInfo, ShellProcessManager, ShellStatus, ShellStream, ShellSubscription};
pub use types::{ToolCall, ToolDeclaration, ToolParameter, ToolResult, ToolSchema};
pub use validation::validate_arguments;
