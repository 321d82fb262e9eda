//! Pipeline implementation

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::context::ExecutionContext;
use super::history::ExecutionHistory;
use super::result::{FailureKind, ToolExecutionResult};
use super::stats::PipelineStats;
use crate::agent::LoopStatus;
use crate::config::ExecutorConfig;
use crate::error::{OrcaError, UnifiedError};
use crate::events::{EventBus, LifecycleEvent, SharedEventBus};
use crate::tools::base::{SharedTool, ToolError};
use crate::tools::confirmation::{
    ConfirmationRequest, ConfirmationScope, SessionApprovals, SharedConfirmationHandler,
};
use crate::tools::permission::{
    PermissionBehavior, PermissionCheckResult, PermissionChecker, ToolInvocationDescriptor,
};
use crate::tools::registry::SharedToolRegistry;
use crate::tools::types::ToolCall;
use crate::tools::validation::validate_arguments;

type StageFailure = (FailureKind, OrcaError);

/// Shared pipeline handle
pub type SharedToolPipeline = Arc<ToolExecutionPipeline>;

/// Cut `output` to at most `max_chars` characters, appending a notice
pub fn truncate_output(output: String, max_chars: usize) -> (String, bool) {
    let total = output.chars().count();
    if max_chars == 0 || total <= max_chars {
        return (output, false);
    }
    let cut = output
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(output.len());
    let mut truncated = output[..cut].to_string();
    truncated.push_str(&format!(
        "\n\n[Output truncated: showing {} of {} characters]",
        max_chars, total
    ));
    (truncated, true)
}

/// Validates, confirms and executes tool calls
///
/// One instance is shared by the foreground loop and every background loop,
/// so the semaphore bounds tool executions process-wide.
pub struct ToolExecutionPipeline {
    registry: SharedToolRegistry,
    checker: Arc<PermissionChecker>,
    confirmation: Option<SharedConfirmationHandler>,
    approvals: SessionApprovals,
    semaphore: Arc<Semaphore>,
    events: SharedEventBus,
    history: ExecutionHistory,
    stats: Mutex<PipelineStats>,
    config: ExecutorConfig,
}

impl ToolExecutionPipeline {
    /// Create a pipeline with its own semaphore and event bus
    pub fn new(
        registry: SharedToolRegistry,
        checker: Arc<PermissionChecker>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            checker,
            confirmation: None,
            approvals: SessionApprovals::new(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrency)),
            events: Arc::new(EventBus::default()),
            history: ExecutionHistory::new(config.history_capacity),
            stats: Mutex::new(PipelineStats::default()),
            config,
        }
    }

    /// Set the confirmation collaborator. Without one, anything that needs
    /// confirmation is refused.
    pub fn with_confirmation_handler(mut self, handler: SharedConfirmationHandler) -> Self {
        self.confirmation = Some(handler);
        self
    }

    /// Publish lifecycle events on a shared bus
    pub fn with_event_bus(mut self, events: SharedEventBus) -> Self {
        self.events = events;
        self
    }

    /// Share a concurrency semaphore with other components
    pub fn with_semaphore(mut self, semaphore: Arc<Semaphore>) -> Self {
        self.semaphore = semaphore;
        self
    }

    pub fn registry(&self) -> &SharedToolRegistry {
        &self.registry
    }

    pub fn checker(&self) -> &Arc<PermissionChecker> {
        &self.checker
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub fn approvals(&self) -> &SessionApprovals {
        &self.approvals
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Permits not currently held by a running tool
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.lock().clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock() = PipelineStats::default();
    }

    /// Run one tool call through every stage
    #[instrument(skip(self, call, ctx), fields(tool = %call.name, call_id = %call.id))]
    pub async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolExecutionResult {
        let execution_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        let started = Instant::now();

        let outcome = self.run_stages(&execution_id, call, ctx).await;
        let duration = started.elapsed();

        let result = match outcome {
            Ok(output) => {
                let (output, truncated) = truncate_output(output, self.config.max_output_chars);
                ToolExecutionResult {
                    execution_id,
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    success: true,
                    output: Some(output),
                    error: None,
                    failure: None,
                    truncated,
                    duration,
                    timestamp,
                }
            }
            Err((kind, error)) => ToolExecutionResult {
                execution_id,
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                success: false,
                output: None,
                error: Some(error),
                failure: Some(kind),
                truncated: false,
                duration,
                timestamp,
            },
        };

        self.record(&result);
        result
    }

    /// Run several calls concurrently; results come back in issuance order
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        ctx: &ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        if calls.is_empty() {
            return Vec::new();
        }
        futures::future::join_all(calls.iter().map(|call| self.execute(call, ctx))).await
    }

    async fn run_stages(
        &self,
        execution_id: &str,
        call: &ToolCall,
        ctx: &ExecutionContext,
    ) -> Result<String, StageFailure> {
        if ctx.cancel.is_cancelled() {
            return Err(cancelled());
        }

        let tool = self.registry.get(&call.name).ok_or_else(|| {
            (
                FailureKind::NotFound,
                OrcaError::not_found_resource("tool", format!("Tool '{}' not found", call.name)),
            )
        })?;

        if !ctx.mode.allows_tool(tool.as_ref()) {
            return Err((
                FailureKind::ModeRestricted,
                OrcaError::permission_denied(
                    &call.name,
                    format!("Tool is not available in {} mode", ctx.mode),
                    None,
                ),
            ));
        }

        // VALIDATE
        let mut call = call.clone();
        validate_arguments(&tool.schema(), &mut call.arguments)
            .map_err(|e| (FailureKind::Validation, e))?;

        // CONFIRM
        let descriptor = ToolInvocationDescriptor::from_call(&call);
        let decision = self.checker.check(&descriptor);
        if decision.result == PermissionBehavior::Deny {
            return Err((
                FailureKind::PermissionDenied,
                OrcaError::permission_denied(
                    &call.name,
                    format!(
                        "Denied by rule '{}'",
                        decision.matched_rule.as_deref().unwrap_or_default()
                    ),
                    decision.matched_rule.clone(),
                ),
            ));
        }
        if self.needs_confirmation(&tool, &decision, ctx) {
            self.confirm(&call, &tool, &decision, ctx).await?;
        }

        // EXECUTE
        let _permit = self.acquire_permit(&call, ctx).await?;
        if ctx.cancel.is_cancelled() {
            return Err(cancelled());
        }
        self.events.publish(LifecycleEvent::ToolStarted {
            execution_id: execution_id.to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
        });

        let limit = tool
            .max_execution_duration()
            .unwrap_or(self.config.default_timeout);
        debug!(timeout = ?limit, "executing tool");

        let result = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(cancelled()),
            result = timeout(limit, tool.execute(&call)) => result,
        };

        // POSTPROCESS
        match result {
            Err(_) => Err((
                FailureKind::Timeout,
                OrcaError::tool_execution(
                    &call.name,
                    format!("Timed out after {:?}", limit),
                    true,
                ),
            )),
            Ok(Err(ToolError::Cancelled)) => Err(cancelled()),
            Ok(Err(e)) => Err((FailureKind::Tool, e.into_orca_error(&call.name))),
            Ok(Ok(result)) if result.success => Ok(result.output.unwrap_or_default()),
            Ok(Ok(result)) => Err((
                FailureKind::Tool,
                OrcaError::tool_execution(
                    &call.name,
                    result
                        .error
                        .unwrap_or_else(|| "Tool reported failure".to_string()),
                    false,
                ),
            )),
        }
    }

    fn needs_confirmation(
        &self,
        tool: &SharedTool,
        decision: &PermissionCheckResult,
        ctx: &ExecutionContext,
    ) -> bool {
        if ctx.mode.auto_approves(tool.as_ref()) {
            return false;
        }
        if self.approvals.is_approved(&decision.signature) {
            return false;
        }
        decision.result == PermissionBehavior::Ask
            || tool.risk_level() >= self.config.confirmation_risk_threshold
    }

    async fn confirm(
        &self,
        call: &ToolCall,
        tool: &SharedTool,
        decision: &PermissionCheckResult,
        ctx: &ExecutionContext,
    ) -> Result<(), StageFailure> {
        let Some(handler) = self.confirmation.as_ref() else {
            warn!("confirmation required but no handler is configured");
            return Err(refused(&call.name, "Confirmation required but no handler is available"));
        };

        self.events.publish(LifecycleEvent::ConfirmationRequested {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            signature: decision.signature.clone(),
        });

        let request = ConfirmationRequest {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            signature: decision.signature.clone(),
            arguments: call.arguments.clone(),
            risk_level: tool.risk_level(),
            decision: decision.result,
            matched_rule: decision.matched_rule.clone(),
        };

        if let Some(status) = &ctx.status {
            status.set(LoopStatus::WaitingConfirm);
        }
        let response = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(cancelled()),
            response = handler.request_confirmation(request) => response,
        };
        if let Some(status) = &ctx.status {
            status.set(LoopStatus::WaitingTool);
        }

        if !response.approved {
            let reason = response
                .reason
                .unwrap_or_else(|| "User declined".to_string());
            return Err(refused(&call.name, reason));
        }
        if response.scope == ConfirmationScope::Session {
            self.approvals.approve(decision.signature.clone());
        }
        Ok(())
    }

    async fn acquire_permit(
        &self,
        call: &ToolCall,
        ctx: &ExecutionContext,
    ) -> Result<OwnedSemaphorePermit, StageFailure> {
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(cancelled()),
            permit = self.semaphore.clone().acquire_owned() => permit.map_err(|_| {
                (
                    FailureKind::Tool,
                    OrcaError::tool_execution(&call.name, "Executor is shutting down", false),
                )
            }),
        }
    }

    fn record(&self, result: &ToolExecutionResult) {
        self.stats.lock().record(result);
        self.history.record(result.clone());

        let event = match &result.error {
            None => LifecycleEvent::ToolCompleted {
                execution_id: result.execution_id.clone(),
                call_id: result.call_id.clone(),
                tool_name: result.tool_name.clone(),
                duration_ms: duration_ms(result.duration),
            },
            Some(error) => {
                debug!(error = %error, failure = ?result.failure, "tool execution failed");
                LifecycleEvent::ToolFailed {
                    execution_id: result.execution_id.clone(),
                    call_id: result.call_id.clone(),
                    tool_name: result.tool_name.clone(),
                    error: error.to_string(),
                    retryable: error.is_retryable(),
                }
            }
        };
        self.events.publish(event);
    }
}

fn cancelled() -> StageFailure {
    (FailureKind::Cancelled, OrcaError::Cancelled)
}

fn refused(tool_name: &str, reason: impl Into<String>) -> StageFailure {
    (
        FailureKind::ConfirmationRefused,
        OrcaError::permission_denied(tool_name, reason, None),
    )
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
