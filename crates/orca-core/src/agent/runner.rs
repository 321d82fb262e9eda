//! The agentic loop
//!
//! Each turn sends the conversation and the mode-filtered tool declarations
//! to the model. A reply without tool calls ends the loop; otherwise the calls
//! go through the pipeline and their results are appended in issuance order.

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::judge::SharedRepetitionJudge;
use super::loop_detection::{LoopDetector, Repetition};
use super::options::{LoopContext, LoopOptions};
use super::outcome::{LoopMetadata, LoopOutcome};
use super::state::{LoopState, LoopStatus, StatusTracker, TerminationReason};
use super::turn_limit::{SharedTurnLimitHandler, TurnLimitDecision};
use crate::config::CompactionConfig;
use crate::context::{CompactionTrigger, SharedCompactor, needs_compaction, truncate_naive};
use crate::error::OrcaError;
use crate::events::{LifecycleEvent, SharedEventBus};
use crate::llm::{Message, MessageRole, SharedModelClient, estimate_message_tokens};
use crate::tools::pipeline::{ExecutionContext, SharedToolPipeline, ToolExecutionResult};
use crate::tools::types::ToolCall;

type Exit = (TerminationReason, Option<String>);

/// Drop the most recent assistant tool-call message if any of its calls has
/// no result, along with the partial results after it
pub fn drop_unanswered_tool_calls(messages: &mut Vec<Message>) {
    let Some(index) = messages
        .iter()
        .rposition(|m| m.role == MessageRole::Assistant && m.has_tool_calls())
    else {
        return;
    };
    let answered: HashSet<&str> = messages[index + 1..]
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    let complete = messages[index]
        .tool_calls
        .iter()
        .all(|call| answered.contains(call.id.as_str()));
    if !complete {
        messages.truncate(index);
    }
}

/// Drives a conversation with the model until it terminates
pub struct AgenticLoop {
    client: SharedModelClient,
    pipeline: SharedToolPipeline,
    compactor: Option<SharedCompactor>,
    judge: Option<SharedRepetitionJudge>,
    turn_limit: Option<SharedTurnLimitHandler>,
    events: SharedEventBus,
}

impl AgenticLoop {
    /// Create a loop publishing on the pipeline's event bus
    pub fn new(client: SharedModelClient, pipeline: SharedToolPipeline) -> Self {
        let events = pipeline.events().clone();
        Self {
            client,
            pipeline,
            compactor: None,
            judge: None,
            turn_limit: None,
            events,
        }
    }

    pub fn with_compactor(mut self, compactor: SharedCompactor) -> Self {
        self.compactor = Some(compactor);
        self
    }

    pub fn with_repetition_judge(mut self, judge: SharedRepetitionJudge) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_turn_limit_handler(mut self, handler: SharedTurnLimitHandler) -> Self {
        self.turn_limit = Some(handler);
        self
    }

    pub fn pipeline(&self) -> &SharedToolPipeline {
        &self.pipeline
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// Run the loop to termination. Never returns `Err`: every stop condition
    /// is reported through the outcome.
    #[instrument(skip_all, fields(loop_id = %context.loop_id))]
    pub async fn run(&self, prompt: &str, context: LoopContext, options: &LoopOptions) -> LoopOutcome {
        let LoopContext {
            loop_id,
            cancel,
            history,
            session_id,
            status,
        } = context;

        let mut state = LoopState::new(&loop_id, options.max_turns);
        let mut messages = history;
        drop_unanswered_tool_calls(&mut messages);
        if let Some(system_prompt) = &options.system_prompt {
            if !messages.iter().any(|m| m.role == MessageRole::System) {
                messages.insert(0, Message::system(system_prompt.as_str()));
            }
        }
        messages.push(Message::user(prompt));

        let mut exec_ctx = ExecutionContext::new(options.mode)
            .with_cancel(cancel.clone())
            .with_status(status.clone());
        if let Some(session_id) = session_id {
            exec_ctx = exec_ctx.with_session(session_id);
        }

        status.set(LoopStatus::Running);
        let (reason, detail) = if options.chat_enabled {
            self.drive(&mut state, &mut messages, &cancel, &exec_ctx, &status, options)
                .await
        } else {
            (TerminationReason::ChatDisabled, None)
        };
        status.set(LoopStatus::Terminated(reason));

        self.events.publish(LifecycleEvent::LoopTerminated {
            loop_id: loop_id.clone(),
            reason,
        });
        info!(
            reason = %reason,
            turns = state.turn,
            tool_calls = state.tool_calls,
            "loop terminated"
        );

        let final_message = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant && !m.content.is_empty())
            .map(|m| m.content.clone());
        let error = (!reason.is_success()).then(|| {
            OrcaError::loop_termination(reason, detail.unwrap_or_else(|| default_detail(reason)))
        });

        LoopOutcome {
            success: reason.is_success(),
            final_message,
            error,
            metadata: LoopMetadata {
                loop_id,
                termination_reason: reason,
                turns: state.turn,
                tool_calls: state.tool_calls,
                compactions: state.compactions,
                usage: state.usage,
                duration: state.elapsed(),
            },
            messages,
        }
    }

    async fn drive(
        &self,
        state: &mut LoopState,
        messages: &mut Vec<Message>,
        cancel: &CancellationToken,
        exec_ctx: &ExecutionContext,
        status: &StatusTracker,
        options: &LoopOptions,
    ) -> Exit {
        let declarations = if state.tools_enabled() {
            self.pipeline.registry().declarations_for_mode(options.mode)
        } else {
            Vec::new()
        };
        let mut detector = LoopDetector::new(options.loop_detection.clone());
        let check_interval = options.loop_detection.model_check_interval;

        loop {
            if cancel.is_cancelled() {
                return (TerminationReason::Aborted, None);
            }
            if state.turn_budget_exhausted() && !self.try_extend(state, cancel).await {
                if cancel.is_cancelled() {
                    return (TerminationReason::Aborted, None);
                }
                return (
                    TerminationReason::MaxTurnsExceeded,
                    Some(format!("Reached the limit of {} turns", state.max_turns)),
                );
            }

            let turn = state.begin_turn();
            status.set(LoopStatus::Running);
            self.events.publish(LifecycleEvent::TurnStarted {
                loop_id: state.loop_id.clone(),
                turn,
            });
            self.maybe_compact(state, messages, &options.compaction).await;

            let response = tokio::select! {
                _ = cancel.cancelled() => return (TerminationReason::Aborted, None),
                response = self.client.send(messages.as_slice(), &declarations) => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(turn, error = %e, "model call failed");
                    return (TerminationReason::ApiError, Some(e.to_string()));
                }
            };
            if let Some(usage) = &response.usage {
                state.usage.add(usage);
            }

            if !response.has_tool_calls() || !state.tools_enabled() {
                if response.has_tool_calls() {
                    debug!("ignoring tool calls while tools are disabled");
                }
                messages.push(Message::assistant(response.content));
                return (TerminationReason::Success, None);
            }

            if let Some(repetition) = detect(&mut detector, &response.content, &response.tool_calls) {
                warn!(turn, ?repetition, "repetition detected");
                messages.push(Message::assistant(response.content));
                return (TerminationReason::LoopDetected, Some(describe(&repetition)));
            }

            let calls = response.tool_calls;
            messages.push(Message::assistant_with_tools(response.content, calls.clone()));

            status.set(LoopStatus::WaitingTool);
            let results = self.execute_calls(&calls, exec_ctx, cancel, options).await;
            for result in results {
                // nothing is appended once cancellation has been observed
                if cancel.is_cancelled() {
                    return (TerminationReason::Canceled, None);
                }
                messages.push(result.to_message());
                state.tool_calls += 1;
            }
            if cancel.is_cancelled() {
                return (TerminationReason::Canceled, None);
            }
            status.set(LoopStatus::Running);

            if check_interval > 0 && turn % check_interval == 0 {
                if let Some(judge) = &self.judge {
                    match judge.is_looping(messages).await {
                        Ok(true) => {
                            return (
                                TerminationReason::LoopDetected,
                                Some("Model-assisted check found repeated actions".to_string()),
                            );
                        }
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "repetition check failed"),
                    }
                }
            }
        }
    }

    async fn execute_calls(
        &self,
        calls: &[ToolCall],
        exec_ctx: &ExecutionContext,
        cancel: &CancellationToken,
        options: &LoopOptions,
    ) -> Vec<ToolExecutionResult> {
        if options.parallel_tools {
            return self.pipeline.execute_batch(calls, exec_ctx).await;
        }
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if cancel.is_cancelled() {
                break;
            }
            results.push(self.pipeline.execute(call, exec_ctx).await);
        }
        results
    }

    async fn try_extend(&self, state: &mut LoopState, cancel: &CancellationToken) -> bool {
        let Some(handler) = &self.turn_limit else {
            return false;
        };
        let max_turns = u32::try_from(state.max_turns).unwrap_or(0);
        let decision = tokio::select! {
            _ = cancel.cancelled() => return false,
            decision = handler.on_turn_limit(state.turn, max_turns) => decision,
        };
        match decision {
            TurnLimitDecision::Extend(extra) if extra > 0 => {
                info!(extra, "turn limit extended");
                state.extend(extra);
                true
            }
            _ => false,
        }
    }

    async fn maybe_compact(
        &self,
        state: &mut LoopState,
        messages: &mut Vec<Message>,
        config: &CompactionConfig,
    ) {
        if !needs_compaction(messages, config) {
            return;
        }
        let pre_tokens = estimate_message_tokens(messages);

        let compacted = match &self.compactor {
            Some(compactor) => match compactor
                .compact(messages, CompactionTrigger::Auto, config.context_budget_tokens)
                .await
            {
                Ok(outcome) => Some(outcome.into_messages()),
                Err(e) => {
                    warn!(error = %e, "compaction failed, falling back to truncation");
                    None
                }
            },
            None => None,
        };
        let truncated = compacted.is_none();
        *messages = match compacted {
            Some(compacted) => compacted,
            None => truncate_naive(messages, config.truncation_keep_recent).retained,
        };
        state.compactions += 1;

        let post_tokens = estimate_message_tokens(messages);
        info!(pre_tokens, post_tokens, truncated, "conversation compacted");
        self.events.publish(LifecycleEvent::Compacted {
            loop_id: state.loop_id.clone(),
            pre_tokens,
            post_tokens,
            truncated,
        });
    }
}

fn detect(detector: &mut LoopDetector, content: &str, calls: &[ToolCall]) -> Option<Repetition> {
    let content_repeat = detector.record_content(content);
    // record every call so the window stays complete
    let call_repeat = calls
        .iter()
        .filter_map(|call| detector.record_tool_call(call))
        .last();
    call_repeat.or(content_repeat)
}

fn describe(repetition: &Repetition) -> String {
    match repetition {
        Repetition::ToolCall { signature, count } => {
            format!("Tool call {} repeated {} times", signature, count)
        }
        Repetition::Content { count } => format!("Assistant reply repeated {} times", count),
    }
}

fn default_detail(reason: TerminationReason) -> String {
    match reason {
        TerminationReason::Aborted => "Cancelled before the next model call".to_string(),
        TerminationReason::Canceled => "Cancelled during tool execution".to_string(),
        TerminationReason::ChatDisabled => "Chat is disabled for this loop".to_string(),
        other => other.to_string(),
    }
}

/// Shared loop handle
pub type SharedAgenticLoop = Arc<AgenticLoop>;
