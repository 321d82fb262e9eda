use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::{CompactionConfig, ExecutorConfig, LoopDetectionConfig};
use crate::context::{CompactionOutcome, MockCompactor, TRUNCATION_NOTICE};
use crate::error::{OrcaError, OrcaResult};
use crate::events::LifecycleEvent;
use crate::llm::{Message, MessageRole, MockModelClient, ModelClient, ModelResponse, TokenUsage};
use crate::modes::PermissionMode;
use crate::tools::base::SharedTool;
use crate::tools::permission::{PermissionChecker, PermissionRulesConfig};
use crate::tools::pipeline::ToolExecutionPipeline;
use crate::tools::registry::ToolRegistry;
use crate::tools::testing::FakeTool;
use crate::tools::types::{ToolCall, ToolDeclaration};

/// Replays canned responses and records what it was sent
#[derive(Default)]
struct ScriptedClient {
    script: Mutex<VecDeque<OrcaResult<ModelResponse>>>,
    repeat: Option<ModelResponse>,
    requests: Mutex<Vec<(Vec<Message>, Vec<String>)>>,
}

impl ScriptedClient {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    fn repeating(response: ModelResponse) -> Self {
        Self {
            repeat: Some(response),
            ..Default::default()
        }
    }

    fn failing(error: OrcaError) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(error)])),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    fn tools_seen(&self, index: usize) -> Vec<String> {
        self.requests.lock()[index].1.clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> OrcaResult<ModelResponse> {
        self.requests.lock().push((
            messages.to_vec(),
            tools.iter().map(|t| t.name.clone()).collect(),
        ));
        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        Ok(self
            .repeat
            .clone()
            .unwrap_or_else(|| ModelResponse::text("done")))
    }
}

fn call(id: &str, name: &str) -> ToolCall {
    ToolCall::from_json(id, name, json!({}))
}

fn pipeline(tools: Vec<SharedTool>) -> Arc<ToolExecutionPipeline> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register_all(tools).unwrap();
    let rules = PermissionRulesConfig {
        allow: vec!["*".to_string()],
        ..Default::default()
    };
    let checker = Arc::new(PermissionChecker::new(&rules).unwrap());
    Arc::new(ToolExecutionPipeline::new(
        registry,
        checker,
        ExecutorConfig::default(),
    ))
}

fn agent(client: Arc<dyn ModelClient>, tools: Vec<SharedTool>) -> AgenticLoop {
    AgenticLoop::new(client, pipeline(tools))
}

fn tool_messages(outcome: &LoopOutcome) -> Vec<String> {
    outcome
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .filter_map(|m| m.tool_call_id.clone())
        .collect()
}

#[tokio::test]
async fn test_plain_reply_succeeds() {
    let client = Arc::new(ScriptedClient::new(vec![
        ModelResponse::text("All done").with_usage(TokenUsage::new(10, 5)),
    ]));
    let agent = agent(client.clone(), Vec::new());
    let options = LoopOptions::default().with_system_prompt("You are helpful");

    let outcome = agent.run("hi", LoopContext::new(), &options).await;
    assert!(outcome.success);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.reason(), TerminationReason::Success);
    assert_eq!(outcome.final_message.as_deref(), Some("All done"));
    assert_eq!(outcome.metadata.turns, 1);
    assert_eq!(outcome.metadata.usage.total(), 15);
    assert_eq!(client.calls(), 1);

    let roles: Vec<MessageRole> = outcome.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]
    );
}

#[tokio::test]
async fn test_zero_turns_makes_one_call_without_tools() {
    let tool = FakeTool::read_only("Read");
    let counter = tool.call_counter();

    let mut client = MockModelClient::new();
    client
        .expect_send()
        .withf(|_, tools| tools.is_empty())
        .times(1)
        .returning(|_, _| {
            Ok(ModelResponse::with_tool_calls(
                "answer",
                vec![call("c1", "Read")],
            ))
        });
    let agent = agent(Arc::new(client), vec![Arc::new(tool)]);
    let options = LoopOptions::default().with_max_turns(0);

    let outcome = agent.run("question", LoopContext::new(), &options).await;
    assert!(outcome.success);
    assert_eq!(outcome.final_message.as_deref(), Some("answer"));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.metadata.tool_calls, 0);
    assert!(tool_messages(&outcome).is_empty());
}

#[tokio::test]
async fn test_tool_results_feed_next_turn() {
    let client = Arc::new(ScriptedClient::new(vec![
        ModelResponse::with_tool_calls("reading", vec![call("c1", "Read")]),
        ModelResponse::text("file looks fine"),
    ]));
    let agent = agent(client.clone(), vec![Arc::new(FakeTool::read_only("Read"))]);

    let outcome = agent
        .run("check the file", LoopContext::new(), &LoopOptions::default())
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.metadata.turns, 2);
    assert_eq!(outcome.metadata.tool_calls, 1);
    assert_eq!(tool_messages(&outcome), vec!["c1".to_string()]);

    let second_request = &client.requests.lock()[1].0;
    let last = second_request.last().unwrap();
    assert_eq!(last.role, MessageRole::Tool);
    assert_eq!(last.content, "Read done: c1");
}

#[tokio::test(start_paused = true)]
async fn test_results_follow_issuance_order() {
    let client = Arc::new(ScriptedClient::new(vec![
        ModelResponse::with_tool_calls("both", vec![call("slow", "Slow"), call("fast", "Fast")]),
        ModelResponse::text("done"),
    ]));
    let tools: Vec<SharedTool> = vec![
        Arc::new(FakeTool::read_only("Slow").with_delay(Duration::from_secs(5))),
        Arc::new(FakeTool::read_only("Fast")),
    ];
    let agent = agent(client, tools);

    let outcome = agent
        .run("go", LoopContext::new(), &LoopOptions::default())
        .await;
    assert!(outcome.success);
    assert_eq!(
        tool_messages(&outcome),
        vec!["slow".to_string(), "fast".to_string()]
    );
}

#[tokio::test]
async fn test_sequential_tools_run_in_order() {
    let client = Arc::new(ScriptedClient::new(vec![
        ModelResponse::with_tool_calls("two", vec![call("a", "Read"), call("b", "Read")]),
        ModelResponse::text("done"),
    ]));
    let agent = agent(client, vec![Arc::new(FakeTool::read_only("Read"))]);
    let options = LoopOptions::default().with_parallel_tools(false);

    let outcome = agent.run("go", LoopContext::new(), &options).await;
    assert_eq!(tool_messages(&outcome), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(outcome.metadata.tool_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_tools_appends_nothing() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::with_tool_calls(
        "working",
        vec![call("c1", "Fast"), call("c2", "Slow")],
    )]));
    let tools: Vec<SharedTool> = vec![
        Arc::new(FakeTool::read_only("Fast")),
        Arc::new(FakeTool::read_only("Slow").with_delay(Duration::from_secs(10))),
    ];
    let agent = agent(client.clone(), tools);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let context = LoopContext::new().with_cancel(cancel);
    let outcome = agent.run("go", context, &LoopOptions::default()).await;
    assert_eq!(outcome.reason(), TerminationReason::Canceled);
    assert!(!outcome.success);
    assert!(tool_messages(&outcome).is_empty());
    assert_eq!(outcome.metadata.tool_calls, 0);
    assert!(outcome.messages.last().unwrap().has_tool_calls());
    assert_eq!(client.calls(), 1);
    assert!(matches!(
        outcome.error,
        Some(OrcaError::LoopTermination {
            reason: TerminationReason::Canceled,
            ..
        })
    ));
}

#[tokio::test]
async fn test_cancel_before_start_aborts() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::text("never")]));
    let agent = agent(client.clone(), Vec::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = agent
        .run("go", LoopContext::new().with_cancel(cancel), &LoopOptions::default())
        .await;
    assert_eq!(outcome.reason(), TerminationReason::Aborted);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_turn_cap_terminates() {
    let client = Arc::new(ScriptedClient::repeating(ModelResponse::with_tool_calls(
        "",
        vec![call("c", "Read")],
    )));
    let agent = agent(client.clone(), vec![Arc::new(FakeTool::read_only("Read"))]);
    let options = LoopOptions::default()
        .with_max_turns(2)
        .with_loop_detection(LoopDetectionConfig {
            enabled: false,
            ..Default::default()
        });

    let outcome = agent.run("go", LoopContext::new(), &options).await;
    assert_eq!(outcome.reason(), TerminationReason::MaxTurnsExceeded);
    assert_eq!(client.calls(), 2);
    assert_eq!(outcome.metadata.turns, 2);
    assert_eq!(outcome.metadata.tool_calls, 2);
}

#[tokio::test]
async fn test_turn_limit_handler_extends() {
    let client = Arc::new(ScriptedClient::repeating(ModelResponse::with_tool_calls(
        "",
        vec![call("c", "Read")],
    )));
    let mut handler = MockTurnLimitHandler::new();
    let mut decisions = VecDeque::from([TurnLimitDecision::Extend(1), TurnLimitDecision::Stop]);
    handler
        .expect_on_turn_limit()
        .times(2)
        .returning(move |_, _| decisions.pop_front().unwrap_or(TurnLimitDecision::Stop));

    let agent = agent(client.clone(), vec![Arc::new(FakeTool::read_only("Read"))])
        .with_turn_limit_handler(Arc::new(handler));
    let options = LoopOptions::default()
        .with_max_turns(2)
        .with_loop_detection(LoopDetectionConfig {
            enabled: false,
            ..Default::default()
        });

    let outcome = agent.run("go", LoopContext::new(), &options).await;
    assert_eq!(outcome.reason(), TerminationReason::MaxTurnsExceeded);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn test_repeated_tool_calls_are_detected() {
    let client = Arc::new(ScriptedClient::repeating(ModelResponse::with_tool_calls(
        "",
        vec![ToolCall::from_json("c", "Read", json!({"file_path": "a.rs"}))],
    )));
    let agent = agent(client.clone(), vec![Arc::new(FakeTool::read_only("Read"))]);
    let options = LoopOptions::default().with_loop_detection(LoopDetectionConfig {
        enabled: true,
        tool_repeat_threshold: 3,
        content_repeat_threshold: 3,
        window_size: 10,
        model_check_interval: 0,
    });

    let outcome = agent.run("go", LoopContext::new(), &options).await;
    assert_eq!(outcome.reason(), TerminationReason::LoopDetected);
    assert_eq!(client.calls(), 3);
    // the repeated call is never dispatched
    assert_eq!(outcome.metadata.tool_calls, 2);
}

#[tokio::test]
async fn test_model_judge_stops_loop() {
    let client = Arc::new(ScriptedClient::repeating(ModelResponse::with_tool_calls(
        "",
        vec![call("c", "Read")],
    )));
    let mut judge = MockRepetitionJudge::new();
    judge.expect_is_looping().times(1).returning(|_| Ok(true));

    let agent = agent(client.clone(), vec![Arc::new(FakeTool::read_only("Read"))])
        .with_repetition_judge(Arc::new(judge));
    let options = LoopOptions::default().with_loop_detection(LoopDetectionConfig {
        enabled: false,
        model_check_interval: 1,
        ..Default::default()
    });

    let outcome = agent.run("go", LoopContext::new(), &options).await;
    assert_eq!(outcome.reason(), TerminationReason::LoopDetected);
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_model_error_is_api_error() {
    let client = Arc::new(ScriptedClient::failing(OrcaError::llm("rate limited")));
    let agent = agent(client, Vec::new());

    let outcome = agent
        .run("go", LoopContext::new(), &LoopOptions::default())
        .await;
    assert_eq!(outcome.reason(), TerminationReason::ApiError);
    assert!(!outcome.success);
    let error = outcome.error.unwrap().to_string();
    assert!(error.contains("rate limited"), "got {}", error);
}

#[tokio::test]
async fn test_chat_disabled_skips_model() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::text("never")]));
    let agent = agent(client.clone(), Vec::new());
    let options = LoopOptions::default().with_chat_enabled(false);

    let outcome = agent.run("go", LoopContext::new(), &options).await;
    assert_eq!(outcome.reason(), TerminationReason::ChatDisabled);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_plan_mode_declares_read_only_tools() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::text("plan")]));
    let tools: Vec<SharedTool> = vec![
        Arc::new(FakeTool::read_only("Read")),
        Arc::new(FakeTool::writer("Write")),
    ];
    let agent = agent(client.clone(), tools);
    let options = LoopOptions::default().with_mode(PermissionMode::Plan);

    agent.run("go", LoopContext::new(), &options).await;
    assert_eq!(client.tools_seen(0), vec!["Read".to_string()]);
}

fn small_compaction() -> CompactionConfig {
    CompactionConfig {
        enabled: true,
        context_budget_tokens: 40,
        threshold_fraction: 0.5,
        truncation_keep_recent: 2,
    }
}

fn long_history() -> Vec<Message> {
    (0..10)
        .map(|i| {
            if i % 2 == 0 {
                Message::user(format!("question {} {}", i, "x".repeat(80)))
            } else {
                Message::assistant(format!("answer {} {}", i, "y".repeat(80)))
            }
        })
        .collect()
}

#[tokio::test]
async fn test_compactor_replaces_history() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::text("ok")]));
    let mut compactor = MockCompactor::new();
    compactor.expect_compact().times(1).returning(|messages, _, _| {
        Ok(CompactionOutcome {
            summary: Some("earlier work".to_string()),
            retained: messages[messages.len() - 1..].to_vec(),
            pre_tokens: 0,
            post_tokens: 0,
        })
    });
    let agent = agent(client.clone(), Vec::new()).with_compactor(Arc::new(compactor));
    let mut events = agent.events().subscribe();
    let options = LoopOptions::default().with_compaction(small_compaction());

    let context = LoopContext::new().with_history(long_history());
    let outcome = agent.run("next", context, &options).await;
    assert!(outcome.success);
    assert_eq!(outcome.metadata.compactions, 1);

    let sent = &client.requests.lock()[0].0;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].content.contains("earlier work"));
    assert_eq!(sent[1].content, "next");

    let mut saw_compaction = false;
    while let Ok(event) = events.try_recv() {
        if let LifecycleEvent::Compacted { truncated, .. } = event {
            assert!(!truncated);
            saw_compaction = true;
        }
    }
    assert!(saw_compaction);
}

#[tokio::test]
async fn test_failed_compaction_falls_back_to_truncation() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::text("ok")]));
    let mut compactor = MockCompactor::new();
    compactor
        .expect_compact()
        .returning(|_, _, _| Err(OrcaError::llm("summary failed")));
    let agent = agent(client.clone(), Vec::new()).with_compactor(Arc::new(compactor));
    let options = LoopOptions::default().with_compaction(small_compaction());

    let context = LoopContext::new().with_history(long_history());
    let outcome = agent.run("next", context, &options).await;
    assert!(outcome.success);
    assert_eq!(outcome.metadata.compactions, 1);

    let sent = &client.requests.lock()[0].0;
    assert!(sent.iter().any(|m| m.content.starts_with(TRUNCATION_NOTICE)));
    assert_eq!(sent.last().unwrap().content, "next");
}

#[tokio::test]
async fn test_resumed_history_drops_unanswered_calls() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::text("resumed")]));
    let agent = agent(client.clone(), Vec::new());
    let history = vec![
        Message::user("start"),
        Message::assistant_with_tools("", vec![call("c1", "Read"), call("c2", "Read")]),
        Message::tool_result("c1", "Read", "contents"),
    ];

    let outcome = agent
        .run("continue", LoopContext::new().with_history(history), &LoopOptions::default())
        .await;
    assert!(outcome.success);
    let sent = &client.requests.lock()[0].0;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].content, "start");
    assert_eq!(sent[1].content, "continue");
}

#[test]
fn test_answered_calls_are_kept() {
    let mut messages = vec![
        Message::user("start"),
        Message::assistant_with_tools("", vec![call("c1", "Read")]),
        Message::tool_result("c1", "Read", "contents"),
    ];
    drop_unanswered_tool_calls(&mut messages);
    assert_eq!(messages.len(), 3);
}

#[tokio::test]
async fn test_status_ends_terminated() {
    let client = Arc::new(ScriptedClient::new(vec![ModelResponse::text("done")]));
    let agent = agent(client, Vec::new());
    let context = LoopContext::new();
    let status = context.status.clone();

    agent.run("go", context, &LoopOptions::default()).await;
    assert_eq!(
        status.current(),
        LoopStatus::Terminated(TerminationReason::Success)
    );
}
