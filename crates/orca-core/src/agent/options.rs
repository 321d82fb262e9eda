//! Loop options and per-run context

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::state::StatusTracker;
use crate::config::{CompactionConfig, LoopConfig, LoopDetectionConfig};
use crate::llm::Message;
use crate::modes::PermissionMode;

/// How a loop run behaves
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// -1 unlimited, 0 a single reply with tools disabled, N caps turns
    pub max_turns: i32,
    pub mode: PermissionMode,
    /// Prepended when the conversation has no system message yet
    pub system_prompt: Option<String>,
    /// Run a turn's tool calls concurrently (results are still appended in order)
    pub parallel_tools: bool,
    /// When false the loop terminates `chat_disabled` without calling the model
    pub chat_enabled: bool,
    pub loop_detection: LoopDetectionConfig,
    pub compaction: CompactionConfig,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from_config(&LoopConfig::default())
    }
}

impl LoopOptions {
    pub fn from_config(config: &LoopConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            mode: PermissionMode::Default,
            system_prompt: None,
            parallel_tools: true,
            chat_enabled: true,
            loop_detection: config.loop_detection.clone(),
            compaction: config.compaction.clone(),
        }
    }

    pub fn with_max_turns(mut self, max_turns: i32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_mode(mut self, mode: PermissionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    pub fn with_chat_enabled(mut self, enabled: bool) -> Self {
        self.chat_enabled = enabled;
        self
    }

    pub fn with_loop_detection(mut self, config: LoopDetectionConfig) -> Self {
        self.loop_detection = config;
        self
    }

    pub fn with_compaction(mut self, config: CompactionConfig) -> Self {
        self.compaction = config;
        self
    }
}

/// Caller-owned state for one run
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub loop_id: String,
    pub cancel: CancellationToken,
    /// Prior conversation to continue from
    pub history: Vec<Message>,
    pub session_id: Option<String>,
    pub status: StatusTracker,
}

impl Default for LoopContext {
    fn default() -> Self {
        Self {
            loop_id: Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            history: Vec::new(),
            session_id: None,
            status: StatusTracker::new(),
        }
    }
}

impl LoopContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_loop_id(mut self, loop_id: impl Into<String>) -> Self {
        self.loop_id = loop_id.into();
        self
    }
}
