//! Running-table entries and start options

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::modes::PermissionMode;
use crate::session::AgentStatus;

/// What to run in the background
#[derive(Debug, Clone)]
pub struct BackgroundAgentOptions {
    /// Sub-agent type from the catalog
    pub subagent_type: String,
    /// Short task description shown in listings
    pub description: String,
    pub prompt: String,
    pub parent_session_id: Option<String>,
    /// Overrides the sub-agent's turn cap
    pub max_turns: Option<i32>,
    /// Overrides the sub-agent's permission mode
    pub mode: Option<PermissionMode>,
}

impl BackgroundAgentOptions {
    pub fn new(
        subagent_type: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            subagent_type: subagent_type.into(),
            description: description.into(),
            prompt: prompt.into(),
            parent_session_id: None,
            max_turns: None,
            mode: None,
        }
    }

    pub fn with_parent(mut self, parent_session_id: impl Into<String>) -> Self {
        self.parent_session_id = Some(parent_session_id.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: i32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_mode(mut self, mode: PermissionMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// A live background run.
///
/// `run_id` distinguishes successive runs of a resumed session so a stale
/// settle never removes a newer run's entry.
#[derive(Debug, Clone)]
pub struct BackgroundTaskHandle {
    pub id: String,
    pub run_id: u64,
    pub cancel: CancellationToken,
    pub started_at: DateTime<Utc>,
    /// Terminal status once the run has settled
    pub(crate) result: watch::Receiver<Option<AgentStatus>>,
}

impl BackgroundTaskHandle {
    /// Settled status, if any
    pub fn settled_status(&self) -> Option<AgentStatus> {
        *self.result.borrow()
    }

    /// Wait until the run settles; a dropped task counts as settled
    pub async fn settled(&self) {
        let mut result = self.result.clone();
        let _ = result.wait_for(|status| status.is_some()).await;
    }
}
