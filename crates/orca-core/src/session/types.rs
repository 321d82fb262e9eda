//! Session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{OrcaError, OrcaResult};
use crate::llm::Message;

/// Lifecycle status of a background agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Status only moves forward: running may settle into any terminal
    /// status, and a terminal status never changes.
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        matches!(self, Self::Running) && next.is_terminal()
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A background agent's persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: String,
    pub subagent_type: String,
    pub description: String,
    /// Prompt of the most recent run
    pub prompt: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_session_id: Option<String>,
    /// Final assistant message of a completed run
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AgentSession {
    /// New running session
    pub fn new(
        id: impl Into<String>,
        subagent_type: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            subagent_type: subagent_type.into(),
            description: description.into(),
            prompt: prompt.into(),
            messages: Vec::new(),
            status: AgentStatus::Running,
            created_at: now,
            last_active_at: now,
            completed_at: None,
            parent_session_id: None,
            result: None,
            error: None,
        }
    }

    pub fn with_parent(mut self, parent_session_id: impl Into<String>) -> Self {
        self.parent_session_id = Some(parent_session_id.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == AgentStatus::Running
    }

    /// Start a new run on a settled session, keeping its history
    pub fn restart(&mut self, prompt: impl Into<String>) -> OrcaResult<()> {
        if self.is_running() {
            return Err(OrcaError::invalid_state(format!(
                "Session {} is still running",
                self.id
            )));
        }
        self.prompt = prompt.into();
        self.status = AgentStatus::Running;
        self.completed_at = None;
        self.result = None;
        self.error = None;
        self.last_active_at = Utc::now();
        Ok(())
    }

    /// Apply a patch, rejecting status moves that go backwards
    pub fn apply(&mut self, patch: SessionPatch) -> OrcaResult<()> {
        if let Some(next) = patch.status {
            if !self.status.can_transition_to(next) {
                return Err(OrcaError::invalid_state(format!(
                    "Session {} cannot move from {} to {}",
                    self.id, self.status, next
                )));
            }
        }

        let now = Utc::now();
        if let Some(next) = patch.status {
            self.status = next;
            self.completed_at = Some(now);
        }
        if let Some(messages) = patch.messages {
            self.messages = messages;
        }
        if patch.result.is_some() {
            self.result = patch.result;
        }
        if patch.error.is_some() {
            self.error = patch.error;
        }
        self.last_active_at = now;
        Ok(())
    }
}

/// Partial update applied through [`SessionStore::update`](super::SessionStore::update)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub status: Option<AgentStatus>,
    pub messages: Option<Vec<Message>>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl SessionPatch {
    pub fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }
}
