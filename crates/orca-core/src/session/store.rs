//! Session store collaborator and the in-memory backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{AgentSession, SessionPatch};
use crate::error::{OrcaError, OrcaResult};

/// Persists background agent sessions.
///
/// `update` must reject backwards status moves so concurrent settle and kill
/// paths cannot overwrite each other's terminal status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session
    async fn save(&self, session: &AgentSession) -> OrcaResult<()>;

    /// Load a session by id
    async fn load(&self, id: &str) -> OrcaResult<Option<AgentSession>>;

    /// Apply a patch and return the updated session
    async fn update(&self, id: &str, patch: SessionPatch) -> OrcaResult<AgentSession>;

    /// Sessions whose persisted status is running
    async fn list_running(&self) -> OrcaResult<Vec<AgentSession>>;

    /// Remove a session, returning whether it existed
    async fn delete(&self, id: &str) -> OrcaResult<bool>;
}

/// Shared session store type
pub type SharedSessionStore = Arc<dyn SessionStore>;

/// In-memory session store (tests and ephemeral runs)
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, AgentSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &AgentSession) -> OrcaResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> OrcaResult<Option<AgentSession>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: SessionPatch) -> OrcaResult<AgentSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| OrcaError::not_found_resource("session", format!("Session {}", id)))?;
        session.apply(patch)?;
        Ok(session.clone())
    }

    async fn list_running(&self) -> OrcaResult<Vec<AgentSession>> {
        let mut running: Vec<AgentSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_running())
            .cloned()
            .collect();
        running.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(running)
    }

    async fn delete(&self, id: &str) -> OrcaResult<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }
}
