//! JSON file session store, one `<id>.json` file per session

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::store::SessionStore;
use super::types::{AgentSession, SessionPatch};
use crate::error::{OrcaError, OrcaResult};

/// Session store writing pretty-printed JSON files under a directory
pub struct JsonFileSessionStore {
    base_path: PathBuf,
    // serialises read-modify-write in `update`
    write_lock: Mutex<()>,
}

impl JsonFileSessionStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store under `~/.config/orca/sessions`
    pub fn default_path() -> OrcaResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| OrcaError::config("Could not determine home directory"))?;
        Ok(Self::new(home.join(".config").join("orca").join("sessions")))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of a session file; ids that could escape the directory are rejected
    fn session_path(&self, id: &str) -> OrcaResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\', '\0']) || id.starts_with('.') {
            return Err(OrcaError::validation_field(
                "id",
                format!("Invalid session id '{}'", id),
            ));
        }
        Ok(self.base_path.join(format!("{}.json", id)))
    }

    async fn ensure_dir(&self) -> OrcaResult<()> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            OrcaError::io_with_path(
                format!("Failed to create session directory: {}", e),
                self.base_path.display().to_string(),
            )
        })
    }

    async fn write(&self, session: &AgentSession) -> OrcaResult<()> {
        self.ensure_dir().await?;
        let path = self.session_path(&session.id)?;
        let json = serde_json::to_string_pretty(session)?;

        // write then rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(|e| {
            OrcaError::io_with_path(
                format!("Failed to write session file: {}", e),
                tmp.display().to_string(),
            )
        })?;
        fs::rename(&tmp, &path).await?;
        debug!(session_id = %session.id, path = %path.display(), "saved session");
        Ok(())
    }

    async fn read(&self, path: &Path) -> OrcaResult<Option<AgentSession>> {
        let json = match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OrcaError::io_with_path(
                    format!("Failed to read session file: {}", e),
                    path.display().to_string(),
                ));
            }
        };
        let session = serde_json::from_str(&json).map_err(|e| {
            OrcaError::storage(format!(
                "Failed to parse session file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(session))
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn save(&self, session: &AgentSession) -> OrcaResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write(session).await
    }

    async fn load(&self, id: &str) -> OrcaResult<Option<AgentSession>> {
        self.read(&self.session_path(id)?).await
    }

    async fn update(&self, id: &str, patch: SessionPatch) -> OrcaResult<AgentSession> {
        let _guard = self.write_lock.lock().await;
        let mut session = self
            .read(&self.session_path(id)?)
            .await?
            .ok_or_else(|| OrcaError::not_found_resource("session", format!("Session {}", id)))?;
        session.apply(patch)?;
        self.write(&session).await?;
        Ok(session)
    }

    async fn list_running(&self) -> OrcaResult<Vec<AgentSession>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut running = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match self.read(&path).await {
                Ok(Some(session)) if session.is_running() => running.push(session),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session"),
            }
        }
        running.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(running)
    }

    async fn delete(&self, id: &str) -> OrcaResult<bool> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.session_path(id)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use crate::session::AgentStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::new(dir.path().join("sessions"));

        let mut session = AgentSession::new("a1", "explore", "scan", "find main");
        session.messages.push(Message::user("find main"));
        store.save(&session).await.unwrap();

        assert!(dir.path().join("sessions").join("a1.json").exists());
        let loaded = store.load("a1").await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_enforces_transitions() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        store
            .save(&AgentSession::new("a1", "explore", "d", "p"))
            .await
            .unwrap();

        store
            .update("a1", SessionPatch::status(AgentStatus::Cancelled))
            .await
            .unwrap();
        assert!(
            store
                .update("a1", SessionPatch::status(AgentStatus::Completed))
                .await
                .is_err()
        );
        let loaded = store.load("a1").await.unwrap().unwrap();
        assert_eq!(loaded.status, AgentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_list_running_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        store.save(&AgentSession::new("a1", "explore", "d", "p")).await.unwrap();
        store.save(&AgentSession::new("a2", "explore", "d", "p")).await.unwrap();
        store
            .update("a2", SessionPatch::status(AgentStatus::Completed))
            .await
            .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let running = store.list_running().await.unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "a1");
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::new(dir.path().join("absent"));
        assert!(store.list_running().await.unwrap().is_empty());
        assert!(!store.delete("a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ids_cannot_escape_directory() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSessionStore::new(dir.path().join("sessions"));
        std::fs::write(
            dir.path().join("outside.json"),
            serde_json::to_string(&AgentSession::new("outside", "explore", "d", "p")).unwrap(),
        )
        .unwrap();

        for id in ["../outside", "..", "a/b", "a\\b", ""] {
            assert!(
                matches!(store.load(id).await, Err(OrcaError::Validation { .. })),
                "id {:?} was accepted",
                id
            );
        }
        assert!(store.delete("../outside").await.is_err());
        assert!(
            store
                .save(&AgentSession::new("../outside", "explore", "d", "p"))
                .await
                .is_err()
        );
        assert!(dir.path().join("outside.json").exists());
    }
}
