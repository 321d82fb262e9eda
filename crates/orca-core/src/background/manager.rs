//! Background agent manager

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::handle::{BackgroundAgentOptions, BackgroundTaskHandle};
use crate::agent::{LoopContext, LoopOptions, LoopOutcome, SharedAgenticLoop};
use crate::config::{BackgroundConfig, LoopConfig};
use crate::error::{OrcaError, OrcaResult};
use crate::events::{LifecycleEvent, SharedEventBus};
use crate::llm::Message;
use crate::session::{AgentSession, AgentStatus, SessionPatch, SharedSessionStore};
use crate::subagent::{SharedSubagentCatalog, SubagentCatalog, SubagentDefinition};

/// Starts, tracks, cancels and resumes background agents
#[derive(Clone)]
pub struct BackgroundAgentManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    agent: SharedAgenticLoop,
    store: SharedSessionStore,
    catalog: SharedSubagentCatalog,
    loop_config: LoopConfig,
    config: BackgroundConfig,
    running: DashMap<String, BackgroundTaskHandle>,
    next_run: AtomicU64,
    events: SharedEventBus,
}

impl BackgroundAgentManager {
    pub fn new(agent: SharedAgenticLoop, store: SharedSessionStore, config: BackgroundConfig) -> Self {
        let events = agent.events().clone();
        Self {
            inner: Arc::new(ManagerInner {
                agent,
                store,
                catalog: Arc::new(SubagentCatalog::with_builtins()),
                loop_config: LoopConfig::default(),
                config,
                running: DashMap::new(),
                next_run: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// Use a custom sub-agent catalog. Must be called before the manager is cloned.
    pub fn with_catalog(self, catalog: SharedSubagentCatalog) -> Self {
        self.map_inner(|inner| inner.catalog = catalog)
    }

    /// Base loop config sub-agent options are layered on
    pub fn with_loop_config(self, loop_config: LoopConfig) -> Self {
        self.map_inner(|inner| inner.loop_config = loop_config)
    }

    fn map_inner(mut self, f: impl FnOnce(&mut ManagerInner)) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            f(inner);
        } else {
            warn!("background manager already shared, configuration change ignored");
        }
        self
    }

    pub fn catalog(&self) -> &SharedSubagentCatalog {
        &self.inner.catalog
    }

    pub fn store(&self) -> &SharedSessionStore {
        &self.inner.store
    }

    /// Create a running session and launch its loop; returns the agent id
    #[instrument(skip_all, fields(subagent_type = %options.subagent_type))]
    pub async fn start_background_agent(&self, options: BackgroundAgentOptions) -> OrcaResult<String> {
        let definition = self.definition(&options.subagent_type)?;
        let id = format!("agent_{}", Uuid::new_v4().simple());

        let mut session = AgentSession::new(
            &id,
            &options.subagent_type,
            &options.description,
            &options.prompt,
        );
        if let Some(parent) = &options.parent_session_id {
            session = session.with_parent(parent.as_str());
        }

        let (handle, tx) = self.reserve(&id)?;
        if let Err(e) = self.inner.store.save(&session).await {
            self.inner.release(&id, handle.run_id);
            return Err(e);
        }

        let loop_options = self.loop_options(&definition, &options);
        self.spawn_run(handle, tx, options.prompt, Vec::new(), loop_options);

        info!(agent_id = %id, "background agent started");
        self.inner.events.publish(LifecycleEvent::BackgroundAgentStarted {
            agent_id: id.clone(),
            description: options.description,
        });
        Ok(id)
    }

    /// Wait up to `timeout` for the agent to settle and return its session.
    ///
    /// A zero timeout waits indefinitely. Timing out does not cancel the
    /// agent; the snapshot then still says running.
    pub async fn wait_for_completion(&self, id: &str, timeout: Duration) -> OrcaResult<AgentSession> {
        let handle = self.inner.running.get(id).map(|h| h.value().clone());
        if let Some(handle) = handle {
            if timeout.is_zero() {
                handle.settled().await;
            } else if tokio::time::timeout(timeout, handle.settled()).await.is_err() {
                debug!(agent_id = %id, ?timeout, "wait timed out, agent still running");
            }
        }
        self.get_session(id)
            .await?
            .ok_or_else(|| OrcaError::not_found_resource("session", format!("Agent {}", id)))
    }

    /// Cancel a running agent, or mark an orphaned running session cancelled.
    ///
    /// Returns false when the session had already settled.
    #[instrument(skip(self))]
    pub async fn kill_agent(&self, id: &str) -> OrcaResult<bool> {
        let handle = self.inner.running.get(id).map(|h| h.value().clone());
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let patch = SessionPatch::status(AgentStatus::Cancelled).with_error("Killed by user");
            match self.inner.store.update(id, patch).await {
                Ok(_) => info!(agent_id = %id, "background agent cancelled"),
                Err(OrcaError::InvalidState { .. }) => {
                    debug!(agent_id = %id, "agent settled before the kill was recorded")
                }
                Err(e) => return Err(e),
            }
            return Ok(true);
        }

        let session = self
            .inner
            .store
            .load(id)
            .await?
            .ok_or_else(|| OrcaError::not_found_resource("session", format!("Agent {}", id)))?;
        if !session.is_running() {
            return Ok(false);
        }

        warn!(agent_id = %id, "no live task for running session, marking cancelled");
        self.inner
            .store
            .update(
                id,
                SessionPatch::status(AgentStatus::Cancelled).with_error("Killed after its task was lost"),
            )
            .await?;
        Ok(true)
    }

    /// Start a new run under the same id, seeded with the prior history
    #[instrument(skip(self, prompt))]
    pub async fn resume_agent(&self, id: &str, prompt: &str) -> OrcaResult<()> {
        if self.is_running(id) {
            return Err(OrcaError::invalid_state(format!("Agent {} is still running", id)));
        }
        let mut session = self
            .inner
            .store
            .load(id)
            .await?
            .ok_or_else(|| OrcaError::not_found_resource("session", format!("Agent {}", id)))?;
        if session.is_running() {
            return Err(OrcaError::invalid_state(format!(
                "Agent {} is marked running without a live task",
                id
            )));
        }
        let definition = self.definition(&session.subagent_type)?;
        let history = session.messages.clone();
        session.restart(prompt)?;

        let (handle, tx) = self.reserve(id)?;
        if let Err(e) = self.inner.store.save(&session).await {
            self.inner.release(id, handle.run_id);
            return Err(e);
        }

        let options = BackgroundAgentOptions::new(&session.subagent_type, &session.description, prompt);
        let loop_options = self.loop_options(&definition, &options);
        self.spawn_run(handle, tx, prompt.to_string(), history, loop_options);
        info!(agent_id = %id, "background agent resumed");
        Ok(())
    }

    /// Live runs, oldest first
    pub fn list_running(&self) -> Vec<BackgroundTaskHandle> {
        let mut handles: Vec<BackgroundTaskHandle> =
            self.inner.running.iter().map(|h| h.value().clone()).collect();
        handles.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        handles
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.inner.running.contains_key(id)
    }

    pub async fn get_session(&self, id: &str) -> OrcaResult<Option<AgentSession>> {
        self.inner.store.load(id).await
    }

    /// Mark persisted running sessions with no live task failed once they are
    /// older than the grace period. Returns the ids marked.
    #[instrument(skip(self))]
    pub async fn reconcile_orphans(&self) -> OrcaResult<Vec<String>> {
        let grace = self.inner.config.orphan_grace_period;
        let now = Utc::now();
        let mut reconciled = Vec::new();

        for session in self.inner.store.list_running().await? {
            if self.is_running(&session.id) {
                continue;
            }
            let idle = now
                .signed_duration_since(session.last_active_at)
                .to_std()
                .unwrap_or_default();
            if idle < grace {
                continue;
            }

            let reason = OrcaError::orphan_session(&session.id, "no live task after restart");
            warn!(agent_id = %session.id, error = %reason, "reconciling orphaned session");
            let patch = SessionPatch::status(AgentStatus::Failed).with_error(reason.to_string());
            match self.inner.store.update(&session.id, patch).await {
                Ok(_) => reconciled.push(session.id),
                Err(OrcaError::InvalidState { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reconciled)
    }

    /// Cancel every live run and wait up to `timeout` for each to settle.
    /// Returns how many runs were cancelled.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let handles = self.list_running();
        for handle in &handles {
            handle.cancel.cancel();
        }
        for handle in &handles {
            if tokio::time::timeout(timeout, handle.settled()).await.is_err() {
                warn!(agent_id = %handle.id, "agent did not settle before shutdown timeout");
            }
        }
        info!(count = handles.len(), "background agents shut down");
        handles.len()
    }

    fn definition(&self, subagent_type: &str) -> OrcaResult<SubagentDefinition> {
        self.inner.catalog.get(subagent_type).ok_or_else(|| {
            OrcaError::not_found_resource("subagent", format!("Unknown sub-agent type: {}", subagent_type))
        })
    }

    fn loop_options(&self, definition: &SubagentDefinition, options: &BackgroundAgentOptions) -> LoopOptions {
        let mut loop_options = definition.loop_options(&self.inner.loop_config);
        if let Some(max_turns) = options.max_turns {
            loop_options = loop_options.with_max_turns(max_turns);
        }
        if let Some(mode) = options.mode {
            loop_options = loop_options.with_mode(mode);
        }
        loop_options
    }

    /// Claim the running-table slot for `id`
    fn reserve(&self, id: &str) -> OrcaResult<(BackgroundTaskHandle, watch::Sender<Option<AgentStatus>>)> {
        match self.inner.running.entry(id.to_string()) {
            Entry::Occupied(_) => Err(OrcaError::invalid_state(format!("Agent {} is still running", id))),
            Entry::Vacant(slot) => {
                let (tx, rx) = watch::channel(None);
                let handle = BackgroundTaskHandle {
                    id: id.to_string(),
                    run_id: self.inner.next_run.fetch_add(1, Ordering::SeqCst),
                    cancel: CancellationToken::new(),
                    started_at: Utc::now(),
                    result: rx,
                };
                slot.insert(handle.clone());
                Ok((handle, tx))
            }
        }
    }

    fn spawn_run(
        &self,
        handle: BackgroundTaskHandle,
        tx: watch::Sender<Option<AgentStatus>>,
        prompt: String,
        history: Vec<Message>,
        options: LoopOptions,
    ) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let context = LoopContext::new()
                .with_loop_id(handle.id.as_str())
                .with_session(handle.id.as_str())
                .with_cancel(handle.cancel.clone())
                .with_history(history);

            let run = AssertUnwindSafe(inner.agent.run(&prompt, context, &options))
                .catch_unwind()
                .await;
            let patch = match run {
                Ok(outcome) => settle_patch(outcome),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(agent_id = %handle.id, panic = %message, "background agent panicked");
                    SessionPatch::status(AgentStatus::Failed).with_error(format!("Agent panicked: {}", message))
                }
            };
            inner.settle(&handle, patch, tx).await;
        });
    }
}

impl ManagerInner {
    /// The one completion path for a run: record the terminal status, drop the
    /// running-table entry, then wake waiters.
    async fn settle(
        &self,
        handle: &BackgroundTaskHandle,
        patch: SessionPatch,
        tx: watch::Sender<Option<AgentStatus>>,
    ) {
        let id = handle.id.as_str();
        let messages = patch.messages.clone();
        let mut status = patch.status.unwrap_or(AgentStatus::Failed);

        match self.store.update(id, patch).await {
            Ok(_) => {}
            Err(OrcaError::InvalidState { .. }) => {
                // already terminal, usually cancelled by a kill; keep its status
                if let Ok(Some(session)) = self.store.load(id).await {
                    status = session.status;
                }
                if let Some(messages) = messages {
                    let keep = SessionPatch {
                        messages: Some(messages),
                        ..Default::default()
                    };
                    if let Err(e) = self.store.update(id, keep).await {
                        warn!(agent_id = %id, error = %e, "failed to store final history");
                    }
                }
            }
            Err(e) => warn!(agent_id = %id, error = %e, "failed to record settled session"),
        }

        self.release(id, handle.run_id);
        tx.send_replace(Some(status));
        info!(agent_id = %id, status = %status, "background agent settled");
        self.events.publish(LifecycleEvent::BackgroundAgentSettled {
            agent_id: id.to_string(),
            status,
        });
    }

    fn release(&self, id: &str, run_id: u64) {
        self.running.remove_if(id, |_, handle| handle.run_id == run_id);
    }
}

fn settle_patch(outcome: LoopOutcome) -> SessionPatch {
    let reason = outcome.reason();
    let patch = if reason.is_success() {
        let mut patch = SessionPatch::status(AgentStatus::Completed);
        if let Some(message) = outcome.final_message {
            patch = patch.with_result(message);
        }
        patch
    } else if reason.is_cancellation() {
        SessionPatch::status(AgentStatus::Cancelled)
    } else {
        let error = outcome
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| reason.to_string());
        SessionPatch::status(AgentStatus::Failed).with_error(error)
    };
    patch.with_messages(outcome.messages)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
