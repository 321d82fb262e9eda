//! Per-invocation execution context

use tokio_util::sync::CancellationToken;

use crate::agent::StatusTracker;
use crate::modes::PermissionMode;

/// What the caller hands the pipeline along with a tool call
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Policy mode the call runs under
    pub mode: PermissionMode,
    /// Cancelled when the owning loop is aborted
    pub cancel: CancellationToken,
    /// Session the call belongs to, for log correlation
    pub session_id: Option<String>,
    /// Loop status to flip while waiting on confirmation
    pub status: Option<StatusTracker>,
}

impl ExecutionContext {
    pub fn new(mode: PermissionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_status(mut self, status: StatusTracker) -> Self {
        self.status = Some(status);
        self
    }
}
