//! Confirmation collaborator
//!
//! The pipeline asks a [`ConfirmationHandler`] before running an invocation
//! that resolved to ask, or whose risk is at or above the configured
//! threshold. Session-scoped approvals are remembered by signature for the
//! lifetime of the pipeline.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::tools::permission::{PermissionBehavior, RiskLevel};

/// How long an approval lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationScope {
    /// This invocation only
    #[default]
    Once,
    /// Every invocation with the same signature until the process exits
    Session,
}

/// Details shown to whoever confirms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub call_id: String,
    pub tool_name: String,
    pub signature: String,
    pub arguments: HashMap<String, serde_json::Value>,
    pub risk_level: RiskLevel,
    /// Decision the rules produced; `Allow` means the risk threshold triggered
    pub decision: PermissionBehavior,
    pub matched_rule: Option<String>,
}

/// Answer from the confirmation handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub approved: bool,
    pub scope: ConfirmationScope,
    pub reason: Option<String>,
}

impl ConfirmationResponse {
    pub fn approve_once() -> Self {
        Self {
            approved: true,
            scope: ConfirmationScope::Once,
            reason: None,
        }
    }

    pub fn approve_for_session() -> Self {
        Self {
            approved: true,
            scope: ConfirmationScope::Session,
            reason: None,
        }
    }

    pub fn refuse(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            scope: ConfirmationScope::Once,
            reason: Some(reason.into()),
        }
    }
}

/// Asks a human (or a policy) to approve a tool invocation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn request_confirmation(&self, request: ConfirmationRequest) -> ConfirmationResponse;
}

/// Shared confirmation handler type
pub type SharedConfirmationHandler = Arc<dyn ConfirmationHandler>;

/// Approves everything once (non-interactive use)
pub struct AutoApproveHandler;

#[async_trait]
impl ConfirmationHandler for AutoApproveHandler {
    async fn request_confirmation(&self, _request: ConfirmationRequest) -> ConfirmationResponse {
        ConfirmationResponse::approve_once()
    }
}

/// Refuses everything (restricted environments)
pub struct AutoDenyHandler {
    pub reason: String,
}

impl AutoDenyHandler {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ConfirmationHandler for AutoDenyHandler {
    async fn request_confirmation(&self, _request: ConfirmationRequest) -> ConfirmationResponse {
        ConfirmationResponse::refuse(self.reason.clone())
    }
}

/// Signatures approved for the rest of the session
#[derive(Debug, Default)]
pub struct SessionApprovals {
    signatures: RwLock<HashSet<String>>,
}

impl SessionApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approve(&self, signature: impl Into<String>) {
        self.signatures.write().insert(signature.into());
    }

    pub fn is_approved(&self, signature: &str) -> bool {
        self.signatures.read().contains(signature)
    }

    pub fn len(&self) -> usize {
        self.signatures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.read().is_empty()
    }

    pub fn clear(&self) {
        self.signatures.write().clear();
    }
}
