//! Core types for the permission system

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::tools::types::ToolCall;

/// Parameter keys that carry filesystem paths
pub(crate) const PATH_KEYS: &[&str] = &["file_path", "path", "notebook_path"];

/// Risk level for tool operations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Read-only operations, no side effects
    Low,
    /// Local modifications, reversible
    #[default]
    Medium,
    /// Significant changes, network access
    High,
    /// System modifications, irreversible operations
    Critical,
}

impl RiskLevel {
    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low risk - safe, read-only operation",
            RiskLevel::Medium => "Medium risk - local changes, reversible",
            RiskLevel::High => "High risk - significant changes",
            RiskLevel::Critical => "Critical risk - irreversible or system-wide",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Decision for a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionBehavior {
    /// Run without asking
    Allow,
    /// Ask the confirmation handler
    Ask,
    /// Refuse
    Deny,
}

impl fmt::Display for PermissionBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionBehavior::Allow => write!(f, "allow"),
            PermissionBehavior::Ask => write!(f, "ask"),
            PermissionBehavior::Deny => write!(f, "deny"),
        }
    }
}

/// How a rule matched, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Rule equals the full signature
    Exact,
    /// Rule is the bare tool name
    Prefix,
    /// `*` or `Tool(*)`
    Wildcard,
    /// Glob over the tool name and parameter values
    Glob,
}

impl MatchType {
    /// All match types in the order they are tried
    pub const ORDER: [MatchType; 4] = [
        MatchType::Exact,
        MatchType::Prefix,
        MatchType::Wildcard,
        MatchType::Glob,
    ];
}

/// Outcome of a permission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheckResult {
    pub result: PermissionBehavior,
    pub matched_rule: Option<String>,
    pub match_type: Option<MatchType>,
    /// Canonical signature the decision was made for
    pub signature: String,
}

impl PermissionCheckResult {
    pub(crate) fn unmatched(signature: String) -> Self {
        Self {
            result: PermissionBehavior::Ask,
            matched_rule: None,
            match_type: None,
            signature,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.result == PermissionBehavior::Allow
    }

    pub fn is_denied(&self) -> bool {
        self.result == PermissionBehavior::Deny
    }
}

/// What the checker sees of a tool invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolInvocationDescriptor {
    pub tool_name: String,
    pub parameters: HashMap<String, serde_json::Value>,
    pub affected_paths: Vec<String>,
}

impl ToolInvocationDescriptor {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_affected_path(mut self, path: impl Into<String>) -> Self {
        self.affected_paths.push(path.into());
        self
    }

    /// Build a descriptor from a tool call, collecting path-like arguments
    pub fn from_call(call: &ToolCall) -> Self {
        let affected_paths = PATH_KEYS
            .iter()
            .filter_map(|key| call.arguments.get(*key))
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        Self {
            tool_name: call.name.clone(),
            parameters: call.arguments.clone(),
            affected_paths,
        }
    }
}

/// Rule lists as they appear in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionRulesConfig {
    pub allow: Vec<String>,
    pub ask: Vec<String>,
    pub deny: Vec<String>,
}

impl PermissionRulesConfig {
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.ask.is_empty() && self.deny.is_empty()
    }
}
