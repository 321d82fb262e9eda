//! Permission modes
//!
//! A permission mode is a named policy profile. It decides which tools the
//! model is shown and how confirmations are gated at execution time; both
//! decisions go through [`PermissionMode::allows_tool`] so the model is never
//! offered a tool the pipeline would then reject.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OrcaError;
use crate::tools::base::{Tool, ToolCategory};

/// Tools that drive the spec workflow and stay available in spec mode
pub const SPEC_WORKFLOW_TOOLS: &[&str] = &[
    "EnterSpecMode",
    "UpdateSpec",
    "GetSpecContext",
    "TransitionSpecPhase",
    "AddTask",
    "UpdateTaskStatus",
    "ValidateSpec",
    "ExitSpecMode",
];

/// Named policy profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Every tool exposed, confirmations per rules and risk
    #[default]
    Default,
    /// Like default, but edit tools do not ask
    AutoEdit,
    /// No confirmations; deny rules still apply
    Yolo,
    /// Read-only exploration
    Plan,
    /// Read-only plus the spec workflow tools
    Spec,
}

impl PermissionMode {
    /// Whether a tool is visible and executable in this mode
    pub fn allows_tool(&self, tool: &dyn Tool) -> bool {
        match self {
            Self::Plan => tool.is_read_only(),
            Self::Spec => {
                tool.is_read_only()
                    || tool.category() == ToolCategory::Spec
                    || SPEC_WORKFLOW_TOOLS.contains(&tool.name())
            }
            Self::Default | Self::AutoEdit | Self::Yolo => true,
        }
    }

    /// Whether an ASK decision may be auto-approved for this tool
    pub fn auto_approves(&self, tool: &dyn Tool) -> bool {
        match self {
            Self::Yolo => true,
            Self::AutoEdit => tool.category() == ToolCategory::FileEdit,
            _ => false,
        }
    }

    /// Whether this mode exposes only read-only tools
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Plan)
    }

    /// Get the mode description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Default => "Default mode - all tools, confirmations per policy",
            Self::AutoEdit => "Auto-edit mode - file edits do not require confirmation",
            Self::Yolo => "Yolo mode - no confirmations, deny rules still enforced",
            Self::Plan => "Plan mode - read-only exploration",
            Self::Spec => "Spec mode - read-only plus spec workflow tools",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::AutoEdit => "auto_edit",
            Self::Yolo => "yolo",
            Self::Plan => "plan",
            Self::Spec => "spec",
        };
        f.write_str(name)
    }
}

impl FromStr for PermissionMode {
    type Err = OrcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "default" => Ok(Self::Default),
            "auto_edit" | "autoedit" => Ok(Self::AutoEdit),
            "yolo" => Ok(Self::Yolo),
            "plan" => Ok(Self::Plan),
            "spec" => Ok(Self::Spec),
            other => Err(OrcaError::config(format!("Unknown permission mode: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests;
