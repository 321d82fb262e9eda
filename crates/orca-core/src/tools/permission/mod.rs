//! Permission checker
//!
//! Resolves allow / ask / deny for a tool invocation. Rules are plain strings
//! such as `Read`, `Bash(*)`, `mcp__github__*` or `Read(file_path:*.env)`;
//! deny rules are evaluated first, then allow, then ask, and an invocation
//! that matches nothing resolves to ask.

mod checker;
mod glob;
mod rule;
mod signature;
mod types;


pub use checker::PermissionChecker;
pub use glob::{GlobMatcher, compile_glob, has_glob_chars};
pub use rule::{PermissionRule, split_top_level};
pub use signature::{DISPLAY_FLAGS, SignatureBuilder};
pub use types::{
    MatchType, PermissionBehavior, PermissionCheckResult, PermissionRulesConfig, RiskLevel,
    ToolInvocationDescriptor,
};
