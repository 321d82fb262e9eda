//! Built-in sub-agents

use super::catalog::SubagentDefinition;
use crate::modes::PermissionMode;

pub const GENERAL_PURPOSE: &str = "general-purpose";
pub const EXPLORE: &str = "explore";
pub const PLAN: &str = "plan";

/// All built-in sub-agent definitions
pub fn builtin_subagents() -> Vec<SubagentDefinition> {
    vec![general_purpose(), explore(), plan()]
}

/// Full tool access for multi-step tasks
fn general_purpose() -> SubagentDefinition {
    SubagentDefinition {
        name: GENERAL_PURPOSE.to_string(),
        description: "General-purpose agent for researching complex questions, searching for code, and executing multi-step tasks.".to_string(),
        system_prompt: GENERAL_PURPOSE_PROMPT.to_string(),
        mode: PermissionMode::Default,
        max_turns: 50,
    }
}

/// Read-only codebase exploration
fn explore() -> SubagentDefinition {
    SubagentDefinition {
        name: EXPLORE.to_string(),
        description: "Fast read-only agent for finding files, searching code and answering questions about the codebase.".to_string(),
        system_prompt: EXPLORE_PROMPT.to_string(),
        mode: PermissionMode::Plan,
        max_turns: 20,
    }
}

/// Implementation planning without edits
fn plan() -> SubagentDefinition {
    SubagentDefinition {
        name: PLAN.to_string(),
        description: "Software architect agent that returns step-by-step implementation plans and the files they touch.".to_string(),
        system_prompt: PLAN_PROMPT.to_string(),
        mode: PermissionMode::Plan,
        max_turns: 30,
    }
}

const GENERAL_PURPOSE_PROMPT: &str = r#"You are a general-purpose agent working on a delegated task.

Break the task into steps, use the most appropriate tool for each step and verify your work as you go.
When you are done, reply with a concise summary of what you found or changed."#;

const EXPLORE_PROMPT: &str = r#"You are a fast exploration agent. You can search for files, search file contents and read files. You cannot modify anything.

Start broad to find candidate files, narrow down with content search, then read what matters.
Return your findings as soon as you have enough information."#;

const PLAN_PROMPT: &str = r#"You are a software architect designing an implementation plan. You can read the codebase but not modify it.

Your reply should contain:
- Summary: the approach in a few sentences
- Files: every file to create or modify
- Steps: ordered, concrete implementation steps
- Testing: how to verify the change"#;
