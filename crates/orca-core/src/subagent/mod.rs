//! Sub-agent definitions
//!
//! A sub-agent is a named loop configuration: system prompt, permission mode
//! and turn cap. Background agents are started by sub-agent type.

mod builtin;
mod catalog;

pub use builtin::{EXPLORE, GENERAL_PURPOSE, PLAN, builtin_subagents};
pub use catalog::{SharedSubagentCatalog, SubagentCatalog, SubagentDefinition};
