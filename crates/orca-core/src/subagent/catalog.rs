//! Sub-agent catalog

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::builtin::builtin_subagents;
use crate::agent::LoopOptions;
use crate::config::LoopConfig;
use crate::modes::PermissionMode;

/// Loop configuration for one kind of sub-agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubagentDefinition {
    /// Type name used to start the agent
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub mode: PermissionMode,
    /// Turn cap, with the same meaning as `LoopOptions::max_turns`
    pub max_turns: i32,
}

impl SubagentDefinition {
    /// Loop options for a run of this sub-agent on top of the base loop config
    pub fn loop_options(&self, base: &LoopConfig) -> LoopOptions {
        LoopOptions::from_config(base)
            .with_mode(self.mode)
            .with_max_turns(self.max_turns)
            .with_system_prompt(self.system_prompt.as_str())
    }
}

/// Registered sub-agent definitions keyed by name
#[derive(Debug, Default)]
pub struct SubagentCatalog {
    definitions: RwLock<HashMap<String, SubagentDefinition>>,
}

/// Shared catalog type
pub type SharedSubagentCatalog = Arc<SubagentCatalog>;

impl SubagentCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the built-in sub-agents
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        for definition in builtin_subagents() {
            catalog.register(definition);
        }
        catalog
    }

    /// Add or replace a definition
    pub fn register(&self, definition: SubagentDefinition) {
        self.definitions
            .write()
            .insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<SubagentDefinition> {
        self.definitions.read().get(name).cloned()
    }

    /// Definition names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}
