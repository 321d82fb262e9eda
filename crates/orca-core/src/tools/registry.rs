//! Tool registry
//!
//! Holds every tool definition by unique name, indexes them by category and
//! tag, and exposes the subset a permission mode may show to the model.
//! External tool sources register under an `mcp__<source>__` prefix and are
//! removed together when the source disconnects.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{OrcaError, OrcaResult};
use crate::modes::PermissionMode;
use crate::tools::base::{SharedTool, Tool, ToolCategory, ToolError};
use crate::tools::permission::RiskLevel;
use crate::tools::types::{ToolCall, ToolDeclaration, ToolResult, ToolSchema};

/// Prefix shared by all externally sourced tool names
pub const EXTERNAL_TOOL_PREFIX: &str = "mcp__";

#[derive(Default)]
struct RegistryInner {
    tools: HashMap<String, SharedTool>,
    categories: HashMap<ToolCategory, Vec<String>>,
    tags: HashMap<String, Vec<String>>,
    sources: HashMap<String, Vec<String>>,
}

impl RegistryInner {
    fn insert(&mut self, tool: SharedTool) -> OrcaResult<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(OrcaError::DuplicateTool(name));
        }

        self.categories
            .entry(tool.category())
            .or_default()
            .push(name.clone());
        for tag in tool.tags() {
            self.tags.entry(tag).or_default().push(name.clone());
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> bool {
        if self.tools.remove(name).is_none() {
            return false;
        }
        for names in self.categories.values_mut() {
            names.retain(|n| n != name);
        }
        for names in self.tags.values_mut() {
            names.retain(|n| n != name);
        }
        true
    }
}

/// Registry for managing available tools
///
/// Read-mostly after startup; all methods take `&self`.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

/// Shared registry handle
pub type SharedToolRegistry = Arc<ToolRegistry>;

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; fails if the name is taken
    pub fn register(&self, tool: SharedTool) -> OrcaResult<()> {
        let name = tool.name().to_string();
        self.inner.write().insert(tool)?;
        debug!(tool = %name, "registered tool");
        Ok(())
    }

    /// Register several tools, stopping at the first duplicate
    pub fn register_all(&self, tools: impl IntoIterator<Item = SharedTool>) -> OrcaResult<()> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Remove a tool. Returns whether an entry existed; safe to call repeatedly.
    pub fn unregister(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let removed = inner.remove(name);
        if removed {
            for names in inner.sources.values_mut() {
                names.retain(|n| n != name);
            }
            debug!(tool = %name, "unregistered tool");
        }
        removed
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.inner.read().tools.get(name).cloned()
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().tools.contains_key(name)
    }

    /// All tool names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.inner.read().tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().tools.is_empty()
    }

    /// Tools in a category
    pub fn tools_by_category(&self, category: ToolCategory) -> Vec<SharedTool> {
        let inner = self.inner.read();
        inner
            .categories
            .get(&category)
            .map(|names| names.iter().filter_map(|n| inner.tools.get(n).cloned()).collect())
            .unwrap_or_default()
    }

    /// Tools carrying a tag
    pub fn tools_by_tag(&self, tag: &str) -> Vec<SharedTool> {
        let inner = self.inner.read();
        inner
            .tags
            .get(tag)
            .map(|names| names.iter().filter_map(|n| inner.tools.get(n).cloned()).collect())
            .unwrap_or_default()
    }

    /// Declarations for every registered tool, sorted by name
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.declarations_where(|_| true)
    }

    /// Declarations the given mode may show to the model
    pub fn declarations_for_mode(&self, mode: PermissionMode) -> Vec<ToolDeclaration> {
        self.declarations_where(|tool| mode.allows_tool(tool))
    }

    fn declarations_where<F>(&self, filter: F) -> Vec<ToolDeclaration>
    where
        F: Fn(&dyn Tool) -> bool,
    {
        let inner = self.inner.read();
        let mut declarations: Vec<ToolDeclaration> = inner
            .tools
            .values()
            .filter(|tool| filter(tool.as_ref()))
            .map(|tool| tool.schema().renamed(tool.name()))
            .collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    /// Register the tools of an external source under its namespace.
    ///
    /// All-or-nothing: if any namespaced name collides, nothing is added.
    pub fn register_source(&self, source: &str, tools: Vec<SharedTool>) -> OrcaResult<Vec<String>> {
        let mut inner = self.inner.write();
        let mut added: Vec<String> = Vec::with_capacity(tools.len());

        for tool in tools {
            let namespaced: SharedTool = Arc::new(NamespacedTool::new(source, tool));
            let name = namespaced.name().to_string();
            if let Err(e) = inner.insert(namespaced) {
                for name in &added {
                    inner.remove(name);
                }
                return Err(e);
            }
            added.push(name);
        }

        inner
            .sources
            .entry(source.to_string())
            .or_default()
            .extend(added.iter().cloned());
        info!(source = %source, count = added.len(), "registered external tools");
        Ok(added)
    }

    /// Remove every tool registered by a source, returning how many were removed
    pub fn unregister_source(&self, source: &str) -> usize {
        let mut inner = self.inner.write();
        let Some(names) = inner.sources.remove(source) else {
            return 0;
        };
        let removed = names.iter().filter(|name| inner.remove(name)).count();
        info!(source = %source, removed, "unregistered external tools");
        removed
    }

    /// Names of connected external sources
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.inner.read().sources.keys().cloned().collect();
        sources.sort();
        sources
    }
}

/// Build the namespaced name for an external tool
pub fn namespaced_name(source: &str, tool_name: &str) -> String {
    let source: String = source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}{}__{}", EXTERNAL_TOOL_PREFIX, source, tool_name)
}

/// Adapter exposing an external tool under its namespaced name
pub struct NamespacedTool {
    name: String,
    source: String,
    inner: SharedTool,
}

impl NamespacedTool {
    /// Wrap a tool from `source`
    pub fn new(source: &str, inner: SharedTool) -> Self {
        Self {
            name: namespaced_name(source, inner.name()),
            source: source.to_string(),
            inner,
        }
    }

    /// Name of the source this tool came from
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[async_trait]
impl Tool for NamespacedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn schema(&self) -> ToolSchema {
        self.inner.schema().renamed(self.name.clone())
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let mut inner_call = call.clone();
        inner_call.name = self.inner.name().to_string();
        let mut result = self.inner.execute(&inner_call).await?;
        result.tool_name = self.name.clone();
        Ok(result)
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::External
    }

    fn tags(&self) -> Vec<String> {
        let mut tags = self.inner.tags();
        tags.push(format!("source:{}", self.source));
        tags
    }

    fn risk_level(&self) -> RiskLevel {
        self.inner.risk_level()
    }

    fn max_execution_duration(&self) -> Option<Duration> {
        self.inner.max_execution_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::FakeTool;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool::read_only("Read"))).unwrap();
        let err = registry
            .register(Arc::new(FakeTool::read_only("Read")))
            .unwrap_err();
        assert!(matches!(err, OrcaError::DuplicateTool(name) if name == "Read"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool::writer("Write"))).unwrap();
        assert!(registry.unregister("Write"));
        assert!(!registry.unregister("Write"));
        assert!(registry.is_empty());
        assert!(registry.tools_by_category(ToolCategory::FileEdit).is_empty());
    }

    #[test]
    fn test_declarations_for_mode() {
        let registry = ToolRegistry::new();
        registry
            .register_all([
                Arc::new(FakeTool::read_only("Read")) as SharedTool,
                Arc::new(FakeTool::writer("Edit")),
                Arc::new(FakeTool::writer("UpdateSpec")),
            ])
            .unwrap();

        let names = |mode| {
            registry
                .declarations_for_mode(mode)
                .into_iter()
                .map(|d| d.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(PermissionMode::Plan), vec!["Read"]);
        assert_eq!(names(PermissionMode::Spec), vec!["Read", "UpdateSpec"]);
        assert_eq!(names(PermissionMode::Default), vec!["Edit", "Read", "UpdateSpec"]);
    }

    #[test]
    fn test_category_and_tag_index() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(FakeTool::read_only("Grep").with_tags(&["search"])))
            .unwrap();
        assert_eq!(registry.tools_by_tag("search").len(), 1);
        assert_eq!(registry.tools_by_category(ToolCategory::FileRead).len(), 1);
    }

    #[tokio::test]
    async fn test_external_source_lifecycle() {
        let registry = ToolRegistry::new();
        let names = registry
            .register_source(
                "github",
                vec![
                    Arc::new(FakeTool::read_only("list_issues")),
                    Arc::new(FakeTool::writer("create_issue")),
                ],
            )
            .unwrap();
        assert_eq!(names[0], "mcp__github__list_issues");

        let tool = registry.get("mcp__github__create_issue").unwrap();
        assert_eq!(tool.category(), ToolCategory::External);
        let call = ToolCall::new("c1", "mcp__github__create_issue", HashMap::new());
        let result = tool.execute(&call).await.unwrap();
        assert_eq!(result.tool_name, "mcp__github__create_issue");

        assert_eq!(registry.unregister_source("github"), 2);
        assert_eq!(registry.unregister_source("github"), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_source_registration_is_atomic() {
        let registry = ToolRegistry::new();
        registry
            .register_source("fs", vec![Arc::new(FakeTool::read_only("stat"))])
            .unwrap();
        let result = registry.register_source(
            "fs",
            vec![
                Arc::new(FakeTool::read_only("ls")),
                Arc::new(FakeTool::read_only("stat")),
            ],
        );
        assert!(result.is_err());
        assert!(!registry.contains("mcp__fs__ls"));
        assert!(registry.contains("mcp__fs__stat"));
    }

    #[test]
    fn test_namespaced_name_sanitizes_source() {
        assert_eq!(namespaced_name("my server", "t"), "mcp__my_server__t");
    }
}
