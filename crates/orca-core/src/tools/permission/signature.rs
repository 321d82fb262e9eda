//! Canonical invocation signatures
//!
//! A signature is the tool name plus a filtered projection of its parameters,
//! e.g. `Read(file_path:src/lib.rs)`. Parameters that only change how a result
//! is displayed are dropped, so one approval covers every variation of the
//! same underlying operation.

use std::collections::{BTreeMap, HashMap};

use super::types::ToolInvocationDescriptor;

/// Parameters dropped from signatures of tools without an explicit projection
pub const DISPLAY_FLAGS: &[&str] = &[
    "description",
    "timeout",
    "run_in_background",
    "offset",
    "limit",
    "head_limit",
    "output_mode",
    "show_line_numbers",
];

const BUILTIN_PROJECTIONS: &[(&str, &[&str])] = &[
    ("Read", &["file_path"]),
    ("Write", &["file_path"]),
    ("Edit", &["file_path", "old_string", "new_string"]),
    ("MultiEdit", &["file_path"]),
    ("NotebookEdit", &["notebook_path"]),
    ("Grep", &["pattern", "path"]),
    ("Glob", &["pattern", "path"]),
    ("Bash", &["command"]),
    ("WebFetch", &["url"]),
    ("WebSearch", &["query"]),
];

/// Builds signatures using per-tool parameter projections
#[derive(Debug, Clone)]
pub struct SignatureBuilder {
    projections: HashMap<String, Vec<String>>,
}

impl Default for SignatureBuilder {
    fn default() -> Self {
        let projections = BUILTIN_PROJECTIONS
            .iter()
            .map(|(tool, keys)| {
                (
                    tool.to_string(),
                    keys.iter().map(|k| k.to_string()).collect(),
                )
            })
            .collect();
        Self { projections }
    }
}

impl SignatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only `keys` in signatures for `tool`
    pub fn with_projection(mut self, tool: impl Into<String>, keys: &[&str]) -> Self {
        self.projections
            .insert(tool.into(), keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Projected parameters, sorted by key
    pub fn project(&self, descriptor: &ToolInvocationDescriptor) -> BTreeMap<String, String> {
        let keep = |key: &str| match self.projections.get(&descriptor.tool_name) {
            Some(keys) => keys.iter().any(|k| k == key),
            None => !DISPLAY_FLAGS.contains(&key),
        };

        descriptor
            .parameters
            .iter()
            .filter(|(key, value)| keep(key) && !value.is_null())
            .map(|(key, value)| {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Canonical signature for an invocation
    pub fn signature(&self, descriptor: &ToolInvocationDescriptor) -> String {
        let projected = self.project(descriptor);
        if projected.is_empty() {
            return descriptor.tool_name.clone();
        }
        let args: Vec<String> = projected
            .into_iter()
            .map(|(key, value)| format!("{}:{}", key, value))
            .collect();
        format!("{}({})", descriptor.tool_name, args.join(", "))
    }
}
