//! Permission rule parsing and matching

use std::fmt;

use super::glob::{GlobMatcher, has_glob_chars};
use super::types::{MatchType, PATH_KEYS, ToolInvocationDescriptor};
use crate::error::{OrcaError, OrcaResult};

/// Split on commas that are not nested inside `()`, `{}` or `[]`
pub fn split_top_level(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for c in input.chars() {
        match c {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A parsed permission rule
///
/// `Tool` names a tool, `Tool(*)` any invocation of it, and
/// `Tool(key:pattern, ...)` constrains individual parameters. Entries without
/// a recognised `key:` prefix match if any parameter value matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
    raw: String,
    tool_pattern: String,
    params: Option<Vec<String>>,
}

impl PermissionRule {
    /// Parse a rule string
    pub fn parse(raw: &str) -> OrcaResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(OrcaError::config("Empty permission rule"));
        }

        let (tool_pattern, params) = match raw.find('(') {
            Some(open) => {
                if !raw.ends_with(')') {
                    return Err(OrcaError::config(format!(
                        "Permission rule '{}' is missing a closing ')'",
                        raw
                    )));
                }
                let inner = &raw[open + 1..raw.len() - 1];
                let balance = inner.chars().try_fold(0i32, |depth, c| {
                    let depth = match c {
                        '(' => depth + 1,
                        ')' => depth - 1,
                        _ => depth,
                    };
                    (depth >= 0).then_some(depth)
                });
                if balance != Some(0) {
                    return Err(OrcaError::config(format!(
                        "Permission rule '{}' has unbalanced parentheses",
                        raw
                    )));
                }
                (raw[..open].trim().to_string(), Some(split_top_level(inner)))
            }
            None => (raw.to_string(), None),
        };

        if tool_pattern.is_empty() {
            return Err(OrcaError::config(format!(
                "Permission rule '{}' has no tool name",
                raw
            )));
        }

        Ok(Self {
            raw: raw.to_string(),
            tool_pattern,
            params,
        })
    }

    /// The rule as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check the rule against an invocation for one match type
    pub fn matches(
        &self,
        kind: MatchType,
        descriptor: &ToolInvocationDescriptor,
        signature: &str,
        globs: &GlobMatcher,
    ) -> bool {
        match kind {
            MatchType::Exact => self.raw == signature,
            MatchType::Prefix => {
                self.params.is_none()
                    && !has_glob_chars(&self.tool_pattern)
                    && self.tool_pattern == descriptor.tool_name
            }
            MatchType::Wildcard => {
                let any_args = self
                    .params
                    .as_ref()
                    .is_none_or(|p| p.len() == 1 && p[0] == "*");
                let tool_ok =
                    self.tool_pattern == "*" || self.tool_pattern == descriptor.tool_name;
                any_args && tool_ok && (self.tool_pattern == "*" || self.params.is_some())
            }
            MatchType::Glob => {
                if !globs.matches(&self.tool_pattern, &descriptor.tool_name, false) {
                    return false;
                }
                match &self.params {
                    None => has_glob_chars(&self.tool_pattern),
                    Some(entries) => {
                        !entries.is_empty()
                            && entries
                                .iter()
                                .all(|entry| self.entry_matches(entry, descriptor, globs))
                    }
                }
            }
        }
    }

    fn entry_matches(
        &self,
        entry: &str,
        descriptor: &ToolInvocationDescriptor,
        globs: &GlobMatcher,
    ) -> bool {
        if let Some((key, pattern)) = entry.split_once(':') {
            let key = key.trim();
            let pattern = pattern.trim();
            let path_key = PATH_KEYS.contains(&key);
            if is_identifier(key) {
                if let Some(value) = descriptor.parameters.get(key) {
                    return value_matches(&render_value(value), pattern, path_key, globs);
                }
                if path_key && !descriptor.affected_paths.is_empty() {
                    return descriptor
                        .affected_paths
                        .iter()
                        .any(|p| globs.matches_path(pattern, p));
                }
            }
        }

        let mut keys: Vec<&String> = descriptor.parameters.keys().collect();
        keys.sort();
        keys.into_iter().any(|key| {
            let value = render_value(&descriptor.parameters[key]);
            value_matches(&value, entry, PATH_KEYS.contains(&key.as_str()), globs)
        }) || descriptor
            .affected_paths
            .iter()
            .any(|p| globs.matches_path(entry, p))
    }
}

fn value_matches(value: &str, pattern: &str, path_key: bool, globs: &GlobMatcher) -> bool {
    if path_key {
        globs.matches_path(pattern, value)
    } else {
        globs.matches(pattern, value, false)
    }
}

impl fmt::Display for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
