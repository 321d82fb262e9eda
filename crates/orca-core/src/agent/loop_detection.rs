//! Repetition detection over a rolling window

use std::collections::{BTreeMap, VecDeque};

use crate::config::LoopDetectionConfig;
use crate::tools::types::ToolCall;

/// Assistant text shorter than this is not tracked; tool-only replies are often empty
const MIN_CONTENT_CHARS: usize = 10;
/// Content fingerprints use at most this many characters
const FINGERPRINT_CHARS: usize = 200;

/// What repeated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repetition {
    ToolCall { signature: String, count: usize },
    Content { count: usize },
}

/// Tracks recent tool-call signatures and assistant text
#[derive(Debug)]
pub struct LoopDetector {
    config: LoopDetectionConfig,
    tool_window: VecDeque<String>,
    content_window: VecDeque<String>,
}

impl LoopDetector {
    pub fn new(config: LoopDetectionConfig) -> Self {
        Self {
            config,
            tool_window: VecDeque::new(),
            content_window: VecDeque::new(),
        }
    }

    /// Record a tool call; trips once the same signature appears
    /// `tool_repeat_threshold` times inside the window
    pub fn record_tool_call(&mut self, call: &ToolCall) -> Option<Repetition> {
        if !self.config.enabled {
            return None;
        }
        let signature = call_signature(call);
        let count = push_and_count(
            &mut self.tool_window,
            signature.clone(),
            self.config.window_size,
        );
        (count >= self.config.tool_repeat_threshold.max(2))
            .then_some(Repetition::ToolCall { signature, count })
    }

    /// Record assistant text; near-identical text counts as a repeat
    pub fn record_content(&mut self, content: &str) -> Option<Repetition> {
        if !self.config.enabled {
            return None;
        }
        let fingerprint = fingerprint(content)?;
        let count = push_and_count(
            &mut self.content_window,
            fingerprint,
            self.config.window_size,
        );
        (count >= self.config.content_repeat_threshold.max(2))
            .then_some(Repetition::Content { count })
    }

    pub fn reset(&mut self) {
        self.tool_window.clear();
        self.content_window.clear();
    }
}

fn push_and_count(window: &mut VecDeque<String>, entry: String, size: usize) -> usize {
    while window.len() >= size.max(1) {
        window.pop_front();
    }
    window.push_back(entry);
    let last = window.back();
    window.iter().filter(|e| Some(*e) == last).count()
}

/// Tool name plus arguments with sorted keys
fn call_signature(call: &ToolCall) -> String {
    let args: BTreeMap<&String, &serde_json::Value> = call.arguments.iter().collect();
    format!(
        "{}:{}",
        call.name,
        serde_json::to_string(&args).unwrap_or_default()
    )
}

/// Lowercased, whitespace-collapsed prefix of the text
fn fingerprint(content: &str) -> Option<String> {
    let normalized: String = content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.chars().count() < MIN_CONTENT_CHARS {
        return None;
    }
    Some(normalized.chars().take(FINGERPRINT_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(tool: usize, content: usize, window: usize) -> LoopDetectionConfig {
        LoopDetectionConfig {
            enabled: true,
            tool_repeat_threshold: tool,
            content_repeat_threshold: content,
            window_size: window,
            model_check_interval: 0,
        }
    }

    fn read(path: &str) -> ToolCall {
        ToolCall::from_json("id", "Read", json!({"file_path": path}))
    }

    #[test]
    fn test_identical_tool_calls_trip() {
        let mut detector = LoopDetector::new(config(3, 3, 10));
        assert!(detector.record_tool_call(&read("a")).is_none());
        assert!(detector.record_tool_call(&read("b")).is_none());
        assert!(detector.record_tool_call(&read("a")).is_none());
        match detector.record_tool_call(&read("a")) {
            Some(Repetition::ToolCall { count, .. }) => assert_eq!(count, 3),
            other => panic!("expected repetition, got {:?}", other),
        }
    }

    #[test]
    fn test_window_forgets_old_calls() {
        let mut detector = LoopDetector::new(config(2, 3, 2));
        detector.record_tool_call(&read("a"));
        detector.record_tool_call(&read("b"));
        assert!(detector.record_tool_call(&read("a")).is_none());
    }

    #[test]
    fn test_near_identical_content() {
        let mut detector = LoopDetector::new(config(5, 2, 10));
        assert!(detector.record_content("Let me check the file again").is_none());
        assert!(
            detector
                .record_content("  let me   check the FILE again ")
                .is_some()
        );
    }

    #[test]
    fn test_short_content_ignored() {
        let mut detector = LoopDetector::new(config(5, 2, 10));
        assert!(detector.record_content("ok").is_none());
        assert!(detector.record_content("ok").is_none());
    }

    #[test]
    fn test_disabled() {
        let mut detector = LoopDetector::new(LoopDetectionConfig {
            enabled: false,
            ..config(2, 2, 10)
        });
        detector.record_tool_call(&read("a"));
        assert!(detector.record_tool_call(&read("a")).is_none());
    }
}
