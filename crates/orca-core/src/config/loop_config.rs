//! Agentic loop configuration

use serde::{Deserialize, Serialize};

/// Configuration for the agentic loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Turn budget: -1 unlimited, 0 disables tool calling, N caps turns
    pub max_turns: i32,
    /// Repetition detection thresholds
    pub loop_detection: LoopDetectionConfig,
    /// Auto-compaction settings
    pub compaction: CompactionConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: -1,
            loop_detection: LoopDetectionConfig::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

/// Thresholds for loop detection.
///
/// These are tuning knobs, not a correctness contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopDetectionConfig {
    /// Whether loop detection runs at all
    pub enabled: bool,
    /// Identical tool-call signatures allowed inside the window before tripping
    pub tool_repeat_threshold: usize,
    /// Near-identical assistant messages allowed inside the window before tripping
    pub content_repeat_threshold: usize,
    /// Number of recent entries kept in the rolling window
    pub window_size: usize,
    /// Run the model-assisted check every N turns (0 disables it)
    pub model_check_interval: u32,
}

impl Default for LoopDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tool_repeat_threshold: 5,
            content_repeat_threshold: 3,
            window_size: 20,
            model_check_interval: 0,
        }
    }
}

/// Auto-compaction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Whether the loop compacts automatically
    pub enabled: bool,
    /// Model context budget in tokens
    pub context_budget_tokens: usize,
    /// Fraction of the budget at which compaction triggers
    pub threshold_fraction: f32,
    /// Messages kept by the naive truncation fallback
    pub truncation_keep_recent: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_budget_tokens: 128_000,
            threshold_fraction: 0.8,
            truncation_keep_recent: 20,
        }
    }
}

impl CompactionConfig {
    /// Token count above which compaction triggers
    pub fn trigger_tokens(&self) -> usize {
        (self.context_budget_tokens as f64 * self.threshold_fraction as f64) as usize
    }
}
