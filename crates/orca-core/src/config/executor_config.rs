//! Tool execution pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::tools::permission::RiskLevel;

/// Configuration for the tool execution pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum number of tool executions in flight process-wide
    pub max_concurrency: usize,
    /// Per-call timeout used when a tool does not declare its own
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,
    /// Capacity of the execution history ring buffer
    pub history_capacity: usize,
    /// Tools at or above this risk level need a confirmation unless already approved
    pub confirmation_risk_threshold: RiskLevel,
    /// Tool output longer than this is truncated before reaching the model
    pub max_output_chars: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            default_timeout: Duration::from_secs(300),
            history_capacity: 200,
            confirmation_risk_threshold: RiskLevel::High,
            max_output_chars: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_config_default() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.default_timeout, Duration::from_secs(300));
        assert_eq!(config.confirmation_risk_threshold, RiskLevel::High);
    }

    #[test]
    fn test_executor_config_humantime() {
        let config: ExecutorConfig =
            toml::from_str("default_timeout = \"90s\"\nmax_concurrency = 2").unwrap();
        assert_eq!(config.default_timeout, Duration::from_secs(90));
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.history_capacity, 200);
    }
}
