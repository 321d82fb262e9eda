//! Root configuration and loading

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{BackgroundConfig, ExecutorConfig, LoggingConfig, LoopConfig};
use crate::error::{OrcaError, OrcaResult};
use crate::tools::permission::PermissionRulesConfig;

/// Environment variable overriding `executor.max_concurrency`
pub const ENV_MAX_CONCURRENCY: &str = "ORCA_MAX_CONCURRENCY";
/// Environment variable overriding `agent_loop.max_turns`
pub const ENV_MAX_TURNS: &str = "ORCA_MAX_TURNS";
/// Environment variable overriding `logging.level`
pub const ENV_LOG_LEVEL: &str = "ORCA_LOG_LEVEL";

/// Root configuration for the orchestration core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrcaConfig {
    pub executor: ExecutorConfig,
    pub agent_loop: LoopConfig,
    pub background: BackgroundConfig,
    pub permissions: PermissionRulesConfig,
    pub logging: LoggingConfig,
}

impl OrcaConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> OrcaResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file and apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> OrcaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrcaError::io_with_path(
                format!("Failed to read config file: {}", e),
                path.display().to_string(),
            )
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`)
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> OrcaResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_CONCURRENCY) {
            self.executor.max_concurrency = value.trim().parse().map_err(|_| {
                OrcaError::config(format!("{} must be a positive integer", ENV_MAX_CONCURRENCY))
            })?;
        }
        if let Some(value) = lookup(ENV_MAX_TURNS) {
            self.agent_loop.max_turns = value.trim().parse().map_err(|_| {
                OrcaError::config(format!("{} must be an integer", ENV_MAX_TURNS))
            })?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }
        self.validate()
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> OrcaResult<()> {
        if self.executor.max_concurrency == 0 {
            return Err(OrcaError::config("executor.max_concurrency must be at least 1"));
        }
        if self.executor.history_capacity == 0 {
            return Err(OrcaError::config("executor.history_capacity must be at least 1"));
        }
        if self.agent_loop.max_turns < -1 {
            return Err(OrcaError::config("agent_loop.max_turns must be -1, 0 or positive"));
        }
        let fraction = self.agent_loop.compaction.threshold_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(OrcaError::config(
                "agent_loop.compaction.threshold_fraction must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = OrcaConfig::from_toml_str("").unwrap();
        assert_eq!(config.executor.max_concurrency, 8);
        assert_eq!(config.agent_loop.max_turns, -1);
        assert!(config.permissions.allow.is_empty());
    }

    #[test]
    fn test_full_toml() {
        let content = r#"
            [executor]
            max_concurrency = 4
            default_timeout = "30s"
            confirmation_risk_threshold = "critical"

            [agent_loop]
            max_turns = 25

            [agent_loop.loop_detection]
            tool_repeat_threshold = 3

            [background]
            orphan_grace_period = "2m"

            [permissions]
            allow = ["Read", "Grep"]
            deny = ["Read(file_path:*.env)"]

            [logging]
            level = "debug"
            format = "json"
        "#;
        let config = OrcaConfig::from_toml_str(content).unwrap();
        assert_eq!(config.executor.max_concurrency, 4);
        assert_eq!(config.executor.default_timeout, Duration::from_secs(30));
        assert_eq!(config.agent_loop.max_turns, 25);
        assert_eq!(config.agent_loop.loop_detection.tool_repeat_threshold, 3);
        assert_eq!(config.background.orphan_grace_period, Duration::from_secs(120));
        assert_eq!(config.permissions.deny, vec!["Read(file_path:*.env)".to_string()]);
        assert_eq!(config.logging.format, super::super::LogFormat::Json);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_MAX_CONCURRENCY, "3"), (ENV_MAX_TURNS, "0")]
            .into_iter()
            .collect();
        let mut config = OrcaConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.executor.max_concurrency, 3);
        assert_eq!(config.agent_loop.max_turns, 0);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = OrcaConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == ENV_MAX_CONCURRENCY).then(|| "many".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        assert!(OrcaConfig::from_toml_str("[executor]\nmax_concurrency = 0").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("orca.toml");
        std::fs::write(&path, "[agent_loop]\nmax_turns = 7\n").unwrap();
        let config = OrcaConfig::from_file(&path).unwrap();
        // ORCA_MAX_TURNS may be set in the environment running the tests
        if std::env::var(ENV_MAX_TURNS).is_err() {
            assert_eq!(config.agent_loop.max_turns, 7);
        }
    }
}
