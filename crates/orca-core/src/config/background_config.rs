//! Background task manager configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for background agents and shells
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Persisted "running" sessions older than this with no live task are marked failed
    #[serde(with = "humantime_serde")]
    pub orphan_grace_period: Duration,
    /// Unread output chunks kept per background shell
    pub shell_buffer_capacity: usize,
    /// Directory for the JSON session store (None = ~/.config/orca/sessions)
    pub session_dir: Option<PathBuf>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            orphan_grace_period: Duration::from_secs(600),
            shell_buffer_capacity: 1000,
            session_dir: None,
        }
    }
}

impl BackgroundConfig {
    /// Resolve the session directory, falling back to the user config dir
    pub fn resolved_session_dir(&self) -> Option<PathBuf> {
        self.session_dir.clone().or_else(|| {
            dirs::home_dir().map(|home| home.join(".config").join("orca").join("sessions"))
        })
    }
}
