//! Configuration management for Orca
//!
//! All sections are optional in the TOML file; anything left out falls back to
//! the defaults below. Environment overrides are applied after file loading.

mod background_config;
#[allow(clippy::module_inception)] // config module in config directory is intentional
mod config;
mod executor_config;
mod logging_config;
mod loop_config;

pub use background_config::BackgroundConfig;
pub use config::{ENV_LOG_LEVEL, ENV_MAX_CONCURRENCY, ENV_MAX_TURNS, OrcaConfig};
pub use executor_config::ExecutorConfig;
pub use logging_config::{LogFormat, LoggingConfig};
pub use loop_config::{CompactionConfig, LoopConfig, LoopDetectionConfig};
