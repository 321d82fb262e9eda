//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{OrcaError, OrcaResult};

/// Install the global tracing subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// returns an error instead of panicking.
pub fn init_tracing(config: &LoggingConfig) -> OrcaResult<()> {
    if !config.log_to_console {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| OrcaError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| OrcaError::config(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_console_is_noop() {
        let config = LoggingConfig {
            log_to_console: false,
            ..Default::default()
        };
        assert!(init_tracing(&config).is_ok());
    }

    #[test]
    fn test_second_init_errors() {
        let config = LoggingConfig {
            format: LogFormat::Compact,
            ..Default::default()
        };
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        // Another test binary thread may have installed a subscriber first
        assert!(first.is_err() || second.is_err());
    }
}
