use crate::timer::JstTimer;
use anyhow::Result;
use railbench_config::{LogSink, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize logging from configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    init_simple_tracing(config.level.as_str())?;

    if let Some(reason) = &config.sink_fallback {
        tracing::warn!(reason = %reason, "Requested log sink not usable, using console logger");
    }
    if config.sink == LogSink::Dynamodb {
        // The remote table writer is not part of this build; records stay on stderr.
        tracing::warn!(
            table = config.dynamodb_table.as_deref().unwrap_or_default(),
            "DynamoDB log sink unavailable, using console logger"
        );
    }

    Ok(())
}

/// Initialize simple tracing for console output on stderr
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_timer(JstTimer)
        .with_line_number(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_init_with_sink_fallback() {
        let config = LoggingConfig {
            sink_fallback: Some("unsupported LOGGER_TYPE: json".to_string()),
            ..Default::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
