//! Configuration loading and environment variable handling

use crate::domains::logging::{LogLevel, LogSink};
use crate::domains::BenchConfig;
use crate::error::{ConfigError, ConfigResult};
use std::str::FromStr;

/// Environment variable selecting the log sink
pub const LOGGER_TYPE: &str = "LOGGER_TYPE";
/// Environment variable naming the DynamoDB log table
pub const DYNAMODB_TABLE: &str = "DYNAMODB_TABLE";
/// Environment variable with the scoreboard API gateway URL
pub const SCOREBOARD_URL: &str = "BENCH_SCOREBOARD_APIGW_URL";
/// Environment variable with the team name
pub const TEAM_NAME: &str = "BENCH_TEAM_NAME";

/// Builds a [`BenchConfig`] from defaults, the environment and the CLI pair
#[derive(Debug, Default)]
pub struct ConfigLoader {
    target: Option<String>,
    log_level: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the `--target` / `--log-level` flags
    pub fn with_cli(mut self, target: impl Into<String>, log_level: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self.log_level = Some(log_level.into());
        self
    }

    /// Load configuration from the environment, then apply CLI values
    pub fn load(&self) -> ConfigResult<BenchConfig> {
        let mut config = self.from_env()?;

        if let Some(target) = &self.target {
            config.target.base_url = target.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = LogLevel::from_str(level)
                .map_err(|_| ConfigError::ValidationError(format!("Invalid --log-level: {}", level)))?;
        }

        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<BenchConfig> {
        let mut config = BenchConfig::default();

        config.logging.dynamodb_table = get_env_var(DYNAMODB_TABLE);
        if let Some(sink) = get_env_var(LOGGER_TYPE) {
            match LogSink::from_str(&sink) {
                Ok(LogSink::Dynamodb) if config.logging.dynamodb_table.is_none() => {
                    config.logging.sink_fallback =
                        Some(format!("{}=dynamodb requires {}", LOGGER_TYPE, DYNAMODB_TABLE));
                }
                Ok(parsed) => config.logging.sink = parsed,
                Err(reason) => config.logging.sink_fallback = Some(reason),
            }
        }
        config.scoreboard.api_url = get_env_var(SCOREBOARD_URL);
        config.scoreboard.team_name = get_env_var(TEAM_NAME);

        Ok(config)
    }
}

/// Unset and empty variables are treated alike
fn get_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
