//! HTTP agent configuration

use railbench_config::domains::http::HttpConfig as ConfigHttpConfig;
use std::time::Duration;

/// Settings applied to every client built by an [`crate::Agent`]
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Per-request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: "railbench/1.0".to_string(),
        }
    }
}

impl From<&ConfigHttpConfig> for AgentConfig {
    fn from(config: &ConfigHttpConfig) -> Self {
        Self {
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
        }
    }
}
