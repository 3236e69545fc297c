//! HTTP agent configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive_duration, validate_required_string, Validatable};
use std::time::Duration;

/// HTTP agent configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout for every agent
    pub timeout: Duration,

    /// Latency budget for the admin stats and sales reads
    pub admin_timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            admin_timeout: Duration::from_secs(2),
            user_agent: format!("railbench/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive_duration(self.timeout, "timeout", self.domain_name())?;
        validate_positive_duration(self.admin_timeout, "admin_timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;

        if self.admin_timeout > self.timeout {
            return Err(self.validation_error("admin_timeout cannot exceed timeout"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}
