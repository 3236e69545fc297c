//! Domain-specific configuration modules

pub mod http;
pub mod logging;
pub mod run;
pub mod scoreboard;
pub mod target;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Complete driver configuration
#[derive(Debug, Clone, Default)]
pub struct BenchConfig {
    /// Service under test
    pub target: target::TargetConfig,

    /// HTTP agent configuration
    pub http: http::HttpConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,

    /// Run timings
    pub run: run::RunConfig,

    /// Optional score upload
    pub scoreboard: scoreboard::ScoreboardConfig,
}

impl BenchConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.http.validate()?;
        self.logging.validate()?;
        self.run.validate()?;
        self.scoreboard.validate()?;
        Ok(())
    }
}
