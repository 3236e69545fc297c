//! Scoreboard upload configuration

use crate::error::ConfigResult;
use crate::validation::{validate_url, Validatable};
use serde::{Deserialize, Serialize};

/// Where the final score is published, if anywhere
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreboardConfig {
    /// API gateway base URL; `teams` is appended to it
    pub api_url: Option<String>,

    /// Team name reported with the score
    pub team_name: Option<String>,
}

impl ScoreboardConfig {
    /// The upload is attempted unless both settings are absent
    pub fn is_enabled(&self) -> bool {
        self.api_url.is_some() || self.team_name.is_some()
    }
}

impl Validatable for ScoreboardConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.api_url {
            validate_url(url, "api_url", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "scoreboard"
    }
}
