//! Run timings
//!
//! None of these are exposed on the command line or through the environment.

use crate::error::ConfigResult;
use crate::validation::{validate_positive_duration, Validatable};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Length of the load window
    pub duration: Duration,

    /// How long the tally waits for in-flight refunds
    pub refund_grace: Duration,

    /// Lifetime of a single refund task, independent of the load window
    pub refund_timeout: Duration,

    /// Delay before the first admin check
    pub admin_start_delay: Duration,

    /// Period of the admin check
    pub admin_interval: Duration,

    /// Pause between the low snapshot and the admin reads
    pub admin_catch_up: Duration,

    /// Pause between the admin reads and the high snapshot
    pub admin_settle: Duration,

    /// OS threads backing the runtime
    pub worker_threads: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            refund_grace: Duration::from_secs(10),
            refund_timeout: Duration::from_secs(30),
            admin_start_delay: Duration::from_secs(4),
            admin_interval: Duration::from_secs(4),
            admin_catch_up: Duration::from_secs(1),
            admin_settle: Duration::from_millis(200),
            worker_threads: 4,
        }
    }
}

impl Validatable for RunConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive_duration(self.duration, "duration", self.domain_name())?;
        validate_positive_duration(self.admin_interval, "admin_interval", self.domain_name())?;
        validate_positive_duration(self.refund_timeout, "refund_timeout", self.domain_name())?;

        if self.worker_threads == 0 {
            return Err(self.validation_error("worker_threads must be greater than 0"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "run"
    }
}
