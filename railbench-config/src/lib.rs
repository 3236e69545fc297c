//! Configuration for the railbench load driver
//!
//! The driver is configured by two CLI flags (`--target`, `--log-level`) and a
//! handful of environment variables. Everything else is a process constant
//! kept in [`RunConfig`] so tests can shrink the timings.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    http::HttpConfig,
    logging::{LogLevel, LogSink, LoggingConfig},
    run::RunConfig,
    scoreboard::ScoreboardConfig,
    target::TargetConfig,
    BenchConfig,
};
