//! Command line flags

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the reservation service under test
    #[arg(long, value_name = "URL", default_value = "http://localhost:8080")]
    pub target: String,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}
