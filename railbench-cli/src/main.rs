use anyhow::{Context, Result};
use clap::Parser;
use railbench_config::ConfigLoader;
use railbench_core::RunOutcome;
use railbench_logging::init_logging;
use std::process::ExitCode;
use tracing::error;

mod cli;
use cli::Cli;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .with_cli(cli.target, cli.log_level)
        .load()
        .context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.run.worker_threads)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let outcome = runtime.block_on(railbench_core::run(&config))?;
    match outcome {
        RunOutcome::Completed(_) => Ok(ExitCode::SUCCESS),
        RunOutcome::InitializationFailed { status, message } => {
            error!(status_code = ?status, message = %message, "Benchmark aborted: initialize failed");
            Ok(ExitCode::FAILURE)
        }
    }
}
