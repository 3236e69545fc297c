//! Run entry point: initialise the target, drive the load window, tally

use crate::api::{self, InitializeResponse};
use crate::clock::AppClock;
use crate::critical::critical_channel;
use crate::data::{TrainCatalog, UserTable};
use crate::phases::PhaseFamily;
use crate::pool::WorkerPool;
use crate::report::{compute_score, FinalReport};
use crate::scenario::Scenario;
use crate::scoreboard;
use anyhow::{Context, Result};
use chrono::Utc;
use railbench_config::BenchConfig;
use railbench_http::{Agent, AgentConfig};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The load window ran (possibly cut short by a critical error)
    Completed(FinalReport),
    /// `/api/initialize` failed, nothing was run
    InitializationFailed {
        status: Option<u16>,
        message: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

struct Initialized {
    clock: AppClock,
    app_language: String,
}

async fn initialize(config: &BenchConfig) -> Result<std::result::Result<Initialized, RunOutcome>> {
    let agent = Agent::new(&config.target.base_url, &AgentConfig::from(&config.http))
        .context("failed to create initialize agent")?;

    let response = match agent.post_empty(api::INITIALIZE).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Failed to post /api/initialize");
            return Ok(Err(RunOutcome::InitializationFailed {
                status: None,
                message: e.to_string(),
            }));
        }
    };

    if response.status != 200 {
        let body = String::from_utf8_lossy(&response.body).into_owned();
        error!(status_code = response.status, body = %body, "initialize returned non-200 status");
        return Ok(Err(RunOutcome::InitializationFailed {
            status: Some(response.status),
            message: body,
        }));
    }

    let initialized = match response.json::<InitializeResponse>() {
        Ok(reply) => Initialized {
            clock: AppClock::new(reply.initialized_at),
            app_language: reply.app_language,
        },
        Err(e) => {
            warn!(error = %e, "Unreadable initialize response, anchoring the app clock to now");
            Initialized {
                clock: AppClock::new(Utc::now()),
                app_language: String::new(),
            }
        }
    };
    Ok(Ok(initialized))
}

/// Run one benchmark against `config.target`
pub async fn run(config: &BenchConfig) -> Result<RunOutcome> {
    let users = UserTable::embedded().context("failed to load users")?;
    let catalog = TrainCatalog::embedded().context("failed to load train configs")?;

    let Initialized { clock, app_language } = match initialize(config).await? {
        Ok(initialized) => initialized,
        Err(outcome) => return Ok(outcome),
    };

    let (critical, mut critical_rx) = critical_channel();
    let scenario = Scenario::new(config, clock, users, catalog, critical);
    let cancel = scenario.cancel_token().clone();
    info!(current_time = %clock.now(), "Benchmark Start!");

    let deadline = {
        let cancel = cancel.clone();
        let duration = config.run.duration;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => cancel.cancel(),
                _ = cancel.cancelled() => {}
            }
        })
    };

    let pool = {
        let scenario = scenario.clone();
        WorkerPool::spawn(Arc::clone(scenario.gates()), cancel.clone(), move |worker| {
            let scenario = scenario.clone();
            async move { scenario.run_user(worker).await }
        })
    };
    info!(workers = pool.size(), "Workers ready");

    for family in PhaseFamily::ALL {
        scenario.gates().release_through(family, 0);
    }

    let admin = {
        let scenario = scenario.clone();
        tokio::spawn(async move { scenario.run_admin().await })
    };

    let mut critical_error = None;
    let drain = pool.drain();
    tokio::pin!(drain);
    tokio::select! {
        _ = &mut drain => {}
        Some(err) = critical_rx.recv() => {
            error!(error = %err, "Critical error occurred, stopping benchmark");
            critical_error = Some(err.to_string());
            cancel.cancel();
            drain.await;
        }
    }
    cancel.cancel();
    deadline.abort();
    if let Err(e) = admin.await {
        if e.is_panic() {
            error!("Admin scenario panicked: {}", e);
        }
    }

    let current_time = scenario.clock().now();
    println!(
        "\nMain phase finished. Waiting for pending refunds to complete... (current_time: {})",
        current_time
    );

    let pending = scenario.pending();
    pending.close();
    let grace = config.run.refund_grace;
    if tokio::time::timeout(grace, pending.wait()).await.is_err() {
        warn!(remaining = pending.len(), "Pending refunds did not settle within {:?}", grace);
    }

    if let Ok(err) = critical_rx.try_recv() {
        error!(error = %err, "Critical error occurred while settling refunds");
        critical_error.get_or_insert_with(|| err.to_string());
    }

    let progress = scenario.progress().snapshot();
    let mut score = compute_score(progress.sales, progress.purchased, progress.refunds);

    let booked_sections = match scenario.ledger().verify() {
        Ok(count) => count,
        Err(double_booking) => {
            error!(section_key = %double_booking.key(), "Double booking validation failed!");
            score = 0;
            critical_error.get_or_insert_with(|| double_booking.to_string());
            0
        }
    };

    let report = FinalReport {
        score,
        progress,
        current_time,
        critical_error,
        booked_sections,
    };
    println!("{}", report);

    scoreboard::report_score(&config.scoreboard, score, &app_language).await;
    Ok(RunOutcome::Completed(report))
}
