//! Simulated buyers and the admin auditor
//!
//! A [`Scenario`] is the shared state of one run. Workers call
//! [`Scenario::run_user`] in a loop; the driver runs [`Scenario::run_admin`]
//! once. Entry and refund tasks are spawned onto [`Scenario::pending`] so the
//! driver can give them a grace period after the load window closes.

mod admin;
mod buy;
mod entry;
mod user;

pub use admin::check_bracket;
pub use buy::{decide_num_people, find_earliest_schedule, people_for_roll};

use crate::api::{self, LoginRequest, StatusResponse};
use crate::clock::AppClock;
use crate::counters::Progress;
use crate::critical::CriticalSignal;
use crate::data::{TrainCatalog, User, UserTable};
use crate::errors::ScenarioError;
use crate::ledger::ReservationLedger;
use crate::phases::PhaseGates;
use railbench_config::{BenchConfig, RunConfig};
use railbench_http::{Agent, AgentConfig, HttpError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// How often the background poller refreshes `/api/schedules`
const SCHEDULE_POLL_INTERVAL: Duration = Duration::from_secs(1);

struct Shared {
    target: String,
    agent_config: AgentConfig,
    admin_timeout: Duration,
    run: RunConfig,
    clock: AppClock,
    users: UserTable,
    catalog: TrainCatalog,
    progress: Progress,
    ledger: ReservationLedger,
    gates: Arc<PhaseGates>,
    critical: CriticalSignal,
    cancel: CancellationToken,
    pending: TaskTracker,
}

/// Shared state of one benchmark run. Cheap to clone.
#[derive(Clone)]
pub struct Scenario {
    shared: Arc<Shared>,
}

impl Scenario {
    pub fn new(
        config: &BenchConfig,
        clock: AppClock,
        users: UserTable,
        catalog: TrainCatalog,
        critical: CriticalSignal,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                target: config.target.base_url.clone(),
                agent_config: AgentConfig::from(&config.http),
                admin_timeout: config.http.admin_timeout,
                run: config.run.clone(),
                clock,
                users,
                catalog,
                progress: Progress::new(),
                ledger: ReservationLedger::new(),
                gates: Arc::new(PhaseGates::new()),
                critical,
                cancel: CancellationToken::new(),
                pending: TaskTracker::new(),
            }),
        }
    }

    pub fn clock(&self) -> &AppClock {
        &self.shared.clock
    }

    pub fn progress(&self) -> &Progress {
        &self.shared.progress
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.shared.ledger
    }

    pub fn gates(&self) -> &Arc<PhaseGates> {
        &self.shared.gates
    }

    /// Cancelled when the load window closes or a critical error stops the run
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    /// Entry and refund tasks still in flight
    pub fn pending(&self) -> &TaskTracker {
        &self.shared.pending
    }

    fn run_config(&self) -> &RunConfig {
        &self.shared.run
    }

    /// A fresh agent with its own cookie jar
    fn agent(&self, cancel: CancellationToken) -> Result<Agent, HttpError> {
        Ok(Agent::new(&self.shared.target, &self.shared.agent_config)?.with_cancel(cancel))
    }

    async fn login(&self, agent: &Agent, user: &User) {
        debug!(user = %user.name, "POST /api/login");
        let body = LoginRequest {
            name: &user.name,
            password: &user.password,
        };
        match agent.post_json(api::LOGIN, &body).await {
            Ok(response) if response.status == 200 => {
                info!(user = %user.name, status_code = response.status, "POST /api/login");
            }
            Ok(response) => {
                error!(user = %user.name, status_code = response.status, "Login rejected");
            }
            Err(e) => log_http_error(&user.name, api::LOGIN, &e),
        }
    }

    async fn poll_status(&self, agent: &Agent, path: &str) -> Result<StatusResponse, HttpError> {
        agent.get(path).await?.json()
    }

    /// Poll the waiting room until the target lets the user in. Unknown
    /// statuses and failed polls end the wait; callers carry on regardless.
    async fn wait_in_waiting_room(&self, agent: &Agent, user: &User) -> Result<(), ScenarioError> {
        loop {
            let status = self.poll_status(agent, api::WAITING_STATUS).await?;
            info!(
                user = %user.name,
                status = %status.status,
                next_check = status.next_check,
                "GET /api/waiting_status"
            );

            match status.status.as_str() {
                "ready" => return Ok(()),
                "waiting" => {
                    if !pause(agent.cancel_token(), Duration::from_millis(status.next_check)).await {
                        return Ok(());
                    }
                }
                other => {
                    warn!(user = %user.name, status = other, "Unknown waiting status, stopping requests");
                    return Ok(());
                }
            }
        }
    }

    /// Keep the session alive until the target expires it
    async fn watch_session(&self, agent: &Agent, user: &User) {
        loop {
            let status = match self.poll_status(agent, api::SESSION).await {
                Ok(status) => status,
                Err(e) => {
                    log_http_error(&user.name, api::SESSION, &e);
                    return;
                }
            };
            info!(
                user = %user.name,
                status = %status.status,
                next_check = status.next_check,
                "GET /api/session"
            );

            match status.status.as_str() {
                "active" => {
                    if !pause(agent.cancel_token(), Duration::from_millis(status.next_check)).await {
                        return;
                    }
                }
                "session_expired" => {
                    info!(user = %user.name, "Session expired, stopping requests");
                    return;
                }
                other => {
                    info!(user = %user.name, status = other, "Unknown session status, stopping requests");
                    return;
                }
            }
        }
    }

    /// Background `/api/schedules` reader, runs until the agent's scope ends
    fn spawn_schedule_poller(&self, agent: Agent, user: String) {
        tokio::spawn(async move {
            while !agent.cancel_token().is_cancelled() {
                match agent.get(api::SCHEDULES).await {
                    Ok(response) => {
                        debug!(user = %user, status_code = response.status, "GET /api/schedules");
                    }
                    Err(e) => log_http_error(&user, api::SCHEDULES, &e),
                }
                if !pause(agent.cancel_token(), SCHEDULE_POLL_INTERVAL).await {
                    break;
                }
            }
        });
    }
}

/// Sleep unless `cancel` fires first. True when the full pause elapsed.
pub(crate) async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Requests abandoned by a cancelled scope are expected and only traced
pub(crate) fn log_http_error(user: &str, path: &str, err: &HttpError) {
    if err.is_cancelled() {
        debug!(user = %user, path = %path, "Request cancelled");
    } else {
        error!(user = %user, path = %path, error = %err, "Request failed");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Scenario;
    use crate::clock::AppClock;
    use crate::critical::{critical_channel, CriticalError};
    use crate::data::{TrainCatalog, UserTable};
    use chrono::Utc;
    use railbench_config::BenchConfig;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Scenario against `target` with run timings shrunk for tests
    pub(crate) fn scenario_for(target: &str) -> (Scenario, mpsc::Receiver<CriticalError>) {
        scenario_with(target, |_| {})
    }

    /// [`scenario_for`] with further adjustments to the config
    pub(crate) fn scenario_with(
        target: &str,
        adjust: impl FnOnce(&mut BenchConfig),
    ) -> (Scenario, mpsc::Receiver<CriticalError>) {
        let mut config = BenchConfig::default();
        config.target.base_url = target.to_string();
        config.http.timeout = Duration::from_secs(2);
        config.http.admin_timeout = Duration::from_millis(500);
        config.run.refund_timeout = Duration::from_secs(5);
        config.run.admin_catch_up = Duration::from_millis(10);
        config.run.admin_settle = Duration::from_millis(10);
        adjust(&mut config);

        let (signal, receiver) = critical_channel();
        let scenario = Scenario::new(
            &config,
            AppClock::new(Utc::now()),
            UserTable::embedded().unwrap(),
            TrainCatalog::embedded().unwrap(),
            signal,
        );
        (scenario, receiver)
    }
}
