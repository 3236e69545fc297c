use super::{pause, Scenario};
use crate::api::{
    self, AddTrainRequest, AddTrainResponse, AdminStatsResponse, LoginRequest, TrainModelsResponse,
    TrainSalesResponse,
};
use crate::counters::ProgressSnapshot;
use crate::critical::{CriticalError, Staleness};
use crate::phases::PhaseFamily;
use railbench_http::{Agent, HttpError, HttpMethod};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

const ADMIN: &str = "admin";

/// Fail unless `min <= reported <= max`
pub fn check_bracket(metric: &'static str, reported: i64, min: i64, max: i64) -> Result<(), CriticalError> {
    let staleness = if reported < min {
        Staleness::TooOld
    } else if reported > max {
        Staleness::TooNew
    } else {
        return Ok(());
    };
    Err(CriticalError::Bracket {
        metric,
        staleness,
        reported,
        min,
        max,
    })
}

fn metric_for(snapshot: &ProgressSnapshot, family: PhaseFamily) -> i64 {
    match family {
        PhaseFamily::Tickets => snapshot.tickets,
        PhaseFamily::Sales => snapshot.sales,
    }
}

impl Scenario {
    /// Periodic admin audit. Stops at the end of the run or after raising
    /// the first critical error.
    pub async fn run_admin(&self) {
        let cancel = self.cancel_token().clone();
        let agent = match self.agent(cancel.clone()) {
            Ok(agent) => agent,
            Err(e) => {
                error!(user = ADMIN, error = %e, "Failed to create agent");
                return;
            }
        };

        let run = self.run_config();
        if !pause(&cancel, run.admin_start_delay).await {
            return;
        }
        info!(user = ADMIN, "Admin scenario started");

        // First audit one full period after the start delay
        let first = Instant::now() + run.admin_interval;
        let mut ticker = tokio::time::interval_at(first, run.admin_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.admin_iteration(&agent).await {
                if cancel.is_cancelled() {
                    debug!(user = ADMIN, error = %e, "Admin iteration interrupted by shutdown");
                    break;
                }
                self.shared.critical.raise(e);
                return;
            }
        }
        info!(user = ADMIN, "Admin scenario finished");
    }

    /// Fetch the target's own numbers between two snapshots of ours and
    /// advance the phase ladders on what we have observed.
    pub(crate) async fn admin_iteration(&self, agent: &Agent) -> Result<(), CriticalError> {
        let cancel = agent.cancel_token();
        let run = self.run_config();
        let limit = self.shared.admin_timeout;

        self.admin_login(agent).await.map_err(CriticalError::AdminLogin)?;
        info!(user = ADMIN, "POST /api/login");

        let models: TrainModelsResponse = fetch(agent, api::TRAIN_MODELS, None)
            .await
            .map_err(CriticalError::TrainModels)?;
        info!(user = ADMIN, models = models.model_names.len(), "GET /api/train_models");

        let min = self.progress().snapshot();
        if !pause(cancel, run.admin_catch_up).await {
            return Ok(());
        }

        let stats: AdminStatsResponse = fetch(agent, api::ADMIN_STATS, Some(limit))
            .await
            .map_err(CriticalError::AdminStats)?;
        info!(user = ADMIN, "GET /api/admin/stats");

        let train_sales: TrainSalesResponse = fetch(agent, api::ADMIN_TRAIN_SALES, Some(limit))
            .await
            .map_err(CriticalError::TrainSales)?;
        info!(user = ADMIN, "GET /api/admin/train_sales");

        if !pause(cancel, run.admin_settle).await {
            return Ok(());
        }
        let max = self.progress().snapshot();

        check_bracket("total_sales", stats.total_sales, min.sales, max.sales)?;
        check_bracket("total_refunds", stats.total_refunds, min.refunds, max.refunds)?;
        check_bracket("total_tickets", train_sales.tickets_sold(), min.tickets, max.tickets)?;
        info!(
            user = ADMIN,
            total_sales = stats.total_sales,
            total_refunds = stats.total_refunds,
            total_tickets = train_sales.tickets_sold(),
            "Stats validation passed"
        );

        self.advance_phases(agent, &max).await
    }

    async fn admin_login(&self, agent: &Agent) -> Result<(), HttpError> {
        let body = LoginRequest {
            name: ADMIN,
            password: ADMIN,
        };
        agent
            .post_json(api::LOGIN, &body)
            .await?
            .require_ok(HttpMethod::Post, api::LOGIN)?;
        Ok(())
    }

    /// Move each family up every phase whose threshold `observed` covers,
    /// registering that phase's trains before its buyers are released
    async fn advance_phases(&self, agent: &Agent, observed: &ProgressSnapshot) -> Result<(), CriticalError> {
        for family in PhaseFamily::ALL {
            let current = self.progress().phase(family) as usize;
            let value = metric_for(observed, family);
            let reachable = family.reachable_phase(current, value);
            if reachable == current {
                debug!(user = ADMIN, family = %family, phase = current, value, "Not enough progress for the next phase");
                continue;
            }

            for index in current..reachable {
                let phase = family.phases()[index];
                info!(
                    user = ADMIN,
                    family = %family,
                    phase = index + 1,
                    threshold = phase.threshold,
                    value,
                    new_trains = phase.train_count,
                    "Registering new trains"
                );
                self.register_trains(agent, family, index).await?;

                let next = index + 1;
                self.progress().store_phase(family, next as u32);
                for released in self.gates().release_through(family, next) {
                    info!(
                        user = ADMIN,
                        family = %family,
                        phase = %format!("{}/{}", released, family.phases().len()),
                        new_buyers = family.tranches()[released],
                        current_time = %self.clock().now(),
                        "New ad campaign launched!"
                    );
                }
            }
        }
        Ok(())
    }

    async fn register_trains(&self, agent: &Agent, family: PhaseFamily, index: usize) -> Result<(), CriticalError> {
        let fail = |message: String| CriticalError::TrainRegistration {
            family: family.as_str(),
            phase: index,
            message,
        };

        let count = family.phases()[index].train_count;
        let configs = self
            .shared
            .catalog
            .table(family)
            .slice(family.train_offset(index), count)
            .map_err(|e| fail(e.to_string()))?;

        for config in configs {
            let train_name = config.train_name(&mut rand::rng());
            let departure_times = config.departure_times().map_err(|e| fail(e.to_string()))?;
            let request = AddTrainRequest {
                train_name: &train_name,
                model_name: &config.model_name,
                departure_times: &departure_times,
            };

            let reply = add_train(agent, &request)
                .await
                .map_err(|e| fail(format!("failed to add train {}: {}", train_name, e)))?;

            if reply.status != "success" {
                return Err(fail(format!(
                    "add train {} failed with status: {}",
                    train_name, reply.status
                )));
            }
            info!(
                user = ADMIN,
                train_name = %train_name,
                model = %config.model_name,
                "POST /api/admin/add_train"
            );
        }
        Ok(())
    }
}

async fn add_train(agent: &Agent, request: &AddTrainRequest<'_>) -> Result<AddTrainResponse, HttpError> {
    agent
        .post_json(api::ADMIN_ADD_TRAIN, request)
        .await?
        .require_ok(HttpMethod::Post, api::ADMIN_ADD_TRAIN)?
        .json()
}

/// GET `path`, require 200 and decode the body
async fn fetch<T>(agent: &Agent, path: &str, limit: Option<std::time::Duration>) -> Result<T, HttpError>
where
    T: serde::de::DeserializeOwned,
{
    let response = match limit {
        Some(limit) => agent.get_within(path, limit).await?,
        None => agent.get(path).await?,
    };
    response.require_ok(HttpMethod::Get, path)?.json()
}
