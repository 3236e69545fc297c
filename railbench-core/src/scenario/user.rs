use super::{log_http_error, Scenario};
use crate::errors::ScenarioError;
use tracing::{debug, error, info};

impl Scenario {
    /// One buyer iteration: log in, queue, buy in the background while the
    /// session lives, then let every helper go.
    pub async fn run_user(&self, worker: usize) {
        let cancel = self.cancel_token();
        let user = self.shared.users.random(&mut rand::rng()).clone();
        let agent = match self.agent(cancel.clone()) {
            Ok(agent) => agent,
            Err(e) => {
                error!(user = %user.name, error = %e, "Failed to create agent");
                return;
            }
        };
        info!(user = %user.name, worker, "START");

        self.login(&agent, &user).await;
        if let Err(e) = self.wait_in_waiting_room(&agent, &user).await {
            log_iteration_error(&user.name, &e);
            if cancel.is_cancelled() {
                return;
            }
        }

        let helpers = cancel.child_token();
        let _helpers_guard = helpers.clone().drop_guard();
        let helper_agent = agent.scoped(helpers);

        self.spawn_schedule_poller(helper_agent.clone(), user.name.clone());

        let buyer = self.clone();
        let buyer_user = user.clone();
        tokio::spawn(async move {
            if let Err(e) = buyer.buy_tickets(&helper_agent, &buyer_user, worker).await {
                log_iteration_error(&buyer_user.name, &e);
            }
        });

        self.watch_session(&agent, &user).await;
        info!(user = %user.name, "Session ended");
    }
}

/// Early exits are part of normal traffic; only unexpected failures are errors
pub(crate) fn log_iteration_error(user: &str, err: &ScenarioError) {
    match err {
        ScenarioError::Http(e) => log_http_error(user, "iteration", e),
        ScenarioError::NoSchedule { .. } | ScenarioError::ReservationRejected { .. } => {
            debug!(user = %user, reason = %err, "Iteration abandoned");
        }
        other => error!(user = %user, error = %other, "Iteration failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::scenario_for;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_user_keeps_session_when_waiting_room_poll_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/waiting_status"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/schedules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"schedules": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "session_expired"})))
            .expect(1)
            .mount(&server)
            .await;

        let (scenario, _critical) = scenario_for(&server.uri());
        tokio::time::timeout(Duration::from_secs(5), scenario.run_user(3))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_user_stops_before_buying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/session"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (scenario, _critical) = scenario_for(&server.uri());
        scenario.cancel_token().cancel();
        tokio::time::timeout(Duration::from_secs(5), scenario.run_user(0))
            .await
            .unwrap();
    }
}
