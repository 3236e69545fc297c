use super::user::log_iteration_error;
use super::{log_http_error, pause, Scenario};
use crate::api::{self, EntryRequest, EntryResponse, PurchaseResponse, RefundResponse, Reservation, ReservationIdRequest};
use crate::clock::AppTime;
use crate::critical::CriticalError;
use crate::data::User;
use crate::errors::ScenarioError;
use railbench_http::{Agent, HttpMethod};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Real time spent walking to the gate when the train is already close
const WALK_TO_GATE: Duration = Duration::from_secs(1);

impl Scenario {
    /// Hand a purchased ticket to its own task that waits for boarding time
    /// and either passes the gate or asks for a refund.
    pub(crate) fn spawn_entry(&self, worker: usize, user: User, reservation: Reservation, purchase: PurchaseResponse) {
        let scenario = self.clone();
        self.pending().spawn(async move {
            scenario.enter_gate(worker, &user, &reservation, &purchase).await;
        });
    }

    async fn enter_gate(&self, worker: usize, user: &User, reservation: &Reservation, purchase: &PurchaseResponse) {
        let cancel = self.cancel_token();
        let Some(departure) = AppTime::parse(&reservation.departure_at) else {
            error!(
                user = %user.name,
                departure_at = %reservation.departure_at,
                "Failed to parse departure time"
            );
            return;
        };

        let now = self.clock().now();
        let wait = now.real_time_until(departure.minus_hours(1));
        info!(
            user = %user.name,
            departure_at = %departure,
            current_time = %now,
            entry_token = %purchase.entry_token,
            "Thinking about whether to enter"
        );
        let wait = if wait.is_zero() { WALK_TO_GATE } else { wait };
        if !pause(cancel, wait).await {
            return;
        }
        info!(
            user = %user.name,
            departure_at = %departure,
            current_time = %self.clock().now(),
            "Arrived at ticket gate"
        );

        let agent = match self.agent(cancel.clone()) {
            Ok(agent) => agent,
            Err(e) => {
                error!(user = %user.name, error = %e, "Failed to create agent");
                return;
            }
        };

        if !purchase.qr_code_url.is_empty() {
            match agent.get(&purchase.qr_code_url).await {
                Ok(response) => info!(
                    user = %user.name,
                    status_code = response.status,
                    qr_code_url = %purchase.qr_code_url,
                    "GET QR code"
                ),
                Err(e) => log_http_error(&user.name, &purchase.qr_code_url, &e),
            }
        }

        let status = match self.post_entry(&agent, &purchase.entry_token).await {
            Ok(reply) => reply.status,
            Err(e) => {
                log_http_error(&user.name, api::ENTRY, &e);
                return;
            }
        };

        if status == "train_departed" {
            info!(
                user = %user.name,
                departure_at = %departure,
                current_time = %self.clock().now(),
                "Train has already departed, logging in again to refund"
            );
            self.spawn_refund(worker, user.clone(), reservation.clone());
            return;
        }

        self.progress().sales.add(worker, reservation.total_price);
        info!(
            user = %user.name,
            from = %reservation.from_station,
            to = %reservation.to_station,
            amount = reservation.total_price,
            "Entered the ticket gate, sales recorded"
        );
    }

    async fn post_entry(&self, agent: &Agent, entry_token: &str) -> Result<EntryResponse, railbench_http::HttpError> {
        agent
            .post_json(api::ENTRY, &EntryRequest { entry_token })
            .await?
            .require_ok(HttpMethod::Post, api::ENTRY)?
            .json()
    }

    /// Refunds run on their own root token so they survive the end of the
    /// load window, bounded by the configured refund timeout.
    fn spawn_refund(&self, worker: usize, user: User, reservation: Reservation) {
        let scenario = self.clone();
        let limit = self.run_config().refund_timeout;

        self.pending().spawn(async move {
            let cancel = CancellationToken::new();
            let _guard = cancel.clone().drop_guard();

            let outcome = tokio::time::timeout(limit, scenario.refund(worker, &user, &reservation, &cancel)).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(ScenarioError::RefundFailed { error_code, .. })) => {
                    scenario.shared.critical.raise(CriticalError::Refund {
                        user: user.name.clone(),
                        reservation_id: reservation.reservation_id.clone(),
                        message: format!("refund request failed with error_code: {}", error_code),
                    });
                }
                Ok(Err(e)) => log_iteration_error(&user.name, &e),
                Err(_) => warn!(
                    user = %user.name,
                    reservation_id = %reservation.reservation_id,
                    "Refund did not finish within {:?}",
                    limit
                ),
            }
        });
    }

    async fn refund(
        &self,
        worker: usize,
        user: &User,
        reservation: &Reservation,
        cancel: &CancellationToken,
    ) -> Result<(), ScenarioError> {
        let agent = self.agent(cancel.clone())?;
        self.login(&agent, user).await;
        if let Err(e) = self.wait_in_waiting_room(&agent, user).await {
            log_iteration_error(&user.name, &e);
            if cancel.is_cancelled() {
                return Ok(());
            }
        }

        let helpers = cancel.child_token();
        let _helpers_guard = helpers.clone().drop_guard();
        self.spawn_schedule_poller(agent.scoped(helpers), user.name.clone());

        let request = ReservationIdRequest {
            reservation_id: &reservation.reservation_id,
        };
        let response = agent.post_json(api::REFUND, &request).await?;
        info!(user = %user.name, status_code = response.status, "POST /api/refund");
        let reply: RefundResponse = response.json()?;

        if reply.status != "success" {
            return Err(ScenarioError::RefundFailed {
                reservation_id: reservation.reservation_id.clone(),
                error_code: reply.error_code.unwrap_or_default(),
            });
        }
        self.progress().refunds.add(worker, reservation.total_price);
        info!(user = %user.name, amount = reservation.total_price, "Refund recorded");

        self.watch_session(&agent, user).await;
        info!(user = %user.name, "Session ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::scenario_for;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_session_flow(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/waiting_status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ready"})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/schedules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"schedules": []})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "session_expired"})))
            .mount(server)
            .await;
    }

    fn ticket() -> (User, Reservation, PurchaseResponse) {
        let user = User {
            name: "user0001".to_string(),
            password: "pass0001".to_string(),
            global_payment_token: "token".to_string(),
            credit_amount: 12_000,
        };
        let reservation: Reservation = serde_json::from_value(json!({
            "reservation_id": "R1",
            "schedule_id": "E2123",
            "from_station": "A",
            "to_station": "D",
            "departure_at": "00:00",
            "seats": ["A-3", "A-4"],
            "total_price": 3000
        }))
        .unwrap();
        let purchase = PurchaseResponse {
            status: "success".to_string(),
            entry_token: "ENTRY-1".to_string(),
            qr_code_url: String::new(),
        };
        (user, reservation, purchase)
    }

    async fn settle(scenario: &Scenario) {
        scenario.pending().close();
        tokio::time::timeout(Duration::from_secs(10), scenario.pending().wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_departed_train_is_refunded() {
        let server = MockServer::start().await;
        mount_session_flow(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/entry"))
            .and(body_json(json!({"entry_token": "ENTRY-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "train_departed"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/refund"))
            .and(body_json(json!({"reservation_id": "R1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let (scenario, mut critical) = scenario_for(&server.uri());
        let (user, reservation, purchase) = ticket();
        scenario.spawn_entry(3, user, reservation, purchase);
        settle(&scenario).await;

        let progress = scenario.progress().snapshot();
        assert_eq!(progress.refunds, 3000);
        assert_eq!(progress.sales, 0);
        assert!(critical.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_successful_entry_records_sale() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/entry"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let (scenario, _critical) = scenario_for(&server.uri());
        let (user, reservation, purchase) = ticket();
        scenario.spawn_entry(0, user, reservation, purchase);
        settle(&scenario).await;

        let progress = scenario.progress().snapshot();
        assert_eq!(progress.sales, 3000);
        assert_eq!(progress.refunds, 0);
    }

    #[tokio::test]
    async fn test_rejected_refund_is_critical() {
        let server = MockServer::start().await;
        mount_session_flow(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/entry"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "train_departed"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/refund"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "error", "error_code": "ALREADY_REFUNDED"})),
            )
            .mount(&server)
            .await;

        let (scenario, mut critical) = scenario_for(&server.uri());
        let (user, reservation, purchase) = ticket();
        scenario.spawn_entry(0, user, reservation, purchase);
        settle(&scenario).await;

        let err = critical.try_recv().unwrap();
        assert!(err.to_string().contains("ALREADY_REFUNDED"), "{}", err);
        assert_eq!(scenario.progress().snapshot().refunds, 0);
    }

    #[tokio::test]
    async fn test_gate_error_records_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/entry"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (scenario, mut critical) = scenario_for(&server.uri());
        let (user, reservation, purchase) = ticket();
        scenario.spawn_entry(0, user, reservation, purchase);
        settle(&scenario).await;

        let progress = scenario.progress().snapshot();
        assert_eq!((progress.sales, progress.refunds), (0, 0));
        assert!(critical.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refund_goes_ahead_when_waiting_room_poll_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/waiting_status"))
            .respond_with(ResponseTemplate::new(503).set_body_string("queue offline"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "session_expired"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/entry"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "train_departed"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/refund"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let (scenario, mut critical) = scenario_for(&server.uri());
        let (user, reservation, purchase) = ticket();
        scenario.spawn_entry(0, user, reservation, purchase);
        settle(&scenario).await;

        assert_eq!(scenario.progress().snapshot().refunds, 3000);
        assert!(critical.try_recv().is_err());
    }
}
