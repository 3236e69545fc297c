use super::Scenario;
use crate::api::{
    self, PurchaseResponse, Reservation, ReservationIdRequest, ReserveRequest, ReserveResponse,
    SchedulesResponse, TrainSchedule,
};
use crate::clock::AppTime;
use crate::data::User;
use crate::errors::ScenarioError;
use crate::ledger::purchased_key;
use crate::stations::{Itinerary, Station};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use railbench_http::{Agent, HttpError};
use tracing::{info, warn};

const BASE_TICKET_PRICE: i64 = 1_000;
const MIN_PEOPLE: i64 = 1;
const MAX_PEOPLE: i64 = 50;
/// Below this many affordable seats the party size is drawn at random
const SMALL_PARTY_CAP: i64 = 15;
const MODEST_PARTY_PROBABILITY: f64 = 0.9;
const REJECT_RECOMMENDATION_PROBABILITY: f64 = 0.2;

/// Party size for a buyer with `credit` travelling `itinerary`
pub fn decide_num_people<R: Rng + ?Sized>(credit: i64, itinerary: &Itinerary, rng: &mut R) -> u32 {
    let distance = i64::from(itinerary.total_distance());
    if distance == 0 {
        return MIN_PEOPLE as u32;
    }
    let cost_per_person = BASE_TICKET_PRICE * distance;
    let cap = (credit as f64 / cost_per_person as f64).ceil() as i64;
    let roll = rng.random::<f64>();
    people_for_roll(cap, roll, rng)
}

/// Party size once the affordable `cap` and the 0..1 `roll` are known
pub fn people_for_roll<R: Rng + ?Sized>(cap: i64, roll: f64, rng: &mut R) -> u32 {
    let people = if roll < MODEST_PARTY_PROBABILITY {
        if cap < MIN_PEOPLE {
            MIN_PEOPLE
        } else if cap < SMALL_PARTY_CAP {
            rng.random_range(MIN_PEOPLE..=cap)
        } else {
            cap.clamp(MIN_PEOPLE, MAX_PEOPLE)
        }
    } else {
        cap.saturating_add(1).clamp(MIN_PEOPLE, MAX_PEOPLE)
    };
    people as u32
}

/// Earliest schedule leaving at or after `after` with seats on every unit
/// section of `from -> to`. Ties go to the first listed. Schedules without a
/// readable departure for the leg are skipped.
pub fn find_earliest_schedule(
    schedules: &[TrainSchedule],
    from: Station,
    to: Station,
    after: AppTime,
) -> Option<(&TrainSchedule, AppTime)> {
    schedules
        .iter()
        .filter_map(|schedule| Some((schedule, schedule.departure_for(from, to)?)))
        .filter(|(schedule, departure)| *departure >= after && schedule.is_available(from, to))
        .fold(None, |best, candidate| match best {
            Some((_, best_departure)) if best_departure <= candidate.1 => best,
            _ => Some(candidate),
        })
}

/// Coin flips a buyer makes between requests
pub(crate) trait BuyerChoices: Send {
    /// Take the alternative the target offered instead of the requested seats
    fn accept_recommendation(&mut self) -> bool;

    /// App hours spent at a stop before looking for the next leg
    fn layover_hours(&mut self) -> u32;
}

/// [`BuyerChoices`] drawn from a per-iteration RNG
pub(crate) struct RandomChoices(StdRng);

impl RandomChoices {
    pub(crate) fn new() -> Self {
        Self(StdRng::from_rng(&mut rand::rng()))
    }
}

impl BuyerChoices for RandomChoices {
    fn accept_recommendation(&mut self) -> bool {
        self.0.random::<f64>() >= REJECT_RECOMMENDATION_PROBABILITY
    }

    fn layover_hours(&mut self) -> u32 {
        self.0.random_range(2..=6)
    }
}

impl Scenario {
    async fn fetch_schedules(&self, agent: &Agent) -> Result<Vec<TrainSchedule>, HttpError> {
        let response: SchedulesResponse = agent.get(api::SCHEDULES).await?.json()?;
        Ok(response.schedules)
    }

    async fn warm_up(&self, agent: &Agent, user: &User) {
        let (purchased, stations, current_time) = tokio::join!(
            agent.get(api::PURCHASED_TICKETS),
            agent.get(api::STATIONS),
            agent.get(api::CURRENT_TIME),
        );
        for (path, result) in [
            (api::PURCHASED_TICKETS, purchased),
            (api::STATIONS, stations),
            (api::CURRENT_TIME, current_time),
        ] {
            match result {
                Ok(response) => info!(user = %user.name, status_code = response.status, "GET {}", path),
                Err(e) => super::log_http_error(&user.name, path, &e),
            }
        }
    }

    async fn reserve(
        &self,
        agent: &Agent,
        user: &User,
        request: &ReserveRequest<'_>,
        choices: &mut impl BuyerChoices,
    ) -> Result<Option<Reservation>, ScenarioError> {
        let response = agent.post_json(api::RESERVE, request).await?;
        info!(user = %user.name, status_code = response.status, "POST /api/reserve");
        let reply: ReserveResponse = response.json()?;

        match (reply.status.as_str(), reply.reserved, reply.recommend) {
            ("success", Some(reserved), _) => {
                info!(user = %user.name, reservation_id = %reserved.reservation_id, "Reservation successful");
                Ok(Some(reserved))
            }
            ("recommend", _, Some(recommended)) => {
                if !choices.accept_recommendation() {
                    warn!(
                        user = %user.name,
                        recommendation_id = %recommended.reservation_id,
                        "Recommendation rejected, cancelling reservation"
                    );
                    return Ok(None);
                }
                info!(
                    user = %user.name,
                    reservation_id = %recommended.reservation_id,
                    "Proceeding with recommended reservation"
                );
                Ok(Some(recommended))
            }
            (status, _, _) => {
                warn!(
                    user = %user.name,
                    status,
                    error_code = reply.error_code.as_deref().unwrap_or_default(),
                    "Reservation failed"
                );
                Err(ScenarioError::ReservationRejected {
                    status: status.to_string(),
                })
            }
        }
    }

    async fn purchase(
        &self,
        agent: &Agent,
        user: &User,
        reservation: &Reservation,
    ) -> Result<PurchaseResponse, ScenarioError> {
        let request = ReservationIdRequest {
            reservation_id: &reservation.reservation_id,
        };
        let response = agent.post_json(api::PURCHASE, &request).await?;
        info!(user = %user.name, status_code = response.status, "POST /api/purchase");

        let status_code = response.status;
        let reply = if response.is_success() {
            Some(response.json::<PurchaseResponse>()?)
        } else {
            None
        };
        match reply {
            Some(reply) if reply.status == "success" => Ok(reply),
            other => Err(ScenarioError::PurchaseFailed {
                reservation_id: reservation.reservation_id.clone(),
                status: other.map(|reply| reply.status).unwrap_or_default(),
                status_code,
            }),
        }
    }

    /// Record every purchased seat in the ledger and the counters
    fn record_purchase(&self, worker: usize, reservation: &Reservation, leg: (Station, Station)) {
        let from_to = reservation.from_to(leg);
        for seat in &reservation.seats {
            let id = format!("{}{}", reservation.reservation_id, seat);
            let value = purchased_key(&reservation.schedule_id, seat, &from_to);
            if let Some(previous) = self.ledger().store_unique(id, value) {
                warn!(
                    reservation_id = %reservation.reservation_id,
                    seat = %seat,
                    previous = %previous,
                    "Seat purchased twice under the same reservation"
                );
            }
        }
        let progress = self.progress();
        progress.purchased.add(worker, reservation.total_price);
        progress.tickets.add(worker, reservation.seats.len() as i64);
    }

    /// Reserve and purchase each leg of a random itinerary, handing every
    /// bought ticket to its own entry task
    pub(crate) async fn buy_tickets(&self, agent: &Agent, user: &User, worker: usize) -> Result<(), ScenarioError> {
        self.warm_up(agent, user).await;

        let mut choices = RandomChoices::new();
        let (itinerary, num_people) = {
            let mut rng = rand::rng();
            let itinerary = Itinerary::random(&mut rng);
            let num_people = decide_num_people(user.credit_amount, &itinerary, &mut rng);
            (itinerary, num_people)
        };
        info!(user = %user.name, stations = %itinerary, num_people, "Generated itinerary");

        self.buy_itinerary(agent, user, worker, &itinerary, num_people, &mut choices)
            .await
    }

    pub(crate) async fn buy_itinerary(
        &self,
        agent: &Agent,
        user: &User,
        worker: usize,
        itinerary: &Itinerary,
        num_people: u32,
        choices: &mut impl BuyerChoices,
    ) -> Result<(), ScenarioError> {
        let mut schedules = self.fetch_schedules(agent).await?;
        let mut current_time = self.clock().now();

        for (from, to) in itinerary.legs() {
            let Some((schedule, departure)) = find_earliest_schedule(&schedules, from, to, current_time)
            else {
                warn!(user = %user.name, from = %from, to = %to, current_time = %current_time, "No available schedule found for leg");
                return Err(ScenarioError::NoSchedule {
                    from: from.to_string(),
                    to: to.to_string(),
                    after: current_time.to_string(),
                });
            };
            info!(
                user = %user.name,
                from = %from,
                to = %to,
                departure_at = %departure,
                schedule_id = %schedule.id,
                num_people,
                "Attempting to reserve ticket"
            );

            let request = ReserveRequest {
                schedule_id: &schedule.id,
                from_station_id: from.id(),
                to_station_id: to.id(),
                num_people,
            };
            let Some(reservation) = self.reserve(agent, user, &request, choices).await? else {
                return Ok(());
            };

            let purchase = self.purchase(agent, user, &reservation).await?;
            info!(user = %user.name, reservation_id = %reservation.reservation_id, "Purchase successful");
            self.record_purchase(worker, &reservation, (from, to));

            let leg_departure = AppTime::parse(&reservation.departure_at).unwrap_or(departure);
            self.spawn_entry(worker, user.clone(), reservation, purchase);

            current_time = leg_departure.plus_hours(choices.layover_hours());
            if current_time.is_end_of_day() {
                break;
            }

            schedules = self.fetch_schedules(agent).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn schedules() -> Vec<TrainSchedule> {
        serde_json::from_value(json!([
            {
                "id": "late",
                "availability": {"Arena->Bridge": "lots"},
                "departure_at": {"Arena->Bridge": "09:00"}
            },
            {
                "id": "sold-out",
                "availability": {"Arena->Bridge": "none"},
                "departure_at": {"Arena->Bridge": "06:00"}
            },
            {
                "id": "first",
                "availability": {"Arena->Bridge": "few", "Bridge->Cave": "lots"},
                "departure_at": {"Arena->Bridge": "07:00"}
            },
            {
                "id": "second",
                "availability": {"Arena->Bridge": "lots"},
                "departure_at": {"Arena->Bridge": "07:00"}
            },
            {
                "id": "gone",
                "availability": {"Arena->Bridge": "lots"},
                "departure_at": {"Arena->Bridge": "03:00"}
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_find_earliest_schedule() {
        let schedules = schedules();
        let (schedule, departure) =
            find_earliest_schedule(&schedules, Station::A, Station::B, AppTime::from_hm(5, 0)).unwrap();
        assert_eq!(schedule.id, "first");
        assert_eq!(departure, AppTime::from_hm(7, 0));

        let (schedule, _) =
            find_earliest_schedule(&schedules, Station::A, Station::B, AppTime::from_hm(7, 30)).unwrap();
        assert_eq!(schedule.id, "late");

        assert!(find_earliest_schedule(&schedules, Station::A, Station::B, AppTime::from_hm(9, 1)).is_none());
        assert!(find_earliest_schedule(&schedules, Station::E, Station::D, AppTime::default()).is_none());
    }

    #[test]
    fn test_departure_equal_to_now_is_accepted() {
        let schedules = schedules();
        let (schedule, _) =
            find_earliest_schedule(&schedules, Station::A, Station::B, AppTime::from_hm(3, 0)).unwrap();
        assert_eq!(schedule.id, "gone");
    }

    #[test]
    fn test_small_budget_gets_one_person() {
        let itinerary = Itinerary::new(vec![Station::A, Station::B, Station::C]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        // cap = ceil(2000 / 2000) = 1; the rare over-budget roll asks for 2
        for _ in 0..100 {
            let people = decide_num_people(2_000, &itinerary, &mut rng);
            assert!(people == 1 || people == 2, "got {}", people);
        }
        assert_eq!(people_for_roll(1, 0.5, &mut rng), 1);
        assert_eq!(people_for_roll(1, 0.95, &mut rng), 2);
    }

    #[test]
    fn test_people_for_roll_branches() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let people = people_for_roll(10, 0.3, &mut rng);
            assert!((1..=10).contains(&people));
        }
        assert_eq!(people_for_roll(30, 0.3, &mut rng), 30);
        assert_eq!(people_for_roll(80, 0.3, &mut rng), 50);
        assert_eq!(people_for_roll(0, 0.3, &mut rng), 1);
        assert_eq!(people_for_roll(10, 0.95, &mut rng), 11);
        assert_eq!(people_for_roll(50, 0.95, &mut rng), 50);
        assert_eq!(people_for_roll(-3, 0.95, &mut rng), 1);
    }

    #[test]
    fn test_generous_budget_is_capped() {
        let itinerary = Itinerary::new(vec![Station::A, Station::B]).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let people = decide_num_people(300_000, &itinerary, &mut rng);
            assert_eq!(people, 50);
        }
    }

    mod purchase_flow {
        use crate::scenario::testing::scenario_for;
        use crate::scenario::buy::BuyerChoices;
        use crate::data::User;
        use crate::errors::ScenarioError;
        use crate::scenario::Scenario;
        use crate::stations::{Itinerary, Station};
        use serde_json::json;
        use wiremock::matchers::{body_json, body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        struct Scripted {
            accept: bool,
            layover: u32,
        }

        impl BuyerChoices for Scripted {
            fn accept_recommendation(&mut self) -> bool {
                self.accept
            }

            fn layover_hours(&mut self) -> u32 {
                self.layover
            }
        }

        fn buyer() -> User {
            User {
                name: "user0042".to_string(),
                password: "pass0042".to_string(),
                global_payment_token: "token".to_string(),
                credit_amount: 50_000,
            }
        }

        fn reservation(id: &str, from: &str, to: &str, departure_at: &str, seats: &[&str], price: i64) -> serde_json::Value {
            json!({
                "reservation_id": id,
                "schedule_id": "S1",
                "from_station": from,
                "to_station": to,
                "departure_at": departure_at,
                "seats": seats,
                "total_price": price
            })
        }

        async fn mount_schedules(server: &MockServer, departures: serde_json::Value) {
            Mock::given(method("GET"))
                .and(path("/api/schedules"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "schedules": [{"id": "S1", "availability": {}, "departure_at": departures}]
                })))
                .mount(server)
                .await;
        }

        async fn mount_reserve(server: &MockServer, from: &str, reply: serde_json::Value, calls: u64) {
            Mock::given(method("POST"))
                .and(path("/api/reserve"))
                .and(body_partial_json(json!({"from_station_id": from})))
                .respond_with(ResponseTemplate::new(200).set_body_json(reply))
                .expect(calls)
                .mount(server)
                .await;
        }

        async fn mount_purchase_ok(server: &MockServer) {
            Mock::given(method("POST"))
                .and(path("/api/purchase"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "status": "success",
                    "entry_token": "ENTRY",
                    "qr_code_url": ""
                })))
                .mount(server)
                .await;
        }

        fn single_leg() -> Itinerary {
            Itinerary::new(vec![Station::A, Station::D]).unwrap()
        }

        fn sorted_ledger(scenario: &Scenario) -> Vec<String> {
            let mut values = scenario.ledger().snapshot();
            values.sort();
            values
        }

        #[tokio::test]
        async fn test_purchase_records_every_seat() {
            let server = MockServer::start().await;
            mount_schedules(&server, json!({"Arena->Bridge": "08:00"})).await;
            mount_reserve(
                &server,
                "A",
                json!({"status": "success", "reserved": reservation("R1", "A", "D", "08:00", &["A-1", "A-2"], 2_000)}),
                1,
            )
            .await;
            mount_purchase_ok(&server).await;

            let (scenario, _critical) = scenario_for(&server.uri());
            let agent = scenario.agent(scenario.cancel_token().clone()).unwrap();
            let mut choices = Scripted { accept: true, layover: 2 };

            scenario
                .buy_itinerary(&agent, &buyer(), 7, &single_leg(), 2, &mut choices)
                .await
                .unwrap();

            assert_eq!(sorted_ledger(&scenario), vec!["S1|A-1|AD", "S1|A-2|AD"]);
            let progress = scenario.progress().snapshot();
            assert_eq!(progress.purchased, 2_000);
            assert_eq!(progress.tickets, 2);
            assert_eq!(progress.sales, 0);
            assert_eq!(scenario.pending().len(), 1);
            scenario.cancel_token().cancel();
        }

        #[tokio::test]
        async fn test_accepted_recommendation_is_purchased() {
            let server = MockServer::start().await;
            mount_schedules(&server, json!({"Arena->Bridge": "08:00"})).await;
            mount_reserve(
                &server,
                "A",
                json!({"status": "recommend", "recommend": reservation("R9", "Arena", "Dock", "09:00", &["B-7"], 1_500)}),
                1,
            )
            .await;
            Mock::given(method("POST"))
                .and(path("/api/purchase"))
                .and(body_json(json!({"reservation_id": "R9"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "entry_token": "E9"})))
                .expect(1)
                .mount(&server)
                .await;

            let (scenario, _critical) = scenario_for(&server.uri());
            let agent = scenario.agent(scenario.cancel_token().clone()).unwrap();
            let mut choices = Scripted { accept: true, layover: 2 };

            scenario
                .buy_itinerary(&agent, &buyer(), 0, &single_leg(), 1, &mut choices)
                .await
                .unwrap();

            assert_eq!(sorted_ledger(&scenario), vec!["S1|B-7|AD"]);
            assert_eq!(scenario.progress().snapshot().purchased, 1_500);
            scenario.cancel_token().cancel();
        }

        #[tokio::test]
        async fn test_rejected_recommendation_buys_nothing() {
            let server = MockServer::start().await;
            mount_schedules(&server, json!({"Arena->Bridge": "08:00"})).await;
            mount_reserve(
                &server,
                "A",
                json!({"status": "recommend", "recommend": reservation("R9", "A", "D", "09:00", &["B-7"], 1_500)}),
                1,
            )
            .await;
            Mock::given(method("POST"))
                .and(path("/api/purchase"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;

            let (scenario, _critical) = scenario_for(&server.uri());
            let agent = scenario.agent(scenario.cancel_token().clone()).unwrap();
            let mut choices = Scripted { accept: false, layover: 2 };

            scenario
                .buy_itinerary(&agent, &buyer(), 0, &single_leg(), 1, &mut choices)
                .await
                .unwrap();

            assert!(scenario.ledger().is_empty());
            assert_eq!(scenario.progress().snapshot().purchased, 0);
            assert_eq!(scenario.pending().len(), 0);
        }

        #[tokio::test]
        async fn test_failed_purchase_records_nothing() {
            let server = MockServer::start().await;
            mount_schedules(&server, json!({"Arena->Bridge": "08:00"})).await;
            mount_reserve(
                &server,
                "A",
                json!({"status": "success", "reserved": reservation("R1", "A", "D", "08:00", &["A-1"], 1_000)}),
                1,
            )
            .await;
            Mock::given(method("POST"))
                .and(path("/api/purchase"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "payment_declined"})))
                .mount(&server)
                .await;

            let (scenario, _critical) = scenario_for(&server.uri());
            let agent = scenario.agent(scenario.cancel_token().clone()).unwrap();
            let mut choices = Scripted { accept: true, layover: 2 };

            let err = scenario
                .buy_itinerary(&agent, &buyer(), 0, &single_leg(), 1, &mut choices)
                .await
                .unwrap_err();

            assert!(
                matches!(&err, ScenarioError::PurchaseFailed { status, status_code: 200, .. } if status == "payment_declined"),
                "{}",
                err
            );
            assert!(scenario.ledger().is_empty());
            let progress = scenario.progress().snapshot();
            assert_eq!((progress.purchased, progress.tickets), (0, 0));
            assert_eq!(scenario.pending().len(), 0);
        }

        #[tokio::test]
        async fn test_layover_moves_to_the_next_leg() {
            let server = MockServer::start().await;
            mount_schedules(&server, json!({"Arena->Bridge": "08:00", "Bridge->Cave": "12:00"})).await;
            mount_reserve(
                &server,
                "A",
                json!({"status": "success", "reserved": reservation("R1", "A", "B", "08:00", &["A-1"], 1_000)}),
                1,
            )
            .await;
            mount_reserve(
                &server,
                "B",
                json!({"status": "success", "reserved": reservation("R2", "B", "C", "12:00", &["C-4"], 1_000)}),
                1,
            )
            .await;
            mount_purchase_ok(&server).await;

            let (scenario, _critical) = scenario_for(&server.uri());
            let agent = scenario.agent(scenario.cancel_token().clone()).unwrap();
            let itinerary = Itinerary::new(vec![Station::A, Station::B, Station::C]).unwrap();
            let mut choices = Scripted { accept: true, layover: 2 };

            scenario
                .buy_itinerary(&agent, &buyer(), 0, &itinerary, 1, &mut choices)
                .await
                .unwrap();

            assert_eq!(sorted_ledger(&scenario), vec!["S1|A-1|AB", "S1|C-4|BC"]);
            assert_eq!(scenario.progress().snapshot().tickets, 2);
            scenario.cancel_token().cancel();
        }

        #[tokio::test]
        async fn test_itinerary_stops_at_end_of_day() {
            let server = MockServer::start().await;
            mount_schedules(&server, json!({"Arena->Bridge": "20:00", "Bridge->Cave": "23:00"})).await;
            mount_reserve(
                &server,
                "A",
                json!({"status": "success", "reserved": reservation("R1", "A", "B", "20:00", &["A-1"], 1_000)}),
                1,
            )
            .await;
            mount_reserve(
                &server,
                "B",
                json!({"status": "success", "reserved": reservation("R2", "B", "C", "23:00", &["C-4"], 1_000)}),
                0,
            )
            .await;
            mount_purchase_ok(&server).await;

            let (scenario, _critical) = scenario_for(&server.uri());
            let agent = scenario.agent(scenario.cancel_token().clone()).unwrap();
            let itinerary = Itinerary::new(vec![Station::A, Station::B, Station::C]).unwrap();
            // 20:00 + 5h runs past midnight
            let mut choices = Scripted { accept: true, layover: 5 };

            scenario
                .buy_itinerary(&agent, &buyer(), 0, &itinerary, 1, &mut choices)
                .await
                .unwrap();

            assert_eq!(sorted_ledger(&scenario), vec!["S1|A-1|AB"]);
            assert_eq!(scenario.progress().snapshot().tickets, 1);
            scenario.cancel_token().cancel();
        }
    }
}
