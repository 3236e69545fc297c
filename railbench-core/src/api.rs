//! Request and response bodies of the target's JSON API

use crate::clock::AppTime;
use crate::stations::{segment_key, unit_sections, Station};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const INITIALIZE: &str = "/api/initialize";
pub const LOGIN: &str = "/api/login";
pub const WAITING_STATUS: &str = "/api/waiting_status";
pub const SESSION: &str = "/api/session";
pub const SCHEDULES: &str = "/api/schedules";
pub const STATIONS: &str = "/api/stations";
pub const CURRENT_TIME: &str = "/api/current_time";
pub const PURCHASED_TICKETS: &str = "/api/purchased_tickets";
pub const RESERVE: &str = "/api/reserve";
pub const PURCHASE: &str = "/api/purchase";
pub const ENTRY: &str = "/api/entry";
pub const REFUND: &str = "/api/refund";
pub const TRAIN_MODELS: &str = "/api/train_models";
pub const ADMIN_STATS: &str = "/api/admin/stats";
pub const ADMIN_TRAIN_SALES: &str = "/api/admin/train_sales";
pub const ADMIN_ADD_TRAIN: &str = "/api/admin/add_train";

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResponse {
    pub initialized_at: DateTime<Utc>,
    #[serde(default)]
    pub app_language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub name: &'a str,
    pub password: &'a str,
}

/// Body of both `/api/waiting_status` and `/api/session`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    /// Milliseconds to wait before polling again
    #[serde(default, alias = "next_check_ms")]
    pub next_check: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Lots,
    Few,
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainSchedule {
    pub id: String,
    #[serde(default)]
    pub availability: HashMap<String, Availability>,
    #[serde(default)]
    pub departure_at: HashMap<String, String>,
}

impl TrainSchedule {
    /// Departure of the first unit section of `from -> to`
    pub fn departure_for(&self, from: Station, to: Station) -> Option<AppTime> {
        let next = from.step_towards(to)?;
        self.departure_at
            .get(&segment_key(from, next))
            .and_then(|value| AppTime::parse(value))
    }

    /// False when any unit section on the way is explicitly sold out
    pub fn is_available(&self, from: Station, to: Station) -> bool {
        unit_sections(from, to).into_iter().all(|(a, b)| {
            self.availability.get(&segment_key(a, b)) != Some(&Availability::None)
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulesResponse {
    #[serde(default)]
    pub schedules: Vec<TrainSchedule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReserveRequest<'a> {
    pub schedule_id: &'a str,
    pub from_station_id: &'a str,
    pub to_station_id: &'a str,
    pub num_people: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub schedule_id: String,
    #[serde(default)]
    pub from_station: String,
    #[serde(default)]
    pub to_station: String,
    pub departure_at: String,
    #[serde(default)]
    pub seats: Vec<String>,
    pub total_price: i64,
    #[serde(default)]
    pub is_discounted: bool,
}

impl Reservation {
    /// Two-letter short-ID journey, falling back to the requested leg when
    /// the target reports stations the driver does not recognise
    pub fn from_to(&self, requested: (Station, Station)) -> String {
        let from = Station::parse(&self.from_station).unwrap_or(requested.0);
        let to = Station::parse(&self.to_station).unwrap_or(requested.1);
        format!("{}{}", from.id(), to.id())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveResponse {
    pub status: String,
    #[serde(default)]
    pub reserved: Option<Reservation>,
    #[serde(default)]
    pub recommend: Option<Reservation>,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationIdRequest<'a> {
    pub reservation_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseResponse {
    pub status: String,
    #[serde(default)]
    pub entry_token: String,
    #[serde(default)]
    pub qr_code_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryRequest<'a> {
    pub entry_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundResponse {
    pub status: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddTrainRequest<'a> {
    pub train_name: &'a str,
    pub model_name: &'a str,
    pub departure_times: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTrainResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainModelsResponse {
    #[serde(default)]
    pub model_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AdminStatsResponse {
    pub total_sales: i64,
    pub total_refunds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainSales {
    pub train_name: String,
    pub tickets_sold: i64,
    #[serde(default)]
    pub pending_revenue: i64,
    #[serde(default)]
    pub confirmed_revenue: i64,
    #[serde(default)]
    pub refunds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainSalesResponse {
    #[serde(default)]
    pub trains: Vec<TrainSales>,
}

impl TrainSalesResponse {
    pub fn tickets_sold(&self) -> i64 {
        self.trains.iter().map(|train| train.tickets_sold).sum()
    }
}
