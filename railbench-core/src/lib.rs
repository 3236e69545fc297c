//! Scenario orchestration for the railbench load driver
//!
//! A run pre-spawns every simulated buyer, gates them behind phase latches and
//! lets an admin loop open the gates as the service under test proves it can
//! keep up. Progress is tracked in sharded counters and every purchased seat
//! lands in a ledger that is checked for double bookings once the run is over.

pub mod api;
pub mod clock;
pub mod counters;
pub mod critical;
pub mod data;
pub mod driver;
pub mod errors;
pub mod ledger;
pub mod phases;
pub mod pool;
pub mod report;
pub mod scenario;
pub mod scoreboard;
pub mod stations;

pub use clock::{AppClock, AppTime};
pub use counters::{Progress, ProgressSnapshot, ShardedCounter};
pub use critical::{critical_channel, CriticalError, CriticalSignal};
pub use data::{TrainCatalog, TrainConfig, User, UserTable};
pub use driver::{run, RunOutcome};
pub use errors::{DataError, ScenarioError};
pub use ledger::{DoubleBooking, ReservationLedger};
pub use phases::{PhaseFamily, PhaseGates, RegistrationPhase};
pub use pool::WorkerPool;
pub use report::{compute_score, FinalReport};
pub use scenario::Scenario;
pub use stations::{Itinerary, Station};
