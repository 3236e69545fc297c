//! Run-aborting errors and the single-slot channel that carries them

use crate::ledger::DoubleBooking;
use railbench_http::HttpError;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Which side of the admin bracket a reported metric fell on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Reported value is below what the driver had already seen
    TooOld,
    /// Reported value is above anything the driver could have produced
    TooNew,
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::TooOld => write!(f, "too old"),
            Staleness::TooNew => write!(f, "too new"),
        }
    }
}

/// An error that ends the run
#[derive(Debug, Error)]
pub enum CriticalError {
    #[error("failed to login as admin: {0}")]
    AdminLogin(#[source] HttpError),

    #[error("failed to get train models: {0}")]
    TrainModels(#[source] HttpError),

    #[error("failed to get admin stats: {0}")]
    AdminStats(#[source] HttpError),

    #[error("failed to get train sales: {0}")]
    TrainSales(#[source] HttpError),

    #[error("{metric} {staleness}: API returned {reported}, benchmark saw between {min} and {max}")]
    Bracket {
        metric: &'static str,
        staleness: Staleness,
        reported: i64,
        min: i64,
        max: i64,
    },

    #[error("train registration failed for {family} phase {phase}: {message}")]
    TrainRegistration {
        family: &'static str,
        phase: usize,
        message: String,
    },

    #[error("refund failed for user {user}, reservation {reservation_id}: {message}")]
    Refund {
        user: String,
        reservation_id: String,
        message: String,
    },

    #[error(transparent)]
    DoubleBooking(#[from] DoubleBooking),
}

/// Producer half of the critical-error channel. Never blocks; when the slot
/// is taken the later error is dropped.
#[derive(Debug, Clone)]
pub struct CriticalSignal {
    sender: mpsc::Sender<CriticalError>,
}

impl CriticalSignal {
    /// Returns true if this error took the slot
    pub fn raise(&self, err: CriticalError) -> bool {
        error!("Critical error: {}", err);
        match self.sender.try_send(err) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped))
            | Err(mpsc::error::TrySendError::Closed(dropped)) => {
                debug!("Critical error slot already taken, dropping: {}", dropped);
                false
            }
        }
    }
}

/// A capacity-one channel: first writer wins
pub fn critical_channel() -> (CriticalSignal, mpsc::Receiver<CriticalError>) {
    let (sender, receiver) = mpsc::channel(1);
    (CriticalSignal { sender }, receiver)
}
