//! Error types for data loading and scenario iterations

use railbench_http::HttpError;
use thiserror::Error;

/// Failures reading the embedded CSV tables
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to parse {table}: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{table} is empty")]
    Empty { table: &'static str },

    #[error("not enough train configs in {table}: need {start}..{end}, but only have {available}")]
    NotEnoughConfigs {
        table: &'static str,
        start: usize,
        end: usize,
        available: usize,
    },

    #[error("invalid departure time {value:?}")]
    InvalidTime { value: String },
}

/// Reasons a single user iteration stops early. None of these abort the run.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("no available schedule for {from} -> {to} after {after}")]
    NoSchedule {
        from: String,
        to: String,
        after: String,
    },

    #[error("reservation failed with status {status:?}")]
    ReservationRejected { status: String },

    #[error("purchase of {reservation_id} failed with status {status:?} (HTTP {status_code})")]
    PurchaseFailed {
        reservation_id: String,
        status: String,
        status_code: u16,
    },

    #[error("refund for {reservation_id} failed with error_code {error_code:?}")]
    RefundFailed {
        reservation_id: String,
        error_code: String,
    },
}

