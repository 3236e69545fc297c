//! Purchased-seat ledger and the double-booking verifier

use crate::stations::expand_sections;
use parking_lot::Mutex;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use thiserror::Error;

const LEDGER_SHARDS: usize = 16;

/// Two purchases share a seat on the same unit section of a schedule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Double booking detected: Schedule {schedule_id}, Seat {seat}, Section {section}")]
pub struct DoubleBooking {
    pub schedule_id: String,
    pub seat: String,
    pub section: String,
}

impl DoubleBooking {
    /// `scheduleId|seat|section` form of the colliding triple
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.schedule_id, self.seat, self.section)
    }
}

/// Build the `scheduleId|seat|fromTo` value stored for a purchased seat
pub fn purchased_key(schedule_id: &str, seat: &str, from_to: &str) -> String {
    format!("{}|{}|{}", schedule_id, seat, from_to)
}

/// Concurrent map of purchase id to `scheduleId|seat|fromTo`.
///
/// Written once per purchased seat while the run is live and read only after
/// every task has finished.
#[derive(Debug)]
pub struct ReservationLedger {
    shards: Vec<Mutex<HashMap<String, String>>>,
}

impl Default for ReservationLedger {
    fn default() -> Self {
        Self {
            shards: (0..LEDGER_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard_for(&self, key: &str) -> &Mutex<HashMap<String, String>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % self.shards.len()]
    }

    /// Store `value` under `key` unless the key is taken. Returns the value
    /// already stored, leaving it in place.
    pub fn store_unique(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let mut shard = self.shard_for(&key).lock();
        match shard.entry(key) {
            Entry::Occupied(existing) => Some(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(value.into());
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored value, one shard locked at a time
    pub fn snapshot(&self) -> Vec<String> {
        self.shards
            .iter()
            .flat_map(|shard| shard.lock().values().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Expand every stored journey into unit sections and reject the first
    /// `(schedule, seat, section)` triple seen twice. Returns the number of
    /// distinct triples on success. Malformed values are skipped.
    pub fn verify(&self) -> Result<usize, DoubleBooking> {
        let mut seen = HashSet::new();
        for value in self.snapshot() {
            let mut parts = value.split('|');
            let (Some(schedule_id), Some(seat), Some(from_to), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                continue;
            };

            for section in expand_sections(from_to) {
                if !seen.insert(purchased_key(schedule_id, seat, &section)) {
                    return Err(DoubleBooking {
                        schedule_id: schedule_id.to_string(),
                        seat: seat.to_string(),
                        section,
                    });
                }
            }
        }
        Ok(seen.len())
    }
}
