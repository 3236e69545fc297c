//! Sharded progress counters

use crate::phases::PhaseFamily;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// Number of independent shards per counter
pub const SHARDS: usize = 32;

#[repr(align(64))]
#[derive(Debug, Default)]
struct Shard(AtomicI64);

/// A 64-bit counter split over [`SHARDS`] cache-line aligned atomics.
///
/// Writers pick a shard by their own identity; readers sum every shard, so a
/// read is a point-in-time total that may miss adds still in flight.
#[derive(Debug)]
pub struct ShardedCounter {
    shards: [Shard; SHARDS],
}

impl Default for ShardedCounter {
    fn default() -> Self {
        Self {
            shards: std::array::from_fn(|_| Shard::default()),
        }
    }
}

impl ShardedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the shard owned by `worker`. Negative deltas are ignored
    /// so no shard ever decreases.
    pub fn add(&self, worker: usize, delta: i64) {
        if delta <= 0 {
            return;
        }
        self.shards[worker % SHARDS].0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn sum(&self) -> i64 {
        self.shards
            .iter()
            .map(|shard| shard.0.load(Ordering::Relaxed))
            .sum()
    }
}

/// Driver-side view of what the target should have recorded
#[derive(Debug, Default)]
pub struct Progress {
    pub sales: ShardedCounter,
    pub refunds: ShardedCounter,
    pub purchased: ShardedCounter,
    pub tickets: ShardedCounter,
    ticket_phase: AtomicU32,
    sales_phase: AtomicU32,
}

/// Plain copy of all counters at one moment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub sales: i64,
    pub refunds: i64,
    pub purchased: i64,
    pub tickets: i64,
    pub ticket_phase: u32,
    pub sales_phase: u32,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            sales: self.sales.sum(),
            refunds: self.refunds.sum(),
            purchased: self.purchased.sum(),
            tickets: self.tickets.sum(),
            ticket_phase: self.phase(PhaseFamily::Tickets),
            sales_phase: self.phase(PhaseFamily::Sales),
        }
    }

    fn phase_cell(&self, family: PhaseFamily) -> &AtomicU32 {
        match family {
            PhaseFamily::Tickets => &self.ticket_phase,
            PhaseFamily::Sales => &self.sales_phase,
        }
    }

    pub fn phase(&self, family: PhaseFamily) -> u32 {
        self.phase_cell(family).load(Ordering::Acquire)
    }

    /// Raise the phase index. Lower values are ignored.
    pub fn store_phase(&self, family: PhaseFamily, phase: u32) {
        self.phase_cell(family).fetch_max(phase, Ordering::AcqRel);
    }

    /// Counter a phase family's thresholds are compared against
    pub fn metric(&self, family: PhaseFamily) -> &ShardedCounter {
        match family {
            PhaseFamily::Tickets => &self.tickets,
            PhaseFamily::Sales => &self.sales,
        }
    }
}
