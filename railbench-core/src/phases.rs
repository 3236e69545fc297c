//! Registration phases and the one-shot latches that release worker tranches

use std::fmt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Counter threshold that unlocks a phase, and how many trains it registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationPhase {
    pub threshold: i64,
    pub train_count: usize,
}

const fn phase(threshold: i64, train_count: usize) -> RegistrationPhase {
    RegistrationPhase {
        threshold,
        train_count,
    }
}

pub const TICKET_SOLD_PHASES: [RegistrationPhase; 5] = [
    phase(5, 1),
    phase(10, 2),
    phase(50, 3),
    phase(100, 3),
    phase(200, 3),
];

pub const SALES_PHASES: [RegistrationPhase; 7] = [
    phase(1_000, 3),
    phase(3_000, 3),
    phase(10_000, 5),
    phase(50_000, 7),
    phase(200_000, 10),
    phase(500_000, 20),
    phase(1_000_000, 20),
];

/// Workers released when the ticket phase reaches the index
pub const TICKET_SOLD_TRANCHES: [usize; 6] = [5, 5, 10, 20, 20, 20];

/// Workers released when the sales phase reaches the index
pub const SALES_TRANCHES: [usize; 8] = [15, 5, 5, 5, 20, 50, 100, 100];

/// The two independent phase ladders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseFamily {
    /// Driven by the number of tickets sold
    Tickets,
    /// Driven by confirmed sales
    Sales,
}

impl PhaseFamily {
    pub const ALL: [PhaseFamily; 2] = [PhaseFamily::Tickets, PhaseFamily::Sales];

    pub fn phases(self) -> &'static [RegistrationPhase] {
        match self {
            PhaseFamily::Tickets => &TICKET_SOLD_PHASES,
            PhaseFamily::Sales => &SALES_PHASES,
        }
    }

    /// Tranche sizes, one more entry than [`PhaseFamily::phases`] for phase 0
    pub fn tranches(self) -> &'static [usize] {
        match self {
            PhaseFamily::Tickets => &TICKET_SOLD_TRANCHES,
            PhaseFamily::Sales => &SALES_TRANCHES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseFamily::Tickets => "ticket",
            PhaseFamily::Sales => "sales",
        }
    }

    /// Trains registered by every phase before `index`
    pub fn train_offset(self, index: usize) -> usize {
        self.phases()
            .iter()
            .take(index)
            .map(|phase| phase.train_count)
            .sum()
    }

    /// Highest phase index whose threshold is covered by `value`, never
    /// lower than `current`
    pub fn reachable_phase(self, current: usize, value: i64) -> usize {
        let mut reached = current;
        while let Some(next) = self.phases().get(reached) {
            if next.threshold > value {
                break;
            }
            reached += 1;
        }
        reached
    }
}

impl fmt::Display for PhaseFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast latch that can be fired exactly once and never re-armed
#[derive(Debug)]
pub struct PhaseLatch {
    state: watch::Sender<bool>,
}

impl Default for PhaseLatch {
    fn default() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }
}

impl PhaseLatch {
    /// Returns true only for the call that actually fired the latch
    pub fn fire(&self) -> bool {
        self.state.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait for the latch, or for `cancel`. True when the latch fired.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let mut receiver = self.state.subscribe();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            fired = receiver.wait_for(|fired| *fired) => fired.is_ok(),
        }
    }
}

/// One latch per tranche in each family
#[derive(Debug)]
pub struct PhaseGates {
    tickets: Vec<PhaseLatch>,
    sales: Vec<PhaseLatch>,
}

impl Default for PhaseGates {
    fn default() -> Self {
        let latches = |family: PhaseFamily| {
            (0..family.tranches().len())
                .map(|_| PhaseLatch::default())
                .collect()
        };
        Self {
            tickets: latches(PhaseFamily::Tickets),
            sales: latches(PhaseFamily::Sales),
        }
    }
}

impl PhaseGates {
    pub fn new() -> Self {
        Self::default()
    }

    fn latches(&self, family: PhaseFamily) -> &[PhaseLatch] {
        match family {
            PhaseFamily::Tickets => &self.tickets,
            PhaseFamily::Sales => &self.sales,
        }
    }

    pub fn latch(&self, family: PhaseFamily, phase: usize) -> Option<&PhaseLatch> {
        self.latches(family).get(phase)
    }

    pub fn is_released(&self, family: PhaseFamily, phase: usize) -> bool {
        self.latch(family, phase).is_some_and(PhaseLatch::is_fired)
    }

    /// Block until `(family, phase)` is released. False if cancelled first or
    /// if no such tranche exists.
    pub async fn wait(&self, family: PhaseFamily, phase: usize, cancel: &CancellationToken) -> bool {
        match self.latch(family, phase) {
            Some(latch) => latch.wait(cancel).await,
            None => false,
        }
    }

    /// Fire every latch of `family` up to and including `phase`. Returns the
    /// phases released by this call, in order.
    pub fn release_through(&self, family: PhaseFamily, phase: usize) -> Vec<usize> {
        self.latches(family)
            .iter()
            .enumerate()
            .take(phase.saturating_add(1))
            .filter(|(_, latch)| latch.fire())
            .map(|(index, _)| index)
            .collect()
    }
}
