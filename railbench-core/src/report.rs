//! Final score and the end-of-run report

use crate::clock::AppTime;
use crate::counters::ProgressSnapshot;
use crate::phases::{SALES_PHASES, TICKET_SOLD_PHASES};
use std::fmt;

/// `floor((sales + 0.5 * (purchased - sales) - refunds) / 100)`
pub fn compute_score(sales: i64, purchased: i64, refunds: i64) -> i64 {
    let weighted = sales as f64 + (purchased - sales) as f64 * 0.5 - refunds as f64;
    (weighted / 100.0).floor() as i64
}

#[derive(Debug, Clone)]
pub struct FinalReport {
    pub score: i64,
    pub progress: ProgressSnapshot,
    pub current_time: AppTime,
    pub critical_error: Option<String>,
    /// Distinct `(schedule, seat, section)` triples in the ledger
    pub booked_sections: usize,
}

impl FinalReport {
    pub fn net_revenue(&self) -> i64 {
        self.progress.sales - self.progress.refunds
    }

    pub fn is_interrupted(&self) -> bool {
        self.critical_error.is_some()
    }
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Benchmark Finished!")?;
        if let Some(message) = &self.critical_error {
            writeln!(f, "  Interrupted due to critical error:")?;
            writeln!(f, "  {}", message)?;
            writeln!(f)?;
        }
        writeln!(f, "  Score: {}", self.score)?;
        writeln!(f, "  Total Sales: {}", self.progress.sales)?;
        writeln!(f, "  Total Purchased: {}", self.progress.purchased)?;
        writeln!(f, "  Total Refunds: {}", self.progress.refunds)?;
        writeln!(f, "  Net Revenue: {}", self.net_revenue())?;
        writeln!(f, "  Total Tickets: {}", self.progress.tickets)?;
        writeln!(
            f,
            "  Ticket Phase: {}/{}",
            self.progress.ticket_phase,
            TICKET_SOLD_PHASES.len()
        )?;
        writeln!(
            f,
            "  Sales Phase: {}/{}",
            self.progress.sales_phase,
            SALES_PHASES.len()
        )?;
        writeln!(f, "  Current Time: {}", self.current_time)
    }
}
