//! The in-app clock
//!
//! The service under test runs a whole day in 144 real seconds: one real
//! second is ten app minutes. [`AppTime`] is a minute-of-day value that is
//! allowed to run past midnight so itinerary arithmetic never wraps.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// App minutes that elapse per real second
const APP_MINUTES_PER_REAL_SECOND: u64 = 10;

/// Minutes since 00:00 on the app clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AppTime(u32);

impl AppTime {
    /// `24:00`, the moment the app day ends
    pub const END_OF_DAY: AppTime = AppTime(24 * 60);

    pub const fn from_hm(hours: u32, minutes: u32) -> Self {
        AppTime(hours * 60 + minutes)
    }

    pub const fn from_minutes(minutes: u32) -> Self {
        AppTime(minutes)
    }

    /// Parse `HH:MM`. Hours up to 24 are accepted so `24:00` round-trips.
    pub fn parse(value: &str) -> Option<Self> {
        let (hours, minutes) = value.trim().split_once(':')?;
        let hours: u32 = hours.parse().ok()?;
        let minutes: u32 = minutes.parse().ok()?;
        if hours > 24 || minutes >= 60 {
            return None;
        }
        Some(Self::from_hm(hours, minutes))
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn hours(self) -> u32 {
        self.0 / 60
    }

    pub fn plus_hours(self, hours: u32) -> Self {
        AppTime(self.0 + hours * 60)
    }

    pub fn minus_hours(self, hours: u32) -> Self {
        AppTime(self.0.saturating_sub(hours * 60))
    }

    pub fn is_end_of_day(self) -> bool {
        self >= Self::END_OF_DAY
    }

    /// Real time needed for the app clock to advance from `self` to `later`.
    /// Zero when `later` is not after `self`.
    pub fn real_time_until(self, later: AppTime) -> Duration {
        let app_minutes = u64::from(later.0.saturating_sub(self.0));
        Duration::from_millis(app_minutes * 1000 / APP_MINUTES_PER_REAL_SECOND)
    }
}

impl fmt::Display for AppTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// App time after `elapsed` real time since initialisation.
///
/// Hours are `floor(s / 6)` capped at 24, minutes are `(s mod 6) * 10`;
/// from 144 s onwards the result is exactly `24:00`.
pub fn app_time_at(elapsed: Duration) -> AppTime {
    let seconds = elapsed.as_secs_f64();
    let hours = (seconds / 6.0).floor().min(24.0) as u32;
    if hours >= 24 {
        return AppTime::END_OF_DAY;
    }
    let minutes = ((seconds % 6.0) * 10.0).floor() as u32;
    AppTime::from_hm(hours, minutes.min(59))
}

/// Wall-clock anchor reported by `/api/initialize`
#[derive(Debug, Clone, Copy)]
pub struct AppClock {
    initialized_at: DateTime<Utc>,
}

impl AppClock {
    pub fn new(initialized_at: DateTime<Utc>) -> Self {
        Self { initialized_at }
    }

    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }

    /// Current app time. A target clock slightly ahead of ours reads as 00:00.
    pub fn now(&self) -> AppTime {
        let elapsed = (Utc::now() - self.initialized_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        app_time_at(elapsed)
    }
}
