//! Calendar source for the once-per-day rules.
//!
//! Day boundaries are evaluated lazily at call time; nothing here schedules.

use chrono::{Days, Local, NaiveDate};
use parking_lot::RwLock;

pub trait Clock: Send + Sync {
    /// Current local calendar date.
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date in the host's local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock whose date only moves when told to. Used for simulated days.
#[derive(Debug)]
pub struct ManualClock {
    today: RwLock<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: RwLock::new(today),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.today.write() = date;
    }

    /// Move forward by `days` calendar days, saturating at the chrono maximum.
    pub fn advance_days(&self, days: u64) {
        let mut today = self.today.write();
        *today = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.today.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());

        clock.set(NaiveDate::from_ymd_opt(2025, 10, 27).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 10, 27).unwrap());
    }
}
