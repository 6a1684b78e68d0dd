//! Time source abstraction.
//!
//! "Today" is always read through [`Clock`] so every date comparison in the
//! engine can be pinned in tests.

use chrono::{FixedOffset, NaiveDate, Utc};
use std::cell::Cell;

/// Provides the current calendar date.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock dates in a configured UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Clock pinned to an explicit date; tests advance it manually.
#[derive(Debug, Clone)]
pub struct FixedClock {
    date: Cell<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self { date: Cell::new(date) }
    }

    /// Move the clock to a new date.
    pub fn set(&self, date: NaiveDate) {
        self.date.set(date);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.date.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.today(), start);

        let next = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        clock.set(next);
        assert_eq!(clock.today(), next);
    }

    #[test]
    fn system_clock_respects_offset() {
        // +14h and -12h straddle every possible UTC instant, so the two
        // dates can never be equal.
        let east = SystemClock::new(FixedOffset::east_opt(14 * 3600).unwrap());
        let west = SystemClock::new(FixedOffset::west_opt(12 * 3600).unwrap());
        assert!(east.today() > west.today());
    }
}
