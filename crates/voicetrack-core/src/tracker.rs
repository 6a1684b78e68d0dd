//! Collaborator-facing facade.
//!
//! Owns the record, the state store, and the clock, and persists after
//! every operation that changes durable state. Presentation layers call
//! these methods and render the returned reports; they never touch the
//! record file directly.

use chrono::NaiveDate;
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, LoadIssue, SaveError};
use crate::record::{TrackerRecord, WeekdaySet};
use crate::settings::Settings;
use crate::storage::state::{LoadOutcome, StateStore};
use crate::streak::{self, CompletionReport, DailyReport};

/// Everything that happened while opening the tracker.
#[derive(Debug)]
pub struct OpenReport {
    /// Problems encountered while loading (defaults were substituted).
    pub issues: Vec<LoadIssue>,
    /// What the startup reconciliation changed.
    pub daily: DailyReport,
    /// Persisting the reconciled record failed; the tracker is still
    /// usable in memory.
    pub save_error: Option<SaveError>,
}

/// The running tracker: record + store + clock.
pub struct Tracker<C: Clock = SystemClock> {
    store: StateStore,
    record: TrackerRecord,
    clock: C,
}

impl Tracker<SystemClock> {
    /// Open with the system clock at the configured UTC offset.
    pub fn open(settings: Settings) -> (Self, OpenReport) {
        let clock = SystemClock::new(settings.utc_offset);
        Self::open_with_clock(settings, clock)
    }
}

impl<C: Clock> Tracker<C> {
    /// Load the record (or defaults), run the startup reconciliation, and
    /// persist whatever it changed. Never fails: load problems and a
    /// failed initial save are reported, not raised.
    pub fn open_with_clock(settings: Settings, clock: C) -> (Self, OpenReport) {
        let mut store = StateStore::new(settings);
        let LoadOutcome { record, issues } = store.load();
        let mut tracker = Self {
            store,
            record,
            clock,
        };

        let daily = streak::reconcile_daily(&mut tracker.record, tracker.clock.today());
        let save_error = if daily.changed {
            tracker.store.save(&tracker.record).err()
        } else {
            None
        };
        if let Some(e) = &save_error {
            warn!(error = %e, "could not persist startup reconciliation");
        }

        (
            tracker,
            OpenReport {
                issues,
                daily,
                save_error,
            },
        )
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn record(&self) -> &TrackerRecord {
        &self.record
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn planned_days(&self) -> &WeekdaySet {
        &self.record.planned_days
    }

    pub fn training_plan_text(&self) -> &str {
        &self.record.training_plan_text
    }

    pub fn encryption_enabled(&self) -> bool {
        self.record.encrypt_save_file
    }

    pub fn is_currently_sick(&self) -> bool {
        streak::is_currently_sick(&self.record, self.clock.today())
    }

    // ── Daily operations ─────────────────────────────────────────────

    /// Run the daily reconciliation. Call once at startup (done by
    /// `open`) and once per calendar-day boundary; extra calls are
    /// harmless.
    pub fn reconcile_daily(&mut self) -> Result<DailyReport, SaveError> {
        let report = streak::reconcile_daily(&mut self.record, self.clock.today());
        if report.changed {
            self.store.save(&self.record)?;
        }
        Ok(report)
    }

    /// Log a completed session of `duration_seconds`.
    pub fn log_completion(&mut self, duration_seconds: f64) -> Result<CompletionReport, SaveError> {
        let report = streak::log_completion(&mut self.record, self.clock.today(), duration_seconds);
        if report.changed {
            self.store.save(&self.record)?;
        }
        Ok(report)
    }

    /// Mark today as a rest day. Returns the inclusive end date.
    pub fn mark_sick_today(&mut self) -> Result<NaiveDate, CoreError> {
        self.mark_sick_range(1)
    }

    /// Mark `days` days as resting, starting today. Returns the inclusive
    /// end date.
    pub fn mark_sick_range(&mut self, days: u32) -> Result<NaiveDate, CoreError> {
        let until = streak::mark_sick(&mut self.record, self.clock.today(), days)?;
        self.store.save(&self.record)?;
        Ok(until)
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Replace the planned weekdays. Out-of-range indices are dropped.
    /// Returns whether anything changed.
    pub fn set_planned_days(&mut self, days: WeekdaySet) -> Result<bool, SaveError> {
        let days: WeekdaySet = days.into_iter().filter(|day| *day <= 6).collect();
        if days == self.record.planned_days {
            return Ok(false);
        }
        self.record.planned_days = days;
        self.store.save(&self.record)?;
        Ok(true)
    }

    /// Replace the plan text. Returns whether anything changed.
    pub fn set_training_plan_text(&mut self, text: impl Into<String>) -> Result<bool, SaveError> {
        let text = text.into();
        if text == self.record.training_plan_text {
            return Ok(false);
        }
        self.record.training_plan_text = text;
        self.store.save(&self.record)?;
        Ok(true)
    }

    /// Show or hide the edit guide affordance (presentation flag).
    pub fn set_show_edit_guide(&mut self, show: bool) -> Result<bool, SaveError> {
        if show == self.record.show_edit_guide_button {
            return Ok(false);
        }
        self.record.show_edit_guide_button = show;
        self.store.save(&self.record)?;
        Ok(true)
    }

    /// Toggle at-rest encryption and immediately re-save in the new form.
    ///
    /// Turning it on obtains key material (loading the existing key, or
    /// generating one when none is usable); turning it off clears the
    /// in-memory key. Returns whether the setting changed.
    pub fn set_encryption(&mut self, enabled: bool) -> Result<bool, CoreError> {
        if self.record.encrypt_save_file == enabled {
            return Ok(false);
        }
        if enabled {
            self.store.enable_encryption()?;
            self.record.encrypt_save_file = true;
        } else {
            self.record.encrypt_save_file = false;
            self.store.disable_encryption();
        }
        self.store.save(&self.record)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_at(dir: &std::path::Path, today: NaiveDate) -> (Tracker<FixedClock>, OpenReport) {
        Tracker::open_with_clock(Settings::default().in_dir(dir), FixedClock::new(today))
    }

    #[test]
    fn open_on_fresh_install_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (tracker, report) = open_at(dir.path(), date(2024, 1, 1));

        assert!(report.issues.is_empty());
        assert!(report.save_error.is_none());
        assert_eq!(tracker.record().current_streak, 0);
        assert_eq!(tracker.record().last_active_date, Some(date(2024, 1, 1)));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let today = date(2024, 1, 1);
        {
            let (mut tracker, _) = open_at(dir.path(), today);
            tracker.log_completion(900.0).unwrap();
        }
        let (tracker, report) = open_at(dir.path(), today);
        assert!(report.issues.is_empty());
        assert_eq!(tracker.record().current_streak, 1);
        assert_eq!(tracker.record().total_trainings, 1);
        assert_eq!(tracker.record().daily_session_info.duration_seconds, 900.0);
    }

    #[test]
    fn plan_setters_report_change() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tracker, _) = open_at(dir.path(), date(2024, 1, 1));

        let days: WeekdaySet = [1u8, 3, 5, 9].into_iter().collect();
        assert!(tracker.set_planned_days(days).unwrap());
        assert_eq!(
            tracker.planned_days(),
            &[1u8, 3, 5].into_iter().collect::<WeekdaySet>()
        );
        // Same value again: no change, no save.
        let days: WeekdaySet = [1u8, 3, 5].into_iter().collect();
        assert!(!tracker.set_planned_days(days).unwrap());

        assert!(tracker.set_training_plan_text("new plan").unwrap());
        assert!(!tracker.set_training_plan_text("new plan").unwrap());
    }

    #[test]
    fn mark_sick_refusal_surfaces_as_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tracker, _) = open_at(dir.path(), date(2024, 1, 1));
        tracker.log_completion(0.0).unwrap();

        match tracker.mark_sick_today() {
            Err(CoreError::Refused(_)) => {}
            other => panic!("expected refusal, got {other:?}"),
        }
    }
}
