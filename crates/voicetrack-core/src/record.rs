//! Persisted tracker state.
//!
//! [`TrackerRecord`] is the single aggregate persisted per installation.
//! It is constructed once at startup (from disk or defaults), mutated in
//! place by the streak engine, and written back by the state store after
//! every mutation that touches durable fields.
//!
//! Field names double as the on-disk JSON keys; files written by earlier
//! releases load unchanged.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Planned weekdays, using the on-disk convention 0 = Monday .. 6 = Sunday.
pub type WeekdaySet = BTreeSet<u8>;

/// Running duration total for the current calendar day.
///
/// A `date` that disagrees with "today" marks the totals as stale; the
/// daily reconciliation resets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySession {
    pub date: Option<NaiveDate>,
    pub duration_seconds: f64,
}

impl DailySession {
    /// Fresh zero-duration session for `date`.
    pub fn for_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            duration_seconds: 0.0,
        }
    }
}

impl Default for DailySession {
    fn default() -> Self {
        Self {
            date: None,
            duration_seconds: 0.0,
        }
    }
}

/// The persisted aggregate: progress counters, streak state, sick period,
/// plan configuration, and accumulated session time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRecord {
    /// Consecutive qualifying days.
    pub current_streak: u32,
    /// Lifetime completed-session count.
    pub total_trainings: u32,
    /// Date of the most recent logged session.
    pub last_trained_date: Option<NaiveDate>,
    /// Date the daily check last ran; drives gap detection.
    pub last_active_date: Option<NaiveDate>,
    /// Inclusive end date of an active rest period.
    pub sick_until_date: Option<NaiveDate>,
    /// Weekdays the user intends to train on.
    pub planned_days: WeekdaySet,
    /// Free-form plan text, opaque to the engine.
    pub training_plan_text: String,
    /// Presentation flag, passed through unchanged.
    pub show_edit_guide_button: bool,
    /// Whether the record must be encrypted on the next save.
    pub encrypt_save_file: bool,
    /// Lifetime accumulated session time.
    pub total_training_duration_seconds: f64,
    /// Today's running duration total.
    pub daily_session_info: DailySession,
}

impl TrackerRecord {
    /// Default record for a fresh installation: zero counters and a
    /// Monday-Friday plan.
    pub fn with_defaults(plan_text: impl Into<String>) -> Self {
        Self {
            current_streak: 0,
            total_trainings: 0,
            last_trained_date: None,
            last_active_date: None,
            sick_until_date: None,
            planned_days: (0u8..5).collect(),
            training_plan_text: plan_text.into(),
            show_edit_guide_button: true,
            encrypt_save_file: false,
            total_training_duration_seconds: 0.0,
            daily_session_info: DailySession::default(),
        }
    }

    /// Whether `date` falls on a planned training day.
    pub fn is_planned(&self, date: NaiveDate) -> bool {
        self.planned_days
            .contains(&(date.weekday().num_days_from_monday() as u8))
    }

    /// Whether the most recent session was logged on `date`.
    pub fn trained_on(&self, date: NaiveDate) -> bool {
        self.last_trained_date == Some(date)
    }

    /// Mean session length over the lifetime of the record.
    pub fn average_session_seconds(&self) -> f64 {
        if self.total_trainings == 0 {
            0.0
        } else {
            self.total_training_duration_seconds / f64::from(self.total_trainings)
        }
    }
}

impl Default for TrackerRecord {
    fn default() -> Self {
        Self::with_defaults(crate::settings::DEFAULT_TRAINING_PLAN)
    }
}
