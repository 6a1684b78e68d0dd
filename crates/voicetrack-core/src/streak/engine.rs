//! Calendar-driven streak evaluation.
//!
//! Everything here is pure over `(record, today)`: no I/O, no clock reads.
//! Each operation mutates the record in place and returns a report whose
//! `changed` flag tells the caller whether to persist.
//!
//! ## Rules
//!
//! - A streak survives a gap as long as no *planned* weekday in the gap
//!   went untrained.
//! - A sick period excuses the planned days it covers, end date inclusive.
//! - Completing a session ends any rest period on the spot.

use chrono::{Days, NaiveDate};
use thiserror::Error;
use tracing::{debug, info};

use crate::record::{DailySession, TrackerRecord};

/// What [`reconcile_daily`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyReport {
    /// Any durable field changed; the record needs saving.
    pub changed: bool,
    /// The streak was broken by an unexcused missed planned day.
    pub streak_reset: bool,
    /// An elapsed sick period was cleared.
    pub sick_period_expired: bool,
    /// The daily session counter rolled over to a new day.
    pub daily_session_rolled: bool,
}

/// What [`log_completion`] changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionReport {
    /// Any durable field changed; the record needs saving.
    pub changed: bool,
    /// The streak value went up (feedback signal for the caller).
    pub streak_increased: bool,
    /// This was the first completion logged for `today`.
    pub first_completion_of_day: bool,
    /// Streak value after the operation.
    pub streak: u32,
}

/// Why a sick request was refused. Refusals are no-ops, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SickRefusal {
    #[error("a session was already logged today")]
    AlreadyTrainedToday,
    #[error("a sick period is already active")]
    AlreadySick,
    #[error("sick period must cover at least one day")]
    EmptyPeriod,
    #[error("sick period end date is out of range")]
    PeriodOutOfRange,
}

/// Once-per-day reconciliation: expire the sick period, roll the daily
/// session, scan the inactivity gap for missed planned days, and stamp
/// `last_active_date`.
///
/// Must run once at startup and once per calendar-day boundary, before any
/// other operation. Calling it again with the same `today` changes nothing.
pub fn reconcile_daily(record: &mut TrackerRecord, today: NaiveDate) -> DailyReport {
    let mut report = DailyReport::default();

    // Remember the period before expiring it: an already-ended sick period
    // still excuses the gap days it covered.
    let sick_until = record.sick_until_date;
    if let Some(until) = sick_until {
        if today > until {
            record.sick_until_date = None;
            report.sick_period_expired = true;
            report.changed = true;
            info!(%until, "sick period ended");
        }
    }

    if record.daily_session_info.date != Some(today) {
        record.daily_session_info = DailySession::for_day(today);
        report.daily_session_rolled = true;
        report.changed = true;
    }

    if let Some(last_active) = record.last_active_date {
        if last_active != today {
            if let Some(missed) = first_unexcused_miss(record, last_active, sick_until, today) {
                if record.current_streak > 0 {
                    info!(%missed, "missed planned day broke the streak");
                    record.current_streak = 0;
                    report.streak_reset = true;
                    report.changed = true;
                }
            }
        }
    }

    if record.last_active_date != Some(today) {
        record.last_active_date = Some(today);
        report.changed = true;
    }

    report
}

/// First day in `(last_active, today)` that was planned and never trained
/// on or afterwards. A sick period whose end lies inside the gap excuses
/// everything through its end date; scanning resumes the day after.
fn first_unexcused_miss(
    record: &TrackerRecord,
    last_active: NaiveDate,
    sick_until: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let mut day = last_active.succ_opt()?;
    if let Some(until) = sick_until {
        if until >= last_active && until < today {
            day = until.succ_opt()?;
        }
    }
    while day < today {
        let trained_on_or_after = record.last_trained_date.is_some_and(|t| t >= day);
        if record.is_planned(day) && !trained_on_or_after {
            return Some(day);
        }
        day = day.succ_opt()?;
    }
    None
}

/// Fold a completed session of `duration_seconds` into the record.
///
/// Negative or non-finite durations count as zero. Repeat completions on
/// the same day only accumulate time; counters and streak move once per
/// day.
pub fn log_completion(
    record: &mut TrackerRecord,
    today: NaiveDate,
    duration_seconds: f64,
) -> CompletionReport {
    let mut changed = false;

    if record.sick_until_date.is_some() {
        // Completing a session ends any rest period.
        record.sick_until_date = None;
        changed = true;
    }

    let duration_seconds = if duration_seconds.is_finite() && duration_seconds > 0.0 {
        duration_seconds
    } else {
        0.0
    };
    if duration_seconds > 0.0 {
        if record.daily_session_info.date != Some(today) {
            record.daily_session_info = DailySession::for_day(today);
        }
        record.daily_session_info.duration_seconds += duration_seconds;
        record.total_training_duration_seconds += duration_seconds;
        changed = true;
    }

    let first_completion_of_day = !record.trained_on(today);
    let mut streak_increased = false;
    if first_completion_of_day {
        let previous = record.current_streak;
        record.total_trainings += 1;

        let yesterday = today.pred_opt();
        record.current_streak = match record.last_trained_date {
            Some(last) if Some(last) == yesterday => previous + 1,
            None if previous == 0 => 1,
            Some(last) => {
                if planned_day_between(record, last, today) {
                    debug!("planned day missed since last training, streak restarts");
                    1
                } else {
                    previous + 1
                }
            }
            None => 1,
        };

        streak_increased =
            record.current_streak > previous || (record.current_streak == 1 && previous == 0);
        record.last_trained_date = Some(today);
        changed = true;
        info!(
            streak = record.current_streak,
            total = record.total_trainings,
            "training logged"
        );
    }

    if record.last_active_date != Some(today) {
        record.last_active_date = Some(today);
        changed = true;
    }

    CompletionReport {
        changed,
        streak_increased,
        first_completion_of_day,
        streak: record.current_streak,
    }
}

/// Any planned day strictly between `last_trained` and `today`.
fn planned_day_between(record: &TrackerRecord, last_trained: NaiveDate, today: NaiveDate) -> bool {
    let mut day = match last_trained.succ_opt() {
        Some(day) => day,
        None => return false,
    };
    while day < today {
        if record.is_planned(day) {
            return true;
        }
        day = match day.succ_opt() {
            Some(day) => day,
            None => return false,
        };
    }
    false
}

/// Start a rest period covering `today` through `today + days - 1`.
///
/// Refused when a session was already logged today, a sick period is
/// already running, or `days` is zero.
pub fn mark_sick(
    record: &mut TrackerRecord,
    today: NaiveDate,
    days: u32,
) -> Result<NaiveDate, SickRefusal> {
    if days == 0 {
        return Err(SickRefusal::EmptyPeriod);
    }
    if record.trained_on(today) {
        return Err(SickRefusal::AlreadyTrainedToday);
    }
    if is_currently_sick(record, today) {
        return Err(SickRefusal::AlreadySick);
    }
    let until = today
        .checked_add_days(Days::new(u64::from(days) - 1))
        .ok_or(SickRefusal::PeriodOutOfRange)?;
    record.sick_until_date = Some(until);
    record.last_active_date = Some(today);
    info!(%until, "rest period started");
    Ok(until)
}

/// Whether `today` falls inside the stored rest period.
pub fn is_currently_sick(record: &TrackerRecord, today: NaiveDate) -> bool {
    record.sick_until_date.is_some_and(|until| today <= until)
}
