//! Streak and daily-reset decision logic.

pub mod engine;

pub use engine::{
    is_currently_sick, log_completion, mark_sick, reconcile_daily, CompletionReport, DailyReport,
    SickRefusal,
};
