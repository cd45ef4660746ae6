//! Domain error taxonomy.
//!
//! Storage failures arrive as `anyhow::Error` from the repository layer and
//! are wrapped here; everything else is a business rule with enough data in
//! the variant to report on without string parsing.

use thiserror::Error;

use super::models::TimesheetStatus;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("period {month:02}/{year} is locked by an approved timesheet")]
    PeriodLocked { year: i32, month: u32 },

    #[error(
        "accumulation limit exceeded: balance {current} + change would reach {would_be}, \
         allowed range is -{negative_cap}..={positive_cap} minutes"
    )]
    AccumulationLimitExceeded {
        current: i64,
        would_be: i64,
        positive_cap: i64,
        negative_cap: i64,
    },

    #[error("insufficient balance: have {available} minutes, tried to compensate {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("duplicate ledger entry for employee {employee_id} on {date}")]
    DuplicateLedgerEntry { employee_id: String, date: chrono::NaiveDate },

    #[error("hour bank is disabled")]
    LedgerDisabled,

    #[error("timesheet is {status:?}, cannot {action}")]
    InvalidTransition {
        status: TimesheetStatus,
        action: &'static str,
    },

    #[error("timesheet not found for employee {employee_id} in {month:02}/{year}")]
    TimesheetNotFound {
        employee_id: String,
        year: i32,
        month: u32,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
