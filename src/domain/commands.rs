//! Command and query structs for the service entry points.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::models::{LedgerOperation, PunchDirection};

/// Manually register a punch on behalf of an employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordManualPunchCommand {
    pub employee_id: String,
    pub timestamp: DateTime<Utc>,
    pub direction: PunchDirection,
}

/// Reconcile one employee's month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeTimesheetQuery {
    pub employee_id: String,
    pub year: i32,
    pub month: u32,
    /// Treat this date as "today" so future dates are never computed.
    /// `None` uses the current date in the reporting offset.
    pub as_of: Option<NaiveDate>,
}

/// Reconcile several employees' months in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeBatchQuery {
    pub employee_ids: Vec<String>,
    pub year: i32,
    pub month: u32,
    pub as_of: Option<NaiveDate>,
}

/// Outcome of one employee inside a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub employee_id: String,
    pub ok: bool,
    pub message: Option<String>,
}

/// Timesheet lifecycle transition (close, approve, reopen).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimesheetTransitionCommand {
    pub employee_id: String,
    pub year: i32,
    pub month: u32,
    pub actor: Option<String>,
}

/// Reject an approved timesheet back to open, with the reviewer's reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectTimesheetCommand {
    pub employee_id: String,
    pub year: i32,
    pub month: u32,
    pub actor: Option<String>,
    pub reason: String,
}

/// Post a manual hour-bank entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostLedgerEntryCommand {
    pub employee_id: String,
    pub date: NaiveDate,
    pub operation: LedgerOperation,
    /// Magnitude in minutes; adjustments may be negative.
    pub minutes: i64,
    pub reason: Option<String>,
}

/// Spend banked minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensateCommand {
    pub employee_id: String,
    pub date: NaiveDate,
    pub minutes: i64,
    pub reason: Option<String>,
}
