//! Monthly timesheet: lifecycle, totals and audit history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a monthly timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimesheetStatus {
    Open,
    Closed,
    Approved,
}

impl TimesheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimesheetStatus::Open => "OPEN",
            TimesheetStatus::Closed => "CLOSED",
            TimesheetStatus::Approved => "APPROVED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "CLOSED" => TimesheetStatus::Closed,
            "APPROVED" => TimesheetStatus::Approved,
            _ => TimesheetStatus::Open,
        }
    }
}

/// Aggregated monthly figures, all in whole minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimesheetTotals {
    pub days_worked: u32,
    pub expected_minutes: i64,
    pub worked_minutes: i64,
    pub overtime_minutes: i64,
    pub shortfall_minutes: i64,
    pub delay_minutes: i64,
    pub absences: u32,
    /// Post-midnight minutes of a boundary-crossing shift, owed to the next
    /// period rather than counted in this one.
    pub carry_to_next_period: i64,
}

/// One entry of a timesheet's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub previous_status: Option<TimesheetStatus>,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
}

/// A per-employee, per-month timesheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: String,
    pub employee_id: String,
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
    pub status: TimesheetStatus,
    pub totals: TimesheetTotals,
    pub history: Vec<HistoryEntry>,
    pub updated_at: DateTime<Utc>,
}

impl Timesheet {
    pub fn push_history(
        &mut self,
        action: &str,
        reason: Option<String>,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.history.push(HistoryEntry {
            action: action.to_string(),
            previous_status: Some(self.status),
            reason,
            actor,
            at,
        });
    }
}
