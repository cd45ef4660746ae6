//! Hour-bank ledger entries and policy configuration.
//!
//! Every entry freezes the balance before and after it so the ledger reads
//! as an audit trail: historical balances never shift when later entries
//! are added or removed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Operation kinds, each with a fixed balance sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOperation {
    /// Adds minutes (overtime).
    Credit,
    /// Subtracts minutes (shortfall).
    Debit,
    /// Subtracts minutes (employee spent banked time).
    Compensation,
    /// Signed correction; positive adds, negative subtracts.
    Adjustment,
}

impl LedgerOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOperation::Credit => "CREDIT",
            LedgerOperation::Debit => "DEBIT",
            LedgerOperation::Compensation => "COMPENSATION",
            LedgerOperation::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "CREDIT" => LedgerOperation::Credit,
            "COMPENSATION" => LedgerOperation::Compensation,
            "ADJUSTMENT" => LedgerOperation::Adjustment,
            _ => LedgerOperation::Debit,
        }
    }

    /// The signed effect of `minutes` for this operation.
    pub fn signed(&self, minutes: i64) -> i64 {
        match self {
            LedgerOperation::Credit => minutes.abs(),
            LedgerOperation::Debit | LedgerOperation::Compensation => -minutes.abs(),
            LedgerOperation::Adjustment => minutes,
        }
    }
}

/// Whether an entry came from a person or from an approved timesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOrigin {
    Manual,
    Timesheet,
}

impl LedgerOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOrigin::Manual => "MANUAL",
            LedgerOrigin::Timesheet => "TIMESHEET",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "TIMESHEET" => LedgerOrigin::Timesheet,
            _ => LedgerOrigin::Manual,
        }
    }
}

/// One immutable hour-bank posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub employee_id: String,
    /// The worked date the posting refers to, not the posting instant.
    pub date: NaiveDate,
    pub operation: LedgerOperation,
    /// Magnitude in minutes; sign comes from the operation (adjustments
    /// carry their own sign here).
    pub minutes: i64,
    pub origin: LedgerOrigin,
    pub reason: Option<String>,
    pub balance_before: i64,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// Hour-bank policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub enabled: bool,
    /// Maximum banked balance in minutes (40h default).
    pub positive_cap_minutes: i64,
    /// Maximum debt in minutes, stored positive (10h default).
    pub negative_cap_minutes: i64,
    /// Apply the premium multiplier when crediting overtime from approvals.
    pub convert_overtime_premium: bool,
    /// Percentage applied to credited overtime when conversion is on; 100
    /// means no change, 150 banks time-and-a-half.
    pub premium_multiplier_pct: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            enabled: true,
            positive_cap_minutes: 2400,
            negative_cap_minutes: 600,
            convert_overtime_premium: false,
            premium_multiplier_pct: 100,
        }
    }
}
