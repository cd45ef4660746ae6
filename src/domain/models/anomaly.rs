//! Live-monitor anomalies.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What the monitor noticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// Still clocked in past the expected exit plus tolerance.
    CheckoutOverdue,
    /// Yesterday ended with an odd punch count.
    UnregisteredCheckout,
    /// A scheduled workday passed with no punches and no approved absence.
    UnjustifiedAbsence,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::CheckoutOverdue => "CHECKOUT_OVERDUE",
            AnomalyKind::UnregisteredCheckout => "UNREGISTERED_CHECKOUT",
            AnomalyKind::UnjustifiedAbsence => "UNJUSTIFIED_ABSENCE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CHECKOUT_OVERDUE" => Some(AnomalyKind::CheckoutOverdue),
            "UNREGISTERED_CHECKOUT" => Some(AnomalyKind::UnregisteredCheckout),
            "UNJUSTIFIED_ABSENCE" => Some(AnomalyKind::UnjustifiedAbsence),
            _ => None,
        }
    }
}

/// An open or resolved monitor finding for one employee and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub kind: AnomalyKind,
    pub detail: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}
