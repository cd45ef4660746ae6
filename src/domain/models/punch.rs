//! Domain model for a clock punch.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Declared direction of a punch. Unreliable across manual corrections, so
/// worked-time pairing is positional and never consults this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunchDirection {
    In,
    Out,
    /// Direction was not captured; inferred by parity where needed.
    Unknown,
}

impl PunchDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchDirection::In => "IN",
            PunchDirection::Out => "OUT",
            PunchDirection::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "IN" => PunchDirection::In,
            "OUT" => PunchDirection::Out,
            _ => PunchDirection::Unknown,
        }
    }
}

/// Where a punch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunchOrigin {
    Device,
    Manual,
}

impl PunchOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchOrigin::Device => "DEVICE",
            PunchOrigin::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "MANUAL" => PunchOrigin::Manual,
            _ => PunchOrigin::Device,
        }
    }
}

/// A single immutable clock-in/out event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchEvent {
    pub id: String,
    pub employee_id: String,
    /// Absolute instant. Calendar grouping happens in the reporting offset,
    /// never in whatever zone the capturing device ran in.
    pub timestamp: DateTime<Utc>,
    pub direction: PunchDirection,
    pub origin: PunchOrigin,
}

impl PunchEvent {
    /// Calendar date of this punch in the given reporting offset.
    pub fn reporting_date(&self, offset: FixedOffset) -> NaiveDate {
        self.timestamp.with_timezone(&offset).date_naive()
    }
}
