//! Engine-wide configuration.
//!
//! One deployment serves one company, so the reporting offset and closing
//! policy live here rather than per employee. Values unset fall back to
//! defaults chosen for a UTC-03:00 deployment with an 8-hour standard day.

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reporting zone as a fixed offset from UTC, in minutes. All calendar
    /// grouping of punches happens in this offset.
    pub reporting_offset_minutes: i32,
    /// Expected minutes per working day when an employee has no template.
    pub default_daily_minutes: i64,
    /// Entry/exit tolerance when an employee has no template.
    pub default_tolerance_minutes: i64,
    /// Day of month (1..=28) on which periods close; None closes on the
    /// last calendar day.
    pub closing_day: Option<u32>,
    /// Dates before this are neutralized during reconciliation.
    pub system_start_date: Option<NaiveDate>,
    /// Worker threads for batch reconciliation.
    pub batch_concurrency: usize,
    /// Grace past the expected exit before the live monitor flags an
    /// overdue checkout.
    pub monitor_checkout_tolerance_minutes: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            reporting_offset_minutes: -180,
            default_daily_minutes: 480,
            default_tolerance_minutes: 10,
            closing_day: None,
            system_start_date: None,
            batch_concurrency: 4,
            monitor_checkout_tolerance_minutes: 60,
        }
    }
}

impl EngineConfig {
    /// The reporting offset as a chrono `FixedOffset`.
    pub fn reporting_offset(&self) -> FixedOffset {
        // The default is always in range; a hand-built config with an
        // out-of-range offset falls back to UTC rather than panicking.
        FixedOffset::east_opt(self.reporting_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// Clamp the closing day into the supported 1..=28 window.
    pub fn effective_closing_day(&self) -> Option<u32> {
        self.closing_day.map(|d| d.clamp(1, 28))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_offset_is_utc_minus_three() {
        let config = EngineConfig::default();
        assert_eq!(config.reporting_offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn closing_day_is_clamped() {
        let config = EngineConfig {
            closing_day: Some(31),
            ..EngineConfig::default()
        };
        assert_eq!(config.effective_closing_day(), Some(28));
    }
}
