//! Punch aggregation and guarded manual corrections.
//!
//! Grouping happens in the deployment's reporting offset so a device that
//! stored UTC instants and one that stored local wall time land on the same
//! calendar day. Pairing for worked time is strictly positional; declared
//! direction is display metadata only.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono::Datelike;
use log::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::commands::RecordManualPunchCommand;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{PunchEvent, PunchOrigin, TimesheetStatus};
use crate::storage::traits::{Connection, PunchStorage, TimesheetStorage};

/// Sum of positional pair durations, rounded to the nearest minute per
/// pair. A trailing unpaired punch contributes nothing.
pub fn worked_minutes(punches: &[PunchEvent]) -> i64 {
    punches
        .chunks_exact(2)
        .map(|pair| {
            let seconds = (pair[1].timestamp - pair[0].timestamp).num_seconds();
            (seconds + 30) / 60
        })
        .sum()
}

pub struct PunchService<C: Connection> {
    punch_repo: C::PunchRepository,
    timesheet_repo: C::TimesheetRepository,
    config: EngineConfig,
}

impl<C: Connection> PunchService<C> {
    pub fn new(connection: &C, config: EngineConfig) -> Self {
        PunchService {
            punch_repo: connection.create_punch_repository(),
            timesheet_repo: connection.create_timesheet_repository(),
            config,
        }
    }

    /// Punches for `from..=to` grouped by reporting-offset date, each day
    /// sorted ascending by instant.
    pub fn grouped(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<BTreeMap<NaiveDate, Vec<PunchEvent>>> {
        let offset = self.config.reporting_offset();
        let punches = self.punch_repo.list_punches(employee_id, from, to)?;
        let mut days: BTreeMap<NaiveDate, Vec<PunchEvent>> = BTreeMap::new();
        for punch in punches {
            days.entry(punch.reporting_date(offset)).or_default().push(punch);
        }
        for day in days.values_mut() {
            day.sort_by_key(|p| p.timestamp);
        }
        Ok(days)
    }

    /// One day's punches, sorted ascending.
    pub fn on_date(&self, employee_id: &str, date: NaiveDate) -> EngineResult<Vec<PunchEvent>> {
        let mut punches = self.punch_repo.punches_on_date(employee_id, date)?;
        punches.sort_by_key(|p| p.timestamp);
        Ok(punches)
    }

    /// Register a punch by hand, refused when the target month is already
    /// approved.
    pub fn record_manual_punch(&self, cmd: RecordManualPunchCommand) -> EngineResult<PunchEvent> {
        let date = cmd
            .timestamp
            .with_timezone(&self.config.reporting_offset())
            .date_naive();
        self.ensure_period_open(&cmd.employee_id, date)?;

        let punch = PunchEvent {
            id: Uuid::new_v4().to_string(),
            employee_id: cmd.employee_id,
            timestamp: cmd.timestamp,
            direction: cmd.direction,
            origin: PunchOrigin::Manual,
        };
        self.punch_repo.store_punch(&punch)?;
        info!(
            "manual punch recorded for employee {} at {}",
            punch.employee_id, punch.timestamp
        );
        Ok(punch)
    }

    /// Remove a punch, refused when its month is already approved.
    pub fn delete_punch(&self, punch_id: &str) -> EngineResult<PunchEvent> {
        let punch = self
            .punch_repo
            .get_punch(punch_id)?
            .ok_or_else(|| EngineError::Validation(format!("punch {} not found", punch_id)))?;
        let date = punch.reporting_date(self.config.reporting_offset());
        self.ensure_period_open(&punch.employee_id, date)?;

        self.punch_repo.delete_punch(punch_id)?;
        info!(
            "punch {} deleted for employee {} ({})",
            punch_id, punch.employee_id, date
        );
        Ok(punch)
    }

    fn ensure_period_open(&self, employee_id: &str, date: NaiveDate) -> EngineResult<()> {
        let timesheet = self
            .timesheet_repo
            .get_timesheet(employee_id, date.year(), date.month())?;
        if let Some(sheet) = timesheet {
            if sheet.status == TimesheetStatus::Approved {
                return Err(EngineError::PeriodLocked {
                    year: date.year(),
                    month: date.month(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PunchDirection;
    use chrono::{TimeZone, Utc};

    fn punch_at(hour: u32, min: u32) -> PunchEvent {
        PunchEvent {
            id: format!("p-{}-{}", hour, min),
            employee_id: "emp-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, hour, min, 0).unwrap(),
            direction: PunchDirection::Unknown,
            origin: PunchOrigin::Device,
        }
    }

    #[test]
    fn pairing_is_positional() {
        let punches = vec![punch_at(8, 0), punch_at(12, 0), punch_at(13, 0), punch_at(17, 0)];
        assert_eq!(worked_minutes(&punches), 480);
    }

    #[test]
    fn trailing_punch_contributes_nothing() {
        let punches = vec![punch_at(8, 0), punch_at(12, 0), punch_at(13, 0)];
        assert_eq!(worked_minutes(&punches), 240);
    }

    #[test]
    fn pair_durations_round_to_nearest_minute() {
        let mut first = punch_at(8, 0);
        first.timestamp = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 40).unwrap();
        let second = punch_at(12, 0);
        // 3h 59min 20s rounds to 239 minutes.
        assert_eq!(worked_minutes(&[first, second]), 239);
    }

    #[test]
    fn empty_list_works_zero() {
        assert_eq!(worked_minutes(&[]), 0);
    }
}
