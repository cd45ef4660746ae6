//! CSV timesheet repository. The history log is stored as a JSON column so
//! the append-only entries survive round trips without a third file.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::StringRecord;
use log::warn;

use crate::domain::models::{HistoryEntry, Timesheet, TimesheetStatus, TimesheetTotals};
use crate::storage::traits::TimesheetStorage;

use super::connection::CsvConnection;

const FILE: &str = "timesheets.csv";
const HEADER: &[&str] = &[
    "id",
    "employee_id",
    "year",
    "month",
    "status",
    "days_worked",
    "expected_minutes",
    "worked_minutes",
    "overtime_minutes",
    "shortfall_minutes",
    "delay_minutes",
    "absences",
    "carry_to_next_period",
    "history",
    "updated_at",
];

#[derive(Clone)]
pub struct TimesheetRepository {
    connection: CsvConnection,
}

impl TimesheetRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }
}

fn parse_row(row: &StringRecord) -> Option<Timesheet> {
    let history: Vec<HistoryEntry> =
        serde_json::from_str(row.get(13).unwrap_or("[]")).unwrap_or_default();
    let updated_at = DateTime::parse_from_rfc3339(row.get(14)?)
        .ok()?
        .with_timezone(&Utc);
    Some(Timesheet {
        id: row.get(0)?.to_string(),
        employee_id: row.get(1)?.to_string(),
        year: row.get(2)?.parse().ok()?,
        month: row.get(3)?.parse().ok()?,
        status: TimesheetStatus::parse(row.get(4).unwrap_or("")),
        totals: TimesheetTotals {
            days_worked: row.get(5).unwrap_or("0").parse().unwrap_or(0),
            expected_minutes: row.get(6).unwrap_or("0").parse().unwrap_or(0),
            worked_minutes: row.get(7).unwrap_or("0").parse().unwrap_or(0),
            overtime_minutes: row.get(8).unwrap_or("0").parse().unwrap_or(0),
            shortfall_minutes: row.get(9).unwrap_or("0").parse().unwrap_or(0),
            delay_minutes: row.get(10).unwrap_or("0").parse().unwrap_or(0),
            absences: row.get(11).unwrap_or("0").parse().unwrap_or(0),
            carry_to_next_period: row.get(12).unwrap_or("0").parse().unwrap_or(0),
        },
        history,
        updated_at,
    })
}

fn to_row(sheet: &Timesheet) -> Result<Vec<String>> {
    Ok(vec![
        sheet.id.clone(),
        sheet.employee_id.clone(),
        sheet.year.to_string(),
        sheet.month.to_string(),
        sheet.status.as_str().to_string(),
        sheet.totals.days_worked.to_string(),
        sheet.totals.expected_minutes.to_string(),
        sheet.totals.worked_minutes.to_string(),
        sheet.totals.overtime_minutes.to_string(),
        sheet.totals.shortfall_minutes.to_string(),
        sheet.totals.delay_minutes.to_string(),
        sheet.totals.absences.to_string(),
        sheet.totals.carry_to_next_period.to_string(),
        serde_json::to_string(&sheet.history)?,
        sheet.updated_at.to_rfc3339(),
    ])
}

impl TimesheetStorage for TimesheetRepository {
    fn get_timesheet(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<Timesheet>> {
        for row in self.connection.read_rows(FILE, HEADER)? {
            match parse_row(&row) {
                Some(sheet)
                    if sheet.employee_id == employee_id
                        && sheet.year == year
                        && sheet.month == month =>
                {
                    return Ok(Some(sheet));
                }
                Some(_) => {}
                None => warn!("skipping malformed timesheet row: {:?}", row),
            }
        }
        Ok(None)
    }

    fn upsert_timesheet(&self, timesheet: &Timesheet) -> Result<()> {
        let _guard = self.connection.write_guard();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for row in self.connection.read_rows(FILE, HEADER)? {
            let replaces = parse_row(&row).is_some_and(|s| {
                s.employee_id == timesheet.employee_id
                    && s.year == timesheet.year
                    && s.month == timesheet.month
            });
            if !replaces {
                rows.push(row.iter().map(str::to_string).collect());
            }
        }
        rows.push(to_row(timesheet)?);
        self.connection.write_rows(FILE, HEADER, &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::Connection;
    use tempfile::tempdir;

    fn sheet(employee: &str, month: u32) -> Timesheet {
        Timesheet {
            id: format!("ts-{}-{}", employee, month),
            employee_id: employee.to_string(),
            year: 2026,
            month,
            status: TimesheetStatus::Open,
            totals: TimesheetTotals {
                days_worked: 20,
                expected_minutes: 9600,
                worked_minutes: 9500,
                overtime_minutes: 30,
                shortfall_minutes: 130,
                delay_minutes: 25,
                absences: 1,
                carry_to_next_period: 0,
            },
            history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_replaces_the_same_employee_month() {
        let dir = tempdir().unwrap();
        let repo = CsvConnection::new(dir.path()).create_timesheet_repository();

        repo.upsert_timesheet(&sheet("emp-1", 3)).unwrap();
        let mut updated = sheet("emp-1", 3);
        updated.push_history("CLOSE", None, Some("hr-1".to_string()), Utc::now());
        updated.status = TimesheetStatus::Closed;
        repo.upsert_timesheet(&updated).unwrap();
        repo.upsert_timesheet(&sheet("emp-1", 4)).unwrap();

        let loaded = repo.get_timesheet("emp-1", 2026, 3).unwrap().unwrap();
        assert_eq!(loaded.status, TimesheetStatus::Closed);
        assert_eq!(loaded.history.len(), 1);
        assert_eq!(loaded.history[0].action, "CLOSE");
        assert_eq!(
            loaded.history[0].previous_status,
            Some(TimesheetStatus::Open)
        );
        assert!(repo.get_timesheet("emp-1", 2026, 4).unwrap().is_some());
        assert!(repo.get_timesheet("emp-2", 2026, 3).unwrap().is_none());
    }
}
