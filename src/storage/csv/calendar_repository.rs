//! CSV calendar repository: holidays and per-employee day overrides.

use anyhow::Result;
use chrono::NaiveDate;
use csv::StringRecord;
use log::warn;

use crate::domain::models::{DayOverride, DayOverrideKind, Holiday};
use crate::storage::traits::CalendarStorage;

use super::connection::CsvConnection;

const HOLIDAYS_FILE: &str = "holidays.csv";
const HOLIDAYS_HEADER: &[&str] = &["id", "date", "name", "recurring"];

const OVERRIDES_FILE: &str = "overrides.csv";
const OVERRIDES_HEADER: &[&str] = &["id", "employee_id", "date", "kind", "reason"];

#[derive(Clone)]
pub struct CalendarRepository {
    connection: CsvConnection,
}

impl CalendarRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }
}

fn parse_holiday(row: &StringRecord) -> Option<Holiday> {
    Some(Holiday {
        id: row.get(0)?.to_string(),
        date: row.get(1)?.parse().ok()?,
        name: row.get(2).unwrap_or("").to_string(),
        recurring: row.get(3).unwrap_or("false") == "true",
    })
}

fn parse_override(row: &StringRecord) -> Option<DayOverride> {
    let reason = row.get(4).unwrap_or("");
    Some(DayOverride {
        id: row.get(0)?.to_string(),
        employee_id: row.get(1)?.to_string(),
        date: row.get(2)?.parse().ok()?,
        kind: DayOverrideKind::parse(row.get(3).unwrap_or("")),
        reason: if reason.is_empty() {
            None
        } else {
            Some(reason.to_string())
        },
    })
}

impl CalendarStorage for CalendarRepository {
    fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Holiday>> {
        let rows = self.connection.read_rows(HOLIDAYS_FILE, HOLIDAYS_HEADER)?;
        let mut holidays = Vec::new();
        for row in rows {
            match parse_holiday(&row) {
                Some(holiday) => {
                    // Recurring holidays are matched against every date of
                    // the window, fixed ones against their exact date.
                    let mut date = from;
                    let effective = loop {
                        if date > to {
                            break false;
                        }
                        if holiday.matches(date) {
                            break true;
                        }
                        date = match date.succ_opt() {
                            Some(next) => next,
                            None => break false,
                        };
                    };
                    if effective {
                        holidays.push(holiday);
                    }
                }
                None => warn!("skipping malformed holiday row: {:?}", row),
            }
        }
        Ok(holidays)
    }

    fn store_holiday(&self, holiday: &Holiday) -> Result<()> {
        let _guard = self.connection.write_guard();
        self.connection.append_row(
            HOLIDAYS_FILE,
            HOLIDAYS_HEADER,
            &[
                holiday.id.clone(),
                holiday.date.to_string(),
                holiday.name.clone(),
                holiday.recurring.to_string(),
            ],
        )
    }

    fn list_overrides(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayOverride>> {
        let rows = self.connection.read_rows(OVERRIDES_FILE, OVERRIDES_HEADER)?;
        let mut overrides = Vec::new();
        for row in rows {
            match parse_override(&row) {
                Some(o) if o.employee_id == employee_id && o.date >= from && o.date <= to => {
                    overrides.push(o);
                }
                Some(_) => {}
                None => warn!("skipping malformed override row: {:?}", row),
            }
        }
        Ok(overrides)
    }

    fn store_override(&self, day_override: &DayOverride) -> Result<()> {
        let _guard = self.connection.write_guard();
        self.connection.append_row(
            OVERRIDES_FILE,
            OVERRIDES_HEADER,
            &[
                day_override.id.clone(),
                day_override.employee_id.clone(),
                day_override.date.to_string(),
                day_override.kind.as_str().to_string(),
                day_override.reason.clone().unwrap_or_default(),
            ],
        )
    }
}
