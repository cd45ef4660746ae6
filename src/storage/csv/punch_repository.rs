//! CSV punch repository.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use log::warn;

use crate::domain::models::{PunchDirection, PunchEvent, PunchOrigin};
use crate::storage::traits::PunchStorage;

use super::connection::CsvConnection;

const FILE: &str = "punches.csv";
const HEADER: &[&str] = &["id", "employee_id", "timestamp", "direction", "origin"];

#[derive(Clone)]
pub struct PunchRepository {
    connection: CsvConnection,
}

impl PunchRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_all(&self) -> Result<Vec<PunchEvent>> {
        let rows = self.connection.read_rows(FILE, HEADER)?;
        let mut punches = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_row(&row) {
                Some(punch) => punches.push(punch),
                None => warn!("skipping malformed punch row: {:?}", row),
            }
        }
        Ok(punches)
    }

    fn write_all(&self, punches: &[PunchEvent]) -> Result<()> {
        let rows: Vec<Vec<String>> = punches.iter().map(to_row).collect();
        self.connection.write_rows(FILE, HEADER, &rows)
    }
}

fn parse_row(row: &StringRecord) -> Option<PunchEvent> {
    let timestamp = DateTime::parse_from_rfc3339(row.get(2)?)
        .ok()?
        .with_timezone(&Utc);
    Some(PunchEvent {
        id: row.get(0)?.to_string(),
        employee_id: row.get(1)?.to_string(),
        timestamp,
        direction: PunchDirection::parse(row.get(3).unwrap_or("")),
        origin: PunchOrigin::parse(row.get(4).unwrap_or("")),
    })
}

fn to_row(punch: &PunchEvent) -> Vec<String> {
    vec![
        punch.id.clone(),
        punch.employee_id.clone(),
        punch.timestamp.to_rfc3339(),
        punch.direction.as_str().to_string(),
        punch.origin.as_str().to_string(),
    ]
}

impl PunchStorage for PunchRepository {
    fn list_punches(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PunchEvent>> {
        let offset = self.connection.reporting_offset();
        let mut punches: Vec<PunchEvent> = self
            .read_all()?
            .into_iter()
            .filter(|p| p.employee_id == employee_id)
            .filter(|p| {
                let date = p.reporting_date(offset);
                date >= from && date <= to
            })
            .collect();
        punches.sort_by_key(|p| p.timestamp);
        Ok(punches)
    }

    fn punches_on_date(&self, employee_id: &str, date: NaiveDate) -> Result<Vec<PunchEvent>> {
        self.list_punches(employee_id, date, date)
    }

    fn latest_punch_before(
        &self,
        employee_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<Option<PunchEvent>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|p| p.employee_id == employee_id && p.timestamp < instant)
            .max_by_key(|p| p.timestamp))
    }

    fn get_punch(&self, punch_id: &str) -> Result<Option<PunchEvent>> {
        Ok(self.read_all()?.into_iter().find(|p| p.id == punch_id))
    }

    fn store_punch(&self, punch: &PunchEvent) -> Result<()> {
        let _guard = self.connection.write_guard();
        self.connection.append_row(FILE, HEADER, &to_row(punch))
    }

    fn delete_punch(&self, punch_id: &str) -> Result<Option<PunchEvent>> {
        let _guard = self.connection.write_guard();
        let mut punches = self.read_all()?;
        let position = punches.iter().position(|p| p.id == punch_id);
        match position {
            Some(index) => {
                let removed = punches.remove(index);
                self.write_all(&punches)?;
                Ok(Some(removed))
            }
            None => Ok(None),
        }
    }
}
