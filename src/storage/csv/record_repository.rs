//! CSV daily-record repository.

use anyhow::Result;
use chrono::Datelike;
use csv::StringRecord;
use log::warn;

use crate::domain::models::{AnomalyTag, DailyRecord, ScheduleModel};
use crate::storage::traits::RecordStorage;

use super::connection::CsvConnection;

const FILE: &str = "daily_records.csv";
const HEADER: &[&str] = &[
    "id",
    "employee_id",
    "date",
    "schedule_model",
    "expected_minutes",
    "worked_minutes",
    "delay_minutes",
    "overtime_minutes",
    "shortfall_minutes",
    "is_absence",
    "is_rest_day",
    "is_holiday",
    "punch_count",
    "tags",
];

#[derive(Clone)]
pub struct RecordRepository {
    connection: CsvConnection,
}

impl RecordRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }
}

fn parse_row(row: &StringRecord) -> Option<DailyRecord> {
    Some(DailyRecord {
        id: row.get(0)?.to_string(),
        employee_id: row.get(1)?.to_string(),
        date: row.get(2)?.parse().ok()?,
        schedule_model: ScheduleModel::parse(row.get(3).unwrap_or("")),
        expected_minutes: row.get(4).unwrap_or("0").parse().unwrap_or(0),
        worked_minutes: row.get(5).unwrap_or("0").parse().unwrap_or(0),
        delay_minutes: row.get(6).unwrap_or("0").parse().unwrap_or(0),
        overtime_minutes: row.get(7).unwrap_or("0").parse().unwrap_or(0),
        shortfall_minutes: row.get(8).unwrap_or("0").parse().unwrap_or(0),
        is_absence: row.get(9).unwrap_or("false") == "true",
        is_rest_day: row.get(10).unwrap_or("false") == "true",
        is_holiday: row.get(11).unwrap_or("false") == "true",
        punch_count: row.get(12).unwrap_or("0").parse().unwrap_or(0),
        tags: row
            .get(13)
            .unwrap_or("")
            .split(';')
            .filter_map(AnomalyTag::parse)
            .collect(),
    })
}

fn to_row(record: &DailyRecord) -> Vec<String> {
    vec![
        record.id.clone(),
        record.employee_id.clone(),
        record.date.to_string(),
        record.schedule_model.as_str().to_string(),
        record.expected_minutes.to_string(),
        record.worked_minutes.to_string(),
        record.delay_minutes.to_string(),
        record.overtime_minutes.to_string(),
        record.shortfall_minutes.to_string(),
        record.is_absence.to_string(),
        record.is_rest_day.to_string(),
        record.is_holiday.to_string(),
        record.punch_count.to_string(),
        record
            .tags
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(";"),
    ]
}

impl RecordStorage for RecordRepository {
    fn replace_daily_records(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
        records: &[DailyRecord],
    ) -> Result<()> {
        let _guard = self.connection.write_guard();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for row in self.connection.read_rows(FILE, HEADER)? {
            match parse_row(&row) {
                Some(r)
                    if r.employee_id == employee_id
                        && r.date.year() == year
                        && r.date.month() == month => {}
                Some(_) => rows.push(row.iter().map(str::to_string).collect()),
                None => warn!("dropping malformed daily record row: {:?}", row),
            }
        }
        rows.extend(records.iter().map(to_row));
        self.connection.write_rows(FILE, HEADER, &rows)
    }

    fn list_daily_records(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<DailyRecord>> {
        let mut records: Vec<DailyRecord> = self
            .connection
            .read_rows(FILE, HEADER)?
            .iter()
            .filter_map(parse_row)
            .filter(|r| {
                r.employee_id == employee_id && r.date.year() == year && r.date.month() == month
            })
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}
