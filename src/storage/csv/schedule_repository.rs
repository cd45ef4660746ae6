//! CSV schedule repository.
//!
//! Two files: `schedules.csv` for the template itself and
//! `schedule_days.csv` for the fixed-weekly weekday rows, joined by
//! template id.

use anyhow::Result;
use chrono::{NaiveTime, Weekday};
use csv::StringRecord;
use log::warn;

use crate::domain::models::{ScheduleModel, ScheduleTemplate, WeekdayHours};
use crate::storage::traits::ScheduleStorage;

use super::connection::CsvConnection;

const TEMPLATES_FILE: &str = "schedules.csv";
const TEMPLATES_HEADER: &[&str] = &[
    "id",
    "employee_id",
    "model",
    "daily_minutes",
    "entry_tolerance",
    "exit_tolerance",
    "has_paid_break",
    "break_minutes",
    "work_hours",
    "rest_hours",
];

const DAYS_FILE: &str = "schedule_days.csv";
const DAYS_HEADER: &[&str] = &[
    "template_id",
    "weekday",
    "entry_1",
    "exit_1",
    "entry_2",
    "exit_2",
    "rest",
];

#[derive(Clone)]
pub struct ScheduleRepository {
    connection: CsvConnection,
}

impl ScheduleRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }
}

fn parse_template(row: &StringRecord) -> Option<ScheduleTemplate> {
    Some(ScheduleTemplate {
        id: row.get(0)?.to_string(),
        employee_id: row.get(1)?.to_string(),
        model: ScheduleModel::parse(row.get(2).unwrap_or("")),
        daily_minutes: row.get(3).unwrap_or("0").parse().unwrap_or(0),
        entry_tolerance_minutes: row.get(4).unwrap_or("0").parse().unwrap_or(0),
        exit_tolerance_minutes: row.get(5).unwrap_or("0").parse().unwrap_or(0),
        has_paid_break: row.get(6).unwrap_or("false") == "true",
        break_minutes: row.get(7).unwrap_or("0").parse().unwrap_or(0),
        work_hours: parse_optional_i64(row.get(8)),
        rest_hours: parse_optional_i64(row.get(9)),
        weekdays: Vec::new(),
    })
}

fn parse_day(row: &StringRecord) -> Option<(String, WeekdayHours)> {
    let template_id = row.get(0)?.to_string();
    let weekday: Weekday = row.get(1)?.parse().ok()?;
    Some((
        template_id,
        WeekdayHours {
            weekday,
            entry_1: parse_optional_time(row.get(2)),
            exit_1: parse_optional_time(row.get(3)),
            entry_2: parse_optional_time(row.get(4)),
            exit_2: parse_optional_time(row.get(5)),
            rest: row.get(6).unwrap_or("false") == "true",
        },
    ))
}

fn parse_optional_i64(field: Option<&str>) -> Option<i64> {
    match field {
        Some("") | None => None,
        Some(value) => value.parse().ok(),
    }
}

fn parse_optional_time(field: Option<&str>) -> Option<NaiveTime> {
    match field {
        Some("") | None => None,
        Some(value) => NaiveTime::parse_from_str(value, "%H:%M:%S").ok(),
    }
}

fn format_optional_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M:%S").to_string()).unwrap_or_default()
}

impl ScheduleStorage for ScheduleRepository {
    fn get_template(&self, employee_id: &str) -> Result<Option<ScheduleTemplate>> {
        let rows = self.connection.read_rows(TEMPLATES_FILE, TEMPLATES_HEADER)?;
        let mut template = None;
        for row in rows {
            match parse_template(&row) {
                Some(t) if t.employee_id == employee_id => {
                    template = Some(t);
                }
                Some(_) => {}
                None => warn!("skipping malformed schedule row: {:?}", row),
            }
        }
        let Some(mut template) = template else {
            return Ok(None);
        };

        for row in self.connection.read_rows(DAYS_FILE, DAYS_HEADER)? {
            if let Some((template_id, day)) = parse_day(&row) {
                if template_id == template.id {
                    template.weekdays.push(day);
                }
            }
        }
        Ok(Some(template))
    }

    fn store_template(&self, template: &ScheduleTemplate) -> Result<()> {
        // One template per employee: replace any previous assignment and
        // its weekday rows.
        let _guard = self.connection.write_guard();
        let mut templates: Vec<Vec<String>> = Vec::new();
        let mut replaced_ids = Vec::new();
        for row in self.connection.read_rows(TEMPLATES_FILE, TEMPLATES_HEADER)? {
            match parse_template(&row) {
                Some(t) if t.employee_id == template.employee_id => replaced_ids.push(t.id),
                _ => templates.push(row.iter().map(str::to_string).collect()),
            }
        }
        templates.push(vec![
            template.id.clone(),
            template.employee_id.clone(),
            template.model.as_str().to_string(),
            template.daily_minutes.to_string(),
            template.entry_tolerance_minutes.to_string(),
            template.exit_tolerance_minutes.to_string(),
            template.has_paid_break.to_string(),
            template.break_minutes.to_string(),
            template.work_hours.map(|h| h.to_string()).unwrap_or_default(),
            template.rest_hours.map(|h| h.to_string()).unwrap_or_default(),
        ]);
        self.connection
            .write_rows(TEMPLATES_FILE, TEMPLATES_HEADER, &templates)?;

        let mut days: Vec<Vec<String>> = Vec::new();
        for row in self.connection.read_rows(DAYS_FILE, DAYS_HEADER)? {
            let keep = match row.get(0) {
                Some(id) => id != template.id && !replaced_ids.iter().any(|r| r.as_str() == id),
                None => false,
            };
            if keep {
                days.push(row.iter().map(str::to_string).collect());
            }
        }
        for day in &template.weekdays {
            days.push(vec![
                template.id.clone(),
                day.weekday.to_string(),
                format_optional_time(day.entry_1),
                format_optional_time(day.exit_1),
                format_optional_time(day.entry_2),
                format_optional_time(day.exit_2),
                day.rest.to_string(),
            ]);
        }
        self.connection.write_rows(DAYS_FILE, DAYS_HEADER, &days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::Connection;
    use tempfile::tempdir;

    fn template(employee: &str, id: &str) -> ScheduleTemplate {
        ScheduleTemplate {
            id: id.to_string(),
            employee_id: employee.to_string(),
            model: ScheduleModel::FixedWeekly,
            daily_minutes: 480,
            entry_tolerance_minutes: 10,
            exit_tolerance_minutes: 10,
            has_paid_break: true,
            break_minutes: 60,
            work_hours: None,
            rest_hours: None,
            weekdays: vec![WeekdayHours {
                weekday: Weekday::Mon,
                entry_1: NaiveTime::from_hms_opt(8, 0, 0),
                exit_1: NaiveTime::from_hms_opt(12, 0, 0),
                entry_2: NaiveTime::from_hms_opt(13, 0, 0),
                exit_2: NaiveTime::from_hms_opt(17, 0, 0),
                rest: false,
            }],
        }
    }

    #[test]
    fn template_round_trips_with_weekday_rows() {
        let dir = tempdir().unwrap();
        let repo = CsvConnection::new(dir.path()).create_schedule_repository();
        repo.store_template(&template("emp-1", "tpl-1")).unwrap();

        let loaded = repo.get_template("emp-1").unwrap().unwrap();
        assert_eq!(loaded, template("emp-1", "tpl-1"));
        assert!(repo.get_template("emp-2").unwrap().is_none());
    }

    #[test]
    fn reassignment_replaces_the_previous_template() {
        let dir = tempdir().unwrap();
        let repo = CsvConnection::new(dir.path()).create_schedule_repository();
        repo.store_template(&template("emp-1", "tpl-1")).unwrap();

        let mut updated = template("emp-1", "tpl-2");
        updated.model = ScheduleModel::RotatingShift;
        updated.work_hours = Some(12);
        updated.rest_hours = Some(36);
        updated.weekdays.clear();
        repo.store_template(&updated).unwrap();

        let loaded = repo.get_template("emp-1").unwrap().unwrap();
        assert_eq!(loaded.id, "tpl-2");
        assert_eq!(loaded.model, ScheduleModel::RotatingShift);
        assert!(loaded.weekdays.is_empty());
    }
}
