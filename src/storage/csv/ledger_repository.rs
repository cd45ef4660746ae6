//! CSV hour-bank repository: the append-only entry log plus the singleton
//! policy row.

use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use csv::StringRecord;
use log::warn;

use crate::domain::models::{LedgerConfig, LedgerEntry, LedgerOperation, LedgerOrigin};
use crate::storage::traits::LedgerStorage;

use super::connection::CsvConnection;

const ENTRIES_FILE: &str = "ledger_entries.csv";
const ENTRIES_HEADER: &[&str] = &[
    "id",
    "employee_id",
    "date",
    "operation",
    "minutes",
    "origin",
    "reason",
    "balance_before",
    "balance_after",
    "created_at",
];

const CONFIG_FILE: &str = "ledger_config.csv";
const CONFIG_HEADER: &[&str] = &[
    "enabled",
    "positive_cap_minutes",
    "negative_cap_minutes",
    "convert_overtime_premium",
    "premium_multiplier_pct",
];

const ALERTS_FILE: &str = "ledger_alerts.csv";
const ALERTS_HEADER: &[&str] = &["employee_id", "date"];

#[derive(Clone)]
pub struct LedgerRepository {
    connection: CsvConnection,
}

impl LedgerRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_all(&self) -> Result<Vec<LedgerEntry>> {
        let rows = self.connection.read_rows(ENTRIES_FILE, ENTRIES_HEADER)?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_entry(&row) {
                Some(entry) => entries.push(entry),
                None => warn!("skipping malformed ledger row: {:?}", row),
            }
        }
        Ok(entries)
    }
}

fn parse_entry(row: &StringRecord) -> Option<LedgerEntry> {
    let reason = row.get(6).unwrap_or("");
    Some(LedgerEntry {
        id: row.get(0)?.to_string(),
        employee_id: row.get(1)?.to_string(),
        date: row.get(2)?.parse().ok()?,
        operation: LedgerOperation::parse(row.get(3).unwrap_or("")),
        minutes: row.get(4).unwrap_or("0").parse().unwrap_or(0),
        origin: LedgerOrigin::parse(row.get(5).unwrap_or("")),
        reason: if reason.is_empty() {
            None
        } else {
            Some(reason.to_string())
        },
        balance_before: row.get(7).unwrap_or("0").parse().unwrap_or(0),
        balance_after: row.get(8).unwrap_or("0").parse().unwrap_or(0),
        created_at: DateTime::parse_from_rfc3339(row.get(9)?)
            .ok()?
            .with_timezone(&Utc),
    })
}

fn to_row(entry: &LedgerEntry) -> Vec<String> {
    vec![
        entry.id.clone(),
        entry.employee_id.clone(),
        entry.date.to_string(),
        entry.operation.as_str().to_string(),
        entry.minutes.to_string(),
        entry.origin.as_str().to_string(),
        entry.reason.clone().unwrap_or_default(),
        entry.balance_before.to_string(),
        entry.balance_after.to_string(),
        entry.created_at.to_rfc3339(),
    ]
}

impl LedgerStorage for LedgerRepository {
    fn read_config(&self) -> Result<Option<LedgerConfig>> {
        let rows = self.connection.read_rows(CONFIG_FILE, CONFIG_HEADER)?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let defaults = LedgerConfig::default();
        Ok(Some(LedgerConfig {
            enabled: row.get(0).unwrap_or("true") == "true",
            positive_cap_minutes: row
                .get(1)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.positive_cap_minutes),
            negative_cap_minutes: row
                .get(2)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.negative_cap_minutes),
            convert_overtime_premium: row.get(3).unwrap_or("false") == "true",
            premium_multiplier_pct: row
                .get(4)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.premium_multiplier_pct),
        }))
    }

    fn store_config(&self, config: &LedgerConfig) -> Result<()> {
        let _guard = self.connection.write_guard();
        let row = vec![
            config.enabled.to_string(),
            config.positive_cap_minutes.to_string(),
            config.negative_cap_minutes.to_string(),
            config.convert_overtime_premium.to_string(),
            config.premium_multiplier_pct.to_string(),
        ];
        self.connection.write_rows(CONFIG_FILE, CONFIG_HEADER, &[row])
    }

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let _guard = self.connection.write_guard();
        self.connection
            .append_row(ENTRIES_FILE, ENTRIES_HEADER, &to_row(entry))
    }

    fn list_entries(&self, employee_id: &str) -> Result<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.employee_id == employee_id)
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    fn delete_entries(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
        origin: LedgerOrigin,
    ) -> Result<usize> {
        let _guard = self.connection.write_guard();
        let entries = self.read_all()?;
        let before = entries.len();
        let kept: Vec<LedgerEntry> = entries
            .into_iter()
            .filter(|e| {
                !(e.employee_id == employee_id
                    && e.origin == origin
                    && e.date.year() == year
                    && e.date.month() == month)
            })
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            let rows: Vec<Vec<String>> = kept.iter().map(to_row).collect();
            self.connection.write_rows(ENTRIES_FILE, ENTRIES_HEADER, &rows)?;
        }
        Ok(removed)
    }

    fn manual_entry_exists(
        &self,
        employee_id: &str,
        date: NaiveDate,
        operation: LedgerOperation,
    ) -> Result<bool> {
        Ok(self.read_all()?.iter().any(|e| {
            e.employee_id == employee_id
                && e.date == date
                && e.operation == operation
                && e.origin == LedgerOrigin::Manual
        }))
    }

    fn cap_alert_sent(&self, employee_id: &str, date: NaiveDate) -> Result<bool> {
        let rows = self.connection.read_rows(ALERTS_FILE, ALERTS_HEADER)?;
        Ok(rows.iter().any(|row| {
            row.get(0) == Some(employee_id)
                && row.get(1).and_then(|d| d.parse::<NaiveDate>().ok()) == Some(date)
        }))
    }

    fn record_cap_alert(&self, employee_id: &str, date: NaiveDate) -> Result<()> {
        let _guard = self.connection.write_guard();
        self.connection.append_row(
            ALERTS_FILE,
            ALERTS_HEADER,
            &[employee_id.to_string(), date.to_string()],
        )
    }
}
