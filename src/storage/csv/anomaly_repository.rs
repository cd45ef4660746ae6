//! CSV anomaly repository.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use log::warn;

use crate::domain::models::{Anomaly, AnomalyKind};
use crate::storage::traits::AnomalyStorage;

use super::connection::CsvConnection;

const FILE: &str = "anomalies.csv";
const HEADER: &[&str] = &[
    "id",
    "employee_id",
    "date",
    "kind",
    "detail",
    "resolved",
    "created_at",
];

#[derive(Clone)]
pub struct AnomalyRepository {
    connection: CsvConnection,
}

impl AnomalyRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_all(&self) -> Result<Vec<Anomaly>> {
        let rows = self.connection.read_rows(FILE, HEADER)?;
        let mut anomalies = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_row(&row) {
                Some(anomaly) => anomalies.push(anomaly),
                None => warn!("skipping malformed anomaly row: {:?}", row),
            }
        }
        Ok(anomalies)
    }
}

fn parse_row(row: &StringRecord) -> Option<Anomaly> {
    Some(Anomaly {
        id: row.get(0)?.to_string(),
        employee_id: row.get(1)?.to_string(),
        date: row.get(2)?.parse().ok()?,
        kind: AnomalyKind::parse(row.get(3)?)?,
        detail: row.get(4).unwrap_or("").to_string(),
        resolved: row.get(5).unwrap_or("false") == "true",
        created_at: DateTime::parse_from_rfc3339(row.get(6)?)
            .ok()?
            .with_timezone(&Utc),
    })
}

impl AnomalyStorage for AnomalyRepository {
    fn has_open_anomaly(
        &self,
        employee_id: &str,
        date: NaiveDate,
        kind: AnomalyKind,
    ) -> Result<bool> {
        Ok(self.read_all()?.iter().any(|a| {
            a.employee_id == employee_id && a.date == date && a.kind == kind && !a.resolved
        }))
    }

    fn record_anomaly(&self, anomaly: &Anomaly) -> Result<()> {
        let _guard = self.connection.write_guard();
        self.connection.append_row(
            FILE,
            HEADER,
            &[
                anomaly.id.clone(),
                anomaly.employee_id.clone(),
                anomaly.date.to_string(),
                anomaly.kind.as_str().to_string(),
                anomaly.detail.clone(),
                anomaly.resolved.to_string(),
                anomaly.created_at.to_rfc3339(),
            ],
        )
    }

    fn list_anomalies(&self, employee_id: &str, date: NaiveDate) -> Result<Vec<Anomaly>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|a| a.employee_id == employee_id && a.date == date)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::Connection;
    use tempfile::tempdir;

    #[test]
    fn open_anomaly_lookup_matches_kind_and_date() {
        let dir = tempdir().unwrap();
        let repo = CsvConnection::new(dir.path()).create_anomaly_repository();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        repo.record_anomaly(&Anomaly {
            id: "a1".to_string(),
            employee_id: "emp-1".to_string(),
            date,
            kind: AnomalyKind::CheckoutOverdue,
            detail: "still clocked in".to_string(),
            resolved: false,
            created_at: Utc::now(),
        })
        .unwrap();

        assert!(repo
            .has_open_anomaly("emp-1", date, AnomalyKind::CheckoutOverdue)
            .unwrap());
        assert!(!repo
            .has_open_anomaly("emp-1", date, AnomalyKind::UnjustifiedAbsence)
            .unwrap());
        assert!(!repo
            .has_open_anomaly("emp-2", date, AnomalyKind::CheckoutOverdue)
            .unwrap());
        assert_eq!(repo.list_anomalies("emp-1", date).unwrap().len(), 1);
    }
}
