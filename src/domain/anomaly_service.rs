//! Live monitoring of today's punches, plus the previous-day sweep.
//!
//! Purely advisory: findings are recorded and staff notified, but punches
//! and timesheets are never touched. An external scheduler invokes both
//! passes at a fixed interval.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::errors::EngineResult;
use crate::domain::models::{Anomaly, AnomalyKind, PunchDirection};
use crate::domain::notifier::{Notifier, Recipient};
use crate::domain::punch_service::PunchService;
use crate::domain::schedule_service::ScheduleService;
use crate::storage::traits::{AnomalyStorage, Connection};

use std::sync::Arc;

pub struct AnomalyService<C: Connection> {
    punches: PunchService<C>,
    schedules: ScheduleService<C>,
    anomaly_repo: C::AnomalyRepository,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<C: Connection> AnomalyService<C> {
    pub fn new(connection: &C, config: EngineConfig, notifier: Arc<dyn Notifier>) -> Self {
        AnomalyService {
            punches: PunchService::new(connection, config.clone()),
            schedules: ScheduleService::new(connection, config.clone()),
            anomaly_repo: connection.create_anomaly_repository(),
            notifier,
            config,
        }
    }

    pub fn open_anomalies(
        &self,
        employee_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Vec<Anomaly>> {
        Ok(self.anomaly_repo.list_anomalies(employee_id, date)?)
    }

    /// Flag employees still clocked in past their expected exit plus
    /// tolerance. One open finding per employee per day.
    pub fn run_live_monitor(
        &self,
        employee_ids: &[String],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Anomaly>> {
        let offset = self.config.reporting_offset();
        let now_local = now.with_timezone(&offset).naive_local();
        let today = now_local.date();
        let mut found = Vec::new();

        for employee_id in employee_ids {
            match self.check_checkout_overdue(employee_id, today, now_local) {
                Ok(Some(anomaly)) => found.push(anomaly),
                Ok(None) => {}
                Err(err) => {
                    warn!("live monitor failed for employee {}: {}", employee_id, err);
                }
            }
        }
        Ok(found)
    }

    fn check_checkout_overdue(
        &self,
        employee_id: &str,
        today: NaiveDate,
        now_local: chrono::NaiveDateTime,
    ) -> EngineResult<Option<Anomaly>> {
        let day = self.schedules.resolve(employee_id, today)?;
        // Rotating rosters have no configured exit to measure against.
        let Some(last_end) = day.last_end else {
            return Ok(None);
        };
        if day.is_rest_day {
            return Ok(None);
        }

        let punches = self.punches.on_date(employee_id, today)?;
        if punches.is_empty() || punches.len() % 2 == 0 {
            return Ok(None);
        }
        // Positionally the dangling punch is an entry; an explicit OUT
        // direction means the pairing is off, not that someone forgot to
        // leave.
        if matches!(punches.last(), Some(p) if p.direction == PunchDirection::Out) {
            return Ok(None);
        }

        // Full datetimes, so a late shift whose deadline lands past
        // midnight never compares against the wrong day.
        let deadline =
            today.and_time(last_end) + Duration::minutes(self.config.monitor_checkout_tolerance_minutes);
        if now_local <= deadline {
            return Ok(None);
        }

        let detail = format!(
            "still clocked in past {} (expected exit {})",
            deadline.format("%H:%M"),
            last_end.format("%H:%M")
        );
        self.record(employee_id, today, AnomalyKind::CheckoutOverdue, detail)
    }

    /// Daily verification of yesterday: odd punch counts and workdays with
    /// no punches at all.
    pub fn sweep_previous_day(
        &self,
        employee_ids: &[String],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Anomaly>> {
        let offset = self.config.reporting_offset();
        let today = now.with_timezone(&offset).date_naive();
        let Some(yesterday) = today.pred_opt() else {
            return Ok(Vec::new());
        };
        if matches!(self.config.system_start_date, Some(start) if yesterday < start) {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for employee_id in employee_ids {
            match self.sweep_employee(employee_id, yesterday) {
                Ok(anomalies) => found.extend(anomalies),
                Err(err) => {
                    warn!("previous-day sweep failed for employee {}: {}", employee_id, err);
                }
            }
        }
        Ok(found)
    }

    fn sweep_employee(
        &self,
        employee_id: &str,
        yesterday: NaiveDate,
    ) -> EngineResult<Vec<Anomaly>> {
        let punches = self.punches.on_date(employee_id, yesterday)?;
        let mut found = Vec::new();

        if punches.len() % 2 == 1 {
            let detail = format!("{} punches recorded, checkout never registered", punches.len());
            if let Some(anomaly) =
                self.record(employee_id, yesterday, AnomalyKind::UnregisteredCheckout, detail)?
            {
                found.push(anomaly);
            }
        }

        if punches.is_empty() {
            let day = self.schedules.resolve(employee_id, yesterday)?;
            if !day.is_rest_day && !day.is_holiday && day.expected_minutes > 0 {
                let detail = format!(
                    "no punches on a day expecting {} minutes",
                    day.expected_minutes
                );
                if let Some(anomaly) =
                    self.record(employee_id, yesterday, AnomalyKind::UnjustifiedAbsence, detail)?
                {
                    found.push(anomaly);
                }
            }
        }
        Ok(found)
    }

    fn record(
        &self,
        employee_id: &str,
        date: NaiveDate,
        kind: AnomalyKind,
        detail: String,
    ) -> EngineResult<Option<Anomaly>> {
        if self.anomaly_repo.has_open_anomaly(employee_id, date, kind)? {
            return Ok(None);
        }
        let anomaly = Anomaly {
            id: Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            date,
            kind,
            detail,
            resolved: false,
            created_at: Utc::now(),
        };
        self.anomaly_repo.record_anomaly(&anomaly)?;
        info!(
            "anomaly {} recorded for employee {} on {}",
            kind.as_str(),
            employee_id,
            date
        );
        let message = format!(
            "attendance anomaly for employee {} on {}: {}",
            employee_id, date, anomaly.detail
        );
        if let Err(err) = self.notifier.notify(Recipient::HrStaff, &message) {
            warn!("anomaly notification failed: {:#}", err);
        }
        Ok(Some(anomaly))
    }
}
