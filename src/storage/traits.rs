//! Storage abstraction.
//!
//! Repositories are synchronous and return `anyhow::Result`; domain services
//! translate failures into their own error types. A `Connection` ties the
//! per-family repositories to one backend so services can stay generic over
//! where the data lives.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::models::{
    Anomaly, AnomalyKind, DailyRecord, DayOverride, Holiday, LedgerConfig, LedgerEntry,
    LedgerOrigin, LedgerOperation, PunchEvent, ScheduleTemplate, Timesheet,
};

/// Raw punch event persistence.
pub trait PunchStorage: Send + Sync {
    /// All punches for an employee whose reporting-offset date falls in
    /// `from..=to`, sorted ascending by timestamp.
    fn list_punches(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PunchEvent>>;

    /// Punches on a single reporting date, sorted ascending.
    fn punches_on_date(&self, employee_id: &str, date: NaiveDate) -> Result<Vec<PunchEvent>>;

    /// The most recent punch strictly before `instant`, if any.
    fn latest_punch_before(
        &self,
        employee_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<Option<PunchEvent>>;

    fn get_punch(&self, punch_id: &str) -> Result<Option<PunchEvent>>;

    fn store_punch(&self, punch: &PunchEvent) -> Result<()>;

    fn delete_punch(&self, punch_id: &str) -> Result<Option<PunchEvent>>;
}

/// Schedule template persistence.
pub trait ScheduleStorage: Send + Sync {
    fn get_template(&self, employee_id: &str) -> Result<Option<ScheduleTemplate>>;

    fn store_template(&self, template: &ScheduleTemplate) -> Result<()>;
}

/// Company holidays and per-employee calendar exceptions.
pub trait CalendarStorage: Send + Sync {
    /// Holidays effective in `from..=to`, recurring ones matched by
    /// month/day within the range.
    fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Holiday>>;

    fn store_holiday(&self, holiday: &Holiday) -> Result<()>;

    fn list_overrides(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayOverride>>;

    fn store_override(&self, day_override: &DayOverride) -> Result<()>;
}

/// Reconciled daily record persistence.
pub trait RecordStorage: Send + Sync {
    /// Atomically replace an employee's records for one month.
    /// Reconciliation is delete-then-insert so stale days never linger.
    fn replace_daily_records(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
        records: &[DailyRecord],
    ) -> Result<()>;

    fn list_daily_records(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<DailyRecord>>;
}

/// Monthly timesheet persistence.
pub trait TimesheetStorage: Send + Sync {
    fn get_timesheet(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<Timesheet>>;

    /// Insert or overwrite by (employee, year, month).
    fn upsert_timesheet(&self, timesheet: &Timesheet) -> Result<()>;
}

/// Hour-bank ledger persistence.
pub trait LedgerStorage: Send + Sync {
    fn read_config(&self) -> Result<Option<LedgerConfig>>;

    fn store_config(&self, config: &LedgerConfig) -> Result<()>;

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()>;

    /// All entries for an employee, oldest first.
    fn list_entries(&self, employee_id: &str) -> Result<Vec<LedgerEntry>>;

    /// Remove entries of one origin whose date falls in the given month.
    /// Returns how many were removed.
    fn delete_entries(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
        origin: LedgerOrigin,
    ) -> Result<usize>;

    /// Duplicate guard for manual postings.
    fn manual_entry_exists(
        &self,
        employee_id: &str,
        date: NaiveDate,
        operation: LedgerOperation,
    ) -> Result<bool>;

    /// Whether a near-cap warning already went out on the given day.
    fn cap_alert_sent(&self, employee_id: &str, date: NaiveDate) -> Result<bool>;

    fn record_cap_alert(&self, employee_id: &str, date: NaiveDate) -> Result<()>;
}

/// Live-monitor anomaly persistence.
pub trait AnomalyStorage: Send + Sync {
    fn has_open_anomaly(
        &self,
        employee_id: &str,
        date: NaiveDate,
        kind: AnomalyKind,
    ) -> Result<bool>;

    fn record_anomaly(&self, anomaly: &Anomaly) -> Result<()>;

    fn list_anomalies(&self, employee_id: &str, date: NaiveDate) -> Result<Vec<Anomaly>>;
}

/// Factory tying the repository families to one backend.
pub trait Connection: Send + Sync + Clone + 'static {
    type PunchRepository: PunchStorage;
    type ScheduleRepository: ScheduleStorage;
    type CalendarRepository: CalendarStorage;
    type RecordRepository: RecordStorage;
    type TimesheetRepository: TimesheetStorage;
    type LedgerRepository: LedgerStorage;
    type AnomalyRepository: AnomalyStorage;

    fn create_punch_repository(&self) -> Self::PunchRepository;
    fn create_schedule_repository(&self) -> Self::ScheduleRepository;
    fn create_calendar_repository(&self) -> Self::CalendarRepository;
    fn create_record_repository(&self) -> Self::RecordRepository;
    fn create_timesheet_repository(&self) -> Self::TimesheetRepository;
    fn create_ledger_repository(&self) -> Self::LedgerRepository;
    fn create_anomaly_repository(&self) -> Self::AnomalyRepository;
}
