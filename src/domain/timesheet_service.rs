//! Period closing and the timesheet lifecycle.
//!
//! Runs the daily calculator over every date of a billing period, applies
//! the closing-boundary correction for overnight shifts, persists the
//! results, and drives the OPEN -> CLOSED -> APPROVED state machine with
//! its ledger side effects.
//!
//! Recomputation is idempotent: daily records are replaced wholesale and
//! timesheet totals overwritten while the sheet is still OPEN or CLOSED.

use std::sync::Arc;

use chrono::{Months, NaiveDate, Timelike, Utc};
use log::{error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::commands::{
    BatchItemResult, ComputeBatchQuery, ComputeTimesheetQuery, RejectTimesheetCommand,
    TimesheetTransitionCommand,
};
use crate::domain::daily_service::{outcome, DailyCalculator};
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ledger_service::LedgerService;
use crate::domain::models::{
    AnomalyTag, DailyRecord, PunchEvent, ResolvedDay, ScheduleModel, Timesheet, TimesheetStatus,
    TimesheetTotals,
};
use crate::domain::notifier::{Notifier, Recipient};
use crate::domain::punch_service::PunchService;
use crate::domain::schedule_service::{resolve_day, ScheduleService};
use crate::storage::traits::{Connection, RecordStorage, TimesheetStorage};

/// Next-day OUT punches after this wall-clock hour are a new day's work,
/// not the tail of an overnight shift.
const OVERNIGHT_OUT_CUTOFF_HOUR: u32 = 12;

pub struct TimesheetService<C: Connection> {
    punches: PunchService<C>,
    schedules: ScheduleService<C>,
    calculator: DailyCalculator,
    record_repo: C::RecordRepository,
    timesheet_repo: C::TimesheetRepository,
    ledger: Arc<LedgerService<C>>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<C: Connection> TimesheetService<C> {
    pub fn new(
        connection: &C,
        config: EngineConfig,
        ledger: Arc<LedgerService<C>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        TimesheetService {
            punches: PunchService::new(connection, config.clone()),
            schedules: ScheduleService::new(connection, config.clone()),
            calculator: DailyCalculator::new(&config),
            record_repo: connection.create_record_repository(),
            timesheet_repo: connection.create_timesheet_repository(),
            ledger,
            notifier,
            config,
        }
    }

    pub fn get(&self, employee_id: &str, year: i32, month: u32) -> EngineResult<Option<Timesheet>> {
        Ok(self.timesheet_repo.get_timesheet(employee_id, year, month)?)
    }

    pub fn daily_records(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> EngineResult<Vec<DailyRecord>> {
        Ok(self.record_repo.list_daily_records(employee_id, year, month)?)
    }

    /// Reconcile one employee's month and persist records plus totals.
    pub fn compute(&self, query: ComputeTimesheetQuery) -> EngineResult<Timesheet> {
        let (month_start, month_end) = month_bounds(query.year, query.month)?;
        let closing_date = self
            .config
            .effective_closing_day()
            .and_then(|d| NaiveDate::from_ymd_opt(query.year, query.month, d))
            .unwrap_or(month_end);
        let today = query.as_of.unwrap_or_else(|| {
            Utc::now()
                .with_timezone(&self.config.reporting_offset())
                .date_naive()
        });
        // The whole month is reconciled into this period; the cut-off date
        // only decides where an overnight shift splits.
        let period_end = month_end.min(today);

        let existing = self
            .timesheet_repo
            .get_timesheet(&query.employee_id, query.year, query.month)?;
        if matches!(&existing, Some(s) if s.status == TimesheetStatus::Approved) {
            return Err(EngineError::InvalidTransition {
                status: TimesheetStatus::Approved,
                action: "recompute",
            });
        }

        let template = self.schedules.template(&query.employee_id)?;
        let holidays = self.schedules.holidays(month_start, month_end)?;
        let overrides = self
            .schedules
            .overrides(&query.employee_id, month_start, month_end)?;
        let anchor = match template {
            Some(ref t) if t.model == ScheduleModel::RotatingShift => {
                self.schedules.rotation_anchor(&query.employee_id, month_start)?
            }
            _ => month_start,
        };

        // One extra day of punches so the boundary correction can see the
        // morning after the closing date.
        let fetch_end = month_end.succ_opt().unwrap_or(month_end);
        let punch_days = self
            .punches
            .grouped(&query.employee_id, month_start, fetch_end)?;

        let mut records: Vec<DailyRecord> = Vec::new();
        let mut closing_day_resolution: Option<ResolvedDay> = None;
        let mut date = month_start;
        while date <= period_end {
            let record = if before_system_start(&self.config, date) {
                let mut neutral = DailyRecord::neutral(
                    &query.employee_id,
                    date,
                    template.as_ref().map(|t| t.model).unwrap_or(ScheduleModel::FixedWeekly),
                );
                neutral.tags.push(AnomalyTag::BeforeSystemStart);
                neutral
            } else {
                let day = resolve_day(
                    &self.config,
                    date,
                    template.as_ref(),
                    &holidays,
                    &overrides,
                    anchor,
                );
                let punches = punch_days.get(&date).map(Vec::as_slice).unwrap_or(&[]);
                let record = self
                    .calculator
                    .reconcile(&query.employee_id, date, punches, &day);
                if date == closing_date {
                    closing_day_resolution = Some(day);
                }
                record
            };
            records.push(record);
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        let mut carry_to_next_period = 0i64;
        if period_end >= closing_date {
            let closing_record = records.iter_mut().find(|r| r.date == closing_date);
            if let (Some(day), Some(record)) = (closing_day_resolution, closing_record) {
                carry_to_next_period =
                    self.apply_boundary_split(record, &day, &punch_days, closing_date);
            }
        }

        // Deterministic record ids keep recomputation byte-stable.
        for record in &mut records {
            record.id = format!("{}:{}", query.employee_id, record.date);
        }

        let mut totals = TimesheetTotals {
            carry_to_next_period,
            ..TimesheetTotals::default()
        };
        for record in &records {
            if record.worked_minutes > 0 {
                totals.days_worked += 1;
            }
            totals.expected_minutes += record.expected_minutes;
            totals.worked_minutes += record.worked_minutes;
            totals.overtime_minutes += record.overtime_minutes;
            totals.shortfall_minutes += record.shortfall_minutes;
            totals.delay_minutes += record.delay_minutes;
            if record.is_absence {
                totals.absences += 1;
            }
        }

        self.record_repo
            .replace_daily_records(&query.employee_id, query.year, query.month, &records)?;

        let mut timesheet = existing.unwrap_or_else(|| Timesheet {
            id: Uuid::new_v4().to_string(),
            employee_id: query.employee_id.clone(),
            year: query.year,
            month: query.month,
            status: TimesheetStatus::Open,
            totals: TimesheetTotals::default(),
            history: Vec::new(),
            updated_at: Utc::now(),
        });
        timesheet.totals = totals;
        timesheet.updated_at = Utc::now();
        self.timesheet_repo.upsert_timesheet(&timesheet)?;
        info!(
            "reconciled {:02}/{} for employee {}: worked {} min, overtime {}, shortfall {}",
            query.month,
            query.year,
            query.employee_id,
            timesheet.totals.worked_minutes,
            timesheet.totals.overtime_minutes,
            timesheet.totals.shortfall_minutes
        );
        Ok(timesheet)
    }

    /// Overnight shift over the closing boundary: the pre-midnight slice
    /// belongs to the closing date, the rest is owed to the next period.
    fn apply_boundary_split(
        &self,
        record: &mut DailyRecord,
        day: &ResolvedDay,
        punch_days: &std::collections::BTreeMap<NaiveDate, Vec<PunchEvent>>,
        closing_date: NaiveDate,
    ) -> i64 {
        let closing_punches = match punch_days.get(&closing_date) {
            Some(p) if p.len() % 2 == 1 => p,
            _ => return 0,
        };
        let next_date = match closing_date.succ_opt() {
            Some(d) => d,
            None => return 0,
        };
        let Some(next_punches) = punch_days.get(&next_date) else {
            return 0;
        };
        let (Some(last_in), Some(first_out)) = (closing_punches.last(), next_punches.first())
        else {
            return 0;
        };

        let offset = self.config.reporting_offset();
        let out_local = first_out.timestamp.with_timezone(&offset).naive_local();
        if out_local.time().hour() >= OVERNIGHT_OUT_CUTOFF_HOUR {
            return 0;
        }
        let in_local = last_in.timestamp.with_timezone(&offset).naive_local();
        let midnight = match next_date.and_hms_opt(0, 0, 0) {
            Some(m) => m,
            None => return 0,
        };
        let pre_midnight = ((midnight - in_local).num_seconds() + 30) / 60;
        let carry = ((out_local - midnight).num_seconds() + 30) / 60;
        if pre_midnight <= 0 || carry < 0 {
            return 0;
        }

        record.worked_minutes += pre_midnight;
        if record.is_rest_day || record.is_holiday {
            record.overtime_minutes = record.worked_minutes;
        } else {
            let (overtime, shortfall) = outcome(
                record.worked_minutes,
                record.expected_minutes,
                day.exit_tolerance_minutes,
            );
            record.overtime_minutes = overtime;
            record.shortfall_minutes = shortfall;
        }
        record.tags.push(AnomalyTag::ShiftCrossesClosing);
        info!(
            "shift across {} split: {} min kept, {} min carried to the next period",
            closing_date, pre_midnight, carry
        );
        carry
    }

    /// Reconcile a set of employees; one failure never aborts the rest.
    pub fn compute_batch(&self, query: ComputeBatchQuery) -> Vec<BatchItemResult> {
        let workers = self.config.batch_concurrency.max(1);
        let chunk_size = query.employee_ids.len().div_ceil(workers).max(1);
        let mut results = Vec::with_capacity(query.employee_ids.len());

        std::thread::scope(|scope| {
            let handles: Vec<_> = query
                .employee_ids
                .chunks(chunk_size)
                .map(|chunk| {
                    let query = &query;
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|employee_id| {
                                let item = ComputeTimesheetQuery {
                                    employee_id: employee_id.clone(),
                                    year: query.year,
                                    month: query.month,
                                    as_of: query.as_of,
                                };
                                match self.compute(item) {
                                    Ok(_) => BatchItemResult {
                                        employee_id: employee_id.clone(),
                                        ok: true,
                                        message: None,
                                    },
                                    Err(err) => {
                                        warn!(
                                            "batch reconciliation failed for employee {}: {}",
                                            employee_id, err
                                        );
                                        BatchItemResult {
                                            employee_id: employee_id.clone(),
                                            ok: false,
                                            message: Some(err.to_string()),
                                        }
                                    }
                                }
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for handle in handles {
                match handle.join() {
                    Ok(items) => results.extend(items),
                    Err(_) => error!("batch worker panicked"),
                }
            }
        });
        results
    }

    pub fn close(&self, cmd: TimesheetTransitionCommand) -> EngineResult<Timesheet> {
        let mut sheet = self.require(&cmd.employee_id, cmd.year, cmd.month)?;
        if sheet.status == TimesheetStatus::Approved {
            return Err(EngineError::InvalidTransition {
                status: sheet.status,
                action: "close",
            });
        }
        sheet.push_history("CLOSE", None, cmd.actor, Utc::now());
        sheet.status = TimesheetStatus::Closed;
        sheet.updated_at = Utc::now();
        self.timesheet_repo.upsert_timesheet(&sheet)?;
        Ok(sheet)
    }

    /// Approve a timesheet, posting its overtime and shortfall to the hour
    /// bank. Re-approval after a reopen replaces the prior postings.
    pub fn approve(&self, cmd: TimesheetTransitionCommand) -> EngineResult<Timesheet> {
        let mut sheet = self.require(&cmd.employee_id, cmd.year, cmd.month)?;
        if sheet.status == TimesheetStatus::Approved {
            return Err(EngineError::InvalidTransition {
                status: sheet.status,
                action: "approve",
            });
        }
        sheet.push_history("APPROVE", None, cmd.actor, Utc::now());
        sheet.status = TimesheetStatus::Approved;
        sheet.updated_at = Utc::now();
        self.timesheet_repo.upsert_timesheet(&sheet)?;

        let (_, month_end) = month_bounds(cmd.year, cmd.month)?;
        let effective_date = self
            .config
            .effective_closing_day()
            .and_then(|d| NaiveDate::from_ymd_opt(cmd.year, cmd.month, d))
            .unwrap_or(month_end);
        self.ledger.post_timesheet_results(
            &cmd.employee_id,
            cmd.year,
            cmd.month,
            effective_date,
            sheet.totals.overtime_minutes,
            sheet.totals.shortfall_minutes,
        )?;

        let message = format!(
            "timesheet {:02}/{} approved: {} min overtime, {} min shortfall",
            cmd.month, cmd.year, sheet.totals.overtime_minutes, sheet.totals.shortfall_minutes
        );
        if let Err(err) = self
            .notifier
            .notify(Recipient::Employee(cmd.employee_id.clone()), &message)
        {
            warn!("approval notification failed: {:#}", err);
        }
        Ok(sheet)
    }

    /// Approve every CLOSED timesheet in the set, reporting per-item status.
    pub fn approve_batch(
        &self,
        employee_ids: &[String],
        year: i32,
        month: u32,
        actor: Option<String>,
    ) -> Vec<BatchItemResult> {
        employee_ids
            .iter()
            .map(|employee_id| {
                let result = self
                    .require(employee_id, year, month)
                    .and_then(|sheet| {
                        if sheet.status != TimesheetStatus::Closed {
                            return Err(EngineError::InvalidTransition {
                                status: sheet.status,
                                action: "batch approve",
                            });
                        }
                        self.approve(TimesheetTransitionCommand {
                            employee_id: employee_id.clone(),
                            year,
                            month,
                            actor: actor.clone(),
                        })
                    });
                match result {
                    Ok(_) => BatchItemResult {
                        employee_id: employee_id.clone(),
                        ok: true,
                        message: None,
                    },
                    Err(err) => BatchItemResult {
                        employee_id: employee_id.clone(),
                        ok: false,
                        message: Some(err.to_string()),
                    },
                }
            })
            .collect()
    }

    /// Send an approved timesheet back to open, reversing its postings.
    pub fn reject(&self, cmd: RejectTimesheetCommand) -> EngineResult<Timesheet> {
        let mut sheet = self.require(&cmd.employee_id, cmd.year, cmd.month)?;
        if sheet.status != TimesheetStatus::Approved {
            return Err(EngineError::InvalidTransition {
                status: sheet.status,
                action: "reject",
            });
        }
        self.ledger
            .reverse_timesheet_postings(&cmd.employee_id, cmd.year, cmd.month)?;
        sheet.push_history("REJECT", Some(cmd.reason.clone()), cmd.actor, Utc::now());
        sheet.status = TimesheetStatus::Open;
        sheet.updated_at = Utc::now();
        self.timesheet_repo.upsert_timesheet(&sheet)?;

        let message = format!(
            "timesheet {:02}/{} was rejected: {}",
            cmd.month, cmd.year, cmd.reason
        );
        if let Err(err) = self
            .notifier
            .notify(Recipient::Employee(cmd.employee_id.clone()), &message)
        {
            warn!("rejection notification failed: {:#}", err);
        }
        Ok(sheet)
    }

    /// Unlock a closed or approved timesheet for further edits. Reopening
    /// an approved sheet reverses its ledger postings.
    pub fn reopen(&self, cmd: TimesheetTransitionCommand) -> EngineResult<Timesheet> {
        let mut sheet = self.require(&cmd.employee_id, cmd.year, cmd.month)?;
        match sheet.status {
            TimesheetStatus::Approved => {
                self.ledger
                    .reverse_timesheet_postings(&cmd.employee_id, cmd.year, cmd.month)?;
            }
            TimesheetStatus::Closed => {}
            TimesheetStatus::Open => {
                return Err(EngineError::InvalidTransition {
                    status: sheet.status,
                    action: "reopen",
                });
            }
        }
        sheet.push_history("REOPEN", None, cmd.actor, Utc::now());
        sheet.status = TimesheetStatus::Open;
        sheet.updated_at = Utc::now();
        self.timesheet_repo.upsert_timesheet(&sheet)?;
        Ok(sheet)
    }

    fn require(&self, employee_id: &str, year: i32, month: u32) -> EngineResult<Timesheet> {
        self.timesheet_repo
            .get_timesheet(employee_id, year, month)?
            .ok_or_else(|| EngineError::TimesheetNotFound {
                employee_id: employee_id.to_string(),
                year,
                month,
            })
    }
}

fn before_system_start(config: &EngineConfig, date: NaiveDate) -> bool {
    matches!(config.system_start_date, Some(start) if date < start)
}

fn month_bounds(year: i32, month: u32) -> EngineResult<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::Validation(format!("invalid month {:02}/{}", month, year)))?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| EngineError::Validation(format!("invalid month {:02}/{}", month, year)))?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::{PostLedgerEntryCommand, RecordManualPunchCommand};
    use crate::domain::models::{
        LedgerOperation, PunchDirection, PunchOrigin, ScheduleTemplate, WeekdayHours,
    };
    use crate::domain::notifier::LogNotifier;
    use crate::storage::csv::CsvConnection;
    use crate::storage::traits::{Connection, PunchStorage, ScheduleStorage};
    use chrono::{NaiveTime, TimeZone, Weekday};
    use tempfile::tempdir;

    struct Fixture {
        connection: CsvConnection,
        service: TimesheetService<CsvConnection>,
        ledger: Arc<LedgerService<CsvConnection>>,
        config: EngineConfig,
    }

    fn fixture(config: EngineConfig) -> (tempfile::TempDir, Fixture) {
        let dir = tempdir().unwrap();
        let connection = CsvConnection::new(dir.path());
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let ledger = Arc::new(LedgerService::new(&connection, notifier.clone()));
        let service =
            TimesheetService::new(&connection, config.clone(), ledger.clone(), notifier);
        (
            dir,
            Fixture {
                connection,
                service,
                ledger,
                config,
            },
        )
    }

    fn seed_punch(fx: &Fixture, employee: &str, date: NaiveDate, hour: u32, min: u32) {
        let offset = fx.config.reporting_offset();
        let local = date.and_hms_opt(hour, min, 0).unwrap();
        let timestamp = offset
            .from_local_datetime(&local)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        fx.connection
            .create_punch_repository()
            .store_punch(&crate::domain::models::PunchEvent {
                id: format!("{}-{}-{:02}{:02}", employee, date, hour, min),
                employee_id: employee.to_string(),
                timestamp,
                direction: PunchDirection::Unknown,
                origin: PunchOrigin::Device,
            })
            .unwrap();
    }

    fn seed_weekly_template(fx: &Fixture, employee: &str) {
        let workday = |weekday| WeekdayHours {
            weekday,
            entry_1: NaiveTime::from_hms_opt(8, 0, 0),
            exit_1: NaiveTime::from_hms_opt(12, 0, 0),
            entry_2: NaiveTime::from_hms_opt(13, 0, 0),
            exit_2: NaiveTime::from_hms_opt(17, 0, 0),
            rest: false,
        };
        let template = ScheduleTemplate {
            id: format!("tpl-{}", employee),
            employee_id: employee.to_string(),
            model: ScheduleModel::FixedWeekly,
            daily_minutes: 480,
            entry_tolerance_minutes: 10,
            exit_tolerance_minutes: 10,
            has_paid_break: true,
            break_minutes: 60,
            work_hours: None,
            rest_hours: None,
            weekdays: vec![
                workday(Weekday::Mon),
                workday(Weekday::Tue),
                workday(Weekday::Wed),
                workday(Weekday::Thu),
                workday(Weekday::Fri),
            ],
        };
        fx.connection
            .create_schedule_repository()
            .store_template(&template)
            .unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn march_query(employee: &str, as_of: NaiveDate) -> ComputeTimesheetQuery {
        ComputeTimesheetQuery {
            employee_id: employee.to_string(),
            year: 2026,
            month: 3,
            as_of: Some(as_of),
        }
    }

    #[test]
    fn compute_aggregates_worked_days_and_absences() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        // Monday 2026-03-02 fully worked; Tuesday 03-03 missed.
        for (h, m) in [(8, 0), (12, 0), (13, 0), (17, 0)] {
            seed_punch(&fx, "emp-1", date(2026, 3, 2), h, m);
        }

        let sheet = fx
            .service
            .compute(march_query("emp-1", date(2026, 3, 3)))
            .unwrap();
        assert_eq!(sheet.status, TimesheetStatus::Open);
        assert_eq!(sheet.totals.days_worked, 1);
        assert_eq!(sheet.totals.worked_minutes, 480);
        assert_eq!(sheet.totals.absences, 1);
        // Sunday the 1st expects nothing.
        assert_eq!(sheet.totals.expected_minutes, 960);

        let records = fx.service.daily_records("emp-1", 2026, 3).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].is_rest_day);
        assert!(records[2].is_absence);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        for (h, m) in [(8, 0), (12, 0), (13, 0), (17, 30)] {
            seed_punch(&fx, "emp-1", date(2026, 3, 2), h, m);
        }

        let first = fx
            .service
            .compute(march_query("emp-1", date(2026, 3, 5)))
            .unwrap();
        let first_records = fx.service.daily_records("emp-1", 2026, 3).unwrap();
        let second = fx
            .service
            .compute(march_query("emp-1", date(2026, 3, 5)))
            .unwrap();
        let second_records = fx.service.daily_records("emp-1", 2026, 3).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.totals, second.totals);
        assert_eq!(first_records, second_records);
    }

    #[test]
    fn future_dates_are_never_computed() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        let sheet = fx
            .service
            .compute(march_query("emp-1", date(2026, 3, 2)))
            .unwrap();
        // Only the 1st and 2nd exist; no phantom absences for the rest of
        // the month.
        assert_eq!(sheet.totals.absences, 1);
        assert_eq!(fx.service.daily_records("emp-1", 2026, 3).unwrap().len(), 2);
    }

    #[test]
    fn configured_cut_off_still_reconciles_the_whole_month() {
        let config = EngineConfig {
            closing_day: Some(25),
            ..EngineConfig::default()
        };
        let (_dir, fx) = fixture(config);
        seed_weekly_template(&fx, "emp-1");
        // Friday the 27th, past the cut-off but inside the month.
        for (h, m) in [(8, 0), (12, 0), (13, 0), (17, 0)] {
            seed_punch(&fx, "emp-1", date(2026, 3, 27), h, m);
        }

        let sheet = fx
            .service
            .compute(march_query("emp-1", date(2026, 4, 2)))
            .unwrap();
        assert_eq!(sheet.totals.worked_minutes, 480);
        assert_eq!(sheet.totals.days_worked, 1);

        let records = fx.service.daily_records("emp-1", 2026, 3).unwrap();
        assert_eq!(records.len(), 31);
        let friday = records.iter().find(|r| r.date == date(2026, 3, 27)).unwrap();
        assert_eq!(friday.worked_minutes, 480);
    }

    #[test]
    fn dates_before_system_start_are_neutralized() {
        let config = EngineConfig {
            system_start_date: Some(date(2026, 3, 3)),
            ..EngineConfig::default()
        };
        let (_dir, fx) = fixture(config);
        seed_weekly_template(&fx, "emp-1");

        let sheet = fx
            .service
            .compute(march_query("emp-1", date(2026, 3, 4)))
            .unwrap();
        let records = fx.service.daily_records("emp-1", 2026, 3).unwrap();
        assert!(records[0].has_tag(AnomalyTag::BeforeSystemStart));
        assert!(records[1].has_tag(AnomalyTag::BeforeSystemStart));
        assert_eq!(records[0].expected_minutes, 0);
        assert!(!records[0].is_absence);
        // Only the 3rd and 4th count as real absences.
        assert_eq!(sheet.totals.absences, 2);
    }

    #[test]
    fn overnight_shift_splits_at_the_closing_boundary() {
        let (_dir, fx) = fixture(EngineConfig::default());
        let template = ScheduleTemplate {
            id: "tpl-rot".to_string(),
            employee_id: "emp-1".to_string(),
            model: ScheduleModel::RotatingShift,
            daily_minutes: 720,
            entry_tolerance_minutes: 10,
            exit_tolerance_minutes: 10,
            has_paid_break: false,
            break_minutes: 0,
            work_hours: Some(12),
            rest_hours: Some(36),
            weekdays: Vec::new(),
        };
        fx.connection
            .create_schedule_repository()
            .store_template(&template)
            .unwrap();
        // In at 22:00 on the closing date, out at 02:00 the next morning.
        seed_punch(&fx, "emp-1", date(2026, 3, 31), 22, 0);
        seed_punch(&fx, "emp-1", date(2026, 4, 1), 2, 0);

        let sheet = fx
            .service
            .compute(march_query("emp-1", date(2026, 4, 2)))
            .unwrap();
        assert_eq!(sheet.totals.carry_to_next_period, 120);

        let records = fx.service.daily_records("emp-1", 2026, 3).unwrap();
        let closing = records.last().unwrap();
        assert_eq!(closing.date, date(2026, 3, 31));
        assert_eq!(closing.worked_minutes, 120);
        assert!(closing.has_tag(AnomalyTag::ShiftCrossesClosing));
        assert!(closing.has_tag(AnomalyTag::OddPunchCount));
    }

    #[test]
    fn next_day_afternoon_punch_is_not_an_overnight_tail() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        seed_punch(&fx, "emp-1", date(2026, 3, 31), 22, 0);
        seed_punch(&fx, "emp-1", date(2026, 4, 1), 14, 0);

        let sheet = fx
            .service
            .compute(march_query("emp-1", date(2026, 4, 2)))
            .unwrap();
        assert_eq!(sheet.totals.carry_to_next_period, 0);
        let records = fx.service.daily_records("emp-1", 2026, 3).unwrap();
        assert!(!records.last().unwrap().has_tag(AnomalyTag::ShiftCrossesClosing));
    }

    #[test]
    fn approval_posts_to_the_ledger_and_locks_the_period() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        // Monday with 1h40 of overtime past tolerance.
        for (h, m) in [(8, 0), (12, 0), (13, 0), (18, 50)] {
            seed_punch(&fx, "emp-1", date(2026, 3, 2), h, m);
        }

        fx.service
            .compute(march_query("emp-1", date(2026, 3, 2)))
            .unwrap();
        let transition = |action: &str| TimesheetTransitionCommand {
            employee_id: "emp-1".to_string(),
            year: 2026,
            month: 3,
            actor: Some(format!("hr-{}", action)),
        };
        fx.service.close(transition("close")).unwrap();
        let sheet = fx.service.approve(transition("approve")).unwrap();
        assert_eq!(sheet.status, TimesheetStatus::Approved);
        assert_eq!(fx.ledger.balance("emp-1").unwrap(), 100);

        // Period lock: no manual postings, no recompute, no punch edits.
        let err = fx
            .ledger
            .post(PostLedgerEntryCommand {
                employee_id: "emp-1".to_string(),
                date: date(2026, 3, 15),
                operation: LedgerOperation::Credit,
                minutes: 30,
                reason: None,
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::PeriodLocked { .. }));

        let err = fx
            .service
            .compute(march_query("emp-1", date(2026, 3, 5)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        let punch_service = PunchService::new(&fx.connection, fx.config.clone());
        let err = punch_service
            .record_manual_punch(RecordManualPunchCommand {
                employee_id: "emp-1".to_string(),
                timestamp: Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
                direction: PunchDirection::In,
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::PeriodLocked { .. }));
    }

    #[test]
    fn reject_reverses_postings_and_reopens() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        for (h, m) in [(8, 0), (12, 0), (13, 0), (18, 50)] {
            seed_punch(&fx, "emp-1", date(2026, 3, 2), h, m);
        }
        fx.service
            .compute(march_query("emp-1", date(2026, 3, 2)))
            .unwrap();
        fx.service
            .approve(TimesheetTransitionCommand {
                employee_id: "emp-1".to_string(),
                year: 2026,
                month: 3,
                actor: None,
            })
            .unwrap();
        assert_eq!(fx.ledger.balance("emp-1").unwrap(), 100);

        let sheet = fx
            .service
            .reject(RejectTimesheetCommand {
                employee_id: "emp-1".to_string(),
                year: 2026,
                month: 3,
                actor: Some("hr-lead".to_string()),
                reason: "device import incomplete".to_string(),
            })
            .unwrap();
        assert_eq!(sheet.status, TimesheetStatus::Open);
        assert_eq!(fx.ledger.balance("emp-1").unwrap(), 0);
        assert_eq!(sheet.history.last().unwrap().action, "REJECT");
        assert_eq!(
            sheet.history.last().unwrap().reason.as_deref(),
            Some("device import incomplete")
        );

        // Recomputation is allowed again.
        fx.service
            .compute(march_query("emp-1", date(2026, 3, 5)))
            .unwrap();
    }

    #[test]
    fn batch_reports_per_employee_status() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        seed_weekly_template(&fx, "emp-2");
        for (h, m) in [(8, 0), (17, 0)] {
            seed_punch(&fx, "emp-1", date(2026, 3, 2), h, m);
            seed_punch(&fx, "emp-2", date(2026, 3, 2), h, m);
        }
        // emp-3 has no template and no punches; still reconciles via the
        // default schedule.
        let results = fx.service.compute_batch(ComputeBatchQuery {
            employee_ids: vec![
                "emp-1".to_string(),
                "emp-2".to_string(),
                "emp-3".to_string(),
            ],
            year: 2026,
            month: 3,
            as_of: Some(date(2026, 3, 3)),
        });
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.ok));
    }

    #[test]
    fn parallel_batch_persists_every_employee() {
        let config = EngineConfig {
            batch_concurrency: 8,
            ..EngineConfig::default()
        };
        let (_dir, fx) = fixture(config);
        let employees: Vec<String> = (0..8).map(|i| format!("emp-{}", i)).collect();
        for employee in &employees {
            seed_weekly_template(&fx, employee);
            for (h, m) in [(8, 0), (17, 0)] {
                seed_punch(&fx, employee, date(2026, 3, 2), h, m);
            }
        }

        let results = fx.service.compute_batch(ComputeBatchQuery {
            employee_ids: employees.clone(),
            year: 2026,
            month: 3,
            as_of: Some(date(2026, 3, 3)),
        });
        assert!(results.iter().all(|r| r.ok));

        // Concurrent workers share the same files; nobody's rows may be
        // overwritten by a neighbour's rewrite.
        for employee in &employees {
            let sheet = fx.service.get(employee, 2026, 3).unwrap();
            assert!(sheet.is_some(), "timesheet missing for {}", employee);
            let records = fx.service.daily_records(employee, 2026, 3).unwrap();
            assert_eq!(records.len(), 3, "daily records missing for {}", employee);
        }
    }

    #[test]
    fn batch_approval_only_takes_closed_timesheets() {
        let (_dir, fx) = fixture(EngineConfig::default());
        seed_weekly_template(&fx, "emp-1");
        seed_weekly_template(&fx, "emp-2");
        for employee in ["emp-1", "emp-2"] {
            fx.service
                .compute(march_query(employee, date(2026, 3, 2)))
                .unwrap();
        }
        fx.service
            .close(TimesheetTransitionCommand {
                employee_id: "emp-1".to_string(),
                year: 2026,
                month: 3,
                actor: None,
            })
            .unwrap();

        let employees = vec!["emp-1".to_string(), "emp-2".to_string()];
        let results = fx.service.approve_batch(&employees, 2026, 3, None);
        assert!(results[0].ok);
        assert!(!results[1].ok);

        let sheet = fx.service.get("emp-1", 2026, 3).unwrap().unwrap();
        assert_eq!(sheet.status, TimesheetStatus::Approved);
        let sheet = fx.service.get("emp-2", 2026, 3).unwrap().unwrap();
        assert_eq!(sheet.status, TimesheetStatus::Open);
    }
}
