//! Hour-bank ledger: postings, balance, caps and locks.
//!
//! The read-balance/compute/append triad runs under a per-process mutex so
//! concurrent manual postings and approval batches cannot interleave and
//! lose an update. A SQL backend would use a transaction instead; the file
//! backend shipped here has no such facility.

use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::domain::commands::{CompensateCommand, PostLedgerEntryCommand};
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    LedgerConfig, LedgerEntry, LedgerOperation, LedgerOrigin, TimesheetStatus,
};
use crate::domain::notifier::{Notifier, Recipient};
use crate::storage::traits::{Connection, LedgerStorage, TimesheetStorage};

pub struct LedgerService<C: Connection> {
    ledger_repo: C::LedgerRepository,
    timesheet_repo: C::TimesheetRepository,
    notifier: Arc<dyn Notifier>,
    write_lock: Mutex<()>,
}

impl<C: Connection> LedgerService<C> {
    pub fn new(connection: &C, notifier: Arc<dyn Notifier>) -> Self {
        LedgerService {
            ledger_repo: connection.create_ledger_repository(),
            timesheet_repo: connection.create_timesheet_repository(),
            notifier,
            write_lock: Mutex::new(()),
        }
    }

    /// Current policy; a missing stored config means the defaults apply.
    pub fn config(&self) -> EngineResult<LedgerConfig> {
        Ok(self.ledger_repo.read_config()?.unwrap_or_default())
    }

    pub fn store_config(&self, config: &LedgerConfig) -> EngineResult<()> {
        Ok(self.ledger_repo.store_config(config)?)
    }

    /// Signed running balance in minutes. Insertion order does not affect
    /// the sum; the frozen before/after columns only exist for audit.
    pub fn balance(&self, employee_id: &str) -> EngineResult<i64> {
        let entries = self.ledger_repo.list_entries(employee_id)?;
        Ok(entries
            .iter()
            .map(|e| e.operation.signed(e.minutes))
            .sum())
    }

    pub fn entries(&self, employee_id: &str) -> EngineResult<Vec<LedgerEntry>> {
        Ok(self.ledger_repo.list_entries(employee_id)?)
    }

    /// Post a manual entry, subject to every guard: policy enabled,
    /// duplicate prevention, period lock, accumulation caps.
    pub fn post(&self, cmd: PostLedgerEntryCommand) -> EngineResult<LedgerEntry> {
        self.post_guarded(cmd, false)
    }

    /// Spend banked minutes. Same guards as `post`, plus the balance must
    /// cover the requested amount.
    pub fn compensate(&self, cmd: CompensateCommand) -> EngineResult<LedgerEntry> {
        if cmd.minutes <= 0 {
            return Err(EngineError::Validation(
                "compensation must be a positive number of minutes".to_string(),
            ));
        }
        self.post_guarded(
            PostLedgerEntryCommand {
                employee_id: cmd.employee_id,
                date: cmd.date,
                operation: LedgerOperation::Compensation,
                minutes: cmd.minutes,
                reason: cmd.reason,
            },
            true,
        )
    }

    fn post_guarded(
        &self,
        cmd: PostLedgerEntryCommand,
        require_cover: bool,
    ) -> EngineResult<LedgerEntry> {
        let config = self.config()?;
        if !config.enabled {
            return Err(EngineError::LedgerDisabled);
        }
        if cmd.minutes == 0 {
            return Err(EngineError::Validation(
                "a ledger entry needs a non-zero number of minutes".to_string(),
            ));
        }
        if cmd.minutes < 0 && cmd.operation != LedgerOperation::Adjustment {
            return Err(EngineError::Validation(format!(
                "{} entries take a positive magnitude",
                cmd.operation.as_str()
            )));
        }

        if self
            .ledger_repo
            .manual_entry_exists(&cmd.employee_id, cmd.date, cmd.operation)?
        {
            return Err(EngineError::DuplicateLedgerEntry {
                employee_id: cmd.employee_id,
                date: cmd.date,
            });
        }
        self.ensure_period_open(&cmd.employee_id, cmd.date)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EngineError::Validation("ledger lock poisoned".to_string()))?;

        let balance = self.balance(&cmd.employee_id)?;
        let signed = cmd.operation.signed(cmd.minutes);
        if require_cover && balance < cmd.minutes {
            return Err(EngineError::InsufficientBalance {
                available: balance,
                requested: cmd.minutes,
            });
        }
        let would_be = balance + signed;
        if would_be > config.positive_cap_minutes || would_be < -config.negative_cap_minutes {
            return Err(EngineError::AccumulationLimitExceeded {
                current: balance,
                would_be,
                positive_cap: config.positive_cap_minutes,
                negative_cap: config.negative_cap_minutes,
            });
        }

        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            employee_id: cmd.employee_id,
            date: cmd.date,
            operation: cmd.operation,
            minutes: cmd.minutes,
            origin: LedgerOrigin::Manual,
            reason: cmd.reason,
            balance_before: balance,
            balance_after: would_be,
            created_at: Utc::now(),
        };
        self.ledger_repo.append_entry(&entry)?;
        info!(
            "ledger {} of {} min for employee {} on {} (balance {} -> {})",
            entry.operation.as_str(),
            entry.minutes,
            entry.employee_id,
            entry.date,
            balance,
            would_be
        );

        self.near_cap_alert(&entry.employee_id, balance, would_be, &config);
        Ok(entry)
    }

    /// Replace the `TIMESHEET`-origin postings of one month with fresh ones
    /// from an approval: a credit for overtime then a debit for shortfall.
    /// Caps and the duplicate guard do not apply to approval postings.
    pub fn post_timesheet_results(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
        effective_date: NaiveDate,
        overtime_minutes: i64,
        shortfall_minutes: i64,
    ) -> EngineResult<Vec<LedgerEntry>> {
        let config = self.config()?;
        if !config.enabled {
            info!("hour bank disabled, skipping postings for employee {}", employee_id);
            return Ok(Vec::new());
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EngineError::Validation("ledger lock poisoned".to_string()))?;

        let removed =
            self.ledger_repo
                .delete_entries(employee_id, year, month, LedgerOrigin::Timesheet)?;
        if removed > 0 {
            info!(
                "removed {} stale timesheet postings for employee {} in {:02}/{}",
                removed, employee_id, month, year
            );
        }

        let credit = if config.convert_overtime_premium {
            overtime_minutes * config.premium_multiplier_pct / 100
        } else {
            overtime_minutes
        };

        let mut posted = Vec::new();
        let mut balance = self.balance(employee_id)?;
        for (operation, minutes) in [
            (LedgerOperation::Credit, credit),
            (LedgerOperation::Debit, shortfall_minutes),
        ] {
            if minutes <= 0 {
                continue;
            }
            let after = balance + operation.signed(minutes);
            let entry = LedgerEntry {
                id: Uuid::new_v4().to_string(),
                employee_id: employee_id.to_string(),
                date: effective_date,
                operation,
                minutes,
                origin: LedgerOrigin::Timesheet,
                reason: Some(format!("timesheet {:02}/{}", month, year)),
                balance_before: balance,
                balance_after: after,
                created_at: Utc::now(),
            };
            self.ledger_repo.append_entry(&entry)?;
            self.near_cap_alert(employee_id, balance, after, &config);
            balance = after;
            posted.push(entry);
        }
        Ok(posted)
    }

    /// Drop the timesheet-origin postings of one month; used when an
    /// approved timesheet is rejected or reopened.
    pub fn reverse_timesheet_postings(
        &self,
        employee_id: &str,
        year: i32,
        month: u32,
    ) -> EngineResult<usize> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EngineError::Validation("ledger lock poisoned".to_string()))?;
        let removed =
            self.ledger_repo
                .delete_entries(employee_id, year, month, LedgerOrigin::Timesheet)?;
        info!(
            "reversed {} timesheet postings for employee {} in {:02}/{}",
            removed, employee_id, month, year
        );
        Ok(removed)
    }

    fn ensure_period_open(&self, employee_id: &str, date: NaiveDate) -> EngineResult<()> {
        let sheet = self
            .timesheet_repo
            .get_timesheet(employee_id, date.year(), date.month())?;
        if matches!(sheet, Some(s) if s.status == TimesheetStatus::Approved) {
            return Err(EngineError::PeriodLocked {
                year: date.year(),
                month: date.month(),
            });
        }
        Ok(())
    }

    /// Warn the employee and HR once when the balance crosses 80% of a cap.
    /// At most one warning per employee per day, however often the balance
    /// oscillates around the threshold.
    fn near_cap_alert(&self, employee_id: &str, before: i64, after: i64, config: &LedgerConfig) {
        let positive_threshold = config.positive_cap_minutes * 80 / 100;
        let negative_threshold = config.negative_cap_minutes * 80 / 100;
        let crossed = (before < positive_threshold && after >= positive_threshold)
            || (before > -negative_threshold && after <= -negative_threshold);
        if !crossed {
            return;
        }
        let today = Utc::now().date_naive();
        match self.ledger_repo.cap_alert_sent(employee_id, today) {
            Ok(true) => return,
            Ok(false) => {}
            Err(err) => warn!("near-cap alert lookup failed: {:#}", err),
        }
        if let Err(err) = self.ledger_repo.record_cap_alert(employee_id, today) {
            warn!("near-cap alert bookkeeping failed: {:#}", err);
        }
        let message = format!(
            "hour-bank balance for employee {} reached {} minutes, near the configured limit",
            employee_id, after
        );
        for recipient in [Recipient::Employee(employee_id.to_string()), Recipient::HrStaff] {
            if let Err(err) = self.notifier.notify(recipient, &message) {
                warn!("near-cap notification failed: {:#}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notifier::LogNotifier;
    use crate::storage::csv::CsvConnection;
    use tempfile::tempdir;

    fn service(dir: &std::path::Path) -> LedgerService<CsvConnection> {
        let connection = CsvConnection::new(dir);
        LedgerService::new(&connection, Arc::new(LogNotifier))
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn credit(employee: &str, d: u32, minutes: i64) -> PostLedgerEntryCommand {
        PostLedgerEntryCommand {
            employee_id: employee.to_string(),
            date: date(d),
            operation: LedgerOperation::Credit,
            minutes,
            reason: None,
        }
    }

    #[test]
    fn balance_is_the_signed_sum_of_entries() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());

        ledger.post(credit("emp-1", 2, 120)).unwrap();
        ledger
            .post(PostLedgerEntryCommand {
                employee_id: "emp-1".to_string(),
                date: date(3),
                operation: LedgerOperation::Debit,
                minutes: 30,
                reason: None,
            })
            .unwrap();
        ledger
            .post(PostLedgerEntryCommand {
                employee_id: "emp-1".to_string(),
                date: date(4),
                operation: LedgerOperation::Adjustment,
                minutes: -15,
                reason: Some("clock drift".to_string()),
            })
            .unwrap();

        assert_eq!(ledger.balance("emp-1").unwrap(), 75);
        let entries = ledger.entries("emp-1").unwrap();
        assert_eq!(entries.last().unwrap().balance_after, 75);
    }

    #[test]
    fn posting_over_the_cap_is_rejected_with_both_balances() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());
        ledger.post(credit("emp-1", 1, 2300)).unwrap();

        let err = ledger.post(credit("emp-1", 2, 150)).unwrap_err();
        match err {
            EngineError::AccumulationLimitExceeded {
                current, would_be, ..
            } => {
                assert_eq!(current, 2300);
                assert_eq!(would_be, 2450);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.balance("emp-1").unwrap(), 2300);
    }

    #[test]
    fn duplicate_manual_entry_is_rejected() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());
        ledger.post(credit("emp-1", 2, 60)).unwrap();

        let err = ledger.post(credit("emp-1", 2, 90)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateLedgerEntry { .. }));
    }

    #[test]
    fn compensation_needs_a_covering_balance() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());
        ledger.post(credit("emp-1", 1, 100)).unwrap();

        let err = ledger
            .compensate(CompensateCommand {
                employee_id: "emp-1".to_string(),
                date: date(2),
                minutes: 150,
                reason: None,
            })
            .unwrap_err();
        match err {
            EngineError::InsufficientBalance {
                available,
                requested,
            } => {
                assert_eq!(available, 100);
                assert_eq!(requested, 150);
            }
            other => panic!("unexpected error: {other}"),
        }

        ledger
            .compensate(CompensateCommand {
                employee_id: "emp-1".to_string(),
                date: date(2),
                minutes: 40,
                reason: None,
            })
            .unwrap();
        assert_eq!(ledger.balance("emp-1").unwrap(), 60);
    }

    #[test]
    fn disabled_ledger_rejects_postings() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());
        ledger
            .store_config(&LedgerConfig {
                enabled: false,
                ..LedgerConfig::default()
            })
            .unwrap();

        let err = ledger.post(credit("emp-1", 1, 60)).unwrap_err();
        assert!(matches!(err, EngineError::LedgerDisabled));
    }

    #[test]
    fn near_cap_warning_goes_out_once_per_day() {
        struct CapturingNotifier(Mutex<Vec<String>>);
        impl Notifier for CapturingNotifier {
            fn notify(&self, _recipient: Recipient, message: &str) -> anyhow::Result<()> {
                self.0.lock().unwrap().push(message.to_string());
                Ok(())
            }
        }

        let dir = tempdir().unwrap();
        let connection = CsvConnection::new(dir.path());
        let notifier = Arc::new(CapturingNotifier(Mutex::new(Vec::new())));
        let ledger = LedgerService::new(&connection, notifier.clone());

        // 80% of the 2400 positive cap is 1920.
        ledger.post(credit("emp-1", 1, 1920)).unwrap();
        let sent = notifier.0.lock().unwrap().len();
        assert_eq!(sent, 2, "employee and HR each get the first warning");

        // Dip below the threshold and cross it again the same day.
        ledger
            .post(PostLedgerEntryCommand {
                employee_id: "emp-1".to_string(),
                date: date(2),
                operation: LedgerOperation::Debit,
                minutes: 100,
                reason: None,
            })
            .unwrap();
        ledger.post(credit("emp-1", 3, 150)).unwrap();

        assert_eq!(ledger.balance("emp-1").unwrap(), 1970);
        assert_eq!(notifier.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn timesheet_postings_replace_prior_ones() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());

        ledger
            .post_timesheet_results("emp-1", 2026, 3, date(31), 90, 20)
            .unwrap();
        assert_eq!(ledger.balance("emp-1").unwrap(), 70);

        // Re-approval after recomputation must not double-post.
        ledger
            .post_timesheet_results("emp-1", 2026, 3, date(31), 60, 0)
            .unwrap();
        assert_eq!(ledger.balance("emp-1").unwrap(), 60);
    }

    #[test]
    fn premium_conversion_scales_the_credit() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());
        ledger
            .store_config(&LedgerConfig {
                convert_overtime_premium: true,
                premium_multiplier_pct: 150,
                ..LedgerConfig::default()
            })
            .unwrap();

        ledger
            .post_timesheet_results("emp-1", 2026, 3, date(31), 100, 0)
            .unwrap();
        assert_eq!(ledger.balance("emp-1").unwrap(), 150);
    }

    #[test]
    fn reversal_drops_only_timesheet_origin_entries() {
        let dir = tempdir().unwrap();
        let ledger = service(dir.path());
        ledger.post(credit("emp-1", 1, 50)).unwrap();
        ledger
            .post_timesheet_results("emp-1", 2026, 3, date(31), 80, 0)
            .unwrap();
        assert_eq!(ledger.balance("emp-1").unwrap(), 130);

        ledger.reverse_timesheet_postings("emp-1", 2026, 3).unwrap();
        assert_eq!(ledger.balance("emp-1").unwrap(), 50);
    }
}
