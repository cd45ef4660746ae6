//! CSV file backend plumbing.
//!
//! One CSV file per data family under a base directory, rewritten whole on
//! every mutation through a temp-file rename. A connection-wide lock
//! serializes mutations within the process; anything concurrent across
//! processes wants a real database behind the same traits.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::FixedOffset;
use csv::{Reader, StringRecord, Writer};

use crate::config::EngineConfig;
use crate::storage::traits::Connection;

use super::anomaly_repository::AnomalyRepository;
use super::calendar_repository::CalendarRepository;
use super::ledger_repository::LedgerRepository;
use super::punch_repository::PunchRepository;
use super::record_repository::RecordRepository;
use super::schedule_repository::ScheduleRepository;
use super::timesheet_repository::TimesheetRepository;

/// Default reporting offset for date filtering, UTC-03:00.
const DEFAULT_OFFSET_SECONDS: i32 = -3 * 3600;

#[derive(Clone)]
pub struct CsvConnection {
    base_directory: Arc<PathBuf>,
    reporting_offset: FixedOffset,
    write_lock: Arc<Mutex<()>>,
}

impl CsvConnection {
    /// Connection rooted at `base_directory`, filtering punch dates in the
    /// default UTC-03:00 reporting offset. The directory is created lazily
    /// on first write.
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Self {
        let offset = FixedOffset::east_opt(DEFAULT_OFFSET_SECONDS)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self::with_offset(base_directory, offset)
    }

    /// Connection whose date filtering uses the reporting offset of the
    /// given engine configuration. Prefer this over [`CsvConnection::new`]
    /// whenever the offset is not the default.
    pub fn for_config<P: AsRef<Path>>(base_directory: P, config: &EngineConfig) -> Self {
        Self::with_offset(base_directory, config.reporting_offset())
    }

    /// Connection with an explicit reporting offset; must match the offset
    /// the engine is configured with.
    pub fn with_offset<P: AsRef<Path>>(base_directory: P, offset: FixedOffset) -> Self {
        CsvConnection {
            base_directory: Arc::new(base_directory.as_ref().to_path_buf()),
            reporting_offset: offset,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn reporting_offset(&self) -> FixedOffset {
        self.reporting_offset
    }

    /// Serializes every read-modify-rewrite cycle across all repositories
    /// cloned from this connection. Without it, parallel batch workers read
    /// the same file state and the last rewrite wins, dropping the other
    /// workers' rows.
    pub(crate) fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_directory.join(name)
    }

    fn ensure_file(&self, name: &str, header: &[&str]) -> Result<PathBuf> {
        let path = self.file_path(name);
        if !path.exists() {
            fs::create_dir_all(self.base_directory.as_ref())?;
            let file = File::create(&path)?;
            let mut writer = Writer::from_writer(BufWriter::new(file));
            writer.write_record(header)?;
            writer.flush()?;
        }
        Ok(path)
    }

    /// All data rows of a file (header excluded), creating it empty if
    /// missing.
    pub(crate) fn read_rows(&self, name: &str, header: &[&str]) -> Result<Vec<StringRecord>> {
        let path = self.ensure_file(name, header)?;
        let file = File::open(&path)?;
        let mut reader = Reader::from_reader(BufReader::new(file));
        let mut rows = Vec::new();
        for result in reader.records() {
            rows.push(result?);
        }
        Ok(rows)
    }

    /// Rewrite a whole file atomically: header plus the given rows. Callers
    /// hold the write guard, so one temp file per target is enough.
    pub(crate) fn write_rows(
        &self,
        name: &str,
        header: &[&str],
        rows: &[Vec<String>],
    ) -> Result<()> {
        fs::create_dir_all(self.base_directory.as_ref())?;
        let path = self.file_path(name);
        let temp_path = path.with_extension("tmp");
        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            let mut writer = Writer::from_writer(BufWriter::new(file));
            writer.write_record(header)?;
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Append one row, creating the file with its header if needed.
    pub(crate) fn append_row(&self, name: &str, header: &[&str], row: &[String]) -> Result<()> {
        let path = self.ensure_file(name, header)?;
        let file = OpenOptions::new().append(true).open(&path)?;
        let mut writer = Writer::from_writer(BufWriter::new(file));
        writer.write_record(row)?;
        writer.flush()?;
        Ok(())
    }
}

impl Connection for CsvConnection {
    type PunchRepository = PunchRepository;
    type ScheduleRepository = ScheduleRepository;
    type CalendarRepository = CalendarRepository;
    type RecordRepository = RecordRepository;
    type TimesheetRepository = TimesheetRepository;
    type LedgerRepository = LedgerRepository;
    type AnomalyRepository = AnomalyRepository;

    fn create_punch_repository(&self) -> PunchRepository {
        PunchRepository::new(self.clone())
    }

    fn create_schedule_repository(&self) -> ScheduleRepository {
        ScheduleRepository::new(self.clone())
    }

    fn create_calendar_repository(&self) -> CalendarRepository {
        CalendarRepository::new(self.clone())
    }

    fn create_record_repository(&self) -> RecordRepository {
        RecordRepository::new(self.clone())
    }

    fn create_timesheet_repository(&self) -> TimesheetRepository {
        TimesheetRepository::new(self.clone())
    }

    fn create_ledger_repository(&self) -> LedgerRepository {
        LedgerRepository::new(self.clone())
    }

    fn create_anomaly_repository(&self) -> AnomalyRepository {
        AnomalyRepository::new(self.clone())
    }
}
