//! File-based reference backend: one CSV file per data family.

pub mod anomaly_repository;
pub mod calendar_repository;
pub mod connection;
pub mod ledger_repository;
pub mod punch_repository;
pub mod record_repository;
pub mod schedule_repository;
pub mod timesheet_repository;

pub use anomaly_repository::AnomalyRepository;
pub use calendar_repository::CalendarRepository;
pub use connection::CsvConnection;
pub use ledger_repository::LedgerRepository;
pub use punch_repository::PunchRepository;
pub use record_repository::RecordRepository;
pub use schedule_repository::ScheduleRepository;
pub use timesheet_repository::TimesheetRepository;
