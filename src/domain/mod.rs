//! Domain layer: models, services and business rules.
//!
//! Services own their repositories and expose the engine's operations;
//! everything below the storage traits is swappable.

pub mod anomaly_service;
pub mod commands;
pub mod daily_service;
pub mod errors;
pub mod ledger_service;
pub mod models;
pub mod notifier;
pub mod punch_service;
pub mod schedule_service;
pub mod timesheet_service;

pub use anomaly_service::AnomalyService;
pub use daily_service::DailyCalculator;
pub use errors::{EngineError, EngineResult};
pub use ledger_service::LedgerService;
pub use notifier::{LogNotifier, Notifier, Recipient};
pub use punch_service::PunchService;
pub use schedule_service::ScheduleService;
pub use timesheet_service::TimesheetService;
