//! Time-attendance reconciliation engine.
//!
//! Turns raw clock punches into reconciled daily records and monthly
//! timesheets, maintains an hour-bank ledger with caps and period locks,
//! and watches the current day for punching anomalies. Persistence is
//! abstracted behind [`storage::traits::Connection`]; a CSV reference
//! backend ships in [`storage::csv`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use timeclock_engine::{Engine, EngineConfig};
//! use timeclock_engine::domain::LogNotifier;
//! use timeclock_engine::storage::csv::CsvConnection;
//!
//! let config = EngineConfig::default();
//! let connection = CsvConnection::for_config("./data", &config);
//! let engine = Engine::new(connection, config, Arc::new(LogNotifier));
//! let balance = engine.ledger.balance("emp-1");
//! ```

pub mod config;
pub mod domain;
pub mod storage;

pub use config::EngineConfig;
pub use domain::errors::{EngineError, EngineResult};

use std::sync::Arc;

use domain::{
    AnomalyService, LedgerService, Notifier, PunchService, ScheduleService, TimesheetService,
};
use storage::traits::Connection;

/// Facade wiring every service to one storage backend and one
/// configuration. Fields are public so callers pick the service they need.
pub struct Engine<C: Connection> {
    pub punches: PunchService<C>,
    pub schedules: ScheduleService<C>,
    pub timesheets: TimesheetService<C>,
    pub ledger: Arc<LedgerService<C>>,
    pub anomalies: AnomalyService<C>,
}

impl<C: Connection> Engine<C> {
    pub fn new(connection: C, config: EngineConfig, notifier: Arc<dyn Notifier>) -> Self {
        let ledger = Arc::new(LedgerService::new(&connection, notifier.clone()));
        Engine {
            punches: PunchService::new(&connection, config.clone()),
            schedules: ScheduleService::new(&connection, config.clone()),
            timesheets: TimesheetService::new(
                &connection,
                config.clone(),
                ledger.clone(),
                notifier.clone(),
            ),
            anomalies: AnomalyService::new(&connection, config, notifier),
            ledger,
        }
    }
}
