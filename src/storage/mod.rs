//! Persistence layer: backend-agnostic traits plus the CSV reference
//! implementation.

pub mod csv;
pub mod traits;

pub use traits::{
    AnomalyStorage, CalendarStorage, Connection, LedgerStorage, PunchStorage, RecordStorage,
    ScheduleStorage, TimesheetStorage,
};
