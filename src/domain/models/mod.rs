//! Domain models shared across services and storage.

pub mod anomaly;
pub mod daily_record;
pub mod ledger;
pub mod punch;
pub mod schedule;
pub mod timesheet;

pub use anomaly::{Anomaly, AnomalyKind};
pub use daily_record::{AnomalyTag, DailyRecord};
pub use ledger::{LedgerConfig, LedgerEntry, LedgerOperation, LedgerOrigin};
pub use punch::{PunchDirection, PunchEvent, PunchOrigin};
pub use schedule::{
    DayOverride, DayOverrideKind, Holiday, ResolvedDay, ScheduleModel, ScheduleTemplate,
    WeekdayHours,
};
pub use timesheet::{HistoryEntry, Timesheet, TimesheetStatus, TimesheetTotals};
