//! Schedule templates and the day-resolution output.
//!
//! A template describes what an employee *should* work; resolution turns it
//! into concrete expectations for one calendar date (see the schedule
//! service). Three models are supported: fixed weekly tables, rotating
//! shifts (e.g. 12x36), and continuous operation rosters.

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// The scheduling model a template follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleModel {
    /// Same weekday table every week.
    FixedWeekly,
    /// Alternating blocks of work and rest hours (12x36 and friends).
    RotatingShift,
    /// Round-the-clock operation; behaves like a rotating shift for
    /// projection but is monitored differently.
    Continuous,
}

impl ScheduleModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleModel::FixedWeekly => "FIXED_WEEKLY",
            ScheduleModel::RotatingShift => "ROTATING_SHIFT",
            ScheduleModel::Continuous => "CONTINUOUS",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ROTATING_SHIFT" => ScheduleModel::RotatingShift,
            "CONTINUOUS" => ScheduleModel::Continuous,
            _ => ScheduleModel::FixedWeekly,
        }
    }
}

/// Expected times for one weekday of a fixed-weekly template.
///
/// The morning pair is `entry_1`/`exit_1`; the afternoon pair only counts
/// when both endpoints are configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayHours {
    pub weekday: Weekday,
    pub entry_1: Option<NaiveTime>,
    pub exit_1: Option<NaiveTime>,
    pub entry_2: Option<NaiveTime>,
    pub exit_2: Option<NaiveTime>,
    /// Marks the whole day as rest regardless of any configured times.
    pub rest: bool,
}

impl WeekdayHours {
    /// Expected minutes implied by the configured pairs.
    pub fn expected_minutes(&self) -> i64 {
        let mut total = 0i64;
        if let (Some(entry), Some(exit)) = (self.entry_1, self.exit_1) {
            total += (exit - entry).num_minutes();
        }
        if let (Some(entry), Some(exit)) = (self.entry_2, self.exit_2) {
            total += (exit - entry).num_minutes();
        }
        total
    }

    /// Whether the afternoon pair is fully configured.
    pub fn has_afternoon(&self) -> bool {
        self.entry_2.is_some() && self.exit_2.is_some()
    }
}

/// An employee's schedule assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: String,
    pub employee_id: String,
    pub model: ScheduleModel,
    /// Expected worked minutes on a working day.
    pub daily_minutes: i64,
    pub entry_tolerance_minutes: i64,
    pub exit_tolerance_minutes: i64,
    /// Break is inside paid time; a break punch pair is still expected.
    pub has_paid_break: bool,
    pub break_minutes: i64,
    /// Rotating/continuous only: hours on shift per block.
    pub work_hours: Option<i64>,
    /// Rotating/continuous only: hours off between blocks.
    pub rest_hours: Option<i64>,
    /// Fixed-weekly only: per-weekday expected times.
    pub weekdays: Vec<WeekdayHours>,
}

impl ScheduleTemplate {
    pub fn weekday_hours(&self, weekday: Weekday) -> Option<&WeekdayHours> {
        self.weekdays.iter().find(|w| w.weekday == weekday)
    }
}

/// Calendar exception kinds for a single employee and date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOverrideKind {
    Holiday,
    Absence,
    DayOff,
}

impl DayOverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOverrideKind::Holiday => "HOLIDAY",
            DayOverrideKind::Absence => "ABSENCE",
            DayOverrideKind::DayOff => "DAY_OFF",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "HOLIDAY" => DayOverrideKind::Holiday,
            "ABSENCE" => DayOverrideKind::Absence,
            _ => DayOverrideKind::DayOff,
        }
    }
}

/// A per-employee calendar exception (approved absence, compensated day off,
/// employee-specific holiday).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOverride {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub kind: DayOverrideKind,
    pub reason: Option<String>,
}

/// A company holiday. Recurring holidays match on month/day every year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub recurring: bool,
}

impl Holiday {
    pub fn matches(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        if self.recurring {
            self.date.month() == date.month() && self.date.day() == date.day()
        } else {
            self.date == date
        }
    }
}

/// The concrete expectation for one employee on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDay {
    pub model: ScheduleModel,
    pub expected_minutes: i64,
    pub is_rest_day: bool,
    pub is_holiday: bool,
    /// First configured start time, used for delay measurement. None on rest
    /// days and for templates with no weekday table.
    pub first_start: Option<NaiveTime>,
    /// Last configured end time, used by the live monitor.
    pub last_end: Option<NaiveTime>,
    /// How many punches a complete day produces (2 or 4).
    pub expected_punches: u32,
    pub entry_tolerance_minutes: i64,
    pub exit_tolerance_minutes: i64,
    pub has_paid_break: bool,
}

impl ResolvedDay {
    /// A day with nothing expected (rest, holiday, or approved off).
    pub fn rest(model: ScheduleModel, is_holiday: bool) -> Self {
        ResolvedDay {
            model,
            expected_minutes: 0,
            is_rest_day: true,
            is_holiday,
            first_start: None,
            last_end: None,
            expected_punches: 0,
            entry_tolerance_minutes: 0,
            exit_tolerance_minutes: 0,
            has_paid_break: false,
        }
    }
}
