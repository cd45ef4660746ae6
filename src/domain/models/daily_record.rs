//! The reconciled result for one employee-day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::schedule::ScheduleModel;

/// Flags signalling that a day needs human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyTag {
    /// Odd punch count; the dangling punch was ignored for worked time.
    OddPunchCount,
    /// Fewer punches than the schedule expects.
    IncompletePunches,
    /// Punches recorded on a rest day or holiday.
    WorkOnRestDay,
    /// Single long span where the schedule expects a break punch pair.
    MissingBreakPunch,
    /// Date precedes the configured system start; day was neutralized.
    BeforeSystemStart,
    /// Overnight shift split across a closing boundary.
    ShiftCrossesClosing,
}

impl AnomalyTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyTag::OddPunchCount => "ODD_PUNCH_COUNT",
            AnomalyTag::IncompletePunches => "INCOMPLETE_PUNCHES",
            AnomalyTag::WorkOnRestDay => "WORK_ON_REST_DAY",
            AnomalyTag::MissingBreakPunch => "MISSING_BREAK_PUNCH",
            AnomalyTag::BeforeSystemStart => "BEFORE_SYSTEM_START",
            AnomalyTag::ShiftCrossesClosing => "SHIFT_CROSSES_CLOSING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ODD_PUNCH_COUNT" => Some(AnomalyTag::OddPunchCount),
            "INCOMPLETE_PUNCHES" => Some(AnomalyTag::IncompletePunches),
            "WORK_ON_REST_DAY" => Some(AnomalyTag::WorkOnRestDay),
            "MISSING_BREAK_PUNCH" => Some(AnomalyTag::MissingBreakPunch),
            "BEFORE_SYSTEM_START" => Some(AnomalyTag::BeforeSystemStart),
            "SHIFT_CROSSES_CLOSING" => Some(AnomalyTag::ShiftCrossesClosing),
            _ => None,
        }
    }
}

/// One employee-day after reconciliation against the resolved schedule.
///
/// All durations are whole minutes. Exactly one of the outcome fields
/// (`overtime_minutes`, `shortfall_minutes`) can be non-zero, and
/// `delay_minutes` is carried separately because a late arrival can still
/// end in overtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub schedule_model: ScheduleModel,
    pub expected_minutes: i64,
    pub worked_minutes: i64,
    pub delay_minutes: i64,
    pub overtime_minutes: i64,
    pub shortfall_minutes: i64,
    pub is_absence: bool,
    pub is_rest_day: bool,
    pub is_holiday: bool,
    pub punch_count: u32,
    pub tags: Vec<AnomalyTag>,
}

impl DailyRecord {
    /// A neutral record for a date the engine deliberately ignores.
    pub fn neutral(employee_id: &str, date: NaiveDate, model: ScheduleModel) -> Self {
        DailyRecord {
            id: String::new(),
            employee_id: employee_id.to_string(),
            date,
            schedule_model: model,
            expected_minutes: 0,
            worked_minutes: 0,
            delay_minutes: 0,
            overtime_minutes: 0,
            shortfall_minutes: 0,
            is_absence: false,
            is_rest_day: false,
            is_holiday: false,
            punch_count: 0,
            tags: Vec::new(),
        }
    }

    pub fn has_tag(&self, tag: AnomalyTag) -> bool {
        self.tags.contains(&tag)
    }
}
