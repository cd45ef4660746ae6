//! Daily reconciliation: one day's punches against the resolved schedule.
//!
//! Pure calculation, no storage. The period closer feeds it day by day and
//! persists the results.

use chrono::{FixedOffset, NaiveDate};

use crate::config::EngineConfig;
use crate::domain::models::{AnomalyTag, DailyRecord, PunchEvent, ResolvedDay};
use crate::domain::punch_service::worked_minutes;

/// Single punch-pair span above which a break punch pair was clearly
/// skipped (minutes).
const MISSING_BREAK_THRESHOLD: i64 = 6 * 60;

pub struct DailyCalculator {
    offset: FixedOffset,
}

impl DailyCalculator {
    pub fn new(config: &EngineConfig) -> Self {
        DailyCalculator {
            offset: config.reporting_offset(),
        }
    }

    /// Reconcile one employee-day. `punches` must be sorted ascending.
    pub fn reconcile(
        &self,
        employee_id: &str,
        date: NaiveDate,
        punches: &[PunchEvent],
        day: &ResolvedDay,
    ) -> DailyRecord {
        let worked = worked_minutes(punches);
        let mut record = DailyRecord {
            id: String::new(),
            employee_id: employee_id.to_string(),
            date,
            schedule_model: day.model,
            expected_minutes: day.expected_minutes,
            worked_minutes: worked,
            delay_minutes: 0,
            overtime_minutes: 0,
            shortfall_minutes: 0,
            is_absence: false,
            is_rest_day: day.is_rest_day,
            is_holiday: day.is_holiday,
            punch_count: punches.len() as u32,
            tags: Vec::new(),
        };

        if punches.len() % 2 == 1 {
            record.tags.push(AnomalyTag::OddPunchCount);
        }

        if day.is_rest_day || day.is_holiday {
            // Any time worked on a rest day or holiday is overtime outright.
            if worked > 0 {
                record.overtime_minutes = worked;
                record.tags.push(AnomalyTag::WorkOnRestDay);
            }
            return record;
        }

        if punches.is_empty() {
            record.is_absence = true;
            return record;
        }

        if let Some(expected_start) = day.first_start {
            let first = punches[0].timestamp.with_timezone(&self.offset).time();
            let diff = (first - expected_start).num_minutes();
            if diff > day.entry_tolerance_minutes {
                record.delay_minutes = diff - day.entry_tolerance_minutes;
            }
        }

        let (overtime, shortfall) =
            outcome(worked, day.expected_minutes, day.exit_tolerance_minutes);
        record.overtime_minutes = overtime;
        record.shortfall_minutes = shortfall;

        if (punches.len() as u32) < day.expected_punches {
            record.tags.push(AnomalyTag::IncompletePunches);
        }
        if day.expected_punches == 4 && punches.len() == 2 && worked > MISSING_BREAK_THRESHOLD {
            record.tags.push(AnomalyTag::MissingBreakPunch);
        }

        record
    }
}

/// Overtime/shortfall split of `worked − expected` after the exit tolerance.
/// At most one of the two is non-zero.
pub fn outcome(worked: i64, expected: i64, exit_tolerance: i64) -> (i64, i64) {
    let diff = worked - expected;
    if diff > exit_tolerance {
        (diff - exit_tolerance, 0)
    } else if diff < -exit_tolerance {
        (0, -diff - exit_tolerance)
    } else {
        (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PunchDirection, PunchOrigin, ScheduleModel};
    use chrono::{NaiveTime, TimeZone, Utc};

    // Punch instants are given as wall time in the default UTC-03:00
    // reporting offset.
    fn punch(date: NaiveDate, hour: u32, min: u32) -> PunchEvent {
        let local = date.and_hms_opt(hour, min, 0).unwrap();
        let offset = EngineConfig::default().reporting_offset();
        let timestamp = offset
            .from_local_datetime(&local)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        PunchEvent {
            id: format!("p-{}-{}", hour, min),
            employee_id: "emp-1".to_string(),
            timestamp,
            direction: PunchDirection::Unknown,
            origin: PunchOrigin::Device,
        }
    }

    fn workday() -> ResolvedDay {
        ResolvedDay {
            model: ScheduleModel::FixedWeekly,
            expected_minutes: 480,
            is_rest_day: false,
            is_holiday: false,
            first_start: NaiveTime::from_hms_opt(8, 0, 0),
            last_end: NaiveTime::from_hms_opt(17, 0, 0),
            expected_punches: 4,
            entry_tolerance_minutes: 10,
            exit_tolerance_minutes: 10,
            has_paid_break: true,
        }
    }

    fn calculator() -> DailyCalculator {
        DailyCalculator::new(&EngineConfig::default())
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn full_day_within_tolerance_has_no_findings() {
        let d = monday();
        let punches = vec![
            punch(d, 8, 5),
            punch(d, 12, 0),
            punch(d, 13, 0),
            punch(d, 17, 0),
        ];
        let record = calculator().reconcile("emp-1", d, &punches, &workday());
        assert_eq!(record.worked_minutes, 475);
        assert_eq!(record.delay_minutes, 0);
        assert_eq!(record.overtime_minutes, 0);
        assert_eq!(record.shortfall_minutes, 0);
        assert!(!record.is_absence);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn two_punches_on_a_break_day_flag_incomplete_and_missing_break() {
        let d = monday();
        let punches = vec![punch(d, 8, 0), punch(d, 17, 0)];
        let record = calculator().reconcile("emp-1", d, &punches, &workday());
        assert!(record.has_tag(AnomalyTag::IncompletePunches));
        assert!(record.has_tag(AnomalyTag::MissingBreakPunch));
        assert_eq!(record.worked_minutes, 540);
        // 540 worked over 480 expected with 10 tolerance.
        assert_eq!(record.overtime_minutes, 50);
    }

    #[test]
    fn rest_day_work_is_all_overtime() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(); // Sunday
        let punches = vec![punch(d, 9, 0), punch(d, 11, 0)];
        let day = ResolvedDay::rest(ScheduleModel::FixedWeekly, false);
        let record = calculator().reconcile("emp-1", d, &punches, &day);
        assert_eq!(record.worked_minutes, 120);
        assert_eq!(record.overtime_minutes, 120);
        assert_eq!(record.shortfall_minutes, 0);
        assert_eq!(record.delay_minutes, 0);
        assert!(record.has_tag(AnomalyTag::WorkOnRestDay));
    }

    #[test]
    fn empty_rest_day_is_not_an_absence() {
        let d = monday();
        let day = ResolvedDay::rest(ScheduleModel::FixedWeekly, false);
        let record = calculator().reconcile("emp-1", d, &[], &day);
        assert!(!record.is_absence);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn empty_workday_is_an_absence() {
        let record = calculator().reconcile("emp-1", monday(), &[], &workday());
        assert!(record.is_absence);
        assert_eq!(record.worked_minutes, 0);
        assert_eq!(record.shortfall_minutes, 0);
    }

    #[test]
    fn late_arrival_beyond_tolerance_registers_delay() {
        let d = monday();
        let punches = vec![
            punch(d, 8, 25),
            punch(d, 12, 0),
            punch(d, 13, 0),
            punch(d, 17, 0),
        ];
        let record = calculator().reconcile("emp-1", d, &punches, &workday());
        // 25 past the start, 10 tolerated.
        assert_eq!(record.delay_minutes, 15);
    }

    #[test]
    fn shortfall_applies_tolerance_before_counting() {
        let d = monday();
        let punches = vec![
            punch(d, 8, 0),
            punch(d, 12, 0),
            punch(d, 13, 0),
            punch(d, 16, 30),
        ];
        let record = calculator().reconcile("emp-1", d, &punches, &workday());
        // 450 worked, 30 short, 10 tolerated.
        assert_eq!(record.shortfall_minutes, 20);
        assert_eq!(record.overtime_minutes, 0);
    }

    #[test]
    fn odd_punch_count_is_tagged_and_trailing_punch_ignored() {
        let d = monday();
        let punches = vec![punch(d, 8, 0), punch(d, 12, 0), punch(d, 13, 0)];
        let record = calculator().reconcile("emp-1", d, &punches, &workday());
        assert!(record.has_tag(AnomalyTag::OddPunchCount));
        assert_eq!(record.worked_minutes, 240);
    }

    #[test]
    fn outcome_split_is_exclusive() {
        assert_eq!(outcome(500, 480, 10), (10, 0));
        assert_eq!(outcome(460, 480, 10), (0, 10));
        assert_eq!(outcome(485, 480, 10), (0, 0));
        assert_eq!(outcome(475, 480, 10), (0, 0));
    }
}
