//! Schedule resolution: what an employee is expected to work on a date.
//!
//! Resolution never fails on missing configuration. An employee without a
//! template falls back to the engine defaults so reconciliation can always
//! run; the gap shows up in review, not as an aborted batch.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use log::debug;

use crate::config::EngineConfig;
use crate::domain::errors::EngineResult;
use crate::domain::models::{
    DayOverride, DayOverrideKind, Holiday, ResolvedDay, ScheduleModel, ScheduleTemplate,
};
use crate::storage::traits::{CalendarStorage, Connection, PunchStorage, ScheduleStorage};

/// Resolve one date against a template, the calendar, and (for rotating
/// shifts) the cycle anchor date. Pure; the service wraps this with storage.
pub fn resolve_day(
    config: &EngineConfig,
    date: NaiveDate,
    template: Option<&ScheduleTemplate>,
    holidays: &[Holiday],
    overrides: &[DayOverride],
    rotation_anchor: NaiveDate,
) -> ResolvedDay {
    let model = template.map(|t| t.model).unwrap_or(ScheduleModel::FixedWeekly);

    // Calendar exceptions win over any model.
    if let Some(day_override) = overrides.iter().find(|o| o.date == date) {
        let as_holiday = day_override.kind == DayOverrideKind::Holiday;
        return ResolvedDay::rest(model, as_holiday);
    }
    if holidays.iter().any(|h| h.matches(date)) {
        return ResolvedDay::rest(model, true);
    }

    let Some(template) = template else {
        return resolve_default(config, date.weekday());
    };

    match template.model {
        ScheduleModel::FixedWeekly | ScheduleModel::Continuous => {
            resolve_weekly(template, date.weekday())
        }
        ScheduleModel::RotatingShift => resolve_rotating(template, date, rotation_anchor),
    }
}

/// No-template fallback: Monday through Friday at the configured default
/// load, weekends rest.
fn resolve_default(config: &EngineConfig, weekday: Weekday) -> ResolvedDay {
    if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        return ResolvedDay::rest(ScheduleModel::FixedWeekly, false);
    }
    ResolvedDay {
        model: ScheduleModel::FixedWeekly,
        expected_minutes: config.default_daily_minutes,
        is_rest_day: false,
        is_holiday: false,
        first_start: None,
        last_end: None,
        expected_punches: 2,
        entry_tolerance_minutes: config.default_tolerance_minutes,
        exit_tolerance_minutes: config.default_tolerance_minutes,
        has_paid_break: false,
    }
}

fn resolve_weekly(template: &ScheduleTemplate, weekday: Weekday) -> ResolvedDay {
    let row = match template.weekday_hours(weekday) {
        Some(row) if !row.rest => row,
        _ => return ResolvedDay::rest(template.model, false),
    };
    let expected = row.expected_minutes();
    if expected == 0 {
        return ResolvedDay::rest(template.model, false);
    }

    // A half-day row can only produce one pair, whatever the break policy.
    let expected_punches = if template.model == ScheduleModel::Continuous {
        2
    } else if template.has_paid_break && row.has_afternoon() {
        4
    } else {
        2
    };

    ResolvedDay {
        model: template.model,
        expected_minutes: expected,
        is_rest_day: false,
        is_holiday: false,
        first_start: row.entry_1,
        last_end: row.exit_2.or(row.exit_1),
        expected_punches,
        entry_tolerance_minutes: template.entry_tolerance_minutes,
        exit_tolerance_minutes: template.exit_tolerance_minutes,
        has_paid_break: template.has_paid_break,
    }
}

fn resolve_rotating(
    template: &ScheduleTemplate,
    date: NaiveDate,
    anchor: NaiveDate,
) -> ResolvedDay {
    let (Some(work_hours), Some(rest_hours)) = (template.work_hours, template.rest_hours) else {
        // Misconfigured roster: assume every day is a working day so the
        // time still gets reconciled.
        return rotating_work_day(template);
    };
    let cycle_hours = work_hours + rest_hours;
    if cycle_hours <= 0 {
        return rotating_work_day(template);
    }

    // Cycle projected from the anchor, truncated to day starts.
    let hours_since = (date - anchor).num_days() * 24;
    let position = hours_since.rem_euclid(cycle_hours);
    if position < work_hours {
        rotating_work_day(template)
    } else {
        ResolvedDay::rest(template.model, false)
    }
}

fn rotating_work_day(template: &ScheduleTemplate) -> ResolvedDay {
    let expected = if template.daily_minutes > 0 {
        template.daily_minutes
    } else {
        template.work_hours.unwrap_or(0) * 60
    };
    ResolvedDay {
        model: template.model,
        expected_minutes: expected,
        is_rest_day: false,
        is_holiday: false,
        first_start: None,
        last_end: None,
        expected_punches: if template.has_paid_break { 4 } else { 2 },
        entry_tolerance_minutes: template.entry_tolerance_minutes,
        exit_tolerance_minutes: template.exit_tolerance_minutes,
        has_paid_break: template.has_paid_break,
    }
}

pub struct ScheduleService<C: Connection> {
    schedule_repo: C::ScheduleRepository,
    calendar_repo: C::CalendarRepository,
    punch_repo: C::PunchRepository,
    config: EngineConfig,
}

impl<C: Connection> ScheduleService<C> {
    pub fn new(connection: &C, config: EngineConfig) -> Self {
        ScheduleService {
            schedule_repo: connection.create_schedule_repository(),
            calendar_repo: connection.create_calendar_repository(),
            punch_repo: connection.create_punch_repository(),
            config,
        }
    }

    pub fn template(&self, employee_id: &str) -> EngineResult<Option<ScheduleTemplate>> {
        Ok(self.schedule_repo.get_template(employee_id)?)
    }

    pub fn store_template(&self, template: &ScheduleTemplate) -> EngineResult<()> {
        Ok(self.schedule_repo.store_template(template)?)
    }

    pub fn holidays(&self, from: NaiveDate, to: NaiveDate) -> EngineResult<Vec<Holiday>> {
        Ok(self.calendar_repo.list_holidays(from, to)?)
    }

    pub fn overrides(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<DayOverride>> {
        Ok(self.calendar_repo.list_overrides(employee_id, from, to)?)
    }

    /// Anchor for the rotating-shift cycle: the reporting date of the last
    /// punch before the period. An employee with no history anchors at the
    /// period start itself.
    pub fn rotation_anchor(
        &self,
        employee_id: &str,
        period_start: NaiveDate,
    ) -> EngineResult<NaiveDate> {
        let offset = self.config.reporting_offset();
        let midnight = period_start
            .and_hms_opt(0, 0, 0)
            .and_then(|t| t.and_local_timezone(offset).single())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default());

        match self.punch_repo.latest_punch_before(employee_id, midnight)? {
            Some(punch) => Ok(punch.reporting_date(offset)),
            None => {
                debug!(
                    "no punch history for employee {}, anchoring rotation at {}",
                    employee_id, period_start
                );
                Ok(period_start)
            }
        }
    }

    /// Full resolution for a single date, fetching everything it needs.
    pub fn resolve(&self, employee_id: &str, date: NaiveDate) -> EngineResult<ResolvedDay> {
        let template = self.template(employee_id)?;
        let holidays = self.holidays(date, date)?;
        let overrides = self.overrides(employee_id, date, date)?;
        let anchor = match template {
            Some(ref t) if t.model == ScheduleModel::RotatingShift => {
                self.rotation_anchor(employee_id, date)?
            }
            _ => date,
        };
        Ok(resolve_day(
            &self.config,
            date,
            template.as_ref(),
            &holidays,
            &overrides,
            anchor,
        ))
    }
}
