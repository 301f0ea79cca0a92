//! Working day arithmetic for WORKDAY and NETWORKDAYS

use ahash::AHashSet;
use chrono::{Datelike, NaiveDate, Weekday};

use crate::config::ParsingConfiguration;
use crate::datetime::add_days;

/// Walking direction of a calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkdayDirection {
    Forward,
    Backward,
}

impl WorkdayDirection {
    fn step(self) -> i64 {
        match self {
            WorkdayDirection::Forward => 1,
            WorkdayDirection::Backward => -1,
        }
    }
}

/// Outcome of a workday calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkdayCalculatorResult {
    /// Working days between the dates, negative when walking backward
    pub number_of_workdays: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub direction: WorkdayDirection,
}

/// Counts and walks working days over a configurable weekend
#[derive(Debug, Clone)]
pub struct WorkdayCalculator {
    weekend: Vec<Weekday>,
}

impl Default for WorkdayCalculator {
    fn default() -> Self {
        Self::new(vec![Weekday::Sat, Weekday::Sun])
    }
}

impl WorkdayCalculator {
    pub fn new(weekend: Vec<Weekday>) -> Self {
        Self { weekend }
    }

    pub fn from_configuration(config: &ParsingConfiguration) -> Self {
        Self::new(config.weekend.clone())
    }

    pub fn is_workday(&self, date: NaiveDate) -> bool {
        !self.weekend.contains(&date.weekday())
    }

    /// Working days in one week
    fn workdays_per_week(&self) -> i64 {
        let distinct: AHashSet<Weekday> = self.weekend.iter().copied().collect();
        7 - distinct.len() as i64
    }

    /// Count working days from `start` to `end`, both included
    pub fn calculate_number_of_workdays(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<WorkdayCalculatorResult> {
        let direction = if end < start {
            WorkdayDirection::Backward
        } else {
            WorkdayDirection::Forward
        };
        let (from, to) = if end < start { (end, start) } else { (start, end) };

        let total_days = (to - from).num_days() + 1;
        let weeks = total_days / 7;
        let mut count = weeks * self.workdays_per_week();
        let rest = total_days % 7;
        if rest > 0 {
            let tail = add_days(from, weeks * 7)?;
            count += tail
                .iter_days()
                .take(rest as usize)
                .filter(|day| self.is_workday(*day))
                .count() as i64;
        }

        Some(WorkdayCalculatorResult {
            number_of_workdays: count * direction.step(),
            start_date: start,
            end_date: end,
            direction,
        })
    }

    /// Walk `workdays` working days from `start`; the start itself is not counted
    ///
    /// `None` when the walk leaves the calendar.
    pub fn calculate_workday(
        &self,
        start: NaiveDate,
        workdays: i64,
    ) -> Option<WorkdayCalculatorResult> {
        let direction = if workdays < 0 {
            WorkdayDirection::Backward
        } else {
            WorkdayDirection::Forward
        };
        let per_week = self.workdays_per_week();
        if per_week == 0 {
            return None;
        }

        let mut remaining = workdays.checked_abs()?;
        let mut current = start;
        if remaining > 0 {
            let weeks = (remaining - 1) / per_week;
            current = add_days(current, weeks.checked_mul(7 * direction.step())?)?;
            remaining -= weeks * per_week;
        }
        while remaining > 0 {
            current = add_days(current, direction.step())?;
            if self.is_workday(current) {
                remaining -= 1;
            }
        }

        Some(WorkdayCalculatorResult {
            number_of_workdays: workdays,
            start_date: start,
            end_date: current,
            direction,
        })
    }

    /// Remove holidays from a day count
    ///
    /// Only holidays on working days inside the counted span are removed, each at most once.
    pub fn reduce_workdays_with_holidays(
        &self,
        result: WorkdayCalculatorResult,
        holidays: &[NaiveDate],
    ) -> WorkdayCalculatorResult {
        let (from, to) = ordered(result.start_date, result.end_date);
        let distinct: AHashSet<NaiveDate> = holidays
            .iter()
            .copied()
            .filter(|h| *h >= from && *h <= to && self.is_workday(*h))
            .collect();
        let removed = distinct.len() as i64 * result.direction.step();
        WorkdayCalculatorResult {
            number_of_workdays: result.number_of_workdays - removed,
            ..result
        }
    }

    /// Push the end of a walk past holidays that fall inside it
    pub fn adjust_result_with_holidays(
        &self,
        result: WorkdayCalculatorResult,
        holidays: &[NaiveDate],
    ) -> Option<WorkdayCalculatorResult> {
        if result.number_of_workdays == 0 || holidays.is_empty() {
            return Some(result);
        }
        let holiday_set: AHashSet<NaiveDate> = holidays.iter().copied().collect();
        let mut counted: AHashSet<NaiveDate> = AHashSet::new();
        let mut end = result.end_date;

        loop {
            let (from, to) = ordered(result.start_date, end);
            let newly_spanned: Vec<NaiveDate> = holiday_set
                .iter()
                .copied()
                .filter(|h| {
                    *h != result.start_date
                        && *h >= from
                        && *h <= to
                        && self.is_workday(*h)
                        && !counted.contains(h)
                })
                .collect();
            if newly_spanned.is_empty() {
                break;
            }
            for holiday in newly_spanned {
                if counted.insert(holiday) {
                    end = self.next_workday(end, result.direction, &holiday_set, &mut counted)?;
                }
            }
        }

        Some(WorkdayCalculatorResult {
            end_date: end,
            ..result
        })
    }

    /// The next working day that is not a holiday, walking in `direction`
    ///
    /// Holidays stepped over on the way are recorded in `skipped`.
    fn next_workday(
        &self,
        from: NaiveDate,
        direction: WorkdayDirection,
        holidays: &AHashSet<NaiveDate>,
        skipped: &mut AHashSet<NaiveDate>,
    ) -> Option<NaiveDate> {
        let mut current = from;
        loop {
            current = add_days(current, direction.step())?;
            if !self.is_workday(current) {
                continue;
            }
            if !holidays.contains(&current) {
                return Some(current);
            }
            skipped.insert(current);
        }
    }
}

fn ordered(a: NaiveDate, b: NaiveDate) -> (NaiveDate, NaiveDate) {
    if b < a {
        (b, a)
    } else {
        (a, b)
    }
}
