//! Date/time functions
//!
//! Dates are serial numbers in the 1900 date system, see [`crate::datetime`].
//!
//! Notes:
//! - Arguments accept serials, numeric text and date text.
//! - Serials before 1900-03-01 are off by one day against spreadsheets that keep the
//!   fictitious 1900-02-29.

use chrono::{Datelike, Local, NaiveDate};

use crate::context::ParsingContext;
use crate::datetime::{
    add_days, add_months, date_to_serial, datetime_to_serial, days_in_month, days_in_year,
    is_leap_year, is_last_day_of_february, parse_date_time, parse_time, serial_to_date,
    time_parts, MAX_SERIAL, SECONDS_PER_DAY,
};
use crate::error::{FormulaError, FormulaResult};
use crate::value::{parse_number_text, CompileResult, ExcelError, FunctionArgument, Value};

use super::args::{
    arg_to_bool, arg_to_date, arg_to_decimal, arg_to_int, arg_value, arg_values, optional,
};
use super::workday::WorkdayCalculator;

/// Date part of a date argument; negative serials are `#NUM!`
fn date_arg(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<NaiveDate> {
    let serial = arg_to_date(arg, ctx)?;
    if serial < 0.0 {
        return Err(ExcelError::Num.into());
    }
    Ok(serial_to_date(serial).ok_or(ExcelError::Num)?)
}

fn date_result(date: Option<NaiveDate>) -> CompileResult {
    match date.map(date_to_serial) {
        Some(serial) if (0.0..=MAX_SERIAL).contains(&serial) => CompileResult::date(serial),
        _ => CompileResult::error(ExcelError::Num),
    }
}

/// DATE function
///
/// Months and days outside their normal range roll into neighbouring months and years.
pub fn fn_date(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let mut year = arg_to_int(&args[0], ctx)?;
    let month = arg_to_int(&args[1], ctx)?;
    let day = arg_to_int(&args[2], ctx)?;

    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) {
        return Ok(CompileResult::error(ExcelError::Num));
    }

    let Some(month_index) = (year * 12).checked_add(month).and_then(|m| m.checked_sub(1)) else {
        return Ok(CompileResult::error(ExcelError::Num));
    };
    let year = i32::try_from(month_index.div_euclid(12)).ok();
    let month = month_index.rem_euclid(12) as u32 + 1;
    let date = year
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, 1))
        .and_then(|first| add_days(first, day.checked_sub(1)?));
    Ok(date_result(date))
}

/// YEAR function
pub fn fn_year(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(f64::from(date_arg(&args[0], ctx)?.year())))
}

/// MONTH function
pub fn fn_month(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(f64::from(date_arg(&args[0], ctx)?.month())))
}

/// DAY function
pub fn fn_day(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(f64::from(date_arg(&args[0], ctx)?.day())))
}

/// WEEKDAY function
///
/// Return type 1 numbers Sunday..Saturday 1..7, type 2 Monday..Sunday 1..7 and type 3
/// Monday..Sunday 0..6.
pub fn fn_weekday(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let date = date_arg(&args[0], ctx)?;
    let return_type = match optional(args, 1) {
        Some(arg) => arg_to_int(arg, ctx)?,
        None => 1,
    };
    let weekday = date.weekday();
    let number = match return_type {
        1 => weekday.number_from_sunday(),
        2 => weekday.number_from_monday(),
        3 => weekday.num_days_from_monday(),
        _ => return Ok(CompileResult::error(ExcelError::Num)),
    };
    Ok(CompileResult::integer(f64::from(number)))
}

/// TODAY function
pub fn fn_today(
    _args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::date(date_to_serial(Local::now().date_naive())))
}

/// NOW function
pub fn fn_now(
    _args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::date(datetime_to_serial(Local::now().naive_local())))
}

/// DAYS function: days from start to end
pub fn fn_days(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let end = date_arg(&args[0], ctx)?;
    let start = date_arg(&args[1], ctx)?;
    Ok(CompileResult::integer((end - start).num_days() as f64))
}

fn time_part(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
    pick: impl Fn((u32, u32, u32)) -> u32,
) -> FormulaResult<CompileResult> {
    let serial = arg_to_date(&args[0], ctx)?;
    if serial < 0.0 {
        return Ok(CompileResult::error(ExcelError::Num));
    }
    let parts = time_parts(serial).ok_or(ExcelError::Num)?;
    Ok(CompileResult::integer(f64::from(pick(parts))))
}

/// HOUR function
pub fn fn_hour(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    time_part(args, ctx, |(h, _, _)| h)
}

/// MINUTE function
pub fn fn_minute(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    time_part(args, ctx, |(_, m, _)| m)
}

/// SECOND function
pub fn fn_second(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    time_part(args, ctx, |(_, _, s)| s)
}

/// Day count convention for DAYS360
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Days360Method {
    /// NASD rules
    Us,
    European,
}

/// Days between two dates on a 360-day year
pub fn days360(start: NaiveDate, end: NaiveDate, method: Days360Method) -> i64 {
    let mut start_day = start.day();
    let mut end_day = end.day();

    match method {
        Days360Method::Us => {
            // Both February checks use the start year's February
            let february_end = days_in_month(start.year(), 2);
            let start_is_last_of_feb = start.month() == 2 && start_day == february_end;
            let end_is_last_of_feb = end.month() == 2 && end_day == february_end;

            if start_is_last_of_feb && end_is_last_of_feb {
                end_day = 30;
            }
            if start_is_last_of_feb {
                start_day = 30;
            }
            if end_day == 31 && start_day >= 30 {
                end_day = 30;
            }
            if start_day == 31 {
                start_day = 30;
            }
        }
        Days360Method::European => {
            start_day = start_day.min(30);
            end_day = end_day.min(30);
        }
    }

    let serial = |year: i32, month: u32, day: u32| {
        i64::from(year) * 360 + i64::from(month) * 30 + i64::from(day)
    };
    serial(end.year(), end.month(), end_day) - serial(start.year(), start.month(), start_day)
}

/// DAYS360 function
pub fn fn_days360(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let start = date_arg(&args[0], ctx)?;
    let end = date_arg(&args[1], ctx)?;
    let european = match optional(args, 2) {
        Some(arg) => arg_to_bool(arg, ctx)?,
        None => false,
    };
    let method = if european {
        Days360Method::European
    } else {
        Days360Method::Us
    };
    Ok(CompileResult::integer(days360(start, end, method) as f64))
}

/// Call DAYS360 through the function repository
fn days360_via_repository(
    start: NaiveDate,
    end: NaiveDate,
    european: bool,
    ctx: &ParsingContext<'_>,
) -> FormulaResult<f64> {
    let function = ctx
        .repository()
        .get("days360")
        .ok_or_else(|| FormulaError::UnknownFunction("days360".to_string()))?;
    let args = [
        FunctionArgument::new(date_to_serial(start)),
        FunctionArgument::new(date_to_serial(end)),
        FunctionArgument::new(european),
    ];
    let result = function.execute(&args, ctx)?;
    match result.value {
        Value::Number(n) => Ok(n),
        Value::Error(e) => Err(e.into()),
        _ => Err(ExcelError::Value.into()),
    }
}

/// YEARFRAC function
///
/// Basis 0 US 30/360, 1 actual/actual, 2 actual/360, 3 actual/365, 4 European 30/360.
pub fn fn_yearfrac(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let mut first = date_arg(&args[0], ctx)?;
    let mut second = date_arg(&args[1], ctx)?;
    if second < first {
        std::mem::swap(&mut first, &mut second);
    }
    let basis = match optional(args, 2) {
        Some(arg) => arg_to_int(arg, ctx)?,
        None => 0,
    };
    let actual_days = (second - first).num_days() as f64;

    let fraction = match basis {
        0 => {
            let mut days = days360_via_repository(first, second, false, ctx)?.abs();
            if first.month() == 2 && second.day() == 31 && is_last_day_of_february(first) {
                days += 1.0;
            }
            days / 360.0
        }
        1 => actual_days / actual_year_length(first, second),
        2 => actual_days / 360.0,
        3 => actual_days / 365.0,
        4 => days360_via_repository(first, second, true, ctx)? / 360.0,
        _ => return Ok(CompileResult::error(ExcelError::Num)),
    };
    Ok(CompileResult::number(fraction))
}

/// Year length for actual/actual: 365 or 366 within a year, the average over longer spans
fn actual_year_length(first: NaiveDate, second: NaiveDate) -> f64 {
    let within_a_year = add_months(first, 12).is_some_and(|next| next >= second);
    if within_a_year {
        let spans_leap_day = (is_leap_year(first.year()) && first.month() <= 2)
            || (is_leap_year(second.year()) && second.month() > 2)
            || (second.month() == 2 && second.day() == 29);
        return if spans_leap_day { 366.0 } else { 365.0 };
    }
    let years = first.year()..=second.year();
    let count = years.clone().count() as f64;
    let total: u32 = years.map(days_in_year).sum();
    f64::from(total) / count
}

/// EDATE function: same day a number of months away
pub fn fn_edate(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let start = date_arg(&args[0], ctx)?;
    let months = arg_to_int(&args[1], ctx)?;
    let months = i32::try_from(months).map_err(|_| ExcelError::Num)?;
    Ok(date_result(add_months(start, months)))
}

/// EOMONTH function: last day of the month a number of months away
pub fn fn_eomonth(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let start = date_arg(&args[0], ctx)?;
    let months = arg_to_int(&args[1], ctx)?;
    let months = i32::try_from(months).map_err(|_| ExcelError::Num)?;
    let end = start
        .with_day(1)
        .and_then(|first| add_months(first, months.saturating_add(1)))
        .and_then(|next| next.pred_opt());
    Ok(date_result(end))
}

/// TIME function
///
/// Takes hour, minute and second, or a single time text.
pub fn fn_time(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    if args.len() == 1 {
        return Ok(match arg_value(&args[0], ctx)? {
            Value::String(text) => parse_time(&text)
                .map(CompileResult::time)
                .unwrap_or_else(|| CompileResult::error(ExcelError::Value)),
            Value::Error(e) => CompileResult::error(e),
            _ => CompileResult::error(ExcelError::Value),
        });
    }
    if args.len() != 3 {
        return Ok(CompileResult::error(ExcelError::Value));
    }

    let hour = arg_to_decimal(&args[0], ctx)?.trunc();
    let minute = arg_to_decimal(&args[1], ctx)?.trunc();
    let second = arg_to_decimal(&args[2], ctx)?.trunc();
    if !(0.0..=23.0).contains(&hour)
        || !(0.0..=59.0).contains(&minute)
        || !(0.0..=59.0).contains(&second)
    {
        return Ok(CompileResult::error(ExcelError::Value));
    }
    let seconds = hour * 3600.0 + minute * 60.0 + second;
    Ok(CompileResult::time(seconds / SECONDS_PER_DAY))
}

/// DATEVALUE function: serial of a date text, time of day dropped
pub fn fn_datevalue(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let text = match arg_value(&args[0], ctx)? {
        Value::String(text) => text,
        Value::Error(e) => return Ok(CompileResult::error(e)),
        _ => return Ok(CompileResult::error(ExcelError::Value)),
    };
    Ok(match parse_date_time(&text) {
        Some(serial) => CompileResult::date(serial.floor()),
        None => CompileResult::error(ExcelError::Value),
    })
}

/// Holiday dates from an optional range, array or single value
fn holidays(
    args: &[FunctionArgument],
    index: usize,
    ctx: &ParsingContext<'_>,
) -> FormulaResult<Vec<NaiveDate>> {
    let Some(arg) = optional(args, index) else {
        return Ok(Vec::new());
    };
    let mut dates = Vec::new();
    for item in arg_values(std::slice::from_ref(arg), ctx)? {
        let serial = match item.value {
            Value::Number(n) => Some(n),
            Value::String(s) => parse_number_text(&s),
            Value::Error(e) => return Err(e.into()),
            _ => None,
        };
        if let Some(date) = serial.filter(|s| *s >= 0.0).and_then(serial_to_date) {
            dates.push(date);
        }
    }
    Ok(dates)
}

/// WORKDAY function
pub fn fn_workday(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let start = date_arg(&args[0], ctx)?;
    let workdays = arg_to_int(&args[1], ctx)?;
    let holidays = holidays(args, 2, ctx)?;
    let calculator = WorkdayCalculator::from_configuration(ctx.configuration());

    let result = calculator
        .calculate_workday(start, workdays)
        .and_then(|walk| calculator.adjust_result_with_holidays(walk, &holidays));
    Ok(date_result(result.map(|r| r.end_date)))
}

/// NETWORKDAYS function
///
/// An end date before the start counts backwards and gives a negative number of days.
pub fn fn_networkdays(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let start = date_arg(&args[0], ctx)?;
    let end = date_arg(&args[1], ctx)?;
    let holidays = holidays(args, 2, ctx)?;
    let calculator = WorkdayCalculator::from_configuration(ctx.configuration());

    let Some(count) = calculator.calculate_number_of_workdays(start, end) else {
        return Ok(CompileResult::error(ExcelError::Num));
    };
    let count = calculator.reduce_workdays_with_holidays(count, &holidays);
    Ok(CompileResult::integer(count.number_of_workdays as f64))
}
