//! Serial date helpers
//!
//! Dates are day counts from 1899-12-30 (the OLE automation base used by the 1900 date system),
//! with the time of day as the fractional part. Serials below 61 therefore differ by one day
//! from spreadsheets that emulate the fictitious 1900-02-29.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Seconds in one serial day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Serial of 9999-12-31, the last representable date
pub const MAX_SERIAL: f64 = 2_958_465.0;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y", "%d %b %Y", "%d %B %Y", "%B %d, %Y",
    "%b %d, %Y", "%B %d %Y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Serial number of a date
pub fn date_to_serial(date: NaiveDate) -> f64 {
    epoch()
        .map(|base| (date - base).num_days() as f64)
        .unwrap_or_default()
}

/// Serial number of a date-time
pub fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    date_to_serial(dt.date()) + time_to_fraction(dt.time())
}

/// Fraction of a day for a time of day
pub fn time_to_fraction(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 / SECONDS_PER_DAY
}

/// Check that a serial lies between 1899-12-30 and the end of 9999-12-31
pub fn is_valid_serial(serial: f64) -> bool {
    serial.is_finite() && serial >= 0.0 && serial.floor() <= MAX_SERIAL
}

/// Date part of a serial (the fraction is dropped)
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !is_valid_serial(serial) {
        return None;
    }
    add_days(epoch()?, serial.floor() as i64)
}

/// Date-time for a serial, rounded to the nearest second
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !is_valid_serial(serial) {
        return None;
    }
    let base = epoch()?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    base.checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Move a date by a (possibly negative) number of days
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

/// Parse text as a date, a date-time or a time of day
pub fn parse_date_time(text: &str) -> Option<f64> {
    let text = text.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date_to_serial(date));
        }
        for time_format in TIME_FORMATS {
            let combined = format!("{} {}", format, time_format);
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, &combined) {
                return Some(datetime_to_serial(dt));
            }
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime_to_serial(dt));
    }
    parse_time(text)
}

/// Parse text as a time of day, returning the day fraction
pub fn parse_time(text: &str) -> Option<f64> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
        .map(time_to_fraction)
}

/// Check for a Gregorian leap year
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in a month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Number of days in a year
pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Check if the date is the last day of February
pub fn is_last_day_of_february(date: NaiveDate) -> bool {
    date.month() == 2 && date.day() == days_in_month(date.year(), 2)
}

/// Add a (possibly negative) number of months, clamping the day to the month's end
pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// Hour, minute and second of a serial's time part
pub fn time_parts(serial: f64) -> Option<(u32, u32, u32)> {
    let dt = serial_to_datetime(serial)?;
    Some((dt.hour(), dt.minute(), dt.second()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_serial_round_trip() {
        assert_eq!(date_to_serial(ymd(2021, 1, 1)), 44197.0);
        assert_eq!(date_to_serial(ymd(1900, 3, 1)), 61.0);
        assert_eq!(serial_to_date(44197.75), Some(ymd(2021, 1, 1)));
        assert_eq!(time_parts(44197.75), Some((18, 0, 0)));
    }

    #[test]
    fn test_parse_date_time() {
        assert_eq!(parse_date_time("2021-01-01"), Some(44197.0));
        assert_eq!(parse_date_time("1/1/2021"), Some(44197.0));
        assert_eq!(parse_date_time("01-Jan-2021"), Some(44197.0));
        assert_eq!(parse_date_time("2021-01-01 12:00"), Some(44197.5));
        assert_eq!(parse_date_time("6:00 PM"), Some(0.75));
        assert_eq!(parse_date_time("not a date"), None);
    }

    #[test]
    fn test_month_helpers() {
        assert_eq!(days_in_month(2020, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert!(is_last_day_of_february(ymd(2021, 2, 28)));
        assert!(!is_last_day_of_february(ymd(2020, 2, 28)));
        assert_eq!(add_months(ymd(2021, 1, 31), 1), Some(ymd(2021, 2, 28)));
        assert_eq!(add_months(ymd(2021, 3, 31), -1), Some(ymd(2021, 2, 28)));
    }

    #[test]
    fn test_serials_outside_the_calendar() {
        assert_eq!(serial_to_date(MAX_SERIAL), Some(ymd(9999, 12, 31)));
        assert_eq!(serial_to_date(MAX_SERIAL + 1.0), None);
        assert_eq!(serial_to_date(-1.0), None);
        assert_eq!(serial_to_date(1e15), None);
        assert_eq!(serial_to_date(f64::NAN), None);
        assert_eq!(serial_to_datetime(1e15), None);
        assert_eq!(time_parts(-1e300), None);
        assert_eq!(add_days(ymd(2021, 1, 1), i64::MAX), None);
        assert_eq!(add_days(ymd(2021, 1, 1), -1), Some(ymd(2020, 12, 31)));
    }
}
