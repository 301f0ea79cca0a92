//! Number format codes and their rendering
//!
//! Supports the parts of the Excel format language that formulas observe through `TEXT`
//! and the data provider's `get_format`: up to four `;`-separated sections, digit
//! placeholders (`0 # ?`), thousands separators and scaling commas, percent, scientific
//! notation, quoted/escaped literals, `@` text placeholders, and date/time codes.
//! Colors and conditions in brackets are ignored.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Number format for cell display
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    /// General format (default)
    #[default]
    General,

    /// Built-in format by ID
    BuiltIn(u32),

    /// Custom format string
    Custom(String),
}

impl NumberFormat {
    /// 0 - General
    pub const ID_GENERAL: u32 = 0;
    /// 2 - 0.00
    pub const ID_NUMBER_DEC2: u32 = 2;
    /// 4 - #,##0.00
    pub const ID_NUMBER_SEP_DEC2: u32 = 4;
    /// 10 - 0.00%
    pub const ID_PERCENT_DEC2: u32 = 10;
    /// 14 - mm-dd-yy
    pub const ID_DATE_SHORT: u32 = 14;
    /// 49 - @
    pub const ID_TEXT: u32 = 49;

    /// Create a number format from a format string
    ///
    /// "General" (any case) maps to [`NumberFormat::General`].
    pub fn from_string<S: Into<String>>(format: S) -> Self {
        let format = format.into();
        if format.eq_ignore_ascii_case("general") || format.is_empty() {
            NumberFormat::General
        } else {
            NumberFormat::Custom(format)
        }
    }

    /// Create a built-in format by ID
    pub fn from_id(id: u32) -> Self {
        NumberFormat::BuiltIn(id)
    }

    /// Get the format string
    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::BuiltIn(id) => Self::builtin_format_string(*id),
            NumberFormat::Custom(s) => s,
        }
    }

    fn builtin_format_string(id: u32) -> &'static str {
        match id {
            1 => "0",
            2 => "0.00",
            3 => "#,##0",
            4 => "#,##0.00",
            9 => "0%",
            10 => "0.00%",
            11 => "0.00E+00",
            14 => "mm-dd-yy",
            15 => "d-mmm-yy",
            16 => "d-mmm",
            17 => "mmm-yy",
            18 => "h:mm AM/PM",
            19 => "h:mm:ss AM/PM",
            20 => "h:mm",
            21 => "h:mm:ss",
            22 => "m/d/yy h:mm",
            49 => "@",
            _ => "General",
        }
    }

    /// Check if this is a date/time format
    pub fn is_date_format(&self) -> bool {
        match self {
            NumberFormat::General => false,
            _ => split_sections(self.format_string())
                .first()
                .map(|s| lex_section(s).iter().any(FormatPart::is_date_time))
                .unwrap_or(false),
        }
    }

    /// Render a number through this format
    ///
    /// # Examples
    /// ```
    /// use sheetcalc_core::NumberFormat;
    ///
    /// assert_eq!(NumberFormat::from_string("#,##0.00").render(1234.5), "1,234.50");
    /// assert_eq!(NumberFormat::from_string("0%").render(0.256), "26%");
    /// assert_eq!(NumberFormat::from_string("yyyy-mm-dd").render(44197.0), "2021-01-01");
    /// ```
    pub fn render(&self, value: f64) -> String {
        let format = self.format_string();
        if format.eq_ignore_ascii_case("general") {
            return format_general(value);
        }

        let sections = split_sections(format);
        let (section, negative_section) = match sections.len() {
            0 => return format_general(value),
            1 => (&sections[0], false),
            2 => {
                if value < 0.0 {
                    (&sections[1], true)
                } else {
                    (&sections[0], false)
                }
            }
            _ => {
                if value < 0.0 {
                    (&sections[1], true)
                } else if value == 0.0 {
                    (&sections[2], false)
                } else {
                    (&sections[0], false)
                }
            }
        };

        let parts = lex_section(section);
        if parts.iter().any(FormatPart::is_date_time) {
            return render_date_time(value, &parts);
        }
        if !parts.iter().any(FormatPart::is_digit) {
            return render_text_parts(&format_general(value), &parts);
        }

        // A dedicated negative section supplies its own sign
        let sign = if value < 0.0 && !negative_section {
            "-"
        } else {
            ""
        };
        let body = render_number(value.abs(), &parts);
        if sign.is_empty() || body.chars().all(|c| !c.is_ascii_digit() || c == '0') {
            body
        } else {
            format!("{}{}", sign, body)
        }
    }

    /// Render text through this format's text section
    pub fn render_text(&self, text: &str) -> String {
        let sections = split_sections(self.format_string());
        let section = match sections.len() {
            4.. => &sections[3],
            1 if sections[0].contains('@') => &sections[0],
            _ => return text.to_string(),
        };
        render_text_parts(text, &lex_section(section))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FormatPart {
    Literal(String),
    Zero,
    Hash,
    Question,
    DecimalPoint,
    Comma,
    Percent,
    Exponent { plus: bool },
    Text,
    Year(usize),
    Month(usize),
    Minute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    AmPm { short: bool },
}

impl FormatPart {
    fn is_digit(&self) -> bool {
        matches!(self, FormatPart::Zero | FormatPart::Hash | FormatPart::Question)
    }

    fn is_date_time(&self) -> bool {
        matches!(
            self,
            FormatPart::Year(_)
                | FormatPart::Month(_)
                | FormatPart::Minute(_)
                | FormatPart::Day(_)
                | FormatPart::Hour(_)
                | FormatPart::Second(_)
                | FormatPart::AmPm { .. }
        )
    }
}

fn split_sections(format: &str) -> Vec<String> {
    let mut sections = vec![String::new()];
    let mut in_quotes = false;
    let mut escaped = false;
    for c in format.chars() {
        let current = sections.last_mut();
        let Some(current) = current else { break };
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\\' if !in_quotes => {
                escaped = true;
                current.push(c);
            }
            ';' if !in_quotes => sections.push(String::new()),
            _ => current.push(c),
        }
    }
    sections
}

fn count_run(chars: &[char], start: usize, target: char) -> usize {
    chars[start..]
        .iter()
        .take_while(|c| c.to_ascii_lowercase() == target)
        .count()
}

fn lex_section(section: &str) -> Vec<FormatPart> {
    let chars: Vec<char> = section.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '"')
                    .map(|p| i + 1 + p)
                    .unwrap_or(chars.len());
                parts.push(FormatPart::Literal(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            '\\' => {
                if let Some(&next) = chars.get(i + 1) {
                    parts.push(FormatPart::Literal(next.to_string()));
                }
                i += 2;
            }
            '_' => {
                parts.push(FormatPart::Literal(" ".into()));
                i += 2;
            }
            '*' => i += 2,
            '[' => {
                i = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| i + p + 1)
                    .unwrap_or(chars.len());
            }
            '0' => {
                parts.push(FormatPart::Zero);
                i += 1;
            }
            '#' => {
                parts.push(FormatPart::Hash);
                i += 1;
            }
            '?' => {
                parts.push(FormatPart::Question);
                i += 1;
            }
            '.' => {
                parts.push(FormatPart::DecimalPoint);
                i += 1;
            }
            ',' => {
                parts.push(FormatPart::Comma);
                i += 1;
            }
            '%' => {
                parts.push(FormatPart::Percent);
                i += 1;
            }
            '@' => {
                parts.push(FormatPart::Text);
                i += 1;
            }
            'E' | 'e' if matches!(chars.get(i + 1), Some('+') | Some('-')) => {
                parts.push(FormatPart::Exponent {
                    plus: chars[i + 1] == '+',
                });
                i += 2;
            }
            'y' | 'Y' => {
                let n = count_run(&chars, i, 'y');
                parts.push(FormatPart::Year(n));
                i += n;
            }
            'd' | 'D' => {
                let n = count_run(&chars, i, 'd');
                parts.push(FormatPart::Day(n));
                i += n;
            }
            'h' | 'H' => {
                let n = count_run(&chars, i, 'h');
                parts.push(FormatPart::Hour(n));
                i += n;
            }
            's' | 'S' => {
                let n = count_run(&chars, i, 's');
                parts.push(FormatPart::Second(n));
                i += n;
            }
            'm' | 'M' => {
                let n = count_run(&chars, i, 'm');
                parts.push(FormatPart::Month(n));
                i += n;
            }
            'A' | 'a' => {
                let rest: String = chars[i..].iter().take(5).collect::<String>().to_uppercase();
                if rest.starts_with("AM/PM") {
                    parts.push(FormatPart::AmPm { short: false });
                    i += 5;
                } else if rest.starts_with("A/P") {
                    parts.push(FormatPart::AmPm { short: true });
                    i += 3;
                } else {
                    parts.push(FormatPart::Literal(c.to_string()));
                    i += 1;
                }
            }
            _ => {
                parts.push(FormatPart::Literal(c.to_string()));
                i += 1;
            }
        }
    }

    resolve_minutes(&mut parts);
    parts
}

/// `m`/`mm` mean minutes right after an hour code or right before a seconds code
fn resolve_minutes(parts: &mut [FormatPart]) {
    let significant: Vec<usize> = (0..parts.len())
        .filter(|&i| parts[i].is_date_time())
        .collect();
    for (pos, &i) in significant.iter().enumerate() {
        let FormatPart::Month(n) = parts[i] else {
            continue;
        };
        if n > 2 {
            continue;
        }
        let after_hour = pos > 0 && matches!(parts[significant[pos - 1]], FormatPart::Hour(_));
        let before_second = significant
            .get(pos + 1)
            .map(|&j| matches!(parts[j], FormatPart::Second(_)))
            .unwrap_or(false);
        if after_hour || before_second {
            parts[i] = FormatPart::Minute(n);
        }
    }
}

/// Render a value the way the General format does
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let abs = value.abs();
    if !(1e-9..1e11).contains(&abs) {
        let formatted = format!("{:.5E}", value);
        let (mantissa, exponent) = formatted.split_once('E').unwrap_or((&formatted, "0"));
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        let exponent: i32 = exponent.parse().unwrap_or(0);
        return format!(
            "{}E{}{:02}",
            mantissa,
            if exponent < 0 { "-" } else { "+" },
            exponent.abs()
        );
    }
    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }
    let int_digits = (abs.log10().floor() as i32 + 1).max(1);
    let decimals = (10 - int_digits).max(0) as usize;
    let formatted = format!("{:.*}", decimals, value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Round halves away from zero, as spreadsheet display does
fn round_half_away(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn render_number(value: f64, parts: &[FormatPart]) -> String {
    let exponent = parts.iter().enumerate().find_map(|(i, p)| match p {
        FormatPart::Exponent { plus } => Some((i, *plus)),
        _ => None,
    });
    let exponent_at = exponent.map(|(i, _)| i);
    let decimal_at = parts[..exponent_at.unwrap_or(parts.len())]
        .iter()
        .position(|p| *p == FormatPart::DecimalPoint);
    let mantissa_end = exponent_at.unwrap_or(parts.len());
    let integer_end = decimal_at.unwrap_or(mantissa_end);

    let integer_parts = &parts[..integer_end];
    let fraction_parts = decimal_at
        .map(|d| &parts[d + 1..mantissa_end])
        .unwrap_or(&[]);

    let min_integer = integer_parts
        .iter()
        .filter(|p| **p == FormatPart::Zero)
        .count();
    let max_decimals = fraction_parts.iter().filter(|p| p.is_digit()).count();
    let min_decimals = fraction_parts
        .iter()
        .filter(|p| **p == FormatPart::Zero)
        .count();

    // Commas between digit placeholders group thousands; trailing ones scale by 1000
    let last_digit = integer_parts.iter().rposition(FormatPart::is_digit);
    let first_digit = integer_parts.iter().position(FormatPart::is_digit);
    let mut grouping = false;
    let mut scale = 0;
    for (i, part) in integer_parts.iter().enumerate() {
        if *part == FormatPart::Comma {
            match (first_digit, last_digit) {
                (Some(first), Some(last)) if i > first && i < last => grouping = true,
                (_, Some(last)) if i > last && decimal_at.is_none() => scale += 1,
                _ => {}
            }
        }
    }

    let percent = parts.iter().filter(|p| **p == FormatPart::Percent).count();
    let mut scaled = value * 100f64.powi(percent as i32) / 1000f64.powi(scale);

    let mut exponent_text = None;
    if let Some((e, plus)) = exponent {
        let exp_digits = parts[e + 1..].iter().filter(|p| p.is_digit()).count().max(1);
        let mut exponent = if scaled == 0.0 {
            0
        } else {
            scaled.log10().floor() as i32
        };
        let mut mantissa = scaled / 10f64.powi(exponent);
        if round_half_away(mantissa, max_decimals) >= 10.0 {
            exponent += 1;
            mantissa = scaled / 10f64.powi(exponent);
        }
        scaled = mantissa;
        let sign = if exponent < 0 {
            "-"
        } else if plus {
            "+"
        } else {
            ""
        };
        exponent_text = Some(format!(
            "E{}{:0width$}",
            sign,
            exponent.abs(),
            width = exp_digits
        ));
    }

    let rounded = format!("{:.*}", max_decimals, round_half_away(scaled, max_decimals));
    let (int_text, frac_text) = rounded.split_once('.').unwrap_or((&rounded, ""));

    let mut int_text = if int_text == "0" && min_integer == 0 {
        String::new()
    } else {
        int_text.to_string()
    };
    while int_text.len() < min_integer {
        int_text.insert(0, '0');
    }
    if grouping {
        int_text = group_thousands(&int_text);
    }

    let mut frac_text = frac_text.to_string();
    while frac_text.len() > min_decimals && frac_text.ends_with('0') {
        frac_text.pop();
    }

    let mut out = String::new();
    let mut integer_written = false;
    let mut fraction_written = false;
    for (i, part) in parts[..mantissa_end].iter().enumerate() {
        match part {
            p if p.is_digit() => {
                if i < integer_end {
                    if !integer_written {
                        out.push_str(&int_text);
                        integer_written = true;
                    }
                } else if !fraction_written {
                    out.push_str(&frac_text);
                    fraction_written = true;
                }
            }
            FormatPart::DecimalPoint => {
                if !integer_written {
                    out.push_str(&int_text);
                    integer_written = true;
                }
                out.push('.');
            }
            FormatPart::Percent => out.push('%'),
            FormatPart::Literal(s) => out.push_str(s),
            _ => {}
        }
    }
    if let Some(exp) = exponent_text {
        out.push_str(&exp);
    }
    out
}

/// Convert a serial date (1899-12-30 based) to a date-time rounded to the second
fn serial_to_datetime(value: f64) -> Option<NaiveDateTime> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (value * 86_400.0).round() as i64;
    base.checked_add_signed(Duration::seconds(seconds))
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

fn render_date_time(value: f64, parts: &[FormatPart]) -> String {
    let Some(dt) = serial_to_datetime(value) else {
        return "#".repeat(8);
    };
    let twelve_hour = parts.iter().any(|p| matches!(p, FormatPart::AmPm { .. }));
    let mut out = String::new();

    for part in parts {
        match part {
            FormatPart::Year(n) if *n <= 2 => out.push_str(&format!("{:02}", dt.year() % 100)),
            FormatPart::Year(_) => out.push_str(&format!("{:04}", dt.year())),
            FormatPart::Month(1) => out.push_str(&dt.month().to_string()),
            FormatPart::Month(2) => out.push_str(&format!("{:02}", dt.month())),
            FormatPart::Month(n) => {
                let name = MONTHS[dt.month0() as usize];
                match n {
                    3 => out.push_str(&name[..3]),
                    5 => out.push_str(&name[..1]),
                    _ => out.push_str(name),
                }
            }
            FormatPart::Day(1) => out.push_str(&dt.day().to_string()),
            FormatPart::Day(2) => out.push_str(&format!("{:02}", dt.day())),
            FormatPart::Day(n) => {
                let name = DAYS[dt.weekday().num_days_from_monday() as usize];
                if *n == 3 {
                    out.push_str(&name[..3]);
                } else {
                    out.push_str(name);
                }
            }
            FormatPart::Hour(n) => {
                let hour = if twelve_hour {
                    match dt.hour() % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    dt.hour()
                };
                if *n >= 2 {
                    out.push_str(&format!("{:02}", hour));
                } else {
                    out.push_str(&hour.to_string());
                }
            }
            FormatPart::Minute(n) => {
                if *n >= 2 {
                    out.push_str(&format!("{:02}", dt.minute()));
                } else {
                    out.push_str(&dt.minute().to_string());
                }
            }
            FormatPart::Second(n) => {
                if *n >= 2 {
                    out.push_str(&format!("{:02}", dt.second()));
                } else {
                    out.push_str(&dt.second().to_string());
                }
            }
            FormatPart::AmPm { short } => {
                let pm = dt.hour() >= 12;
                out.push_str(match (short, pm) {
                    (false, false) => "AM",
                    (false, true) => "PM",
                    (true, false) => "A",
                    (true, true) => "P",
                });
            }
            FormatPart::Literal(s) => out.push_str(s),
            FormatPart::DecimalPoint => out.push('.'),
            FormatPart::Comma => out.push(','),
            FormatPart::Zero => out.push('0'),
            _ => {}
        }
    }
    out
}

fn render_text_parts(text: &str, parts: &[FormatPart]) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            FormatPart::Text => out.push_str(text),
            FormatPart::Literal(s) => out.push_str(s),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, value: f64) -> String {
        NumberFormat::from_string(format).render(value)
    }

    #[test]
    fn test_general() {
        assert_eq!(fmt("General", 42.0), "42");
        assert_eq!(fmt("General", 0.1 + 0.2), "0.3");
        assert_eq!(fmt("General", -1.5), "-1.5");
        assert_eq!(fmt("General", 1.23e15), "1.23E+15");
    }

    #[test]
    fn test_fixed_decimals() {
        assert_eq!(fmt("0", 2.5), "3");
        assert_eq!(fmt("0.00", 3.14159), "3.14");
        assert_eq!(fmt("0.00", -3.14159), "-3.14");
        assert_eq!(fmt("0.0#", 1.5), "1.5");
        assert_eq!(fmt("#.##", 0.5), ".5");
    }

    #[test]
    fn test_thousands_and_scaling() {
        assert_eq!(fmt("#,##0", 1234567.0), "1,234,567");
        assert_eq!(fmt("#,##0.00", 1234.5), "1,234.50");
        assert_eq!(fmt("#,##0,", 1234567.0), "1,235");
    }

    #[test]
    fn test_percent_and_scientific() {
        assert_eq!(fmt("0%", 0.256), "26%");
        assert_eq!(fmt("0.00%", 0.12346), "12.35%");
        assert_eq!(fmt("0.00E+00", 12345.0), "1.23E+04");
        assert_eq!(fmt("0.00E+00", 0.000123), "1.23E-04");
    }

    #[test]
    fn test_sections_and_literals() {
        assert_eq!(fmt("0;(0)", -5.0), "(5)");
        assert_eq!(fmt("0;(0);\"zero\"", 0.0), "zero");
        assert_eq!(fmt("\"$\"#,##0.00", 12.0), "$12.00");
        assert_eq!(fmt("[Red]0.0", 1.25), "1.3");
    }

    #[test]
    fn test_dates_and_times() {
        assert_eq!(fmt("yyyy-mm-dd", 44197.0), "2021-01-01");
        assert_eq!(fmt("d-mmm-yy", 44255.0), "28-Feb-21");
        assert_eq!(fmt("dddd", 44197.0), "Friday");
        assert_eq!(fmt("h:mm", 0.75), "18:00");
        assert_eq!(fmt("h:mm AM/PM", 0.75), "6:00 PM");
        assert_eq!(fmt("hh:mm:ss", 0.5 + 1.0 / 86400.0), "12:00:01");
        assert!(NumberFormat::from_id(NumberFormat::ID_DATE_SHORT).is_date_format());
        assert!(!NumberFormat::from_string("0.00").is_date_format());
    }

    #[test]
    fn test_text_section() {
        let format = NumberFormat::from_string("0;-0;0;\"<\"@\">\"");
        assert_eq!(format.render_text("abc"), "<abc>");
        assert_eq!(NumberFormat::from_id(NumberFormat::ID_TEXT).render_text("x"), "x");
        assert_eq!(NumberFormat::from_string("0.00").render_text("x"), "x");
    }
}
