//! Text functions

use sheetcalc_core::NumberFormat;

use crate::context::ParsingContext;
use crate::error::FormulaResult;
use crate::value::{parse_number_text, CompileResult, ExcelError, FunctionArgument, Value};

use super::args::{arg_scalar, arg_to_bool, arg_to_decimal, arg_to_int, arg_to_string, optional};
use super::math::round_half_away;

/// Longest text a cell can hold
const MAX_TEXT_LEN: usize = 32_767;

/// LEN function
pub fn fn_len(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let text = arg_to_string(&args[0], ctx)?;
    Ok(CompileResult::integer(text.chars().count() as f64))
}

/// Character count argument; negative counts are `#VALUE!`
fn count_arg(
    args: &[FunctionArgument],
    index: usize,
    ctx: &ParsingContext<'_>,
) -> FormulaResult<usize> {
    let count = match optional(args, index) {
        Some(arg) => arg_to_int(arg, ctx)?,
        None => 1,
    };
    usize::try_from(count).map_err(|_| ExcelError::Value.into())
}

/// LEFT function
pub fn fn_left(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let text = arg_to_string(&args[0], ctx)?;
    let count = count_arg(args, 1, ctx)?;
    Ok(CompileResult::string(text.chars().take(count).collect::<String>()))
}

/// RIGHT function
pub fn fn_right(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let text = arg_to_string(&args[0], ctx)?;
    let count = count_arg(args, 1, ctx)?;
    let skip = text.chars().count().saturating_sub(count);
    Ok(CompileResult::string(text.chars().skip(skip).collect::<String>()))
}

/// MID function, 1-based start
pub fn fn_mid(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let text = arg_to_string(&args[0], ctx)?;
    let start = arg_to_int(&args[1], ctx)?;
    let count = arg_to_int(&args[2], ctx)?;
    if start < 1 || count < 0 {
        return Ok(CompileResult::error(ExcelError::Value));
    }
    let result: String = text
        .chars()
        .skip((start - 1) as usize)
        .take(count as usize)
        .collect();
    Ok(CompileResult::string(result))
}

/// UPPER function
pub fn fn_upper(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::string(arg_to_string(&args[0], ctx)?.to_uppercase()))
}

/// LOWER function
pub fn fn_lower(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::string(arg_to_string(&args[0], ctx)?.to_lowercase()))
}

/// TRIM function: strips the ends and collapses inner runs of spaces
pub fn fn_trim(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let text = arg_to_string(&args[0], ctx)?;
    let trimmed = text.split(' ').filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ");
    Ok(CompileResult::string(trimmed))
}

/// CONCATENATE function
pub fn fn_concatenate(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let mut result = String::new();
    for arg in args {
        result.push_str(&arg_to_string(arg, ctx)?);
    }
    if result.chars().count() > MAX_TEXT_LEN {
        return Ok(CompileResult::error(ExcelError::Value));
    }
    Ok(CompileResult::string(result))
}

/// TEXT function, rendered through the provider's number formatting
pub fn fn_text(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let value = match arg_scalar(&args[0], ctx)? {
        Value::String(s) => parse_number_text(&s).map(Value::Number).unwrap_or(Value::String(s)),
        other => other,
    };
    let format = arg_to_string(&args[1], ctx)?;
    let rendered = match ctx.provider() {
        Ok(provider) => provider.get_format(&value, &format),
        Err(_) => match value {
            Value::Number(n) => NumberFormat::from_string(format).render(n),
            other => other.to_text(),
        },
    };
    Ok(CompileResult::string(rendered))
}

/// VALUE function
pub fn fn_value(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let number = match arg_scalar(&args[0], ctx)? {
        Value::Number(n) => n,
        Value::Empty => 0.0,
        Value::String(s) => parse_number_text(&s).ok_or(ExcelError::Value)?,
        _ => return Ok(CompileResult::error(ExcelError::Value)),
    };
    Ok(CompileResult::number(number))
}

/// EXACT function, case-sensitive
pub fn fn_exact(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let left = arg_to_string(&args[0], ctx)?;
    let right = arg_to_string(&args[1], ctx)?;
    Ok(CompileResult::boolean(left == right))
}

/// REPT function
pub fn fn_rept(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let text = arg_to_string(&args[0], ctx)?;
    let times = arg_to_int(&args[1], ctx)?;
    let Ok(times) = usize::try_from(times) else {
        return Ok(CompileResult::error(ExcelError::Value));
    };
    if text.chars().count().saturating_mul(times) > MAX_TEXT_LEN {
        return Ok(CompileResult::error(ExcelError::Value));
    }
    Ok(CompileResult::string(text.repeat(times)))
}

/// FIXED function
///
/// Rounds to `decimals` (default 2) and renders with thousands separators unless `no_commas`.
/// Negative decimals cut the number down to a multiple of a power of ten.
pub fn fn_fixed(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let mut number = arg_to_decimal(&args[0], ctx)?;
    let decimals = match optional(args, 1) {
        Some(arg) => arg_to_int(arg, ctx)?.clamp(-15, 30),
        None => 2,
    };
    let no_commas = match optional(args, 2) {
        Some(arg) => arg_to_bool(arg, ctx)?,
        None => false,
    };

    let places = if decimals < 0 {
        let unit = 10f64.powi(decimals.unsigned_abs() as i32);
        number -= number % unit;
        number = number.floor();
        0
    } else {
        number = round_half_away(number, decimals as i32);
        decimals as usize
    };

    let integer_part = if no_commas { "0" } else { "#,##0" };
    let pattern = if places > 0 {
        format!("{}.{}", integer_part, "0".repeat(places))
    } else {
        integer_part.to_string()
    };
    Ok(CompileResult::string(NumberFormat::from_string(pattern).render(number)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::{eval, eval_plain};
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn text(formula: &str) -> CompileResult {
        eval_plain(formula)
    }

    #[test]
    fn test_substrings() {
        assert_eq!(text("LEN(\"héllo\")"), CompileResult::integer(5.0));
        assert_eq!(text("LEN(12.5)"), CompileResult::integer(4.0));
        assert_eq!(text("LEFT(\"spreadsheet\",6)"), CompileResult::string("spread"));
        assert_eq!(text("LEFT(\"abc\")"), CompileResult::string("a"));
        assert_eq!(text("RIGHT(\"spreadsheet\",5)"), CompileResult::string("sheet"));
        assert_eq!(text("RIGHT(\"ab\",5)"), CompileResult::string("ab"));
        assert_eq!(text("MID(\"spreadsheet\",3,4)"), CompileResult::string("read"));
        assert_eq!(text("MID(\"abc\",0,1)"), CompileResult::error(ExcelError::Value));
        assert_eq!(text("LEFT(\"abc\",-1)"), CompileResult::error(ExcelError::Value));
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(text("UPPER(\"MiXeD\")"), CompileResult::string("MIXED"));
        assert_eq!(text("LOWER(\"MiXeD\")"), CompileResult::string("mixed"));
        assert_eq!(text("TRIM(\"  a   b  \")"), CompileResult::string("a b"));
        assert_eq!(text("EXACT(\"a\",\"A\")"), CompileResult::boolean(false));
        assert_eq!(text("EXACT(\"1\",1)"), CompileResult::boolean(true));
    }

    #[test]
    fn test_concatenate_and_rept() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0).unwrap().set_cell_value("A1", 3.0).unwrap();
        assert_eq!(eval(&wb, "CONCATENATE(\"n=\",A1,TRUE)"), CompileResult::string("n=3TRUE"));
        assert_eq!(text("CONCATENATE(\"a\",NA())"), CompileResult::error(ExcelError::NA));
        assert_eq!(text("REPT(\"ab\",3)"), CompileResult::string("ababab"));
        assert_eq!(text("REPT(\"ab\",-1)"), CompileResult::error(ExcelError::Value));
    }

    #[test]
    fn test_value_and_text() {
        assert_eq!(text("VALUE(\"1.5\")"), CompileResult::number(1.5));
        assert_eq!(text("VALUE(\"50%\")"), CompileResult::number(0.5));
        assert_eq!(text("VALUE(\"abc\")"), CompileResult::error(ExcelError::Value));
        assert_eq!(text("TEXT(1234.5,\"#,##0.00\")"), CompileResult::string("1,234.50"));
        assert_eq!(text("TEXT(\"0.256\",\"0%\")"), CompileResult::string("26%"));
        assert_eq!(text("TEXT(44197,\"yyyy-mm-dd\")"), CompileResult::string("2021-01-01"));
    }

    #[test]
    fn test_fixed() {
        assert_eq!(text("FIXED(1234.567)"), CompileResult::string("1,234.57"));
        assert_eq!(text("FIXED(1234.567,1,TRUE)"), CompileResult::string("1234.6"));
        assert_eq!(text("FIXED(1234.567,0)"), CompileResult::string("1,235"));
        assert_eq!(text("FIXED(-1234.5,2)"), CompileResult::string("-1,234.50"));
        assert_eq!(text("FIXED(1250,-2)"), CompileResult::string("1,200"));
    }
}
