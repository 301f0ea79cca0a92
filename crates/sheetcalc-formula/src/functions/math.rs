//! Math functions

use std::f64::consts::PI;

use crate::context::ParsingContext;
use crate::error::FormulaResult;
use crate::value::{CompileResult, ExcelError, FunctionArgument, Value};

use super::args::{arg_to_decimal, arg_to_int, arg_values, fold_numbers, numeric_values};

/// SUM function
pub fn fn_sum(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let total = fold_numbers(args, ctx, 0.0, |total, n| total + n)?;
    Ok(CompileResult::number(total))
}

/// SUMSQ function
pub fn fn_sumsq(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let total = fold_numbers(args, ctx, 0.0, |total, n| total + n * n)?;
    Ok(CompileResult::number(total))
}

/// AVERAGE function
pub fn fn_average(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let (total, count) = fold_numbers(args, ctx, (0.0, 0u64), |(total, count), n| {
        (total + n, count + 1)
    })?;
    if count == 0 {
        return Ok(CompileResult::error(ExcelError::Div0));
    }
    Ok(CompileResult::number(total / count as f64))
}

/// MIN function
pub fn fn_min(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let min = fold_numbers(args, ctx, None, |min: Option<f64>, n| {
        Some(min.map_or(n, |m| m.min(n)))
    })?;
    Ok(CompileResult::number(min.unwrap_or(0.0)))
}

/// MAX function
pub fn fn_max(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let max = fold_numbers(args, ctx, None, |max: Option<f64>, n| {
        Some(max.map_or(n, |m| m.max(n)))
    })?;
    Ok(CompileResult::number(max.unwrap_or(0.0)))
}

/// COUNT function: numbers, plus direct arguments that convert to numbers
pub fn fn_count(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let count = arg_values(args, ctx)?
        .filter(|item| match &item.value {
            Value::Number(_) => true,
            Value::Boolean(_) => !item.from_reference,
            Value::String(s) => !item.from_reference && s.trim().parse::<f64>().is_ok(),
            _ => false,
        })
        .count();
    Ok(CompileResult::integer(count as f64))
}

/// COUNTA function: every non-empty value, errors included
pub fn fn_counta(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let count = arg_values(args, ctx)?
        .filter(|item| !matches!(item.value, Value::Empty) || !item.from_reference)
        .count();
    Ok(CompileResult::integer(count as f64))
}

/// COUNTBLANK function
///
/// Every cell of the range minus the stored cells that are not blank; empty text counts as blank.
pub fn fn_countblank(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let Some(address) = args[0].range() else {
        return Ok(CompileResult::error(ExcelError::Value));
    };
    let non_blank = ctx
        .range_cells(address)?
        .filter(|cell| !cell.value.is_blank())
        .count() as u64;
    let blank = address.range.cell_count().saturating_sub(non_blank);
    Ok(CompileResult::integer(blank as f64))
}

/// ABS function
pub fn fn_abs(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    Ok(CompileResult::number(arg_to_decimal(&args[0], ctx)?.abs()))
}

/// ROUND function, halves away from zero
pub fn fn_round(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let number = arg_to_decimal(&args[0], ctx)?;
    let digits = arg_to_int(&args[1], ctx)?.clamp(-15, 15) as i32;
    Ok(CompileResult::number(round_half_away(number, digits)))
}

/// Round to `digits` decimals with halves away from zero
pub(crate) fn round_half_away(number: f64, digits: i32) -> f64 {
    if digits < 0 {
        let factor = 10f64.powi(-digits);
        return (number / factor).round() * factor;
    }
    let factor = 10f64.powi(digits);
    let scaled = number * factor;
    // Nudge representation error so 2.675 rounds like it reads
    let rounded = (scaled + scaled.signum() * 1e-9).round();
    rounded / factor
}

/// INT function, rounding down
pub fn fn_int(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    Ok(CompileResult::integer(arg_to_decimal(&args[0], ctx)?.floor()))
}

/// MOD function, result takes the sign of the divisor
pub fn fn_mod(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let number = arg_to_decimal(&args[0], ctx)?;
    let divisor = arg_to_decimal(&args[1], ctx)?;
    if divisor == 0.0 {
        return Ok(CompileResult::error(ExcelError::Div0));
    }
    Ok(CompileResult::number(number - divisor * (number / divisor).floor()))
}

/// POWER function
pub fn fn_power(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let base = arg_to_decimal(&args[0], ctx)?;
    let exponent = arg_to_decimal(&args[1], ctx)?;
    if base == 0.0 && exponent < 0.0 {
        return Ok(CompileResult::error(ExcelError::Div0));
    }
    let result = base.powf(exponent);
    if !result.is_finite() {
        return Ok(CompileResult::error(ExcelError::Num));
    }
    Ok(CompileResult::number(result))
}

/// SQRT function
pub fn fn_sqrt(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let number = arg_to_decimal(&args[0], ctx)?;
    if number < 0.0 {
        return Ok(CompileResult::error(ExcelError::Num));
    }
    Ok(CompileResult::number(number.sqrt()))
}

/// PI function
pub fn fn_pi(
    _args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::number(PI))
}

/// DEGREES function
pub fn fn_degrees(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::number(arg_to_decimal(&args[0], ctx)? * 180.0 / PI))
}

/// RADIANS function
pub fn fn_radians(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::number(arg_to_decimal(&args[0], ctx)? * PI / 180.0))
}

/// FACT function
///
/// The input is truncated; negative input is `#N/A`.
pub fn fn_fact(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let number = arg_to_decimal(&args[0], ctx)?;
    if number < 0.0 {
        return Ok(CompileResult::error(ExcelError::NA));
    }
    let n = number.trunc() as u64;
    if n > 170 {
        return Ok(CompileResult::error(ExcelError::Num));
    }
    let result = (2..=n).fold(1.0, |acc, k| acc * k as f64);
    Ok(CompileResult::number(result))
}

/// QUOTIENT function, integer portion of a division
pub fn fn_quotient(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let numerator = arg_to_decimal(&args[0], ctx)?;
    let denominator = arg_to_decimal(&args[1], ctx)?;
    if denominator.trunc() == 0.0 {
        return Ok(CompileResult::error(ExcelError::Div0));
    }
    Ok(CompileResult::integer((numerator / denominator).trunc()))
}

/// LARGE function, k-th largest value
pub fn fn_large(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    nth_value(args, ctx, |a, b| b.total_cmp(a))
}

/// SMALL function, k-th smallest value
pub fn fn_small(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    nth_value(args, ctx, f64::total_cmp)
}

fn nth_value(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
    order: impl FnMut(&f64, &f64) -> std::cmp::Ordering,
) -> FormulaResult<CompileResult> {
    let mut values = numeric_values(&args[..1], ctx)?;
    let k = arg_to_int(&args[1], ctx)?;
    values.sort_by(order);
    let value = k
        .checked_sub(1)
        .and_then(|index| usize::try_from(index).ok())
        .and_then(|index| values.get(index));
    Ok(value.map_or(CompileResult::error(ExcelError::Num), |n| {
        CompileResult::number(*n)
    }))
}
