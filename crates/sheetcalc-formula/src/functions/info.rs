//! Information functions

use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use crate::value::{CompileResult, ExcelError, FunctionArgument, Value};

use super::args::arg_value;

/// Value to inspect; a multi-cell reference reads as `#VALUE!`
fn inspected(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<Value> {
    match arg_value(arg, ctx) {
        Err(FormulaError::Value(error)) => Ok(Value::Error(error)),
        other => other,
    }
}

fn check(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
    test: impl Fn(&Value) -> bool,
) -> FormulaResult<CompileResult> {
    let value = inspected(&args[0], ctx)?;
    Ok(CompileResult::boolean(test(&value)))
}

/// ISERROR(value)
pub fn fn_iserror(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    check(args, ctx, Value::is_error)
}

/// ISERR(value): any error except #N/A
pub fn fn_iserr(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    check(args, ctx, |v| v.error().is_some_and(|e| e != ExcelError::NA))
}

/// ISNA(value)
pub fn fn_isna(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    check(args, ctx, |v| v.error() == Some(ExcelError::NA))
}

/// ISBLANK(value)
pub fn fn_isblank(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    check(args, ctx, |v| matches!(v, Value::Empty))
}

/// ISNUMBER(value)
pub fn fn_isnumber(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    check(args, ctx, |v| matches!(v, Value::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    check(args, ctx, |v| matches!(v, Value::String(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    check(args, ctx, |v| matches!(v, Value::Boolean(_)))
}

/// NA()
pub fn fn_na(
    _args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::error(ExcelError::NA))
}
