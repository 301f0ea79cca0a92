//! Logical functions

use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use crate::value::{CompileResult, ExcelError, FunctionArgument, Value};

use super::args::{arg_to_bool, arg_value, arg_values, ArgValue};

fn passthrough(arg: &FunctionArgument) -> CompileResult {
    CompileResult::new(arg.value.clone(), arg.data_type)
}

/// IF function
///
/// Branches are returned as compiled, so a reference stays a reference.
pub fn fn_if(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    if arg_to_bool(&args[0], ctx)? {
        Ok(passthrough(&args[1]))
    } else {
        Ok(args
            .get(2)
            .map(passthrough)
            .unwrap_or_else(|| CompileResult::boolean(false)))
    }
}

/// Error carried by the first argument, looking through single-cell references
fn error_of(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<Option<ExcelError>> {
    match arg_value(arg, ctx) {
        Ok(value) => Ok(value.error()),
        Err(FormulaError::Value(error)) => Ok(Some(error)),
        Err(error) => Err(error),
    }
}

/// IFERROR function
pub fn fn_iferror(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    match error_of(&args[0], ctx)? {
        Some(_) => Ok(passthrough(&args[1])),
        None => Ok(passthrough(&args[0])),
    }
}

/// IFNA function
pub fn fn_ifna(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    match error_of(&args[0], ctx)? {
        Some(ExcelError::NA) => Ok(passthrough(&args[1])),
        _ => Ok(passthrough(&args[0])),
    }
}

/// Truth value of one collected value; referenced text is ignored, direct text must read
/// TRUE/FALSE
fn truth_value(item: ArgValue) -> Option<FormulaResult<bool>> {
    match item.value {
        Value::Boolean(b) => Some(Ok(b)),
        Value::Number(n) => Some(Ok(n != 0.0)),
        Value::Error(e) => Some(Err(e.into())),
        Value::String(s) if !item.from_reference => {
            Some(Value::String(s).coerce_to_bool().map_err(Into::into))
        }
        _ => None,
    }
}

/// Count of (true, all) truth values; `#VALUE!` when there are none
fn truth_counts(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<(usize, usize)> {
    let (trues, total) = arg_values(args, ctx)?
        .filter_map(truth_value)
        .try_fold((0, 0), |(trues, total), b| {
            b.map(|b| (trues + usize::from(b), total + 1))
        })?;
    if total == 0 {
        return Err(ExcelError::Value.into());
    }
    Ok((trues, total))
}

/// AND function
pub fn fn_and(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let (trues, total) = truth_counts(args, ctx)?;
    Ok(CompileResult::boolean(trues == total))
}

/// OR function
pub fn fn_or(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let (trues, _) = truth_counts(args, ctx)?;
    Ok(CompileResult::boolean(trues > 0))
}

/// NOT function
pub fn fn_not(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    Ok(CompileResult::boolean(!arg_to_bool(&args[0], ctx)?))
}

/// TRUE function
pub fn fn_true(
    _args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::boolean(true))
}

/// FALSE function
pub fn fn_false(
    _args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    Ok(CompileResult::boolean(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::{eval, eval_plain};
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    #[test]
    fn test_if() {
        assert_eq!(eval_plain("IF(1>0,\"yes\",\"no\")"), CompileResult::string("yes"));
        assert_eq!(eval_plain("IF(0,\"yes\",\"no\")"), CompileResult::string("no"));
        assert_eq!(eval_plain("IF(FALSE,1)"), CompileResult::boolean(false));
        assert_eq!(eval_plain("IF(\"maybe\",1,2)"), CompileResult::error(ExcelError::Value));
        assert_eq!(eval_plain("IF(1/0,1,2)"), CompileResult::error(ExcelError::Div0));

        let mut wb = Workbook::new();
        wb.worksheet_mut(0).unwrap().set_cell_value("B1", 9.0).unwrap();
        assert_eq!(eval(&wb, "IF(TRUE,B1,0)+1"), CompileResult::integer(10.0));
    }

    #[test]
    fn test_error_traps() {
        assert_eq!(eval_plain("IFERROR(1/0,\"div\")"), CompileResult::string("div"));
        assert_eq!(eval_plain("IFERROR(5,\"div\")"), CompileResult::integer(5.0));
        assert_eq!(eval_plain("IFNA(NA(),0)"), CompileResult::integer(0.0));
        assert_eq!(eval_plain("IFNA(1/0,0)"), CompileResult::error(ExcelError::Div0));
    }

    #[test]
    fn test_and_or_not() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", true).unwrap();
        sheet.set_cell_value("A2", "text").unwrap();
        sheet.set_cell_value("A3", 0.0).unwrap();

        assert_eq!(eval(&wb, "AND(A1:A2)"), CompileResult::boolean(true));
        assert_eq!(eval(&wb, "AND(A1:A3)"), CompileResult::boolean(false));
        assert_eq!(eval(&wb, "OR(A1:A3)"), CompileResult::boolean(true));
        assert_eq!(eval(&wb, "OR(A2)"), CompileResult::error(ExcelError::Value));
        assert_eq!(eval_plain("AND(\"true\",1)"), CompileResult::boolean(true));
        assert_eq!(eval_plain("OR(\"x\")"), CompileResult::error(ExcelError::Value));
        assert_eq!(eval_plain("NOT(0)"), CompileResult::boolean(true));
        assert_eq!(eval_plain("TRUE()"), CompileResult::boolean(true));
        assert_eq!(eval_plain("NOT(FALSE())"), CompileResult::boolean(true));
    }
}
