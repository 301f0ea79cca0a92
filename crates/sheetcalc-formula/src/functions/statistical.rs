//! Conditional aggregation functions

use crate::context::ParsingContext;
use crate::error::FormulaResult;
use crate::value::{CompileResult, ExcelError, FunctionArgument, Value};

use super::args::{arg_value, value_at_offset, ArgGrid};
use super::criteria::CriteriaMatcher;

/// A criteria range with its matcher
struct Condition {
    grid: ArgGrid,
    matcher: CriteriaMatcher,
}

impl Condition {
    fn new(
        range: &FunctionArgument,
        criteria: &FunctionArgument,
        ctx: &ParsingContext<'_>,
    ) -> FormulaResult<Self> {
        Ok(Self {
            grid: ArgGrid::from_argument(range, ctx)?,
            matcher: CriteriaMatcher::new(&arg_value(criteria, ctx)?),
        })
    }
}

/// Conditions from `(range, criteria)` pairs starting at `first`
fn conditions(
    args: &[FunctionArgument],
    first: usize,
    ctx: &ParsingContext<'_>,
) -> FormulaResult<Vec<Condition>> {
    let pairs = args.get(first..).unwrap_or_default();
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(ExcelError::Value.into());
    }
    pairs
        .chunks(2)
        .map(|pair| Condition::new(&pair[0], &pair[1], ctx))
        .collect()
}

/// Offsets where every condition holds; all criteria ranges must share one shape
fn matching_offsets(conditions: &[Condition]) -> FormulaResult<Vec<(u32, u32)>> {
    let Some(first) = conditions.first() else {
        return Ok(Vec::new());
    };
    let shape = (first.grid.rows(), first.grid.cols());
    if conditions
        .iter()
        .any(|c| (c.grid.rows(), c.grid.cols()) != shape)
    {
        return Err(ExcelError::Value.into());
    }
    Ok(first
        .grid
        .positions()
        .filter(|&(r, c)| {
            conditions
                .iter()
                .all(|condition| condition.matcher.matches(&condition.grid.get(r, c)))
        })
        .collect())
}

/// Numbers found at the given offsets; text and blanks are skipped, errors raised
fn values_at(
    target: &FunctionArgument,
    offsets: &[(u32, u32)],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<Vec<f64>> {
    let mut numbers = Vec::with_capacity(offsets.len());
    for &(row, col) in offsets {
        match value_at_offset(target, row, col, ctx)? {
            Value::Number(n) => numbers.push(n),
            Value::Error(e) => return Err(e.into()),
            _ => {}
        }
    }
    Ok(numbers)
}

fn average(numbers: &[f64]) -> CompileResult {
    if numbers.is_empty() {
        return CompileResult::error(ExcelError::Div0);
    }
    CompileResult::number(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

/// SUMIF function
pub fn fn_sumif(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let condition = Condition::new(&args[0], &args[1], ctx)?;
    let offsets = matching_offsets(std::slice::from_ref(&condition))?;
    let target = args.get(2).unwrap_or(&args[0]);
    let numbers = values_at(target, &offsets, ctx)?;
    Ok(CompileResult::number(numbers.iter().sum()))
}

/// SUMIFS function
pub fn fn_sumifs(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let offsets = matching_offsets(&conditions(args, 1, ctx)?)?;
    let numbers = values_at(&args[0], &offsets, ctx)?;
    Ok(CompileResult::number(numbers.iter().sum()))
}

/// COUNTIF function
pub fn fn_countif(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let condition = Condition::new(&args[0], &args[1], ctx)?;
    let count = matching_offsets(std::slice::from_ref(&condition))?.len();
    Ok(CompileResult::integer(count as f64))
}

/// COUNTIFS function
pub fn fn_countifs(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let count = matching_offsets(&conditions(args, 0, ctx)?)?.len();
    Ok(CompileResult::integer(count as f64))
}

/// AVERAGEIF function
pub fn fn_averageif(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let condition = Condition::new(&args[0], &args[1], ctx)?;
    let offsets = matching_offsets(std::slice::from_ref(&condition))?;
    let target = args.get(2).unwrap_or(&args[0]);
    Ok(average(&values_at(target, &offsets, ctx)?))
}

/// AVERAGEIFS function
pub fn fn_averageifs(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let offsets = matching_offsets(&conditions(args, 1, ctx)?)?;
    Ok(average(&values_at(&args[0], &offsets, ctx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::testing::eval;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn orders() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        let rows: [(&str, &str, f64); 5] = [
            ("apple", "north", 10.0),
            ("pear", "south", 20.0),
            ("apple", "south", 30.0),
            ("plum", "north", 40.0),
            ("apricot", "north", 50.0),
        ];
        for (i, (fruit, region, qty)) in rows.iter().enumerate() {
            let row = i + 1;
            sheet.set_cell_value(&format!("A{row}"), *fruit).unwrap();
            sheet.set_cell_value(&format!("B{row}"), *region).unwrap();
            sheet.set_cell_value(&format!("C{row}"), *qty).unwrap();
        }
        sheet.set_cell_value("D1", "north").unwrap();
        wb
    }

    #[test]
    fn test_sumif() {
        let wb = orders();
        assert_eq!(eval(&wb, "SUMIF(A1:A5,\"apple\",C1:C5)"), CompileResult::number(40.0));
        assert_eq!(eval(&wb, "SUMIF(A1:A5,\"ap*\",C1:C5)"), CompileResult::number(90.0));
        assert_eq!(eval(&wb, "SUMIF(C1:C5,\">25\")"), CompileResult::number(120.0));
        // A smaller sum range is extended from its top-left cell
        assert_eq!(eval(&wb, "SUMIF(A1:A5,\"plum\",C1)"), CompileResult::number(40.0));
        assert_eq!(eval(&wb, "SUMIF(A:A,\"pear\",C:C)"), CompileResult::number(20.0));
    }

    #[test]
    fn test_countif() {
        let wb = orders();
        assert_eq!(eval(&wb, "COUNTIF(B1:B5,D1)"), CompileResult::integer(3.0));
        assert_eq!(eval(&wb, "COUNTIF(C1:C5,\"<=20\")"), CompileResult::integer(2.0));
        assert_eq!(eval(&wb, "COUNTIF(C1:C5,30)"), CompileResult::integer(1.0));
        assert_eq!(eval(&wb, "COUNTIF(A1:C5,\"<>apple\")"), CompileResult::integer(13.0));
        assert_eq!(eval(&wb, "COUNTIF(E1:E4,\"\")"), CompileResult::integer(4.0));
    }

    #[test]
    fn test_multiple_criteria() {
        let wb = orders();
        assert_eq!(
            eval(&wb, "SUMIFS(C1:C5,A1:A5,\"ap*\",B1:B5,\"north\")"),
            CompileResult::number(60.0)
        );
        assert_eq!(
            eval(&wb, "COUNTIFS(A1:A5,\"apple\",C1:C5,\">15\")"),
            CompileResult::integer(1.0)
        );
        assert_eq!(
            eval(&wb, "AVERAGEIFS(C1:C5,B1:B5,\"north\",C1:C5,\">10\")"),
            CompileResult::number(45.0)
        );
        assert_eq!(
            eval(&wb, "SUMIFS(C1:C5,A1:A4,\"apple\")"),
            CompileResult::error(ExcelError::Value)
        );
        assert_eq!(
            eval(&wb, "SUMIFS(C1:C5,A1:A5)"),
            CompileResult::error(ExcelError::Value)
        );
    }

    #[test]
    fn test_averageif() {
        let wb = orders();
        assert_eq!(eval(&wb, "AVERAGEIF(B1:B5,\"south\",C1:C5)"), CompileResult::number(25.0));
        assert_eq!(
            eval(&wb, "AVERAGEIF(B1:B5,\"east\",C1:C5)"),
            CompileResult::error(ExcelError::Div0)
        );
    }
}
