//! Lookup and reference functions

use std::cmp::Ordering;

use sheetcalc_core::{CellAddress, CellRange, MAX_COLS, MAX_ROWS};

use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use crate::provider::AddressUtility;
use crate::strategy::compare_values;
use crate::value::{
    quote_sheet_name, CompileResult, ExcelError, FunctionArgument, RangeAddress, Value,
};

use super::args::{arg_scalar, arg_to_bool, arg_to_int, arg_to_string, optional, ArgGrid};
use super::criteria::wildcard_matches;

/// ADDRESS function
///
/// Reference types 1 to 4 render `$A$1`, `A$1`, `$A1` and `A1`. R1C1 output is not supported.
pub fn fn_address(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let row = arg_to_int(&args[0], ctx)?;
    let col = arg_to_int(&args[1], ctx)?;
    let reference_type = match optional(args, 2) {
        Some(arg) => arg_to_int(arg, ctx)?,
        None => 1,
    };
    if let Some(arg) = optional(args, 3) {
        if !arg_to_bool(arg, ctx)? {
            return Err(FormulaError::NotSupported("R1C1 addresses".to_string()));
        }
    }

    if row < 1 || col < 1 || row > i64::from(MAX_ROWS) || col > i64::from(MAX_COLS) {
        return Ok(CompileResult::error(ExcelError::Value));
    }
    let (row_absolute, col_absolute) = match reference_type {
        1 => (true, true),
        2 => (true, false),
        3 => (false, true),
        4 => (false, false),
        _ => return Ok(CompileResult::error(ExcelError::Value)),
    };

    let address =
        CellAddress::with_absolute((row - 1) as u32, (col - 1) as u16, row_absolute, col_absolute);
    let mut text = address.to_a1_string();
    if let Some(arg) = optional(args, 4) {
        let sheet = arg_to_string(arg, ctx)?;
        if !sheet.is_empty() {
            text = format!("{}!{}", quote_sheet_name(&sheet), text);
        }
    }
    Ok(CompileResult::address(text))
}

fn reference_arg(arg: &FunctionArgument) -> FormulaResult<&RangeAddress> {
    arg.range().ok_or_else(|| ExcelError::Value.into())
}

/// OFFSET function
///
/// Moves the reference window without reading any cell. A zero height or width is `#REF!`.
pub fn fn_offset(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let address = reference_arg(&args[0])?;
    let rows = arg_to_int(&args[1], ctx)?;
    let cols = arg_to_int(&args[2], ctx)?;
    let height = optional(args, 3).map(|arg| arg_to_int(arg, ctx)).transpose()?;
    let width = optional(args, 4).map(|arg| arg_to_int(arg, ctx)).transpose()?;
    if height == Some(0) || width == Some(0) {
        return Ok(CompileResult::error(ExcelError::Ref));
    }

    let start = address.range.start;
    let end = address.range.end;
    let Some((from_row, to_row)) =
        shift_span(i64::from(start.row), i64::from(end.row), rows, height)
    else {
        return Ok(CompileResult::error(ExcelError::Ref));
    };
    let Some((from_col, to_col)) =
        shift_span(i64::from(start.col), i64::from(end.col), cols, width)
    else {
        return Ok(CompileResult::error(ExcelError::Ref));
    };

    let in_rows = |r: i64| (0..i64::from(MAX_ROWS)).contains(&r);
    let in_cols = |c: i64| (0..i64::from(MAX_COLS)).contains(&c);
    if !(in_rows(from_row) && in_rows(to_row) && in_cols(from_col) && in_cols(to_col)) {
        return Ok(CompileResult::error(ExcelError::Ref));
    }

    let range = CellRange::from_indices(
        from_row.min(to_row) as u32,
        from_col.min(to_col) as u16,
        from_row.max(to_row) as u32,
        from_col.max(to_col) as u16,
    );
    Ok(CompileResult::range(RangeAddress::new(address.worksheet.clone(), range)))
}

/// Move `start..=end` by `offset`, resizing it to `size` when given
fn shift_span(start: i64, end: i64, offset: i64, size: Option<i64>) -> Option<(i64, i64)> {
    let from = start.checked_add(offset)?;
    let to = match size {
        Some(size) => start.checked_add(size)?.checked_sub(1)?,
        None => end,
    };
    Some((from, to.checked_add(offset)?))
}

/// ROW function; without an argument, the row of the formula's cell
pub fn fn_row(args: &[FunctionArgument], ctx: &ParsingContext<'_>) -> FormulaResult<CompileResult> {
    let row = match args.first() {
        Some(arg) => reference_arg(arg)?.range.start.row,
        None => ctx.scope().row,
    };
    Ok(CompileResult::integer(f64::from(row) + 1.0))
}

/// COLUMN function; without an argument, the column of the formula's cell
pub fn fn_column(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let col = match args.first() {
        Some(arg) => reference_arg(arg)?.range.start.col,
        None => ctx.scope().col,
    };
    Ok(CompileResult::integer(f64::from(col) + 1.0))
}

/// ROWS function
pub fn fn_rows(
    args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let rows = match &args[0].value {
        Value::Range(address) => address.range.row_count() as usize,
        Value::Array(rows) => rows.len(),
        _ => 1,
    };
    Ok(CompileResult::integer(rows as f64))
}

/// COLUMNS function
pub fn fn_columns(
    args: &[FunctionArgument],
    _ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let cols = match &args[0].value {
        Value::Range(address) => usize::from(address.range.col_count()),
        Value::Array(rows) => rows.first().map_or(0, Vec::len),
        _ => 1,
    };
    Ok(CompileResult::integer(cols as f64))
}

/// INDEX function
///
/// A row or column number of 0 selects the whole column or row. A one-row area can be
/// indexed by a single column number.
pub fn fn_index(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let (rows, cols) = match &args[0].value {
        Value::Range(address) => (
            i64::from(address.range.row_count()),
            i64::from(address.range.col_count()),
        ),
        Value::Array(values) => (
            values.len() as i64,
            values.first().map_or(0, Vec::len) as i64,
        ),
        _ => (1, 1),
    };

    let first = arg_to_int(&args[1], ctx)?;
    let second = optional(args, 2).map(|arg| arg_to_int(arg, ctx)).transpose()?;
    let (row, col) = match second {
        Some(col) => (first, col),
        None if rows == 1 => (1, first),
        None if cols == 1 => (first, 1),
        None => (first, 0),
    };
    if row < 0 || col < 0 {
        return Ok(CompileResult::error(ExcelError::Value));
    }
    if row > rows || col > cols {
        return Ok(CompileResult::error(ExcelError::Ref));
    }

    match &args[0].value {
        Value::Range(address) => {
            let range = address.range;
            let (from_row, to_row) = match row {
                0 => (range.start.row, range.end.row),
                r => (range.start.row + r as u32 - 1, range.start.row + r as u32 - 1),
            };
            let (from_col, to_col) = match col {
                0 => (range.start.col, range.end.col),
                c => (range.start.col + c as u16 - 1, range.start.col + c as u16 - 1),
            };
            let selected = CellRange::from_indices(from_row, from_col, to_row, to_col);
            Ok(CompileResult::range(RangeAddress::new(address.worksheet.clone(), selected)))
        }
        Value::Array(values) => {
            let pick_row = |r: &Vec<Value>| -> Vec<Value> {
                match col {
                    0 => r.clone(),
                    c => vec![r.get(c as usize - 1).cloned().unwrap_or_default()],
                }
            };
            let selected: Vec<Vec<Value>> = match row {
                0 => values.iter().map(pick_row).collect(),
                r => values.get(r as usize - 1).map(pick_row).into_iter().collect(),
            };
            match selected.as_slice() {
                [single] if single.len() == 1 => Ok(CompileResult::from(single[0].clone())),
                _ => Ok(CompileResult::array(selected)),
            }
        }
        other => Ok(CompileResult::from(other.clone())),
    }
}

/// Values of a one-row or one-column lookup area, in order
fn lookup_vector(
    arg: &FunctionArgument,
    ctx: &ParsingContext<'_>,
) -> FormulaResult<Option<Vec<Value>>> {
    let grid = ArgGrid::from_argument(arg, ctx)?;
    if grid.rows() > 1 && grid.cols() > 1 {
        return Ok(None);
    }
    Ok(Some(grid.positions().map(|(r, c)| grid.get(r, c)).collect()))
}

fn same_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Boolean(_), Value::Boolean(_))
    )
}

/// MATCH function
///
/// Match type 0 finds the first equal value (text may use wildcards); 1 finds the largest value
/// not above the lookup value in ascending data; -1 the smallest value not below it in
/// descending data.
pub fn fn_match(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let lookup = arg_scalar(&args[0], ctx)?;
    let match_type = match optional(args, 2) {
        Some(arg) => arg_to_int(arg, ctx)?.signum(),
        None => 1,
    };
    let Some(values) = lookup_vector(&args[1], ctx)? else {
        return Ok(CompileResult::error(ExcelError::NA));
    };

    let position = match match_type {
        0 => values.iter().position(|candidate| match (&lookup, candidate) {
            (Value::String(pattern), Value::String(text)) => wildcard_matches(pattern, text),
            _ => same_kind(&lookup, candidate)
                && compare_values(candidate, &lookup) == Ordering::Equal,
        }),
        _ => {
            let wanted = if match_type > 0 {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            let mut best = None;
            for (index, candidate) in values.iter().enumerate() {
                if !same_kind(&lookup, candidate) {
                    continue;
                }
                if compare_values(candidate, &lookup) == wanted {
                    break;
                }
                best = Some(index);
            }
            best
        }
    };

    Ok(match position {
        Some(index) => CompileResult::integer((index + 1) as f64),
        None => CompileResult::error(ExcelError::NA),
    })
}

/// CHOOSE function
pub fn fn_choose(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let index = arg_to_int(&args[0], ctx)?;
    let chosen = usize::try_from(index)
        .ok()
        .filter(|i| *i >= 1)
        .and_then(|i| args.get(i));
    Ok(match chosen {
        Some(arg) => CompileResult::new(arg.value.clone(), arg.data_type),
        None => CompileResult::error(ExcelError::Value),
    })
}

/// INDIRECT function
///
/// Accepts A1-style references and defined names that refer to a range.
pub fn fn_indirect(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<CompileResult> {
    let text = arg_to_string(&args[0], ctx)?;
    if let Some(arg) = optional(args, 1) {
        if !arg_to_bool(arg, ctx)? {
            return Err(FormulaError::NotSupported("R1C1 references".to_string()));
        }
    }

    let expanded = AddressUtility::parse_entire_column_selections(text.trim());
    let address = match RangeAddress::parse(&expanded) {
        Some(address) => address.with_default_worksheet(&ctx.scope().worksheet),
        None => match ctx.resolve_name(None, text.trim())?.value {
            Value::Range(address) => address,
            _ => return Ok(CompileResult::error(ExcelError::Ref)),
        },
    };
    if !ctx.provider()?.worksheet_exists(address.worksheet_name()) {
        return Ok(CompileResult::error(ExcelError::Ref));
    }
    Ok(CompileResult::range(address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingConfiguration;
    use crate::context::ParsingScope;
    use crate::functions::testing::{eval, eval_plain};
    use crate::functions::FunctionRepository;
    use crate::provider::WorkbookDataProvider;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn grid() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        for row in 1..=4 {
            sheet.set_cell_value(&format!("A{row}"), f64::from(row * 10)).unwrap();
            sheet.set_cell_value(&format!("B{row}"), format!("item{row}")).unwrap();
        }
        wb.define_name("Items", "Sheet1!$B$1:$B$4").unwrap();
        wb
    }

    fn raw(wb: &Workbook, formula: &str) -> FormulaResult<CompileResult> {
        let provider = WorkbookDataProvider::new(wb);
        let config = ParsingConfiguration::default();
        let ctx = ParsingContext::new(
            Some(&provider),
            FunctionRepository::global(),
            &config,
            ParsingScope::new("Sheet1", 4, 2),
        );
        ctx.compile_formula(formula)
    }

    fn range(text: &str) -> CompileResult {
        CompileResult::range(RangeAddress::parse(text).unwrap())
    }

    #[test]
    fn test_address() {
        assert_eq!(eval_plain("ADDRESS(2,3)"), CompileResult::address("$C$2"));
        assert_eq!(eval_plain("ADDRESS(2,3,2)"), CompileResult::address("C$2"));
        assert_eq!(eval_plain("ADDRESS(2,3,3)"), CompileResult::address("$C2"));
        assert_eq!(eval_plain("ADDRESS(2,28,4)"), CompileResult::address("AB2"));
        assert_eq!(
            eval_plain("ADDRESS(1,1,4,TRUE,\"My Sheet\")"),
            CompileResult::address("'My Sheet'!A1")
        );
        assert_eq!(eval_plain("ADDRESS(1,1,1,TRUE,\"Data\")"), CompileResult::address("Data!$A$1"));
        assert_eq!(eval_plain("ADDRESS(1,1,5)"), CompileResult::error(ExcelError::Value));
        assert_eq!(eval_plain("ADDRESS(-1,-1)"), CompileResult::error(ExcelError::Value));
        assert!(matches!(
            raw(&Workbook::new(), "ADDRESS(1,1,1,FALSE)"),
            Err(FormulaError::NotSupported(_))
        ));
    }

    #[test]
    fn test_offset() {
        let wb = grid();
        assert_eq!(raw(&wb, "OFFSET(A1,1,1)").unwrap(), range("Sheet1!B2"));
        assert_eq!(raw(&wb, "OFFSET(A1:B2,2,0)").unwrap(), range("Sheet1!A3:B4"));
        assert_eq!(raw(&wb, "OFFSET(A1,0,0,3,2)").unwrap(), range("Sheet1!A1:B3"));
        assert_eq!(raw(&wb, "OFFSET(A1,0,0,0,1)").unwrap(), CompileResult::error(ExcelError::Ref));
        assert_eq!(raw(&wb, "OFFSET(A1,-1,0)").unwrap(), CompileResult::error(ExcelError::Ref));
        assert_eq!(eval(&wb, "SUM(OFFSET(A1,1,0,3,1))"), CompileResult::number(90.0));
        assert_eq!(eval(&wb, "OFFSET(A1,2,1)"), CompileResult::string("item3"));
    }

    #[test]
    fn test_offset_with_huge_displacements() {
        let wb = grid();
        let reference_error = Ok(CompileResult::error(ExcelError::Ref));
        assert_eq!(raw(&wb, "OFFSET(B2,1E300,0)"), reference_error);
        assert_eq!(raw(&wb, "OFFSET(B2,0,-1E300)"), reference_error);
        assert_eq!(raw(&wb, "OFFSET(B2,0,0,1E300,1)"), reference_error);
        assert_eq!(raw(&wb, "OFFSET(B2,-1E300,0,1E300)"), reference_error);
    }

    #[test]
    fn test_row_and_column() {
        let wb = grid();
        assert_eq!(eval(&wb, "ROW(C7)"), CompileResult::integer(7.0));
        assert_eq!(eval(&wb, "COLUMN(C7:D9)"), CompileResult::integer(3.0));
        assert_eq!(raw(&wb, "ROW()").unwrap(), CompileResult::integer(5.0));
        assert_eq!(raw(&wb, "COLUMN()").unwrap(), CompileResult::integer(3.0));
        assert_eq!(eval(&wb, "ROWS(A1:B4)"), CompileResult::integer(4.0));
        assert_eq!(eval(&wb, "COLUMNS(A1:B4)"), CompileResult::integer(2.0));
        assert_eq!(eval_plain("COLUMNS({1,2,3;4,5,6})"), CompileResult::integer(3.0));
    }

    #[test]
    fn test_index_and_match() {
        let wb = grid();
        assert_eq!(eval(&wb, "INDEX(A1:B4,3,2)"), CompileResult::string("item3"));
        assert_eq!(eval(&wb, "INDEX(A1:A4,2)"), CompileResult::integer(20.0));
        assert_eq!(eval(&wb, "SUM(INDEX(A1:B4,0,1))"), CompileResult::number(100.0));
        assert_eq!(eval(&wb, "INDEX(A1:B4,5,1)"), CompileResult::error(ExcelError::Ref));
        assert_eq!(eval_plain("INDEX({1,2;3,4},2,1)"), CompileResult::integer(3.0));

        assert_eq!(eval(&wb, "MATCH(30,A1:A4,0)"), CompileResult::integer(3.0));
        assert_eq!(eval(&wb, "MATCH(35,A1:A4)"), CompileResult::integer(3.0));
        assert_eq!(eval(&wb, "MATCH(5,A1:A4,1)"), CompileResult::error(ExcelError::NA));
        assert_eq!(eval(&wb, "MATCH(\"ITEM*\",B1:B4,0)"), CompileResult::integer(1.0));
        assert_eq!(eval(&wb, "MATCH(\"item4\",Items,0)"), CompileResult::integer(4.0));
        assert_eq!(eval_plain("MATCH(25,{40,30,20,10},-1)"), CompileResult::integer(2.0));
        assert_eq!(eval(&wb, "INDEX(B1:B4,MATCH(40,A1:A4,0))"), CompileResult::string("item4"));
    }

    #[test]
    fn test_choose_and_indirect() {
        let wb = grid();
        assert_eq!(eval_plain("CHOOSE(2,\"a\",\"b\",\"c\")"), CompileResult::string("b"));
        assert_eq!(
            eval_plain("CHOOSE(4,\"a\",\"b\",\"c\")"),
            CompileResult::error(ExcelError::Value)
        );
        assert_eq!(eval(&wb, "INDIRECT(\"A2\")"), CompileResult::integer(20.0));
        assert_eq!(eval(&wb, "INDIRECT(\"Sheet1!B\"&2)"), CompileResult::string("item2"));
        assert_eq!(eval(&wb, "SUM(INDIRECT(\"A:A\"))"), CompileResult::number(100.0));
        assert_eq!(eval(&wb, "COUNTA(INDIRECT(\"Items\"))"), CompileResult::integer(4.0));
        assert_eq!(eval(&wb, "INDIRECT(\"Nowhere!A1\")"), CompileResult::error(ExcelError::Ref));
        assert_eq!(eval(&wb, "INDIRECT(\"not a ref\")"), CompileResult::error(ExcelError::Ref));
        assert!(matches!(
            raw(&wb, "INDIRECT(\"R1C1\",FALSE)"),
            Err(FormulaError::NotSupported(_))
        ));
    }
}
