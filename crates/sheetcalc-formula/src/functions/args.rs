//! Argument conversion helpers
//!
//! Conversions fail with `FormulaError::Value`, so function bodies can use `?` and still
//! produce an error value instead of a fault.

use ahash::AHashMap;

use crate::context::ParsingContext;
use crate::error::FormulaResult;
use crate::value::{parse_number_text, ExcelError, FunctionArgument, Value};

/// Ranges larger than this are clipped to the used area of their sheet when walked cell by cell
const DENSE_WALK_LIMIT: u64 = 100_000;

/// Scalar value of an argument
///
/// A single-cell reference yields the cell's value; a larger reference is `#VALUE!`.
/// Arrays yield their first element.
pub fn arg_value(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<Value> {
    match &arg.value {
        Value::Range(address) if address.is_single_cell() => ctx.cell_value(
            ctx.worksheet_of(address),
            address.range.start.row,
            address.range.start.col,
        ),
        Value::Range(_) => Err(ExcelError::Value.into()),
        Value::Array(rows) => Ok(rows
            .first()
            .and_then(|row| row.first())
            .cloned()
            .unwrap_or_default()),
        other => Ok(other.clone()),
    }
}

/// Scalar value with error values raised
pub fn arg_scalar(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<Value> {
    let value = arg_value(arg, ctx)?;
    match value.error() {
        Some(error) => Err(error.into()),
        None => Ok(value),
    }
}

pub fn arg_to_decimal(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<f64> {
    Ok(arg_value(arg, ctx)?.coerce_to_number()?)
}

/// Integer argument, truncated toward zero
pub fn arg_to_int(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<i64> {
    Ok(arg_to_decimal(arg, ctx)?.trunc() as i64)
}

pub fn arg_to_bool(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<bool> {
    Ok(arg_value(arg, ctx)?.coerce_to_bool()?)
}

pub fn arg_to_string(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<String> {
    Ok(arg_scalar(arg, ctx)?.to_text())
}

/// Date serial from a number, numeric text or date text
///
/// A reference contributes its first cell.
pub fn arg_to_date(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<f64> {
    let value = match &arg.value {
        Value::Range(address) => ctx.cell_value(
            ctx.worksheet_of(address),
            address.range.start.row,
            address.range.start.col,
        )?,
        _ => arg_value(arg, ctx)?,
    };
    match value {
        Value::Number(n) => Ok(n),
        Value::Empty => Ok(0.0),
        Value::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_number_text(&s).ok_or_else(|| ExcelError::Value.into()),
        Value::Error(e) => Err(e.into()),
        Value::Range(_) | Value::Array(_) => Err(ExcelError::Value.into()),
    }
}

/// Argument at `index`, treating an omitted argument as absent
pub fn optional(args: &[FunctionArgument], index: usize) -> Option<&FunctionArgument> {
    args.get(index).filter(|arg| !matches!(arg.value, Value::Empty))
}

/// One value collected from an argument
#[derive(Debug, Clone, PartialEq)]
pub struct ArgValue {
    pub value: Value,
    /// Came from a reference or array rather than a direct argument
    pub from_reference: bool,
}

/// Values of a list of arguments, in argument order
pub type ArgValues<'a> = Box<dyn Iterator<Item = ArgValue> + 'a>;

/// Flatten arguments: references through the provider, arrays element by element
///
/// Ranges are pulled from the provider as the stream is consumed, so only stored cells
/// are ever visited.
pub fn arg_values<'a>(
    args: &'a [FunctionArgument],
    ctx: &ParsingContext<'a>,
) -> FormulaResult<ArgValues<'a>> {
    let mut streams: Vec<ArgValues<'a>> = Vec::with_capacity(args.len());
    for arg in args {
        let stream: ArgValues<'a> = match &arg.value {
            Value::Range(address) => Box::new(ctx.range_cells(address)?.map(|cell| ArgValue {
                value: cell.value,
                from_reference: true,
            })),
            Value::Array(rows) => Box::new(rows.iter().flatten().map(|value| ArgValue {
                value: value.clone(),
                from_reference: true,
            })),
            other => Box::new(std::iter::once(ArgValue {
                value: other.clone(),
                from_reference: false,
            })),
        };
        streams.push(stream);
    }
    Ok(Box::new(streams.into_iter().flatten()))
}

/// Number carried by one collected value, if aggregates count it
///
/// Referenced text and booleans are ignored; direct booleans and numeric text count.
/// Any error value is raised.
fn numeric_item(item: ArgValue) -> Option<FormulaResult<f64>> {
    match item.value {
        Value::Number(n) => Some(Ok(n)),
        Value::Error(e) => Some(Err(e.into())),
        Value::Boolean(b) if !item.from_reference => Some(Ok(if b { 1.0 } else { 0.0 })),
        Value::String(s) if !item.from_reference => {
            Some(parse_number_text(&s).ok_or_else(|| ExcelError::Value.into()))
        }
        _ => None,
    }
}

/// Fold the numbers of the arguments, stopping at the first error value
pub fn fold_numbers<B>(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
    init: B,
    mut f: impl FnMut(B, f64) -> B,
) -> FormulaResult<B> {
    arg_values(args, ctx)?
        .filter_map(numeric_item)
        .try_fold(init, |acc, number| number.map(|n| f(acc, n)))
}

/// Numbers for aggregate functions that need all of them at once
pub fn numeric_values(
    args: &[FunctionArgument],
    ctx: &ParsingContext<'_>,
) -> FormulaResult<Vec<f64>> {
    arg_values(args, ctx)?.filter_map(numeric_item).collect()
}

/// Value at a row/column offset inside an argument
///
/// Offsets outside an array or scalar read as empty; references are not bounded.
pub fn value_at_offset(
    arg: &FunctionArgument,
    row: u32,
    col: u32,
    ctx: &ParsingContext<'_>,
) -> FormulaResult<Value> {
    match &arg.value {
        Value::Range(address) => {
            let target_row = address.range.start.row.saturating_add(row);
            let target_col = u32::from(address.range.start.col).saturating_add(col);
            let Ok(target_col) = u16::try_from(target_col) else {
                return Ok(Value::Empty);
            };
            ctx.cell_value(ctx.worksheet_of(address), target_row, target_col)
        }
        Value::Array(rows) => Ok(rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .cloned()
            .unwrap_or_default()),
        other if row == 0 && col == 0 => Ok(other.clone()),
        _ => Ok(Value::Empty),
    }
}

/// Positional view over a range, array or scalar argument
#[derive(Debug, Clone, Default)]
pub struct ArgGrid {
    rows: u32,
    cols: u32,
    cells: AHashMap<(u32, u32), Value>,
}

impl ArgGrid {
    /// Build a grid; huge references are clipped to the used area of their sheet
    pub fn from_argument(arg: &FunctionArgument, ctx: &ParsingContext<'_>) -> FormulaResult<Self> {
        match &arg.value {
            Value::Range(address) => {
                let range = address.range;
                let (mut rows, mut cols) = (range.row_count(), u32::from(range.col_count()));
                if range.cell_count() > DENSE_WALK_LIMIT {
                    let end = ctx.provider()?.dimension_end(ctx.worksheet_of(address));
                    let (end_row, end_col) = end.unwrap_or((0, 0));
                    rows = rows.min((end_row + 1).saturating_sub(range.start.row));
                    let end_cols =
                        (u32::from(end_col) + 1).saturating_sub(u32::from(range.start.col));
                    cols = cols.min(end_cols);
                    if end.is_none() {
                        rows = 0;
                        cols = 0;
                    }
                }
                let cells = ctx
                    .range_cells(address)?
                    .map(|cell| {
                        let key = (
                            cell.row - range.start.row,
                            u32::from(cell.col - range.start.col),
                        );
                        (key, cell.value)
                    })
                    .collect();
                Ok(Self { rows, cols, cells })
            }
            Value::Array(values) => {
                let rows = values.len() as u32;
                let cols = values.iter().map(Vec::len).max().unwrap_or(0) as u32;
                let cells = values
                    .iter()
                    .enumerate()
                    .flat_map(|(r, row)| {
                        row.iter()
                            .enumerate()
                            .map(move |(c, v)| ((r as u32, c as u32), v.clone()))
                    })
                    .collect();
                Ok(Self { rows, cols, cells })
            }
            other => {
                let mut cells = AHashMap::new();
                cells.insert((0, 0), other.clone());
                Ok(Self {
                    rows: 1,
                    cols: 1,
                    cells,
                })
            }
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of positions
    pub fn len(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at a position; unset cells are empty
    pub fn get(&self, row: u32, col: u32) -> Value {
        self.cells.get(&(row, col)).cloned().unwrap_or_default()
    }

    /// All positions, row-major
    pub fn positions(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.rows).flat_map(move |r| (0..self.cols).map(move |c| (r, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingConfiguration;
    use crate::context::ParsingScope;
    use crate::functions::FunctionRepository;
    use crate::provider::WorkbookDataProvider;
    use crate::value::RangeAddress;
    use sheetcalc_core::Workbook;

    fn range(text: &str) -> FunctionArgument {
        FunctionArgument::new(Value::Range(RangeAddress::parse(text).unwrap()))
    }

    fn with_context<R>(f: impl FnOnce(&ParsingContext) -> R) -> R {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 1.0).unwrap();
        sheet.set_cell_value("A2", "2").unwrap();
        sheet.set_cell_value("A3", true).unwrap();
        sheet.set_cell_value("A4", 4.0).unwrap();
        sheet.set_cell_value("B1", "2021-01-01").unwrap();
        sheet.set_row_hidden(3, true);
        let provider = WorkbookDataProvider::new(&wb);
        let config = ParsingConfiguration::default();
        let ctx = ParsingContext::new(
            Some(&provider),
            FunctionRepository::global(),
            &config,
            ParsingScope::new("Sheet1", 0, 0),
        );
        f(&ctx)
    }

    #[test]
    fn test_scalar_conversions() {
        with_context(|ctx| {
            assert_eq!(arg_to_decimal(&FunctionArgument::new("2.5"), ctx), Ok(2.5));
            assert_eq!(arg_to_int(&FunctionArgument::new(-2.7), ctx), Ok(-2));
            assert_eq!(arg_to_decimal(&range("A1"), ctx), Ok(1.0));
            assert_eq!(
                arg_to_decimal(&range("A1:A2"), ctx),
                Err(ExcelError::Value.into())
            );
            assert_eq!(arg_to_bool(&FunctionArgument::new(0.0), ctx), Ok(false));
            assert_eq!(arg_to_string(&FunctionArgument::new(true), ctx), Ok("TRUE".into()));
            assert_eq!(
                arg_to_string(&FunctionArgument::new(ExcelError::NA), ctx),
                Err(ExcelError::NA.into())
            );
        });
    }

    #[test]
    fn test_arg_to_date() {
        with_context(|ctx| {
            assert_eq!(arg_to_date(&FunctionArgument::new(44197.0), ctx), Ok(44197.0));
            assert_eq!(arg_to_date(&FunctionArgument::new("44197"), ctx), Ok(44197.0));
            assert_eq!(arg_to_date(&range("B1:B9"), ctx), Ok(44197.0));
            assert_eq!(
                arg_to_date(&FunctionArgument::new("soon"), ctx),
                Err(ExcelError::Value.into())
            );
        });
    }

    #[test]
    fn test_numeric_values() {
        with_context(|ctx| {
            let args = [range("A1:A4"), FunctionArgument::new("3"), FunctionArgument::new(true)];
            assert_eq!(numeric_values(&args, ctx), Ok(vec![1.0, 4.0, 3.0, 1.0]));
            assert_eq!(fold_numbers(&args, ctx, 0.0, |acc, n| acc + n), Ok(9.0));
            let bad = [FunctionArgument::new("x")];
            assert_eq!(numeric_values(&bad, ctx), Err(ExcelError::Value.into()));
            assert_eq!(
                fold_numbers(&bad, ctx, 0usize, |count, _| count + 1),
                Err(ExcelError::Value.into())
            );
        });
    }

    #[test]
    fn test_grid_and_offsets() {
        with_context(|ctx| {
            let grid = ArgGrid::from_argument(&range("A1:B4"), ctx).unwrap();
            assert_eq!((grid.rows(), grid.cols()), (4, 2));
            assert_eq!(grid.get(3, 0), Value::Number(4.0));
            assert_eq!(grid.get(3, 1), Value::Empty);
            assert_eq!(grid.positions().count(), 8);

            let clipped = ArgGrid::from_argument(&range("A:B"), ctx).unwrap();
            assert_eq!((clipped.rows(), clipped.cols()), (4, 2));

            assert_eq!(value_at_offset(&range("A1"), 3, 0, ctx), Ok(Value::Number(4.0)));
            let array = FunctionArgument::new(Value::Array(vec![vec![1.0.into(), 2.0.into()]]));
            assert_eq!(value_at_offset(&array, 0, 1, ctx), Ok(Value::Number(2.0)));
            assert_eq!(value_at_offset(&array, 1, 1, ctx), Ok(Value::Empty));
        });
    }
}
