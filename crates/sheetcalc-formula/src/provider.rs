//! Data provider
//!
//! The engine reads cells, names and formats only through [`DataProvider`].
//! [`WorkbookDataProvider`] implements it over an in-memory [`Workbook`].

use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use lazy_regex::regex_captures;
use sheetcalc_core::{
    CellAddress, CellRange, NameScope, NamedRange, NumberFormat, Workbook, Worksheet, MAX_COLS,
    MAX_ROWS,
};
use tracing::{debug, trace};

use crate::error::{FormulaError, FormulaResult};
use crate::tokenizer::{Token, Tokenizer};
use crate::value::{format_number, ExcelError, RangeAddress, Value};

/// One cell as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct CellInfo {
    pub row: u32,
    pub col: u16,
    /// Value, or the cached result for formula cells
    pub value: Value,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
    pub is_hidden_row: bool,
}

impl CellInfo {
    /// A1 address of the cell
    pub fn address(&self) -> String {
        CellAddress::new(self.row, self.col).to_a1_string()
    }

    /// Numeric view of the value; non-numeric values read as 0
    pub fn value_double(&self) -> f64 {
        match &self.value {
            Value::Number(n) => *n,
            Value::Boolean(true) => 1.0,
            _ => 0.0,
        }
    }

    /// Check if the cell holds an error value
    pub fn is_excel_error(&self) -> bool {
        self.value.is_error()
    }
}

/// A resolved defined name
#[derive(Debug, Clone, PartialEq)]
pub struct NameInfo {
    pub id: u64,
    /// Sheet the name is scoped to, `None` for workbook names
    pub worksheet: Option<String>,
    pub name: String,
    /// Formula to compile when the name is not a constant or a reference
    pub formula: Option<String>,
    /// Constant value or reference
    pub value: Option<Value>,
}

/// Lazy row-major cell iterator
pub type CellIter<'p> = Box<dyn Iterator<Item = CellInfo> + 'p>;

/// Read access to the host spreadsheet model
pub trait DataProvider: Send + Sync {
    /// Stored cells of a rectangle, row-major
    fn get_range(
        &self,
        worksheet: &str,
        from_row: u32,
        from_col: u16,
        to_row: u32,
        to_col: u16,
    ) -> FormulaResult<CellIter<'_>>;

    /// Stored cells of an A1 address; a sheet in the address overrides `worksheet`
    fn get_range_by_address(&self, worksheet: &str, address: &str) -> FormulaResult<CellIter<'_>> {
        let expanded = AddressUtility::parse_entire_column_selections(address);
        let parsed = RangeAddress::parse(&expanded)
            .ok_or_else(|| FormulaError::InvalidReference(address.to_string()))?;
        let sheet = parsed.worksheet.as_deref().unwrap_or(worksheet);
        let range = parsed.range;
        self.get_range(
            sheet,
            range.start.row,
            range.start.col,
            range.end.row,
            range.end.col,
        )
    }

    /// Look up a defined name, sheet-local names first
    fn get_name(&self, worksheet: Option<&str>, name: &str) -> Option<Arc<NameInfo>>;

    /// Value of one cell
    fn get_cell_value(&self, worksheet: &str, row: u32, col: u16) -> FormulaResult<Value>;

    /// Formula of one cell, without the leading `=`
    fn get_range_formula(&self, worksheet: &str, row: u32, col: u16)
        -> FormulaResult<Option<String>>;

    /// Tokens of a cell's formula; empty when the cell has none
    fn get_range_formula_tokens(
        &self,
        worksheet: &str,
        row: u32,
        col: u16,
    ) -> FormulaResult<Vec<Token>> {
        Ok(self
            .get_range_formula(worksheet, row, col)?
            .map(|formula| Tokenizer::default().tokenize(&formula))
            .unwrap_or_default())
    }

    fn is_row_hidden(&self, worksheet: &str, row: u32) -> bool;

    fn is_merged(&self, worksheet: &str, row: u32, col: u16) -> bool;

    /// Render a value through a number format code
    fn get_format(&self, value: &Value, format: &str) -> String;

    fn worksheet_exists(&self, worksheet: &str) -> bool;

    /// Bottom-right corner of the used area of a sheet
    fn dimension_end(&self, worksheet: &str) -> Option<(u32, u16)>;

    /// Sheet used when a formula is evaluated without an explicit one
    fn default_worksheet(&self) -> Option<String>;

    /// Drop cached name lookups
    fn reset(&self);
}

/// Whole-column and whole-row address expansion
pub struct AddressUtility;

impl AddressUtility {
    /// Expand `A:B` to `A1:B1048576` and `2:3` to `A2:XFD3`; other addresses are unchanged
    pub fn parse_entire_column_selections(address: &str) -> String {
        let (prefix, reference) = match address.rfind('!') {
            Some(pos) => address.split_at(pos + 1),
            None => ("", address),
        };
        if let Some((_, first, last)) =
            regex_captures!(r"^(\$?[A-Za-z]{1,3}):(\$?[A-Za-z]{1,3})$", reference)
        {
            return format!("{}{}1:{}{}", prefix, first, last, MAX_ROWS);
        }
        if let Some((_, first, last)) = regex_captures!(r"^(\$?[0-9]+):(\$?[0-9]+)$", reference) {
            let last_col = CellAddress::column_to_letters(MAX_COLS - 1);
            return format!("{}A{}:{}{}", prefix, first, last_col, last);
        }
        address.to_string()
    }
}

/// [`DataProvider`] over an in-memory workbook
pub struct WorkbookDataProvider<'a> {
    workbook: &'a Workbook,
    names: RwLock<AHashMap<u64, Arc<NameInfo>>>,
}

impl<'a> WorkbookDataProvider<'a> {
    /// Wrap a workbook
    pub fn new(workbook: &'a Workbook) -> Self {
        Self {
            workbook,
            names: RwLock::new(AHashMap::new()),
        }
    }

    /// The wrapped workbook
    pub fn workbook(&self) -> &'a Workbook {
        self.workbook
    }

    fn sheet(&self, worksheet: &str) -> FormulaResult<&'a Worksheet> {
        self.workbook
            .worksheet_by_name(worksheet)
            .ok_or_else(|| FormulaError::UnknownWorksheet(worksheet.to_string()))
    }

    fn cached_name(&self, id: u64) -> Option<Arc<NameInfo>> {
        let names = self.names.read().unwrap_or_else(|e| e.into_inner());
        names.get(&id).cloned()
    }

    fn name_info(&self, named: &NamedRange) -> NameInfo {
        let worksheet = match named.scope {
            NameScope::Sheet(index) => {
                self.workbook.worksheet(index).map(|ws| ws.name().to_string())
            }
            NameScope::Workbook => None,
        };
        let expression = named.expression().trim();
        let (formula, value) = match classify_name_expression(expression) {
            Some(value) => (None, Some(value)),
            None => (Some(expression.to_string()), None),
        };
        NameInfo {
            id: named.id,
            worksheet,
            name: named.name.clone(),
            formula,
            value,
        }
    }
}

/// A constant or reference definition becomes a value; anything else is a formula
fn classify_name_expression(expression: &str) -> Option<Value> {
    if let Ok(n) = expression.parse::<f64>() {
        return Some(Value::Number(n));
    }
    if expression.eq_ignore_ascii_case("true") || expression.eq_ignore_ascii_case("false") {
        return Some(Value::Boolean(expression.eq_ignore_ascii_case("true")));
    }
    if let Some(error) = ExcelError::parse(expression) {
        return Some(Value::Error(error));
    }
    if let Some(inner) = expression
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .filter(|s| !s.replace("\"\"", "").contains('"'))
    {
        return Some(Value::String(inner.replace("\"\"", "\"")));
    }
    RangeAddress::parse(expression).map(Value::Range)
}

impl DataProvider for WorkbookDataProvider<'_> {
    fn get_range(
        &self,
        worksheet: &str,
        from_row: u32,
        from_col: u16,
        to_row: u32,
        to_col: u16,
    ) -> FormulaResult<CellIter<'_>> {
        let sheet = self.sheet(worksheet)?;
        let range = CellRange::from_indices(from_row, from_col, to_row, to_col);
        trace!(worksheet, range = %range, "reading range");
        Ok(Box::new(sheet.cells_in_range(range).map(move |(row, col, data)| {
            CellInfo {
                row,
                col,
                value: Value::from(&data.value),
                formula: data
                    .value
                    .formula_text()
                    .map(|f| f.strip_prefix('=').unwrap_or(f).to_string()),
                is_hidden_row: sheet.is_row_hidden(row),
            }
        })))
    }

    fn get_name(&self, worksheet: Option<&str>, name: &str) -> Option<Arc<NameInfo>> {
        let named = match worksheet.and_then(|ws| self.workbook.sheet_index(ws)) {
            Some(index) => self.workbook.get_named_range(name, index),
            None => self
                .workbook
                .named_ranges()
                .get_exact(name, NameScope::Workbook),
        }?;

        if let Some(info) = self.cached_name(named.id) {
            return Some(info);
        }
        debug!(name, id = named.id, "name cache miss");
        let info = Arc::new(self.name_info(named));
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        names.insert(named.id, Arc::clone(&info));
        Some(info)
    }

    fn get_cell_value(&self, worksheet: &str, row: u32, col: u16) -> FormulaResult<Value> {
        let sheet = self.sheet(worksheet)?;
        Ok(sheet
            .cell_at(row, col)
            .map(|data| Value::from(&data.value))
            .unwrap_or_default())
    }

    fn get_range_formula(
        &self,
        worksheet: &str,
        row: u32,
        col: u16,
    ) -> FormulaResult<Option<String>> {
        let sheet = self.sheet(worksheet)?;
        Ok(sheet
            .get_formula_at(row, col)
            .map(|f| f.strip_prefix('=').unwrap_or(f).to_string()))
    }

    fn is_row_hidden(&self, worksheet: &str, row: u32) -> bool {
        self.workbook
            .worksheet_by_name(worksheet)
            .map(|ws| ws.is_row_hidden(row))
            .unwrap_or(false)
    }

    fn is_merged(&self, worksheet: &str, row: u32, col: u16) -> bool {
        self.workbook
            .worksheet_by_name(worksheet)
            .map(|ws| ws.is_merged(row, col))
            .unwrap_or(false)
    }

    fn get_format(&self, value: &Value, format: &str) -> String {
        let number_format = NumberFormat::from_string(format);
        match value {
            Value::Number(n) => number_format.render(*n),
            Value::String(s) => number_format.render_text(s),
            Value::Boolean(_) | Value::Error(_) => value.to_text(),
            Value::Empty => number_format.render_text(""),
            Value::Range(_) | Value::Array(_) => format_number(0.0),
        }
    }

    fn worksheet_exists(&self, worksheet: &str) -> bool {
        self.workbook.sheet_index(worksheet).is_some()
    }

    fn dimension_end(&self, worksheet: &str) -> Option<(u32, u16)> {
        self.workbook
            .worksheet_by_name(worksheet)?
            .used_range()
            .map(|range| (range.end.row, range.end.col))
    }

    fn default_worksheet(&self) -> Option<String> {
        self.workbook.worksheet(0).map(|ws| ws.name().to_string())
    }

    fn reset(&self) {
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        names.clear();
    }
}
