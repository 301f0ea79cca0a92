//! # sheetcalc
//!
//! A spreadsheet formula engine with an in-memory workbook model.
//!
//! ## Features
//!
//! - Tokenizing and compiling spreadsheet formulas with Excel precedence and coercion rules
//! - Error values (`#DIV/0!`, `#N/A`, ...) propagated as results, not panics
//! - Built-in math, statistical, logical, text, date and lookup functions
//! - Cell references, whole-column ranges, sheet-qualified references and defined names
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 1.5).unwrap();
//! sheet.set_cell_value("A2", 2.5).unwrap();
//! sheet.set_cell_formula("A3", "=SUM(A1:A2)*2").unwrap();
//!
//! assert_eq!(workbook.evaluate_cell("Sheet1", "A3").unwrap(), CellValue::Number(8.0));
//!
//! let result = workbook.evaluate_formula("Sheet1", "=IF(A1>1,\"big\",\"small\")").unwrap();
//! assert_eq!(result.value, Value::String("big".into()));
//! ```

pub mod error;
pub mod evaluation;
pub mod prelude;

pub use error::{Error, Result};
pub use evaluation::{EvaluationOptions, EvaluationStats, WorkbookFormulaExt};

// Re-export core types
pub use sheetcalc_core::{
    CellAddress, CellData, CellError, CellRange, CellValue, NameScope, NamedRange,
    NamedRangeCollection, NumberFormat, Workbook, Worksheet, MAX_COLS, MAX_ROWS,
    MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use sheetcalc_formula::{
    CompileResult, DataProvider, DataType, ExcelError, ExcelFunction, FormulaError,
    FormulaParser, FormulaResult, FunctionArgument, FunctionRepository, ParsingConfiguration,
    ParsingContext, ParsingScope, RangeAddress, Token, TokenKind, Tokenizer, Value,
    WorkbookDataProvider,
};
