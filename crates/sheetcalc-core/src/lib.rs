//! # sheetcalc-core
//!
//! The in-memory spreadsheet model that the sheetcalc formula engine reads from.
//!
//! This crate provides:
//! - [`CellValue`] - Values stored in cells (numbers, strings, booleans, errors, formulas)
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing, including whole rows/columns
//! - [`Worksheet`] - Sparse cell storage with hidden rows, merged regions and number formats
//! - [`Workbook`] - Worksheets plus defined names with workbook or sheet scope
//! - [`NumberFormat`] - Rendering of numbers through Excel format codes
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 42.0).unwrap();
//! sheet.set_cell_formula("A2", "=A1*2").unwrap();
//! sheet.set_row_hidden(3, true);
//!
//! assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Number(42.0));
//! ```

pub mod cell;
pub mod error;
pub mod named_range;
pub mod number_format;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{CellAddress, CellData, CellError, CellRange, CellValue, SharedString};
pub use error::{Error, Result};
pub use named_range::{NameScope, NamedRange, NamedRangeCollection};
pub use number_format::NumberFormat;
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
