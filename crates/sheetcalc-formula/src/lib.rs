//! # sheetcalc-formula
//!
//! Formula engine for sheetcalc.
//!
//! This crate provides:
//! - Tokenization of formula text
//! - An arena-backed expression graph and a precedence-reducing compiler
//! - Built-in spreadsheet functions, registered by name
//! - The [`DataProvider`] boundary to the host spreadsheet model
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::Workbook;
//! use sheetcalc_formula::{FormulaParser, Value, WorkbookDataProvider};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 1.0).unwrap();
//! sheet.set_cell_value("A2", 2.0).unwrap();
//!
//! let provider = WorkbookDataProvider::new(&workbook);
//! let result = FormulaParser::with_provider(&provider).parse("=SUM(A1:A2)*2").unwrap();
//! assert_eq!(result.value, Value::Number(6.0));
//! ```

pub mod compiler;
pub mod config;
pub mod context;
pub mod datetime;
pub mod error;
pub mod expression;
pub mod functions;
pub mod parser;
pub mod provider;
pub mod strategy;
pub mod tokenizer;
pub mod value;

pub use config::ParsingConfiguration;
pub use context::{ParsingContext, ParsingScope};
pub use error::{FormulaError, FormulaResult};
pub use functions::{ExcelFunction, FunctionRepository};
pub use parser::FormulaParser;
pub use provider::{AddressUtility, CellInfo, DataProvider, NameInfo, WorkbookDataProvider};
pub use tokenizer::{Token, TokenKind, Tokenizer};
pub use value::{CompileResult, DataType, ExcelError, FunctionArgument, RangeAddress, Value};
