//! Prelude module - common imports for sheetcalc users
//!
//! ```rust
//! use sheetcalc::prelude::*;
//! ```

pub use crate::{
    // Cell types
    CellAddress,
    CellError,
    CellRange,
    CellValue,
    // Formula types
    CompileResult,
    EvaluationOptions,
    ExcelError,
    FormulaParser,
    ParsingConfiguration,
    Value,
    // Main types
    Workbook,
    // Extension traits
    WorkbookFormulaExt,
    Worksheet,
};
