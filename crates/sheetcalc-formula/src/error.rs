//! Formula error types
//!
//! Spreadsheet-semantic failures (`#DIV/0!`, `#VALUE!`, ...) are ordinary values carried in a
//! [`CompileResult`](crate::CompileResult). [`FormulaError`] is reserved for faults in the host
//! or the engine itself, plus [`FormulaError::Value`], which lets function bodies raise a value
//! error with `?`; it is turned back into an error result before it leaves the compiler.

use thiserror::Error;

use crate::value::ExcelError;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// A function name that is not in the repository
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// A reference or name was used without a data provider
    #[error("A data provider is required to resolve references and names")]
    MissingDataProvider,

    /// A feature the engine deliberately does not implement (e.g. R1C1 references)
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Nesting of groups, arguments, names or function calls exceeded the configured maximum
    #[error("Formula is too complex: nesting depth exceeded {depth}")]
    TooComplex { depth: usize },

    /// A provider call named a worksheet that does not exist
    #[error("Unknown worksheet: {0}")]
    UnknownWorksheet(String),

    /// A reference the provider cannot resolve
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Internal evaluation fault
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// A spreadsheet error value raised from a function body
    #[error("{0}")]
    Value(ExcelError),
}

impl From<ExcelError> for FormulaError {
    fn from(error: ExcelError) -> Self {
        FormulaError::Value(error)
    }
}
