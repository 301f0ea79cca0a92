//! Error type for the sheetcalc facade

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the spreadsheet model or the formula engine
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid address, unknown sheet or other model fault
    #[error(transparent)]
    Model(#[from] sheetcalc_core::Error),

    /// Host fault raised while evaluating a formula
    #[error(transparent)]
    Formula(#[from] sheetcalc_formula::FormulaError),
}
