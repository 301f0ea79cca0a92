//! Formula evaluation against a workbook
//!
//! Wires a [`Workbook`] to the formula engine through [`WorkbookDataProvider`].
//!
//! # Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_formula("A2", "=A1*3").unwrap();
//!
//! let value = workbook.evaluate_cell("Sheet1", "A2").unwrap();
//! assert_eq!(value, CellValue::Number(30.0));
//! ```

use sheetcalc_formula::{
    CompileResult, FormulaParser, ParsingConfiguration, WorkbookDataProvider,
};
use tracing::{debug, warn};

use crate::{CellAddress, CellValue, Error, Result, Workbook};

/// Options for evaluating formulas
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    /// Parser settings (nesting limit, argument separator, weekend days)
    pub configuration: ParsingConfiguration,
}

impl EvaluationOptions {
    pub fn with_configuration(mut self, configuration: ParsingConfiguration) -> Self {
        self.configuration = configuration;
        self
    }
}

/// Statistics from evaluating the formula cells of a sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Number of formula cells found
    pub formula_count: usize,
    /// Number of cells whose result was cached
    pub cells_evaluated: usize,
    /// Number of cells that evaluated to an error value or failed
    pub errors: usize,
}

/// Extension trait for Workbook to evaluate formulas
pub trait WorkbookFormulaExt {
    /// Evaluate formula text as if it were in cell A1 of `sheet`
    fn evaluate_formula(&self, sheet: &str, formula: &str) -> Result<CompileResult>;

    /// Evaluate formula text as if it were in the cell at `address`
    fn evaluate_formula_at(
        &self,
        sheet: &str,
        address: &str,
        formula: &str,
        options: &EvaluationOptions,
    ) -> Result<CompileResult>;

    /// Evaluate the formula stored at `address` and cache its result in the cell
    ///
    /// Cells without a formula return their value unchanged.
    fn evaluate_cell(&mut self, sheet: &str, address: &str) -> Result<CellValue>;

    /// Evaluate every formula cell of a sheet once, in row-major order
    ///
    /// Formula cells referenced by later formulas contribute their cached value, so a cell
    /// that depends on a formula further down the sheet sees the previous result.
    fn evaluate_sheet(
        &mut self,
        sheet: &str,
        options: &EvaluationOptions,
    ) -> Result<EvaluationStats>;
}

fn sheet_not_found(sheet: &str) -> Error {
    sheetcalc_core::Error::SheetNotFound(sheet.to_string()).into()
}

fn sheet_exists(workbook: &Workbook, sheet: &str) -> Result<()> {
    workbook
        .worksheet_by_name(sheet)
        .map(|_| ())
        .ok_or_else(|| sheet_not_found(sheet))
}

impl WorkbookFormulaExt for Workbook {
    fn evaluate_formula(&self, sheet: &str, formula: &str) -> Result<CompileResult> {
        self.evaluate_formula_at(sheet, "A1", formula, &EvaluationOptions::default())
    }

    fn evaluate_formula_at(
        &self,
        sheet: &str,
        address: &str,
        formula: &str,
        options: &EvaluationOptions,
    ) -> Result<CompileResult> {
        sheet_exists(self, sheet)?;
        let address = CellAddress::parse(address)?;
        let provider = WorkbookDataProvider::new(self);
        let parser = FormulaParser::with_provider(&provider)
            .with_configuration(options.configuration.clone());
        Ok(parser.parse_at(formula, sheet, address.row, address.col)?)
    }

    fn evaluate_cell(&mut self, sheet: &str, address: &str) -> Result<CellValue> {
        sheet_exists(self, sheet)?;
        let address = CellAddress::parse(address)?;
        let (has_formula, value) = {
            let provider = WorkbookDataProvider::new(self);
            let parser = FormulaParser::with_provider(&provider);
            let result = parser.parse_cell(sheet, address.row, address.col)?;
            let has_formula = self
                .worksheet_by_name(sheet)
                .and_then(|ws| ws.get_formula_at(address.row, address.col))
                .is_some();
            (has_formula, result.to_cell_value())
        };

        if has_formula {
            debug!(sheet, address = %address, value = %value, "caching formula result");
            self.worksheet_by_name_mut(sheet)
                .ok_or_else(|| sheet_not_found(sheet))?
                .set_formula_result(address.row, address.col, value.clone())?;
        }
        Ok(value)
    }

    fn evaluate_sheet(
        &mut self,
        sheet: &str,
        options: &EvaluationOptions,
    ) -> Result<EvaluationStats> {
        let cells: Vec<(u32, u16)> = self
            .worksheet_by_name(sheet)
            .ok_or_else(|| sheet_not_found(sheet))?
            .formula_cells()
            .map(|(row, col, _)| (row, col))
            .collect();

        let mut stats = EvaluationStats {
            formula_count: cells.len(),
            ..EvaluationStats::default()
        };
        for (row, col) in cells {
            let value = {
                let provider = WorkbookDataProvider::new(self);
                let parser = FormulaParser::with_provider(&provider)
                    .with_configuration(options.configuration.clone());
                match parser.parse_cell(sheet, row, col) {
                    Ok(result) => result.to_cell_value(),
                    Err(error) => {
                        let address = CellAddress::new(row, col);
                        warn!(sheet, address = %address, %error, "formula evaluation failed");
                        CellValue::Error(sheetcalc_core::CellError::Value)
                    }
                }
            };
            if value.is_error() {
                stats.errors += 1;
            }
            if let Some(ws) = self.worksheet_by_name_mut(sheet) {
                ws.set_formula_result(row, col, value)?;
                stats.cells_evaluated += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetcalc_formula::{ExcelError, FormulaError};

    fn workbook() -> Workbook {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 5.0).unwrap();
        sheet.set_cell_formula("A2", "=A1*2").unwrap();
        sheet.set_cell_formula("A3", "=A2+10").unwrap();
        sheet.set_cell_formula("A4", "=1/0").unwrap();
        workbook
    }

    #[test]
    fn test_evaluate_formula() {
        let workbook = workbook();
        assert_eq!(
            workbook.evaluate_formula("Sheet1", "=A1+1").unwrap(),
            CompileResult::integer(6.0)
        );
        assert_eq!(
            workbook
                .evaluate_formula_at("Sheet1", "C4", "ROW()", &EvaluationOptions::default())
                .unwrap(),
            CompileResult::integer(4.0)
        );
        assert!(matches!(
            workbook.evaluate_formula("Nope", "1"),
            Err(Error::Model(sheetcalc_core::Error::SheetNotFound(_)))
        ));
        assert!(matches!(
            workbook.evaluate_formula("Sheet1", "NOSUCH()"),
            Err(Error::Formula(FormulaError::UnknownFunction(_)))
        ));
    }

    #[test]
    fn test_evaluate_cell_caches_result() {
        let mut workbook = workbook();
        assert_eq!(
            workbook.evaluate_cell("Sheet1", "A2").unwrap(),
            CellValue::Number(10.0)
        );
        assert_eq!(
            workbook.worksheet(0).unwrap().get_calculated_value_at(1, 0),
            CellValue::Number(10.0)
        );
        // A3 reads the cached value of A2
        assert_eq!(
            workbook.evaluate_cell("Sheet1", "A3").unwrap(),
            CellValue::Number(20.0)
        );
        assert_eq!(workbook.evaluate_cell("Sheet1", "A1").unwrap(), CellValue::Number(5.0));
    }

    #[test]
    fn test_evaluate_sheet() {
        let mut workbook = workbook();
        let stats = workbook
            .evaluate_sheet("Sheet1", &EvaluationOptions::default())
            .unwrap();
        assert_eq!(
            stats,
            EvaluationStats {
                formula_count: 3,
                cells_evaluated: 3,
                errors: 1,
            }
        );
        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.get_calculated_value_at(2, 0), CellValue::Number(20.0));
        assert_eq!(
            sheet.get_calculated_value_at(3, 0),
            CellValue::Error(ExcelError::Div0.into())
        );
    }
}
