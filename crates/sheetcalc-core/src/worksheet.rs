//! Worksheet type

use crate::cell::{CellAddress, CellData, CellRange, CellStorage, CellValue};
use crate::error::{Error, Result};
use crate::number_format::NumberFormat;
use crate::{MAX_COLS, MAX_ROWS};

/// A worksheet (single sheet in a workbook)
#[derive(Debug)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Cell storage
    cells: CellStorage,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
        }
    }

    /// Get the worksheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the worksheet name (called by [`crate::Workbook::rename_worksheet`])
    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Get cell data by address string
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell_at(addr.row, addr.col))
    }

    /// Get cell data by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Get a cell value by address string
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get a cell value by row and column indices
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    /// Get the number format of a cell (None = General)
    pub fn number_format_at(&self, row: u32, col: u16) -> Option<&NumberFormat> {
        self.cells.get(row, col).and_then(|c| c.number_format.as_ref())
    }

    // === Cell Modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        self.validate_cell_position(row, col)?;
        self.cells.set_value(row, col, value.into());
        Ok(())
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by row and column indices
    ///
    /// The stored text always starts with `=`.
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        self.validate_cell_position(row, col)?;

        let formula = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };

        self.cells.set_value(row, col, CellValue::formula(formula));
        Ok(())
    }

    /// Set a cell's number format by address string
    pub fn set_number_format(&mut self, address: &str, format: NumberFormat) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_number_format_at(addr.row, addr.col, format)
    }

    /// Set a cell's number format by row and column indices
    pub fn set_number_format_at(&mut self, row: u32, col: u16, format: NumberFormat) -> Result<()> {
        self.validate_cell_position(row, col)?;
        let format = match format {
            NumberFormat::General => None,
            other => Some(other),
        };
        self.cells.set_number_format(row, col, format);
        Ok(())
    }

    // === Range Operations ===

    /// Get the used range (bounds of all non-empty cells)
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .used_bounds()
            .map(|(min_row, min_col, max_row, max_col)| {
                CellRange::from_indices(min_row, min_col, max_row, max_col)
            })
    }

    /// Lazily iterate over the stored cells of a range in row-major order
    pub fn cells_in_range(
        &self,
        range: CellRange,
    ) -> impl Iterator<Item = (u32, u16, &CellData)> + '_ {
        self.cells.iter_range(range)
    }

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // === Rows ===

    /// Check if a row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.cells.is_row_hidden(row)
    }

    /// Set row hidden state
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        self.cells.set_row_hidden(row, hidden);
    }

    // === Merged Cells ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        self.cells.merged_regions()
    }

    /// Merge cells
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        if self
            .cells
            .merged_regions()
            .iter()
            .any(|existing| range.overlaps(existing))
        {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.cells.add_merged_region(*range);
        Ok(())
    }

    /// Unmerge cells, returning whether the region existed
    pub fn unmerge_cells(&mut self, range: &CellRange) -> bool {
        let found = self
            .cells
            .merged_regions()
            .iter()
            .position(|existing| existing == range);

        match found {
            Some(i) => self.cells.remove_merged_region(i).is_some(),
            None => false,
        }
    }

    /// Check if a cell belongs to a merged region
    pub fn is_merged(&self, row: u32, col: u16) -> bool {
        self.cells.is_merged(row, col)
    }

    /// Get the merged region containing a cell
    pub fn merged_region_at(&self, row: u32, col: u16) -> Option<&CellRange> {
        self.cells.merged_region_at(row, col)
    }

    // === Formula calculation support ===

    /// Iterate over all formula cells: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells
            .iter_range(CellRange::from_indices(0, 0, u32::MAX, u16::MAX))
            .filter_map(|(row, col, cell)| cell.value.formula_text().map(|t| (row, col, t)))
    }

    /// Get the formula text at a cell position (if it's a formula)
    pub fn get_formula_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cells
            .get(row, col)
            .and_then(|cell| cell.value.formula_text())
    }

    /// Set the cached result value of a formula cell
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        let address = CellAddress::new(row, col).to_a1_string();
        let cell = self
            .cells
            .get_mut(row, col)
            .ok_or_else(|| Error::NotAFormula(address.clone()))?;

        match &mut cell.value {
            CellValue::Formula { cached_value, .. } => {
                *cached_value = Some(Box::new(value));
                Ok(())
            }
            _ => Err(Error::NotAFormula(address)),
        }
    }

    /// Get the cached value of a formula cell, or the cell value directly if not a formula
    pub fn get_calculated_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(row, col)
            .map(|cell| cell.value.effective_value().clone())
            .unwrap_or(CellValue::Empty)
    }

    fn validate_cell_position(&self, row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }
}
