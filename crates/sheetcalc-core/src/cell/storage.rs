//! Cell storage implementation
//!
//! Sparse row-based storage: only non-empty cells are kept, in a
//! `BTreeMap<row, BTreeMap<col, CellData>>` so that iteration is row-major.
//! Hidden rows and merged cells are indexed in hash sets for O(1) lookups.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};

use super::{CellRange, CellValue};
use crate::number_format::NumberFormat;

/// Complete data for a single cell
#[derive(Debug, Clone, Default)]
pub struct CellData {
    /// The cell's value
    pub value: CellValue,
    /// Number format applied to the cell (None = General)
    pub number_format: Option<NumberFormat>,
}

impl CellData {
    /// Create a new cell with a value and the General format
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            number_format: None,
        }
    }

    /// Check if this cell carries neither a value nor a format
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.number_format.is_none()
    }
}

/// Sparse row-based storage for worksheet cells
#[derive(Debug, Default)]
pub struct CellStorage {
    /// Row index → column map
    rows: BTreeMap<u32, BTreeMap<u16, CellData>>,

    /// Hidden rows
    hidden_rows: AHashSet<u32>,

    /// Merged cell regions
    merged_regions: Vec<CellRange>,

    /// (row, col) → index into `merged_regions`
    merged_index: AHashMap<(u32, u16), usize>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&CellData> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Store a cell, dropping it if it is empty
    pub fn set(&mut self, row: u32, col: u16, data: CellData) {
        if data.is_empty() {
            self.remove(row, col);
            return;
        }
        self.rows.entry(row).or_default().insert(col, data);
    }

    /// Set a cell's value, keeping its format
    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        let mut data = self.remove(row, col).unwrap_or_default();
        data.value = value;
        self.set(row, col, data);
    }

    /// Set a cell's number format, keeping its value
    pub fn set_number_format(&mut self, row: u32, col: u16, format: Option<NumberFormat>) {
        let mut data = self.remove(row, col).unwrap_or_default();
        data.number_format = format;
        self.set(row, col, data);
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        let row_map = self.rows.get_mut(&row)?;
        let removed = row_map.remove(&col);
        if row_map.is_empty() {
            self.rows.remove(&row);
        }
        removed
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if the storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the used bounds (min_row, min_col, max_row, max_col)
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;
        let mut min_col = u16::MAX;
        let mut max_col = 0;
        for cols in self.rows.values() {
            if let (Some(first), Some(last)) = (cols.keys().next(), cols.keys().next_back()) {
                min_col = min_col.min(*first);
                max_col = max_col.max(*last);
            }
        }
        Some((min_row, min_col, max_row, max_col))
    }

    /// Lazily iterate over the stored cells inside a rectangle, row-major
    ///
    /// Only rows and columns that hold data are visited, so whole-column ranges are cheap.
    pub fn iter_range(&self, range: CellRange) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .range(range.start.row..=range.end.row)
            .flat_map(move |(&row, cols)| {
                cols.range(range.start.col..=range.end.col)
                    .map(move |(&col, data)| (row, col, data))
            })
    }

    /// Check if row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.hidden_rows.contains(&row)
    }

    /// Set row hidden state
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        if hidden {
            self.hidden_rows.insert(row);
        } else {
            self.hidden_rows.remove(&row);
        }
    }

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    /// Add a merged region
    pub fn add_merged_region(&mut self, range: CellRange) {
        let index = self.merged_regions.len();
        for addr in range.cells() {
            self.merged_index.insert((addr.row, addr.col), index);
        }
        self.merged_regions.push(range);
    }

    /// Remove a merged region by index
    pub fn remove_merged_region(&mut self, index: usize) -> Option<CellRange> {
        if index >= self.merged_regions.len() {
            return None;
        }
        let removed = self.merged_regions.remove(index);
        self.rebuild_merged_index();
        Some(removed)
    }

    /// Get the merged region containing a cell
    pub fn merged_region_at(&self, row: u32, col: u16) -> Option<&CellRange> {
        self.merged_index
            .get(&(row, col))
            .and_then(|&i| self.merged_regions.get(i))
    }

    /// Check if a cell is part of a merged region
    pub fn is_merged(&self, row: u32, col: u16) -> bool {
        self.merged_index.contains_key(&(row, col))
    }

    fn rebuild_merged_index(&mut self) {
        self.merged_index.clear();
        for (index, range) in self.merged_regions.iter().enumerate() {
            for addr in range.cells() {
                self.merged_index.insert((addr.row, addr.col), index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_remove() {
        let mut storage = CellStorage::new();
        storage.set_value(0, 0, CellValue::Number(1.0));
        storage.set_value(3, 2, CellValue::string("x"));
        assert_eq!(storage.cell_count(), 2);
        assert_eq!(storage.used_bounds(), Some((0, 0, 3, 2)));

        // Setting an empty value drops the cell
        storage.set_value(0, 0, CellValue::Empty);
        assert_eq!(storage.cell_count(), 1);
        assert!(storage.get(0, 0).is_none());
    }

    #[test]
    fn test_iter_range_is_row_major_and_sparse() {
        let mut storage = CellStorage::new();
        storage.set_value(1, 1, CellValue::Number(4.0));
        storage.set_value(0, 1, CellValue::Number(2.0));
        storage.set_value(0, 0, CellValue::Number(1.0));
        storage.set_value(9, 9, CellValue::Number(99.0));

        let visited: Vec<(u32, u16)> = storage
            .iter_range(CellRange::from_indices(0, 0, 5, 5))
            .map(|(r, c, _)| (r, c))
            .collect();
        assert_eq!(visited, vec![(0, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_hidden_rows_and_merges() {
        let mut storage = CellStorage::new();
        storage.set_row_hidden(4, true);
        assert!(storage.is_row_hidden(4));
        storage.set_row_hidden(4, false);
        assert!(!storage.is_row_hidden(4));

        storage.add_merged_region(CellRange::from_indices(0, 0, 1, 1));
        storage.add_merged_region(CellRange::from_indices(5, 5, 5, 6));
        assert!(storage.is_merged(1, 1));
        assert!(!storage.is_merged(2, 2));
        assert_eq!(storage.merged_region_at(5, 6).unwrap().to_string(), "F6:G6");

        storage.remove_merged_region(0);
        assert!(!storage.is_merged(0, 0));
        assert!(storage.is_merged(5, 5));
    }
}
