//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Rows and columns are 0-based internally and 1-based/lettered in A1 notation.
/// The `$` markers only matter for display; they never change which cell is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based, A=0, XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self::with_absolute(row, col, false, false)
    }

    /// Create a new cell address with specified absolute/relative flags
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Create an absolute cell address ($A$1 style)
    pub fn absolute(row: u32, col: u16) -> Self {
        Self::with_absolute(row, col, true, true)
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use sheetcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!((addr.row, addr.col), (1, 1));
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (col_part, row_part) = split_reference(s);

        let col_absolute = col_part.starts_with('$');
        let letters = col_part.trim_start_matches('$');
        if letters.is_empty() {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }
        let col = Self::letters_to_column(letters)?;

        let row_absolute = row_part.starts_with('$');
        let row = parse_row_number(row_part.trim_start_matches('$'), s)?;

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            result.insert(0, ((n % 26) as u8 + b'A') as char);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() || letters.len() > 3 {
            return Err(Error::InvalidAddress(format!(
                "invalid column letters '{}'",
                letters
            )));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }

        let col = col - 1;
        if col >= MAX_COLS as u32 {
            return Err(Error::ColumnOutOfBounds(col as u16, MAX_COLS - 1));
        }

        Ok(col as u16)
    }

    /// Move this address by a signed number of rows and columns
    ///
    /// Returns `None` when the result would leave the sheet.
    pub fn offset(&self, rows: i64, cols: i64) -> Option<Self> {
        let row = self.row as i64 + rows;
        let col = self.col as i64 + cols;
        if !(0..MAX_ROWS as i64).contains(&row) || !(0..MAX_COLS as i64).contains(&col) {
            return None;
        }
        Some(Self::with_absolute(
            row as u32,
            col as u16,
            self.row_absolute,
            self.col_absolute,
        ))
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        format!(
            "{}{}{}{}",
            if self.col_absolute { "$" } else { "" },
            Self::column_to_letters(self.col),
            if self.row_absolute { "$" } else { "" },
            self.row + 1
        )
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split "$AB$12" into ("$AB", "$12")
fn split_reference(s: &str) -> (&str, &str) {
    let bytes = s.as_bytes();
    let mut pos = 0;
    if bytes.first() == Some(&b'$') {
        pos += 1;
    }
    while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
        pos += 1;
    }
    s.split_at(pos)
}

fn parse_row_number(digits: &str, source: &str) -> Result<u32> {
    if digits.is_empty() {
        return Err(Error::InvalidAddress(format!(
            "no row number in '{}'",
            source
        )));
    }
    let row: u32 = digits
        .parse()
        .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", source)))?;
    if row == 0 {
        return Err(Error::InvalidAddress(format!(
            "row number must be >= 1 in '{}'",
            source
        )));
    }
    if row > MAX_ROWS {
        return Err(Error::RowOutOfBounds(row - 1, MAX_ROWS - 1));
    }
    Ok(row - 1)
}

/// A rectangle of cells (e.g., "A1:B10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range, normalizing so that `start` is the top-left corner
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (start_row, end_row) = (start.row.min(end.row), start.row.max(end.row));
        let (start_col, end_col) = (start.col.min(end.col), start.col.max(end.col));

        Self {
            start: CellAddress::with_absolute(
                start_row,
                start_col,
                start.row_absolute,
                start.col_absolute,
            ),
            end: CellAddress::with_absolute(end_row, end_col, end.row_absolute, end.col_absolute),
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1 notation
    ///
    /// Accepts single cells ("C3"), rectangles ("A1:B10"), whole columns ("A:C", which
    /// expands to rows 1..=1048576) and whole rows ("2:4", which expands to columns A..=XFD).
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((left, right)) = s.split_once(':') else {
            return Ok(Self::single(CellAddress::parse(s)?));
        };

        if let (Some(first), Some(last)) = (parse_whole_column(left), parse_whole_column(right)) {
            let first = first?;
            let last = last?;
            return Ok(Self::new(
                CellAddress::with_absolute(0, first.0, false, first.1),
                CellAddress::with_absolute(MAX_ROWS - 1, last.0, false, last.1),
            ));
        }

        if let (Some(first), Some(last)) = (parse_whole_row(left), parse_whole_row(right)) {
            let first = first?;
            let last = last?;
            return Ok(Self::new(
                CellAddress::with_absolute(first.0, 0, first.1, false),
                CellAddress::with_absolute(last.0, MAX_COLS - 1, last.1, false),
            ));
        }

        let start = CellAddress::parse(left)
            .map_err(|_| Error::InvalidRange(format!("invalid start of range '{}'", s)))?;
        let end = CellAddress::parse(right)
            .map_err(|_| Error::InvalidRange(format!("invalid end of range '{}'", s)))?;
        Ok(Self::new(start, end))
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.contains_cell(addr.row, addr.col)
    }

    /// Check if a row/column position is within this range
    pub fn contains_cell(&self, row: u32, col: u16) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Whether the range covers a single cell
    pub fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Whether the range spans every row of its columns
    pub fn is_whole_column(&self) -> bool {
        self.start.row == 0 && self.end.row == MAX_ROWS - 1
    }

    /// Whether the range spans every column of its rows
    pub fn is_whole_row(&self) -> bool {
        self.start.col == 0 && self.end.col == MAX_COLS - 1
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Get the intersection of two ranges, if any
    pub fn intersect(&self, other: &CellRange) -> Option<CellRange> {
        if !self.overlaps(other) {
            return None;
        }

        Some(CellRange::from_indices(
            self.start.row.max(other.start.row),
            self.start.col.max(other.start.col),
            self.end.row.min(other.end.row),
            self.end.col.min(other.end.col),
        ))
    }

    /// Smallest range covering both ranges
    pub fn bounding(&self, other: &CellRange) -> CellRange {
        CellRange::from_indices(
            self.start.row.min(other.start.row),
            self.start.col.min(other.start.col),
            self.end.row.max(other.end.row),
            self.end.col.max(other.end.col),
        )
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
            done: false,
        }
    }

    /// Format as A1 notation, collapsing whole rows/columns ("A:B", "2:3")
    pub fn to_a1_string(&self) -> String {
        if self.is_whole_column() && !self.is_whole_row() {
            return format!(
                "{}:{}",
                CellAddress::column_to_letters(self.start.col),
                CellAddress::column_to_letters(self.end.col)
            );
        }
        if self.is_whole_row() && !self.is_whole_column() {
            return format!("{}:{}", self.start.row + 1, self.end.row + 1);
        }
        if self.is_single_cell() {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

/// "$A" -> (0, true); None when the text is not a bare column
fn parse_whole_column(s: &str) -> Option<Result<(u16, bool)>> {
    let absolute = s.starts_with('$');
    let letters = s.trim_start_matches('$');
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(CellAddress::letters_to_column(letters).map(|col| (col, absolute)))
}

/// "$3" -> (2, true); None when the text is not a bare row number
fn parse_whole_row(s: &str) -> Option<Result<(u32, bool)>> {
    let absolute = s.starts_with('$');
    let digits = s.trim_start_matches('$');
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(parse_row_number(digits, s).map(|row| (row, absolute)))
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Row-major iterator over the addresses of a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
    done: bool,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);

        if self.current_col < self.range.end.col {
            self.current_col += 1;
        } else if self.current_row < self.range.end.row {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.done = true;
        }

        Some(addr)
    }
}
