//! Values produced and consumed by the engine

use std::fmt;

use sheetcalc_core::{CellError, CellRange, CellValue};

use crate::datetime;

/// Spreadsheet error values
///
/// Errors are values: they flow through operators and functions like any other result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExcelError {
    /// #VALUE! - wrong type of argument or operand
    Value,
    /// #DIV/0! - division by zero
    Div0,
    /// #NUM! - invalid numeric value
    Num,
    /// #N/A - value not available
    NA,
    /// #REF! - invalid reference
    Ref,
    /// #NAME? - unrecognized name
    Name,
    /// #NULL! - empty intersection
    Null,
}

impl ExcelError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcelError::Value => "#VALUE!",
            ExcelError::Div0 => "#DIV/0!",
            ExcelError::Num => "#NUM!",
            ExcelError::NA => "#N/A",
            ExcelError::Ref => "#REF!",
            ExcelError::Name => "#NAME?",
            ExcelError::Null => "#NULL!",
        }
    }

    /// Parse an error literal (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        CellError::parse(s).map(Self::from)
    }

    /// All error literals, longest first (used when scanning formula text)
    pub const LITERALS: [&'static str; 7] = [
        "#DIV/0!", "#VALUE!", "#NAME?", "#NULL!", "#NUM!", "#REF!", "#N/A",
    ];
}

impl fmt::Display for ExcelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CellError> for ExcelError {
    fn from(error: CellError) -> Self {
        match error {
            CellError::Null => ExcelError::Null,
            CellError::Div0 => ExcelError::Div0,
            CellError::Value => ExcelError::Value,
            CellError::Ref => ExcelError::Ref,
            CellError::Name => ExcelError::Name,
            CellError::Num => ExcelError::Num,
            CellError::Na => ExcelError::NA,
        }
    }
}

impl From<ExcelError> for CellError {
    fn from(error: ExcelError) -> Self {
        match error {
            ExcelError::Null => CellError::Null,
            ExcelError::Div0 => CellError::Div0,
            ExcelError::Value => CellError::Value,
            ExcelError::Ref => CellError::Ref,
            ExcelError::Name => CellError::Name,
            ExcelError::Num => CellError::Num,
            ExcelError::NA => CellError::Na,
        }
    }
}

/// Type tag carried next to every result and argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Number,
    Integer,
    Decimal,
    Boolean,
    String,
    Date,
    Time,
    ExcelAddress,
    Enumerable,
    ExcelError,
    Empty,
}

impl DataType {
    /// Numeric tags (dates and times are serial numbers)
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Number
            | DataType::Integer
            | DataType::Decimal
            | DataType::Date
            | DataType::Time
        )
    }
}

/// A worksheet-qualified rectangle of cells
///
/// This is only an address; cells are read lazily through the data provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    /// Worksheet name; `None` means the sheet the formula is evaluated on
    pub worksheet: Option<String>,
    /// The rectangle
    pub range: CellRange,
}

impl RangeAddress {
    /// Create a range address
    pub fn new(worksheet: Option<String>, range: CellRange) -> Self {
        Self { worksheet, range }
    }

    /// Parse `A1`, `$A$1:B2`, `A:B`, `1:3`, `Sheet1!A1` or `'My Sheet'!A1:B2`
    ///
    /// # Examples
    /// ```
    /// use sheetcalc_formula::RangeAddress;
    ///
    /// let addr = RangeAddress::parse("'Q1 Data'!B2:C3").unwrap();
    /// assert_eq!(addr.worksheet.as_deref(), Some("Q1 Data"));
    /// assert_eq!(addr.range.cell_count(), 4);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (worksheet, reference) = match text.rfind('!') {
            Some(pos) => {
                let sheet = unquote_sheet_name(&text[..pos])?;
                (Some(sheet), &text[pos + 1..])
            }
            None => (None, text),
        };
        if reference.is_empty() || reference.contains('!') {
            return None;
        }
        let range = CellRange::parse(reference).ok()?;
        Some(Self { worksheet, range })
    }

    /// Fill in the worksheet if none is set
    pub fn with_default_worksheet(mut self, worksheet: &str) -> Self {
        if self.worksheet.is_none() {
            self.worksheet = Some(worksheet.to_string());
        }
        self
    }

    /// Worksheet name, or an empty string when unqualified
    pub fn worksheet_name(&self) -> &str {
        self.worksheet.as_deref().unwrap_or("")
    }

    /// Check if this addresses exactly one cell
    pub fn is_single_cell(&self) -> bool {
        self.range.is_single_cell()
    }

    /// Check if two addresses are on the same sheet (case-insensitive)
    pub fn same_worksheet(&self, other: &RangeAddress) -> bool {
        match (&self.worksheet, &other.worksheet) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.worksheet {
            write!(f, "{}!", quote_sheet_name(sheet))?;
        }
        write!(f, "{}", self.range)
    }
}

/// Quote a sheet name for use in a reference when it needs it
pub fn quote_sheet_name(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false)
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

fn unquote_sheet_name(text: &str) -> Option<String> {
    match text.strip_prefix('\'') {
        Some(rest) => {
            let inner = rest.strip_suffix('\'')?;
            Some(inner.replace("''", "'"))
        }
        None if text.is_empty() || text.contains('\'') => None,
        None => Some(text.to_string()),
    }
}

/// A value flowing through the engine
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value (empty cell, empty argument)
    #[default]
    Empty,
    Number(f64),
    Boolean(bool),
    String(String),
    Error(ExcelError),
    /// A reference, dereferenced lazily
    Range(RangeAddress),
    /// Inline array, outer vec is rows
    Array(Vec<Vec<Value>>),
}

impl Value {
    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the error if this is one
    pub fn error(&self) -> Option<ExcelError> {
        match self {
            Value::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Check if the value is empty or an empty string
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Strict numeric view: numbers only
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric coercion used by arithmetic
    ///
    /// Booleans are 1/0, empty is 0, text must parse as a number or a date.
    pub fn coerce_to_number(&self) -> Result<f64, ExcelError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Empty => Ok(0.0),
            Value::String(s) => parse_number_text(s).ok_or(ExcelError::Value),
            Value::Error(e) => Err(*e),
            Value::Range(_) | Value::Array(_) => Err(ExcelError::Value),
        }
    }

    /// Boolean coercion used by logical functions
    pub fn coerce_to_bool(&self) -> Result<bool, ExcelError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Empty => Ok(false),
            Value::String(s) => {
                if s.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(ExcelError::Value)
                }
            }
            Value::Error(e) => Err(*e),
            Value::Range(_) | Value::Array(_) => Err(ExcelError::Value),
        }
    }

    /// Invariant text form used by `&` and text functions
    pub fn to_text(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::String(s) => s.clone(),
            Value::Error(e) => e.to_string(),
            Value::Range(r) => r.to_string(),
            Value::Array(_) => ExcelError::Value.to_string(),
        }
    }

    /// Type tag for this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Empty => DataType::Empty,
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => DataType::Integer,
            Value::Number(_) => DataType::Decimal,
            Value::Boolean(_) => DataType::Boolean,
            Value::String(_) => DataType::String,
            Value::Error(_) => DataType::ExcelError,
            Value::Range(_) => DataType::ExcelAddress,
            Value::Array(_) => DataType::Enumerable,
        }
    }
}

impl From<&CellValue> for Value {
    fn from(value: &CellValue) -> Self {
        match value.effective_value() {
            CellValue::Empty | CellValue::Formula { .. } => Value::Empty,
            CellValue::Boolean(b) => Value::Boolean(*b),
            CellValue::Number(n) => Value::Number(*n),
            CellValue::String(s) => Value::String(s.as_str().to_string()),
            CellValue::Error(e) => Value::Error((*e).into()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<ExcelError> for Value {
    fn from(e: ExcelError) -> Self {
        Value::Error(e)
    }
}

/// Shortest round-trip text for a number, without a trailing `.0`
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse text as a number, falling back to a date/time
pub fn parse_number_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(percent) = trimmed.strip_suffix('%') {
        return percent.trim().parse::<f64>().ok().map(|n| n / 100.0);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(n),
        _ => datetime::parse_date_time(trimmed),
    }
}

/// The result of compiling an expression
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    pub value: Value,
    pub data_type: DataType,
}

impl CompileResult {
    /// Create a result with an explicit type tag
    pub fn new(value: Value, data_type: DataType) -> Self {
        Self { value, data_type }
    }

    /// The "no expressions" result
    pub fn empty() -> Self {
        Self::new(Value::Empty, DataType::Empty)
    }

    pub fn number(n: f64) -> Self {
        Self::new(Value::Number(n), DataType::Decimal)
    }

    pub fn integer(n: f64) -> Self {
        Self::new(Value::Number(n), DataType::Integer)
    }

    pub fn date(serial: f64) -> Self {
        Self::new(Value::Number(serial), DataType::Date)
    }

    pub fn time(serial: f64) -> Self {
        Self::new(Value::Number(serial), DataType::Time)
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        Self::new(Value::String(s.into()), DataType::String)
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(Value::Boolean(b), DataType::Boolean)
    }

    pub fn error(e: ExcelError) -> Self {
        Self::new(Value::Error(e), DataType::ExcelError)
    }

    pub fn range(address: RangeAddress) -> Self {
        Self::new(Value::Range(address), DataType::ExcelAddress)
    }

    /// An address rendered as text (the result of `ADDRESS`)
    pub fn address<S: Into<String>>(text: S) -> Self {
        Self::new(Value::String(text.into()), DataType::ExcelAddress)
    }

    pub fn array(rows: Vec<Vec<Value>>) -> Self {
        Self::new(Value::Array(rows), DataType::Enumerable)
    }

    /// Check if this is the empty result
    pub fn is_empty(&self) -> bool {
        matches!(self.value, Value::Empty)
    }

    /// Check if this is an error result
    pub fn is_error(&self) -> bool {
        self.value.is_error()
    }

    /// Get the error if this is one
    pub fn error_value(&self) -> Option<ExcelError> {
        self.value.error()
    }

    /// Numeric view of the result (numbers only)
    pub fn as_number(&self) -> Option<f64> {
        self.value.as_number()
    }

    /// Convert to a value that can be stored in a cell
    ///
    /// Ranges and arrays cannot be stored and become `#VALUE!`.
    pub fn to_cell_value(&self) -> CellValue {
        match &self.value {
            Value::Empty => CellValue::Empty,
            Value::Number(n) => CellValue::Number(*n),
            Value::Boolean(b) => CellValue::Boolean(*b),
            Value::String(s) => CellValue::string(s.as_str()),
            Value::Error(e) => CellValue::Error((*e).into()),
            Value::Range(_) | Value::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

impl From<Value> for CompileResult {
    fn from(value: Value) -> Self {
        let data_type = value.data_type();
        Self { value, data_type }
    }
}

impl fmt::Display for CompileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Array(rows) => {
                let rows: Vec<String> = rows
                    .iter()
                    .map(|row| row.iter().map(Value::to_text).collect::<Vec<_>>().join(","))
                    .collect();
                write!(f, "{{{}}}", rows.join(";"))
            }
            other => f.write_str(&other.to_text()),
        }
    }
}

/// A compiled argument handed to a function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionArgument {
    pub value: Value,
    pub data_type: DataType,
}

impl FunctionArgument {
    /// Create an argument, inferring the type tag from the value
    pub fn new<V: Into<Value>>(value: V) -> Self {
        CompileResult::from(value.into()).into()
    }

    /// The range address if this argument is a reference
    pub fn range(&self) -> Option<&RangeAddress> {
        match &self.value {
            Value::Range(r) => Some(r),
            _ => None,
        }
    }

    /// Check if this argument is a reference
    pub fn is_range(&self) -> bool {
        self.range().is_some()
    }
}

impl From<CompileResult> for FunctionArgument {
    fn from(result: CompileResult) -> Self {
        Self {
            value: result.value,
            data_type: result.data_type,
        }
    }
}
