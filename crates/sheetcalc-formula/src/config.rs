//! Parser configuration

use chrono::Weekday;

/// Default maximum nesting of groups, arguments, names and function calls
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Settings shared by one parser and everything it compiles
#[derive(Debug, Clone, PartialEq)]
pub struct ParsingConfiguration {
    /// Nesting beyond this depth fails with `FormulaError::TooComplex`
    pub max_nesting_depth: usize,
    /// Separator between function arguments (and array columns)
    pub argument_separator: char,
    /// Non-working days used by WORKDAY and NETWORKDAYS
    pub weekend: Vec<Weekday>,
}

impl Default for ParsingConfiguration {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            argument_separator: ',',
            weekend: vec![Weekday::Sat, Weekday::Sun],
        }
    }
}

impl ParsingConfiguration {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Set the argument separator (`;` is reserved for array rows and is ignored)
    pub fn with_argument_separator(mut self, separator: char) -> Self {
        if separator != ';' {
            self.argument_separator = separator;
        }
        self
    }

    /// Set the weekend days
    pub fn with_weekend(mut self, weekend: Vec<Weekday>) -> Self {
        self.weekend = weekend;
        self
    }

    /// Check if a weekday is a weekend day
    pub fn is_weekend(&self, day: Weekday) -> bool {
        self.weekend.contains(&day)
    }
}
