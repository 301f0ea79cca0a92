//! Criteria matching for SUMIF, COUNTIF, AVERAGEIF and related functions
//!
//! Criteria can be:
//! - A number: exact match (e.g., 5)
//! - A text string: case-insensitive match (e.g., "apple")
//! - A comparison expression: ">5", ">=10", "<100", "<=50", "<>0", "=5", ">b"
//! - Wildcards: "*" matches any characters, "?" matches single character
//! - Empty string: matches empty cells

use crate::value::{parse_number_text, Value};

const TOLERANCE: f64 = 1e-10;

/// Criteria matcher for SUMIF/COUNTIF/AVERAGEIF and related functions
#[derive(Debug, Clone)]
pub struct CriteriaMatcher {
    criteria_type: CriteriaType,
}

#[derive(Debug, Clone)]
enum CriteriaType {
    /// Exact number match
    Number(f64),
    /// Comparison with a number
    Comparison(ComparisonOp, f64),
    /// Comparison with text (lowercase)
    TextComparison(ComparisonOp, String),
    /// Text match (lowercase, with wildcards)
    Text(String),
    /// Match empty values
    Empty,
    /// Matches nothing
    Never,
}

#[derive(Debug, Clone, Copy)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            ComparisonOp::Equal => ordering == Equal,
            ComparisonOp::NotEqual => ordering != Equal,
            ComparisonOp::LessThan => ordering == Less,
            ComparisonOp::LessEqual => ordering != Greater,
            ComparisonOp::GreaterThan => ordering == Greater,
            ComparisonOp::GreaterEqual => ordering != Less,
        }
    }
}

impl CriteriaMatcher {
    /// Create a matcher from an already dereferenced criteria value
    pub fn new(criteria: &Value) -> Self {
        let criteria_type = match criteria {
            Value::Number(n) => CriteriaType::Number(*n),
            Value::Boolean(b) => CriteriaType::Number(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => Self::parse_string_criteria(s),
            Value::Empty => CriteriaType::Empty,
            Value::Error(_) | Value::Range(_) | Value::Array(_) => CriteriaType::Never,
        };

        Self { criteria_type }
    }

    fn parse_string_criteria(s: &str) -> CriteriaType {
        let s = s.trim();

        if s.is_empty() {
            return CriteriaType::Empty;
        }

        if let Some(ct) = Self::try_parse_comparison(s) {
            return ct;
        }

        if let Some(n) = parse_number_text(s) {
            return CriteriaType::Number(n);
        }

        CriteriaType::Text(s.to_lowercase())
    }

    fn try_parse_comparison(s: &str) -> Option<CriteriaType> {
        // Longer operators first
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            return None;
        };

        let rest = rest.trim();
        if let Some(n) = parse_number_text(rest) {
            return Some(CriteriaType::Comparison(op, n));
        }
        match op {
            ComparisonOp::Equal if rest.is_empty() => Some(CriteriaType::Empty),
            ComparisonOp::Equal => Some(CriteriaType::Text(rest.to_lowercase())),
            _ => Some(CriteriaType::TextComparison(op, rest.to_lowercase())),
        }
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &Value) -> bool {
        match &self.criteria_type {
            CriteriaType::Number(criteria_num) => {
                Self::numeric_candidate(value).is_some_and(|n| (n - criteria_num).abs() < TOLERANCE)
            }

            CriteriaType::Comparison(op, criteria_num) => match Self::numeric_candidate(value) {
                Some(n) if (n - criteria_num).abs() < TOLERANCE => {
                    op.holds(std::cmp::Ordering::Equal)
                }
                Some(n) => op.holds(n.total_cmp(criteria_num)),
                // "<>5" matches every non-numeric value
                None => matches!(op, ComparisonOp::NotEqual),
            },

            CriteriaType::TextComparison(op, criteria_text) => match value {
                Value::String(s) => op.holds(s.to_lowercase().as_str().cmp(criteria_text.as_str())),
                _ => matches!(op, ComparisonOp::NotEqual),
            },

            CriteriaType::Text(pattern) => match value {
                Value::String(s) => Self::wildcard_match(pattern, &s.to_lowercase()),
                Value::Boolean(_) => Self::wildcard_match(pattern, &value.to_text().to_lowercase()),
                _ => false,
            },

            CriteriaType::Empty => value.is_blank(),

            CriteriaType::Never => false,
        }
    }

    /// Numbers, booleans and numeric text are compared numerically
    fn numeric_candidate(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Match with wildcards: * = any characters, ? = single character
    fn wildcard_match(pattern: &str, text: &str) -> bool {
        if !pattern.contains('*') && !pattern.contains('?') {
            return pattern == text;
        }

        let pattern_chars: Vec<char> = pattern.chars().collect();
        let text_chars: Vec<char> = text.chars().collect();

        Self::wildcard_match_impl(&pattern_chars, &text_chars)
    }

    fn wildcard_match_impl(pattern: &[char], text: &[char]) -> bool {
        let mut pi = 0;
        let mut ti = 0;
        let mut star_pi = None;
        let mut star_ti = 0;

        while ti < text.len() {
            if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
                pi += 1;
                ti += 1;
            } else if pi < pattern.len() && pattern[pi] == '*' {
                // Try matching * with empty string first
                star_pi = Some(pi);
                star_ti = ti;
                pi += 1;
            } else if let Some(sp) = star_pi {
                pi = sp + 1;
                star_ti += 1;
                ti = star_ti;
            } else {
                return false;
            }
        }

        while pi < pattern.len() && pattern[pi] == '*' {
            pi += 1;
        }

        pi == pattern.len()
    }
}

/// Case-insensitive match of text against a pattern with `*` and `?` wildcards
pub fn wildcard_matches(pattern: &str, text: &str) -> bool {
    CriteriaMatcher::wildcard_match(&pattern.to_lowercase(), &text.to_lowercase())
}
