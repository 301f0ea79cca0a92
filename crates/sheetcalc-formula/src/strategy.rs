//! Compile strategies
//!
//! Pure functions combining two compiled operands with one operator. Range operands must have
//! been dereferenced by the compiler before reaching anything but the range strategy.

use std::cmp::Ordering;

use crate::expression::Operator;
use crate::value::{CompileResult, DataType, ExcelError, Value};

/// Strategy families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorCategory {
    Arithmetic,
    Comparison,
    Concatenation,
    Range,
}

/// Combine `left op right` into one result
pub fn combine(left: &CompileResult, op: Operator, right: &CompileResult) -> CompileResult {
    match op.category() {
        OperatorCategory::Arithmetic => arithmetic(left, op, right),
        OperatorCategory::Comparison => comparison(left, op, right),
        OperatorCategory::Concatenation => concatenation(left, right),
        OperatorCategory::Range => range(left, op, right),
    }
}

fn first_error(left: &CompileResult, right: &CompileResult) -> Option<CompileResult> {
    left.error_value()
        .or_else(|| right.error_value())
        .map(CompileResult::error)
}

fn arithmetic(left: &CompileResult, op: Operator, right: &CompileResult) -> CompileResult {
    if let Some(error) = first_error(left, right) {
        return error;
    }
    let (l, r) = match (left.value.coerce_to_number(), right.value.coerce_to_number()) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => return CompileResult::error(e),
    };

    let value = match op {
        Operator::Plus => l + r,
        Operator::Minus => l - r,
        Operator::Multiply => l * r,
        Operator::Divide if r == 0.0 => return CompileResult::error(ExcelError::Div0),
        Operator::Divide => l / r,
        Operator::Exponent if l == 0.0 && r < 0.0 => return CompileResult::error(ExcelError::Div0),
        Operator::Exponent => l.powf(r),
        _ => return CompileResult::error(ExcelError::Value),
    };
    if !value.is_finite() {
        return CompileResult::error(ExcelError::Num);
    }

    let integer_operands =
        left.data_type == DataType::Integer && right.data_type == DataType::Integer;
    let integer_op = matches!(op, Operator::Plus | Operator::Minus | Operator::Multiply);
    if integer_operands && integer_op {
        CompileResult::integer(value)
    } else {
        CompileResult::number(value)
    }
}

fn comparison(left: &CompileResult, op: Operator, right: &CompileResult) -> CompileResult {
    if let Some(error) = first_error(left, right) {
        return error;
    }
    if matches!(left.value, Value::Array(_)) || matches!(right.value, Value::Array(_)) {
        return CompileResult::error(ExcelError::Value);
    }
    let ordering = compare_values(&left.value, &right.value);
    let result = match op {
        Operator::Equals => ordering == Ordering::Equal,
        Operator::NotEqualTo => ordering != Ordering::Equal,
        Operator::LessThan => ordering == Ordering::Less,
        Operator::LessThanOrEqual => ordering != Ordering::Greater,
        Operator::GreaterThan => ordering == Ordering::Greater,
        Operator::GreaterThanOrEqual => ordering != Ordering::Less,
        _ => return CompileResult::error(ExcelError::Value),
    };
    CompileResult::boolean(result)
}

/// Spreadsheet ordering of two values
///
/// Numbers compare numerically and strings case-insensitively. Across types the order is
/// number < string < boolean, as in Excel: numeric text is never coerced, so `100>"1"` is
/// FALSE and `"1"=1` is FALSE. Empty acts as 0, "" or FALSE depending on the other side.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    let (left, right) = (empty_as(left, right), empty_as(right, left));

    match (&left, &right) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        (Value::String(l), Value::String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Value::Boolean(l), Value::Boolean(r)) => l.cmp(r),
        (Value::Empty, Value::Empty) => Ordering::Equal,
        _ => type_rank(&left).cmp(&type_rank(&right)),
    }
}

fn empty_as(value: &Value, other: &Value) -> Value {
    match (value, other) {
        (Value::Empty, Value::Number(_)) => Value::Number(0.0),
        (Value::Empty, Value::String(_)) => Value::String(String::new()),
        (Value::Empty, Value::Boolean(_)) => Value::Boolean(false),
        _ => value.clone(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Empty => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Boolean(_) => 3,
        Value::Error(_) => 4,
        Value::Range(_) | Value::Array(_) => 5,
    }
}

fn concatenation(left: &CompileResult, right: &CompileResult) -> CompileResult {
    if let Some(error) = first_error(left, right) {
        return error;
    }
    if matches!(left.value, Value::Array(_)) || matches!(right.value, Value::Array(_)) {
        return CompileResult::error(ExcelError::Value);
    }
    CompileResult::string(format!("{}{}", left.value.to_text(), right.value.to_text()))
}

fn range(left: &CompileResult, op: Operator, right: &CompileResult) -> CompileResult {
    if let Some(error) = first_error(left, right) {
        return error;
    }
    let (Value::Range(l), Value::Range(r)) = (&left.value, &right.value) else {
        return CompileResult::error(ExcelError::Value);
    };
    if !l.same_worksheet(r) {
        return CompileResult::error(ExcelError::Value);
    }
    match op {
        Operator::Range => {
            let mut address = l.clone();
            address.range = l.range.bounding(&r.range);
            CompileResult::range(address)
        }
        Operator::Intersect => match l.range.intersect(&r.range) {
            Some(overlap) => {
                let mut address = l.clone();
                address.range = overlap;
                CompileResult::range(address)
            }
            None => CompileResult::error(ExcelError::Null),
        },
        _ => CompileResult::error(ExcelError::Value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RangeAddress;

    fn int(n: f64) -> CompileResult {
        CompileResult::integer(n)
    }

    fn range_result(text: &str) -> CompileResult {
        CompileResult::range(RangeAddress::parse(text).unwrap())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(combine(&int(2.0), Operator::Plus, &int(3.0)), int(5.0));
        assert_eq!(
            combine(&int(7.0), Operator::Divide, &int(2.0)),
            CompileResult::number(3.5)
        );
        assert_eq!(
            combine(&CompileResult::string("4"), Operator::Multiply, &int(2.0)).value,
            Value::Number(8.0)
        );
        assert_eq!(
            combine(&CompileResult::boolean(true), Operator::Plus, &CompileResult::empty()).value,
            Value::Number(1.0)
        );
        assert_eq!(
            combine(&int(2.0), Operator::Exponent, &int(3.0)),
            CompileResult::number(8.0)
        );
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(
            combine(&int(1.0), Operator::Divide, &int(0.0)),
            CompileResult::error(ExcelError::Div0)
        );
        assert_eq!(
            combine(&CompileResult::string("abc"), Operator::Plus, &int(1.0)),
            CompileResult::error(ExcelError::Value)
        );
        assert_eq!(
            combine(&CompileResult::number(-8.0), Operator::Exponent, &CompileResult::number(0.5)),
            CompileResult::error(ExcelError::Num)
        );
        assert_eq!(
            combine(
                &CompileResult::error(ExcelError::NA),
                Operator::Plus,
                &CompileResult::error(ExcelError::Ref)
            ),
            CompileResult::error(ExcelError::NA)
        );
        assert_eq!(
            combine(&int(1.0), Operator::Plus, &CompileResult::error(ExcelError::Ref)),
            CompileResult::error(ExcelError::Ref)
        );
    }

    #[test]
    fn test_comparison() {
        let t = CompileResult::boolean(true);
        let f = CompileResult::boolean(false);
        assert_eq!(combine(&int(1.0), Operator::LessThan, &int(2.0)), t);
        assert_eq!(
            combine(&CompileResult::string("abc"), Operator::Equals, &CompileResult::string("ABC")),
            t
        );
        // numeric text ranks as text, above every number
        assert_eq!(
            combine(&int(100.0), Operator::GreaterThan, &CompileResult::string("1")),
            f
        );
        assert_eq!(combine(&CompileResult::string("1"), Operator::Equals, &int(1.0)), f);
        assert_eq!(combine(&int(1.0), Operator::LessThan, &CompileResult::string("0")), t);
        assert_eq!(
            combine(&CompileResult::string("1"), Operator::NotEqualTo, &int(1.0)),
            t
        );
        assert_eq!(combine(&CompileResult::empty(), Operator::Equals, &int(0.0)), t);
        assert_eq!(
            combine(&CompileResult::empty(), Operator::Equals, &CompileResult::string("")),
            t
        );
        assert_eq!(combine(&t, Operator::GreaterThan, &f), t);
        assert_eq!(combine(&t, Operator::GreaterThan, &CompileResult::string("z")), t);
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(
            combine(&CompileResult::string("a"), Operator::Concat, &CompileResult::number(1.5)),
            CompileResult::string("a1.5")
        );
        assert_eq!(
            combine(&CompileResult::boolean(true), Operator::Concat, &CompileResult::empty()),
            CompileResult::string("TRUE")
        );
    }

    #[test]
    fn test_range_operators() {
        assert_eq!(
            combine(&range_result("S!A1"), Operator::Range, &range_result("S!C3")),
            range_result("S!A1:C3")
        );
        assert_eq!(
            combine(&range_result("S!A1:B2"), Operator::Intersect, &range_result("S!B2:C3")),
            range_result("S!B2")
        );
        assert_eq!(
            combine(&range_result("S!A1"), Operator::Intersect, &range_result("S!C3")),
            CompileResult::error(ExcelError::Null)
        );
        assert_eq!(
            combine(&range_result("S!A1"), Operator::Range, &range_result("T!C3")),
            CompileResult::error(ExcelError::Value)
        );
        assert_eq!(
            combine(&int(1.0), Operator::Range, &range_result("S!C3")),
            CompileResult::error(ExcelError::Value)
        );
    }
}
