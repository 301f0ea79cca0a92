//! Property tests for the tokenizer and the compiler

use proptest::prelude::*;
use sheetcalc_formula::{CompileResult, FormulaParser, Tokenizer, Value};

const CASES: u32 = 128;

fn eval(formula: &str) -> CompileResult {
    FormulaParser::new().parse(formula).unwrap()
}

/// Nested arithmetic over small integers, paired with its expected value
fn arb_expression() -> impl Strategy<Value = (String, f64)> {
    let leaf = (0i64..6).prop_map(|n| (n.to_string(), n as f64));
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|((a, x), (b, y))| (format!("({a}+{b})"), x + y)),
            (inner.clone(), inner.clone())
                .prop_map(|((a, x), (b, y))| (format!("({a}*{b})"), x * y)),
            (inner.clone(), inner.clone())
                .prop_map(|((a, x), (b, y))| (format!("SUM({a},{b})"), x + y)),
            inner.prop_map(|(a, x)| (format!("ABS(-{a})"), x)),
        ]
    })
}

fn arb_decimal_literal() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..=100_000).prop_map(|n| n.to_string()),
        (0u32..=1000, 0u32..=99).prop_map(|(int, frac)| format!("{int}.{frac:02}")),
        (0u32..=1000, 0u32..=999).prop_map(|(int, frac)| format!("{int}.{frac:03}")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(CASES))]

    #[test]
    fn prop_balanced_brackets_close_to_zero((formula, _) in arb_expression()) {
        let ctx = Tokenizer::default().tokenize_context(&formula);
        prop_assert_eq!(ctx.bracket_count(), 0);
        prop_assert!(!ctx.is_in_string());
    }

    #[test]
    fn prop_nested_expressions_evaluate((formula, expected) in arb_expression()) {
        prop_assert_eq!(eval(&formula).value, Value::Number(expected));
    }

    #[test]
    fn prop_multiplication_binds_tighter(a in -50i64..50, b in -50i64..50, c in -50i64..50) {
        let (x, y, z) = (a as f64, b as f64, c as f64);
        prop_assert_eq!(eval(&format!("{a}+{b}*{c}")).value, Value::Number(x + y * z));
        prop_assert_eq!(eval(&format!("{a}*{b}-{c}")).value, Value::Number(x * y - z));
        prop_assert_eq!(eval(&format!("{a}-{b}-{c}")).value, Value::Number(x - y - z));
        prop_assert_eq!(eval(&format!("({a}-{b})*{c}")).value, Value::Number((x - y) * z));
    }

    #[test]
    fn prop_comparison_binds_loosest(a in -50i64..50, b in -50i64..50, c in -50i64..50) {
        let expected = (a + b) < c;
        prop_assert_eq!(eval(&format!("{a}+{b}<{c}")), CompileResult::boolean(expected));
        let concatenated = format!("{}{}", a, b + c);
        prop_assert_eq!(
            eval(&format!("{a}&{b}+{c}")),
            CompileResult::string(concatenated)
        );
    }

    #[test]
    fn prop_string_literal_round_trip(text in "[a-zA-Z0-9 \"]{0,24}") {
        let literal = format!("\"{}\"", text.replace('"', "\"\""));
        prop_assert_eq!(eval(&literal), CompileResult::string(text));
    }

    #[test]
    fn prop_number_literal_round_trip(literal in arb_decimal_literal()) {
        let first = eval(&literal);
        let second = eval(&first.to_string());
        prop_assert_eq!(&first.value, &second.value);
        prop_assert_eq!(first.value, Value::Number(literal.parse::<f64>().unwrap()));
    }

    #[test]
    fn prop_boolean_literal_round_trip(flag in any::<bool>()) {
        let first = eval(if flag { "TRUE" } else { "FALSE" });
        prop_assert_eq!(&first, &CompileResult::boolean(flag));
        prop_assert_eq!(eval(&first.to_string()), first);
    }
}
