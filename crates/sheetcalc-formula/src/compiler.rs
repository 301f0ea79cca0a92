//! Expression compiler
//!
//! Compiles an [`ExpressionChain`] in two passes. Every node is first resolved to a constant
//! (groups are compiled recursively, functions are called, references and names are looked up).
//! The chain is then reduced by repeatedly combining the first run of operators with the lowest
//! precedence number, until one node is left.

use tracing::{debug, trace};

use crate::context::ParsingContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::{ExpressionChain, ExpressionKind, Operator};
use crate::strategy::{combine, OperatorCategory};
use crate::value::{CompileResult, DataType, ExcelError, FunctionArgument, Value};

/// Compiles expression chains within one parsing context
pub struct ExpressionCompiler<'c, 'a> {
    ctx: &'c ParsingContext<'a>,
}

impl<'c, 'a> ExpressionCompiler<'c, 'a> {
    pub fn new(ctx: &'c ParsingContext<'a>) -> Self {
        Self { ctx }
    }

    /// Compile a chain to a single result
    pub fn compile(&self, mut chain: ExpressionChain) -> FormulaResult<CompileResult> {
        let _guard = self.ctx.enter()?;

        if chain.is_invalid() {
            return Ok(CompileResult::error(ExcelError::Value));
        }
        if chain.is_empty() {
            return Ok(CompileResult::empty());
        }

        self.compile_groups(&mut chain)?;
        self.materialize_all(&mut chain)?;

        let trailing_operator = chain
            .tail()
            .and_then(|i| chain.node(i))
            .map(|node| node.operator.is_some())
            .unwrap_or(false);
        if trailing_operator {
            return Ok(CompileResult::error(ExcelError::Value));
        }

        while chain.len() > 1 {
            if let Some(error) = self.reduce_once(&mut chain)? {
                debug!(error = %error, "reduction produced an error");
                return Ok(CompileResult::error(error));
            }
        }

        Ok(chain
            .head()
            .and_then(|i| chain.node(i))
            .and_then(|node| match &node.kind {
                ExpressionKind::Constant(result) => Some(result.clone()),
                _ => None,
            })
            .unwrap_or_else(CompileResult::empty))
    }

    /// Compile every group node and splice the result back in place
    fn compile_groups(&self, chain: &mut ExpressionChain) -> FormulaResult<()> {
        for index in chain.indices() {
            let Some(node) = chain.node_mut(index) else {
                continue;
            };
            if !node.is_grouped() {
                continue;
            }
            let kind = std::mem::replace(
                &mut node.kind,
                ExpressionKind::Constant(CompileResult::empty()),
            );
            if let ExpressionKind::Group(inner) = kind {
                let result = self.compile(inner)?;
                if let Some(node) = chain.node_mut(index) {
                    node.kind = ExpressionKind::Constant(result);
                }
            }
        }
        Ok(())
    }

    /// Turn every remaining node into a constant, applying negation and percent
    fn materialize_all(&self, chain: &mut ExpressionChain) -> FormulaResult<()> {
        for index in chain.indices() {
            let Some(node) = chain.node_mut(index) else {
                continue;
            };
            let kind = std::mem::replace(
                &mut node.kind,
                ExpressionKind::Constant(CompileResult::empty()),
            );
            let (negated, percent) = (node.negated, node.percent);

            let result = self.evaluate(kind)?;
            let result = self.apply_unary(result, negated, percent)?;

            if let Some(node) = chain.node_mut(index) {
                node.kind = ExpressionKind::Constant(result);
                node.negated = false;
                node.percent = 0;
            }
        }
        Ok(())
    }

    fn evaluate(&self, kind: ExpressionKind) -> FormulaResult<CompileResult> {
        match kind {
            ExpressionKind::Constant(result) => Ok(result),
            ExpressionKind::Group(inner) => self.compile(inner),
            ExpressionKind::Address(address) => {
                let provider = self.ctx.provider()?;
                let address = address.with_default_worksheet(&self.ctx.scope().worksheet);
                if !provider.worksheet_exists(address.worksheet_name()) {
                    return Ok(CompileResult::error(ExcelError::Ref));
                }
                Ok(CompileResult::range(address))
            }
            ExpressionKind::Name { worksheet, name } => {
                self.ctx.resolve_name(worksheet.as_deref(), &name)
            }
            ExpressionKind::Function { name, arguments } => self.call_function(&name, arguments),
            ExpressionKind::Array(rows) => self.compile_array(rows),
        }
    }

    fn call_function(
        &self,
        name: &str,
        arguments: Vec<ExpressionChain>,
    ) -> FormulaResult<CompileResult> {
        let function = self
            .ctx
            .repository()
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

        let args = arguments
            .into_iter()
            .map(|chain| self.compile(chain).map(FunctionArgument::from))
            .collect::<FormulaResult<Vec<_>>>()?;

        trace!(function = name, args = args.len(), "calling function");
        match function.execute(&args, self.ctx) {
            Ok(result) => Ok(result),
            Err(FormulaError::Value(error)) => Ok(CompileResult::error(error)),
            Err(error) => Err(error),
        }
    }

    fn compile_array(&self, rows: Vec<Vec<ExpressionChain>>) -> FormulaResult<CompileResult> {
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let mut compiled = Vec::with_capacity(row.len());
            for element in row {
                let result = self.compile(element)?;
                compiled.push(self.ctx.dereference(result)?.value);
            }
            values.push(compiled);
        }
        Ok(CompileResult::array(values))
    }

    fn apply_unary(
        &self,
        result: CompileResult,
        negated: bool,
        percent: u32,
    ) -> FormulaResult<CompileResult> {
        if !negated && percent == 0 {
            return Ok(result);
        }
        let result = self.ctx.dereference(result)?;
        if let Some(error) = result.error_value() {
            return Ok(CompileResult::error(error));
        }
        let mut n = match result.value.coerce_to_number() {
            Ok(n) => n,
            Err(error) => return Ok(CompileResult::error(error)),
        };
        if negated {
            n = -n;
        }
        for _ in 0..percent {
            n /= 100.0;
        }
        if percent == 0 && result.data_type == DataType::Integer {
            Ok(CompileResult::integer(n))
        } else {
            Ok(CompileResult::number(n))
        }
    }

    /// Reduce the first run at the lowest precedence level; returns an error value to stop
    fn reduce_once(&self, chain: &mut ExpressionChain) -> FormulaResult<Option<ExcelError>> {
        let indices = chain.indices();
        let operators: Vec<Option<Operator>> = indices
            .iter()
            .map(|&i| chain.node(i).and_then(|n| n.operator))
            .collect();
        let Some(lowest) = operators.iter().flatten().map(|op| op.precedence()).min() else {
            return Ok(None);
        };
        let Some(start) = operators
            .iter()
            .position(|op| op.map(|o| o.precedence()) == Some(lowest))
        else {
            return Ok(None);
        };
        let Some(op) = operators[start] else {
            return Ok(None);
        };

        // Exponentiation folds right to left over its whole run
        let end = if op == Operator::Exponent {
            let mut end = start;
            while end + 1 < operators.len() && operators[end + 1] == Some(Operator::Exponent) {
                end += 1;
            }
            end
        } else {
            start
        };

        let mut accumulator = self.operand(chain, indices[end + 1], op)?;
        for position in (start..=end).rev() {
            let left = self.operand(chain, indices[position], op)?;
            trace!(op = op.symbol(), "reducing");
            accumulator = combine(&left, op, &accumulator);
            if let Some(error) = accumulator.error_value() {
                return Ok(Some(error));
            }
        }

        let next_operator = chain.node(indices[end + 1]).and_then(|n| n.operator);
        if let Some(node) = chain.node_mut(indices[start]) {
            node.kind = ExpressionKind::Constant(accumulator);
            node.operator = next_operator;
        }
        for &index in &indices[start + 1..=end + 1] {
            chain.unlink(index);
        }
        Ok(None)
    }

    /// Constant value of a node, dereferencing ranges for non-range operators
    fn operand(
        &self,
        chain: &ExpressionChain,
        index: usize,
        op: Operator,
    ) -> FormulaResult<CompileResult> {
        let result = match chain.node(index).map(|n| &n.kind) {
            Some(ExpressionKind::Constant(result)) => result.clone(),
            _ => CompileResult::error(ExcelError::Value),
        };
        if op.category() == OperatorCategory::Range {
            Ok(result)
        } else if matches!(result.value, Value::Range(_)) {
            self.ctx.dereference(result)
        } else {
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingConfiguration;
    use crate::context::ParsingScope;
    use crate::expression::ExpressionGraphBuilder;
    use crate::functions::FunctionRepository;
    use crate::provider::WorkbookDataProvider;
    use crate::tokenizer::Tokenizer;
    use crate::value::RangeAddress;
    use sheetcalc_core::Workbook;

    fn compile_with(
        provider: Option<&WorkbookDataProvider>,
        formula: &str,
    ) -> FormulaResult<CompileResult> {
        let config = ParsingConfiguration::default();
        let ctx = ParsingContext::new(
            provider.map(|p| p as &dyn crate::provider::DataProvider),
            FunctionRepository::global(),
            &config,
            ParsingScope::new("Sheet1", 0, 0),
        );
        let tokens = Tokenizer::default().tokenize(formula);
        let chain = ExpressionGraphBuilder::build(&tokens)?;
        ExpressionCompiler::new(&ctx).compile(chain)
    }

    fn compile(formula: &str) -> CompileResult {
        compile_with(None, formula).unwrap()
    }

    fn number(formula: &str) -> f64 {
        compile(formula).as_number().unwrap()
    }

    #[test]
    fn test_empty_and_single_operand() {
        assert_eq!(compile(""), CompileResult::empty());
        assert_eq!(compile("42"), CompileResult::integer(42.0));
        assert_eq!(compile("\"hi\""), CompileResult::string("hi"));
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(number("1+2*3"), 7.0);
        assert_eq!(number("(1+2)*3"), 9.0);
        assert_eq!(number("10-4-3"), 3.0);
        assert_eq!(number("12/3/2"), 2.0);
        assert_eq!(number("2^3^2"), 512.0);
        assert_eq!(number("2*2^3+1"), 17.0);
        assert_eq!(number("-2^2"), 4.0);
        assert_eq!(number("50%*2"), 1.0);
        assert_eq!(number("--3"), 3.0);
    }

    #[test]
    fn test_concat_binds_tighter_than_comparison() {
        assert_eq!(compile("\"a\"&\"b\"=\"ab\""), CompileResult::boolean(true));
        assert_eq!(compile("1+1&\"x\""), CompileResult::string("2x"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(compile("1/0+1"), CompileResult::error(ExcelError::Div0));
        assert_eq!(compile("1+"), CompileResult::error(ExcelError::Value));
        assert_eq!(compile("(1"), CompileResult::error(ExcelError::Value));
        assert_eq!(compile("#N/A+#REF!"), CompileResult::error(ExcelError::NA));
        assert_eq!(compile("\"x\"*2"), CompileResult::error(ExcelError::Value));
    }

    #[test]
    fn test_fatal_errors() {
        assert_eq!(
            compile_with(None, "NOPE(1)"),
            Err(FormulaError::UnknownFunction("NOPE".into()))
        );
        assert_eq!(
            compile_with(None, "A1+1"),
            Err(FormulaError::MissingDataProvider)
        );
    }

    #[test]
    fn test_references() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        wb.worksheet_mut(0).unwrap().set_cell_value("A1", 2.0).unwrap();
        wb.worksheet_mut(1).unwrap().set_cell_value("B2", 5.0).unwrap();
        let provider = WorkbookDataProvider::new(&wb);

        let result = compile_with(Some(&provider), "A1*Data!B2+1").unwrap();
        assert_eq!(result.value, Value::Number(11.0));
        let result = compile_with(Some(&provider), "-A1").unwrap();
        assert_eq!(result.value, Value::Number(-2.0));
        let result = compile_with(Some(&provider), "A1:B2").unwrap();
        assert_eq!(
            result,
            CompileResult::range(RangeAddress::parse("Sheet1!A1:B2").unwrap())
        );
        let result = compile_with(Some(&provider), "Missing!A1").unwrap();
        assert_eq!(result, CompileResult::error(ExcelError::Ref));
        let result = compile_with(Some(&provider), "A1:B2+1").unwrap();
        assert_eq!(result, CompileResult::error(ExcelError::Value));
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(
            compile("{1,\"a\";TRUE,-2}").value,
            Value::Array(vec![
                vec![Value::Number(1.0), Value::String("a".into())],
                vec![Value::Boolean(true), Value::Number(-2.0)],
            ])
        );
    }

    #[test]
    fn test_too_complex() {
        let formula = format!("{}1{}", "(".repeat(70), ")".repeat(70));
        assert!(matches!(
            compile_with(None, &formula),
            Err(FormulaError::TooComplex { .. })
        ));
    }
}
