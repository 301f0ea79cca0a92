//! Formula parser
//!
//! [`FormulaParser`] bundles a data provider, a function repository and a configuration, and
//! evaluates formula text in the scope of one cell.

use tracing::debug;

use crate::config::ParsingConfiguration;
use crate::context::{ParsingContext, ParsingScope};
use crate::error::FormulaResult;
use crate::functions::FunctionRepository;
use crate::provider::DataProvider;
use crate::tokenizer::{Token, Tokenizer};
use crate::value::{CompileResult, Value};

/// Worksheet used when neither the caller nor the provider names one
const FALLBACK_WORKSHEET: &str = "Sheet1";

/// Parses and evaluates formulas
///
/// # Example
/// ```rust
/// use sheetcalc_core::Workbook;
/// use sheetcalc_formula::{CompileResult, FormulaParser, WorkbookDataProvider};
///
/// let mut workbook = Workbook::new();
/// workbook.worksheet_mut(0).unwrap().set_cell_value("A1", 4.0).unwrap();
///
/// let provider = WorkbookDataProvider::new(&workbook);
/// let parser = FormulaParser::with_provider(&provider);
/// assert_eq!(parser.parse("=A1*2+1").unwrap(), CompileResult::integer(9.0));
/// ```
pub struct FormulaParser<'a> {
    provider: Option<&'a dyn DataProvider>,
    repository: &'a FunctionRepository,
    config: ParsingConfiguration,
}

impl Default for FormulaParser<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaParser<'static> {
    /// A parser without a data provider; references fail with `MissingDataProvider`
    pub fn new() -> Self {
        Self {
            provider: None,
            repository: FunctionRepository::global(),
            config: ParsingConfiguration::default(),
        }
    }
}

impl<'a> FormulaParser<'a> {
    /// A parser reading cells and names through `provider`
    pub fn with_provider(provider: &'a dyn DataProvider) -> Self {
        Self {
            provider: Some(provider),
            repository: FunctionRepository::global(),
            config: ParsingConfiguration::default(),
        }
    }

    /// Use a custom function repository
    pub fn with_repository<'b>(self, repository: &'b FunctionRepository) -> FormulaParser<'b>
    where
        'a: 'b,
    {
        FormulaParser {
            provider: self.provider,
            repository,
            config: self.config,
        }
    }

    pub fn with_configuration(mut self, config: ParsingConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn configuration(&self) -> &ParsingConfiguration {
        &self.config
    }

    pub fn repository(&self) -> &FunctionRepository {
        self.repository
    }

    /// Tokenize formula text with this parser's separator
    pub fn tokenize(&self, formula: &str) -> Vec<Token> {
        let formula = formula.trim();
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        Tokenizer::from_configuration(&self.config).tokenize(formula)
    }

    /// Evaluate a formula at the top-left cell of the default worksheet
    pub fn parse(&self, formula: &str) -> FormulaResult<CompileResult> {
        let worksheet = self
            .provider
            .and_then(|provider| provider.default_worksheet())
            .unwrap_or_else(|| FALLBACK_WORKSHEET.to_string());
        self.parse_at(formula, &worksheet, 0, 0)
    }

    /// Evaluate a formula as if it were in the given cell
    ///
    /// A single-cell reference at the top level is replaced by the cell's value; larger ranges
    /// are returned as references.
    pub fn parse_at(
        &self,
        formula: &str,
        worksheet: &str,
        row: u32,
        col: u16,
    ) -> FormulaResult<CompileResult> {
        debug!(formula, worksheet, row, col, "evaluating formula");
        let ctx = ParsingContext::new(
            self.provider,
            self.repository,
            &self.config,
            ParsingScope::new(worksheet, row, col),
        );
        let compiled = ctx.compile_formula(formula)?;
        let result = match &compiled.value {
            Value::Range(address) if address.is_single_cell() => {
                ctx.dereference(compiled)?
            }
            _ => compiled,
        };
        debug!(result = %result, data_type = ?result.data_type, "formula evaluated");
        Ok(result)
    }

    /// Evaluate the stored formula of a cell; cells without a formula yield their value
    pub fn parse_cell(&self, worksheet: &str, row: u32, col: u16) -> FormulaResult<CompileResult> {
        let ctx = ParsingContext::new(
            self.provider,
            self.repository,
            &self.config,
            ParsingScope::new(worksheet, row, col),
        );
        match ctx.provider()?.get_range_formula(worksheet, row, col)? {
            Some(formula) => self.parse_at(&formula, worksheet, row, col),
            None => Ok(CompileResult::from(ctx.cell_value(worksheet, row, col)?)),
        }
    }
}
