//! Per-evaluation context shared by the compiler and functions

use std::cell::Cell;

use tracing::warn;

use crate::compiler::ExpressionCompiler;
use crate::config::ParsingConfiguration;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::ExpressionGraphBuilder;
use crate::functions::FunctionRepository;
use crate::provider::{CellIter, DataProvider};
use crate::tokenizer::Tokenizer;
use crate::value::{CompileResult, ExcelError, RangeAddress, Value};

/// Where a formula is being evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingScope {
    pub worksheet: String,
    pub row: u32,
    pub col: u16,
}

impl ParsingScope {
    pub fn new<S: Into<String>>(worksheet: S, row: u32, col: u16) -> Self {
        Self {
            worksheet: worksheet.into(),
            row,
            col,
        }
    }
}

/// Everything a compile needs: provider, functions, configuration, scope and the depth counter
pub struct ParsingContext<'a> {
    provider: Option<&'a dyn DataProvider>,
    repository: &'a FunctionRepository,
    config: &'a ParsingConfiguration,
    scope: ParsingScope,
    depth: Cell<usize>,
}

/// Decrements the nesting depth when dropped
pub struct DepthGuard<'c> {
    depth: &'c Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl<'a> ParsingContext<'a> {
    pub fn new(
        provider: Option<&'a dyn DataProvider>,
        repository: &'a FunctionRepository,
        config: &'a ParsingConfiguration,
        scope: ParsingScope,
    ) -> Self {
        Self {
            provider,
            repository,
            config,
            scope,
            depth: Cell::new(0),
        }
    }

    /// The data provider; references and names cannot be used without one
    pub fn provider(&self) -> FormulaResult<&'a dyn DataProvider> {
        self.provider.ok_or(FormulaError::MissingDataProvider)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn repository(&self) -> &'a FunctionRepository {
        self.repository
    }

    pub fn configuration(&self) -> &'a ParsingConfiguration {
        self.config
    }

    pub fn scope(&self) -> &ParsingScope {
        &self.scope
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Enter one nesting level
    pub fn enter(&self) -> FormulaResult<DepthGuard<'_>> {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_nesting_depth {
            return Err(FormulaError::TooComplex {
                depth: self.config.max_nesting_depth,
            });
        }
        self.depth.set(depth);
        Ok(DepthGuard { depth: &self.depth })
    }

    /// Worksheet an address points at
    pub fn worksheet_of<'r>(&'r self, address: &'r RangeAddress) -> &'r str {
        address.worksheet.as_deref().unwrap_or(&self.scope.worksheet)
    }

    /// Stored cells of a range, row-major
    pub fn range_cells(&self, address: &RangeAddress) -> FormulaResult<CellIter<'a>> {
        let range = address.range;
        self.provider()?.get_range(
            self.worksheet_of(address),
            range.start.row,
            range.start.col,
            range.end.row,
            range.end.col,
        )
    }

    /// Value of one cell
    pub fn cell_value(&self, worksheet: &str, row: u32, col: u16) -> FormulaResult<Value> {
        self.provider()?.get_cell_value(worksheet, row, col)
    }

    /// Replace a range result with the value it refers to
    ///
    /// Single cells yield their value; larger ranges cannot be used as a scalar.
    pub fn dereference(&self, result: CompileResult) -> FormulaResult<CompileResult> {
        let Value::Range(address) = &result.value else {
            return Ok(result);
        };
        if !address.is_single_cell() {
            return Ok(CompileResult::error(ExcelError::Value));
        }
        let value = self.cell_value(
            self.worksheet_of(address),
            address.range.start.row,
            address.range.start.col,
        )?;
        Ok(CompileResult::from(value))
    }

    /// Tokenize, build and compile formula text in this context
    pub fn compile_formula(&self, formula: &str) -> FormulaResult<CompileResult> {
        let formula = formula.trim();
        let formula = formula.strip_prefix('=').unwrap_or(formula);
        let tokens = Tokenizer::from_configuration(self.config).tokenize(formula);
        let remaining = self
            .config
            .max_nesting_depth
            .saturating_sub(self.depth.get());
        let chain = ExpressionGraphBuilder::build_with_max_depth(&tokens, remaining).map_err(
            |_| FormulaError::TooComplex {
                depth: self.config.max_nesting_depth,
            },
        )?;
        ExpressionCompiler::new(self).compile(chain)
    }

    /// Resolve a defined name to its value, reference or compiled formula
    ///
    /// Unknown names yield `#NAME?`. Host faults raised while compiling a name's formula are
    /// returned as they would be for the formula itself.
    pub fn resolve_name(
        &self,
        worksheet: Option<&str>,
        name: &str,
    ) -> FormulaResult<CompileResult> {
        let provider = self.provider()?;
        let lookup_sheet = worksheet.unwrap_or(&self.scope.worksheet);
        let Some(info) = provider.get_name(Some(lookup_sheet), name) else {
            return Ok(CompileResult::error(ExcelError::Name));
        };

        match (&info.value, &info.formula) {
            (Some(Value::Range(address)), _) => {
                let sheet = info.worksheet.as_deref().unwrap_or(lookup_sheet);
                let address = address.clone().with_default_worksheet(sheet);
                if !provider.worksheet_exists(address.worksheet_name()) {
                    return Ok(CompileResult::error(ExcelError::Ref));
                }
                Ok(CompileResult::range(address))
            }
            (Some(value), _) => Ok(CompileResult::from(value.clone())),
            (None, Some(formula)) => {
                let _guard = self.enter()?;
                match self.compile_formula(formula) {
                    Ok(result) => Ok(result),
                    Err(FormulaError::Value(error)) => Ok(CompileResult::error(error)),
                    Err(error) => {
                        warn!(
                            name,
                            formula = formula.as_str(),
                            %error,
                            "defined name failed to evaluate"
                        );
                        Err(error)
                    }
                }
            }
            (None, None) => Ok(CompileResult::error(ExcelError::Name)),
        }
    }
}
