//! Expression graph
//!
//! The builder turns a token sequence into an [`ExpressionChain`]: an arena of nodes linked in
//! source order, each carrying the operator that follows it. Groups, function arguments and
//! array elements hold their own chains and are compiled recursively.

use sheetcalc_core::CellRange;

use crate::config::DEFAULT_MAX_NESTING_DEPTH;
use crate::error::{FormulaError, FormulaResult};
use crate::strategy::OperatorCategory;
use crate::tokenizer::{Token, TokenKind};
use crate::value::{CompileResult, ExcelError, RangeAddress};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Exponent,
    Concat,
    Equals,
    NotEqualTo,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Range,
    Intersect,
}

impl Operator {
    /// Parse operator text as produced by the tokenizer
    pub fn parse(text: &str) -> Option<Self> {
        let op = match text {
            "+" => Operator::Plus,
            "-" => Operator::Minus,
            "*" => Operator::Multiply,
            "/" => Operator::Divide,
            "^" => Operator::Exponent,
            "&" => Operator::Concat,
            "=" => Operator::Equals,
            "<>" => Operator::NotEqualTo,
            "<" => Operator::LessThan,
            "<=" => Operator::LessThanOrEqual,
            ">" => Operator::GreaterThan,
            ">=" => Operator::GreaterThanOrEqual,
            ":" => Operator::Range,
            " " => Operator::Intersect,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength; lower numbers bind tighter
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Exponent => 4,
            Operator::Multiply | Operator::Divide => 6,
            Operator::Plus | Operator::Minus => 12,
            Operator::Concat => 15,
            Operator::Equals
            | Operator::NotEqualTo
            | Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual => 25,
            Operator::Range | Operator::Intersect => 30,
        }
    }

    /// Strategy family that combines the operands
    pub fn category(&self) -> OperatorCategory {
        match self {
            Operator::Plus
            | Operator::Minus
            | Operator::Multiply
            | Operator::Divide
            | Operator::Exponent => OperatorCategory::Arithmetic,
            Operator::Concat => OperatorCategory::Concatenation,
            Operator::Range | Operator::Intersect => OperatorCategory::Range,
            _ => OperatorCategory::Comparison,
        }
    }

    /// Formula text of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Exponent => "^",
            Operator::Concat => "&",
            Operator::Equals => "=",
            Operator::NotEqualTo => "<>",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Range => ":",
            Operator::Intersect => " ",
        }
    }
}

/// What a node evaluates
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Constant(CompileResult),
    Address(RangeAddress),
    Name {
        worksheet: Option<String>,
        name: String,
    },
    Function {
        name: String,
        arguments: Vec<ExpressionChain>,
    },
    Group(ExpressionChain),
    Array(Vec<Vec<ExpressionChain>>),
}

/// One node of a chain
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Operator between this node and the next one
    pub operator: Option<Operator>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    /// Unary minus applied to the node's value
    pub negated: bool,
    /// Number of `%` postfixes
    pub percent: u32,
}

impl Expression {
    /// Create an unlinked node
    pub fn new(kind: ExpressionKind) -> Self {
        Self {
            kind,
            operator: None,
            prev: None,
            next: None,
            negated: false,
            percent: 0,
        }
    }

    /// Check if this node is a parenthesized group
    pub fn is_grouped(&self) -> bool {
        matches!(self.kind, ExpressionKind::Group(_))
    }
}

/// Arena-backed doubly linked list of expression nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionChain {
    nodes: Vec<Expression>,
    head: Option<usize>,
    tail: Option<usize>,
    invalid: bool,
}

impl ExpressionChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, returning its arena index
    pub fn push(&mut self, mut expression: Expression) -> usize {
        let index = self.nodes.len();
        expression.prev = self.tail;
        expression.next = None;
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.nodes.push(expression);
        index
    }

    /// Index of the first linked node
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Index of the last linked node
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub fn node(&self, index: usize) -> Option<&Expression> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut Expression> {
        self.nodes.get_mut(index)
    }

    /// Check if no node is linked
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of linked nodes
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Arena indices in link order
    pub fn indices(&self) -> Vec<usize> {
        let mut result = Vec::new();
        let mut cursor = self.head;
        while let Some(index) = cursor {
            result.push(index);
            cursor = self.nodes.get(index).and_then(|n| n.next);
        }
        result
    }

    /// Iterate linked nodes in order
    pub fn iter(&self) -> impl Iterator<Item = &Expression> + '_ {
        self.indices().into_iter().filter_map(|i| self.nodes.get(i))
    }

    /// Remove a node from the links; the arena slot stays
    pub fn unlink(&mut self, index: usize) {
        let Some(node) = self.nodes.get(index) else {
            return;
        };
        let (prev, next) = (node.prev, node.next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[index];
        node.prev = None;
        node.next = None;
    }

    /// Check if the builder found a syntax fault in this chain
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    fn mark_invalid(&mut self) {
        self.invalid = true;
    }

    fn tail_mut(&mut self) -> Option<&mut Expression> {
        let tail = self.tail?;
        self.nodes.get_mut(tail)
    }
}

/// Why a nested chain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    End,
    GroupEnd,
    Separator,
    RowSeparator,
    ArrayEnd,
}

/// What ends the chain being built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    End,
    Group,
    Argument,
    Array,
}

/// Builds expression chains from tokens
pub struct ExpressionGraphBuilder<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'t> ExpressionGraphBuilder<'t> {
    /// Build a chain with the default nesting limit
    pub fn build(tokens: &'t [Token]) -> FormulaResult<ExpressionChain> {
        Self::build_with_max_depth(tokens, DEFAULT_MAX_NESTING_DEPTH)
    }

    /// Build a chain, failing with `TooComplex` past `max_depth` nested groups
    pub fn build_with_max_depth(
        tokens: &'t [Token],
        max_depth: usize,
    ) -> FormulaResult<ExpressionChain> {
        let mut builder = Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        };
        let (chain, _) = builder.build_chain(Terminator::End)?;
        Ok(chain)
    }

    fn next_token(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn nested(&mut self, terminator: Terminator) -> FormulaResult<(ExpressionChain, Stop)> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormulaError::TooComplex {
                depth: self.max_depth,
            });
        }
        let result = self.build_chain(terminator);
        self.depth -= 1;
        result
    }

    fn build_chain(&mut self, terminator: Terminator) -> FormulaResult<(ExpressionChain, Stop)> {
        let mut chain = ExpressionChain::new();
        let mut negate = false;

        while let Some(token) = self.next_token() {
            let kind = match token.kind {
                TokenKind::GroupEnd => match terminator {
                    Terminator::Group | Terminator::Argument => {
                        return Ok(finish(chain, negate, Stop::GroupEnd))
                    }
                    _ => {
                        chain.mark_invalid();
                        continue;
                    }
                },
                TokenKind::ArgumentSeparator => match terminator {
                    Terminator::Argument => return Ok(finish(chain, negate, Stop::Separator)),
                    Terminator::Array if token.text == ";" => {
                        return Ok(finish(chain, negate, Stop::RowSeparator))
                    }
                    Terminator::Array => return Ok(finish(chain, negate, Stop::Separator)),
                    _ => {
                        chain.mark_invalid();
                        continue;
                    }
                },
                TokenKind::ArrayEnd => match terminator {
                    Terminator::Array => return Ok(finish(chain, negate, Stop::ArrayEnd)),
                    _ => {
                        chain.mark_invalid();
                        continue;
                    }
                },
                TokenKind::Negator => {
                    negate = !negate;
                    continue;
                }
                TokenKind::Operator if token.text == "%" => {
                    match chain.tail_mut() {
                        Some(last) if last.operator.is_none() => last.percent += 1,
                        _ => chain.mark_invalid(),
                    }
                    continue;
                }
                TokenKind::Operator => {
                    match (chain.tail_mut(), Operator::parse(&token.text)) {
                        (Some(last), Some(op)) if last.operator.is_none() => {
                            last.operator = Some(op)
                        }
                        _ => chain.mark_invalid(),
                    }
                    continue;
                }
                TokenKind::GroupStart => {
                    let (inner, stop) = self.nested(Terminator::Group)?;
                    if stop != Stop::GroupEnd {
                        chain.mark_invalid();
                    }
                    ExpressionKind::Group(inner)
                }
                TokenKind::FunctionStart => self.build_function(&token.text, &mut chain)?,
                TokenKind::ArrayStart => self.build_array(&mut chain)?,
                TokenKind::StringLiteral => {
                    ExpressionKind::Constant(CompileResult::string(token.text.as_str()))
                }
                TokenKind::Number => match token.text.parse::<f64>() {
                    Ok(n) if is_integer_literal(&token.text) => {
                        ExpressionKind::Constant(CompileResult::integer(n))
                    }
                    Ok(n) => ExpressionKind::Constant(CompileResult::number(n)),
                    Err(_) => ExpressionKind::Constant(CompileResult::error(ExcelError::Value)),
                },
                TokenKind::Boolean => ExpressionKind::Constant(CompileResult::boolean(
                    token.text.eq_ignore_ascii_case("true"),
                )),
                TokenKind::ExcelError => ExpressionKind::Constant(CompileResult::error(
                    ExcelError::parse(&token.text).unwrap_or(ExcelError::Value),
                )),
                TokenKind::ExcelAddress => address_or_name(&token.text),
                TokenKind::SheetNameFragment => self.build_sheet_reference(&token.text, &mut chain),
                TokenKind::NameValue | TokenKind::Operand => name_expression(&token.text),
            };

            push_operand(&mut chain, kind, negate);
            negate = false;
        }

        Ok(finish(chain, negate, Stop::End))
    }

    fn build_function(
        &mut self,
        name: &str,
        chain: &mut ExpressionChain,
    ) -> FormulaResult<ExpressionKind> {
        let mut arguments = Vec::new();
        loop {
            let (argument, stop) = self.nested(Terminator::Argument)?;
            match stop {
                Stop::Separator => arguments.push(argument),
                Stop::GroupEnd => {
                    if !(arguments.is_empty() && argument.is_empty() && !argument.is_invalid()) {
                        arguments.push(argument);
                    }
                    break;
                }
                _ => {
                    arguments.push(argument);
                    chain.mark_invalid();
                    break;
                }
            }
        }
        Ok(ExpressionKind::Function {
            name: name.to_string(),
            arguments,
        })
    }

    fn build_array(&mut self, chain: &mut ExpressionChain) -> FormulaResult<ExpressionKind> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        loop {
            let (element, stop) = self.nested(Terminator::Array)?;
            row.push(element);
            match stop {
                Stop::Separator => {}
                Stop::RowSeparator => rows.push(std::mem::take(&mut row)),
                Stop::ArrayEnd => {
                    rows.push(row);
                    break;
                }
                _ => {
                    rows.push(row);
                    chain.mark_invalid();
                    break;
                }
            }
        }
        Ok(ExpressionKind::Array(rows))
    }

    fn build_sheet_reference(
        &mut self,
        sheet: &str,
        chain: &mut ExpressionChain,
    ) -> ExpressionKind {
        let target = self.tokens.get(self.pos).and_then(|t| {
            let rest = t.text.strip_prefix('!')?;
            matches!(
                t.kind,
                TokenKind::ExcelAddress | TokenKind::NameValue | TokenKind::Operand
            )
            .then_some(rest)
        });
        let Some(rest) = target else {
            chain.mark_invalid();
            return ExpressionKind::Constant(CompileResult::error(ExcelError::Value));
        };
        self.pos += 1;
        match CellRange::parse(rest) {
            Ok(range) => ExpressionKind::Address(RangeAddress::new(Some(sheet.to_string()), range)),
            Err(_) => ExpressionKind::Name {
                worksheet: Some(sheet.to_string()),
                name: rest.to_string(),
            },
        }
    }
}

fn finish(
    mut chain: ExpressionChain,
    dangling_negator: bool,
    stop: Stop,
) -> (ExpressionChain, Stop) {
    if dangling_negator {
        chain.mark_invalid();
    }
    (chain, stop)
}

fn push_operand(chain: &mut ExpressionChain, kind: ExpressionKind, negated: bool) {
    if matches!(chain.tail_mut(), Some(last) if last.operator.is_none()) {
        chain.mark_invalid();
    }
    let mut expression = Expression::new(kind);
    expression.negated = negated;
    chain.push(expression);
}

fn is_integer_literal(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit())
}

fn address_or_name(text: &str) -> ExpressionKind {
    match RangeAddress::parse(text) {
        Some(address) => ExpressionKind::Address(address),
        None => name_expression(text),
    }
}

fn name_expression(text: &str) -> ExpressionKind {
    match text.split_once('!') {
        Some((sheet, name)) => ExpressionKind::Name {
            worksheet: Some(sheet.to_string()),
            name: name.to_string(),
        },
        None => ExpressionKind::Name {
            worksheet: None,
            name: text.to_string(),
        },
    }
}
