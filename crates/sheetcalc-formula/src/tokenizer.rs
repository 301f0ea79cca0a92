//! Formula tokenizer
//!
//! Splits formula text into a flat sequence of typed tokens in a single left-to-right scan.
//! Tokenizing never fails: syntax problems that can be detected here (an unterminated string,
//! unbalanced brackets) append an `#VALUE!` error token, which the compiler turns into the result.

use lazy_regex::regex_is_match;
use tracing::trace;

use crate::config::ParsingConfiguration;
use crate::value::ExcelError;

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Unclassified operand text
    Operand,
    /// Binary operator, the `%` postfix, or `" "` for intersection
    Operator,
    /// Unary minus
    Negator,
    /// Function name; the opening parenthesis is part of this token
    FunctionStart,
    /// `,` between arguments and array columns, `;` between array rows
    ArgumentSeparator,
    GroupStart,
    GroupEnd,
    ArrayStart,
    ArrayEnd,
    /// String literal with quotes removed and `""` unescaped
    StringLiteral,
    /// Quoted sheet name; joined with the following `!address` operand
    SheetNameFragment,
    ExcelAddress,
    ExcelError,
    Boolean,
    Number,
    /// Defined name or other identifier
    NameValue,
}

/// A typed slice of formula text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    /// Create a token
    pub fn new<S: Into<String>>(kind: TokenKind, text: S) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    /// Check if this token is an operator with the given text
    pub fn is_operator(&self, text: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == text
    }
}

/// Mutable state of one tokenizer run
#[derive(Debug)]
pub struct TokenizerContext {
    chars: Vec<char>,
    result: Vec<Token>,
    current: String,
    is_in_string: bool,
    is_in_sheet_name: bool,
    bracket_count: i32,
    array_depth: usize,
    space_pending: bool,
}

impl TokenizerContext {
    /// Create a context for one formula
    pub fn new(formula: &str) -> Self {
        Self {
            chars: formula.chars().collect(),
            result: Vec::new(),
            current: String::new(),
            is_in_string: false,
            is_in_sheet_name: false,
            bracket_count: 0,
            array_depth: 0,
            space_pending: false,
        }
    }

    /// Tokens produced so far
    pub fn tokens(&self) -> &[Token] {
        &self.result
    }

    /// Consume the context, returning its tokens
    pub fn into_tokens(self) -> Vec<Token> {
        self.result
    }

    /// Open brackets minus closed brackets
    pub fn bracket_count(&self) -> i32 {
        self.bracket_count
    }

    /// Check if the scan ended inside a string literal
    pub fn is_in_string(&self) -> bool {
        self.is_in_string
    }

    /// Check if the scan ended inside a quoted sheet name
    pub fn is_in_sheet_name(&self) -> bool {
        self.is_in_sheet_name
    }

    /// The last token, if any
    pub fn last_token(&self) -> Option<&Token> {
        self.result.last()
    }

    /// Extend the text of the last token
    pub fn append_to_last_token(&mut self, text: &str) {
        if let Some(last) = self.result.last_mut() {
            last.text.push_str(text);
        }
    }

    /// Correct the kind of the last token
    pub fn set_last_token_type(&mut self, kind: TokenKind) {
        if let Some(last) = self.result.last_mut() {
            last.kind = kind;
        }
    }

    /// Replace the last token
    pub fn replace_last_token(&mut self, token: Token) {
        if let Some(last) = self.result.last_mut() {
            *last = token;
        }
    }

    fn add_token(&mut self, token: Token) {
        let starts_reference = matches!(
            token.kind,
            TokenKind::ExcelAddress | TokenKind::SheetNameFragment
        );
        let follows_reference = matches!(
            self.last_token().map(|t| t.kind),
            Some(TokenKind::ExcelAddress)
        );
        if self.space_pending && starts_reference && follows_reference {
            self.result.push(Token::new(TokenKind::Operator, " "));
        }
        self.space_pending = false;
        self.result.push(token);
    }

    /// Classify and emit the pending operand text
    fn flush_operand(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.current);
        let after_sheet_fragment =
            self.last_token().map(|t| t.kind) == Some(TokenKind::SheetNameFragment);
        let kind = classify_operand(&text, after_sheet_fragment);
        self.add_token(Token::new(kind, text));
    }

    /// Check if a `-` or `+` here is unary
    fn in_operand_position(&self) -> bool {
        match self.last_token() {
            None => true,
            Some(t) => match t.kind {
                TokenKind::Operator => t.text != "%",
                TokenKind::Negator
                | TokenKind::ArgumentSeparator
                | TokenKind::GroupStart
                | TokenKind::FunctionStart
                | TokenKind::ArrayStart => true,
                _ => false,
            },
        }
    }

    fn peek(&self, index: usize) -> Option<char> {
        self.chars.get(index).copied()
    }
}

fn classify_operand(text: &str, after_sheet_fragment: bool) -> TokenKind {
    if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
        return TokenKind::Boolean;
    }
    let numeric_start = text
        .chars()
        .next()
        .map(|c| c.is_ascii_digit() || c == '.')
        .unwrap_or(false);
    if numeric_start && text.parse::<f64>().is_ok() {
        return TokenKind::Number;
    }
    let reference = if after_sheet_fragment {
        text.strip_prefix('!').unwrap_or(text)
    } else {
        text.rsplit_once('!').map(|(_, r)| r).unwrap_or(text)
    };
    if is_address(reference) {
        TokenKind::ExcelAddress
    } else {
        TokenKind::NameValue
    }
}

fn is_address(text: &str) -> bool {
    regex_is_match!(
        r"^(?:\$?[A-Za-z]{1,3}\$?[0-9]+(?::\$?[A-Za-z]{1,3}\$?[0-9]+)?)$",
        text
    ) || regex_is_match!(r"^(?:\$?[A-Za-z]{1,3}:\$?[A-Za-z]{1,3}|\$?[0-9]+:\$?[0-9]+)$", text)
}

fn is_exponent_prefix(text: &str) -> bool {
    regex_is_match!(r"^[0-9]+(?:\.[0-9]*)?[eE]$", text)
}

fn is_address_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '$' | '!' | '.' | '_')
}

/// Formula tokenizer
#[derive(Debug, Clone)]
pub struct Tokenizer {
    separator: char,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self { separator: ',' }
    }
}

impl Tokenizer {
    /// Create a tokenizer with a custom argument separator
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    /// Create a tokenizer for a parser configuration
    pub fn from_configuration(config: &ParsingConfiguration) -> Self {
        Self::new(config.argument_separator)
    }

    /// Split formula text into tokens
    ///
    /// # Example
    /// ```
    /// use sheetcalc_formula::tokenizer::{TokenKind, Tokenizer};
    ///
    /// let tokens = Tokenizer::default().tokenize("SUM(A1:B2)*-2");
    /// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    /// assert_eq!(
    ///     kinds,
    ///     vec![
    ///         TokenKind::FunctionStart,
    ///         TokenKind::ExcelAddress,
    ///         TokenKind::GroupEnd,
    ///         TokenKind::Operator,
    ///         TokenKind::Negator,
    ///         TokenKind::Number,
    ///     ]
    /// );
    /// ```
    pub fn tokenize(&self, formula: &str) -> Vec<Token> {
        self.tokenize_context(formula).into_tokens()
    }

    /// Tokenize, returning the final context for inspection
    pub fn tokenize_context(&self, formula: &str) -> TokenizerContext {
        let mut ctx = TokenizerContext::new(formula);
        let mut i = 0;

        while let Some(c) = ctx.peek(i) {
            if ctx.is_in_string {
                if c == '"' {
                    if ctx.peek(i + 1) == Some('"') {
                        ctx.current.push('"');
                        i += 1;
                    } else {
                        let text = std::mem::take(&mut ctx.current);
                        ctx.add_token(Token::new(TokenKind::StringLiteral, text));
                        ctx.is_in_string = false;
                    }
                } else {
                    ctx.current.push(c);
                }
                i += 1;
                continue;
            }

            if ctx.is_in_sheet_name {
                if c == '\'' {
                    if ctx.peek(i + 1) == Some('\'') {
                        ctx.current.push('\'');
                        i += 1;
                    } else {
                        let text = std::mem::take(&mut ctx.current);
                        ctx.add_token(Token::new(TokenKind::SheetNameFragment, text));
                        ctx.is_in_sheet_name = false;
                    }
                } else {
                    ctx.current.push(c);
                }
                i += 1;
                continue;
            }

            match c {
                '"' => {
                    ctx.flush_operand();
                    ctx.is_in_string = true;
                }
                '\'' => {
                    ctx.flush_operand();
                    ctx.is_in_sheet_name = true;
                }
                '#' if ctx.current.is_empty() => {
                    let rest: String = ctx.chars[i..].iter().collect::<String>().to_uppercase();
                    match ExcelError::LITERALS.iter().find(|lit| rest.starts_with(*lit)) {
                        Some(literal) => {
                            ctx.add_token(Token::new(TokenKind::ExcelError, *literal));
                            i += literal.chars().count();
                            continue;
                        }
                        None => ctx.current.push(c),
                    }
                }
                c if c.is_whitespace() => {
                    ctx.flush_operand();
                    ctx.space_pending = true;
                }
                '(' => {
                    if ctx.current.is_empty() {
                        ctx.add_token(Token::new(TokenKind::GroupStart, "("));
                    } else {
                        let name = std::mem::take(&mut ctx.current);
                        ctx.add_token(Token::new(TokenKind::FunctionStart, name));
                    }
                    ctx.bracket_count += 1;
                }
                ')' => {
                    ctx.flush_operand();
                    ctx.add_token(Token::new(TokenKind::GroupEnd, ")"));
                    ctx.bracket_count -= 1;
                }
                '{' => {
                    ctx.flush_operand();
                    ctx.add_token(Token::new(TokenKind::ArrayStart, "{"));
                    ctx.bracket_count += 1;
                    ctx.array_depth += 1;
                }
                '}' => {
                    ctx.flush_operand();
                    ctx.add_token(Token::new(TokenKind::ArrayEnd, "}"));
                    ctx.bracket_count -= 1;
                    ctx.array_depth = ctx.array_depth.saturating_sub(1);
                }
                ';' if ctx.array_depth > 0 => {
                    ctx.flush_operand();
                    ctx.add_token(Token::new(TokenKind::ArgumentSeparator, ";"));
                }
                c if c == self.separator || c == ',' => {
                    ctx.flush_operand();
                    ctx.add_token(Token::new(TokenKind::ArgumentSeparator, ","));
                }
                '+' | '-' if is_exponent_prefix(&ctx.current) => ctx.current.push(c),
                '+' | '-' => {
                    ctx.flush_operand();
                    if !ctx.in_operand_position() {
                        ctx.add_token(Token::new(TokenKind::Operator, c.to_string()));
                    } else if c == '-' {
                        ctx.add_token(Token::new(TokenKind::Negator, "-"));
                    }
                }
                '*' | '/' | '^' | '&' | '%' | '=' => {
                    ctx.flush_operand();
                    ctx.add_token(Token::new(TokenKind::Operator, c.to_string()));
                }
                '<' | '>' => {
                    ctx.flush_operand();
                    let mut op = c.to_string();
                    match ctx.peek(i + 1) {
                        Some('=') => {
                            op.push('=');
                            i += 1;
                        }
                        Some('>') if c == '<' => {
                            op.push('>');
                            i += 1;
                        }
                        _ => {}
                    }
                    ctx.add_token(Token::new(TokenKind::Operator, op));
                }
                ':' if !ctx.current.is_empty() && ctx.current.chars().all(is_address_char) => {
                    ctx.current.push(':');
                }
                ':' => {
                    ctx.flush_operand();
                    ctx.add_token(Token::new(TokenKind::Operator, ":"));
                }
                _ => ctx.current.push(c),
            }
            i += 1;
        }

        if ctx.is_in_string || ctx.is_in_sheet_name {
            ctx.current.clear();
        } else {
            ctx.flush_operand();
        }
        if ctx.is_in_string || ctx.is_in_sheet_name || ctx.bracket_count != 0 {
            ctx.add_token(Token::new(TokenKind::ExcelError, ExcelError::Value.as_str()));
        }

        trace!(
            formula,
            tokens = ctx.result.len(),
            brackets = ctx.bracket_count,
            "tokenized formula"
        );
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(formula: &str) -> Vec<(TokenKind, String)> {
        Tokenizer::default()
            .tokenize(formula)
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn kinds(formula: &str) -> Vec<TokenKind> {
        tokens(formula).into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            tokens("1+2.5*A1"),
            vec![
                (TokenKind::Number, "1".to_string()),
                (TokenKind::Operator, "+".to_string()),
                (TokenKind::Number, "2.5".to_string()),
                (TokenKind::Operator, "*".to_string()),
                (TokenKind::ExcelAddress, "A1".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""say ""hi"""&"x""#),
            vec![
                (TokenKind::StringLiteral, r#"say "hi""#.to_string()),
                (TokenKind::Operator, "&".to_string()),
                (TokenKind::StringLiteral, "x".to_string()),
            ]
        );
        assert_eq!(tokens(r#""""#), vec![(TokenKind::StringLiteral, String::new())]);
    }

    #[test]
    fn test_sheet_names() {
        assert_eq!(
            tokens("'It''s here'!A1:B2"),
            vec![
                (TokenKind::SheetNameFragment, "It's here".to_string()),
                (TokenKind::ExcelAddress, "!A1:B2".to_string()),
            ]
        );
        assert_eq!(
            tokens("Data!$C$3"),
            vec![(TokenKind::ExcelAddress, "Data!$C$3".to_string())]
        );
    }

    #[test]
    fn test_functions() {
        assert_eq!(
            tokens("SUM(A:A,3)"),
            vec![
                (TokenKind::FunctionStart, "SUM".to_string()),
                (TokenKind::ExcelAddress, "A:A".to_string()),
                (TokenKind::ArgumentSeparator, ",".to_string()),
                (TokenKind::Number, "3".to_string()),
                (TokenKind::GroupEnd, ")".to_string()),
            ]
        );
        assert_eq!(
            kinds("TODAY()"),
            vec![TokenKind::FunctionStart, TokenKind::GroupEnd]
        );
    }

    #[test]
    fn test_negators() {
        assert_eq!(
            kinds("-1--2"),
            vec![
                TokenKind::Negator,
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Negator,
                TokenKind::Number,
            ]
        );
        assert_eq!(kinds("+3"), vec![TokenKind::Number]);
        assert_eq!(
            kinds("5%-1"),
            vec![
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Operator,
                TokenKind::Number,
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        let ops: Vec<String> = tokens("1<>2<=3>=4<5>6=7")
            .into_iter()
            .filter(|(k, _)| *k == TokenKind::Operator)
            .map(|(_, t)| t)
            .collect();
        assert_eq!(ops, vec!["<>", "<=", ">=", "<", ">", "="]);
    }

    #[test]
    fn test_exponent_numbers() {
        assert_eq!(
            tokens("1E+5-2e-1"),
            vec![
                (TokenKind::Number, "1E+5".to_string()),
                (TokenKind::Operator, "-".to_string()),
                (TokenKind::Number, "2e-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            tokens("IF(TRUE,#DIV/0!,Rate)"),
            vec![
                (TokenKind::FunctionStart, "IF".to_string()),
                (TokenKind::Boolean, "TRUE".to_string()),
                (TokenKind::ArgumentSeparator, ",".to_string()),
                (TokenKind::ExcelError, "#DIV/0!".to_string()),
                (TokenKind::ArgumentSeparator, ",".to_string()),
                (TokenKind::NameValue, "Rate".to_string()),
                (TokenKind::GroupEnd, ")".to_string()),
            ]
        );
    }

    #[test]
    fn test_arrays() {
        assert_eq!(
            tokens("{1,2;3,4}"),
            vec![
                (TokenKind::ArrayStart, "{".to_string()),
                (TokenKind::Number, "1".to_string()),
                (TokenKind::ArgumentSeparator, ",".to_string()),
                (TokenKind::Number, "2".to_string()),
                (TokenKind::ArgumentSeparator, ";".to_string()),
                (TokenKind::Number, "3".to_string()),
                (TokenKind::ArgumentSeparator, ",".to_string()),
                (TokenKind::Number, "4".to_string()),
                (TokenKind::ArrayEnd, "}".to_string()),
            ]
        );
    }

    #[test]
    fn test_intersection() {
        assert_eq!(
            tokens("A1:B2 B1:C3"),
            vec![
                (TokenKind::ExcelAddress, "A1:B2".to_string()),
                (TokenKind::Operator, " ".to_string()),
                (TokenKind::ExcelAddress, "B1:C3".to_string()),
            ]
        );
        assert_eq!(kinds("1 + 2").len(), 3);
    }

    #[test]
    fn test_unterminated_input() {
        let tokenizer = Tokenizer::default();
        let ctx = tokenizer.tokenize_context("\"abc");
        assert!(ctx.is_in_string());
        assert_eq!(
            ctx.last_token(),
            Some(&Token::new(TokenKind::ExcelError, "#VALUE!"))
        );

        let ctx = tokenizer.tokenize_context("SUM(1,2");
        assert_eq!(ctx.bracket_count(), 1);
        assert_eq!(ctx.last_token().map(|t| t.kind), Some(TokenKind::ExcelError));

        let ctx = tokenizer.tokenize_context("SUM((1),{2})");
        assert_eq!(ctx.bracket_count(), 0);
    }

    #[test]
    fn test_custom_separator() {
        let tokenizer = Tokenizer::new('|');
        let kinds: Vec<_> = tokenizer
            .tokenize("MAX(1|2)")
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(kinds[2], TokenKind::ArgumentSeparator);
    }

    #[test]
    fn test_context_editing() {
        let mut ctx = TokenizerContext::new("");
        ctx.add_token(Token::new(TokenKind::Operand, "SU"));
        ctx.append_to_last_token("M");
        ctx.set_last_token_type(TokenKind::NameValue);
        assert_eq!(ctx.last_token(), Some(&Token::new(TokenKind::NameValue, "SUM")));
        ctx.replace_last_token(Token::new(TokenKind::Number, "1"));
        assert_eq!(ctx.tokens().len(), 1);
        assert_eq!(ctx.tokens()[0].kind, TokenKind::Number);
    }
}
