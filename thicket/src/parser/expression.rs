use std::ops::Range;

use crate::expression::{
    BinaryOperator, BindingPath, Expression, Literal, PathRoot, UnaryOperator,
};
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    Text(String),
    True,
    False,
    Null,

    // Paths
    Ident(String),
    Dollar,
    Dot,

    // Operators
    Bang,     // !
    EqEq,     // ==
    BangEq,   // !=
    Gt,
    Lt,
    GtEq,
    LtEq,
    AmpAmp,   // &&
    PipePipe, // ||
    Minus,

    // Grouping
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Integer,
    Float,
    Text,
    True,
    False,
    Null,
    Ident,
    Dollar,
    Dot,
    Bang,
    EqEq,
    BangEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    AmpAmp,
    PipePipe,
    Minus,
    LParen,
    RParen,
    Comma,
}

fn token_kind(t: &Token) -> TokenKind {
    match t {
        Token::Integer(_) => TokenKind::Integer,
        Token::Float(_) => TokenKind::Float,
        Token::Text(_) => TokenKind::Text,
        Token::True => TokenKind::True,
        Token::False => TokenKind::False,
        Token::Null => TokenKind::Null,
        Token::Ident(_) => TokenKind::Ident,
        Token::Dollar => TokenKind::Dollar,
        Token::Dot => TokenKind::Dot,
        Token::Bang => TokenKind::Bang,
        Token::EqEq => TokenKind::EqEq,
        Token::BangEq => TokenKind::BangEq,
        Token::Gt => TokenKind::Gt,
        Token::Lt => TokenKind::Lt,
        Token::GtEq => TokenKind::GtEq,
        Token::LtEq => TokenKind::LtEq,
        Token::AmpAmp => TokenKind::AmpAmp,
        Token::PipePipe => TokenKind::PipePipe,
        Token::Minus => TokenKind::Minus,
        Token::LParen => TokenKind::LParen,
        Token::RParen => TokenKind::RParen,
        Token::Comma => TokenKind::Comma,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse the text of a value expression.
/// `span` is the owning tag's span and is used for every error.
pub fn parse_expression(
    text: &str,
    span: Range<usize>,
    file_id: usize,
) -> Result<Expression, ParseError> {
    let tokens = tokenize(text).map_err(|message| {
        ParseError::invalid_signature(message, span.clone(), file_id)
    })?;
    if tokens.is_empty() {
        return Err(ParseError::invalid_signature(
            "expected an expression",
            span,
            file_id,
        ));
    }

    let mut parser = ExprParser::new(tokens, span, file_id);
    let expression = parser.parse_expr(0)?;
    if !parser.at_end() {
        return Err(parser.error("unexpected tokens after expression"));
    }
    Ok(expression)
}

/// Whether `name` can be used as a variable name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }

            // String literal
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".into()),
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match chars.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some(&other) => other,
                                None => return Err("unterminated string literal".into()),
                            };
                            s.push(escaped);
                            i += 2;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Text(s));
            }

            // Numbers. After a dot only an integer segment is read, so
            // `items.0.1` stays a path rather than swallowing `0.1`.
            '0'..='9' => {
                let start = i;
                let after_dot = matches!(tokens.last(), Some(Token::Dot));
                while i < len && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let is_float = !after_dot
                    && i + 1 < len
                    && chars[i] == '.'
                    && chars[i + 1].is_ascii_digit();
                if is_float {
                    i += 1;
                    while i < len && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let num_str: String = chars[start..i].iter().collect();
                if is_float {
                    let n = num_str
                        .parse::<f64>()
                        .map_err(|_| format!("invalid number '{}'", num_str))?;
                    tokens.push(Token::Float(n));
                } else {
                    let n = num_str
                        .parse::<i64>()
                        .map_err(|_| format!("integer '{}' is out of range", num_str))?;
                    tokens.push(Token::Integer(n));
                }
            }

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                match ident.as_str() {
                    "true" => tokens.push(Token::True),
                    "false" => tokens.push(Token::False),
                    "null" => tokens.push(Token::Null),
                    _ => tokens.push(Token::Ident(ident)),
                }
            }

            '$' => {
                tokens.push(Token::Dollar);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }

            // Two-character operators
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::BangEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::GtEq);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::LtEq);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AmpAmp);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::PipePipe);
                i += 2;
            }

            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

const BP_OR: u8 = 1;
const BP_AND: u8 = 3;
const BP_EQUALITY: u8 = 5;
const BP_COMPARISON: u8 = 7;
const BP_UNARY: u8 = 9;

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    span: Range<usize>,
    file_id: usize,
}

impl ExprParser {
    fn new(tokens: Vec<Token>, span: Range<usize>, file_id: usize) -> Self {
        ExprParser {
            tokens,
            pos: 0,
            span,
            file_id,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(token_kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError::invalid_signature(msg, self.span.clone(), self.file_id)
    }

    fn expect_token_kind(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        match self.advance() {
            Some(t) if token_kind(&t) == kind => Ok(t),
            Some(t) => Err(self.error(format!(
                "expected {:?}, found {:?}",
                kind,
                token_kind(&t)
            ))),
            None => Err(self.error(format!("expected {:?}, found end of expression", kind))),
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expression, ParseError> {
        let mut left = self.parse_prefix()?;

        while let Some(kind) = self.peek_kind() {
            let Some((operator, left_bp, right_bp)) = infix_bp(kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.advance();
            let right = self.parse_expr(right_bp)?;
            left = Expression::BinaryOperation {
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression, ParseError> {
        let Some(token) = self.advance() else {
            return Err(self.error("unexpected end of expression"));
        };

        match token {
            Token::Integer(n) => Ok(Expression::Literal(Literal::Integer(n))),
            Token::Float(n) => Ok(Expression::Literal(Literal::Float(n))),
            Token::Text(s) => Ok(Expression::Literal(Literal::Text(s))),
            Token::True => Ok(Expression::Literal(Literal::Boolean(true))),
            Token::False => Ok(Expression::Literal(Literal::Boolean(false))),
            Token::Null => Ok(Expression::Literal(Literal::Null)),

            // Negative number literals
            Token::Minus => match self.advance() {
                Some(Token::Integer(n)) => Ok(Expression::Literal(Literal::Integer(-n))),
                Some(Token::Float(n)) => Ok(Expression::Literal(Literal::Float(-n))),
                _ => Err(self.error("'-' must be followed by a number")),
            },

            Token::Bang => {
                let operand = self.parse_expr(BP_UNARY)?;
                Ok(Expression::UnaryOperation {
                    operator: UnaryOperator::LogicalNot,
                    operand: Box::new(operand),
                })
            }

            Token::LParen => {
                let expr = self.parse_expr(0)?;
                self.expect_token_kind(TokenKind::RParen)?;
                Ok(expr)
            }

            Token::Dollar => {
                let segments = self.parse_segments()?;
                Ok(Expression::Path(BindingPath {
                    root: PathRoot::Model,
                    segments,
                }))
            }

            Token::Ident(name) => {
                if self.peek_kind() == Some(TokenKind::LParen) {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    return Ok(Expression::FunctionCall { name, arguments });
                }
                let mut segments = vec![name];
                segments.extend(self.parse_segments()?);
                Ok(Expression::Path(BindingPath {
                    root: PathRoot::Scope,
                    segments,
                }))
            }

            other => Err(self.error(format!("unexpected token: {:?}", token_kind(&other)))),
        }
    }

    /// Parse `.segment` repetitions following a path head.
    fn parse_segments(&mut self) -> Result<Vec<String>, ParseError> {
        let mut segments = Vec::new();
        while self.peek_kind() == Some(TokenKind::Dot) {
            self.advance();
            match self.advance() {
                Some(Token::Ident(name)) => segments.push(name),
                Some(Token::Integer(index)) => segments.push(index.to_string()),
                Some(Token::True) => segments.push("true".into()),
                Some(Token::False) => segments.push("false".into()),
                Some(Token::Null) => segments.push("null".into()),
                _ => return Err(self.error("expected a name after '.'")),
            }
        }
        if self.peek_kind() == Some(TokenKind::LParen) {
            return Err(self.error("only plain names can be called as functions"));
        }
        Ok(segments)
    }

    /// Parse comma-separated arguments after an opening parenthesis.
    fn parse_arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut arguments = Vec::new();
        if self.peek_kind() == Some(TokenKind::RParen) {
            self.advance();
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_expr(0)?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
        Ok(arguments)
    }
}

/// Infix binding powers: returns (operator, left_bp, right_bp) or None if not infix.
fn infix_bp(kind: TokenKind) -> Option<(BinaryOperator, u8, u8)> {
    let (operator, bp) = match kind {
        TokenKind::PipePipe => (BinaryOperator::LogicalOr, BP_OR),
        TokenKind::AmpAmp => (BinaryOperator::LogicalAnd, BP_AND),
        TokenKind::EqEq => (BinaryOperator::Equality, BP_EQUALITY),
        TokenKind::BangEq => (BinaryOperator::Inequality, BP_EQUALITY),
        TokenKind::Gt => (BinaryOperator::GreaterThan, BP_COMPARISON),
        TokenKind::Lt => (BinaryOperator::LessThan, BP_COMPARISON),
        TokenKind::GtEq => (BinaryOperator::GreaterThanOrEqual, BP_COMPARISON),
        TokenKind::LtEq => (BinaryOperator::LessThanOrEqual, BP_COMPARISON),
        _ => return None,
    };
    Some((operator, bp, bp + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Expression {
        parse_expression(text, 0..text.len(), 0).expect("parse failed")
    }

    fn path(segments: &[&str]) -> Expression {
        Expression::Path(BindingPath {
            root: PathRoot::Scope,
            segments: segments.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn dotted_path() {
        assert_eq!(parse("order.Lines.0.Price"), path(&["order", "Lines", "0", "Price"]));
    }

    #[test]
    fn model_root_path() {
        assert_eq!(
            parse("$.Title"),
            Expression::Path(BindingPath {
                root: PathRoot::Model,
                segments: vec!["Title".into()],
            })
        );
        assert_eq!(
            parse("$"),
            Expression::Path(BindingPath {
                root: PathRoot::Model,
                segments: Vec::new(),
            })
        );
    }

    #[test]
    fn literals() {
        assert_eq!(parse("42"), Expression::Literal(Literal::Integer(42)));
        assert_eq!(parse("-1.5"), Expression::Literal(Literal::Float(-1.5)));
        assert_eq!(parse("'hi'"), Expression::Literal(Literal::Text("hi".into())));
        assert_eq!(parse("\"a\\\"b\""), Expression::Literal(Literal::Text("a\"b".into())));
        assert_eq!(parse("null"), Expression::Literal(Literal::Null));
    }

    #[test]
    fn nested_function_calls() {
        assert_eq!(
            parse("Divide(Add(a, 1), 2)"),
            Expression::FunctionCall {
                name: "Divide".into(),
                arguments: vec![
                    Expression::FunctionCall {
                        name: "Add".into(),
                        arguments: vec![path(&["a"]), Expression::Literal(Literal::Integer(1))],
                    },
                    Expression::Literal(Literal::Integer(2)),
                ],
            }
        );
        assert_eq!(
            parse("Now()"),
            Expression::FunctionCall {
                name: "Now".into(),
                arguments: Vec::new(),
            }
        );
    }

    #[test]
    fn operator_precedence() {
        let expr = parse("a || b && c == 1");
        let Expression::BinaryOperation { operator, right, .. } = expr else {
            panic!("expected binary operation");
        };
        assert_eq!(operator, BinaryOperator::LogicalOr);
        let Expression::BinaryOperation { operator, .. } = *right else {
            panic!("expected nested binary operation");
        };
        assert_eq!(operator, BinaryOperator::LogicalAnd);
    }

    #[test]
    fn not_binds_tighter_than_equality() {
        let expr = parse("!a == b");
        assert!(matches!(
            expr,
            Expression::BinaryOperation {
                operator: BinaryOperator::Equality,
                ..
            }
        ));
    }

    #[test]
    fn errors_carry_tag_span() {
        let err = parse_expression("a +", 10..20, 0).unwrap_err();
        assert_eq!(err.span, 10..20);
        let err = parse_expression("Add(1, 2", 5..9, 0).unwrap_err();
        assert_eq!(err.offset(), 5);
        assert!(parse_expression("a.b(1)", 0..6, 0).is_err());
        assert!(parse_expression("'open", 0..5, 0).is_err());
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("item_1"));
        assert!(!is_identifier("1item"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }
}
