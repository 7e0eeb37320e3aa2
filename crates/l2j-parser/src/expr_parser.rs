//! Expression parser for Liquid tag bodies.
//!
//! Parses expression token streams (from `expr_lexer`) into `Expression`
//! AST nodes using recursive descent. Precedence, low to high: `or`, `and`,
//! comparison (`== != < > <= >= contains`), unary `not`, primary, and a
//! postfix filter chain binding tightest.
//!
//! Also hosts the small header grammars built on the same token stream:
//! `assign name = expr`, `for x in coll [reversed] [limit: n] [offset: n]`,
//! and `when` value lists.

use crate::ast::{Accessor, BinaryOp, ExprKind, ExprSpan, Expression, FilterCall};
use crate::expr_lexer::{ExprLexer, Token, TokenKind, TokenValue};

/// Expression parse error, with a character offset relative to the parsed
/// body. The block parser maps it back to an absolute source position.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprError {
    pub message: String,
    pub offset: usize,
}

impl std::fmt::Display for ExprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Expression error at position {}: {}",
            self.offset, self.message
        )
    }
}

impl std::error::Error for ExprError {}

/// Parsed `for` tag header.
#[derive(Debug, Clone, PartialEq)]
pub struct ForHead {
    pub binding: String,
    pub iterable: Expression,
    pub reversed: bool,
    pub limit: Option<Expression>,
    pub offset: Option<Expression>,
}

/// Liquid expression parser.
pub struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    /// Create a new expression parser for the given tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parse a complete expression from a tag body.
    pub fn parse(source: &str) -> Result<Expression, ExprError> {
        let mut parser = Self::from_source(source)?;
        let expr = parser.parse_expression()?;
        parser.expect_eof()?;
        Ok(expr)
    }

    /// Parse an `assign` header: `name = expr`.
    pub fn parse_assign(source: &str) -> Result<(String, Expression), ExprError> {
        let mut parser = Self::from_source(source)?;
        let name = parser.expect_identifier("Expected variable name")?;
        parser.expect(TokenKind::Eq, "Expected '=' after variable name")?;
        let value = parser.parse_expression()?;
        parser.expect_eof()?;
        Ok((name, value))
    }

    /// Parse a `for` header: `x in coll` plus optional `reversed`,
    /// `limit: n`, `offset: n` modifiers in any order.
    pub fn parse_for_head(source: &str) -> Result<ForHead, ExprError> {
        let mut parser = Self::from_source(source)?;
        let binding = parser.expect_identifier("Expected loop variable name")?;
        parser.expect(TokenKind::In, "Expected 'in' after loop variable")?;
        let iterable = parser.parse_expression()?;

        let mut head = ForHead {
            binding,
            iterable,
            reversed: false,
            limit: None,
            offset: None,
        };

        while let Some(word) = parser.peek_identifier().map(str::to_owned) {
            match word.as_str() {
                "reversed" => {
                    parser.advance();
                    head.reversed = true;
                }
                "limit" => {
                    parser.advance();
                    parser.expect(TokenKind::Colon, "Expected ':' after 'limit'")?;
                    head.limit = Some(parser.parse_primary()?);
                }
                "offset" => {
                    parser.advance();
                    parser.expect(TokenKind::Colon, "Expected ':' after 'offset'")?;
                    head.offset = Some(parser.parse_primary()?);
                }
                _ => break,
            }
        }

        parser.expect_eof()?;
        Ok(head)
    }

    /// Parse a `when` header: one or more match values separated by commas
    /// or `or`.
    pub fn parse_when_values(source: &str) -> Result<Vec<Expression>, ExprError> {
        let mut parser = Self::from_source(source)?;
        let mut values = vec![parser.parse_primary()?];
        while matches!(parser.peek_kind(), TokenKind::Comma | TokenKind::Or) {
            parser.advance();
            values.push(parser.parse_primary()?);
        }
        parser.expect_eof()?;
        Ok(values)
    }

    fn from_source(source: &str) -> Result<Self, ExprError> {
        let tokens = ExprLexer::tokenize(source).map_err(|e| ExprError {
            message: e.message,
            offset: e.span.start,
        })?;
        Ok(Self::new(tokens))
    }

    // --- Grammar, low to high precedence ---

    fn parse_expression(&mut self) -> Result<Expression, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ExprError> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ExprError> {
        let mut left = self.parse_comparison()?;
        while self.peek_kind() == TokenKind::And {
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    /// Comparisons do not chain: `a == b == c` is a malformed operator
    /// sequence, reported rather than silently reassociated.
    fn parse_comparison(&mut self) -> Result<Expression, ExprError> {
        let left = self.parse_unary()?;
        let Some(op) = comparison_op(self.peek_kind()) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_unary()?;

        if comparison_op(self.peek_kind()).is_some() {
            return Err(self.error_here("Malformed operator sequence: comparisons do not chain"));
        }
        Ok(binary(op, left, right))
    }

    fn parse_unary(&mut self) -> Result<Expression, ExprError> {
        if self.peek_kind() == TokenKind::Not {
            let start = self.peek().span.start;
            self.advance();
            let operand = self.parse_unary()?;
            let end = operand.span.end;
            return Ok(Expression {
                kind: ExprKind::Not(Box::new(operand)),
                span: ExprSpan::new(start, end),
            });
        }
        self.parse_postfix()
    }

    /// A primary followed by a filter chain: `base | f1 | f2: a, b`.
    /// Chains flatten into one ordered list, even when the base is a
    /// parenthesized chain itself.
    fn parse_postfix(&mut self) -> Result<Expression, ExprError> {
        let expr = self.parse_primary()?;
        if self.peek_kind() != TokenKind::Pipe {
            return Ok(expr);
        }

        let start = expr.span.start;
        let mut filters = Vec::new();
        while self.peek_kind() == TokenKind::Pipe {
            self.advance();
            let name = self.expect_identifier("Expected filter name after '|'")?;
            let mut args = Vec::new();
            if self.peek_kind() == TokenKind::Colon {
                self.advance();
                loop {
                    args.push(self.parse_primary()?);
                    if self.peek_kind() != TokenKind::Comma {
                        break;
                    }
                    self.advance();
                }
            }
            filters.push(FilterCall { name, args });
        }

        let end = self.previous_end();
        let kind = match expr.kind {
            ExprKind::FilterChain {
                base,
                filters: mut existing,
            } => {
                existing.extend(filters);
                ExprKind::FilterChain {
                    base,
                    filters: existing,
                }
            }
            _ => ExprKind::FilterChain {
                base: Box::new(expr),
                filters,
            },
        };
        Ok(Expression {
            kind,
            span: ExprSpan::new(start, end),
        })
    }

    fn parse_primary(&mut self) -> Result<Expression, ExprError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let TokenValue::Number(n) = token.value else {
                    unreachable!("number token without number value")
                };
                Ok(Expression {
                    kind: ExprKind::Number(n),
                    span: token.span,
                })
            }
            TokenKind::Str => {
                self.advance();
                let TokenValue::Str(s) = token.value else {
                    unreachable!("string token without string value")
                };
                Ok(Expression {
                    kind: ExprKind::Str(s),
                    span: token.span,
                })
            }
            TokenKind::Boolean => {
                self.advance();
                let TokenValue::Boolean(b) = token.value else {
                    unreachable!("boolean token without boolean value")
                };
                Ok(Expression {
                    kind: ExprKind::Bool(b),
                    span: token.span,
                })
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expression {
                    kind: ExprKind::Nil,
                    span: token.span,
                })
            }
            TokenKind::Empty => {
                self.advance();
                Ok(Expression {
                    kind: ExprKind::Empty,
                    span: token.span,
                })
            }
            TokenKind::Identifier => {
                self.advance();
                let TokenValue::Identifier(name) = token.value else {
                    unreachable!("identifier token without identifier value")
                };
                self.parse_path(name, token.span.start)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                if self.peek_kind() == TokenKind::DotDot {
                    self.advance();
                    let to = self.parse_expression()?;
                    let close =
                        self.expect(TokenKind::RParen, "Expected ')' to close range")?;
                    return Ok(Expression {
                        kind: ExprKind::Range {
                            from: Box::new(inner),
                            to: Box::new(to),
                        },
                        span: ExprSpan::new(token.span.start, close.span.end),
                    });
                }
                self.expect(TokenKind::RParen, "Expected ')'")?;
                Ok(inner)
            }
            _ => Err(self.error_here("Expected expression")),
        }
    }

    /// Continue a variable path: `.key` and `[index]` accessors normalize
    /// to one accessor list.
    fn parse_path(&mut self, first: String, start: usize) -> Result<Expression, ExprError> {
        let mut accessors = vec![Accessor::Key(first)];
        let mut end = self.previous_end();

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let key = self.expect_identifier("Expected property name after '.'")?;
                    accessors.push(Accessor::Key(key));
                    end = self.previous_end();
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.peek().clone();
                    match index.value {
                        TokenValue::Str(s) => {
                            self.advance();
                            accessors.push(Accessor::Key(s));
                        }
                        TokenValue::Number(n) => {
                            self.advance();
                            if n.fract() != 0.0 {
                                return Err(ExprError {
                                    message: "Subscript must be an integer or string".into(),
                                    offset: index.span.start,
                                });
                            }
                            accessors.push(Accessor::Index(n as i64));
                        }
                        _ => {
                            return Err(self
                                .error_here("Expected string or integer subscript"));
                        }
                    }
                    let close =
                        self.expect(TokenKind::RBracket, "Expected ']' after subscript")?;
                    end = close.span.end;
                }
                _ => break,
            }
        }

        Ok(Expression {
            kind: ExprKind::Var(accessors),
            span: ExprSpan::new(start, end),
        })
    }

    // --- Token helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_identifier(&self) -> Option<&str> {
        match &self.tokens[self.pos].value {
            TokenValue::Identifier(name) if self.peek_kind() == TokenKind::Identifier => {
                Some(name)
            }
            _ => None,
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.peek_kind() != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn previous_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ExprError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<String, ExprError> {
        let token = self.peek().clone();
        match token.value {
            TokenValue::Identifier(name) if token.kind == TokenKind::Identifier => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn expect_eof(&mut self) -> Result<(), ExprError> {
        if self.peek_kind() == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error_here("Unexpected trailing input"))
        }
    }

    fn error_here(&self, message: &str) -> ExprError {
        ExprError {
            message: message.into(),
            offset: self.peek().span.start,
        }
    }
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    let span = ExprSpan::new(left.span.start, right.span.end);
    Expression {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    }
}

fn comparison_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::EqEq => Some(BinaryOp::Eq),
        TokenKind::NotEq => Some(BinaryOp::NotEq),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Lte => Some(BinaryOp::Lte),
        TokenKind::Gte => Some(BinaryOp::Gte),
        TokenKind::Contains => Some(BinaryOp::Contains),
        _ => None,
    }
}
