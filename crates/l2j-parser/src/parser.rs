//! Block parser for Liquid templates.
//!
//! Folds the scanner's token stream into a `Document` AST using an explicit
//! stack of open-block frames rather than bare recursion, so unbalanced
//! blocks reduce to a stack check and memory stays bounded on adversarial
//! nesting. Tag bodies are delegated to `expr_parser`.
//!
//! Unknown tag names are collected as `UnsupportedConstruct` diagnostics and
//! skipped, so one parse reports every occurrence; structural problems
//! (mismatched closers, clause tags outside their owning block, open blocks
//! at EOF) are fatal `ParseError`s.

use crate::ast::{Document, Expression, IfArm, Node, WhenArm};
use crate::expr_parser::{ExprError, ExprParser, ForHead};
use crate::{Diagnostic, DiagnosticKind, ParseError, ParseErrorKind};
use l2j_lexer::{Scanner, Span, Token, TokenKind};

/// Cap on open-block depth. Bounds the code generator's recursion on
/// pathologically nested input.
pub const MAX_NESTING: usize = 64;

/// The result of a successful parse: the tree plus any non-fatal
/// diagnostics (unsupported constructs) collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

/// One open block on the parse stack.
struct OpenBlock {
    frame: Frame,
    /// Nodes of the clause currently being filled.
    children: Vec<Node>,
}

enum Frame {
    If {
        span: Span,
        arms: Vec<IfArm>,
        /// Condition and tag span of the arm in progress; `None` once the
        /// `else` clause has started.
        current: Option<(Expression, Span)>,
    },
    Unless {
        span: Span,
        condition: Expression,
        /// Main body, stashed once `else` is seen.
        main_body: Option<Vec<Node>>,
    },
    Case {
        span: Span,
        subject: Expression,
        whens: Vec<WhenArm>,
        /// Values of the `when` arm in progress.
        pending: Option<Vec<Expression>>,
        in_else: bool,
    },
    For {
        span: Span,
        head: ForHead,
        /// Main body, stashed once `else` is seen.
        main_body: Option<Vec<Node>>,
    },
    Capture {
        span: Span,
        name: String,
    },
    Comment {
        span: Span,
        body: String,
    },
}

impl Frame {
    fn tag_name(&self) -> &'static str {
        match self {
            Frame::If { .. } => "if",
            Frame::Unless { .. } => "unless",
            Frame::Case { .. } => "case",
            Frame::For { .. } => "for",
            Frame::Capture { .. } => "capture",
            Frame::Comment { .. } => "comment",
        }
    }

    fn closer(&self) -> &'static str {
        match self {
            Frame::If { .. } => "endif",
            Frame::Unless { .. } => "endunless",
            Frame::Case { .. } => "endcase",
            Frame::For { .. } => "endfor",
            Frame::Capture { .. } => "endcapture",
            Frame::Comment { .. } => "endcomment",
        }
    }

    fn span(&self) -> Span {
        match self {
            Frame::If { span, .. }
            | Frame::Unless { span, .. }
            | Frame::Case { span, .. }
            | Frame::For { span, .. }
            | Frame::Capture { span, .. }
            | Frame::Comment { span, .. } => *span,
        }
    }
}

/// Liquid block parser.
pub struct Parser<'a> {
    source: &'a str,
    root: Vec<Node>,
    stack: Vec<OpenBlock>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    /// Parse source code into a document AST.
    pub fn parse(source: &'a str) -> Result<ParseOutput, ParseError> {
        let mut tokens = Scanner::tokenize(source).map_err(|e| ParseError {
            kind: ParseErrorKind::Lex,
            message: e.message,
            line: e.line,
            column: e.column,
        })?;
        apply_trims(&mut tokens);

        let mut parser = Parser {
            source,
            root: Vec::new(),
            stack: Vec::new(),
            diagnostics: Vec::new(),
        };

        for token in tokens {
            parser.consume(token)?;
        }

        if let Some(open) = parser.stack.last() {
            let span = open.frame.span();
            return Err(ParseError {
                kind: ParseErrorKind::UnbalancedBlock,
                message: format!(
                    "Unclosed '{}' block; expected '{}'",
                    open.frame.tag_name(),
                    open.frame.closer()
                ),
                line: span.line,
                column: span.column,
            });
        }

        Ok(ParseOutput {
            document: Document { nodes: parser.root },
            diagnostics: parser.diagnostics,
        })
    }

    fn consume(&mut self, token: Token) -> Result<(), ParseError> {
        // Comment blocks swallow everything raw until their closer; their
        // contents never reach the expression parser.
        if matches!(
            self.stack.last(),
            Some(OpenBlock {
                frame: Frame::Comment { .. },
                ..
            })
        ) {
            return self.consume_in_comment(token);
        }

        match token.kind {
            TokenKind::Text(text) => {
                if !text.is_empty() {
                    self.attach(Node::Text(text));
                }
                Ok(())
            }
            TokenKind::Output { body, .. } => {
                let expr = self.parse_expr_at(&body, token.span, 0)?;
                self.attach(Node::Output {
                    expr,
                    span: token.span,
                });
                Ok(())
            }
            TokenKind::Tag { body, .. } => self.consume_tag(&body, token.span),
            TokenKind::Eof => Ok(()),
        }
    }

    fn consume_in_comment(&mut self, token: Token) -> Result<(), ParseError> {
        if let TokenKind::Tag { body, .. } = &token.kind {
            if split_tag(body).0 == "endcomment" {
                let Some(OpenBlock {
                    frame: Frame::Comment { body, .. },
                    ..
                }) = self.stack.pop()
                else {
                    unreachable!("comment mode without comment frame");
                };
                self.attach(Node::Comment(body));
                return Ok(());
            }
        }
        if token.kind == TokenKind::Eof {
            return Ok(());
        }

        let source = self.source;
        let raw = &source[token.span.start..token.span.end];
        let Some(OpenBlock {
            frame: Frame::Comment { body, .. },
            ..
        }) = self.stack.last_mut()
        else {
            unreachable!("comment mode without comment frame");
        };
        body.push_str(raw);
        Ok(())
    }

    fn consume_tag(&mut self, body: &str, span: Span) -> Result<(), ParseError> {
        let (name, rest, rest_offset) = split_tag(body);

        match name {
            "" => Err(ParseError {
                kind: ParseErrorKind::Syntax,
                message: "Empty statement tag".into(),
                line: span.line,
                column: span.column,
            }),

            // --- Block openers ---
            "if" => {
                let condition = self.parse_expr_at(rest, span, rest_offset)?;
                self.push(
                    Frame::If {
                        span,
                        arms: Vec::new(),
                        current: Some((condition, span)),
                    },
                    span,
                )
            }
            "unless" => {
                let condition = self.parse_expr_at(rest, span, rest_offset)?;
                self.push(
                    Frame::Unless {
                        span,
                        condition,
                        main_body: None,
                    },
                    span,
                )
            }
            "case" => {
                let subject = self.parse_expr_at(rest, span, rest_offset)?;
                self.push(
                    Frame::Case {
                        span,
                        subject,
                        whens: Vec::new(),
                        pending: None,
                        in_else: false,
                    },
                    span,
                )
            }
            "for" => {
                let head = ExprParser::parse_for_head(rest)
                    .map_err(|e| self.expr_error(e, span, rest_offset))?;
                self.push(
                    Frame::For {
                        span,
                        head,
                        main_body: None,
                    },
                    span,
                )
            }
            "capture" => {
                if !is_identifier(rest) {
                    return Err(ParseError {
                        kind: ParseErrorKind::Syntax,
                        message: "Expected variable name after 'capture'".into(),
                        line: span.line,
                        column: span.column,
                    });
                }
                self.push(
                    Frame::Capture {
                        span,
                        name: rest.to_string(),
                    },
                    span,
                )
            }
            "comment" => self.push(
                Frame::Comment {
                    span,
                    body: String::new(),
                },
                span,
            ),

            // --- Leaf tags ---
            "assign" => {
                let (var, value) = ExprParser::parse_assign(rest)
                    .map_err(|e| self.expr_error(e, span, rest_offset))?;
                self.attach(Node::Assign {
                    name: var,
                    value,
                    span,
                });
                Ok(())
            }

            // --- Clause tags ---
            "elsif" => self.clause_elsif(rest, span, rest_offset),
            "else" => self.clause_else(span),
            "when" => self.clause_when(rest, span, rest_offset),

            // --- Closers ---
            "endif" | "endunless" | "endcase" | "endfor" | "endcapture" | "endcomment" => {
                self.close(name, span)
            }

            _ => {
                self.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::UnsupportedConstruct,
                    message: format!("Unsupported tag '{name}'"),
                    line: span.line,
                    column: span.column,
                });
                Ok(())
            }
        }
    }

    // --- Clause handling ---

    fn clause_elsif(&mut self, rest: &str, span: Span, rest_offset: usize) -> Result<(), ParseError> {
        let condition = self.parse_expr_at(rest, span, rest_offset)?;
        match self.stack.last_mut() {
            Some(OpenBlock {
                frame: Frame::If { arms, current, .. },
                children,
            }) => match current.take() {
                Some((prev_cond, prev_span)) => {
                    arms.push(IfArm {
                        condition: prev_cond,
                        body: std::mem::take(children),
                        span: prev_span,
                    });
                    *current = Some((condition, span));
                    Ok(())
                }
                None => Err(unbalanced(span, "'elsif' after 'else'")),
            },
            _ => Err(unbalanced(span, "'elsif' outside of an 'if' block")),
        }
    }

    fn clause_else(&mut self, span: Span) -> Result<(), ParseError> {
        match self.stack.last_mut() {
            Some(OpenBlock {
                frame: Frame::If { arms, current, .. },
                children,
            }) => match current.take() {
                Some((cond, arm_span)) => {
                    arms.push(IfArm {
                        condition: cond,
                        body: std::mem::take(children),
                        span: arm_span,
                    });
                    Ok(())
                }
                None => Err(unbalanced(span, "Duplicate 'else' in 'if' block")),
            },
            Some(OpenBlock {
                frame: Frame::Unless { main_body, .. },
                children,
            }) => {
                if main_body.is_some() {
                    return Err(unbalanced(span, "Duplicate 'else' in 'unless' block"));
                }
                *main_body = Some(std::mem::take(children));
                Ok(())
            }
            Some(OpenBlock {
                frame:
                    Frame::Case {
                        whens,
                        pending,
                        in_else,
                        ..
                    },
                children,
            }) => {
                if *in_else {
                    return Err(unbalanced(span, "Duplicate 'else' in 'case' block"));
                }
                let body = std::mem::take(children);
                if let Some(values) = pending.take() {
                    whens.push(WhenArm { values, body });
                }
                *in_else = true;
                Ok(())
            }
            Some(OpenBlock {
                frame: Frame::For { main_body, .. },
                children,
            }) => {
                if main_body.is_some() {
                    return Err(unbalanced(span, "Duplicate 'else' in 'for' block"));
                }
                *main_body = Some(std::mem::take(children));
                Ok(())
            }
            _ => Err(unbalanced(span, "'else' outside of a block")),
        }
    }

    fn clause_when(&mut self, rest: &str, span: Span, rest_offset: usize) -> Result<(), ParseError> {
        let values = ExprParser::parse_when_values(rest)
            .map_err(|e| self.expr_error(e, span, rest_offset))?;
        match self.stack.last_mut() {
            Some(OpenBlock {
                frame:
                    Frame::Case {
                        whens,
                        pending,
                        in_else,
                        ..
                    },
                children,
            }) => {
                if *in_else {
                    return Err(unbalanced(span, "'when' after 'else'"));
                }
                let body = std::mem::take(children);
                if let Some(prev) = pending.take() {
                    whens.push(WhenArm { values: prev, body });
                }
                // Content between `case` and the first `when` never renders
                // in Liquid; it is dropped here.
                *pending = Some(values);
                Ok(())
            }
            _ => Err(unbalanced(span, "'when' outside of a 'case' block")),
        }
    }

    // --- Block closing ---

    fn close(&mut self, closer: &str, span: Span) -> Result<(), ParseError> {
        let Some(open) = self.stack.pop() else {
            return Err(unbalanced(
                span,
                &format!("'{closer}' with no open block"),
            ));
        };
        if open.frame.closer() != closer {
            return Err(unbalanced(
                span,
                &format!(
                    "'{closer}' does not close the open '{}' block (line {})",
                    open.frame.tag_name(),
                    open.frame.span().line
                ),
            ));
        }

        let children = open.children;
        let node = match open.frame {
            Frame::If {
                span,
                mut arms,
                current,
            } => {
                let else_body = match current {
                    Some((cond, arm_span)) => {
                        arms.push(IfArm {
                            condition: cond,
                            body: children,
                            span: arm_span,
                        });
                        None
                    }
                    None => Some(children),
                };
                Node::If {
                    arms,
                    else_body,
                    span,
                }
            }
            Frame::Unless {
                span,
                condition,
                main_body,
            } => match main_body {
                Some(body) => Node::Unless {
                    condition,
                    body,
                    else_body: Some(children),
                    span,
                },
                None => Node::Unless {
                    condition,
                    body: children,
                    else_body: None,
                    span,
                },
            },
            Frame::Case {
                span,
                subject,
                mut whens,
                pending,
                in_else,
            } => {
                let else_body = if in_else {
                    Some(children)
                } else {
                    if let Some(values) = pending {
                        whens.push(WhenArm {
                            values,
                            body: children,
                        });
                    }
                    None
                };
                Node::Case {
                    subject,
                    whens,
                    else_body,
                    span,
                }
            }
            Frame::For {
                span,
                head,
                main_body,
            } => {
                let (body, else_body) = match main_body {
                    Some(main) => (main, Some(children)),
                    None => (children, None),
                };
                Node::For {
                    binding: head.binding,
                    iterable: head.iterable,
                    reversed: head.reversed,
                    limit: head.limit,
                    offset: head.offset,
                    body,
                    else_body,
                    span,
                }
            }
            Frame::Capture { span, name } => Node::Capture {
                name,
                body: children,
                span,
            },
            Frame::Comment { .. } => unreachable!("comment frames close in comment mode"),
        };

        self.attach(node);
        Ok(())
    }

    // --- Helpers ---

    fn push(&mut self, frame: Frame, span: Span) -> Result<(), ParseError> {
        if self.stack.len() >= MAX_NESTING {
            return Err(ParseError {
                kind: ParseErrorKind::Syntax,
                message: format!("Blocks nested deeper than the limit of {MAX_NESTING}"),
                line: span.line,
                column: span.column,
            });
        }
        self.stack.push(OpenBlock {
            frame,
            children: Vec::new(),
        });
        Ok(())
    }

    fn attach(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(top) => top.children.push(node),
            None => self.root.push(node),
        }
    }

    fn parse_expr_at(
        &self,
        body: &str,
        span: Span,
        base_offset: usize,
    ) -> Result<Expression, ParseError> {
        ExprParser::parse(body).map_err(|e| self.expr_error(e, span, base_offset))
    }

    fn expr_error(&self, e: ExprError, span: Span, base_offset: usize) -> ParseError {
        let (line, column) = position_in_tag(self.source, span, base_offset + e.offset);
        ParseError {
            kind: ParseErrorKind::Syntax,
            message: e.message,
            line,
            column,
        }
    }
}

fn unbalanced(span: Span, message: &str) -> ParseError {
    ParseError {
        kind: ParseErrorKind::UnbalancedBlock,
        message: message.into(),
        line: span.line,
        column: span.column,
    }
}

/// Split a tag body into its name, the remainder, and the remainder's char
/// offset within the body (for error position mapping).
fn split_tag(body: &str) -> (&str, &str, usize) {
    let name_end = body
        .find(char::is_whitespace)
        .unwrap_or(body.len());
    let name = &body[..name_end];
    let after = &body[name_end..];
    let ws_len = after.len() - after.trim_start().len();
    let rest = &after[ws_len..];
    let rest_offset = body[..name_end + ws_len].chars().count();
    (name, rest, rest_offset)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Map a char offset inside a tag's trimmed body back to an absolute
/// line/column, walking from the tag's opening delimiter.
fn position_in_tag(source: &str, span: Span, offset: usize) -> (usize, usize) {
    let end = span.end.min(source.len());
    let raw = &source[span.start..end];

    let mut line = span.line;
    let mut column = span.column;
    let mut bump = |ch: char, line: &mut usize, column: &mut usize| {
        if ch == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    };

    let mut chars = raw.chars();
    for _ in 0..2 {
        if let Some(ch) = chars.next() {
            bump(ch, &mut line, &mut column);
        }
    }
    let mut rest = chars.as_str();
    if let Some(stripped) = rest.strip_prefix('-') {
        rest = stripped;
        column += 1;
    }

    let ws_len = rest.len() - rest.trim_start().len();
    for ch in rest[..ws_len].chars() {
        bump(ch, &mut line, &mut column);
    }
    for ch in rest[ws_len..].chars().take(offset) {
        bump(ch, &mut line, &mut column);
    }

    (line, column)
}

/// Apply whitespace-control trim flags to the token stream: `left` strips
/// the preceding text's trailing spaces/tabs plus at most one newline,
/// `right` does the same to the following text's lead.
fn apply_trims(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        let trim = match &tokens[i].kind {
            TokenKind::Output { trim, .. } | TokenKind::Tag { trim, .. } => *trim,
            _ => continue,
        };
        if trim.left && i > 0 {
            if let TokenKind::Text(text) = &mut tokens[i - 1].kind {
                trim_text_end(text);
            }
        }
        if trim.right && i + 1 < tokens.len() {
            if let TokenKind::Text(text) = &mut tokens[i + 1].kind {
                trim_text_start(text);
            }
        }
    }
}

fn trim_text_end(text: &mut String) {
    while text.ends_with(' ') || text.ends_with('\t') {
        text.pop();
    }
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
}

fn trim_text_start(text: &mut String) {
    let bytes = text.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() && (bytes[idx] == b' ' || bytes[idx] == b'\t') {
        idx += 1;
    }
    if idx + 1 < bytes.len() && bytes[idx] == b'\r' && bytes[idx + 1] == b'\n' {
        idx += 2;
    } else if idx < bytes.len() && bytes[idx] == b'\n' {
        idx += 1;
    }
    text.drain(..idx);
}
