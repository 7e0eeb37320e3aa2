//! Liquid Parser
//!
//! Parses a token stream into an Abstract Syntax Tree.
//! Includes the block parser (for tag structure: `if`, `for`, `case`, …)
//! and the expression parser (for tag bodies like `x == empty` and
//! `products | split: ','`).
//!
//! Fatal problems (malformed expressions, unbalanced blocks) surface as
//! `ParseError`; unsupported-but-well-formed constructs are collected as
//! `Diagnostic`s so one pass reports every occurrence.

pub mod ast;
pub mod expr_lexer;
pub mod expr_parser;
pub mod parser;

pub use ast::{Document, Expression, Node};
pub use parser::{ParseOutput, Parser};

/// Parser error with position information. Fatal: the pipeline stops here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// What made the parse fail. Mapped onto diagnostic kinds by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed delimiters (unterminated tag).
    Lex,
    /// Malformed expression or tag header.
    Syntax,
    /// Mismatched or missing open/close tags, or a clause tag outside its
    /// owning block.
    UnbalancedBlock,
}

/// A structured problem report from any pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Diagnostic classification.
///
/// `Lex`, `Parse` and `UnbalancedBlock` are fatal: no coherent tree exists
/// to continue from. `UnsupportedConstruct` and `UnknownFilter` are
/// collected across the whole input before the conversion is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lex,
    Parse,
    UnbalancedBlock,
    UnsupportedConstruct,
    UnknownFilter,
}

impl DiagnosticKind {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::Lex | DiagnosticKind::Parse | DiagnosticKind::UnbalancedBlock
        )
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DiagnosticKind::Lex => "lex error",
            DiagnosticKind::Parse => "parse error",
            DiagnosticKind::UnbalancedBlock => "unbalanced block",
            DiagnosticKind::UnsupportedConstruct => "unsupported construct",
            DiagnosticKind::UnknownFilter => "unknown filter",
        };
        f.write_str(label)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at line {}, column {}: {}",
            self.kind, self.line, self.column, self.message
        )
    }
}
