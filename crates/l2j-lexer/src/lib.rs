//! Liquid Lexer
//!
//! Tokenizes Liquid template source into a stream of tokens: literal text
//! runs, `{{ }}` output tags, and `{% %}` statement tags, with
//! whitespace-control trim flags and line/column tracking.
//!
//! # Example
//!
//! ```
//! use l2j_lexer::Scanner;
//!
//! let tokens = Scanner::tokenize("").unwrap();
//! assert_eq!(tokens.len(), 1); // Just EOF
//! ```

pub mod scanner;
pub mod token;

pub use scanner::Scanner;
pub use token::{Span, Token, TokenKind, Trim};

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Lexer error at line {line}, column {column}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}
