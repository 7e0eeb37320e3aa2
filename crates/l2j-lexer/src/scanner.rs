use crate::token::{Span, Token, TokenKind, Trim};
use crate::LexerError;

/// Liquid source scanner.
///
/// Splits raw template source into literal text runs, `{{ }}` output tags,
/// and `{% %}` statement tags. The whitespace-control forms (`{{- -}}`,
/// `{%- -%}`) produce the same token kinds with trim flags set.
///
/// Tag bodies are captured raw; quoted strings inside a tag may contain the
/// closing delimiter without ending the tag. Position tracking on every
/// token, with byte offsets so callers can slice the original source.
pub struct Scanner<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    byte: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            byte: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source into a vector of tokens.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
        let mut scanner = Scanner::new(source);
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }

    /// Scan all tokens from the source.
    fn scan_tokens(&mut self) -> Result<(), LexerError> {
        while !self.is_at_end() {
            if self.peek() == '{' && self.peek_next() == '{' {
                self.scan_tag_like('}')?;
            } else if self.peek() == '{' && self.peek_next() == '%' {
                self.scan_tag_like('%')?;
            } else {
                self.scan_text();
            }
        }

        let span = Span::new(self.byte, self.byte, self.line, self.column);
        self.tokens.push(Token::new(TokenKind::Eof, span));
        Ok(())
    }

    // --- Scanners ---

    /// Scan a run of literal text up to the next `{{`/`{%` or end of input.
    /// A lone `{` is ordinary text.
    fn scan_text(&mut self) {
        let start_byte = self.byte;
        let start_line = self.line;
        let start_col = self.column;

        let mut text = String::new();
        while !self.is_at_end() {
            if self.peek() == '{' && (self.peek_next() == '{' || self.peek_next() == '%') {
                break;
            }
            text.push(self.peek());
            self.advance();
        }

        let span = Span::new(start_byte, self.byte, start_line, start_col);
        self.tokens.push(Token::new(TokenKind::Text(text), span));
    }

    /// Scan an output (`close == '}'`) or statement (`close == '%'`) tag.
    /// The closing delimiter is `close` followed by `}`, optionally preceded
    /// by a `-` trim marker. Quoted strings inside the body are skipped
    /// whole, so a `%}` or `}}` inside quotes does not close the tag.
    fn scan_tag_like(&mut self, close: char) -> Result<(), LexerError> {
        let start_byte = self.byte;
        let start_line = self.line;
        let start_col = self.column;

        self.advance(); // consume `{`
        self.advance(); // consume `{` or `%`

        let mut trim = Trim::default();
        if self.peek() == '-' {
            trim.left = true;
            self.advance();
        }

        let mut body = String::new();
        loop {
            if self.is_at_end() {
                return Err(LexerError {
                    message: if close == '}' {
                        "Unterminated output tag".into()
                    } else {
                        "Unterminated statement tag".into()
                    },
                    line: start_line,
                    column: start_col,
                });
            }

            let ch = self.peek();

            if ch == '\'' || ch == '"' {
                body.push(ch);
                self.advance();
                while !self.is_at_end() && self.peek() != ch {
                    body.push(self.peek());
                    self.advance();
                }
                if self.is_at_end() {
                    return Err(LexerError {
                        message: "Unterminated string in tag".into(),
                        line: start_line,
                        column: start_col,
                    });
                }
                body.push(ch);
                self.advance(); // consume closing quote
                continue;
            }

            if ch == '-' && self.peek_at(1) == close && self.peek_at(2) == '}' {
                trim.right = true;
                self.advance();
                self.advance();
                self.advance();
                break;
            }

            if ch == close && self.peek_at(1) == '}' {
                self.advance();
                self.advance();
                break;
            }

            body.push(ch);
            self.advance();
        }

        let body = body.trim().to_string();
        let span = Span::new(start_byte, self.byte, start_line, start_col);
        let kind = if close == '}' {
            TokenKind::Output { body, trim }
        } else {
            TokenKind::Tag { body, trim }
        };
        self.tokens.push(Token::new(kind, span));
        Ok(())
    }

    // --- Helpers ---

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.chars[self.pos]
        }
    }

    fn peek_next(&self) -> char {
        self.peek_at(1)
    }

    fn peek_at(&self, offset: usize) -> char {
        if self.pos + offset >= self.chars.len() {
            '\0'
        } else {
            self.chars[self.pos + offset]
        }
    }

    fn advance(&mut self) {
        if self.is_at_end() {
            return;
        }
        let ch = self.chars[self.pos];
        self.pos += 1;
        self.byte += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// The raw source this scanner was created over.
    pub fn source(&self) -> &'a str {
        self.source
    }
}
