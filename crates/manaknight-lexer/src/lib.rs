//! Manaknight Lexer - tokenization using logos
//!
//! Lexical errors do not halt the stream: each one becomes an error
//! token plus a `LexError`, and lexing continues so the parser can
//! resynchronize. Two-character operators (`==`, `!=`, `<=`, `>=`,
//! `->`, `=>`, `|>`, `&&`, `||`) are handled by the generated DFA.

mod token;

pub use token::*;

use logos::Logos;
use manaknight_ast::Span;
use manaknight_diag::ErrorCode;
use thiserror::Error;

/// A token with its span
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }

    /// Parse the integer value of an `Int` token. The lexer has already
    /// rejected out-of-range literals, so this cannot fail on a token it
    /// produced.
    pub fn int_value(&self, source: &str) -> i64 {
        self.text(source).parse().unwrap_or(0)
    }

    /// Unescaped content of a `String` token.
    pub fn string_value(&self, source: &str) -> String {
        let raw = self.text(source);
        let body = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// A lexical error, later converted into a `Diagnostic`.
#[derive(Debug, Clone, Error)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("integer literal does not fit a signed 64-bit value")]
    IntOverflow { span: Span },

    #[error("unexpected character {found:?}")]
    UnexpectedChar { found: char, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedString { span } => *span,
            LexError::IntOverflow { span } => *span,
            LexError::UnexpectedChar { span, .. } => *span,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LexError::UnterminatedString { .. } => ErrorCode::E1001,
            LexError::IntOverflow { .. } => ErrorCode::E1002,
            LexError::UnexpectedChar { .. } => ErrorCode::E1001,
        }
    }
}

/// Tokenize a source string into tokens plus any lexical errors.
///
/// The concatenation of token lexemes and skipped trivia equals the
/// source. The stream always ends with a synthetic `Eof` token.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        let kind = match result {
            Ok(kind) => kind,
            Err(_) => {
                let slice = lexer.slice();
                let first = slice.chars().next().unwrap_or('\0');
                errors.push(if first == '"' {
                    LexError::UnterminatedString { span }
                } else if first.is_ascii_digit() {
                    LexError::IntOverflow { span }
                } else {
                    LexError::UnexpectedChar { found: first, span }
                });
                TokenKind::Error
            }
        };
        tokens.push(Token { kind, span });
    }

    let end = source.len();
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(end, end),
    });

    (tokens, errors)
}
