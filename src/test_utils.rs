//! Test support: a minimal token-stream builder and one-call
//! parse/resolve helpers.
//!
//! The production pipeline takes its tokens from an external lexer;
//! tests need a convenient way to produce a token stream from a source
//! string, so this module carries a small scanner covering the C89
//! subset the parser understands. It panics on malformed input; it is
//! test tooling, not a lexer.

use std::str::FromStr;

use crate::diagnostic::{ParseError, SemanticError};
use crate::parser::{Parser, tree};
use crate::semantic::{self, ast};
use crate::source::{FileId, SourceLocation, SourceSpan};
use crate::token::{FloatSuffix, IntSuffix, KeywordKind, Token, TokenKind};

use symbol_table::GlobalSymbol as Symbol;

/// Scans a source string into a token stream ending in `Eof`.
pub fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    let span = |start: usize, end: usize| {
        SourceSpan::new(
            SourceLocation::new(FileId(0), start as u32),
            SourceLocation::new(FileId(0), end as u32),
        )
    };

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;

        if c.is_ascii_alphabetic() || c == '_' {
            while pos < bytes.len()
                && ((bytes[pos] as char).is_ascii_alphanumeric() || bytes[pos] == b'_')
            {
                pos += 1;
            }
            let word = &source[start..pos];
            let kind = match KeywordKind::from_str(word) {
                Ok(keyword) => TokenKind::Keyword(keyword),
                Err(()) => TokenKind::Identifier(Symbol::from(word)),
            };
            tokens.push(Token::new(kind, span(start, pos)));
            continue;
        }

        if c.is_ascii_digit() {
            let mut is_float = false;
            while pos < bytes.len() && (bytes[pos] as char).is_ascii_digit() {
                pos += 1;
            }
            if pos < bytes.len() && bytes[pos] == b'.' {
                is_float = true;
                pos += 1;
                while pos < bytes.len() && (bytes[pos] as char).is_ascii_digit() {
                    pos += 1;
                }
            }
            let digits_end = pos;
            let mut unsigned = false;
            let mut long = false;
            let mut float_suffix = false;
            while pos < bytes.len() {
                match bytes[pos] {
                    b'u' | b'U' => unsigned = true,
                    b'l' | b'L' => long = true,
                    b'f' | b'F' if is_float => float_suffix = true,
                    _ => break,
                }
                pos += 1;
            }
            let text = &source[start..digits_end];
            let kind = if is_float {
                let value: f64 = text.parse().expect("bad float constant in test source");
                let suffix = if float_suffix {
                    FloatSuffix::F
                } else {
                    FloatSuffix::None
                };
                TokenKind::FloatConstant(value, suffix)
            } else {
                let value: i64 = text.parse().expect("bad integer constant in test source");
                let suffix = match (unsigned, long) {
                    (true, true) => IntSuffix::UL,
                    (true, false) => IntSuffix::U,
                    (false, true) => IntSuffix::L,
                    (false, false) => IntSuffix::None,
                };
                TokenKind::IntConstant(value, suffix)
            };
            tokens.push(Token::new(kind, span(start, pos)));
            continue;
        }

        if c == '\'' {
            pos += 1;
            let value = match bytes[pos] {
                b'\\' => {
                    pos += 1;
                    let escaped = match bytes[pos] {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'0' => 0,
                        b'\\' => b'\\',
                        b'\'' => b'\'',
                        other => panic!("unknown escape '\\{}' in test source", other as char),
                    };
                    pos += 1;
                    escaped
                }
                byte => {
                    pos += 1;
                    byte
                }
            };
            assert_eq!(bytes[pos], b'\'', "unterminated char constant");
            pos += 1;
            tokens.push(Token::new(TokenKind::CharConstant(value), span(start, pos)));
            continue;
        }

        if c == '"' {
            pos += 1;
            let mut value = String::new();
            while bytes[pos] != b'"' {
                if bytes[pos] == b'\\' {
                    pos += 1;
                    value.push(match bytes[pos] {
                        b'n' => '\n',
                        b't' => '\t',
                        b'\\' => '\\',
                        b'"' => '"',
                        other => panic!("unknown escape '\\{}' in test source", other as char),
                    });
                } else {
                    value.push(bytes[pos] as char);
                }
                pos += 1;
            }
            pos += 1;
            tokens.push(Token::new(
                TokenKind::StringLiteral(Symbol::from(value.as_str())),
                span(start, pos),
            ));
            continue;
        }

        // punctuators, longest match first
        let rest = &source[pos..];
        let (kind, len) = if rest.starts_with("...") {
            (TokenKind::Ellipsis, 3)
        } else if rest.starts_with("<<=") {
            (TokenKind::LessThanLessThanEqual, 3)
        } else if rest.starts_with(">>=") {
            (TokenKind::GreaterThanGreaterThanEqual, 3)
        } else if rest.starts_with("++") {
            (TokenKind::PlusPlus, 2)
        } else if rest.starts_with("--") {
            (TokenKind::MinusMinus, 2)
        } else if rest.starts_with("->") {
            (TokenKind::Arrow, 2)
        } else if rest.starts_with("<<") {
            (TokenKind::LessThanLessThan, 2)
        } else if rest.starts_with(">>") {
            (TokenKind::GreaterThanGreaterThan, 2)
        } else if rest.starts_with("<=") {
            (TokenKind::LessThanEqual, 2)
        } else if rest.starts_with(">=") {
            (TokenKind::GreaterThanEqual, 2)
        } else if rest.starts_with("==") {
            (TokenKind::EqualEqual, 2)
        } else if rest.starts_with("!=") {
            (TokenKind::BangEqual, 2)
        } else if rest.starts_with("&&") {
            (TokenKind::AmpersandAmpersand, 2)
        } else if rest.starts_with("||") {
            (TokenKind::PipePipe, 2)
        } else if rest.starts_with("+=") {
            (TokenKind::PlusEqual, 2)
        } else if rest.starts_with("-=") {
            (TokenKind::MinusEqual, 2)
        } else if rest.starts_with("*=") {
            (TokenKind::StarEqual, 2)
        } else if rest.starts_with("/=") {
            (TokenKind::SlashEqual, 2)
        } else if rest.starts_with("%=") {
            (TokenKind::PercentEqual, 2)
        } else if rest.starts_with("&=") {
            (TokenKind::AmpersandEqual, 2)
        } else if rest.starts_with("^=") {
            (TokenKind::CaretEqual, 2)
        } else if rest.starts_with("|=") {
            (TokenKind::PipeEqual, 2)
        } else {
            let kind = match c {
                '(' => TokenKind::LeftParen,
                ')' => TokenKind::RightParen,
                '{' => TokenKind::LeftBrace,
                '}' => TokenKind::RightBrace,
                '[' => TokenKind::LeftBracket,
                ']' => TokenKind::RightBracket,
                ';' => TokenKind::Semicolon,
                ':' => TokenKind::Colon,
                ',' => TokenKind::Comma,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '=' => TokenKind::Equal,
                '<' => TokenKind::LessThan,
                '>' => TokenKind::GreaterThan,
                '&' => TokenKind::Ampersand,
                '|' => TokenKind::Pipe,
                '^' => TokenKind::Caret,
                '!' => TokenKind::Bang,
                '~' => TokenKind::Tilde,
                '?' => TokenKind::Question,
                '.' => TokenKind::Dot,
                other => panic!("unknown character '{}' in test source", other),
            };
            (kind, 1)
        };
        pos += len;
        tokens.push(Token::new(kind, span(start, pos)));
    }

    let end = span(bytes.len(), bytes.len());
    tokens.push(Token::new(TokenKind::Eof, end));
    tokens
}

/// Parses a whole translation unit, panicking on syntax errors.
pub fn parse(source: &str) -> tree::TranslationUnit {
    try_parse(source).expect("test source failed to parse")
}

pub fn try_parse(source: &str) -> Result<tree::TranslationUnit, ParseError> {
    Parser::new(tokenize(source)).parse()
}

/// Parses a single expression, panicking on syntax errors.
pub fn parse_expr(source: &str) -> tree::Expr {
    try_parse_expr(source).expect("test expression failed to parse")
}

pub fn try_parse_expr(source: &str) -> Result<tree::Expr, ParseError> {
    Parser::new(tokenize(source)).parse_expr()
}

/// Parses and resolves a whole translation unit.
pub fn resolve(source: &str) -> Result<ast::TranslationUnit, SemanticError> {
    semantic::resolve_translation_unit(&parse(source))
}
