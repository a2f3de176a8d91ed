//! Recursive-descent parser producing an untyped parse tree.
//!
//! Grammar alternatives are tried via backtracking: save `self.position`,
//! attempt the alternative, and restore the saved position on `Err`. A
//! failed alternative is not an error; only a failure that survives to
//! the top level is reported as a syntax error with its location.
//!
//! The one piece of semantic knowledge the parser keeps is a scoped set
//! of typedef names, needed to resolve the typedef-vs-identifier and
//! declarator-vs-expression ambiguities before the real environment
//! exists.

use hashbrown::HashMap;
use log::trace;
use symbol_table::GlobalSymbol as Symbol;

use crate::diagnostic::ParseError;
use crate::source::SourceSpan;
use crate::token::{KeywordKind, Token, TokenKind};

pub mod tree;

mod declarations;
mod expressions;
mod statements;

#[cfg(test)]
mod tests_parser;

use tree::TranslationUnit;

/// A parser over a token stream produced by the external lexer.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Names bound at each brace nesting level; `true` for typedef
    /// names, `false` for ordinary declarations that shadow an outer
    /// typedef.
    typedef_scopes: Vec<HashMap<Symbol, bool>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
            typedef_scopes: vec![HashMap::new()],
        }
    }

    /// Parses the entire translation unit: one or more external
    /// declarations up to end of input.
    pub fn parse(&mut self) -> Result<TranslationUnit, ParseError> {
        let mut declns = Vec::new();
        while !self.at_eof() {
            declns.push(self.parse_external_decln()?);
        }
        Ok(TranslationUnit { declns })
    }

    // ------------------------------------------------------------------
    // token cursor
    // ------------------------------------------------------------------

    fn at_eof(&self) -> bool {
        match self.tokens.get(self.position) {
            None => true,
            Some(t) => t.kind == TokenKind::Eof,
        }
    }

    /// Returns the current token without consuming it.
    pub(crate) fn current_token(&self) -> Result<Token, ParseError> {
        self.tokens
            .get(self.position)
            .cloned()
            .ok_or(ParseError::UnexpectedEof {
                location: self.last_span(),
            })
    }

    /// Returns the kind of the current token.
    pub(crate) fn current_kind(&self) -> Result<TokenKind, ParseError> {
        self.current_token().map(|t| t.kind)
    }

    fn last_span(&self) -> SourceSpan {
        self.tokens
            .last()
            .map(|t| t.span)
            .unwrap_or_else(SourceSpan::empty)
    }

    /// Consumes the current token.
    pub(crate) fn eat(&mut self) {
        self.position += 1;
    }

    /// Consumes the current token if it has the given kind.
    pub(crate) fn eat_token(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        if self.current_kind()? == *kind {
            self.eat();
            return Ok(true);
        }
        Ok(false)
    }

    /// Expects a specific punctuation token.
    pub(crate) fn expect_punct(&mut self, value: TokenKind) -> Result<(), ParseError> {
        let token = self.current_token()?;
        if token.kind == value {
            self.eat();
            return Ok(());
        }
        Err(ParseError::UnexpectedToken {
            expected: value.to_string(),
            found: token.kind,
            location: token.span,
        })
    }

    /// Expects a specific keyword.
    pub(crate) fn expect_keyword(&mut self, value: KeywordKind) -> Result<(), ParseError> {
        if self.eat_token(&TokenKind::Keyword(value))? {
            return Ok(());
        }
        let token = self.current_token()?;
        Err(ParseError::UnexpectedToken {
            expected: value.to_string(),
            found: token.kind,
            location: token.span,
        })
    }

    /// Consumes an identifier if one is present, returning its name.
    pub(crate) fn maybe_name(&mut self) -> Result<Option<Symbol>, ParseError> {
        let token = self.current_token()?;
        if let TokenKind::Identifier(id) = token.kind {
            self.eat();
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }

    /// Expects and consumes an identifier, returning its name.
    pub(crate) fn expect_name(&mut self) -> Result<Symbol, ParseError> {
        let token = self.current_token()?;
        if let TokenKind::Identifier(id) = token.kind {
            self.eat();
            Ok(id)
        } else {
            Err(ParseError::UnexpectedToken {
                expected: "identifier".to_string(),
                found: token.kind,
                location: token.span,
            })
        }
    }

    /// The stock "this alternative did not match" failure.
    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        match self.current_token() {
            Ok(token) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind,
                location: token.span,
            },
            Err(e) => e,
        }
    }

    // ------------------------------------------------------------------
    // typedef name tracking
    // ------------------------------------------------------------------

    pub(crate) fn is_typedef_name(&self, name: Symbol) -> bool {
        self.typedef_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
            .copied()
            .unwrap_or(false)
    }

    pub(crate) fn add_typedef_name(&mut self, name: Symbol) {
        trace!("parser: registering typedef name '{}'", name);
        if let Some(scope) = self.typedef_scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    /// An ordinary declaration shadows any outer typedef of the same
    /// name for the rest of the block.
    pub(crate) fn shadow_typedef_name(&mut self, name: Symbol) {
        if let Some(scope) = self.typedef_scopes.last_mut() {
            scope.insert(name, false);
        }
    }

    pub(crate) fn enter_typedef_scope(&mut self) {
        self.typedef_scopes.push(HashMap::new());
    }

    pub(crate) fn exit_typedef_scope(&mut self) {
        if self.typedef_scopes.len() > 1 {
            self.typedef_scopes.pop();
        }
    }

    // ------------------------------------------------------------------
    // backtracking
    // ------------------------------------------------------------------

    /// Tries `parse_fn`; on failure restores the saved position and
    /// returns `None`. The workhorse of grammar-alternative selection.
    pub(crate) fn attempt<T, F>(&mut self, parse_fn: F) -> Option<T>
    where
        F: FnOnce(&mut Self) -> Result<T, ParseError>,
    {
        let saved = self.position;
        match parse_fn(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.position = saved;
                None
            }
        }
    }
}
