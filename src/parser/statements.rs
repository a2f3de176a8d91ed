//! Statement and external-declaration parsing.

use log::trace;
use thin_vec::ThinVec;

use crate::diagnostic::ParseError;
use crate::token::{KeywordKind, TokenKind};

use super::Parser;
use super::tree::{BlockItem, ExternDecln, FuncDef, Stmt, TypeModifier};

impl Parser {
    /// external-declaration: function-definition | declaration
    pub(crate) fn parse_external_decln(&mut self) -> Result<ExternDecln, ParseError> {
        if let Some(func_def) = self.attempt(Self::parse_func_def) {
            return Ok(ExternDecln::FuncDef(func_def));
        }
        Ok(ExternDecln::Decln(self.parse_decln()?))
    }

    /// function-definition: declaration-specifiers declarator
    /// compound-statement
    ///
    /// The declarator must be named and its innermost modifier must be a
    /// parameter list; anything else backtracks to the declaration path.
    fn parse_func_def(&mut self) -> Result<FuncDef, ParseError> {
        let specs = self.parse_decln_specs()?;
        let declr = self.parse_declr()?;

        if declr.name.is_none() || !matches!(declr.modifiers.first(), Some(TypeModifier::Function(..)))
        {
            return Err(self.unexpected("function declarator"));
        }
        if self.current_kind()? != TokenKind::LeftBrace {
            return Err(self.unexpected("function body"));
        }
        trace!("parse_func_def: '{}'", declr.name.unwrap());
        let body = self.parse_compound_stmt()?;
        Ok(FuncDef { specs, declr, body })
    }

    /// compound-statement: `{` (declaration | statement)* `}`
    ///
    /// Braces open and close a typedef scope so that names shadowed
    /// inside a block parse correctly.
    pub(crate) fn parse_compound_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect_punct(TokenKind::LeftBrace)?;
        self.enter_typedef_scope();

        let mut items = ThinVec::new();
        loop {
            if self.eat_token(&TokenKind::RightBrace)? {
                break;
            }
            if let Some(decln) = self.attempt(Self::parse_decln) {
                items.push(BlockItem::Decln(decln));
            } else {
                match self.parse_stmt() {
                    Ok(stmt) => items.push(BlockItem::Stmt(stmt)),
                    Err(e) => {
                        self.exit_typedef_scope();
                        return Err(e);
                    }
                }
            }
        }

        self.exit_typedef_scope();
        Ok(Stmt::Compound(items))
    }

    /// statement: any of the C89 statement forms.
    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let token = self.current_token()?;
        match token.kind {
            TokenKind::LeftBrace => return self.parse_compound_stmt(),
            TokenKind::Semicolon => {
                self.eat();
                return Ok(Stmt::Empty);
            }
            TokenKind::Identifier(name) => {
                // labeled statement needs two tokens of lookahead
                let saved = self.position;
                self.eat();
                if self.eat_token(&TokenKind::Colon)? {
                    let stmt = self.parse_stmt()?;
                    return Ok(Stmt::Labeled(name, Box::new(stmt)));
                }
                self.position = saved;
            }
            TokenKind::Keyword(k) => match k {
                KeywordKind::Return => {
                    self.eat();
                    if self.eat_token(&TokenKind::Semicolon)? {
                        return Ok(Stmt::Return(None));
                    }
                    let expr = self.parse_expr()?;
                    self.expect_punct(TokenKind::Semicolon)?;
                    return Ok(Stmt::Return(Some(expr)));
                }
                KeywordKind::If => {
                    self.eat();
                    self.expect_punct(TokenKind::LeftParen)?;
                    let cond = self.parse_expr()?;
                    self.expect_punct(TokenKind::RightParen)?;
                    let then_stmt = self.parse_stmt()?;
                    if self.eat_token(&TokenKind::Keyword(KeywordKind::Else))? {
                        let else_stmt = self.parse_stmt()?;
                        return Ok(Stmt::IfElse(
                            Box::new(cond),
                            Box::new(then_stmt),
                            Box::new(else_stmt),
                        ));
                    }
                    return Ok(Stmt::If(Box::new(cond), Box::new(then_stmt)));
                }
                KeywordKind::While => {
                    self.eat();
                    self.expect_punct(TokenKind::LeftParen)?;
                    let cond = self.parse_expr()?;
                    self.expect_punct(TokenKind::RightParen)?;
                    let body = self.parse_stmt()?;
                    return Ok(Stmt::While(Box::new(cond), Box::new(body)));
                }
                KeywordKind::Do => {
                    self.eat();
                    let body = self.parse_stmt()?;
                    self.expect_keyword(KeywordKind::While)?;
                    self.expect_punct(TokenKind::LeftParen)?;
                    let cond = self.parse_expr()?;
                    self.expect_punct(TokenKind::RightParen)?;
                    self.expect_punct(TokenKind::Semicolon)?;
                    return Ok(Stmt::DoWhile(Box::new(body), Box::new(cond)));
                }
                KeywordKind::For => {
                    self.eat();
                    self.expect_punct(TokenKind::LeftParen)?;
                    let init = if self.eat_token(&TokenKind::Semicolon)? {
                        None
                    } else {
                        let expr = self.parse_expr()?;
                        self.expect_punct(TokenKind::Semicolon)?;
                        Some(Box::new(expr))
                    };
                    let cond = if self.eat_token(&TokenKind::Semicolon)? {
                        None
                    } else {
                        let expr = self.parse_expr()?;
                        self.expect_punct(TokenKind::Semicolon)?;
                        Some(Box::new(expr))
                    };
                    let step = if self.current_kind()? == TokenKind::RightParen {
                        None
                    } else {
                        Some(Box::new(self.parse_expr()?))
                    };
                    self.expect_punct(TokenKind::RightParen)?;
                    let body = self.parse_stmt()?;
                    return Ok(Stmt::For(init, cond, step, Box::new(body)));
                }
                KeywordKind::Switch => {
                    self.eat();
                    self.expect_punct(TokenKind::LeftParen)?;
                    let expr = self.parse_expr()?;
                    self.expect_punct(TokenKind::RightParen)?;
                    // a switch body must be a compound statement
                    if self.current_kind()? != TokenKind::LeftBrace {
                        let token = self.current_token()?;
                        return Err(ParseError::SyntaxError {
                            message: "switch body must be a compound statement".to_string(),
                            location: token.span,
                        });
                    }
                    let body = self.parse_compound_stmt()?;
                    return Ok(Stmt::Switch(Box::new(expr), Box::new(body)));
                }
                KeywordKind::Case => {
                    self.eat();
                    let value = self.parse_constant_expr()?;
                    self.expect_punct(TokenKind::Colon)?;
                    let stmt = self.parse_stmt()?;
                    return Ok(Stmt::Case(value, Box::new(stmt)));
                }
                KeywordKind::Default => {
                    self.eat();
                    self.expect_punct(TokenKind::Colon)?;
                    let stmt = self.parse_stmt()?;
                    return Ok(Stmt::Default(Box::new(stmt)));
                }
                KeywordKind::Goto => {
                    self.eat();
                    let label = self.expect_name()?;
                    self.expect_punct(TokenKind::Semicolon)?;
                    return Ok(Stmt::Goto(label));
                }
                KeywordKind::Break => {
                    self.eat();
                    self.expect_punct(TokenKind::Semicolon)?;
                    return Ok(Stmt::Break);
                }
                KeywordKind::Continue => {
                    self.eat();
                    self.expect_punct(TokenKind::Semicolon)?;
                    return Ok(Stmt::Continue);
                }
                _ => {}
            },
            _ => {}
        }

        let expr = self.parse_expr()?;
        self.expect_punct(TokenKind::Semicolon)?;
        Ok(Stmt::Expr(expr))
    }
}
