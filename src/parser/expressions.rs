//! Expression parsing: the full C operator-precedence cascade.
//!
//! One method per grammar production, lowest binding power first:
//! expression (comma) → assignment → conditional → logical-or →
//! logical-and → inclusive-or → exclusive-or → and → equality →
//! relational → shift → additive → multiplicative → cast → unary →
//! postfix → primary. Left recursion in the C grammar becomes iteration;
//! the binary levels share one left-associative chain helper.

use log::trace;

use crate::diagnostic::ParseError;
use crate::token::{IntSuffix, KeywordKind, TokenKind};

use super::Parser;
use super::tree::{BinaryOp, Expr, UnaryOp};
use thin_vec::{ThinVec, thin_vec};

/// Operator table for one left-associative binary level.
type BinaryLevel = &'static [(TokenKind, BinaryOp)];

const MULTIPLICATIVE: BinaryLevel = &[
    (TokenKind::Star, BinaryOp::Mul),
    (TokenKind::Slash, BinaryOp::Div),
    (TokenKind::Percent, BinaryOp::Mod),
];
const ADDITIVE: BinaryLevel = &[
    (TokenKind::Plus, BinaryOp::Add),
    (TokenKind::Minus, BinaryOp::Sub),
];
const SHIFT: BinaryLevel = &[
    (TokenKind::LessThanLessThan, BinaryOp::LShift),
    (TokenKind::GreaterThanGreaterThan, BinaryOp::RShift),
];
const RELATIONAL: BinaryLevel = &[
    (TokenKind::LessThan, BinaryOp::Less),
    (TokenKind::GreaterThan, BinaryOp::Greater),
    (TokenKind::LessThanEqual, BinaryOp::LessEqual),
    (TokenKind::GreaterThanEqual, BinaryOp::GreaterEqual),
];
const EQUALITY: BinaryLevel = &[
    (TokenKind::EqualEqual, BinaryOp::Equal),
    (TokenKind::BangEqual, BinaryOp::NotEqual),
];
const BIT_AND: BinaryLevel = &[(TokenKind::Ampersand, BinaryOp::BitAnd)];
const BIT_XOR: BinaryLevel = &[(TokenKind::Caret, BinaryOp::BitXor)];
const BIT_OR: BinaryLevel = &[(TokenKind::Pipe, BinaryOp::BitOr)];
const LOGIC_AND: BinaryLevel = &[(TokenKind::AmpersandAmpersand, BinaryOp::LogicAnd)];
const LOGIC_OR: BinaryLevel = &[(TokenKind::PipePipe, BinaryOp::LogicOr)];

impl Parser {
    /// expression: assignment-expression (`,` assignment-expression)*
    ///
    /// A dangling trailing comma is tolerated: parsing stops at the comma
    /// and succeeds up to (not including) it.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_assignment_expr()?;
        let mut exprs: ThinVec<Expr> = thin_vec![first];

        while self.current_kind()? == TokenKind::Comma {
            let saved = self.position;
            self.eat();
            match self.parse_assignment_expr() {
                Ok(expr) => exprs.push(expr),
                Err(_) => {
                    // lonely comma, leave it for the caller
                    self.position = saved;
                    break;
                }
            }
        }

        if exprs.len() == 1 {
            Ok(exprs.pop().unwrap())
        } else {
            Ok(Expr::AssignmentList(exprs))
        }
    }

    /// assignment-expression: conditional-expression
    ///                      | unary-expression assignment-operator assignment-expression
    ///
    /// The unary alternative is tried first; if no assignment operator
    /// follows, the whole thing re-parses as a conditional expression.
    pub(crate) fn parse_assignment_expr(&mut self) -> Result<Expr, ParseError> {
        let saved = self.position;
        if let Ok(lvalue) = self.parse_unary_expr() {
            let op = match self.current_kind()? {
                TokenKind::Equal => Some(None),
                TokenKind::StarEqual => Some(Some(BinaryOp::Mul)),
                TokenKind::SlashEqual => Some(Some(BinaryOp::Div)),
                TokenKind::PercentEqual => Some(Some(BinaryOp::Mod)),
                TokenKind::PlusEqual => Some(Some(BinaryOp::Add)),
                TokenKind::MinusEqual => Some(Some(BinaryOp::Sub)),
                TokenKind::LessThanLessThanEqual => Some(Some(BinaryOp::LShift)),
                TokenKind::GreaterThanGreaterThanEqual => Some(Some(BinaryOp::RShift)),
                TokenKind::AmpersandEqual => Some(Some(BinaryOp::BitAnd)),
                TokenKind::CaretEqual => Some(Some(BinaryOp::BitXor)),
                TokenKind::PipeEqual => Some(Some(BinaryOp::BitOr)),
                _ => None,
            };
            if let Some(op) = op {
                self.eat();
                let rvalue = self.parse_assignment_expr()?;
                return Ok(match op {
                    None => Expr::Assignment(Box::new(lvalue), Box::new(rvalue)),
                    Some(op) => Expr::OpAssignment(op, Box::new(lvalue), Box::new(rvalue)),
                });
            }
        }
        self.position = saved;
        self.parse_conditional_expr()
    }

    /// constant-expression: conditional-expression
    pub(crate) fn parse_constant_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_conditional_expr()
    }

    /// conditional-expression: logical-or-expression
    ///                         (`?` expression `:` conditional-expression)?
    pub(crate) fn parse_conditional_expr(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_logical_or_expr()?;

        if !self.eat_token(&TokenKind::Question)? {
            return Ok(cond);
        }
        let true_expr = self.parse_expr()?;
        self.expect_punct(TokenKind::Colon)?;
        let false_expr = self.parse_conditional_expr()?;
        Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(true_expr),
            Box::new(false_expr),
        ))
    }

    fn parse_logical_or_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(LOGIC_OR, Self::parse_logical_and_expr)
    }

    fn parse_logical_and_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(LOGIC_AND, Self::parse_inclusive_or_expr)
    }

    fn parse_inclusive_or_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(BIT_OR, Self::parse_exclusive_or_expr)
    }

    fn parse_exclusive_or_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(BIT_XOR, Self::parse_and_expr)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(BIT_AND, Self::parse_equality_expr)
    }

    fn parse_equality_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(EQUALITY, Self::parse_relational_expr)
    }

    fn parse_relational_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(RELATIONAL, Self::parse_shift_expr)
    }

    fn parse_shift_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(SHIFT, Self::parse_additive_expr)
    }

    fn parse_additive_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(ADDITIVE, Self::parse_multiplicative_expr)
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(MULTIPLICATIVE, Self::parse_cast_expr)
    }

    /// One left-associative binary level: next (op next)*
    fn parse_binary_level(
        &mut self,
        ops: BinaryLevel,
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut lhs = next(self)?;
        'outer: loop {
            let kind = self.current_kind()?;
            for (tok, op) in ops {
                if kind == *tok {
                    self.eat();
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    /// cast-expression: `(` type-name `)` cast-expression
    ///                | unary-expression
    ///
    /// The type-name alternative is tried first; `(x)` where `x` is a
    /// variable fails the type-name parse and backtracks to the
    /// parenthesized-expression path inside unary.
    pub(crate) fn parse_cast_expr(&mut self) -> Result<Expr, ParseError> {
        if self.current_kind()? == TokenKind::LeftParen {
            let cast = self.attempt(|p| {
                p.eat(); // consume '('
                let type_name = p.parse_type_name()?;
                p.expect_punct(TokenKind::RightParen)?;
                Ok(type_name)
            });
            if let Some(type_name) = cast {
                trace!("parse_cast_expr: cast to type name");
                let operand = self.parse_cast_expr()?;
                return Ok(Expr::Cast(Box::new(type_name), Box::new(operand)));
            }
        }
        self.parse_unary_expr()
    }

    /// unary-expression: postfix-expression
    ///                 | `++`/`--` unary-expression
    ///                 | unary-operator cast-expression
    ///                 | `sizeof` unary-expression
    ///                 | `sizeof` `(` type-name `)`
    pub(crate) fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.current_kind()? {
            TokenKind::PlusPlus => {
                self.eat();
                let operand = self.parse_unary_expr()?;
                Ok(Expr::PreIncrement(Box::new(operand)))
            }
            TokenKind::MinusMinus => {
                self.eat();
                let operand = self.parse_unary_expr()?;
                Ok(Expr::PreDecrement(Box::new(operand)))
            }
            TokenKind::Ampersand => {
                self.eat();
                let operand = self.parse_cast_expr()?;
                Ok(Expr::Reference(Box::new(operand)))
            }
            TokenKind::Star => {
                self.eat();
                let operand = self.parse_cast_expr()?;
                Ok(Expr::Dereference(Box::new(operand)))
            }
            TokenKind::Plus => {
                // unary plus is a no-op
                self.eat();
                self.parse_cast_expr()
            }
            TokenKind::Minus => {
                self.eat();
                let operand = self.parse_cast_expr()?;
                Ok(Expr::Unary(UnaryOp::Negate, Box::new(operand)))
            }
            TokenKind::Tilde => {
                self.eat();
                let operand = self.parse_cast_expr()?;
                Ok(Expr::Unary(UnaryOp::BitNot, Box::new(operand)))
            }
            TokenKind::Bang => {
                self.eat();
                let operand = self.parse_cast_expr()?;
                Ok(Expr::Unary(UnaryOp::LogicNot, Box::new(operand)))
            }
            TokenKind::Keyword(KeywordKind::Sizeof) => {
                self.eat();
                // sizeof(type-name) is attempted before sizeof unary-expression,
                // so that sizeof(x) with x a variable falls through to the
                // expression path.
                if self.current_kind()? == TokenKind::LeftParen {
                    let type_name = self.attempt(|p| {
                        p.eat(); // consume '('
                        let type_name = p.parse_type_name()?;
                        p.expect_punct(TokenKind::RightParen)?;
                        Ok(type_name)
                    });
                    if let Some(type_name) = type_name {
                        return Ok(Expr::SizeofType(Box::new(type_name)));
                    }
                }
                let operand = self.parse_unary_expr()?;
                Ok(Expr::SizeofExpr(Box::new(operand)))
            }
            _ => self.parse_postfix_expr(),
        }
    }

    /// postfix-expression: primary-expression followed by any number of
    /// `[index]`, `(args)`, `.member`, `->member`, `++`, `--`.
    ///
    /// `a[i]` desugars to `*(a + i)` and `a->b` to `(*a).b` right here.
    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.current_kind()? {
                TokenKind::LeftBracket => {
                    self.eat();
                    let index = self.parse_expr()?;
                    self.expect_punct(TokenKind::RightBracket)?;
                    let sum = Expr::Binary(BinaryOp::Add, Box::new(expr), Box::new(index));
                    expr = Expr::Dereference(Box::new(sum));
                }
                TokenKind::LeftParen => {
                    self.eat();
                    let mut args = ThinVec::new();
                    if self.current_kind()? != TokenKind::RightParen {
                        loop {
                            args.push(self.parse_assignment_expr()?);
                            if !self.eat_token(&TokenKind::Comma)? {
                                break;
                            }
                        }
                    }
                    self.expect_punct(TokenKind::RightParen)?;
                    expr = Expr::FunctionCall(Box::new(expr), args);
                }
                TokenKind::Dot => {
                    self.eat();
                    let member = self.expect_name()?;
                    expr = Expr::Member(Box::new(expr), member);
                }
                TokenKind::Arrow => {
                    self.eat();
                    let member = self.expect_name()?;
                    expr = Expr::Member(Box::new(Expr::Dereference(Box::new(expr))), member);
                }
                TokenKind::PlusPlus => {
                    self.eat();
                    expr = Expr::PostIncrement(Box::new(expr));
                }
                TokenKind::MinusMinus => {
                    self.eat();
                    expr = Expr::PostDecrement(Box::new(expr));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// primary-expression: identifier | constant | string-literal
    ///                   | `(` expression `)`
    ///
    /// An identifier previously declared as a typedef name is rejected
    /// here so that declarator parsing can consume it instead.
    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let token = self.current_token()?;
        match token.kind {
            TokenKind::Identifier(name) => {
                if self.is_typedef_name(name) {
                    trace!("parse_primary_expr: '{}' is a typedef name, rejecting", name);
                    return Err(self.unexpected("expression"));
                }
                self.eat();
                Ok(Expr::Variable(name))
            }
            TokenKind::IntConstant(value, suffix) => {
                self.eat();
                Ok(Expr::ConstInt(value, suffix))
            }
            TokenKind::FloatConstant(value, suffix) => {
                self.eat();
                Ok(Expr::ConstFloat(value, suffix))
            }
            TokenKind::CharConstant(value) => {
                // there is no char-typed constant in C, only int
                self.eat();
                Ok(Expr::ConstInt(value as i64, IntSuffix::None))
            }
            TokenKind::StringLiteral(value) => {
                self.eat();
                Ok(Expr::StringLiteral(value))
            }
            TokenKind::LeftParen => {
                self.eat();
                let expr = self.parse_expr()?;
                self.expect_punct(TokenKind::RightParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
