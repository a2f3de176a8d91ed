//! Error types for the two failure tiers.
//!
//! `ParseError` signals that a grammar alternative did not match; the
//! caller restores its saved position and tries the next alternative, so
//! most values of this type never reach a user. Only a failure that
//! survives to the top level is reported as a syntax error.
//!
//! `SemanticError` is fatal for the current translation unit: resolution
//! halts and the error identifies the offending construct.

use crate::source::SourceSpan;
use crate::token::TokenKind;

/// Parse errors. Returning one of these is the ordinary way a grammar
/// alternative reports "no match"; it must never panic or unwind.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found:?}")]
    UnexpectedToken {
        expected: String,
        found: TokenKind,
        location: SourceSpan,
    },

    #[error("Unexpected end of input")]
    UnexpectedEof { location: SourceSpan },

    #[error("Syntax error: {message}")]
    SyntaxError { message: String, location: SourceSpan },
}

impl ParseError {
    pub fn location(&self) -> SourceSpan {
        match self {
            ParseError::UnexpectedToken { location, .. } => *location,
            ParseError::UnexpectedEof { location } => *location,
            ParseError::SyntaxError { location, .. } => *location,
        }
    }
}

/// Semantic errors. Unrecoverable for the translation unit.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SemanticError {
    #[error("Undeclared identifier '{name}'")]
    UndeclaredIdentifier { name: String },

    #[error("Expected a variable, but '{name}' is a typedef")]
    ExpectedVariable { name: String },

    #[error("Redefinition of '{name}'")]
    Redefinition { name: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Incomplete type '{name}'")]
    IncompleteType { name: String },

    #[error("Invalid operand: {operation}")]
    InvalidOperand { operation: String },

    #[error("Not an lvalue: {operation}")]
    NotLValue { operation: String },

    #[error("Multiple storage class specifiers")]
    DuplicateStorageClass,

    #[error("Cannot match basic type specifier combination")]
    InvalidTypeCombination,

    #[error("Expected a constant expression: {context}")]
    ExpectedConstant { context: String },

    #[error("Array size must be non-negative, got {size}")]
    NegativeArraySize { size: i32 },

    #[error("Duplicate case label {value}")]
    DuplicateCaseLabel { value: i32 },

    #[error("Multiple default labels in one switch")]
    MultipleDefaultLabels,

    #[error("Record '{name}' has no member '{member}'")]
    UnknownMember { name: String, member: String },

    #[error("Wrong number of arguments to '{name}': expected {expected}, found {found}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported cast from {from} to {to}")]
    UnsupportedCast { from: String, to: String },

    #[error("Declaration needs a name")]
    MissingDeclaratorName,
}
