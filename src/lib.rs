//! A C compiler front end in Rust: recursive-descent parsing into an
//! untyped parse tree, then semantic resolution into a typed AST under
//! a copy-on-write scope environment.
//!
//! The lexer and the instruction-emission backend are external
//! collaborators: the parser consumes a `Vec<Token>` (see [`token`])
//! and the resolver hands the backend a typed
//! [`semantic::ast::TranslationUnit`] together with the final global
//! environment and record layouts.

/// Error types for parse failures and semantic errors.
pub mod diagnostic;
/// The recursive-descent parser and its parse tree.
pub mod parser;
/// Semantic resolution: environment, type system, typed AST, casts.
pub mod semantic;
/// Source spans and locations.
pub mod source;
/// The token contract with the external lexer.
pub mod token;

pub mod test_utils;

pub use parser::Parser;
pub use semantic::resolve_translation_unit;
