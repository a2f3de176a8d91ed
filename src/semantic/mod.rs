//! Semantic analysis: resolves the untyped parse tree into a typed AST
//! under a scoped symbol environment.
//!
//! The resolver walks each parse-tree node with the current `Env`,
//! producing a typed node and a possibly-updated environment.
//! Declarations add entries; expressions consult the environment but
//! never change it. A semantic error aborts resolution of the whole
//! translation unit.

use crate::diagnostic::SemanticError;
use crate::parser::tree;

pub mod ast;
pub mod env;
pub mod typecast;
pub mod types;

mod declarations;
mod expressions;
mod statements;

#[cfg(test)]
mod tests_semantic;

pub use declarations::{resolve_decln, resolve_type_name};
pub use env::{DeclKind, Entry, EntryKind, Env};
pub use expressions::resolve_expr;
pub use statements::{resolve_func_def, resolve_stmt};
pub use types::{ExprType, FuncType, Qualifiers, RecordRef, RecordRegistry, TypeKind};

/// Resolves a whole translation unit, producing the typed AST, the
/// final global environment, and the record layouts.
pub fn resolve_translation_unit(
    unit: &tree::TranslationUnit,
) -> Result<ast::TranslationUnit, SemanticError> {
    let mut records = RecordRegistry::new();
    let mut env = Env::new();
    let mut declns = Vec::with_capacity(unit.declns.len());

    for extern_decln in &unit.declns {
        match extern_decln {
            tree::ExternDecln::Decln(decln) => {
                let (next_env, resolved) = resolve_decln(decln, env, &mut records)?;
                env = next_env;
                declns.extend(resolved.into_iter().map(ast::ExternDecln::Decln));
            }
            tree::ExternDecln::FuncDef(func_def) => {
                let (next_env, resolved) = resolve_func_def(func_def, env, &mut records)?;
                env = next_env;
                declns.push(ast::ExternDecln::FuncDef(resolved));
            }
        }
    }

    Ok(ast::TranslationUnit {
        declns,
        env,
        records,
    })
}
