//! Resolution of statements and function definitions.

use log::debug;

use crate::diagnostic::SemanticError;
use crate::parser::tree;

use super::ast::{BlockItem, Expr, FuncDef, Stmt};
use super::declarations::{compose_declr, resolve_decln, resolve_decln_specs};
use super::env::{DeclKind, Env};
use super::expressions::{decay, resolve_expr};
use super::typecast::make_cast;
use super::types::{ExprType, RecordRegistry, TypeKind};

/// Resolves one statement, threading the environment (compound
/// statements contain declarations).
pub fn resolve_stmt(
    stmt: &tree::Stmt,
    env: Env,
    records: &mut RecordRegistry,
) -> Result<(Env, Stmt), SemanticError> {
    match stmt {
        tree::Stmt::Empty => Ok((env, Stmt::Empty)),
        tree::Stmt::Expr(expr) => {
            let resolved = resolve_expr(expr, &env, records)?;
            Ok((env, Stmt::Expr(resolved)))
        }
        tree::Stmt::Compound(items) => {
            let mut inner = env.enter_scope();
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    tree::BlockItem::Decln(decln) => {
                        let (next, declns) = resolve_decln(decln, inner, records)?;
                        inner = next;
                        resolved.push(BlockItem::Declns(declns));
                    }
                    tree::BlockItem::Stmt(stmt) => {
                        let (next, stmt) = resolve_stmt(stmt, inner, records)?;
                        inner = next;
                        resolved.push(BlockItem::Stmt(stmt));
                    }
                }
            }
            Ok((inner.exit_scope(), Stmt::Compound(resolved)))
        }
        tree::Stmt::If(cond, then_stmt) => {
            let cond = resolve_condition(cond, &env, records)?;
            let (env, then_stmt) = resolve_stmt(then_stmt, env, records)?;
            Ok((env, Stmt::If(cond, Box::new(then_stmt))))
        }
        tree::Stmt::IfElse(cond, then_stmt, else_stmt) => {
            let cond = resolve_condition(cond, &env, records)?;
            let (env, then_stmt) = resolve_stmt(then_stmt, env, records)?;
            let (env, else_stmt) = resolve_stmt(else_stmt, env, records)?;
            Ok((
                env,
                Stmt::IfElse(cond, Box::new(then_stmt), Box::new(else_stmt)),
            ))
        }
        tree::Stmt::While(cond, body) => {
            let cond = resolve_condition(cond, &env, records)?;
            let (env, body) = resolve_stmt(body, env, records)?;
            Ok((env, Stmt::While(cond, Box::new(body))))
        }
        tree::Stmt::DoWhile(body, cond) => {
            let (env, body) = resolve_stmt(body, env, records)?;
            let cond = resolve_condition(cond, &env, records)?;
            Ok((env, Stmt::DoWhile(Box::new(body), cond)))
        }
        tree::Stmt::For(init, cond, step, body) => {
            let init = init
                .as_ref()
                .map(|e| resolve_expr(e, &env, records))
                .transpose()?;
            let cond = cond
                .as_ref()
                .map(|e| resolve_condition(e, &env, records))
                .transpose()?;
            let step = step
                .as_ref()
                .map(|e| resolve_expr(e, &env, records))
                .transpose()?;
            let (env, body) = resolve_stmt(body, env, records)?;
            Ok((env, Stmt::For(init, cond, step, Box::new(body))))
        }
        tree::Stmt::Switch(cond, body) => {
            let cond = resolve_expr(cond, &env, records)?;
            if !cond.ty().is_integral() {
                return Err(SemanticError::InvalidOperand {
                    operation: format!("switch on {}", cond.ty()),
                });
            }
            let cond = make_cast(cond, ExprType::long_type())?;
            let (env, body) = resolve_stmt(body, env, records)?;
            check_switch_labels(&body)?;
            Ok((env, Stmt::Switch(cond, Box::new(body))))
        }
        tree::Stmt::Case(value, stmt) => {
            let value = resolve_expr(value, &env, records)?;
            let value = make_cast(value, ExprType::long_type())?;
            let Expr::ConstLong(value) = value else {
                return Err(SemanticError::ExpectedConstant {
                    context: "case label".to_string(),
                });
            };
            let (env, stmt) = resolve_stmt(stmt, env, records)?;
            Ok((env, Stmt::Case(value, Box::new(stmt))))
        }
        tree::Stmt::Default(stmt) => {
            let (env, stmt) = resolve_stmt(stmt, env, records)?;
            Ok((env, Stmt::Default(Box::new(stmt))))
        }
        tree::Stmt::Goto(label) => Ok((env, Stmt::Goto(*label))),
        tree::Stmt::Labeled(label, stmt) => {
            let (env, stmt) = resolve_stmt(stmt, env, records)?;
            Ok((env, Stmt::Labeled(*label, Box::new(stmt))))
        }
        tree::Stmt::Break => Ok((env, Stmt::Break)),
        tree::Stmt::Continue => Ok((env, Stmt::Continue)),
        tree::Stmt::Return(value) => {
            let func = env
                .current_function()
                .ok_or_else(|| SemanticError::InvalidOperand {
                    operation: "return outside a function".to_string(),
                })?;
            let ret_is_void = matches!(func.ret.kind, TypeKind::Void);
            let value = match value {
                Some(expr) => {
                    if ret_is_void {
                        return Err(SemanticError::TypeMismatch {
                            expected: "void".to_string(),
                            found: "return value".to_string(),
                        });
                    }
                    let resolved = decay(resolve_expr(expr, &env, records)?);
                    Some(make_cast(resolved, func.ret.clone())?)
                }
                None => {
                    if !ret_is_void {
                        return Err(SemanticError::TypeMismatch {
                            expected: func.ret.to_string(),
                            found: "return with no value".to_string(),
                        });
                    }
                    None
                }
            };
            Ok((env, Stmt::Return(value)))
        }
    }
}

/// A controlling expression must be scalar.
fn resolve_condition(
    expr: &tree::Expr,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<Expr, SemanticError> {
    let resolved = decay(resolve_expr(expr, env, records)?);
    if !resolved.ty().is_scalar() {
        return Err(SemanticError::InvalidOperand {
            operation: format!("condition of type {}", resolved.ty()),
        });
    }
    Ok(resolved)
}

/// Resolves a function definition: registers the function globally,
/// binds it as the current function (making its parameters visible),
/// and resolves the body.
pub fn resolve_func_def(
    func_def: &tree::FuncDef,
    env: Env,
    records: &mut RecordRegistry,
) -> Result<(Env, FuncDef), SemanticError> {
    let (env, storage, base) = resolve_decln_specs(&func_def.specs, env, records)?;
    if storage == super::ast::StorageClass::Typedef {
        return Err(SemanticError::InvalidOperand {
            operation: "typedef on a function definition".to_string(),
        });
    }

    let (name, ty) = compose_declr(&func_def.declr, base, &env, records)?;
    let name = name.ok_or(SemanticError::MissingDeclaratorName)?;
    let func = match &ty.kind {
        TypeKind::Function(func) => func.clone(),
        _ => {
            return Err(SemanticError::TypeMismatch {
                expected: "function".to_string(),
                found: ty.to_string(),
            });
        }
    };
    debug!("resolve_func_def: '{}' : {}", name, ty);

    let env = env.declare(DeclKind::Global, name, ty, records)?;

    let body_env = env.set_current_function(func.clone());
    let (_, body) = resolve_stmt(&func_def.body, body_env, records)?;

    Ok((env, FuncDef { name, ty: func, body }))
}

/// After a switch body is resolved, its case labels must be distinct
/// and at most one default label may appear. Nested switches own their
/// own labels.
fn check_switch_labels(body: &Stmt) -> Result<(), SemanticError> {
    let mut values = Vec::new();
    let mut defaults = 0usize;
    collect_switch_labels(body, &mut values, &mut defaults)?;
    if defaults > 1 {
        return Err(SemanticError::MultipleDefaultLabels);
    }
    Ok(())
}

fn collect_switch_labels(
    stmt: &Stmt,
    values: &mut Vec<i32>,
    defaults: &mut usize,
) -> Result<(), SemanticError> {
    match stmt {
        Stmt::Case(value, inner) => {
            if values.contains(value) {
                return Err(SemanticError::DuplicateCaseLabel { value: *value });
            }
            values.push(*value);
            collect_switch_labels(inner, values, defaults)
        }
        Stmt::Default(inner) => {
            *defaults += 1;
            collect_switch_labels(inner, values, defaults)
        }
        Stmt::Compound(items) => {
            for item in items {
                if let BlockItem::Stmt(stmt) = item {
                    collect_switch_labels(stmt, values, defaults)?;
                }
            }
            Ok(())
        }
        Stmt::If(_, then_stmt) => collect_switch_labels(then_stmt, values, defaults),
        Stmt::IfElse(_, then_stmt, else_stmt) => {
            collect_switch_labels(then_stmt, values, defaults)?;
            collect_switch_labels(else_stmt, values, defaults)
        }
        Stmt::While(_, body) | Stmt::DoWhile(body, _) | Stmt::For(_, _, _, body) => {
            collect_switch_labels(body, values, defaults)
        }
        Stmt::Labeled(_, inner) => collect_switch_labels(inner, values, defaults),
        // a nested switch consumes its own labels
        Stmt::Switch(..) => Ok(()),
        _ => Ok(()),
    }
}
