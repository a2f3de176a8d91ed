//! Resolution of parse-tree expressions into typed AST expressions.
//!
//! Every function here consults the environment but never changes it:
//! expressions cannot introduce bindings. Type names appearing inside
//! casts and `sizeof` may mention new record tags; those go into the
//! record registry, which is threaded mutably.

use log::trace;

use crate::diagnostic::SemanticError;
use crate::parser::tree;
use crate::token::{FloatSuffix, IntSuffix};

use super::ast::{BinaryOp, CastKind, Expr, UnaryOp, VarKind};
use super::declarations::resolve_type_name;
use super::env::{Entry, EntryKind, Env};
use super::typecast::{make_cast, usual_arithmetic_conversion, usual_scalar_conversion};
use super::types::{ExprType, RecordRegistry, TypeKind};

use symbol_table::GlobalSymbol as Symbol;

/// Resolves one expression against the environment.
pub fn resolve_expr(
    expr: &tree::Expr,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<Expr, SemanticError> {
    match expr {
        tree::Expr::Variable(name) => resolve_variable(*name, env),
        tree::Expr::ConstInt(value, suffix) => Ok(match suffix {
            IntSuffix::U | IntSuffix::UL => Expr::ConstULong(*value as u32),
            IntSuffix::None | IntSuffix::L => Expr::ConstLong(*value as i32),
        }),
        tree::Expr::ConstFloat(value, suffix) => Ok(match suffix {
            FloatSuffix::F => Expr::ConstFloat(*value as f32),
            FloatSuffix::None => Expr::ConstDouble(*value),
        }),
        tree::Expr::StringLiteral(value) => Ok(Expr::StringLiteral(*value)),
        tree::Expr::AssignmentList(exprs) => {
            let resolved = exprs
                .iter()
                .map(|e| resolve_expr(e, env, records))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::AssignmentList(resolved))
        }
        tree::Expr::Assignment(lhs, rhs) => {
            let lhs = resolve_expr(lhs, env, records)?;
            check_lvalue(&lhs)?;
            let rhs = decay(resolve_expr(rhs, env, records)?);
            let rhs = make_cast(rhs, lhs.ty())?;
            Ok(Expr::Assignment {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            })
        }
        tree::Expr::OpAssignment(op, lhs, rhs) => {
            // a op= b resolves as a = a op b
            let lhs = resolve_expr(lhs, env, records)?;
            check_lvalue(&lhs)?;
            let rhs = decay(resolve_expr(rhs, env, records)?);
            let combined = resolve_binary_resolved(*op, lhs.clone(), rhs, records)?;
            let combined = make_cast(combined, lhs.ty())?;
            Ok(Expr::Assignment {
                lhs: Box::new(lhs),
                rhs: Box::new(combined),
            })
        }
        tree::Expr::Conditional(cond, true_expr, false_expr) => {
            resolve_conditional(cond, true_expr, false_expr, env, records)
        }
        tree::Expr::Binary(op, lhs, rhs) => {
            let lhs = decay(resolve_expr(lhs, env, records)?);
            let rhs = decay(resolve_expr(rhs, env, records)?);
            resolve_binary_resolved(*op, lhs, rhs, records)
        }
        tree::Expr::Unary(op, operand) => {
            let operand = resolve_expr(operand, env, records)?;
            resolve_unary(*op, operand)
        }
        tree::Expr::PreIncrement(e) => {
            Ok(Expr::PreIncrement(Box::new(resolve_scalar(e, env, records)?)))
        }
        tree::Expr::PreDecrement(e) => {
            Ok(Expr::PreDecrement(Box::new(resolve_scalar(e, env, records)?)))
        }
        tree::Expr::PostIncrement(e) => {
            Ok(Expr::PostIncrement(Box::new(resolve_scalar(e, env, records)?)))
        }
        tree::Expr::PostDecrement(e) => {
            Ok(Expr::PostDecrement(Box::new(resolve_scalar(e, env, records)?)))
        }
        tree::Expr::Cast(type_name, operand) => {
            let target = resolve_type_name(type_name, env, records)?;
            let operand = decay(resolve_expr(operand, env, records)?);
            make_cast(operand, target)
        }
        tree::Expr::SizeofType(type_name) => {
            let ty = resolve_type_name(type_name, env, records)?;
            let size = ty.size_of(records)?;
            Ok(Expr::ConstULong(size as u32))
        }
        tree::Expr::SizeofExpr(operand) => {
            let operand = resolve_expr(operand, env, records)?;
            let size = operand.ty().size_of(records)?;
            Ok(Expr::ConstULong(size as u32))
        }
        tree::Expr::FunctionCall(callee, args) => resolve_call(callee, args, env, records),
        tree::Expr::Member(base, member) => resolve_member(base, *member, env, records),
        tree::Expr::Reference(operand) => {
            let operand = resolve_expr(operand, env, records)?;
            let ty = ExprType::pointer(operand.ty());
            Ok(Expr::Reference {
                operand: Box::new(operand),
                ty,
            })
        }
        tree::Expr::Dereference(operand) => {
            let operand = decay(resolve_expr(operand, env, records)?);
            let ty = operand.ty();
            match ty.kind {
                TypeKind::Pointer(pointee) => Ok(Expr::Dereference {
                    operand: Box::new(operand),
                    ty: *pointee,
                }),
                _ => Err(SemanticError::InvalidOperand {
                    operation: format!("dereference of {}", ty),
                }),
            }
        }
    }
}

/// A name in expression position: enum constants become long literals,
/// typedef hits are an error, everything else becomes a storage-tagged
/// variable reference.
fn resolve_variable(name: Symbol, env: &Env) -> Result<Expr, SemanticError> {
    match env.lookup(name) {
        None => Err(SemanticError::UndeclaredIdentifier {
            name: name.to_string(),
        }),
        Some(Entry {
            kind: EntryKind::Typedef,
            ..
        }) => Err(SemanticError::ExpectedVariable {
            name: name.to_string(),
        }),
        Some(Entry {
            kind: EntryKind::Enum,
            offset,
            ..
        }) => Ok(Expr::ConstLong(offset)),
        Some(Entry { kind, ty, offset }) => {
            let kind = match kind {
                EntryKind::Stack => VarKind::Stack { offset },
                EntryKind::Frame => VarKind::Frame { offset },
                _ => VarKind::Global,
            };
            Ok(Expr::Variable { name, kind, ty })
        }
    }
}

fn resolve_scalar(
    expr: &tree::Expr,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<Expr, SemanticError> {
    let resolved = resolve_expr(expr, env, records)?;
    if !resolved.ty().is_scalar() {
        return Err(SemanticError::InvalidOperand {
            operation: format!("increment/decrement of {}", resolved.ty()),
        });
    }
    Ok(resolved)
}

/// Arrays used as values decay to pointers to their first element.
pub(crate) fn decay(expr: Expr) -> Expr {
    if let TypeKind::Array(element, _) = expr.ty().kind {
        let ty = ExprType::pointer(*element);
        return Expr::Cast {
            kind: CastKind::Nop,
            operand: Box::new(expr),
            ty,
        };
    }
    expr
}

fn check_lvalue(expr: &Expr) -> Result<(), SemanticError> {
    match expr {
        Expr::Variable { .. } | Expr::Dereference { .. } | Expr::Member { .. } => Ok(()),
        _ => Err(SemanticError::NotLValue {
            operation: "assignment".to_string(),
        }),
    }
}

/// Binary operator resolution over already-resolved operands.
pub(crate) fn resolve_binary_resolved(
    op: BinaryOp,
    lhs: Expr,
    rhs: Expr,
    records: &RecordRegistry,
) -> Result<Expr, SemanticError> {
    use BinaryOp::*;

    let lhs_is_ptr = matches!(lhs.ty().kind, TypeKind::Pointer(_));
    let rhs_is_ptr = matches!(rhs.ty().kind, TypeKind::Pointer(_));

    match op {
        Add => {
            if lhs_is_ptr && rhs.ty().is_integral() {
                pointer_offset(op, lhs, rhs, records)
            } else if rhs_is_ptr && lhs.ty().is_integral() {
                pointer_offset(op, rhs, lhs, records)
            } else {
                arith_binary(op, lhs, rhs)
            }
        }
        Sub => {
            if lhs_is_ptr && rhs_is_ptr {
                pointer_difference(lhs, rhs, records)
            } else if lhs_is_ptr && rhs.ty().is_integral() {
                pointer_offset(op, lhs, rhs, records)
            } else {
                arith_binary(op, lhs, rhs)
            }
        }
        Mul | Div => arith_binary(op, lhs, rhs),
        Mod | LShift | RShift | BitAnd | BitXor | BitOr => {
            if !lhs.ty().is_integral() || !rhs.ty().is_integral() {
                return Err(SemanticError::InvalidOperand {
                    operation: format!("{:?} of {} and {}", op, lhs.ty(), rhs.ty()),
                });
            }
            arith_binary(op, lhs, rhs)
        }
        Less | Greater | LessEqual | GreaterEqual | Equal | NotEqual => {
            let (lhs, rhs, _) = usual_scalar_conversion(lhs, rhs)?;
            if let Some(folded) = fold_binary(op, &lhs, &rhs) {
                return Ok(folded);
            }
            Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                ty: ExprType::long_type(),
            })
        }
        LogicAnd | LogicOr => {
            for side in [&lhs, &rhs] {
                if !side.ty().is_scalar() {
                    return Err(SemanticError::InvalidOperand {
                        operation: format!("{:?} of {}", op, side.ty()),
                    });
                }
            }
            if let (Some(a), Some(b)) = (const_truthiness(&lhs), const_truthiness(&rhs)) {
                let value = if op == LogicAnd { a && b } else { a || b };
                return Ok(Expr::ConstLong(value as i32));
            }
            Ok(Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                ty: ExprType::long_type(),
            })
        }
    }
}

/// Both operands arithmetic: apply the usual arithmetic conversion, fold
/// if constant.
fn arith_binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<Expr, SemanticError> {
    let (lhs, rhs, ty) = usual_arithmetic_conversion(lhs, rhs)?;
    if let Some(folded) = fold_binary(op, &lhs, &rhs) {
        trace!("arith_binary: folded {:?} to {:?}", op, folded);
        return Ok(folded);
    }
    Ok(Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        ty,
    })
}

/// `ptr + n` / `ptr - n`: the index is cast to long and scaled by the
/// pointee size; the result keeps the pointer type.
fn pointer_offset(
    op: BinaryOp,
    pointer: Expr,
    index: Expr,
    records: &RecordRegistry,
) -> Result<Expr, SemanticError> {
    let ptr_ty = pointer.ty();
    let element_size = match &ptr_ty.kind {
        TypeKind::Pointer(pointee) => pointee.size_of(records)?,
        _ => unreachable!("pointer_offset on non-pointer"),
    };
    let index = make_cast(index, ExprType::long_type())?;
    let size = Expr::ConstLong(element_size as i32);
    let scaled = fold_binary(BinaryOp::Mul, &index, &size).unwrap_or(Expr::Binary {
        op: BinaryOp::Mul,
        lhs: Box::new(index),
        rhs: Box::new(size),
        ty: ExprType::long_type(),
    });
    Ok(Expr::Binary {
        op,
        lhs: Box::new(pointer),
        rhs: Box::new(scaled),
        ty: ptr_ty,
    })
}

/// `ptr - ptr`: byte difference divided by the pointee size, as a long.
fn pointer_difference(
    lhs: Expr,
    rhs: Expr,
    records: &RecordRegistry,
) -> Result<Expr, SemanticError> {
    let (lt, rt) = (lhs.ty(), rhs.ty());
    let element_size = match (&lt.kind, &rt.kind) {
        (TypeKind::Pointer(a), TypeKind::Pointer(b)) if a.equal_type(b) => a.size_of(records)?,
        _ => {
            return Err(SemanticError::TypeMismatch {
                expected: lt.to_string(),
                found: rt.to_string(),
            });
        }
    };
    let diff = Expr::Binary {
        op: BinaryOp::Sub,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        ty: ExprType::long_type(),
    };
    Ok(Expr::Binary {
        op: BinaryOp::Div,
        lhs: Box::new(diff),
        rhs: Box::new(Expr::ConstLong(element_size as i32)),
        ty: ExprType::long_type(),
    })
}

fn resolve_unary(op: UnaryOp, operand: Expr) -> Result<Expr, SemanticError> {
    let ty = operand.ty();
    match op {
        UnaryOp::Negate => {
            if !ty.is_arith() {
                return Err(SemanticError::InvalidOperand {
                    operation: format!("negation of {}", ty),
                });
            }
            let operand = promote_integral(operand)?;
            match operand {
                Expr::ConstLong(v) => Ok(Expr::ConstLong(v.wrapping_neg())),
                Expr::ConstULong(v) => Ok(Expr::ConstULong(v.wrapping_neg())),
                Expr::ConstFloat(v) => Ok(Expr::ConstFloat(-v)),
                Expr::ConstDouble(v) => Ok(Expr::ConstDouble(-v)),
                other => {
                    let ty = other.ty();
                    Ok(Expr::Unary {
                        op,
                        operand: Box::new(other),
                        ty,
                    })
                }
            }
        }
        UnaryOp::BitNot => {
            if !ty.is_integral() {
                return Err(SemanticError::InvalidOperand {
                    operation: format!("bitwise not of {}", ty),
                });
            }
            let operand = promote_integral(operand)?;
            match operand {
                Expr::ConstLong(v) => Ok(Expr::ConstLong(!v)),
                Expr::ConstULong(v) => Ok(Expr::ConstULong(!v)),
                other => {
                    let ty = other.ty();
                    Ok(Expr::Unary {
                        op,
                        operand: Box::new(other),
                        ty,
                    })
                }
            }
        }
        UnaryOp::LogicNot => {
            let operand = decay(operand);
            if !operand.ty().is_scalar() {
                return Err(SemanticError::InvalidOperand {
                    operation: format!("logical not of {}", operand.ty()),
                });
            }
            if let Some(truth) = const_truthiness(&operand) {
                return Ok(Expr::ConstLong(!truth as i32));
            }
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                ty: ExprType::long_type(),
            })
        }
    }
}

/// Integral operands below long width promote to long before a unary
/// arithmetic operator applies.
fn promote_integral(expr: Expr) -> Result<Expr, SemanticError> {
    match expr.ty().kind {
        TypeKind::Char | TypeKind::UChar | TypeKind::Short | TypeKind::UShort => {
            make_cast(expr, ExprType::long_type())
        }
        _ => Ok(expr),
    }
}

fn resolve_conditional(
    cond: &tree::Expr,
    true_expr: &tree::Expr,
    false_expr: &tree::Expr,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<Expr, SemanticError> {
    let cond = decay(resolve_expr(cond, env, records)?);
    if !cond.ty().is_scalar() {
        return Err(SemanticError::InvalidOperand {
            operation: format!("conditional on {}", cond.ty()),
        });
    }

    let true_expr = decay(resolve_expr(true_expr, env, records)?);
    let false_expr = decay(resolve_expr(false_expr, env, records)?);
    let (tt, ft) = (true_expr.ty(), false_expr.ty());

    // both arithmetic: unify by the usual arithmetic conversion
    if tt.is_arith() && ft.is_arith() {
        let (true_expr, false_expr, ty) = usual_arithmetic_conversion(true_expr, false_expr)?;
        return Ok(Expr::Conditional {
            cond: Box::new(cond),
            true_expr: Box::new(true_expr),
            false_expr: Box::new(false_expr),
            ty,
        });
    }

    let ty = match (&tt.kind, &ft.kind) {
        (TypeKind::Record { .. }, TypeKind::Record { .. }) => {
            if !tt.equal_type(&ft) {
                return Err(SemanticError::TypeMismatch {
                    expected: tt.to_string(),
                    found: ft.to_string(),
                });
            }
            tt.clone()
        }
        (TypeKind::Void, TypeKind::Void) => ExprType::void(),
        (TypeKind::Pointer(a), TypeKind::Pointer(b)) => {
            if matches!(a.kind, TypeKind::Void) || matches!(b.kind, TypeKind::Void) {
                ExprType::pointer(ExprType::void())
            } else if tt.equal_type(&ft) {
                tt.clone()
            } else {
                return Err(SemanticError::TypeMismatch {
                    expected: tt.to_string(),
                    found: ft.to_string(),
                });
            }
        }
        _ => {
            return Err(SemanticError::TypeMismatch {
                expected: tt.to_string(),
                found: ft.to_string(),
            });
        }
    };

    Ok(Expr::Conditional {
        cond: Box::new(cond),
        true_expr: Box::new(true_expr),
        false_expr: Box::new(false_expr),
        ty,
    })
}

fn resolve_call(
    callee: &tree::Expr,
    args: &[tree::Expr],
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<Expr, SemanticError> {
    let callee = resolve_expr(callee, env, records)?;
    let callee_ty = callee.ty();
    let func = match &callee_ty.kind {
        TypeKind::Function(func) => func.clone(),
        _ => {
            return Err(SemanticError::TypeMismatch {
                expected: "function".to_string(),
                found: callee_ty.to_string(),
            });
        }
    };

    let callee_name = match &callee {
        Expr::Variable { name, .. } => name.to_string(),
        _ => "<expression>".to_string(),
    };
    let arity_ok = if func.is_variadic {
        args.len() >= func.args.len()
    } else {
        args.len() == func.args.len()
    };
    if !arity_ok {
        return Err(SemanticError::ArgumentCountMismatch {
            name: callee_name,
            expected: func.args.len(),
            found: args.len(),
        });
    }

    let mut resolved_args = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let arg = decay(resolve_expr(arg, env, records)?);
        // declared parameters receive an implicit cast; variadic extras
        // pass through unconverted
        let arg = match func.args.get(index) {
            Some(param) => make_cast(arg, param.ty.clone())?,
            None => arg,
        };
        resolved_args.push(arg);
    }

    Ok(Expr::FunctionCall {
        callee: Box::new(callee),
        func,
        args: resolved_args,
    })
}

fn resolve_member(
    base: &tree::Expr,
    member: Symbol,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<Expr, SemanticError> {
    let base = resolve_expr(base, env, records)?;
    let base_ty = base.ty();
    let (handle, tag) = match base_ty.kind {
        TypeKind::Record { handle, tag, .. } => (handle, tag),
        _ => {
            return Err(SemanticError::TypeMismatch {
                expected: "struct or union".to_string(),
                found: base_ty.to_string(),
            });
        }
    };
    if !records.is_complete(handle) {
        return Err(SemanticError::IncompleteType {
            name: tag.to_string(),
        });
    }
    let found = records
        .member(handle, member)
        .ok_or_else(|| SemanticError::UnknownMember {
            name: tag.to_string(),
            member: member.to_string(),
        })?;
    let (offset, ty) = (found.offset, found.ty.clone());
    Ok(Expr::Member {
        base: Box::new(base),
        name: member,
        offset,
        ty,
    })
}

/// Compile-time truthiness of a constant, if the expression is one.
fn const_truthiness(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::ConstLong(v) => Some(*v != 0),
        Expr::ConstULong(v) => Some(*v != 0),
        Expr::ConstFloat(v) => Some(*v != 0.0),
        Expr::ConstDouble(v) => Some(*v != 0.0),
        Expr::ConstPtr(v, _) => Some(*v != 0),
        _ => None,
    }
}

/// Folds a binary operator over two constants of the same (converted)
/// type. Returns `None` when either operand is not a constant, on
/// division by zero, or for meaningless combinations.
fn fold_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    use BinaryOp::*;
    match (lhs, rhs) {
        (Expr::ConstLong(a), Expr::ConstLong(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                Add => Expr::ConstLong(a.wrapping_add(b)),
                Sub => Expr::ConstLong(a.wrapping_sub(b)),
                Mul => Expr::ConstLong(a.wrapping_mul(b)),
                Div if b != 0 => Expr::ConstLong(a.wrapping_div(b)),
                Mod if b != 0 => Expr::ConstLong(a.wrapping_rem(b)),
                LShift => Expr::ConstLong(a.wrapping_shl(b as u32)),
                RShift => Expr::ConstLong(a.wrapping_shr(b as u32)),
                BitAnd => Expr::ConstLong(a & b),
                BitXor => Expr::ConstLong(a ^ b),
                BitOr => Expr::ConstLong(a | b),
                Less => Expr::ConstLong((a < b) as i32),
                Greater => Expr::ConstLong((a > b) as i32),
                LessEqual => Expr::ConstLong((a <= b) as i32),
                GreaterEqual => Expr::ConstLong((a >= b) as i32),
                Equal => Expr::ConstLong((a == b) as i32),
                NotEqual => Expr::ConstLong((a != b) as i32),
                _ => return None,
            })
        }
        (Expr::ConstULong(a), Expr::ConstULong(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                Add => Expr::ConstULong(a.wrapping_add(b)),
                Sub => Expr::ConstULong(a.wrapping_sub(b)),
                Mul => Expr::ConstULong(a.wrapping_mul(b)),
                Div if b != 0 => Expr::ConstULong(a / b),
                Mod if b != 0 => Expr::ConstULong(a % b),
                LShift => Expr::ConstULong(a.wrapping_shl(b)),
                RShift => Expr::ConstULong(a.wrapping_shr(b)),
                BitAnd => Expr::ConstULong(a & b),
                BitXor => Expr::ConstULong(a ^ b),
                BitOr => Expr::ConstULong(a | b),
                Less => Expr::ConstLong((a < b) as i32),
                Greater => Expr::ConstLong((a > b) as i32),
                LessEqual => Expr::ConstLong((a <= b) as i32),
                GreaterEqual => Expr::ConstLong((a >= b) as i32),
                Equal => Expr::ConstLong((a == b) as i32),
                NotEqual => Expr::ConstLong((a != b) as i32),
                _ => return None,
            })
        }
        (Expr::ConstFloat(a), Expr::ConstFloat(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                Add => Expr::ConstFloat(a + b),
                Sub => Expr::ConstFloat(a - b),
                Mul => Expr::ConstFloat(a * b),
                Div => Expr::ConstFloat(a / b),
                Less => Expr::ConstLong((a < b) as i32),
                Greater => Expr::ConstLong((a > b) as i32),
                LessEqual => Expr::ConstLong((a <= b) as i32),
                GreaterEqual => Expr::ConstLong((a >= b) as i32),
                Equal => Expr::ConstLong((a == b) as i32),
                NotEqual => Expr::ConstLong((a != b) as i32),
                _ => return None,
            })
        }
        (Expr::ConstDouble(a), Expr::ConstDouble(b)) => {
            let (a, b) = (*a, *b);
            Some(match op {
                Add => Expr::ConstDouble(a + b),
                Sub => Expr::ConstDouble(a - b),
                Mul => Expr::ConstDouble(a * b),
                Div => Expr::ConstDouble(a / b),
                Less => Expr::ConstLong((a < b) as i32),
                Greater => Expr::ConstLong((a > b) as i32),
                LessEqual => Expr::ConstLong((a <= b) as i32),
                GreaterEqual => Expr::ConstLong((a >= b) as i32),
                Equal => Expr::ConstLong((a == b) as i32),
                NotEqual => Expr::ConstLong((a != b) as i32),
                _ => return None,
            })
        }
        _ => None,
    }
}
