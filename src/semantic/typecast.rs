//! The type-cast and conversion engine.
//!
//! `make_cast` reproduces C's implicit conversion sequences on the
//! 32-bit model, dispatching on the source/target category:
//!
//! - pointer ↔ pointer is a bit-identical no-op;
//! - pointer ↔ integral goes through an unsigned-long-width value;
//! - signed/unsigned integral conversions insert explicit widen or
//!   truncate steps, and signed→floating routes through long;
//! - float/double → unsigned short/char routes through a long
//!   intermediate (float does not convert directly to unsigned char);
//! - double → char/short routes through float.
//!
//! Whenever the operand is a compile-time constant the conversion is
//! evaluated immediately, producing a new constant literal instead of a
//! runtime cast node. Truncations use C semantics: a constant long cast
//! to char truncates to 8 bits and sign-extends.
//!
//! Unsigned long is treated like long when converting to floating types
//! at runtime. This is a known simplification, wrong for magnitudes
//! above 2^31, kept deliberately.

use log::trace;

use crate::diagnostic::SemanticError;

use super::ast::{CastKind, Expr};
use super::types::{ExprType, TypeKind};

fn cast(kind: CastKind, operand: Expr, ty: ExprType) -> Expr {
    Expr::Cast {
        kind,
        operand: Box::new(operand),
        ty,
    }
}

fn unsupported(from: &ExprType, to: &ExprType) -> SemanticError {
    SemanticError::UnsupportedCast {
        from: from.to_string(),
        to: to.to_string(),
    }
}

/// Converts `expr` to `target`. A no-op if the types are already equal.
pub fn make_cast(expr: Expr, target: ExprType) -> Result<Expr, SemanticError> {
    let source = expr.ty();
    if source.equal_type(&target) {
        return Ok(expr);
    }
    trace!("make_cast: {} -> {}", source, target);

    if matches!(source.kind, TypeKind::Pointer(_)) {
        return from_pointer(expr, target);
    }
    if matches!(target.kind, TypeKind::Pointer(_)) {
        return to_pointer(expr, target);
    }

    match source.kind {
        TypeKind::Char | TypeKind::Short | TypeKind::Long => signed_integral_to_arith(expr, target),
        TypeKind::UChar | TypeKind::UShort | TypeKind::ULong => {
            unsigned_integral_to_arith(expr, target)
        }
        TypeKind::Float | TypeKind::Double => float_to_arith(expr, target),
        _ => Err(unsupported(&source, &target)),
    }
}

/// A long type carrying the target's qualifiers, used for the
/// intermediate step of routed conversions.
fn long_like(target: &ExprType) -> ExprType {
    ExprType::long_type().qualified(target.quals)
}

/// Conversions out of char, short, and long.
fn signed_integral_to_arith(expr: Expr, target: ExprType) -> Result<Expr, SemanticError> {
    let source = expr.ty();
    match source.kind {
        TypeKind::Char => match target.kind {
            TypeKind::Short | TypeKind::UShort => Ok(cast(CastKind::Int8ToInt16, expr, target)),
            TypeKind::Long | TypeKind::ULong => Ok(cast(CastKind::Int8ToInt32, expr, target)),
            TypeKind::UChar => Ok(cast(CastKind::Nop, expr, target)),
            TypeKind::Float => {
                // char -> long -> float
                let widened = cast(CastKind::Int8ToInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToFloat, widened, target))
            }
            TypeKind::Double => {
                // char -> long -> double
                let widened = cast(CastKind::Int8ToInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToDouble, widened, target))
            }
            _ => Err(unsupported(&source, &target)),
        },
        TypeKind::Short => match target.kind {
            TypeKind::Char | TypeKind::UChar => Ok(cast(CastKind::PreserveInt8, expr, target)),
            TypeKind::UShort => Ok(cast(CastKind::Nop, expr, target)),
            TypeKind::Long | TypeKind::ULong => Ok(cast(CastKind::Int16ToInt32, expr, target)),
            TypeKind::Float => {
                let widened = cast(CastKind::Int16ToInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToFloat, widened, target))
            }
            TypeKind::Double => {
                let widened = cast(CastKind::Int16ToInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToDouble, widened, target))
            }
            _ => Err(unsupported(&source, &target)),
        },
        TypeKind::Long => {
            // constants fold immediately, with C truncation semantics
            if let Expr::ConstLong(value) = expr {
                return match target.kind {
                    TypeKind::Char => Ok(Expr::ConstLong(value as i8 as i32)),
                    TypeKind::UChar => Ok(Expr::ConstULong(value as u8 as u32)),
                    TypeKind::Short => Ok(Expr::ConstLong(value as i16 as i32)),
                    TypeKind::UShort => Ok(Expr::ConstULong(value as u16 as u32)),
                    TypeKind::ULong => Ok(Expr::ConstULong(value as u32)),
                    TypeKind::Float => Ok(Expr::ConstFloat(value as f32)),
                    TypeKind::Double => Ok(Expr::ConstDouble(value as f64)),
                    _ => Err(unsupported(&source, &target)),
                };
            }
            match target.kind {
                TypeKind::Char | TypeKind::UChar => Ok(cast(CastKind::PreserveInt8, expr, target)),
                TypeKind::Short | TypeKind::UShort => {
                    Ok(cast(CastKind::PreserveInt16, expr, target))
                }
                TypeKind::ULong => Ok(cast(CastKind::Nop, expr, target)),
                TypeKind::Float => Ok(cast(CastKind::Int32ToFloat, expr, target)),
                TypeKind::Double => Ok(cast(CastKind::Int32ToDouble, expr, target)),
                _ => Err(unsupported(&source, &target)),
            }
        }
        _ => Err(unsupported(&source, &target)),
    }
}

/// Conversions out of unsigned char, unsigned short, and unsigned long.
fn unsigned_integral_to_arith(expr: Expr, target: ExprType) -> Result<Expr, SemanticError> {
    let source = expr.ty();
    match source.kind {
        TypeKind::UChar => match target.kind {
            TypeKind::Char => Ok(cast(CastKind::Nop, expr, target)),
            TypeKind::Short | TypeKind::UShort => Ok(cast(CastKind::UInt8ToUInt16, expr, target)),
            TypeKind::Long | TypeKind::ULong => Ok(cast(CastKind::UInt8ToUInt32, expr, target)),
            TypeKind::Float => {
                // uchar -> ulong -> float
                let widened = cast(CastKind::UInt8ToUInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToFloat, widened, target))
            }
            TypeKind::Double => {
                let widened = cast(CastKind::UInt8ToUInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToDouble, widened, target))
            }
            _ => Err(unsupported(&source, &target)),
        },
        TypeKind::UShort => match target.kind {
            TypeKind::Char | TypeKind::UChar => Ok(cast(CastKind::PreserveInt8, expr, target)),
            TypeKind::Short => Ok(cast(CastKind::Nop, expr, target)),
            TypeKind::Long | TypeKind::ULong => Ok(cast(CastKind::UInt16ToUInt32, expr, target)),
            TypeKind::Float => {
                let widened = cast(CastKind::UInt16ToUInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToFloat, widened, target))
            }
            TypeKind::Double => {
                let widened = cast(CastKind::UInt16ToUInt32, expr, long_like(&target));
                Ok(cast(CastKind::Int32ToDouble, widened, target))
            }
            _ => Err(unsupported(&source, &target)),
        },
        TypeKind::ULong => {
            if let Expr::ConstULong(value) = expr {
                return match target.kind {
                    TypeKind::Char => Ok(Expr::ConstLong(value as i8 as i32)),
                    TypeKind::UChar => Ok(Expr::ConstULong(value as u8 as u32)),
                    TypeKind::Short => Ok(Expr::ConstLong(value as i16 as i32)),
                    TypeKind::UShort => Ok(Expr::ConstULong(value as u16 as u32)),
                    TypeKind::Long => Ok(Expr::ConstLong(value as i32)),
                    TypeKind::Float => Ok(Expr::ConstFloat(value as f32)),
                    TypeKind::Double => Ok(Expr::ConstDouble(value as f64)),
                    _ => Err(unsupported(&source, &target)),
                };
            }
            match target.kind {
                TypeKind::Char | TypeKind::UChar => Ok(cast(CastKind::PreserveInt8, expr, target)),
                TypeKind::Short | TypeKind::UShort => {
                    Ok(cast(CastKind::PreserveInt16, expr, target))
                }
                TypeKind::Long => Ok(cast(CastKind::Nop, expr, target)),
                // unsigned long behaves like long here; see module docs
                TypeKind::Float => Ok(cast(CastKind::Int32ToFloat, expr, target)),
                TypeKind::Double => Ok(cast(CastKind::Int32ToDouble, expr, target)),
                _ => Err(unsupported(&source, &target)),
            }
        }
        _ => Err(unsupported(&source, &target)),
    }
}

/// Conversions out of float and double.
fn float_to_arith(expr: Expr, target: ExprType) -> Result<Expr, SemanticError> {
    let source = expr.ty();
    match source.kind {
        TypeKind::Float => {
            if let Expr::ConstFloat(value) = expr {
                let as_long = value as i32;
                return match target.kind {
                    TypeKind::Char => Ok(Expr::ConstLong(as_long as i8 as i32)),
                    TypeKind::UChar => Ok(Expr::ConstULong(as_long as u8 as u32)),
                    TypeKind::Short => Ok(Expr::ConstLong(as_long as i16 as i32)),
                    TypeKind::UShort => Ok(Expr::ConstULong(as_long as u16 as u32)),
                    TypeKind::Long => Ok(Expr::ConstLong(as_long)),
                    TypeKind::ULong => Ok(Expr::ConstULong(value as u32)),
                    TypeKind::Double => Ok(Expr::ConstDouble(value as f64)),
                    _ => Err(unsupported(&source, &target)),
                };
            }
            match target.kind {
                TypeKind::Char | TypeKind::UChar => {
                    // float -> long -> char; float never converts
                    // directly to a char-width type
                    let as_long = cast(CastKind::FloatToInt32, expr, long_like(&target));
                    Ok(cast(CastKind::PreserveInt8, as_long, target))
                }
                TypeKind::Short | TypeKind::UShort => {
                    let as_long = cast(CastKind::FloatToInt32, expr, long_like(&target));
                    Ok(cast(CastKind::PreserveInt16, as_long, target))
                }
                TypeKind::Long | TypeKind::ULong => Ok(cast(CastKind::FloatToInt32, expr, target)),
                TypeKind::Double => Ok(cast(CastKind::FloatToDouble, expr, target)),
                _ => Err(unsupported(&source, &target)),
            }
        }
        TypeKind::Double => {
            if let Expr::ConstDouble(value) = expr {
                let as_long = value as i32;
                return match target.kind {
                    TypeKind::Char => Ok(Expr::ConstLong(as_long as i8 as i32)),
                    TypeKind::UChar => Ok(Expr::ConstULong(as_long as u8 as u32)),
                    TypeKind::Short => Ok(Expr::ConstLong(as_long as i16 as i32)),
                    TypeKind::UShort => Ok(Expr::ConstULong(as_long as u16 as u32)),
                    TypeKind::Long => Ok(Expr::ConstLong(as_long)),
                    TypeKind::ULong => Ok(Expr::ConstULong(value as u32)),
                    TypeKind::Float => Ok(Expr::ConstFloat(value as f32)),
                    _ => Err(unsupported(&source, &target)),
                };
            }
            match target.kind {
                TypeKind::Char | TypeKind::Short => {
                    // double -> float -> char/short
                    let narrowed = float_to_arith(
                        expr,
                        ExprType::float_type().qualified(target.quals),
                    )?;
                    float_to_arith(narrowed, target)
                }
                TypeKind::UChar => {
                    let as_long = cast(CastKind::DoubleToInt32, expr, long_like(&target));
                    Ok(cast(CastKind::PreserveInt8, as_long, target))
                }
                TypeKind::UShort => {
                    // double -> long -> ushort
                    let as_long = cast(CastKind::DoubleToInt32, expr, long_like(&target));
                    Ok(cast(CastKind::PreserveInt16, as_long, target))
                }
                TypeKind::Long | TypeKind::ULong => Ok(cast(CastKind::DoubleToInt32, expr, target)),
                TypeKind::Float => Ok(cast(CastKind::DoubleToFloat, expr, target)),
                _ => Err(unsupported(&source, &target)),
            }
        }
        _ => Err(unsupported(&source, &target)),
    }
}

/// Casting out of a pointer: to another pointer (no-op) or to an
/// integral, going through an unsigned-long-width value.
fn from_pointer(expr: Expr, target: ExprType) -> Result<Expr, SemanticError> {
    let source = expr.ty();

    if matches!(target.kind, TypeKind::Pointer(_)) {
        return Ok(match expr {
            Expr::ConstPtr(value, _) => Expr::ConstPtr(value, target),
            _ => cast(CastKind::Nop, expr, target),
        });
    }

    if target.is_integral() {
        // pointer -> ulong -> target integral
        let as_ulong = match expr {
            Expr::ConstPtr(value, _) => Expr::ConstULong(value),
            _ => cast(CastKind::Nop, expr, ExprType::ulong().qualified(target.quals)),
        };
        if matches!(target.kind, TypeKind::ULong) {
            return Ok(as_ulong);
        }
        return unsigned_integral_to_arith(as_ulong, target);
    }

    Err(unsupported(&source, &target))
}

/// Casting into a pointer: from another pointer (no-op) or from an
/// integral, widening or narrowing to unsigned-long width first.
fn to_pointer(expr: Expr, target: ExprType) -> Result<Expr, SemanticError> {
    let source = expr.ty();

    if matches!(source.kind, TypeKind::Pointer(_)) {
        return Ok(match expr {
            Expr::ConstPtr(value, _) => Expr::ConstPtr(value, target),
            _ => cast(CastKind::Nop, expr, target),
        });
    }

    if source.is_integral() {
        let ulong = ExprType::ulong().qualified(target.quals);
        let as_ulong = match source.kind {
            TypeKind::Char | TypeKind::Short | TypeKind::Long => {
                signed_integral_to_arith(expr, ulong)?
            }
            TypeKind::UChar | TypeKind::UShort => unsigned_integral_to_arith(expr, ulong)?,
            _ => expr, // already unsigned long width
        };
        return Ok(match as_ulong {
            Expr::ConstULong(value) => Expr::ConstPtr(value, target),
            other => cast(CastKind::Nop, other, target),
        });
    }

    Err(unsupported(&source, &target))
}

/// C's usual arithmetic conversion: double beats float beats unsigned
/// long beats long. Both operands are cast to the winning kind, each
/// keeping its own qualifiers; the returned type is the unqualified
/// winner.
pub fn usual_arithmetic_conversion(
    e1: Expr,
    e2: Expr,
) -> Result<(Expr, Expr, ExprType), SemanticError> {
    let t1 = e1.ty();
    let t2 = e2.ty();
    if !t1.is_arith() || !t2.is_arith() {
        return Err(SemanticError::InvalidOperand {
            operation: format!("arithmetic conversion of {} and {}", t1, t2),
        });
    }

    let winner = if matches!(t1.kind, TypeKind::Double) || matches!(t2.kind, TypeKind::Double) {
        ExprType::double_type()
    } else if matches!(t1.kind, TypeKind::Float) || matches!(t2.kind, TypeKind::Float) {
        ExprType::float_type()
    } else if matches!(t1.kind, TypeKind::ULong) || matches!(t2.kind, TypeKind::ULong) {
        ExprType::ulong()
    } else {
        ExprType::long_type()
    };

    let e1 = make_cast(e1, winner.clone().qualified(t1.quals))?;
    let e2 = make_cast(e2, winner.clone().qualified(t2.quals))?;
    Ok((e1, e2, winner))
}

/// Usual scalar conversion: demote pointer operands to unsigned long,
/// then apply the usual arithmetic conversion.
pub fn usual_scalar_conversion(
    e1: Expr,
    e2: Expr,
) -> Result<(Expr, Expr, ExprType), SemanticError> {
    let mut e1 = e1;
    let mut e2 = e2;
    if matches!(e1.ty().kind, TypeKind::Pointer(_)) {
        let quals = e1.ty().quals;
        e1 = from_pointer(e1, ExprType::ulong().qualified(quals))?;
    }
    if matches!(e2.ty().kind, TypeKind::Pointer(_)) {
        let quals = e2.ty().quals;
        e2 = from_pointer(e2, ExprType::ulong().qualified(quals))?;
    }
    usual_arithmetic_conversion(e1, e2)
}
