//! Resolution of declarations: declaration specifiers, declarators,
//! struct/union/enum specifiers, type names, and initializers.
//!
//! Declarations are where the environment actually grows, so everything
//! here threads an `Env` through and returns the updated one.

use log::{debug, trace};

use symbol_table::GlobalSymbol as Symbol;

use crate::diagnostic::SemanticError;
use crate::parser::tree;

use super::ast::{Decln, Expr, Initr, StorageClass};
use super::env::{DeclKind, Entry, EntryKind, Env};
use super::expressions::{decay, resolve_expr};
use super::typecast::make_cast;
use super::types::{ExprType, FuncType, Qualifiers, RecordRegistry, TypeKind};

/// The basic type-specifier keywords, ordered for multiset matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BasicSpec {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
}

/// Resolves one declaration into typed declarations, threading the
/// environment through sibling declarators.
pub fn resolve_decln(
    decln: &tree::Decln,
    env: Env,
    records: &mut RecordRegistry,
) -> Result<(Env, Vec<Decln>), SemanticError> {
    let (mut env, storage, base_type) = resolve_decln_specs(&decln.specs, env, records)?;

    let mut resolved = Vec::with_capacity(decln.declrs.len());
    for init_declr in &decln.declrs {
        let (name, ty) = compose_declr(&init_declr.declr, base_type.clone(), &env, records)?;
        let name = name.ok_or(SemanticError::MissingDeclaratorName)?;

        // the storage class picks the entry's location
        let kind = match storage {
            StorageClass::Auto => {
                if env.is_global_scope() {
                    DeclKind::Global
                } else {
                    DeclKind::Stack
                }
            }
            StorageClass::Extern | StorageClass::Static => DeclKind::Global,
            StorageClass::Typedef => DeclKind::Typedef,
        };
        env = env.declare(kind, name, ty.clone(), records)?;
        debug!("resolve_decln: {} '{}' : {}", storage_name(storage), name, ty);

        let init = match &init_declr.init {
            None => None,
            Some(_) if storage == StorageClass::Typedef => {
                return Err(SemanticError::InvalidOperand {
                    operation: format!("initializer on typedef '{}'", name),
                });
            }
            Some(init) => Some(conform_initializer(init, &ty, &env, records)?),
        };

        resolved.push(Decln {
            name,
            storage,
            ty,
            init,
        });
    }

    Ok((env, resolved))
}

fn storage_name(storage: StorageClass) -> &'static str {
    match storage {
        StorageClass::Auto => "auto",
        StorageClass::Static => "static",
        StorageClass::Extern => "extern",
        StorageClass::Typedef => "typedef",
    }
}

/// Extracts the storage class and base type from declaration
/// specifiers. Struct/union/enum specifiers may add entries to the
/// environment, so an updated environment is returned too.
pub fn resolve_decln_specs(
    specs: &tree::DeclnSpecs,
    env: Env,
    records: &mut RecordRegistry,
) -> Result<(Env, StorageClass, ExprType), SemanticError> {
    let storage = match &specs.storage[..] {
        [] => StorageClass::Auto,
        [single] => match single {
            tree::StorageClassSpec::Auto | tree::StorageClassSpec::Register => StorageClass::Auto,
            tree::StorageClassSpec::Static => StorageClass::Static,
            tree::StorageClassSpec::Extern => StorageClass::Extern,
            tree::StorageClassSpec::Typedef => StorageClass::Typedef,
        },
        _ => return Err(SemanticError::DuplicateStorageClass),
    };

    let mut quals = Qualifiers::empty();
    for qual in &specs.quals {
        quals |= match qual {
            tree::TypeQual::Const => Qualifiers::CONST,
            tree::TypeQual::Volatile => Qualifiers::VOLATILE,
        };
    }

    // no type specifier at all: implicit int
    if specs.type_specs.is_empty() {
        return Ok((env, storage, ExprType::long_type().qualified(quals)));
    }

    if specs.type_specs.iter().all(|s| s.is_basic()) {
        let ty = match_basic_specs(&specs.type_specs)?;
        return Ok((env, storage, ty.qualified(quals)));
    }

    // a single non-basic specifier: struct/union/enum/typedef name
    if specs.type_specs.len() == 1 {
        let (env, ty) = match &specs.type_specs[0] {
            tree::TypeSpec::Struct(spec) => {
                resolve_struct_or_union_spec(spec, false, quals, env, records)?
            }
            tree::TypeSpec::Union(spec) => {
                resolve_struct_or_union_spec(spec, true, quals, env, records)?
            }
            tree::TypeSpec::Enum(spec) => resolve_enum_spec(spec, quals, env, records)?,
            tree::TypeSpec::TypedefName(name) => {
                let ty = resolve_typedef_name(*name, quals, &env)?;
                (env, ty)
            }
            _ => unreachable!("basic specifier in non-basic branch"),
        };
        return Ok((env, storage, ty));
    }

    Err(SemanticError::InvalidTypeCombination)
}

/// The fixed table from basic-keyword multisets to canonical types.
fn match_basic_specs(specs: &[tree::TypeSpec]) -> Result<ExprType, SemanticError> {
    use BasicSpec::*;
    let mut sorted: Vec<BasicSpec> = specs
        .iter()
        .map(|s| match s {
            tree::TypeSpec::Void => Void,
            tree::TypeSpec::Char => Char,
            tree::TypeSpec::Short => Short,
            tree::TypeSpec::Int => Int,
            tree::TypeSpec::Long => Long,
            tree::TypeSpec::Float => Float,
            tree::TypeSpec::Double => Double,
            tree::TypeSpec::Signed => Signed,
            tree::TypeSpec::Unsigned => Unsigned,
            _ => unreachable!("non-basic specifier in basic table match"),
        })
        .collect();
    sorted.sort();

    let ty = match sorted.as_slice() {
        [Void] => ExprType::void(),

        [Char] | [Char, Signed] => ExprType::char_type(),
        [Char, Unsigned] => ExprType::uchar(),

        [Short] | [Short, Signed] | [Short, Int] | [Short, Int, Signed] => ExprType::short_type(),
        [Short, Unsigned] | [Short, Int, Unsigned] => ExprType::ushort(),

        [Int] | [Signed] | [Int, Signed] | [Long] | [Long, Signed] | [Int, Long]
        | [Int, Long, Signed] => ExprType::long_type(),
        [Unsigned] | [Int, Unsigned] | [Long, Unsigned] | [Int, Long, Unsigned] => {
            ExprType::ulong()
        }

        [Float] => ExprType::float_type(),
        [Double] | [Long, Double] => ExprType::double_type(),

        _ => return Err(SemanticError::InvalidTypeCombination),
    };
    Ok(ty)
}

fn resolve_typedef_name(
    name: Symbol,
    quals: Qualifiers,
    env: &Env,
) -> Result<ExprType, SemanticError> {
    match env.lookup(name) {
        None => Err(SemanticError::UndeclaredIdentifier {
            name: name.to_string(),
        }),
        Some(Entry {
            kind: EntryKind::Typedef,
            ty,
            ..
        }) => Ok(ty.qualified(quals)),
        Some(_) => Err(SemanticError::TypeMismatch {
            expected: "typedef".to_string(),
            found: name.to_string(),
        }),
    }
}

/// Tag names live in the typedef category under a mangled name, so that
/// `struct X`, `union X`, `enum X`, and a plain variable `X` never
/// collide.
fn mangle_tag(keyword: &str, tag: Symbol) -> Symbol {
    Symbol::from(format!("{} {}", keyword, tag).as_str())
}

/// Resolves a struct/union specifier into a record type.
///
/// A named mention with no body either reuses the existing (possibly
/// incomplete) type or registers a fresh incomplete one. A definition
/// with a body must not collide with an existing complete type of the
/// same tag; it registers an incomplete placeholder first so that
/// self-referential pointer members resolve, then completes the record
/// in place.
fn resolve_struct_or_union_spec(
    spec: &tree::StructOrUnionSpec,
    is_union: bool,
    quals: Qualifiers,
    env: Env,
    records: &mut RecordRegistry,
) -> Result<(Env, ExprType), SemanticError> {
    let keyword = if is_union { "union" } else { "struct" };

    let (env, handle, tag) = match (spec.tag, &spec.members) {
        (None, Some(_)) => {
            // anonymous definition, invisible to the environment
            let tag = Symbol::from("<anonymous>");
            (env, records.declare_incomplete(tag, is_union), tag)
        }
        (None, None) => unreachable!("parser guarantees a tag or a body"),
        (Some(tag), members) => {
            let mangled = mangle_tag(keyword, tag);
            match env.lookup(mangled) {
                Some(Entry {
                    kind: EntryKind::Typedef,
                    ty:
                        ExprType {
                            kind:
                                TypeKind::Record {
                                    handle,
                                    is_union: existing_union,
                                    ..
                                },
                            ..
                        },
                    ..
                }) => {
                    if existing_union != is_union {
                        return Err(SemanticError::Redefinition {
                            name: mangled.to_string(),
                        });
                    }
                    if members.is_some() && records.is_complete(handle) {
                        return Err(SemanticError::Redefinition {
                            name: mangled.to_string(),
                        });
                    }
                    (env, handle, tag)
                }
                Some(_) => {
                    return Err(SemanticError::TypeMismatch {
                        expected: format!("{} type", keyword),
                        found: mangled.to_string(),
                    });
                }
                None => {
                    let handle = records.declare_incomplete(tag, is_union);
                    let ty = ExprType::new(
                        TypeKind::Record {
                            handle,
                            tag,
                            is_union,
                        },
                        Qualifiers::empty(),
                    );
                    let env = env.declare(DeclKind::Typedef, mangled, ty, records)?;
                    (env, handle, tag)
                }
            }
        }
    };

    let ty = ExprType::new(
        TypeKind::Record {
            handle,
            tag,
            is_union,
        },
        quals,
    );

    let Some(member_declns) = &spec.members else {
        return Ok((env, ty));
    };

    // the incomplete placeholder is already registered, so members may
    // point at the record being defined
    let mut env = env;
    let mut members = Vec::new();
    for member_decln in member_declns {
        if !member_decln.specs.storage.is_empty() {
            return Err(SemanticError::InvalidOperand {
                operation: format!("storage class on member of {} {}", keyword, tag),
            });
        }
        let (next_env, _, base) = resolve_decln_specs(&member_decln.specs, env, records)?;
        env = next_env;
        for declr in &member_decln.declrs {
            let (name, member_ty) = compose_declr(declr, base.clone(), &env, records)?;
            let name = name.ok_or(SemanticError::MissingDeclaratorName)?;
            members.push((name, member_ty));
        }
    }
    trace!(
        "resolve_struct_or_union_spec: completing {} {} with {} members",
        keyword,
        tag,
        members.len()
    );
    records.complete(handle, members)?;

    Ok((env, ty))
}

/// Resolves an enum specifier. Enumerators get sequential values from
/// zero; an explicit initializer resets the running counter.
fn resolve_enum_spec(
    spec: &tree::EnumSpec,
    quals: Qualifiers,
    env: Env,
    records: &mut RecordRegistry,
) -> Result<(Env, ExprType), SemanticError> {
    let ty = ExprType::long_type().qualified(quals);

    let Some(enumerators) = &spec.enumerators else {
        // bare mention must refer to a known enum tag
        let tag = spec.tag.expect("parser guarantees a tag or a body");
        let mangled = mangle_tag("enum", tag);
        return match env.lookup(mangled) {
            Some(Entry {
                kind: EntryKind::Typedef,
                ..
            }) => Ok((env, ty)),
            _ => Err(SemanticError::UndeclaredIdentifier {
                name: mangled.to_string(),
            }),
        };
    };

    let mut env = env;
    let mut next_value: i32 = 0;
    for enumerator in enumerators {
        if let Some(init) = &enumerator.init {
            let value = resolve_expr(init, &env, records)?;
            let value = make_cast(value, ExprType::long_type())?;
            let Expr::ConstLong(value) = value else {
                return Err(SemanticError::ExpectedConstant {
                    context: format!("enumerator '{}'", enumerator.name),
                });
            };
            next_value = value;
        }
        env = env.declare_enum(enumerator.name, ExprType::long_type(), next_value);
        next_value = next_value.wrapping_add(1);
    }

    if let Some(tag) = spec.tag {
        let mangled = mangle_tag("enum", tag);
        env = env.declare(DeclKind::Typedef, mangled, ExprType::long_type(), records)?;
    }

    Ok((env, ty))
}

/// Composes a declarator's modifier chain onto a base type. Modifiers
/// are listed innermost first, so the fold runs in reverse.
pub fn compose_declr(
    declr: &tree::Declr,
    base_type: ExprType,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<(Option<Symbol>, ExprType), SemanticError> {
    let mut ty = base_type;
    for modifier in declr.modifiers.iter().rev() {
        ty = match modifier {
            tree::TypeModifier::Pointer(quals) => {
                let mut qual_bits = Qualifiers::empty();
                for qual in quals {
                    qual_bits |= match qual {
                        tree::TypeQual::Const => Qualifiers::CONST,
                        tree::TypeQual::Volatile => Qualifiers::VOLATILE,
                    };
                }
                ExprType::pointer(ty).qualified(qual_bits)
            }
            tree::TypeModifier::Array(size) => {
                // element types must be complete here
                ty.size_of(records)?;
                let length = match size {
                    None => 0,
                    Some(size_expr) => eval_array_size(size_expr, env, records)?,
                };
                ExprType::array(ty, length)
            }
            tree::TypeModifier::Function(params, is_variadic) => {
                let mut resolved = Vec::with_capacity(params.len());
                for param in params {
                    resolved.push(resolve_param_decln(param, env, records)?);
                }
                ExprType::function(FuncType::create(ty, resolved, *is_variadic, records)?)
            }
        };
    }
    Ok((declr.name, ty))
}

/// An array size must be a constant, non-negative expression; it is
/// evaluated (and folded) at the point the modifier applies.
fn eval_array_size(
    size_expr: &tree::Expr,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<usize, SemanticError> {
    let size = resolve_expr(size_expr, env, records)?;
    let size = make_cast(
        size,
        ExprType::long_type().qualified(Qualifiers::CONST | Qualifiers::VOLATILE),
    )?;
    match size {
        Expr::ConstLong(value) if value < 0 => Err(SemanticError::NegativeArraySize { size: value }),
        Expr::ConstLong(value) => Ok(value as usize),
        _ => Err(SemanticError::ExpectedConstant {
            context: "array size".to_string(),
        }),
    }
}

/// A parameter declaration: base specifiers plus a possibly-abstract
/// declarator. Environment changes made by the specifiers are local to
/// the parameter list and are discarded.
fn resolve_param_decln(
    param: &tree::ParamDecln,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<(Option<Symbol>, ExprType), SemanticError> {
    let (param_env, _, base) = resolve_decln_specs(&param.specs, env.clone(), records)?;
    compose_declr(&param.declr, base, &param_env, records)
}

/// Resolves a type name (as used by casts and `sizeof`).
pub fn resolve_type_name(
    type_name: &tree::TypeName,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<ExprType, SemanticError> {
    let (type_env, _, base) = resolve_decln_specs(&type_name.specs, env.clone(), records)?;
    let (_, ty) = compose_declr(&type_name.declr, base, &type_env, records)?;
    Ok(ty)
}

/// Conforms an initializer to the declared type: a bare expression gets
/// an implicit cast; a brace list is matched element-by-element against
/// array elements or record members.
pub fn conform_initializer(
    init: &tree::Initializer,
    ty: &ExprType,
    env: &Env,
    records: &mut RecordRegistry,
) -> Result<Initr, SemanticError> {
    match init {
        tree::Initializer::Expr(expr) => {
            let resolved = decay(resolve_expr(expr, env, records)?);
            Ok(Initr::Expr(make_cast(resolved, ty.clone())?))
        }
        tree::Initializer::List(items) => match &ty.kind {
            TypeKind::Array(element, len) => {
                if *len != 0 && items.len() > *len {
                    return Err(SemanticError::InvalidOperand {
                        operation: format!("{} initializers for array of {}", items.len(), len),
                    });
                }
                let conformed = items
                    .iter()
                    .map(|item| conform_initializer(item, element, env, records))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Initr::List(conformed))
            }
            TypeKind::Record { handle, tag, .. } => {
                let member_types: Vec<ExprType> = records
                    .members(*handle)
                    .ok_or_else(|| SemanticError::IncompleteType {
                        name: tag.to_string(),
                    })?
                    .iter()
                    .map(|m| m.ty.clone())
                    .collect();
                if items.len() > member_types.len() {
                    return Err(SemanticError::InvalidOperand {
                        operation: format!("too many initializers for {}", ty),
                    });
                }
                let conformed = items
                    .iter()
                    .zip(member_types.iter())
                    .map(|(item, member_ty)| conform_initializer(item, member_ty, env, records))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Initr::List(conformed))
            }
            // a scalar wrapped in braces: { expr }
            _ if items.len() == 1 => conform_initializer(&items[0], ty, env, records),
            _ => Err(SemanticError::InvalidOperand {
                operation: format!("brace initializer for {}", ty),
            }),
        },
    }
}
