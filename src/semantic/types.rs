//! The semantic type system.
//!
//! `ExprType` is the closed set of types an expression can have, distinct
//! from the syntactic specifier constructs used in parsing. The target
//! model is 32-bit x86: char is 1 byte, short 2, long/pointer/float 4,
//! double 8, and `int` is the same type as `long`.
//!
//! Struct and union types are handles into a `RecordRegistry` side table.
//! The handle is allocated at the first mention of a tag (incomplete);
//! completing the record fills the side-table entry exactly once, so
//! pointer types taken out before completion stay valid.

use std::fmt::{self, Display, Formatter};
use std::num::NonZeroU32;
use std::rc::Rc;

use bitflags::bitflags;
use itertools::Itertools;
use symbol_table::GlobalSymbol as Symbol;

use crate::diagnostic::SemanticError;

pub const CHAR_SIZE: usize = 1;
pub const SHORT_SIZE: usize = 2;
pub const LONG_SIZE: usize = 4;
pub const FLOAT_SIZE: usize = 4;
pub const DOUBLE_SIZE: usize = 8;
pub const POINTER_SIZE: usize = 4;

/// Round `n` up to the next multiple of `align`.
pub(crate) fn round_up(n: usize, align: usize) -> usize {
    debug_assert!(align > 0);
    n.div_ceil(align) * align
}

bitflags! {
    /// const/volatile qualifier bits carried by every type value.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Qualifiers: u8 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
    }
}

impl Display for Qualifiers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.contains(Qualifiers::CONST) {
            write!(f, "const ")?;
        }
        if self.contains(Qualifiers::VOLATILE) {
            write!(f, "volatile ")?;
        }
        Ok(())
    }
}

/// The kind of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    Char,
    UChar,
    Short,
    UShort,
    Long,
    ULong,
    Float,
    Double,
    Pointer(Box<ExprType>),
    /// Element type and length; an unbound `[]` has length zero.
    Array(Box<ExprType>, usize),
    Function(Rc<FuncType>),
    Record {
        handle: RecordRef,
        tag: Symbol,
        is_union: bool,
    },
}

/// A qualified type: a kind plus const/volatile bits.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprType {
    pub kind: TypeKind,
    pub quals: Qualifiers,
}

impl ExprType {
    pub fn new(kind: TypeKind, quals: Qualifiers) -> Self {
        ExprType { kind, quals }
    }

    pub fn void() -> Self {
        Self::new(TypeKind::Void, Qualifiers::empty())
    }
    pub fn char_type() -> Self {
        Self::new(TypeKind::Char, Qualifiers::empty())
    }
    pub fn uchar() -> Self {
        Self::new(TypeKind::UChar, Qualifiers::empty())
    }
    pub fn short_type() -> Self {
        Self::new(TypeKind::Short, Qualifiers::empty())
    }
    pub fn ushort() -> Self {
        Self::new(TypeKind::UShort, Qualifiers::empty())
    }
    pub fn long_type() -> Self {
        Self::new(TypeKind::Long, Qualifiers::empty())
    }
    pub fn ulong() -> Self {
        Self::new(TypeKind::ULong, Qualifiers::empty())
    }
    pub fn float_type() -> Self {
        Self::new(TypeKind::Float, Qualifiers::empty())
    }
    pub fn double_type() -> Self {
        Self::new(TypeKind::Double, Qualifiers::empty())
    }
    pub fn pointer(to: ExprType) -> Self {
        Self::new(TypeKind::Pointer(Box::new(to)), Qualifiers::empty())
    }
    pub fn array(of: ExprType, len: usize) -> Self {
        Self::new(TypeKind::Array(Box::new(of), len), Qualifiers::empty())
    }
    pub fn function(func: Rc<FuncType>) -> Self {
        Self::new(TypeKind::Function(func), Qualifiers::empty())
    }

    /// The same type with the given qualifier bits added.
    pub fn qualified(mut self, quals: Qualifiers) -> Self {
        self.quals |= quals;
        self
    }

    pub fn is_const(&self) -> bool {
        self.quals.contains(Qualifiers::CONST)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Char
                | TypeKind::UChar
                | TypeKind::Short
                | TypeKind::UShort
                | TypeKind::Long
                | TypeKind::ULong
        )
    }

    pub fn is_arith(&self) -> bool {
        self.is_integral() || matches!(self.kind, TypeKind::Float | TypeKind::Double)
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arith() || matches!(self.kind, TypeKind::Pointer(_))
    }

    /// Structural type equality, ignoring qualifiers at every level.
    /// Record types compare by handle.
    pub fn equal_type(&self, other: &ExprType) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Pointer(a), TypeKind::Pointer(b)) => a.equal_type(b),
            (TypeKind::Array(a, n), TypeKind::Array(b, m)) => n == m && a.equal_type(b),
            (TypeKind::Function(a), TypeKind::Function(b)) => {
                a.is_variadic == b.is_variadic
                    && a.ret.equal_type(&b.ret)
                    && a.args.len() == b.args.len()
                    && a.args
                        .iter()
                        .zip(b.args.iter())
                        .all(|(x, y)| x.ty.equal_type(&y.ty))
            }
            (TypeKind::Record { handle: a, .. }, TypeKind::Record { handle: b, .. }) => a == b,
            (a, b) => a == b,
        }
    }

    /// The size of a value of this type, in bytes.
    pub fn size_of(&self, records: &RecordRegistry) -> Result<usize, SemanticError> {
        match &self.kind {
            TypeKind::Void => Err(SemanticError::InvalidOperand {
                operation: "sizeof void".to_string(),
            }),
            TypeKind::Char | TypeKind::UChar => Ok(CHAR_SIZE),
            TypeKind::Short | TypeKind::UShort => Ok(SHORT_SIZE),
            TypeKind::Long | TypeKind::ULong => Ok(LONG_SIZE),
            TypeKind::Float => Ok(FLOAT_SIZE),
            TypeKind::Double => Ok(DOUBLE_SIZE),
            TypeKind::Pointer(_) => Ok(POINTER_SIZE),
            TypeKind::Array(element, len) => Ok(element.size_of(records)? * len),
            TypeKind::Function(_) => Err(SemanticError::InvalidOperand {
                operation: "sizeof function".to_string(),
            }),
            TypeKind::Record { handle, .. } => records.size_align(*handle).map(|(size, _)| size),
        }
    }

    /// The alignment of this type, in bytes. Doubles align to 4 on the
    /// 32-bit target.
    pub fn align_of(&self, records: &RecordRegistry) -> Result<usize, SemanticError> {
        match &self.kind {
            TypeKind::Double => Ok(LONG_SIZE),
            TypeKind::Array(element, _) => element.align_of(records),
            TypeKind::Record { handle, .. } => records.size_align(*handle).map(|(_, align)| align),
            _ => self.size_of(records),
        }
    }
}

impl Display for ExprType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quals)?;
        match &self.kind {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Char => write!(f, "char"),
            TypeKind::UChar => write!(f, "unsigned char"),
            TypeKind::Short => write!(f, "short"),
            TypeKind::UShort => write!(f, "unsigned short"),
            TypeKind::Long => write!(f, "long"),
            TypeKind::ULong => write!(f, "unsigned long"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Double => write!(f, "double"),
            TypeKind::Pointer(to) => write!(f, "pointer to {}", to),
            TypeKind::Array(of, len) => write!(f, "array of {} {}", len, of),
            TypeKind::Function(func) => write!(
                f,
                "function({}) -> {}",
                func.args.iter().map(|a| a.ty.to_string()).format(", "),
                func.ret
            ),
            TypeKind::Record { tag, is_union, .. } => {
                write!(f, "{} {}", if *is_union { "union" } else { "struct" }, tag)
            }
        }
    }
}

/// A function type: return type, ordered parameters with their frame
/// offsets, and the variadic flag.
#[derive(Debug, PartialEq)]
pub struct FuncType {
    pub ret: ExprType,
    pub args: Vec<FuncArg>,
    pub is_variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncArg {
    pub name: Option<Symbol>,
    pub ty: ExprType,
    /// Offset from the frame base: the argument lives at `%ebp + offset`.
    pub offset: usize,
}

impl FuncType {
    /// Builds a function type, laying out the arguments above the saved
    /// frame pointer and return address. Each argument occupies at least
    /// one 4-byte stack slot.
    pub fn create(
        ret: ExprType,
        params: Vec<(Option<Symbol>, ExprType)>,
        is_variadic: bool,
        records: &RecordRegistry,
    ) -> Result<Rc<FuncType>, SemanticError> {
        let mut offset = 2 * LONG_SIZE;
        let mut args = Vec::with_capacity(params.len());
        for (name, ty) in params {
            let size = ty.size_of(records)?;
            let align = round_up(ty.align_of(records)?, LONG_SIZE);
            offset = round_up(offset, align);
            args.push(FuncArg { name, ty, offset });
            offset += round_up(size, LONG_SIZE);
        }
        Ok(Rc::new(FuncType {
            ret,
            args,
            is_variadic,
        }))
    }
}

/// Opaque handle for a struct/union type. Internally index + 1 so the
/// niche optimization applies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct RecordRef(NonZeroU32);

impl RecordRef {
    fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(RecordRef)
    }

    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Display for RecordRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RecordRef({})", self.get())
    }
}

/// One member of a complete record, with its byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMember {
    pub name: Symbol,
    pub ty: ExprType,
    pub offset: usize,
}

#[derive(Debug)]
struct RecordData {
    tag: Symbol,
    is_union: bool,
    /// `None` while the type is incomplete.
    members: Option<Vec<RecordMember>>,
    size: usize,
    align: usize,
}

/// The side table holding struct/union member layouts, keyed by
/// `RecordRef`.
#[derive(Debug, Default)]
pub struct RecordRegistry {
    records: Vec<RecordData>,
}

impl RecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a handle for a newly mentioned tag. The type starts
    /// incomplete.
    pub fn declare_incomplete(&mut self, tag: Symbol, is_union: bool) -> RecordRef {
        self.records.push(RecordData {
            tag,
            is_union,
            members: None,
            size: 0,
            align: 1,
        });
        RecordRef::new(self.records.len() as u32).expect("ICE: record handle overflow")
    }

    pub fn is_complete(&self, handle: RecordRef) -> bool {
        self.records[handle.index()].members.is_some()
    }

    pub fn tag(&self, handle: RecordRef) -> Symbol {
        self.records[handle.index()].tag
    }

    /// Fills in the member list, turning the incomplete type into a
    /// complete one. This is a defined-once operation: completing a
    /// record twice is an error.
    pub fn complete(
        &mut self,
        handle: RecordRef,
        members: Vec<(Symbol, ExprType)>,
    ) -> Result<(), SemanticError> {
        if self.is_complete(handle) {
            return Err(SemanticError::Redefinition {
                name: self.records[handle.index()].tag.to_string(),
            });
        }

        let is_union = self.records[handle.index()].is_union;
        let mut laid_out = Vec::with_capacity(members.len());
        let mut offset = 0usize;
        let mut max_size = 0usize;
        let mut max_align = 1usize;
        for (name, ty) in members {
            let size = ty.size_of(self)?;
            let align = ty.align_of(self)?;
            max_align = max_align.max(align);
            let member_offset = if is_union {
                max_size = max_size.max(size);
                0
            } else {
                offset = round_up(offset, align);
                let at = offset;
                offset += size;
                at
            };
            laid_out.push(RecordMember {
                name,
                ty,
                offset: member_offset,
            });
        }

        let total = if is_union { max_size } else { offset };
        let data = &mut self.records[handle.index()];
        data.size = round_up(total, max_align);
        data.align = max_align;
        data.members = Some(laid_out);
        Ok(())
    }

    /// The member list of a complete record; `None` while incomplete.
    pub fn members(&self, handle: RecordRef) -> Option<&[RecordMember]> {
        self.records[handle.index()].members.as_deref()
    }

    pub fn member(&self, handle: RecordRef, name: Symbol) -> Option<&RecordMember> {
        self.members(handle)?.iter().find(|m| m.name == name)
    }

    pub fn size_align(&self, handle: RecordRef) -> Result<(usize, usize), SemanticError> {
        let data = &self.records[handle.index()];
        if data.members.is_none() {
            return Err(SemanticError::IncompleteType {
                name: data.tag.to_string(),
            });
        }
        Ok((data.size, data.align))
    }
}
