//! The untyped parse tree.
//!
//! Nodes are built bottom-up during parsing, own their children outright,
//! and are never mutated. They carry no resolved type information; the
//! semantic resolver turns them into `semantic::ast` nodes and then the
//! tree is discarded.

use symbol_table::GlobalSymbol as Symbol;
use thin_vec::ThinVec;

use crate::token::{FloatSuffix, IntSuffix};

/// Binary operators that survive into the parse tree. Assignment and the
/// comma operator have their own node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LShift,
    RShift,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitXor,
    BitOr,
    LogicAnd,
    LogicOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    BitNot,
    LogicNot,
}

/// An expression node.
///
/// Note the absences: there is no array-subscript node (`a[i]` is
/// desugared to `*(a + i)` at parse time) and no arrow node (`a->b`
/// becomes `(*a).b`).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Variable(Symbol),
    ConstInt(i64, IntSuffix),
    ConstFloat(f64, FloatSuffix),
    StringLiteral(Symbol),
    /// A `,`-separated list of assignment expressions; its value is the
    /// value of the last element.
    AssignmentList(ThinVec<Expr>),
    Assignment(Box<Expr>, Box<Expr>),
    /// Compound assignment: `a op= b`.
    OpAssignment(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    PreIncrement(Box<Expr>),
    PreDecrement(Box<Expr>),
    PostIncrement(Box<Expr>),
    PostDecrement(Box<Expr>),
    Cast(Box<TypeName>, Box<Expr>),
    SizeofType(Box<TypeName>),
    SizeofExpr(Box<Expr>),
    FunctionCall(Box<Expr>, ThinVec<Expr>),
    /// `base.member` (also the result of desugaring `base->member`).
    Member(Box<Expr>, Symbol),
    /// `&expr`
    Reference(Box<Expr>),
    /// `*expr`
    Dereference(Box<Expr>),
}

/// Storage class specifier keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClassSpec {
    Auto,
    Register,
    Static,
    Extern,
    Typedef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeQual {
    Const,
    Volatile,
}

/// A single type specifier. Basic keywords are collected as a multiset
/// and matched against a fixed table during resolution; the non-basic
/// specifiers (struct/union/enum/typedef-name) appear at most once.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    TypedefName(Symbol),
    Struct(StructOrUnionSpec),
    Union(StructOrUnionSpec),
    Enum(EnumSpec),
}

impl TypeSpec {
    pub fn is_basic(&self) -> bool {
        !matches!(
            self,
            TypeSpec::TypedefName(_) | TypeSpec::Struct(_) | TypeSpec::Union(_) | TypeSpec::Enum(_)
        )
    }
}

/// `struct tag { members }` in all its partial forms: at least one of
/// `tag` and `members` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct StructOrUnionSpec {
    pub tag: Option<Symbol>,
    pub members: Option<Vec<StructDecln>>,
}

/// One member declaration line inside a struct or union body.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecln {
    pub specs: DeclnSpecs,
    pub declrs: ThinVec<Declr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSpec {
    pub tag: Option<Symbol>,
    pub enumerators: Option<ThinVec<Enumerator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerator {
    pub name: Symbol,
    pub init: Option<Expr>,
}

/// Declaration specifiers: storage classes, type specifiers, qualifiers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeclnSpecs {
    pub storage: ThinVec<StorageClassSpec>,
    pub type_specs: ThinVec<TypeSpec>,
    pub quals: ThinVec<TypeQual>,
}

impl DeclnSpecs {
    /// Used by the parser to register typedef names as soon as the
    /// declaration is parsed.
    pub fn is_typedef(&self) -> bool {
        self.storage.contains(&StorageClassSpec::Typedef)
    }
}

/// A type modifier in a declarator chain.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeModifier {
    /// `*` with its qualifier list.
    Pointer(ThinVec<TypeQual>),
    /// `[n]`; `None` is an unbound `[]`.
    Array(Option<Expr>),
    /// `(params)` with the variadic flag.
    Function(ThinVec<ParamDecln>, bool),
}

/// A declarator: an optional name plus its modifier chain, listed
/// innermost first. Composing the final type folds the chain in reverse.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declr {
    pub name: Option<Symbol>,
    pub modifiers: ThinVec<TypeModifier>,
}

impl Declr {
    pub fn is_abstract(&self) -> bool {
        self.name.is_none()
    }
}

/// A parameter declaration; the declarator may be abstract (`int foo(int)`).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecln {
    pub specs: DeclnSpecs,
    pub declr: Declr,
}

/// A type name as used by casts and `sizeof`: specifiers plus an
/// abstract declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub specs: DeclnSpecs,
    pub declr: Declr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expr(Expr),
    List(ThinVec<Initializer>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitDeclr {
    pub declr: Declr,
    pub init: Option<Initializer>,
}

/// One declaration: specifiers plus zero or more init-declarators.
/// Zero declarators is legal for struct/union/enum definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Decln {
    pub specs: DeclnSpecs,
    pub declrs: ThinVec<InitDeclr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Decln(Decln),
    Stmt(Stmt),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Empty,
    Expr(Expr),
    Compound(ThinVec<BlockItem>),
    If(Box<Expr>, Box<Stmt>),
    IfElse(Box<Expr>, Box<Stmt>, Box<Stmt>),
    While(Box<Expr>, Box<Stmt>),
    DoWhile(Box<Stmt>, Box<Expr>),
    For(
        Option<Box<Expr>>,
        Option<Box<Expr>>,
        Option<Box<Expr>>,
        Box<Stmt>,
    ),
    Switch(Box<Expr>, Box<Stmt>),
    Case(Expr, Box<Stmt>),
    Default(Box<Stmt>),
    Goto(Symbol),
    Labeled(Symbol, Box<Stmt>),
    Break,
    Continue,
    Return(Option<Expr>),
}

/// A function definition: specifiers, a declarator whose outermost
/// modifier is a function modifier, and a compound body.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub specs: DeclnSpecs,
    pub declr: Declr,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternDecln {
    Decln(Decln),
    FuncDef(FuncDef),
}

/// The root of a parsed translation unit: an ordered list of external
/// declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub declns: Vec<ExternDecln>,
}
