//! The scope environment: a copy-on-write stack of scope layers.
//!
//! Every operation is pure: it returns a new `Env` that shares all
//! unmodified layers with the old one, and the old value stays valid.
//! This is what lets the parser and resolver probe symbol state
//! speculatively during backtracking without partial mutation leaking
//! across a failed alternative.
//!
//! Lookup order inside one layer is fixed: enum constants, then
//! typedefs, then stack locals, then the current function's parameters,
//! then globals. Within a category the last write wins. Outer layers are
//! consulted only when every category of the inner layer misses.

use std::fmt::Write as _;
use std::rc::Rc;

use log::debug;
use symbol_table::GlobalSymbol as Symbol;

use crate::diagnostic::SemanticError;

use super::types::{ExprType, FuncType, RecordRegistry, round_up};

/// Where a found symbol lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// An enum constant; the entry's offset holds its value.
    Enum,
    Typedef,
    /// A block-scope variable at `%ebp - offset`.
    Stack,
    /// A parameter of the current function at `%ebp + offset`.
    Frame,
    Global,
}

/// The result of a successful lookup.
#[derive(Debug, Clone)]
pub struct Entry {
    pub kind: EntryKind,
    pub ty: ExprType,
    /// Stack offset, frame offset, or enum value depending on `kind`.
    pub offset: i32,
}

/// What a declaration may ask for. `Frame` entries are never declared
/// directly; they come from the current function's parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Stack,
    Global,
    Typedef,
}

#[derive(Debug, Clone)]
struct StoreEntry {
    name: Symbol,
    ty: ExprType,
    offset: i32,
}

#[derive(Debug, Clone, Default)]
struct Scope {
    stack_entries: Vec<StoreEntry>,
    global_entries: Vec<StoreEntry>,
    typedef_entries: Vec<StoreEntry>,
    enum_entries: Vec<StoreEntry>,
    curr_func: Option<Rc<FuncType>>,
    stack_offset: i32,
}

impl Scope {
    /// A fresh inner scope: same stack cursor, same current function,
    /// no entries.
    fn inherit(&self) -> Scope {
        Scope {
            curr_func: self.curr_func.clone(),
            stack_offset: self.stack_offset,
            ..Scope::default()
        }
    }

    fn find(&self, name: Symbol) -> Option<Entry> {
        let last_named = |entries: &[StoreEntry]| -> Option<(ExprType, i32)> {
            entries
                .iter()
                .rev()
                .find(|e| e.name == name)
                .map(|e| (e.ty.clone(), e.offset))
        };

        if let Some((ty, offset)) = last_named(&self.enum_entries) {
            return Some(Entry {
                kind: EntryKind::Enum,
                ty,
                offset,
            });
        }
        if let Some((ty, offset)) = last_named(&self.typedef_entries) {
            return Some(Entry {
                kind: EntryKind::Typedef,
                ty,
                offset,
            });
        }
        if let Some((ty, offset)) = last_named(&self.stack_entries) {
            return Some(Entry {
                kind: EntryKind::Stack,
                ty,
                offset,
            });
        }
        if let Some(func) = &self.curr_func
            && let Some(arg) = func.args.iter().rev().find(|a| a.name == Some(name))
        {
            return Some(Entry {
                kind: EntryKind::Frame,
                ty: arg.ty.clone(),
                offset: arg.offset as i32,
            });
        }
        if let Some((ty, offset)) = last_named(&self.global_entries) {
            return Some(Entry {
                kind: EntryKind::Global,
                ty,
                offset,
            });
        }
        None
    }

    fn dump(&self, out: &mut String, indent: &str) {
        if let Some(func) = &self.curr_func {
            for arg in &func.args {
                if let Some(name) = arg.name {
                    let _ = writeln!(out, "{}[%ebp + {}] {} : {}", indent, arg.offset, name, arg.ty);
                }
            }
        }
        for e in &self.global_entries {
            let _ = writeln!(out, "{}[extern] {} : {}", indent, e.name, e.ty);
        }
        for e in &self.stack_entries {
            let _ = writeln!(out, "{}[%ebp - {}] {} : {}", indent, e.offset, e.name, e.ty);
        }
        for e in &self.typedef_entries {
            let _ = writeln!(out, "{}typedef: {} <- {}", indent, e.name, e.ty);
        }
        for e in &self.enum_entries {
            let _ = writeln!(out, "{}{} = {}", indent, e.name, e.offset);
        }
    }
}

/// The environment: scope layers, innermost last. Cloning an `Env` is
/// cheap (a spine of `Rc`s), and every "mutation" below builds a new
/// spine over shared layers.
#[derive(Debug, Clone)]
pub struct Env {
    scopes: Vec<Rc<Scope>>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// An environment with a single empty global scope.
    pub fn new() -> Self {
        Env {
            scopes: vec![Rc::new(Scope::default())],
        }
    }

    fn top(&self) -> &Scope {
        self.scopes.last().expect("ICE: environment has no scope")
    }

    /// Builds a new environment whose top layer is a modified copy of
    /// the current top layer.
    fn with_top<F>(&self, mutate: F) -> Env
    where
        F: FnOnce(&mut Scope),
    {
        let mut scopes = self.scopes.clone();
        let mut top = (**scopes.last().expect("ICE: environment has no scope")).clone();
        mutate(&mut top);
        *scopes.last_mut().expect("ICE: environment has no scope") = Rc::new(top);
        Env { scopes }
    }

    /// Pushes a fresh scope layer. The new layer inherits the stack
    /// cursor and current-function binding.
    pub fn enter_scope(&self) -> Env {
        debug!("env: enter scope (depth {})", self.scopes.len() + 1);
        let mut scopes = self.scopes.clone();
        scopes.push(Rc::new(self.top().inherit()));
        Env { scopes }
    }

    /// Pops the innermost scope layer. Popping the global scope is a
    /// no-op.
    pub fn exit_scope(&self) -> Env {
        if self.scopes.len() <= 1 {
            return self.clone();
        }
        debug!("env: exit scope (depth {})", self.scopes.len() - 1);
        let mut scopes = self.scopes.clone();
        scopes.pop();
        Env { scopes }
    }

    /// Adds a symbol entry to the innermost scope. A stack entry
    /// advances the scope's stack cursor by the type's size, rounded up
    /// to the type's alignment; the entry's offset is the advanced
    /// cursor (the object lives at `%ebp - offset`).
    pub fn declare(
        &self,
        kind: DeclKind,
        name: Symbol,
        ty: ExprType,
        records: &RecordRegistry,
    ) -> Result<Env, SemanticError> {
        let offset = match kind {
            DeclKind::Stack => {
                let size = ty.size_of(records)? as i32;
                let align = ty.align_of(records)? as i32;
                round_up((self.top().stack_offset + size) as usize, align as usize) as i32
            }
            DeclKind::Global | DeclKind::Typedef => 0,
        };
        debug!("env: declare {:?} '{}' : {}", kind, name, ty);
        Ok(self.with_top(|scope| {
            let entry = StoreEntry { name, ty, offset };
            match kind {
                DeclKind::Stack => {
                    scope.stack_offset = offset;
                    scope.stack_entries.push(entry);
                }
                DeclKind::Global => scope.global_entries.push(entry),
                DeclKind::Typedef => scope.typedef_entries.push(entry),
            }
        }))
    }

    /// Adds an enum constant to the innermost scope.
    pub fn declare_enum(&self, name: Symbol, ty: ExprType, value: i32) -> Env {
        debug!("env: declare enum '{}' = {}", name, value);
        self.with_top(|scope| {
            scope.enum_entries.push(StoreEntry {
                name,
                ty,
                offset: value,
            })
        })
    }

    /// Binds the current function; its parameters become visible as
    /// frame entries.
    pub fn set_current_function(&self, func: Rc<FuncType>) -> Env {
        self.with_top(|scope| scope.curr_func = Some(func))
    }

    pub fn current_function(&self) -> Option<Rc<FuncType>> {
        self.top().curr_func.clone()
    }

    /// Searches innermost to outermost; within a layer the category
    /// order is enum, typedef, stack, parameters, globals.
    pub fn lookup(&self, name: Symbol) -> Option<Entry> {
        self.scopes.iter().rev().find_map(|scope| scope.find(name))
    }

    /// Searches only the innermost layer.
    pub fn lookup_current_scope(&self, name: Symbol) -> Option<Entry> {
        self.top().find(name)
    }

    /// True iff exactly one scope layer exists.
    pub fn is_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// The current stack cursor of the innermost scope: the number of
    /// bytes of locals declared so far on this path.
    pub fn stack_frame_size(&self) -> i32 {
        self.top().stack_offset
    }

    /// Renders every layer for debugging, outermost first.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (depth, scope) in self.scopes.iter().enumerate() {
            scope.dump(&mut out, &"  ".repeat(depth));
        }
        out
    }
}
