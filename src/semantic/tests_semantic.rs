use symbol_table::GlobalSymbol as Symbol;

use crate::diagnostic::SemanticError;
use crate::test_utils::{parse_expr, resolve};

use super::ast::{BinaryOp, BlockItem, Decln, Expr, ExternDecln, Stmt, StorageClass, VarKind};
use super::env::{DeclKind, EntryKind, Env};
use super::expressions::resolve_expr;
use super::types::{ExprType, FuncType, RecordRegistry, TypeKind};

fn sym(name: &str) -> Symbol {
    Symbol::from(name)
}

/// Resolves a single expression in an empty environment.
fn resolve_in_empty(source: &str) -> Result<Expr, SemanticError> {
    let expr = parse_expr(source);
    resolve_expr(&expr, &Env::new(), &mut RecordRegistry::new())
}

/// Digs the declarations out of a resolved unit.
fn declns(unit: &super::ast::TranslationUnit) -> Vec<&Decln> {
    unit.declns
        .iter()
        .filter_map(|d| match d {
            ExternDecln::Decln(decln) => Some(decln),
            _ => None,
        })
        .collect()
}

/// The return expression of the only function in the unit.
fn only_return_expr(unit: &super::ast::TranslationUnit) -> &Expr {
    for extern_decln in &unit.declns {
        if let ExternDecln::FuncDef(func) = extern_decln {
            let Stmt::Compound(items) = &func.body else {
                panic!("function body is not a compound statement");
            };
            for item in items {
                if let BlockItem::Stmt(Stmt::Return(Some(expr))) = item {
                    return expr;
                }
            }
        }
    }
    panic!("no return statement found");
}

// ------------------------------------------------------------------
// environment
// ------------------------------------------------------------------

#[test]
fn declare_returns_a_new_environment_and_keeps_the_old_one() {
    let records = RecordRegistry::new();
    let before = Env::new();
    let after = before
        .declare(DeclKind::Global, sym("x"), ExprType::long_type(), &records)
        .unwrap();

    assert!(before.lookup(sym("x")).is_none());
    let entry = after.lookup(sym("x")).unwrap();
    assert_eq!(entry.kind, EntryKind::Global);
}

#[test]
fn lookup_prefers_enum_then_typedef_then_stack() {
    let records = RecordRegistry::new();
    let env = Env::new()
        .enter_scope()
        .declare(DeclKind::Stack, sym("x"), ExprType::long_type(), &records)
        .unwrap()
        .declare(DeclKind::Typedef, sym("x"), ExprType::char_type(), &records)
        .unwrap();
    assert_eq!(env.lookup(sym("x")).unwrap().kind, EntryKind::Typedef);

    let env = env.declare_enum(sym("x"), ExprType::long_type(), 7);
    let entry = env.lookup(sym("x")).unwrap();
    assert_eq!(entry.kind, EntryKind::Enum);
    assert_eq!(entry.offset, 7);
}

#[test]
fn inner_scope_entries_disappear_on_exit() {
    let records = RecordRegistry::new();
    let env = Env::new();
    assert!(env.is_global_scope());

    let inner = env
        .enter_scope()
        .declare(DeclKind::Stack, sym("y"), ExprType::long_type(), &records)
        .unwrap();
    assert!(!inner.is_global_scope());
    assert!(inner.lookup(sym("y")).is_some());

    let out = inner.exit_scope();
    assert!(out.lookup(sym("y")).is_none());
    assert!(out.is_global_scope());
}

#[test]
fn stack_offsets_advance_by_size_and_alignment() {
    let records = RecordRegistry::new();
    let env = Env::new()
        .enter_scope()
        .declare(DeclKind::Stack, sym("a"), ExprType::long_type(), &records)
        .unwrap()
        .declare(DeclKind::Stack, sym("b"), ExprType::long_type(), &records)
        .unwrap()
        .declare(DeclKind::Stack, sym("c"), ExprType::char_type(), &records)
        .unwrap()
        .declare(DeclKind::Stack, sym("d"), ExprType::double_type(), &records)
        .unwrap();

    assert_eq!(env.lookup(sym("a")).unwrap().offset, 4);
    assert_eq!(env.lookup(sym("b")).unwrap().offset, 8);
    assert_eq!(env.lookup(sym("c")).unwrap().offset, 9);
    // 9 + 8 = 17, rounded up to the 4-byte double alignment
    assert_eq!(env.lookup(sym("d")).unwrap().offset, 20);
    assert_eq!(env.stack_frame_size(), 20);
}

#[test]
fn lookup_current_scope_ignores_outer_layers() {
    let records = RecordRegistry::new();
    let outer = Env::new()
        .declare(DeclKind::Global, sym("x"), ExprType::long_type(), &records)
        .unwrap();
    let inner = outer.enter_scope();
    assert!(inner.lookup_current_scope(sym("x")).is_none());
    assert!(inner.lookup(sym("x")).is_some());

    let inner = inner
        .declare(DeclKind::Stack, sym("x"), ExprType::char_type(), &records)
        .unwrap();
    assert_eq!(
        inner.lookup_current_scope(sym("x")).unwrap().kind,
        EntryKind::Stack
    );
}

#[test]
fn shadowing_within_a_category_is_last_write_wins() {
    let records = RecordRegistry::new();
    let env = Env::new()
        .declare(DeclKind::Global, sym("x"), ExprType::long_type(), &records)
        .unwrap()
        .declare(DeclKind::Global, sym("x"), ExprType::double_type(), &records)
        .unwrap();
    assert_eq!(
        env.lookup(sym("x")).unwrap().ty.kind,
        TypeKind::Double
    );
}

#[test]
fn parameters_resolve_as_frame_entries() {
    let records = RecordRegistry::new();
    let func = FuncType::create(
        ExprType::long_type(),
        vec![
            (Some(sym("a")), ExprType::long_type()),
            (Some(sym("b")), ExprType::char_type()),
        ],
        false,
        &records,
    )
    .unwrap();
    let env = Env::new().set_current_function(func).enter_scope();

    let a = env.lookup(sym("a")).unwrap();
    assert_eq!(a.kind, EntryKind::Frame);
    assert_eq!(a.offset, 8);
    let b = env.lookup(sym("b")).unwrap();
    assert_eq!(b.offset, 12);
}

#[test]
fn dump_renders_each_entry_category() {
    let records = RecordRegistry::new();
    let env = Env::new()
        .declare(DeclKind::Global, sym("g"), ExprType::long_type(), &records)
        .unwrap()
        .declare(DeclKind::Typedef, sym("T"), ExprType::long_type(), &records)
        .unwrap()
        .declare_enum(sym("RED"), ExprType::long_type(), 0);
    let dump = env.dump();
    assert!(dump.contains("[extern] g : long"));
    assert!(dump.contains("typedef: T <- long"));
    assert!(dump.contains("RED = 0"));
}

// ------------------------------------------------------------------
// expressions
// ------------------------------------------------------------------

#[test]
fn casting_constant_minus_one_to_unsigned_char_folds_to_255() {
    let resolved = resolve_in_empty("(unsigned char)(long)-1").unwrap();
    assert_eq!(resolved, Expr::ConstULong(255));
    assert!(resolved.is_const_expr());
}

#[test]
fn sizeof_type_name_folds_to_a_constant() {
    assert_eq!(resolve_in_empty("sizeof(int)").unwrap(), Expr::ConstULong(4));
    assert_eq!(resolve_in_empty("sizeof(char)").unwrap(), Expr::ConstULong(1));
    assert_eq!(
        resolve_in_empty("sizeof(double)").unwrap(),
        Expr::ConstULong(8)
    );
    assert_eq!(
        resolve_in_empty("sizeof(int *)").unwrap(),
        Expr::ConstULong(4)
    );
}

#[test]
fn sizeof_a_declared_int_variable_is_four() {
    let unit = resolve("int a; int main(void) { return sizeof(a); }").unwrap();
    // the value is folded and then implicitly cast to the return type
    assert_eq!(*only_return_expr(&unit), Expr::ConstLong(4));
}

#[test]
fn constant_arithmetic_folds_with_usual_conversions() {
    assert_eq!(resolve_in_empty("1 + 2 * 3").unwrap(), Expr::ConstLong(7));
    assert_eq!(resolve_in_empty("7 / 2").unwrap(), Expr::ConstLong(3));
    assert_eq!(resolve_in_empty("7 % 2").unwrap(), Expr::ConstLong(1));
    assert_eq!(resolve_in_empty("1 << 4").unwrap(), Expr::ConstLong(16));
    assert_eq!(resolve_in_empty("3 < 4").unwrap(), Expr::ConstLong(1));
    assert_eq!(resolve_in_empty("1 && 0").unwrap(), Expr::ConstLong(0));
    assert_eq!(resolve_in_empty("!0").unwrap(), Expr::ConstLong(1));
    // mixing in a double promotes the whole thing
    assert_eq!(
        resolve_in_empty("1 + 0.5").unwrap(),
        Expr::ConstDouble(1.5)
    );
}

#[test]
fn division_by_constant_zero_is_not_folded() {
    let resolved = resolve_in_empty("1 / 0").unwrap();
    assert!(!resolved.is_const_expr());
}

#[test]
fn conditional_unifies_arithmetic_branches() {
    let resolved = resolve_in_empty("1 ? 2.0 : 3").unwrap();
    let Expr::Conditional { false_expr, ty, .. } = resolved else {
        panic!("expected a conditional");
    };
    assert_eq!(ty.kind, TypeKind::Double);
    assert_eq!(*false_expr, Expr::ConstDouble(3.0));
}

#[test]
fn undeclared_identifier_is_a_fatal_error() {
    let err = resolve("int main(void) { return y; }").unwrap_err();
    assert!(matches!(err, SemanticError::UndeclaredIdentifier { .. }));
}

#[test]
fn typedef_name_used_as_a_value_is_a_fatal_error() {
    let err = resolve("typedef int T; int main(void) { return T; }").unwrap_err();
    assert!(matches!(err, SemanticError::ExpectedVariable { .. }));
}

#[test]
fn enum_constant_resolves_to_its_value() {
    let unit = resolve("enum Color { RED, GREEN = 5, BLUE }; int x;").unwrap();
    let lookup = |name: &str| unit.env.lookup(sym(name)).unwrap();
    assert_eq!(lookup("RED").kind, EntryKind::Enum);
    assert_eq!(lookup("RED").offset, 0);
    assert_eq!(lookup("GREEN").offset, 5);
    assert_eq!(lookup("BLUE").offset, 6);

    let unit = resolve("enum Color { RED, GREEN = 5, BLUE }; int main(void) { return BLUE; }")
        .unwrap();
    assert_eq!(*only_return_expr(&unit), Expr::ConstLong(6));
}

#[test]
fn pointer_addition_scales_by_the_pointee_size() {
    let unit = resolve("int f(int *p) { return *(p + 2); }").unwrap();
    let Expr::Dereference { operand, ty } = only_return_expr(&unit) else {
        panic!("expected a dereference");
    };
    assert_eq!(ty.kind, TypeKind::Long);
    let Expr::Binary { op: BinaryOp::Add, rhs, .. } = operand.as_ref() else {
        panic!("expected pointer + offset");
    };
    assert_eq!(**rhs, Expr::ConstLong(8));
}

#[test]
fn array_subscript_resolves_through_decay() {
    assert!(resolve("int f(void) { int a[3]; return a[1]; }").is_ok());
}

#[test]
fn function_call_checks_arity_and_casts_arguments() {
    let err = resolve("int f(int a); int main(void) { return f(1, 2); }").unwrap_err();
    assert!(matches!(err, SemanticError::ArgumentCountMismatch { .. }));

    // the char argument receives an implicit cast to double
    let unit = resolve("int f(double d); int main(void) { return f('a'); }").unwrap();
    let Expr::FunctionCall { args, .. } = only_return_expr(&unit) else {
        panic!("expected a call");
    };
    assert_eq!(args[0], Expr::ConstDouble(97.0));
}

#[test]
fn variadic_calls_pass_extra_arguments_unconverted() {
    assert!(
        resolve("int printf(char *fmt, ...); int main(void) { return printf(\"%d\", 1, 2); }")
            .is_ok()
    );
}

#[test]
fn member_access_requires_a_complete_record() {
    let err = resolve("struct S; int f(struct S *p) { return p->x; }").unwrap_err();
    assert!(matches!(err, SemanticError::IncompleteType { .. }));

    let err = resolve("struct S { int a; }; int f(struct S s) { return s.b; }").unwrap_err();
    assert!(matches!(err, SemanticError::UnknownMember { .. }));

    assert!(resolve("struct S { int a; }; int f(struct S s) { return s.a; }").is_ok());
}

// ------------------------------------------------------------------
// declarations
// ------------------------------------------------------------------

#[test]
fn one_declaration_produces_four_distinct_types() {
    let unit = resolve("int a, *b, c(int, int), d[3];").unwrap();
    let declns = declns(&unit);
    assert_eq!(declns.len(), 4);

    assert_eq!(declns[0].ty, ExprType::long_type());
    assert_eq!(declns[1].ty, ExprType::pointer(ExprType::long_type()));
    let TypeKind::Function(func) = &declns[2].ty.kind else {
        panic!("expected a function type");
    };
    assert_eq!(func.ret, ExprType::long_type());
    assert_eq!(func.args.len(), 2);
    assert_eq!(declns[3].ty, ExprType::array(ExprType::long_type(), 3));
}

#[test]
fn missing_type_specifier_defaults_to_int() {
    let unit = resolve("static x;").unwrap();
    let declns = declns(&unit);
    assert_eq!(declns[0].ty, ExprType::long_type());
    assert_eq!(declns[0].storage, StorageClass::Static);
}

#[test]
fn storage_classes_choose_the_entry_location() {
    let unit = resolve("int g; extern int e; int main(void) { int l; return l; }").unwrap();
    assert_eq!(unit.env.lookup(sym("g")).unwrap().kind, EntryKind::Global);
    assert_eq!(unit.env.lookup(sym("e")).unwrap().kind, EntryKind::Global);
    // the local does not leak into the final global environment
    assert!(unit.env.lookup(sym("l")).is_none());

    let unit = resolve("int f(void) { int l; return l; }").unwrap();
    let ExternDecln::FuncDef(func) = &unit.declns[0] else {
        panic!("expected a function");
    };
    let Stmt::Compound(items) = &func.body else {
        panic!("expected a compound body");
    };
    let BlockItem::Stmt(Stmt::Return(Some(Expr::Variable { kind, .. }))) = &items[1] else {
        panic!("expected return of a variable");
    };
    assert!(matches!(kind, VarKind::Stack { offset: 4 }));
}

#[test]
fn multiple_storage_classes_are_rejected() {
    let err = resolve("static extern int x;").unwrap_err();
    assert!(matches!(err, SemanticError::DuplicateStorageClass));
}

#[test]
fn array_sizes_must_be_non_negative_constants() {
    assert!(resolve("int a[2 + 3];").is_ok());
    let unit = resolve("int a[2 + 3];").unwrap();
    assert_eq!(declns(&unit)[0].ty, ExprType::array(ExprType::long_type(), 5));

    let err = resolve("int a[-1];").unwrap_err();
    assert!(matches!(err, SemanticError::NegativeArraySize { size: -1 }));

    let err = resolve("int n; int a[n];").unwrap_err();
    assert!(matches!(err, SemanticError::ExpectedConstant { .. }));
}

#[test]
fn typedef_aliases_resolve_through_the_environment() {
    let unit = resolve("typedef int T; T x;").unwrap();
    let declns = declns(&unit);
    assert_eq!(declns[1].ty, ExprType::long_type());
    assert_eq!(declns[1].storage, StorageClass::Auto);
    assert_eq!(unit.env.lookup(sym("T")).unwrap().kind, EntryKind::Typedef);
}

#[test]
fn initializers_are_cast_to_the_declared_type() {
    let unit = resolve("double d = 1;").unwrap();
    let declns = declns(&unit);
    let Some(super::ast::Initr::Expr(init)) = &declns[0].init else {
        panic!("expected a scalar initializer");
    };
    assert_eq!(*init, Expr::ConstDouble(1.0));

    assert!(resolve("int a[2] = {1, 2};").is_ok());
    assert!(resolve("int a[2] = {1, 2, 3};").is_err());
    assert!(resolve("struct P { int x; int y; } p = {1, 2};").is_ok());
}

// ------------------------------------------------------------------
// records
// ------------------------------------------------------------------

#[test]
fn struct_members_are_laid_out_with_alignment() {
    let unit = resolve("struct P { char c; double d; int i; };").unwrap();
    let entry = unit.env.lookup(sym("struct P")).unwrap();
    let TypeKind::Record { handle, .. } = entry.ty.kind else {
        panic!("expected a record type");
    };
    assert_eq!(unit.records.member(handle, sym("c")).unwrap().offset, 0);
    assert_eq!(unit.records.member(handle, sym("d")).unwrap().offset, 4);
    assert_eq!(unit.records.member(handle, sym("i")).unwrap().offset, 12);
    assert_eq!(unit.records.size_align(handle).unwrap(), (16, 4));
}

#[test]
fn union_members_share_offset_zero() {
    let unit = resolve("union U { char c; int i; double d; };").unwrap();
    let entry = unit.env.lookup(sym("union U")).unwrap();
    let TypeKind::Record { handle, .. } = entry.ty.kind else {
        panic!("expected a record type");
    };
    assert_eq!(unit.records.member(handle, sym("d")).unwrap().offset, 0);
    assert_eq!(unit.records.size_align(handle).unwrap(), (8, 4));
}

#[test]
fn redefining_a_complete_struct_is_rejected() {
    let err = resolve("struct Foo { int a; }; struct Foo { int b; };").unwrap_err();
    assert!(matches!(err, SemanticError::Redefinition { .. }));
}

#[test]
fn mentioning_a_complete_struct_reuses_it() {
    let unit = resolve("struct Foo { int a; }; struct Foo x;").unwrap();
    let declns = declns(&unit);
    let TypeKind::Record { handle, .. } = declns[0].ty.kind else {
        panic!("expected a record type");
    };
    assert!(unit.records.is_complete(handle));
    assert_eq!(unit.records.size_align(handle).unwrap(), (4, 4));
}

#[test]
fn self_referential_struct_completes_through_its_placeholder() {
    let unit = resolve("struct Node { int value; struct Node *next; };").unwrap();
    let entry = unit.env.lookup(sym("struct Node")).unwrap();
    let TypeKind::Record { handle, .. } = entry.ty.kind else {
        panic!("expected a record type");
    };
    let next = unit.records.member(handle, sym("next")).unwrap();
    let TypeKind::Pointer(pointee) = &next.ty.kind else {
        panic!("expected a pointer member");
    };
    let TypeKind::Record { handle: inner, .. } = pointee.kind else {
        panic!("expected a pointer to the record");
    };
    assert_eq!(inner, handle);
    assert_eq!(unit.records.size_align(handle).unwrap(), (8, 4));
}

#[test]
fn forward_declared_struct_keeps_its_handle_when_completed() {
    let unit = resolve(
        "struct Foo; struct Bar { struct Foo *link; }; struct Foo { int a; }; \
         int f(struct Bar *b) { return b->link->a; }",
    )
    .unwrap();
    assert!(!unit.declns.is_empty());
}

// ------------------------------------------------------------------
// statements
// ------------------------------------------------------------------

#[test]
fn duplicate_case_labels_are_rejected() {
    let err = resolve(
        "int f(int n) { switch (n) { case 3: return 1; case 3: return 2; } return 0; }",
    )
    .unwrap_err();
    assert!(matches!(err, SemanticError::DuplicateCaseLabel { value: 3 }));
}

#[test]
fn multiple_default_labels_are_rejected() {
    let err = resolve(
        "int f(int n) { switch (n) { default: return 1; default: return 2; } return 0; }",
    )
    .unwrap_err();
    assert!(matches!(err, SemanticError::MultipleDefaultLabels));
}

#[test]
fn nested_switches_own_their_labels() {
    assert!(resolve(
        "int f(int n) { switch (n) { case 1: switch (n) { case 1: return 1; } return 2; } return 0; }",
    )
    .is_ok());
}

#[test]
fn switch_condition_must_be_integral() {
    let err = resolve("int f(double d) { switch (d) { case 1: return 1; } return 0; }").unwrap_err();
    assert!(matches!(err, SemanticError::InvalidOperand { .. }));
}

#[test]
fn return_values_are_cast_to_the_return_type() {
    let unit = resolve("double f(void) { return 1; }").unwrap();
    assert_eq!(*only_return_expr(&unit), Expr::ConstDouble(1.0));

    let err = resolve("void f(void) { return 1; }").unwrap_err();
    assert!(matches!(err, SemanticError::TypeMismatch { .. }));
}

#[test]
fn sibling_scopes_reuse_stack_space() {
    // both blocks declare one int; the frame never needs more than one
    // slot at a time
    assert!(resolve("int f(void) { { int a; a = 1; } { int b; b = 2; } return 0; }").is_ok());
}
