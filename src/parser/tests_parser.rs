use symbol_table::GlobalSymbol as Symbol;

use crate::test_utils::{parse, parse_expr, tokenize, try_parse, try_parse_expr};

use super::Parser;
use super::tree::*;

/// Renders an expression as an s-expression so shape assertions read
/// like the grammar they check.
fn sexpr(expr: &Expr) -> String {
    fn op_str(op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::LogicAnd => "&&",
            BinaryOp::LogicOr => "||",
        }
    }

    match expr {
        Expr::Variable(name) => name.to_string(),
        Expr::ConstInt(value, _) => value.to_string(),
        Expr::Binary(op, lhs, rhs) => {
            format!("({} {} {})", op_str(*op), sexpr(lhs), sexpr(rhs))
        }
        Expr::Assignment(lhs, rhs) => format!("(= {} {})", sexpr(lhs), sexpr(rhs)),
        Expr::OpAssignment(op, lhs, rhs) => {
            format!("({}= {} {})", op_str(*op), sexpr(lhs), sexpr(rhs))
        }
        Expr::Conditional(cond, t, f) => {
            format!("(?: {} {} {})", sexpr(cond), sexpr(t), sexpr(f))
        }
        Expr::Unary(UnaryOp::Negate, e) => format!("(neg {})", sexpr(e)),
        Expr::Unary(UnaryOp::BitNot, e) => format!("(~ {})", sexpr(e)),
        Expr::Unary(UnaryOp::LogicNot, e) => format!("(! {})", sexpr(e)),
        Expr::Dereference(e) => format!("(* {})", sexpr(e)),
        Expr::Reference(e) => format!("(& {})", sexpr(e)),
        Expr::Member(base, name) => format!("(. {} {})", sexpr(base), name),
        Expr::AssignmentList(exprs) => {
            let parts: Vec<String> = exprs.iter().map(sexpr).collect();
            format!("(, {})", parts.join(" "))
        }
        Expr::FunctionCall(callee, args) => {
            let parts: Vec<String> = args.iter().map(sexpr).collect();
            format!("(call {} [{}])", sexpr(callee), parts.join(" "))
        }
        other => format!("{:?}", other),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    insta::assert_snapshot!(sexpr(&parse_expr("a + b * c")), @"(+ a (* b c))");
}

#[test]
fn multiplicative_operators_are_left_associative() {
    insta::assert_snapshot!(sexpr(&parse_expr("a * b / c % d")), @"(% (/ (* a b) c) d)");
}

#[test]
fn additive_and_shift_precedence() {
    insta::assert_snapshot!(sexpr(&parse_expr("a << b + c")), @"(<< a (+ b c))");
    insta::assert_snapshot!(sexpr(&parse_expr("a < b | c")), @"(| (< a b) c)");
}

#[test]
fn bitwise_ladder_orders_and_xor_or() {
    insta::assert_snapshot!(sexpr(&parse_expr("a | b ^ c & d")), @"(| a (^ b (& c d)))");
}

#[test]
fn logical_operators_bind_looser_than_bitwise() {
    insta::assert_snapshot!(
        sexpr(&parse_expr("a && b || c && d")),
        @"(|| (&& a b) (&& c d))"
    );
}

#[test]
fn assignment_is_right_associative() {
    insta::assert_snapshot!(sexpr(&parse_expr("a = b = c")), @"(= a (= b c))");
    insta::assert_snapshot!(sexpr(&parse_expr("a += b * c")), @"(+= a (* b c))");
}

#[test]
fn conditional_is_right_associative() {
    insta::assert_snapshot!(
        sexpr(&parse_expr("a ? b : c ? d : e")),
        @"(?: a b (?: c d e))"
    );
}

#[test]
fn array_subscript_desugars_to_deref_of_addition() {
    insta::assert_snapshot!(sexpr(&parse_expr("a[i]")), @"(* (+ a i))");
    insta::assert_snapshot!(sexpr(&parse_expr("a[i][j]")), @"(* (+ (* (+ a i)) j))");
}

#[test]
fn arrow_desugars_to_member_of_deref() {
    insta::assert_snapshot!(sexpr(&parse_expr("p->x")), @"(. (* p) x)");
    insta::assert_snapshot!(sexpr(&parse_expr("p->x->y")), @"(. (* (. (* p) x)) y)");
}

#[test]
fn comma_collapses_into_assignment_list() {
    insta::assert_snapshot!(sexpr(&parse_expr("a = 1, b = 2")), @"(, (= a 1) (= b 2))");
}

#[test]
fn dangling_trailing_comma_is_tolerated() {
    // the parser stops at the comma and succeeds up to it
    let mut parser = Parser::new(tokenize("a, "));
    let expr = parser.parse_expr().unwrap();
    assert_eq!(expr, Expr::Variable(Symbol::from("a")));
}

#[test]
fn call_arguments_stop_at_commas() {
    insta::assert_snapshot!(sexpr(&parse_expr("f(a, b = 1, c + d)")), @"(call f [a (= b 1) (+ c d)])");
    insta::assert_snapshot!(sexpr(&parse_expr("f()")), @"(call f [])");
}

#[test]
fn unary_operators_parse() {
    insta::assert_snapshot!(sexpr(&parse_expr("-x + ~y")), @"(+ (neg x) (~ y))");
    insta::assert_snapshot!(sexpr(&parse_expr("!*p")), @"(! (* p))");
    insta::assert_snapshot!(sexpr(&parse_expr("&a")), @"(& a)");
    assert!(matches!(parse_expr("++x"), Expr::PreIncrement(_)));
    assert!(matches!(parse_expr("x--"), Expr::PostDecrement(_)));
}

#[test]
fn sizeof_prefers_the_type_name_path() {
    assert!(matches!(parse_expr("sizeof(int)"), Expr::SizeofType(_)));
    assert!(matches!(parse_expr("sizeof x"), Expr::SizeofExpr(_)));
    // a parenthesized variable is not a type name, so it falls back to
    // the unary-expression path
    assert!(matches!(parse_expr("sizeof(x)"), Expr::SizeofExpr(_)));
}

#[test]
fn sizeof_typedef_name_uses_the_type_path() {
    let mut parser = Parser::new(tokenize("sizeof(T)"));
    parser.add_typedef_name(Symbol::from("T"));
    assert!(matches!(parser.parse_expr().unwrap(), Expr::SizeofType(_)));
}

#[test]
fn typedef_name_is_rejected_as_a_primary_expression() {
    let mut parser = Parser::new(tokenize("T + 1"));
    parser.add_typedef_name(Symbol::from("T"));
    assert!(parser.parse_expr().is_err());
}

#[test]
fn parenthesized_name_is_a_call_unless_it_is_a_typedef() {
    // (x)(y) with x a variable: a call
    assert!(matches!(parse_expr("(x)(y)"), Expr::FunctionCall(..)));

    // (x)(y) with x a typedef: a cast
    let mut parser = Parser::new(tokenize("(x)(y)"));
    parser.add_typedef_name(Symbol::from("x"));
    assert!(matches!(parser.parse_expr().unwrap(), Expr::Cast(..)));
}

#[test]
fn cast_chains_nest() {
    let expr = parse_expr("(unsigned char)(long)-1");
    let Expr::Cast(outer, inner) = expr else {
        panic!("expected a cast");
    };
    assert_eq!(
        &outer.specs.type_specs[..],
        &[TypeSpec::Unsigned, TypeSpec::Char][..]
    );
    assert!(matches!(*inner, Expr::Cast(..)));
}

#[test]
fn char_constants_are_integer_constants() {
    assert!(matches!(parse_expr("'a'"), Expr::ConstInt(97, _)));
}

#[test]
fn one_declaration_with_four_declarators() {
    let unit = parse("int a, *b, c(int, int), d[];");
    let [ExternDecln::Decln(decln)] = unit.declns.as_slice() else {
        panic!("expected one declaration");
    };
    assert_eq!(decln.declrs.len(), 4);

    assert!(decln.declrs[0].declr.modifiers.is_empty());
    assert!(matches!(
        &decln.declrs[1].declr.modifiers[..],
        [TypeModifier::Pointer(_)]
    ));
    let [TypeModifier::Function(params, false)] = &decln.declrs[2].declr.modifiers[..] else {
        panic!("expected a function declarator");
    };
    assert_eq!(params.len(), 2);
    assert!(matches!(
        &decln.declrs[3].declr.modifiers[..],
        [TypeModifier::Array(None)]
    ));
}

#[test]
fn declarator_grouping_orders_modifiers() {
    // int *a[3] : array of pointers; the array modifier is innermost
    let unit = parse("int *a[3];");
    let [ExternDecln::Decln(decln)] = unit.declns.as_slice() else {
        panic!("expected one declaration");
    };
    assert!(matches!(
        &decln.declrs[0].declr.modifiers[..],
        [TypeModifier::Array(Some(_)), TypeModifier::Pointer(_)]
    ));

    // int (*a)[3] : pointer to array; the pointer modifier is innermost
    let unit = parse("int (*a)[3];");
    let [ExternDecln::Decln(decln)] = unit.declns.as_slice() else {
        panic!("expected one declaration");
    };
    assert!(matches!(
        &decln.declrs[0].declr.modifiers[..],
        [TypeModifier::Pointer(_), TypeModifier::Array(Some(_))]
    ));
}

#[test]
fn typedef_names_parse_as_specifiers_after_declaration() {
    let unit = parse("typedef int T; T x;");
    let [ExternDecln::Decln(_), ExternDecln::Decln(second)] = unit.declns.as_slice() else {
        panic!("expected two declarations");
    };
    assert!(matches!(
        &second.specs.type_specs[..],
        [TypeSpec::TypedefName(_)]
    ));
}

#[test]
fn typedef_shadowing_ends_with_the_block() {
    // inside the block T is redeclared as a variable, so T * u parses
    // as multiplication; after the block T is a type again
    let source = "typedef int T; int f(void) { int T; int u; T * u; } T y;";
    assert!(try_parse(source).is_ok());
}

#[test]
fn function_definition_parses() {
    let unit = parse("int main(void) { return 0; }");
    let [ExternDecln::FuncDef(func)] = unit.declns.as_slice() else {
        panic!("expected a function definition");
    };
    assert_eq!(func.declr.name, Some(Symbol::from("main")));
    let [TypeModifier::Function(params, false)] = &func.declr.modifiers[..] else {
        panic!("expected a function declarator");
    };
    assert!(params.is_empty(), "(void) means no parameters");
}

#[test]
fn variadic_parameter_list_parses() {
    let unit = parse("int printf(char *fmt, ...);");
    let [ExternDecln::Decln(decln)] = unit.declns.as_slice() else {
        panic!("expected one declaration");
    };
    let [TypeModifier::Function(params, true)] = &decln.declrs[0].declr.modifiers[..] else {
        panic!("expected a variadic function declarator");
    };
    assert_eq!(params.len(), 1);
}

#[test]
fn struct_specifier_forms_parse() {
    assert!(try_parse("struct Point { int x; int y; };").is_ok());
    assert!(try_parse("struct Point;").is_ok());
    assert!(try_parse("struct { int x; } anon;").is_ok());
    assert!(try_parse("union U { int i; char c; };").is_ok());
    // a body or a tag is required
    assert!(try_parse("struct;").is_err());
}

#[test]
fn enum_specifier_parses_with_initializers_and_trailing_comma() {
    let unit = parse("enum Color { RED, GREEN = 5, BLUE, };");
    let [ExternDecln::Decln(decln)] = unit.declns.as_slice() else {
        panic!("expected one declaration");
    };
    let [TypeSpec::Enum(spec)] = &decln.specs.type_specs[..] else {
        panic!("expected an enum specifier");
    };
    let enumerators = spec.enumerators.as_ref().unwrap();
    assert_eq!(enumerators.len(), 3);
    assert!(enumerators[1].init.is_some());
}

#[test]
fn statements_parse() {
    let source = "
        int f(int n) {
            int total;
            total = 0;
            while (n > 0) {
                total += n;
                n--;
            }
            do { n++; } while (n < 0);
            for (n = 0; n < 10; n++) total += n;
            if (total > 100) total = 100; else total = total;
            goto done;
        done:
            return total;
        }
    ";
    assert!(try_parse(source).is_ok());
}

#[test]
fn switch_body_must_be_a_compound_statement() {
    assert!(try_parse("int f(int n) { switch (n) { case 1: return 1; default: return 0; } }").is_ok());
    assert!(try_parse("int f(int n) { switch (n) case 1: return 1; }").is_err());
}

#[test]
fn initializer_lists_parse_with_nesting_and_trailing_comma() {
    assert!(try_parse("int a[3] = {1, 2, 3};").is_ok());
    assert!(try_parse("int a[2][2] = {{1, 2}, {3, 4},};").is_ok());
    assert!(try_parse("struct P { int x; int y; } p = {1, 2};").is_ok());
}

#[test]
fn syntax_errors_carry_a_location() {
    let err = try_parse_expr("a +").unwrap_err();
    // the failure is an ordinary value, not a panic
    let _ = err.location();
    assert!(try_parse("int f( {").is_err());
}
