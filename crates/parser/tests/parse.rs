use indoc::indoc;
use lang_ast::surface::{BinOp, Decl, Exp, Predicate, Type};
use parser::parse;

fn parse_ok(src: &str) -> lang_ast::surface::Root {
    parse(src).expect("expected source to parse")
}

#[test]
fn parses_a_definition() {
    let root = parse_ok("def inc(x: Int32): Int32 = x + 1");
    assert_eq!(root.decls.len(), 1);
    let Decl::Def {
        ident,
        params,
        ret_ty,
        body,
        ..
    } = &root.decls[0]
    else {
        panic!("expected a def");
    };
    assert_eq!(ident.text, "inc");
    assert_eq!(params.len(), 1);
    assert_eq!(*ret_ty, Type::Int32);
    assert!(matches!(body, Exp::Binary { op: BinOp::Add, .. }));
}

#[test]
fn parses_annotations() {
    let root = parse_ok("@monotone @strict def f(x: Sign): Sign = x");
    let Decl::Def { anns, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    let names: Vec<_> = anns.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(names, vec!["monotone", "strict"]);
}

#[test]
fn parses_an_enum() {
    let root = parse_ok("enum Sign { case Neg, case Zer, case Pos }");
    let Decl::Enum { ident, cases, .. } = &root.decls[0] else {
        panic!("expected an enum");
    };
    assert_eq!(ident.text, "Sign");
    assert_eq!(cases.len(), 3);
    assert!(cases.iter().all(|c| c.ty.is_none()));
}

#[test]
fn parses_tables_and_index() {
    let root = parse_ok(indoc! {"
        rel Edge(x: Int32, y: Int32)
        lat Val(k: Int32, v: Sign)
        index Edge([x], [x, y])
    "});
    assert!(matches!(root.decls[0], Decl::Relation { .. }));
    assert!(matches!(root.decls[1], Decl::Lattice { .. }));
    let Decl::Index { table, keys, .. } = &root.decls[2] else {
        panic!("expected an index");
    };
    assert_eq!(table.text, "Edge");
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[1].len(), 2);
}

#[test]
fn parses_bounded_lattice_declaration() {
    let root = parse_ok("let Sign<> = (Sign.Bot, Sign.Top, leq, lub, glb)");
    let Decl::BoundedLattice { ty, elms, .. } = &root.decls[0] else {
        panic!("expected a bounded lattice declaration");
    };
    assert!(matches!(ty, Type::Named(_)));
    assert_eq!(elms.len(), 5);
    assert!(matches!(elms[0], Exp::Tag { .. }));
    assert!(matches!(elms[2], Exp::Var { .. }));
}

#[test]
fn parses_facts_and_rules() {
    let root = parse_ok(indoc! {"
        Edge(1, 2).
        Path(x, y) :- Edge(x, y).
        Path(x, z) :- Path(x, y), Edge(y, z).
    "});
    assert!(matches!(root.decls[0], Decl::Fact { .. }));
    let Decl::Rule { head, body, .. } = &root.decls[2] else {
        panic!("expected a rule");
    };
    let Predicate::Ambient { name, terms, .. } = head else {
        panic!("expected an ambient head");
    };
    assert_eq!(name.text, "Path");
    assert_eq!(terms.len(), 2);
    assert_eq!(body.len(), 2);
}

#[test]
fn parses_body_alias_disequality_and_loop() {
    let root = parse_ok("P(x) :- Q(x, y), z = y + 1, x != y, w <- s.");
    let Decl::Rule { body, .. } = &root.decls[0] else {
        panic!("expected a rule");
    };
    assert!(matches!(body[0], Predicate::Ambient { .. }));
    assert!(matches!(body[1], Predicate::Alias { .. }));
    assert!(matches!(body[2], Predicate::NotEqual { .. }));
    assert!(matches!(body[3], Predicate::Loop { .. }));
}

#[test]
fn parses_lattice_operators() {
    let root = parse_ok("def join(x: Sign, y: Sign): Sign = x ⊔ y");
    let Decl::Def { body, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    assert!(matches!(body, Exp::Binary { op: BinOp::Lub, .. }));
}

#[test]
fn parses_bottom_and_top() {
    let root = parse_ok("def f(x: Sign): Bool = ⊥ ⊑ ⊤");
    let Decl::Def { body, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    let Exp::Binary { op: BinOp::Leq, lhs, rhs, .. } = body else {
        panic!("expected ⊑");
    };
    assert!(matches!(**lhs, Exp::Bot(_)));
    assert!(matches!(**rhs, Exp::Top(_)));
}

#[test]
fn parses_match_and_let() {
    let root = parse_ok(indoc! {"
        def f(x: Sign): Int32 =
            let y = match x {
                case Neg => 1,
                case Zer => 0,
                case Pos => 1
            };
            y + 1
    "});
    let Decl::Def { body, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    assert!(matches!(body, Exp::LetMatch { .. }));
}

#[test]
fn parses_quantifiers() {
    let root = parse_ok("law refl(x: Sign) = forall (y: Sign). y ⊑ y");
    let Decl::Law { body, .. } = &root.decls[0] else {
        panic!("expected a law");
    };
    assert!(matches!(body, Exp::Forall { .. }));
}

#[test]
fn parses_namespaces() {
    let root = parse_ok(indoc! {"
        ns A::B {
            def f(x: Int32): Int32 = x
        }
    "});
    let Decl::Namespace { name, decls, .. } = &root.decls[0] else {
        panic!("expected a namespace");
    };
    assert_eq!(name.len(), 2);
    assert_eq!(decls.len(), 1);
}

#[test]
fn parses_collections() {
    let root = parse_ok(
        r#"def f(x: Int32): Int32 = (Some(1), None, [1, 2], #{1, 2}, #[1], @{1 => 2})"#,
    );
    let Decl::Def { body, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    let Exp::Tuple { elms, .. } = body else {
        panic!("expected a tuple");
    };
    assert!(matches!(elms[0], Exp::OptLit { elm: Some(_), .. }));
    assert!(matches!(elms[1], Exp::OptLit { elm: None, .. }));
    assert!(matches!(elms[2], Exp::ListLit { .. }));
    assert!(matches!(elms[3], Exp::SetLit { .. }));
    assert!(matches!(elms[4], Exp::VecLit { .. }));
    assert!(matches!(elms[5], Exp::MapLit { .. }));
}

#[test]
fn parses_infix_identifier() {
    let root = parse_ok("def f(x: Int32, y: Int32): Int32 = x `plus` y");
    let Decl::Def { body, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    let Exp::Infix { path, .. } = body else {
        panic!("expected infix application");
    };
    assert_eq!(path[0].text, "plus");
}

#[test]
fn parses_int_suffixes() {
    let root = parse_ok("def f(x: Int8): Int8 = 42i8");
    let Decl::Def { body, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    let Exp::Lit(lang_ast::surface::Lit::Int { text, suffix, .. }) = body else {
        panic!("expected an int literal");
    };
    assert_eq!(text, "42");
    assert_eq!(*suffix, lang_ast::surface::IntSuffix::I8);
}

#[test]
fn rejects_garbage() {
    assert!(parse("def = )").is_err());
    assert!(parse("P(x) :-").is_err());
}

#[test]
fn precedence_mul_binds_tighter_than_add() {
    let root = parse_ok("def f(x: Int32): Int32 = 1 + 2 * 3");
    let Decl::Def { body, .. } = &root.decls[0] else {
        panic!("expected a def");
    };
    let Exp::Binary { op: BinOp::Add, rhs, .. } = body else {
        panic!("expected + at the top");
    };
    assert!(matches!(**rhs, Exp::Binary { op: BinOp::Mul, .. }));
}
