use smol_str::SmolStr;

use crate::surface::{self, IntSuffix, Lit};
use crate::{weed, BinOp, Expr, Ident, Literal, QualName, Span, WeedError};

fn sp(start: u32, end: u32) -> Span {
    Span::new(start, end)
}

fn id(text: &str) -> Ident {
    Ident::new(text, Span::DUMMY)
}

fn id_at(text: &str, start: u32) -> Ident {
    Ident::new(text, sp(start, start + text.len() as u32))
}

fn int32(text: &str) -> surface::Exp {
    surface::Exp::Lit(Lit::Int {
        text: SmolStr::new(text),
        suffix: IntSuffix::I32,
        span: Span::DUMMY,
    })
}

fn var(name: &str) -> surface::Exp {
    surface::Exp::Var {
        path: vec![id(name)],
        span: Span::DUMMY,
    }
}

fn def_decl(name: &str, params: Vec<surface::Param>, body: surface::Exp) -> surface::Decl {
    surface::Decl::Def {
        ident: id(name),
        anns: vec![],
        params,
        ret_ty: surface::Type::Int32,
        body,
        span: Span::DUMMY,
    }
}

fn param(name: &str) -> surface::Param {
    surface::Param {
        ident: id(name),
        ty: surface::Type::Int32,
    }
}

fn root(decls: Vec<surface::Decl>) -> surface::Root {
    surface::Root { decls }
}

fn weed_err(decls: Vec<surface::Decl>) -> Vec<WeedError> {
    weed(&root(decls)).expect_err("expected weeding to fail")
}

#[test]
fn duplicate_tag_reports_both_locations() {
    let decl = surface::Decl::Enum {
        ident: id("E"),
        cases: vec![
            surface::Case {
                tag: id_at("A", 10),
                ty: None,
            },
            surface::Case {
                tag: id_at("A", 20),
                ty: None,
            },
        ],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![decl]);
    assert_eq!(
        errors,
        vec![WeedError::DuplicateTag {
            name: "A".into(),
            loc1: sp(10, 11),
            loc2: sp(20, 21),
        }]
    );
}

#[test]
fn def_requires_parameters() {
    let errors = weed_err(vec![def_decl("f", vec![], int32("1"))]);
    assert!(matches!(errors[0], WeedError::IllegalParameterList { .. }));
}

#[test]
fn duplicate_formals_rejected() {
    let errors = weed_err(vec![def_decl("f", vec![param("x"), param("x")], int32("1"))]);
    assert!(matches!(errors[0], WeedError::DuplicateFormal { .. }));
}

#[test]
fn unknown_annotation_rejected() {
    let decl = surface::Decl::Def {
        ident: id("f"),
        anns: vec![id("memoize")],
        params: vec![param("x")],
        ret_ty: surface::Type::Int32,
        body: int32("1"),
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![decl]);
    assert_eq!(
        errors,
        vec![WeedError::IllegalAnnotation {
            name: "memoize".into(),
            loc: Span::DUMMY,
        }]
    );
}

#[test]
fn empty_relation_rejected() {
    let decl = surface::Decl::Relation {
        ident: id("R"),
        attrs: vec![],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![decl]);
    assert!(matches!(errors[0], WeedError::EmptyRelation { .. }));
}

#[test]
fn lattice_table_splits_keys_and_value() {
    let decl = surface::Decl::Lattice {
        ident: id("V"),
        attrs: vec![
            (id("k"), surface::Type::Int32),
            (id("v"), surface::Type::Named(vec![id("Sign")])),
        ],
        span: Span::DUMMY,
    };
    let module = weed(&root(vec![decl])).unwrap();
    let crate::DeclKind::Lattice(lat) = &module.decls[0].kind else {
        panic!("expected a lattice declaration");
    };
    assert_eq!(lat.keys.len(), 1);
    assert_eq!(lat.keys[0].ident.text, "k");
    assert_eq!(lat.value.ident.text, "v");
}

#[test]
fn index_keys_must_be_non_empty() {
    let decl = surface::Decl::Index {
        table: id("R"),
        keys: vec![vec![id("a")], vec![]],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![decl]);
    assert!(matches!(errors[0], WeedError::IllegalIndex { .. }));
}

#[test]
fn bounded_lattice_arity_checked() {
    let decl = surface::Decl::BoundedLattice {
        ty: surface::Type::Named(vec![id("Sign")]),
        elms: vec![var("b"), var("t"), var("l")],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![decl]);
    assert!(matches!(errors[0], WeedError::IllegalLattice { .. }));
}

#[test]
fn duplicate_aliases_all_reported() {
    // x = 1, x = 2, x = 3 — two duplicates, both surfaced.
    let mk_alias = |start: u32, e: surface::Exp| surface::Predicate::Alias {
        ident: id_at("x", start),
        exp: e,
        span: Span::DUMMY,
    };
    let rule = surface::Decl::Rule {
        head: surface::Predicate::Ambient {
            name: id("P"),
            terms: vec![var("x")],
            span: Span::DUMMY,
        },
        body: vec![
            mk_alias(0, int32("1")),
            mk_alias(10, int32("2")),
            mk_alias(20, int32("3")),
        ],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![rule]);
    let dupes: Vec<_> = errors
        .iter()
        .filter(|e| matches!(e, WeedError::DuplicateAlias { .. }))
        .collect();
    assert_eq!(dupes.len(), 2);
}

#[test]
fn head_may_not_be_true() {
    let rule = surface::Decl::Rule {
        head: surface::Predicate::True(sp(0, 4)),
        body: vec![],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![rule]);
    assert_eq!(
        errors,
        vec![WeedError::IllegalHeadPredicate { loc: sp(0, 4) }]
    );
}

#[test]
fn empty_tuple_becomes_unit_and_one_tuple_unwraps() {
    let module = weed(&root(vec![def_decl(
        "f",
        vec![param("x")],
        surface::Exp::Tuple {
            elms: vec![],
            span: Span::DUMMY,
        },
    )]))
    .unwrap();
    let crate::DeclKind::Def(def) = &module.decls[0].kind else {
        panic!("expected def");
    };
    assert_eq!(module[def.body], Expr::Lit(Literal::Unit));

    let module = weed(&root(vec![def_decl(
        "g",
        vec![param("x")],
        surface::Exp::Tuple {
            elms: vec![int32("7")],
            span: Span::DUMMY,
        },
    )]))
    .unwrap();
    let crate::DeclKind::Def(def) = &module.decls[0].kind else {
        panic!("expected def");
    };
    assert_eq!(module[def.body], Expr::Lit(Literal::Int32(7)));
}

#[test]
fn tag_without_payload_gets_unit() {
    let module = weed(&root(vec![def_decl(
        "f",
        vec![param("x")],
        surface::Exp::Tag {
            enum_path: Some(vec![id("Sign")]),
            tag: id("Pos"),
            payload: None,
            span: Span::DUMMY,
        },
    )]))
    .unwrap();
    let crate::DeclKind::Def(def) = &module.decls[0].kind else {
        panic!("expected def");
    };
    let Expr::Tag { payload, .. } = &module[def.body] else {
        panic!("expected tag");
    };
    assert_eq!(module[*payload], Expr::Lit(Literal::Unit));
}

#[test]
fn lattice_operator_desugars_to_named_call() {
    let exp = surface::Exp::Binary {
        op: surface::BinOp::Lub,
        lhs: Box::new(var("a")),
        rhs: Box::new(var("b")),
        span: Span::DUMMY,
    };
    let module = weed(&root(vec![def_decl("f", vec![param("a")], exp)])).unwrap();
    let crate::DeclKind::Def(def) = &module.decls[0].kind else {
        panic!("expected def");
    };
    let Expr::Apply { fun, args } = &module[def.body] else {
        panic!("expected the operator to desugar into a call");
    };
    assert_eq!(module[*fun], Expr::Var(QualName::simple("lub")));
    assert_eq!(args.len(), 2);
}

#[test]
fn let_match_with_variable_pattern_is_let() {
    let exp = surface::Exp::LetMatch {
        pat: surface::Pat::Var(id("y")),
        value: Box::new(int32("1")),
        body: Box::new(var("y")),
        span: Span::DUMMY,
    };
    let module = weed(&root(vec![def_decl("f", vec![param("x")], exp)])).unwrap();
    let crate::DeclKind::Def(def) = &module.decls[0].kind else {
        panic!("expected def");
    };
    assert!(matches!(module[def.body], Expr::Let { .. }));
}

#[test]
fn let_match_with_tuple_pattern_is_single_arm_match() {
    let exp = surface::Exp::LetMatch {
        pat: surface::Pat::Tuple(
            vec![surface::Pat::Var(id("a")), surface::Pat::Var(id("b"))],
            Span::DUMMY,
        ),
        value: Box::new(var("x")),
        body: Box::new(var("a")),
        span: Span::DUMMY,
    };
    let module = weed(&root(vec![def_decl("f", vec![param("x")], exp)])).unwrap();
    let crate::DeclKind::Def(def) = &module.decls[0].kind else {
        panic!("expected def");
    };
    let Expr::Match { arms, .. } = &module[def.body] else {
        panic!("expected match");
    };
    assert_eq!(arms.len(), 1);
}

#[test]
fn non_linear_pattern_rejected() {
    let exp = surface::Exp::Match {
        scrutinee: Box::new(var("x")),
        arms: vec![(
            surface::Pat::Tuple(
                vec![
                    surface::Pat::Var(id_at("a", 5)),
                    surface::Pat::Var(id_at("a", 9)),
                ],
                Span::DUMMY,
            ),
            int32("1"),
        )],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![def_decl("f", vec![param("x")], exp)]);
    assert_eq!(
        errors,
        vec![WeedError::NonLinearPattern {
            name: "a".into(),
            loc1: sp(5, 6),
            loc2: sp(9, 10),
        }]
    );
}

#[test]
fn out_of_range_int_rejected() {
    let exp = surface::Exp::Lit(Lit::Int {
        text: "300".into(),
        suffix: IntSuffix::I8,
        span: sp(3, 6),
    });
    let errors = weed_err(vec![def_decl("f", vec![param("x")], exp)]);
    assert_eq!(
        errors,
        vec![WeedError::IllegalInt {
            text: "300".into(),
            loc: sp(3, 6),
        }]
    );
}

#[test]
fn wildcard_in_expression_position_rejected() {
    let errors = weed_err(vec![def_decl(
        "f",
        vec![param("x")],
        surface::Exp::Wild(sp(1, 2)),
    )]);
    assert_eq!(errors, vec![WeedError::IllegalWildcard { loc: sp(1, 2) }]);
}

#[test]
fn independent_errors_accumulate() {
    let bad_enum = surface::Decl::Enum {
        ident: id("E"),
        cases: vec![
            surface::Case {
                tag: id_at("A", 1),
                ty: None,
            },
            surface::Case {
                tag: id_at("A", 2),
                ty: None,
            },
        ],
        span: Span::DUMMY,
    };
    let bad_rel = surface::Decl::Relation {
        ident: id("R"),
        attrs: vec![],
        span: Span::DUMMY,
    };
    let errors = weed_err(vec![bad_enum, bad_rel]);
    assert_eq!(errors.len(), 2);
}

#[test]
fn weeding_is_deterministic() {
    let decls = vec![def_decl(
        "f",
        vec![param("x")],
        surface::Exp::Binary {
            op: surface::BinOp::Add,
            lhs: Box::new(var("x")),
            rhs: Box::new(int32("1")),
            span: Span::DUMMY,
        },
    )];
    let a = weed(&root(decls.clone())).unwrap();
    let b = weed(&root(decls)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn binary_core_op_survives() {
    let exp = surface::Exp::Binary {
        op: surface::BinOp::Add,
        lhs: Box::new(var("x")),
        rhs: Box::new(int32("2")),
        span: Span::DUMMY,
    };
    let module = weed(&root(vec![def_decl("f", vec![param("x")], exp)])).unwrap();
    let crate::DeclKind::Def(def) = &module.decls[0].kind else {
        panic!("expected def");
    };
    assert!(matches!(
        module[def.body],
        Expr::Binary { op: BinOp::Add, .. }
    ));
}
