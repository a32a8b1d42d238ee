use indoc::indoc;
use lang_ast::{weed, LatOp, QualName};
use lang_ty::Ty;

use crate::ir::{self, ExpKind};
use crate::{check, CheckError, ResolveError, TypeError};

pub fn check_src(src: &str) -> Result<ir::Root, Vec<CheckError>> {
    let root = parser::parse(src).expect("test source should parse");
    let module = weed(&root).expect("test source should weed");
    check(&module)
}

pub fn check_ok(src: &str) -> ir::Root {
    check_src(src).expect("expected checking to succeed")
}

pub fn check_err(src: &str) -> Vec<CheckError> {
    check_src(src).expect_err("expected checking to fail")
}

/// The five-point sign lattice used throughout the solver and verifier
/// tests as well.
pub const SIGN_PRELUDE: &str = indoc! {"
    enum Sign { case Bot, case Neg, case Zer, case Pos, case Top }

    def signLeq(x: Sign, y: Sign): Bool = match (x, y) {
        case (Bot, _) => true,
        case (_, Top) => true,
        case (Neg, Neg) => true,
        case (Zer, Zer) => true,
        case (Pos, Pos) => true,
        case _ => false
    }

    def signLub(x: Sign, y: Sign): Sign =
        if (signLeq(x, y)) y else if (signLeq(y, x)) x else Top

    def signGlb(x: Sign, y: Sign): Sign =
        if (signLeq(x, y)) x else if (signLeq(y, x)) y else Bot

    let Sign<> = (Bot, Top, signLeq, signLub, signGlb)
"};

fn with_sign(extra: &str) -> String {
    format!("{SIGN_PRELUDE}\n{extra}")
}

#[test]
fn simple_def_checks() {
    let root = check_ok("def inc(x: Int32): Int32 = x + 1");
    let def = &root.defs[&QualName::simple("inc")];
    assert_eq!(def.ret, Ty::Int32);
    assert_eq!(def.params, vec![("x".into(), Ty::Int32)]);
    assert_eq!(def.body.ty, Ty::Int32);
}

#[test]
fn body_type_must_match_signature() {
    let errors = check_err("def f(x: Int32): Bool = x + 1");
    assert!(errors
        .iter()
        .any(|e| matches!(e, CheckError::Type(TypeError::TypeMismatch { .. }))));
}

#[test]
fn unknown_name_is_reported() {
    let errors = check_err("def f(x: Int32): Int32 = missing(x)");
    assert!(errors.iter().any(|e| matches!(
        e,
        CheckError::Resolve(ResolveError::NameNotFound { name, .. })
            if name.leaf() == "missing"
    )));
}

#[test]
fn duplicate_definition_is_ambiguous_at_use() {
    let errors = check_err(indoc! {"
        def f(x: Int32): Int32 = x
        def f(x: Int32): Int32 = x + 1
        def g(x: Int32): Int32 = f(x)
    "});
    assert!(errors
        .iter()
        .any(|e| matches!(e, CheckError::Resolve(ResolveError::AmbiguousName { .. }))));
}

#[test]
fn namespace_local_name_wins_over_root() {
    let root = check_ok(indoc! {"
        def f(x: Int32): Int32 = x
        ns A {
            def f(x: Int32): Int32 = x + 1
            def g(x: Int32): Int32 = f(x)
        }
    "});
    let g = &root.defs[&QualName::new(vec!["A".into(), "g".into()])];
    let ExpKind::Apply { fun, .. } = &g.body.kind else {
        panic!("expected an application");
    };
    let ExpKind::Def(target) = &fun.kind else {
        panic!("expected a def reference");
    };
    assert_eq!(*target, QualName::new(vec!["A".into(), "f".into()]));
}

#[test]
fn bare_tag_resolves_to_construction() {
    let root = check_ok(&with_sign("def z(x: Sign): Sign = Zer"));
    let def = &root.defs[&QualName::simple("z")];
    let ExpKind::Tag { enum_name, tag, .. } = &def.body.kind else {
        panic!("expected a tag construction, got {:?}", def.body.kind);
    };
    assert_eq!(enum_name.leaf(), "Sign");
    assert_eq!(tag, "Zer");
}

#[test]
fn lattice_instance_registers_and_operator_resolves() {
    let root = check_ok(&with_sign("def join(x: Sign, y: Sign): Sign = x ⊔ y"));
    let join = &root.defs[&QualName::simple("join")];
    let ExpKind::Apply { fun, args } = &join.body.kind else {
        panic!("expected the operator to lower into an application");
    };
    assert_eq!(args.len(), 2);
    let ExpKind::LatOp { op, elem } = &fun.kind else {
        panic!("expected a lattice-operator target, got {:?}", fun.kind);
    };
    assert_eq!(*op, LatOp::Lub);
    assert!(matches!(elem, Ty::Enum { name, .. } if name.leaf() == "Sign"));
    assert!(root.lattices.contains_key(elem));
}

#[test]
fn lattice_operator_without_instance_fails() {
    let errors = check_err("def f(x: Int32, y: Int32): Int32 = x ⊔ y");
    assert!(errors.iter().any(|e| matches!(
        e,
        CheckError::Type(TypeError::UnsupportedLatticeOperation { .. })
    )));
}

#[test]
fn lattice_table_requires_registered_element() {
    let errors = check_err("lat W(k: Int32, v: Int32)");
    assert!(errors.iter().any(|e| matches!(
        e,
        CheckError::Type(TypeError::UnsupportedLatticeOperation { ty, .. }) if *ty == Ty::Int32
    )));
}

#[test]
fn lattice_table_with_registered_element_checks() {
    let root = check_ok(&with_sign("lat V(k: Int32, v: Sign)"));
    let table = &root.tables[&QualName::simple("V")];
    assert!(table.is_lattice());
    assert_eq!(table.arity(), 2);
}

#[test]
fn bounded_lattice_components_are_type_checked() {
    // signLeq has the wrong shape for lub.
    let errors = check_err(indoc! {"
        enum Sign { case Bot, case Top }
        def signLeq(x: Sign, y: Sign): Bool = true
        let Sign<> = (Bot, Top, signLeq, signLeq, signLeq)
    "});
    assert!(errors
        .iter()
        .any(|e| matches!(e, CheckError::Type(TypeError::TypeMismatch { .. }))));
}

#[test]
fn index_positions_follow_declaration_order() {
    let root = check_ok(indoc! {"
        rel R(a: Int32, b: Int32, c: Int32)
        index R([a, b], [c])
    "});
    assert_eq!(root.indexes[&QualName::simple("R")], vec![vec![0, 1], vec![2]]);
}

#[test]
fn index_with_unknown_attribute_fails() {
    let errors = check_err(indoc! {"
        rel R(a: Int32)
        index R([zz])
    "});
    assert!(errors.iter().any(|e| matches!(
        e,
        CheckError::Resolve(ResolveError::NameNotFound { name, .. }) if name.leaf() == "zz"
    )));
}

#[test]
fn rule_variables_type_against_table_schema() {
    let errors = check_err(indoc! {"
        rel Edge(x: Int32, y: Int32)
        rel Label(x: Str)
        Label(y) :- Edge(x, y).
    "});
    assert!(errors
        .iter()
        .any(|e| matches!(e, CheckError::Type(TypeError::TypeMismatch { .. }))));
}

#[test]
fn valid_rules_lower_into_constraints() {
    let root = check_ok(indoc! {"
        rel Edge(x: Int32, y: Int32)
        rel Path(x: Int32, y: Int32)
        Edge(1, 2).
        Path(x, y) :- Edge(x, y).
        Path(x, z) :- Path(x, y), Edge(y, z).
    "});
    assert_eq!(root.facts.len(), 1);
    assert_eq!(root.rules.len(), 2);
    let fact = &root.facts[0];
    assert_eq!(fact.head.table, QualName::simple("Edge"));
    assert!(fact.is_fact());
}

#[test]
fn fact_with_variable_fails_resolution() {
    let errors = check_err(indoc! {"
        rel Edge(x: Int32, y: Int32)
        Edge(x, 2).
    "});
    assert!(errors
        .iter()
        .any(|e| matches!(e, CheckError::Resolve(ResolveError::NameNotFound { .. }))));
}

#[test]
fn alias_and_disequality_type_check() {
    let root = check_ok(indoc! {"
        rel Edge(x: Int32, y: Int32)
        rel Out(x: Int32)
        Out(z) :- Edge(x, y), z = x + y, x != y.
    "});
    assert_eq!(root.rules.len(), 1);
    let body = &root.rules[0].body;
    assert!(matches!(body[1], ir::BodyAtom::Alias { .. }));
    assert!(matches!(body[2], ir::BodyAtom::NotEqual { .. }));
}

#[test]
fn recursive_enum_is_rejected() {
    let errors = check_err("enum E { case C(E) } def f(x: E): E = x");
    assert!(errors
        .iter()
        .any(|e| matches!(e, CheckError::Type(TypeError::RecursiveType { .. }))));
}

#[test]
fn unit_equality_simplifies_inside_def() {
    // S3: if () == () then 1 else 2 simplifies to 1.
    let root = check_ok("def f(x: Int32): Int32 = if (() == ()) 1 else 2");
    let def = &root.defs[&QualName::simple("f")];
    assert_eq!(
        def.body.kind,
        ExpKind::Lit(lang_ast::Literal::Int32(1))
    );
}

#[test]
fn match_results_must_agree() {
    let errors = check_err(&with_sign(indoc! {"
        def f(x: Sign): Int32 = match x {
            case Bot => 1,
            case Top => true,
            case _ => 0
        }
    "}));
    assert!(errors
        .iter()
        .any(|e| matches!(e, CheckError::Type(TypeError::TypeMismatch { .. }))));
}

#[test]
fn incomplete_match_is_completed_with_error_arm() {
    let root = check_ok(&with_sign(indoc! {"
        def f(x: Sign): Int32 = match x {
            case Bot => 0
        }
    "}));
    let def = &root.defs[&QualName::simple("f")];
    let ExpKind::Match { arms, .. } = &def.body.kind else {
        panic!("expected match");
    };
    assert_eq!(arms.len(), 2);
    assert!(matches!(arms[1].1.kind, ExpKind::UserError));
}

#[test]
fn widen_component_registers_widening_instance() {
    let root = check_ok(indoc! {"
        enum S { case Bot, case Top }
        def sLeq(x: S, y: S): Bool = true
        def sLub(x: S, y: S): S = y
        def sGlb(x: S, y: S): S = x
        def sWiden(x: S, y: S): S = Top
        let S<> = (Bot, Top, sLeq, sLub, sGlb, sWiden)
    "});
    let (_, inst) = root.lattices.iter().next().expect("instance registered");
    assert!(inst.widen.is_some());
}
