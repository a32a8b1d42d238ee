use indoc::indoc;
use lang_ast::QualName;
use lang_check::ir;

use crate::value::Value;
use crate::{solve, solve_naive, Fixpoint, SolverError, SolverOptions};

fn compile(src: &str) -> ir::Root {
    let root = parser::parse(src).expect("test source should parse");
    let module = lang_ast::weed(&root).expect("test source should weed");
    lang_check::check(&module).expect("test source should check")
}

fn run(src: &str) -> Fixpoint {
    solve(&compile(src), &SolverOptions::default()).expect("expected solving to succeed")
}

fn int_row(values: &[i32]) -> Vec<Value> {
    values.iter().map(|&n| Value::Int32(n)).collect()
}

fn sign(tag: &str) -> Value {
    Value::Tag(QualName::simple("Sign"), tag.into(), Box::new(Value::Unit))
}

const SIGN_PRELUDE: &str = indoc! {"
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

const PATH_PROGRAM: &str = indoc! {"
    rel Edge(x: Int32, y: Int32)
    rel Path(x: Int32, y: Int32)

    Edge(1, 2).
    Edge(2, 3).
    Edge(3, 4).

    Path(x, y) :- Edge(x, y).
    Path(x, z) :- Path(x, y), Edge(y, z).
"};

#[test]
fn transitive_closure_reaches_fixpoint() {
    let fix = run(PATH_PROGRAM);
    let path = fix.relation("Path").expect("Path exists");
    let expected: Vec<Vec<Value>> = vec![
        int_row(&[1, 2]),
        int_row(&[1, 3]),
        int_row(&[1, 4]),
        int_row(&[2, 3]),
        int_row(&[2, 4]),
        int_row(&[3, 4]),
    ];
    assert_eq!(path.iter().cloned().collect::<Vec<_>>(), expected);
}

#[test]
fn semi_naive_matches_naive() {
    let root = compile(PATH_PROGRAM);
    let semi = solve(&root, &SolverOptions::default()).expect("semi-naive");
    let naive = solve_naive(&root, &SolverOptions::default()).expect("naive");
    assert_eq!(semi, naive);
}

#[test]
fn rule_order_does_not_change_the_fixpoint() {
    // The same program with the rule declarations permuted.
    let permuted = indoc! {"
        rel Edge(x: Int32, y: Int32)
        rel Path(x: Int32, y: Int32)

        Path(x, z) :- Path(x, y), Edge(y, z).
        Path(x, y) :- Edge(x, y).

        Edge(3, 4).
        Edge(1, 2).
        Edge(2, 3).
    "};
    assert_eq!(run(PATH_PROGRAM), run(permuted));
}

#[test]
fn sign_join_reaches_top() {
    // S1: two incomparable values at the same key join to ⊤.
    let src = format!(
        "{SIGN_PRELUDE}\n{}",
        indoc! {"
            lat V(k: Int32, v: Sign)
            V(1, Neg).
            V(1, Pos).
        "}
    );
    let fix = run(&src);
    let v = fix.lattice("V").expect("V exists");
    assert_eq!(v.get(&int_row(&[1])), Some(&sign("Top")));
}

#[test]
fn comparable_values_join_to_the_larger() {
    let src = format!(
        "{SIGN_PRELUDE}\n{}",
        indoc! {"
            lat V(k: Int32, v: Sign)
            V(1, Bot).
            V(1, Zer).
        "}
    );
    let fix = run(&src);
    let v = fix.lattice("V").expect("V exists");
    assert_eq!(v.get(&int_row(&[1])), Some(&sign("Zer")));
}

#[test]
fn bottom_insertions_are_suppressed() {
    let src = format!(
        "{SIGN_PRELUDE}\n{}",
        indoc! {"
            lat V(k: Int32, v: Sign)
            V(1, Bot).
        "}
    );
    let fix = run(&src);
    let v = fix.lattice("V").expect("V exists");
    assert!(v.is_empty());
}

#[test]
fn lattice_values_propagate_through_rules() {
    let src = format!(
        "{SIGN_PRELUDE}\n{}",
        indoc! {"
            lat In(k: Int32, v: Sign)
            lat Out(k: Int32, v: Sign)
            In(1, Neg).
            In(1, Pos).
            Out(k, v) :- In(k, v).
        "}
    );
    let fix = run(&src);
    let out = fix.lattice("Out").expect("Out exists");
    assert_eq!(out.get(&int_row(&[1])), Some(&sign("Top")));
}

#[test]
fn alias_disequality_and_arithmetic() {
    let fix = run(indoc! {"
        rel Edge(x: Int32, y: Int32)
        rel Sum(s: Int32)
        Edge(1, 2).
        Edge(3, 3).
        Sum(s) :- Edge(x, y), x != y, s = x + y.
    "});
    let sum = fix.relation("Sum").expect("Sum exists");
    assert_eq!(sum.iter().cloned().collect::<Vec<_>>(), vec![int_row(&[3])]);
}

#[test]
fn division_by_zero_suppresses_the_row() {
    let fix = run(indoc! {"
        rel Edge(x: Int32, y: Int32)
        rel Quot(q: Int32)
        Edge(4, 2).
        Edge(1, 0).
        Quot(q) :- Edge(x, y), q = x / y.
    "});
    let quot = fix.relation("Quot").expect("Quot exists");
    assert_eq!(quot.iter().cloned().collect::<Vec<_>>(), vec![int_row(&[2])]);
}

#[test]
fn loop_iterates_set_elements() {
    let fix = run(indoc! {"
        def spread(u: Int32): Set[Int32] = #{u, u + 1, u + 2}
        rel Src(u: Int32)
        rel Out(x: Int32)
        Src(10).
        Out(x) :- Src(u), x <- spread(u).
    "});
    let out = fix.relation("Out").expect("Out exists");
    assert_eq!(
        out.iter().cloned().collect::<Vec<_>>(),
        vec![int_row(&[10]), int_row(&[11]), int_row(&[12])]
    );
}

#[test]
fn user_error_aborts_solving() {
    let root = compile(indoc! {"
        rel Edge(x: Int32, y: Int32)
        rel Out(x: Int32)
        Edge(1, 2).
        Out(x) :- Edge(x, y), z = ???.
    "});
    let err = solve(&root, &SolverOptions::default()).expect_err("expected a user error");
    assert!(matches!(err, SolverError::UserError { .. }));
}

#[test]
fn iteration_cap_yields_non_terminating_with_last_delta() {
    // S6: an unbounded chain of BigInt counters keeps strictly increasing.
    let src = indoc! {"
        def bigLeq(x: BigInt, y: BigInt): Bool = x <= y
        def bigMax(x: BigInt, y: BigInt): BigInt = if (bigLeq(x, y)) y else x
        def bigMin(x: BigInt, y: BigInt): BigInt = if (bigLeq(x, y)) x else y
        let BigInt<> = (0ii, 0ii, bigLeq, bigMax, bigMin)

        lat Cnt(k: Int32, v: BigInt)
        Cnt(1, 1ii).
        Cnt(1, v + 1ii) :- Cnt(1, v).
    "};
    let root = compile(src);
    let opts = SolverOptions { iteration_cap: 16 };
    let err = solve(&root, &opts).expect_err("expected the cap to trip");
    let SolverError::NonTerminating {
        cap,
        partial,
        last_delta,
    } = err
    else {
        panic!("expected NonTerminating, got {err:?}");
    };
    assert_eq!(cap, 16);
    assert!(partial.lattice("Cnt").is_some_and(|t| !t.is_empty()));
    assert!(last_delta.contains_key(&QualName::simple("Cnt")));
}

#[test]
fn indexes_do_not_change_results() {
    let indexed = format!("{PATH_PROGRAM}\nindex Edge([x], [x, y])\nindex Path([y])");
    assert_eq!(run(PATH_PROGRAM), run(&indexed));
}

#[test]
fn facts_only_program_solves_immediately() {
    let fix = run(indoc! {"
        rel R(a: Int32)
        R(1).
        R(2).
        R(1).
    "});
    let r = fix.relation("R").expect("R exists");
    assert_eq!(r.len(), 2);
}

#[test]
fn namespaced_tables_resolve() {
    let fix = run(indoc! {"
        ns G {
            rel Edge(x: Int32, y: Int32)
            rel Out(x: Int32)
            Edge(7, 8).
            Out(y) :- Edge(x, y).
        }
    "});
    let out = fix
        .relations
        .get(&QualName::new(vec!["G".into(), "Out".into()]))
        .expect("G::Out exists");
    assert_eq!(out.iter().cloned().collect::<Vec<_>>(), vec![int_row(&[8])]);
}
