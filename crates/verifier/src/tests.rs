use indoc::indoc;
use lang_check::ir;

use crate::{
    verify, BackendError, Model, Outcome, Query, SmtBackend, SmtOutcome, VerifierError,
};

fn compile(src: &str) -> ir::Root {
    let root = parser::parse(src).expect("test source should parse");
    let module = lang_ast::weed(&root).expect("test source should weed");
    lang_check::check(&module).expect("test source should check")
}

/// Scripted backend: answers every query with one outcome and records what
/// it was asked.
struct StubBackend {
    outcome: SmtOutcome,
    seen: Vec<Query>,
}

impl StubBackend {
    fn unsat() -> Self {
        StubBackend {
            outcome: SmtOutcome::Unsat,
            seen: Vec::new(),
        }
    }

    fn sat() -> Self {
        StubBackend {
            outcome: SmtOutcome::Sat(Model(vec![("x".to_string(), "Sign.Top".to_string())])),
            seen: Vec::new(),
        }
    }

    fn unknown() -> Self {
        StubBackend {
            outcome: SmtOutcome::Unknown("timeout".to_string()),
            seen: Vec::new(),
        }
    }
}

impl SmtBackend for StubBackend {
    fn check(&mut self, query: &Query) -> Result<SmtOutcome, BackendError> {
        self.seen.push(query.clone());
        Ok(self.outcome.clone())
    }
}

const MOD3_PRELUDE: &str = indoc! {"
    enum Mod3 { case Bot, case Zer, case One, case Two, case Top }

    def m3Leq(x: Mod3, y: Mod3): Bool = match (x, y) {
        case (Bot, _) => true,
        case (_, Top) => true,
        case (Zer, Zer) => true,
        case (One, One) => true,
        case (Two, Two) => true,
        case _ => false
    }

    def m3Lub(x: Mod3, y: Mod3): Mod3 =
        if (m3Leq(x, y)) y else if (m3Leq(y, x)) x else Top

    def m3Glb(x: Mod3, y: Mod3): Mod3 =
        if (m3Leq(x, y)) x else if (m3Leq(y, x)) y else Bot

    let Mod3<> = (Bot, Top, m3Leq, m3Lub, m3Glb)
"};

#[test]
fn instance_laws_are_discharged() {
    let root = compile(MOD3_PRELUDE);
    let mut backend = StubBackend::unsat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");

    // PartialOrder(3) + Join(4) + Meet(4) + Lattice(1) + Bounded(3).
    assert_eq!(reports.len(), 15);
    let proved = reports
        .iter()
        .filter(|r| r.outcome == Outcome::Proved)
        .count();
    // Everything proves except the ascending-chain law, which needs a
    // height function.
    assert_eq!(proved, 14);
    assert!(reports.iter().any(|r| {
        r.kind == "ascending-chain" && matches!(r.outcome, Outcome::Inconclusive(_))
    }));
}

#[test]
fn height_definition_enables_the_chain_law() {
    let src = format!(
        "{MOD3_PRELUDE}\n{}",
        indoc! {"
            def height(x: Mod3): BigInt = match x {
                case Bot => 2ii,
                case Top => 0ii,
                case _ => 1ii
            }
        "}
    );
    let root = compile(&src);
    let mut backend = StubBackend::unsat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");
    let chain = reports
        .iter()
        .find(|r| r.kind == "ascending-chain")
        .expect("chain law reported");
    assert_eq!(chain.outcome, Outcome::Proved);
    // The query defined the height function for the solver.
    assert!(backend
        .seen
        .iter()
        .any(|q| q.funs.iter().any(|f| f.name == "height")));
}

#[test]
fn monotone_annotation_generates_a_query() {
    // The mod-3 increment spins the cycle and fixes the bounds; its
    // monotonicity is the canonical annotation proof.
    let src = format!(
        "{MOD3_PRELUDE}\n{}",
        indoc! {"
            @monotone def inc(x: Mod3): Mod3 = match x {
                case Bot => Bot,
                case Zer => One,
                case One => Two,
                case Two => Zer,
                case Top => Top
            }
        "}
    );
    let root = compile(&src);
    let mut backend = StubBackend::unsat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");

    let inc = reports
        .iter()
        .find(|r| r.subject == "inc" && r.kind == "monotone")
        .expect("monotone obligation reported");
    assert_eq!(inc.outcome, Outcome::Proved);

    let query = backend
        .seen
        .iter()
        .find(|q| q.name == "inc:monotone")
        .expect("query was submitted");
    assert!(query.funs.iter().any(|f| f.name == "inc"));
    assert!(query.sorts.iter().any(|s| s.name == "Mod3" && s.elems.len() == 5));
    assert_eq!(query.asserts.len(), 1);
}

#[test]
fn sat_is_a_counter_example() {
    let root = compile(MOD3_PRELUDE);
    let mut backend = StubBackend::sat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");
    let first = &reports[0];
    assert!(matches!(first.outcome, Outcome::CounterExample(_)));
    assert!(matches!(
        first.as_error(),
        Some(VerifierError::LawViolation { .. })
    ));
}

#[test]
fn unknown_is_inconclusive() {
    let root = compile(MOD3_PRELUDE);
    let mut backend = StubBackend::unknown();
    let reports = verify(&root, &mut backend).expect("backend is infallible");
    assert!(matches!(
        reports[0].outcome,
        Outcome::Inconclusive(ref r) if r == "timeout"
    ));
    assert!(matches!(
        reports[0].as_error(),
        Some(VerifierError::Inconclusive { .. })
    ));
}

#[test]
fn commutative_annotation_on_binary_def() {
    let src = format!(
        "{MOD3_PRELUDE}\n{}",
        "@commutative def join2(x: Mod3, y: Mod3): Mod3 = m3Lub(x, y)\n"
    );
    let root = compile(&src);
    let mut backend = StubBackend::unsat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");
    let r = reports
        .iter()
        .find(|r| r.subject == "join2" && r.kind == "commutative")
        .expect("commutative obligation reported");
    assert_eq!(r.outcome, Outcome::Proved);
}

#[test]
fn user_declared_laws_are_discharged() {
    let src = format!(
        "{MOD3_PRELUDE}\n{}",
        "law lubRefl(x: Mod3) = m3Leq(x, m3Lub(x, x))\n"
    );
    let root = compile(&src);
    let mut backend = StubBackend::unsat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");
    let r = reports
        .iter()
        .find(|r| r.subject == "lubRefl" && r.kind == "law")
        .expect("law obligation reported");
    assert_eq!(r.outcome, Outcome::Proved);
    let query = backend
        .seen
        .iter()
        .find(|q| q.name == "lubRefl:law")
        .expect("query submitted");
    assert!(query.asserts[0].starts_with("(not "));
}

#[test]
fn recursive_definition_is_inconclusive() {
    let src = format!(
        "{MOD3_PRELUDE}\n{}",
        indoc! {"
            @monotone def spin(x: Mod3): Mod3 = spin(x)
        "}
    );
    let root = compile(&src);
    let mut backend = StubBackend::unsat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");
    let r = reports
        .iter()
        .find(|r| r.subject == "spin")
        .expect("obligation reported");
    assert!(matches!(
        r.outcome,
        Outcome::Inconclusive(ref reason) if reason.contains("recursive")
    ));
}

#[test]
fn strict_annotation_uses_instance_bottoms() {
    let src = format!(
        "{MOD3_PRELUDE}\n{}",
        "@strict def keep(x: Mod3): Mod3 = x\n"
    );
    let root = compile(&src);
    let mut backend = StubBackend::unsat();
    let reports = verify(&root, &mut backend).expect("backend is infallible");
    let r = reports
        .iter()
        .find(|r| r.subject == "keep" && r.kind == "strict")
        .expect("strict obligation reported");
    assert_eq!(r.outcome, Outcome::Proved);
    let query = backend
        .seen
        .iter()
        .find(|q| q.name == "keep:strict")
        .expect("query submitted");
    assert!(query.asserts[0].contains("Mod3.Bot"));
}
