// ==============================================================================
// Simplifier
// ==============================================================================
//
// Three monotone tree rewrites over the frozen IR, in fixed order:
//
//   1. copy propagation   — identity at present, the slot is reserved;
//   2. unit equality      — `e₁ == e₂` at type Unit is literally `true`,
//                           Unit has one inhabitant and IR is effect-free;
//   3. dead branches      — `if true/false then a else b` folds.
//
// Each pass is idempotent and none creates work for an earlier one, so a
// single run suffices. The simplifier also completes match expressions:
// arms that do not cover their scrutinee get a trailing wildcard arm that
// evaluates to a user error, which makes every IR match exhaustive.

use lang_ast::{BinOp, Literal};
use lang_ty::Ty;

use crate::ir::{self, Exp, ExpKind, Pat};

pub fn simplify(mut root: ir::Root) -> ir::Root {
    for def in root.defs.values_mut() {
        let span = def.body.span;
        def.body = simplify_exp(std::mem::replace(&mut def.body, Exp::truth(span)));
    }
    for law in root.laws.values_mut() {
        let span = law.body.span;
        law.body = simplify_exp(std::mem::replace(&mut law.body, Exp::truth(span)));
    }
    for inst in root.lattices.values_mut() {
        for exp in [
            &mut inst.bot,
            &mut inst.top,
            &mut inst.leq,
            &mut inst.lub,
            &mut inst.glb,
        ] {
            let taken = std::mem::replace(exp, Exp::truth(exp.span));
            *exp = simplify_exp(taken);
        }
        if let Some(w) = &mut inst.widen {
            let taken = std::mem::replace(w, Exp::truth(w.span));
            *w = simplify_exp(taken);
        }
    }
    for constraint in root.facts.iter_mut().chain(root.rules.iter_mut()) {
        for term in &mut constraint.head.terms {
            let taken = std::mem::replace(term, Exp::truth(term.span));
            *term = simplify_exp(taken);
        }
        for atom in &mut constraint.body {
            match atom {
                ir::BodyAtom::Alias { exp, .. } | ir::BodyAtom::Loop { exp, .. } => {
                    let taken = std::mem::replace(exp, Exp::truth(exp.span));
                    *exp = simplify_exp(taken);
                }
                ir::BodyAtom::Atom { .. } | ir::BodyAtom::NotEqual { .. } => {}
            }
        }
    }
    root
}

fn simplify_exp(exp: Exp) -> Exp {
    let exp = copy_propagation(exp);
    let exp = rewrite(exp, &unit_equality);
    rewrite(exp, &dead_branches)
}

/// Pass 1 — reserved. Copy propagation is the identity until the IR grows
/// aliased bindings worth collapsing.
fn copy_propagation(exp: Exp) -> Exp {
    exp
}

/// Pass 2 — `Binary(==, e₁: Unit, e₂: Unit)` becomes `true`.
fn unit_equality(exp: Exp) -> Exp {
    match &exp.kind {
        ExpKind::Binary { op: BinOp::Eq, lhs, rhs }
            if lhs.ty == Ty::Unit && rhs.ty == Ty::Unit =>
        {
            Exp::new(ExpKind::Lit(Literal::Bool(true)), Ty::Bool, exp.span)
        }
        _ => exp,
    }
}

/// Pass 3 — fold `if` on literal conditions.
fn dead_branches(exp: Exp) -> Exp {
    match exp.kind {
        ExpKind::IfThenElse {
            cond,
            then_body,
            else_body,
        } => match cond.kind {
            ExpKind::Lit(Literal::Bool(true)) => *then_body,
            ExpKind::Lit(Literal::Bool(false)) => *else_body,
            _ => Exp::new(
                ExpKind::IfThenElse {
                    cond,
                    then_body,
                    else_body,
                },
                exp.ty,
                exp.span,
            ),
        },
        kind => Exp::new(kind, exp.ty, exp.span),
    }
}

/// Bottom-up rewrite: children first, then the node itself. Also completes
/// non-exhaustive matches with a wildcard arm raising a user error.
fn rewrite(exp: Exp, f: &dyn Fn(Exp) -> Exp) -> Exp {
    let Exp { kind, ty, span } = exp;
    let kind = match kind {
        ExpKind::Lit(_)
        | ExpKind::Var(_)
        | ExpKind::Def(_)
        | ExpKind::LatOp { .. }
        | ExpKind::UserError => kind,
        ExpKind::Lambda { params, body } => ExpKind::Lambda {
            params,
            body: Box::new(rewrite(*body, f)),
        },
        ExpKind::Apply { fun, args } => ExpKind::Apply {
            fun: Box::new(rewrite(*fun, f)),
            args: args.into_iter().map(|a| rewrite(a, f)).collect(),
        },
        ExpKind::Unary { op, exp } => ExpKind::Unary {
            op,
            exp: Box::new(rewrite(*exp, f)),
        },
        ExpKind::Binary { op, lhs, rhs } => ExpKind::Binary {
            op,
            lhs: Box::new(rewrite(*lhs, f)),
            rhs: Box::new(rewrite(*rhs, f)),
        },
        ExpKind::IfThenElse {
            cond,
            then_body,
            else_body,
        } => ExpKind::IfThenElse {
            cond: Box::new(rewrite(*cond, f)),
            then_body: Box::new(rewrite(*then_body, f)),
            else_body: Box::new(rewrite(*else_body, f)),
        },
        ExpKind::Let { name, value, body } => ExpKind::Let {
            name,
            value: Box::new(rewrite(*value, f)),
            body: Box::new(rewrite(*body, f)),
        },
        ExpKind::Match { scrutinee, arms } => {
            let scrutinee = Box::new(rewrite(*scrutinee, f));
            let mut arms: Vec<(Pat, Exp)> = arms
                .into_iter()
                .map(|(p, e)| (p, rewrite(e, f)))
                .collect();
            if !is_exhaustive(&scrutinee.ty, &arms) {
                arms.push((Pat::Wild, Exp::new(ExpKind::UserError, ty.clone(), span)));
            }
            ExpKind::Match { scrutinee, arms }
        }
        ExpKind::Tag {
            enum_name,
            tag,
            payload,
        } => ExpKind::Tag {
            enum_name,
            tag,
            payload: Box::new(rewrite(*payload, f)),
        },
        ExpKind::Tuple(elms) => {
            ExpKind::Tuple(elms.into_iter().map(|e| rewrite(e, f)).collect())
        }
        ExpKind::OptLit(elm) => ExpKind::OptLit(elm.map(|e| Box::new(rewrite(*e, f)))),
        ExpKind::ListLit(elms) => {
            ExpKind::ListLit(elms.into_iter().map(|e| rewrite(e, f)).collect())
        }
        ExpKind::VecLit(elms) => {
            ExpKind::VecLit(elms.into_iter().map(|e| rewrite(e, f)).collect())
        }
        ExpKind::SetLit(elms) => {
            ExpKind::SetLit(elms.into_iter().map(|e| rewrite(e, f)).collect())
        }
        ExpKind::MapLit(elms) => ExpKind::MapLit(
            elms.into_iter()
                .map(|(k, v)| (rewrite(k, f), rewrite(v, f)))
                .collect(),
        ),
        ExpKind::Exists { params, body } => ExpKind::Exists {
            params,
            body: Box::new(rewrite(*body, f)),
        },
        ExpKind::Forall { params, body } => ExpKind::Forall {
            params,
            body: Box::new(rewrite(*body, f)),
        },
        ExpKind::Ascribe(inner) => ExpKind::Ascribe(Box::new(rewrite(*inner, f))),
    };
    f(Exp::new(kind, ty, span))
}

/// A match is exhaustive when some arm is irrefutable, or when the
/// scrutinee is an enum and every tag is covered by a variable-free-enough
/// arm. Anything else gets the synthesized default.
fn is_exhaustive(scrut_ty: &Ty, arms: &[(Pat, Exp)]) -> bool {
    if arms.iter().any(|(p, _)| p.is_irrefutable()) {
        return true;
    }
    if let Ty::Enum { cases, .. } = scrut_ty {
        return cases.keys().all(|tag| {
            arms.iter().any(|(p, _)| match p {
                Pat::Tag { tag: t, pat, .. } => t == tag && pat.is_irrefutable(),
                _ => false,
            })
        });
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use lang_ast::Span;

    fn unit_exp() -> Exp {
        Exp::new(ExpKind::Lit(Literal::Unit), Ty::Unit, Span::DUMMY)
    }

    fn int_exp(n: i32) -> Exp {
        Exp::new(ExpKind::Lit(Literal::Int32(n)), Ty::Int32, Span::DUMMY)
    }

    fn bool_exp(b: bool) -> Exp {
        Exp::new(ExpKind::Lit(Literal::Bool(b)), Ty::Bool, Span::DUMMY)
    }

    fn if_exp(cond: Exp, t: Exp, e: Exp) -> Exp {
        let ty = t.ty.clone();
        Exp::new(
            ExpKind::IfThenElse {
                cond: Box::new(cond),
                then_body: Box::new(t),
                else_body: Box::new(e),
            },
            ty,
            Span::DUMMY,
        )
    }

    #[test]
    fn unit_equality_becomes_true() {
        let eq = Exp::new(
            ExpKind::Binary {
                op: BinOp::Eq,
                lhs: Box::new(unit_exp()),
                rhs: Box::new(unit_exp()),
            },
            Ty::Bool,
            Span::DUMMY,
        );
        assert_eq!(simplify_exp(eq), bool_exp(true));
    }

    #[test]
    fn if_unit_equality_folds_to_then_branch() {
        // if () == () then 1 else 2  ⇒  1
        let eq = Exp::new(
            ExpKind::Binary {
                op: BinOp::Eq,
                lhs: Box::new(unit_exp()),
                rhs: Box::new(unit_exp()),
            },
            Ty::Bool,
            Span::DUMMY,
        );
        let out = simplify_exp(if_exp(eq, int_exp(1), int_exp(2)));
        assert_eq!(out, int_exp(1));
    }

    #[test]
    fn if_false_folds_to_else_branch() {
        let out = simplify_exp(if_exp(bool_exp(false), int_exp(1), int_exp(2)));
        assert_eq!(out, int_exp(2));
    }

    #[test]
    fn non_literal_condition_is_kept() {
        let cond = Exp::new(ExpKind::Var("x".into()), Ty::Bool, Span::DUMMY);
        let out = simplify_exp(if_exp(cond, int_exp(1), int_exp(2)));
        assert!(matches!(out.kind, ExpKind::IfThenElse { .. }));
    }

    #[test]
    fn simplifier_is_idempotent() {
        let eq = Exp::new(
            ExpKind::Binary {
                op: BinOp::Eq,
                lhs: Box::new(unit_exp()),
                rhs: Box::new(unit_exp()),
            },
            Ty::Bool,
            Span::DUMMY,
        );
        let once = simplify_exp(if_exp(eq, int_exp(1), int_exp(2)));
        let twice = simplify_exp(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn nested_folds_converge_in_one_pass() {
        let inner = if_exp(bool_exp(true), int_exp(1), int_exp(2));
        let outer = if_exp(bool_exp(false), int_exp(9), inner);
        assert_eq!(simplify_exp(outer), int_exp(1));
    }

    #[test]
    fn incomplete_enum_match_gets_default_arm() {
        use std::collections::BTreeMap;
        let mut cases = BTreeMap::new();
        cases.insert(smol_str::SmolStr::new("A"), Ty::Unit);
        cases.insert(smol_str::SmolStr::new("B"), Ty::Unit);
        let enum_ty = Ty::Enum {
            name: lang_ast::QualName::simple("E"),
            cases,
        };
        let scrut = Exp::new(ExpKind::Var("x".into()), enum_ty.clone(), Span::DUMMY);
        let arm_pat = Pat::Tag {
            enum_name: lang_ast::QualName::simple("E"),
            tag: "A".into(),
            pat: Box::new(Pat::Wild),
        };
        let m = Exp::new(
            ExpKind::Match {
                scrutinee: Box::new(scrut),
                arms: vec![(arm_pat, int_exp(1))],
            },
            Ty::Int32,
            Span::DUMMY,
        );
        let out = simplify_exp(m);
        let ExpKind::Match { arms, .. } = out.kind else {
            panic!("expected match");
        };
        assert_eq!(arms.len(), 2);
        assert!(matches!(arms[1].0, Pat::Wild));
        assert!(matches!(arms[1].1.kind, ExpKind::UserError));
    }
}
