// The verifier: extracts algebraic law obligations from bounded-lattice
// instances and annotated definitions, encodes each law's negation as an
// SMT query, and interprets the backend's answer. `sat` is a
// counter-example, `unsat` proves the law, `unknown` (or an IR shape the
// encoding cannot express) is inconclusive. Results are advisory; the CLI
// escalates them under --strict-verify.

mod backend;
mod encode;

#[cfg(test)]
mod tests;

use lang_ast::{Annotation, QualName};
use lang_check::ir;
use lang_ty::Ty;
use lattice::{laws_of, ClassKind, LawKind};
use thiserror::Error;

pub use backend::{BackendError, FunDef, Model, Query, SmtBackend, SmtOutcome, SortDecl, Z3Backend};
pub use encode::{Encoder, Unencodable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    #[error("law `{kind}` is violated")]
    LawViolation { kind: String, model: Model },

    #[error("law `{kind}` could not be decided: {reason}")]
    Inconclusive { kind: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Proved,
    CounterExample(Model),
    Inconclusive(String),
}

/// The result of one discharged obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// What carries the law: an instance type or a definition name.
    pub subject: String,
    /// The law or annotation name.
    pub kind: String,
    pub outcome: Outcome,
}

impl Report {
    pub fn as_error(&self) -> Option<VerifierError> {
        match &self.outcome {
            Outcome::Proved => None,
            Outcome::CounterExample(model) => Some(VerifierError::LawViolation {
                kind: self.kind.clone(),
                model: model.clone(),
            }),
            Outcome::Inconclusive(reason) => Some(VerifierError::Inconclusive {
                kind: self.kind.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Discharge every obligation in the program: the class laws of each
/// lattice instance, then the annotation laws of each definition, in
/// declaration (map) order.
pub fn verify(root: &ir::Root, backend: &mut dyn SmtBackend) -> Result<Vec<Report>, BackendError> {
    let mut reports = Vec::new();

    for (ty, inst) in &root.lattices {
        let top_class = if inst.widen.is_some() {
            ClassKind::Widening
        } else {
            ClassKind::BoundedLattice
        };
        let mut classes: Vec<ClassKind> = top_class.hierarchy().to_vec();
        if inst.widen.is_some() {
            // A widening instance still instantiates the full lattice stack.
            for class in ClassKind::BoundedLattice.hierarchy() {
                if !classes.contains(class) {
                    classes.push(*class);
                }
            }
        }
        for class in classes {
            for law in laws_of(class) {
                let report = instance_law(root, ty, inst, *law, backend)?;
                reports.push(report);
            }
        }
    }

    for (name, law) in &root.laws {
        let outcome = match law_query(root, name, law) {
            Ok(query) => run(backend, &query)?,
            Err(e) => Outcome::Inconclusive(e.reason),
        };
        reports.push(Report {
            subject: name.to_string(),
            kind: "law".to_string(),
            outcome,
        });
    }

    for (name, def) in &root.defs {
        for ann in &def.anns {
            let kind = match ann {
                Annotation::Commutative | Annotation::Associative | Annotation::Monotone
                | Annotation::Strict => ann.name(),
                Annotation::Unchecked | Annotation::Unsafe => continue,
            };
            let outcome = match annotation_query(root, name, def, *ann) {
                Ok(query) => run(backend, &query)?,
                Err(e) => Outcome::Inconclusive(e.reason),
            };
            reports.push(Report {
                subject: name.to_string(),
                kind: kind.to_string(),
                outcome,
            });
        }
    }

    Ok(reports)
}

fn run(backend: &mut dyn SmtBackend, query: &Query) -> Result<Outcome, BackendError> {
    Ok(match backend.check(query)? {
        SmtOutcome::Unsat => Outcome::Proved,
        SmtOutcome::Sat(model) => Outcome::CounterExample(model),
        SmtOutcome::Unknown(reason) => Outcome::Inconclusive(reason),
    })
}

// ==============================================================================
// Instance laws
// ==============================================================================

fn instance_law(
    root: &ir::Root,
    ty: &Ty,
    inst: &ir::LatticeInstance,
    law: LawKind,
    backend: &mut dyn SmtBackend,
) -> Result<Report, BackendError> {
    let subject = ty.to_string();
    let kind = law.name().to_string();
    match instance_law_query(root, ty, inst, law) {
        Ok(Some(query)) => Ok(Report {
            subject,
            kind,
            outcome: run(backend, &query)?,
        }),
        // The obligation does not apply (no height function declared).
        Ok(None) => Ok(Report {
            subject,
            kind,
            outcome: Outcome::Inconclusive("no height function is declared".to_string()),
        }),
        Err(e) => Ok(Report {
            subject,
            kind,
            outcome: Outcome::Inconclusive(e.reason),
        }),
    }
}

fn instance_law_query(
    root: &ir::Root,
    ty: &Ty,
    inst: &ir::LatticeInstance,
    law: LawKind,
) -> Result<Option<Query>, Unencodable> {
    let mut enc = Encoder::new(root);
    let sort = enc.sort(ty)?;
    let x = "|law:x|".to_string();
    let y = "|law:y|".to_string();
    let z = "|law:z|".to_string();

    let leq = |enc: &mut Encoder, a: &str, b: &str| -> Result<String, Unencodable> {
        enc.apply_op(&inst.leq, &[a.to_string(), b.to_string()])
    };
    let lub = |enc: &mut Encoder, a: &str, b: &str| -> Result<String, Unencodable> {
        enc.apply_op(&inst.lub, &[a.to_string(), b.to_string()])
    };
    let glb = |enc: &mut Encoder, a: &str, b: &str| -> Result<String, Unencodable> {
        enc.apply_op(&inst.glb, &[a.to_string(), b.to_string()])
    };

    let mut consts = vec![(x.clone(), sort.clone())];
    let negation = match law {
        LawKind::Reflexivity => format!("(not {})", leq(&mut enc, &x, &x)?),
        LawKind::AntiSymmetry => {
            consts.push((y.clone(), sort.clone()));
            format!(
                "(and {} {} (not (= {x} {y})))",
                leq(&mut enc, &x, &y)?,
                leq(&mut enc, &y, &x)?
            )
        }
        LawKind::Transitivity => {
            consts.push((y.clone(), sort.clone()));
            consts.push((z.clone(), sort.clone()));
            format!(
                "(and {} {} (not {}))",
                leq(&mut enc, &x, &y)?,
                leq(&mut enc, &y, &z)?,
                leq(&mut enc, &x, &z)?
            )
        }
        LawKind::LubCommutative => {
            consts.push((y.clone(), sort.clone()));
            format!("(not (= {} {}))", lub(&mut enc, &x, &y)?, lub(&mut enc, &y, &x)?)
        }
        LawKind::LubAssociative => {
            consts.push((y.clone(), sort.clone()));
            consts.push((z.clone(), sort.clone()));
            let xy = lub(&mut enc, &x, &y)?;
            let yz = lub(&mut enc, &y, &z)?;
            format!(
                "(not (= {} {}))",
                enc.apply_op(&inst.lub, &[xy, z.clone()])?,
                enc.apply_op(&inst.lub, &[x.clone(), yz])?
            )
        }
        LawKind::LubIdempotent => {
            format!("(not (= {} {x}))", lub(&mut enc, &x, &x)?)
        }
        LawKind::LubUpperBound => {
            consts.push((y.clone(), sort.clone()));
            let j = lub(&mut enc, &x, &y)?;
            format!(
                "(not (and {} {}))",
                enc.apply_op(&inst.leq, &[x.clone(), j.clone()])?,
                enc.apply_op(&inst.leq, &[y.clone(), j])?
            )
        }
        LawKind::GlbCommutative => {
            consts.push((y.clone(), sort.clone()));
            format!("(not (= {} {}))", glb(&mut enc, &x, &y)?, glb(&mut enc, &y, &x)?)
        }
        LawKind::GlbAssociative => {
            consts.push((y.clone(), sort.clone()));
            consts.push((z.clone(), sort.clone()));
            let xy = glb(&mut enc, &x, &y)?;
            let yz = glb(&mut enc, &y, &z)?;
            format!(
                "(not (= {} {}))",
                enc.apply_op(&inst.glb, &[xy, z.clone()])?,
                enc.apply_op(&inst.glb, &[x.clone(), yz])?
            )
        }
        LawKind::GlbIdempotent => {
            format!("(not (= {} {x}))", glb(&mut enc, &x, &x)?)
        }
        LawKind::GlbLowerBound => {
            consts.push((y.clone(), sort.clone()));
            let m = glb(&mut enc, &x, &y)?;
            format!(
                "(not (and {} {}))",
                enc.apply_op(&inst.leq, &[m.clone(), x.clone()])?,
                enc.apply_op(&inst.leq, &[m, y.clone()])?
            )
        }
        LawKind::Absorption => {
            consts.push((y.clone(), sort.clone()));
            let j = lub(&mut enc, &x, &y)?;
            format!(
                "(not (= {} {x}))",
                enc.apply_op(&inst.glb, &[x.clone(), j])?
            )
        }
        LawKind::BotIsLeast => {
            let bot = enc.constant(&inst.bot)?;
            format!("(not {})", enc.apply_op(&inst.leq, &[bot, x.clone()])?)
        }
        LawKind::TopIsGreatest => {
            let top = enc.constant(&inst.top)?;
            format!("(not {})", enc.apply_op(&inst.leq, &[x.clone(), top])?)
        }
        LawKind::AscendingChain => {
            // Discharged only when a height function is declared for the
            // element type.
            let Some(height) = find_height_def(root, ty) else {
                return Ok(None);
            };
            let h = enc.def(&height)?;
            consts.push((y.clone(), sort.clone()));
            format!(
                "(and {} (not (= {x} {y})) (not (> ({h} {x}) ({h} {y}))))",
                leq(&mut enc, &x, &y)?
            )
        }
        LawKind::WidenCovering => {
            let widen = inst
                .widen
                .as_ref()
                .ok_or_else(|| Unencodable::new("the instance has no widening operator"))?;
            consts.push((y.clone(), sort.clone()));
            let w = enc.apply_op(widen, &[x.clone(), y.clone()])?;
            format!(
                "(not (and {} {}))",
                enc.apply_op(&inst.leq, &[x.clone(), w.clone()])?,
                enc.apply_op(&inst.leq, &[y.clone(), w])?
            )
        }
    };

    let (sorts, funs) = enc.finish();
    Ok(Some(Query {
        name: format!("{}:{}", ty, law.name()),
        sorts,
        consts,
        funs,
        asserts: vec![negation],
    }))
}

/// A definition named `height` over the element type discharges the
/// ascending-chain obligation; it must return BigInt.
fn find_height_def(root: &ir::Root, ty: &Ty) -> Option<QualName> {
    root.defs
        .iter()
        .find(|(name, def)| {
            name.leaf() == "height"
                && def.params.len() == 1
                && def.params[0].1 == *ty
                && def.ret == Ty::BigInt
        })
        .map(|(name, _)| name.clone())
}

// ==============================================================================
// User-declared laws
// ==============================================================================

/// A `law` declaration is a boolean body over its parameters; the query
/// skolemizes the parameters and asserts the negated body.
fn law_query(root: &ir::Root, name: &QualName, law: &ir::Law) -> Result<Query, Unencodable> {
    let mut enc = Encoder::new(root);
    let mut consts = Vec::with_capacity(law.params.len());
    let mut env = Vec::with_capacity(law.params.len());
    for (p, ty) in &law.params {
        let sort = enc.sort(ty)?;
        let smt_name = format!("|law:{p}|");
        env.push((p.clone(), smt_name.clone()));
        consts.push((smt_name, sort));
    }
    let body = enc.exp(&law.body, &mut env)?;
    let (sorts, funs) = enc.finish();
    Ok(Query {
        name: format!("{name}:law"),
        sorts,
        consts,
        funs,
        asserts: vec![format!("(not {body})")],
    })
}

// ==============================================================================
// Annotation laws
// ==============================================================================

fn annotation_query(
    root: &ir::Root,
    name: &QualName,
    def: &ir::Def,
    ann: Annotation,
) -> Result<Query, Unencodable> {
    let mut enc = Encoder::new(root);
    let f = enc.def(name)?;

    match ann {
        Annotation::Commutative | Annotation::Associative => {
            if def.params.len() != 2 {
                return Err(Unencodable::new(
                    "the annotation applies to binary definitions",
                ));
            }
            let sort = enc.sort(&def.params[0].1)?;
            let x = "|law:x|".to_string();
            let y = "|law:y|".to_string();
            let mut consts = vec![(x.clone(), sort.clone()), (y.clone(), sort.clone())];
            let negation = if ann == Annotation::Commutative {
                format!("(not (= ({f} {x} {y}) ({f} {y} {x})))")
            } else {
                let z = "|law:z|".to_string();
                consts.push((z.clone(), sort));
                format!("(not (= ({f} ({f} {x} {y}) {z}) ({f} {x} ({f} {y} {z}))))")
            };
            let (sorts, funs) = enc.finish();
            Ok(Query {
                name: format!("{name}:{}", ann.name()),
                sorts,
                consts,
                funs,
                asserts: vec![negation],
            })
        }
        Annotation::Strict => {
            // Bottom in any argument yields bottom.
            let ret_inst = root
                .lattice_of(&def.ret)
                .ok_or_else(|| Unencodable::new("the return type has no instance"))?;
            let ret_bot = enc.constant(&ret_inst.bot)?;
            let mut consts = Vec::new();
            let mut conjuncts = Vec::new();
            for (i, (_, param_ty)) in def.params.iter().enumerate() {
                let inst = root
                    .lattice_of(param_ty)
                    .ok_or_else(|| Unencodable::new("a parameter type has no instance"))?;
                let bot = enc.constant(&inst.bot)?;
                let mut args = Vec::new();
                for (j, (_, ty)) in def.params.iter().enumerate() {
                    if i == j {
                        args.push(bot.clone());
                    } else {
                        let c = format!("|law:a{j}|");
                        let sort = enc.sort(ty)?;
                        if !consts.iter().any(|(n, _)| *n == c) {
                            consts.push((c.clone(), sort));
                        }
                        args.push(c);
                    }
                }
                conjuncts.push(format!("(= ({f} {}) {ret_bot})", args.join(" ")));
            }
            let negation = format!("(not (and {}))", conjuncts.join(" "));
            let (sorts, funs) = enc.finish();
            Ok(Query {
                name: format!("{name}:strict"),
                sorts,
                consts,
                funs,
                asserts: vec![negation],
            })
        }
        Annotation::Monotone => {
            // Pointwise per argument: raising one argument raises the result.
            let ret_inst = root
                .lattice_of(&def.ret)
                .ok_or_else(|| Unencodable::new("the return type has no instance"))?
                .clone();
            let mut consts = Vec::new();
            let mut disjuncts = Vec::new();
            for (i, (_, param_ty)) in def.params.iter().enumerate() {
                let inst = root
                    .lattice_of(param_ty)
                    .ok_or_else(|| Unencodable::new("a parameter type has no instance"))?
                    .clone();
                let lo = format!("|law:lo{i}|");
                let hi = format!("|law:hi{i}|");
                let sort = enc.sort(param_ty)?;
                consts.push((lo.clone(), sort.clone()));
                consts.push((hi.clone(), sort));
                let mut lo_args = Vec::new();
                let mut hi_args = Vec::new();
                for (j, (_, ty)) in def.params.iter().enumerate() {
                    if i == j {
                        lo_args.push(lo.clone());
                        hi_args.push(hi.clone());
                    } else {
                        let c = format!("|law:a{j}|");
                        let sort = enc.sort(ty)?;
                        if !consts.iter().any(|(n, _)| *n == c) {
                            consts.push((c.clone(), sort));
                        }
                        lo_args.push(c.clone());
                        hi_args.push(c);
                    }
                }
                let premise = enc.apply_op(&inst.leq, &[lo.clone(), hi.clone()])?;
                let conclusion = enc.apply_op(
                    &ret_inst.leq,
                    &[
                        format!("({f} {})", lo_args.join(" ")),
                        format!("({f} {})", hi_args.join(" ")),
                    ],
                )?;
                disjuncts.push(format!("(and {premise} (not {conclusion}))"));
            }
            let negation = format!("(or {})", disjuncts.join(" "));
            let (sorts, funs) = enc.finish();
            Ok(Query {
                name: format!("{name}:monotone"),
                sorts,
                consts,
                funs,
                asserts: vec![negation],
            })
        }
        Annotation::Unchecked | Annotation::Unsafe => {
            unreachable!("unchecked annotations carry no obligations")
        }
    }
}

