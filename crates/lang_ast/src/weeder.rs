// ==============================================================================
// Weeder — syntactic validation and desugaring
// ==============================================================================
//
// Consumes the surface parse tree once and produces the arena `Module`.
// Desugarings: extended lattice operators and `⊥`/`⊤` become calls of the
// functions named after them, infix identifiers become calls, let-match
// collapses to let for single-variable patterns, empty tuples become Unit,
// 1-tuples unwrap, payload-less tags get an implicit Unit payload.
//
// Errors accumulate: every independent failure in a unit is surfaced in one
// list. A failure that blocks further weeding of a node leaves `Expr::Missing`
// behind and moves on.

use std::collections::HashMap;

use smol_str::SmolStr;
use thiserror::Error;

use crate::surface::{self, FloatSuffix, IntSuffix};
use crate::{
    Annotation, Attribute, BodyPredicate, BodyTerm, BoundedLatticeDecl, Decl, DeclKind, DefDecl,
    EnumCase, EnumDecl, Expr, ExprId, FactDecl, FormalParam, HeadPredicate, Ident, IndexDecl,
    LatOp, LatticeTableDecl, LawDecl, Literal, MatchArm, Module, Name, NameId, NameKind, Pattern,
    QualName, QuantParam, RelationDecl, RuleDecl, Span,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeedError {
    #[error("duplicate annotation `{name}`")]
    DuplicateAnnotation { name: SmolStr, loc1: Span, loc2: Span },

    #[error("duplicate attribute `{name}`")]
    DuplicateAttribute { name: SmolStr, loc1: Span, loc2: Span },

    #[error("duplicate formal parameter `{name}`")]
    DuplicateFormal { name: SmolStr, loc1: Span, loc2: Span },

    #[error("duplicate tag `{name}`")]
    DuplicateTag { name: SmolStr, loc1: Span, loc2: Span },

    #[error("duplicate alias `{name}`")]
    DuplicateAlias { name: SmolStr, loc1: Span, loc2: Span },

    #[error("a relation must declare at least one attribute")]
    EmptyRelation { name: SmolStr, loc: Span },

    #[error("a lattice table must declare at least one attribute")]
    EmptyLattice { name: SmolStr, loc: Span },

    #[error("an index must declare at least one lookup key")]
    EmptyIndex { name: SmolStr, loc: Span },

    #[error("an index lookup key must name at least one attribute")]
    IllegalIndex { loc: Span },

    #[error("a definition must take at least one parameter")]
    IllegalParameterList { loc: Span },

    #[error("a bounded lattice is (bot, top, leq, lub, glb) with optional widening")]
    IllegalLattice { loc: Span },

    #[error("unrecognized annotation `{name}`")]
    IllegalAnnotation { name: SmolStr, loc: Span },

    #[error("an existential quantifier needs at least one parameter")]
    IllegalExistential { loc: Span },

    #[error("a universal quantifier needs at least one parameter")]
    IllegalUniversal { loc: Span },

    #[error("wildcards are not allowed in expression position")]
    IllegalWildcard { loc: Span },

    #[error("illegal head predicate")]
    IllegalHeadPredicate { loc: Span },

    #[error("illegal term in head predicate")]
    IllegalHeadTerm { loc: Span },

    #[error("illegal term in body predicate")]
    IllegalBodyTerm { loc: Span },

    #[error("float literal `{text}` is out of range")]
    IllegalFloat { text: SmolStr, loc: Span },

    #[error("integer literal `{text}` does not fit its type")]
    IllegalInt { text: SmolStr, loc: Span },

    #[error("variable `{name}` occurs more than once in the pattern")]
    NonLinearPattern { name: SmolStr, loc1: Span, loc2: Span },

    #[error("unsupported construct: {feature}")]
    Unsupported { feature: SmolStr, loc: Span },
}

/// Weed a parse tree into a `Module`, or the full list of weeding errors.
pub fn weed(root: &surface::Root) -> Result<Module, Vec<WeedError>> {
    let mut ctx = WeedCtx::default();
    let mut ns = Vec::new();
    for decl in &root.decls {
        ctx.weed_decl(decl, &mut ns);
    }
    if ctx.errors.is_empty() {
        Ok(ctx.module)
    } else {
        Err(ctx.errors)
    }
}

#[derive(Default)]
struct WeedCtx {
    module: Module,
    errors: Vec<WeedError>,
}

impl WeedCtx {
    fn alloc_expr(&mut self, expr: Expr, span: Span) -> ExprId {
        let id = self.module.exprs.alloc(expr);
        self.module.expr_spans.insert(id, span);
        id
    }

    fn alloc_name(&mut self, text: SmolStr, kind: NameKind, span: Span) -> NameId {
        let id = self.module.names.alloc(Name { text, kind });
        self.module.name_spans.insert(id, span);
        id
    }

    fn missing(&mut self, span: Span) -> ExprId {
        self.alloc_expr(Expr::Missing, span)
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    fn weed_decl(&mut self, decl: &surface::Decl, ns: &mut Vec<SmolStr>) {
        match decl {
            surface::Decl::Namespace { name, decls, .. } => {
                let depth = name.len();
                for seg in name {
                    ns.push(seg.text.clone());
                }
                for inner in decls {
                    self.weed_decl(inner, ns);
                }
                ns.truncate(ns.len() - depth);
            }
            surface::Decl::Def {
                ident,
                anns,
                params,
                ret_ty,
                body,
                span,
            } => {
                let anns = self.weed_annotations(anns);
                if params.is_empty() {
                    self.errors.push(WeedError::IllegalParameterList { loc: *span });
                }
                let params = self.weed_formals(params);
                let body = self.weed_exp(body);
                self.push_decl(
                    ns,
                    DeclKind::Def(DefDecl {
                        ident: ident.clone(),
                        anns,
                        params,
                        ret_ty: ret_ty.clone(),
                        body,
                    }),
                    *span,
                );
            }
            surface::Decl::Enum { ident, cases, span } => {
                let mut seen: HashMap<SmolStr, Span> = HashMap::new();
                let mut weeded = Vec::with_capacity(cases.len());
                for case in cases {
                    if let Some(&loc1) = seen.get(&case.tag.text) {
                        self.errors.push(WeedError::DuplicateTag {
                            name: case.tag.text.clone(),
                            loc1,
                            loc2: case.tag.span,
                        });
                        continue;
                    }
                    seen.insert(case.tag.text.clone(), case.tag.span);
                    weeded.push(EnumCase {
                        tag: case.tag.clone(),
                        ty: case.ty.clone().unwrap_or(surface::Type::Unit),
                    });
                }
                self.push_decl(
                    ns,
                    DeclKind::Enum(EnumDecl {
                        ident: ident.clone(),
                        cases: weeded,
                    }),
                    *span,
                );
            }
            surface::Decl::Relation { ident, attrs, span } => {
                if attrs.is_empty() {
                    self.errors.push(WeedError::EmptyRelation {
                        name: ident.text.clone(),
                        loc: *span,
                    });
                    return;
                }
                let attrs = self.weed_attributes(attrs);
                self.push_decl(
                    ns,
                    DeclKind::Relation(RelationDecl {
                        ident: ident.clone(),
                        attrs,
                    }),
                    *span,
                );
            }
            surface::Decl::Lattice { ident, attrs, span } => {
                if attrs.is_empty() {
                    self.errors.push(WeedError::EmptyLattice {
                        name: ident.text.clone(),
                        loc: *span,
                    });
                    return;
                }
                let mut attrs = self.weed_attributes(attrs);
                let value = attrs.pop().expect("non-empty checked above");
                self.push_decl(
                    ns,
                    DeclKind::Lattice(LatticeTableDecl {
                        ident: ident.clone(),
                        keys: attrs,
                        value,
                    }),
                    *span,
                );
            }
            surface::Decl::Index { table, keys, span } => {
                if keys.is_empty() {
                    self.errors.push(WeedError::EmptyIndex {
                        name: table.text.clone(),
                        loc: *span,
                    });
                    return;
                }
                for key in keys {
                    if key.is_empty() {
                        self.errors.push(WeedError::IllegalIndex { loc: *span });
                        return;
                    }
                }
                self.push_decl(
                    ns,
                    DeclKind::Index(IndexDecl {
                        table: table.clone(),
                        keys: keys.clone(),
                    }),
                    *span,
                );
            }
            surface::Decl::BoundedLattice { ty, elms, span } => {
                if elms.len() < 5 || elms.len() > 6 {
                    self.errors.push(WeedError::IllegalLattice { loc: *span });
                    return;
                }
                let mut weeded = elms.iter().map(|e| self.weed_exp(e)).collect::<Vec<_>>();
                let widen = if weeded.len() == 6 { weeded.pop() } else { None };
                let glb = weeded.pop().expect("len checked");
                let lub = weeded.pop().expect("len checked");
                let leq = weeded.pop().expect("len checked");
                let top = weeded.pop().expect("len checked");
                let bot = weeded.pop().expect("len checked");
                self.push_decl(
                    ns,
                    DeclKind::BoundedLattice(BoundedLatticeDecl {
                        ty: ty.clone(),
                        bot,
                        top,
                        leq,
                        lub,
                        glb,
                        widen,
                    }),
                    *span,
                );
            }
            surface::Decl::Law {
                ident,
                params,
                body,
                span,
            } => {
                let params = self.weed_formals(params);
                let body = self.weed_exp(body);
                self.push_decl(
                    ns,
                    DeclKind::Law(LawDecl {
                        ident: ident.clone(),
                        params,
                        body,
                    }),
                    *span,
                );
            }
            surface::Decl::Fact { head, span } => {
                let Some(head) = self.weed_head(head) else {
                    return;
                };
                self.push_decl(ns, DeclKind::Fact(FactDecl { head }), *span);
            }
            surface::Decl::Rule { head, body, span } => {
                let head = self.weed_head(head);
                let body = self.weed_body(body);
                if let Some(head) = head {
                    self.push_decl(ns, DeclKind::Rule(RuleDecl { head, body }), *span);
                }
            }
        }
    }

    fn push_decl(&mut self, ns: &[SmolStr], kind: DeclKind, span: Span) {
        self.module.decls.push(Decl {
            ns: ns.to_vec(),
            kind,
            span,
        });
    }

    fn weed_annotations(&mut self, anns: &[Ident]) -> Vec<Annotation> {
        let mut seen: HashMap<Annotation, Span> = HashMap::new();
        let mut out = Vec::new();
        for ann in anns {
            match Annotation::from_name(&ann.text) {
                None => self.errors.push(WeedError::IllegalAnnotation {
                    name: ann.text.clone(),
                    loc: ann.span,
                }),
                Some(a) => {
                    if let Some(&loc1) = seen.get(&a) {
                        self.errors.push(WeedError::DuplicateAnnotation {
                            name: ann.text.clone(),
                            loc1,
                            loc2: ann.span,
                        });
                    } else {
                        seen.insert(a, ann.span);
                        out.push(a);
                    }
                }
            }
        }
        out
    }

    fn weed_formals(&mut self, params: &[surface::Param]) -> Vec<FormalParam> {
        let mut seen: HashMap<SmolStr, Span> = HashMap::new();
        let mut out = Vec::with_capacity(params.len());
        for param in params {
            if let Some(&loc1) = seen.get(&param.ident.text) {
                self.errors.push(WeedError::DuplicateFormal {
                    name: param.ident.text.clone(),
                    loc1,
                    loc2: param.ident.span,
                });
                continue;
            }
            seen.insert(param.ident.text.clone(), param.ident.span);
            let name = self.alloc_name(param.ident.text.clone(), NameKind::Param, param.ident.span);
            out.push(FormalParam {
                name,
                ty: param.ty.clone(),
            });
        }
        out
    }

    fn weed_attributes(&mut self, attrs: &[(Ident, surface::Type)]) -> Vec<Attribute> {
        let mut seen: HashMap<SmolStr, Span> = HashMap::new();
        let mut out = Vec::with_capacity(attrs.len());
        for (ident, ty) in attrs {
            if let Some(&loc1) = seen.get(&ident.text) {
                self.errors.push(WeedError::DuplicateAttribute {
                    name: ident.text.clone(),
                    loc1,
                    loc2: ident.span,
                });
                continue;
            }
            seen.insert(ident.text.clone(), ident.span);
            out.push(Attribute {
                ident: ident.clone(),
                ty: ty.clone(),
            });
        }
        out
    }

    // ==========================================================================
    // Constraints
    // ==========================================================================

    fn weed_head(&mut self, head: &surface::Predicate) -> Option<HeadPredicate> {
        match head {
            surface::Predicate::Ambient { name, terms, span } => {
                let terms = terms.iter().map(|t| self.weed_head_term(t)).collect();
                Some(HeadPredicate {
                    name: name.clone(),
                    terms,
                    span: *span,
                })
            }
            surface::Predicate::True(_)
            | surface::Predicate::False(_)
            | surface::Predicate::Alias { .. }
            | surface::Predicate::NotEqual { .. }
            | surface::Predicate::Loop { .. } => {
                self.errors
                    .push(WeedError::IllegalHeadPredicate { loc: head.span() });
                None
            }
        }
    }

    /// Head terms are ordinary expressions, except that wildcards are
    /// rejected here rather than as generic expression wildcards.
    fn weed_head_term(&mut self, term: &surface::Exp) -> ExprId {
        if let surface::Exp::Wild(span) = term {
            self.errors.push(WeedError::IllegalHeadTerm { loc: *span });
            return self.missing(*span);
        }
        self.weed_exp(term)
    }

    fn weed_body(&mut self, body: &[surface::Predicate]) -> Vec<BodyPredicate> {
        // Alias map: `ident = term` bindings, duplicates all reported.
        let mut aliases: HashMap<SmolStr, Span> = HashMap::new();
        let mut out = Vec::with_capacity(body.len());
        for pred in body {
            match pred {
                surface::Predicate::Ambient { name, terms, span } => {
                    let terms = terms.iter().map(|t| self.weed_body_term(t)).collect();
                    out.push(BodyPredicate::Atom {
                        name: name.clone(),
                        terms,
                        span: *span,
                    });
                }
                surface::Predicate::Alias { ident, exp, span } => {
                    if let Some(&loc1) = aliases.get(&ident.text) {
                        self.errors.push(WeedError::DuplicateAlias {
                            name: ident.text.clone(),
                            loc1,
                            loc2: ident.span,
                        });
                        continue;
                    }
                    aliases.insert(ident.text.clone(), ident.span);
                    let exp = self.weed_exp(exp);
                    out.push(BodyPredicate::Alias {
                        ident: ident.clone(),
                        exp,
                        span: *span,
                    });
                }
                surface::Predicate::NotEqual { lhs, rhs, span } => {
                    out.push(BodyPredicate::NotEqual {
                        lhs: lhs.clone(),
                        rhs: rhs.clone(),
                        span: *span,
                    });
                }
                surface::Predicate::Loop { ident, exp, span } => {
                    let exp = self.weed_exp(exp);
                    out.push(BodyPredicate::Loop {
                        ident: ident.clone(),
                        exp,
                        span: *span,
                    });
                }
                surface::Predicate::True(_) | surface::Predicate::False(_) => {
                    // `true` is vacuous and `false` kills the rule; both are
                    // rejected to keep rule bodies meaningful.
                    self.errors
                        .push(WeedError::IllegalBodyTerm { loc: pred.span() });
                }
            }
        }
        out
    }

    /// Body atom positions take only wildcards, variables, and literals.
    fn weed_body_term(&mut self, term: &surface::Exp) -> BodyTerm {
        match term {
            surface::Exp::Wild(span) => BodyTerm::Wild(*span),
            surface::Exp::Var { path, span } if path.len() == 1 => {
                let mut ident = path[0].clone();
                ident.span = *span;
                BodyTerm::Var(ident)
            }
            surface::Exp::Lit(lit) => match self.weed_lit(lit) {
                Some(l) => BodyTerm::Lit(l, lit.span()),
                None => BodyTerm::Wild(lit.span()),
            },
            other => {
                self.errors
                    .push(WeedError::IllegalBodyTerm { loc: other.span() });
                BodyTerm::Wild(other.span())
            }
        }
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn weed_exp(&mut self, exp: &surface::Exp) -> ExprId {
        let span = exp.span();
        match exp {
            surface::Exp::Lit(lit) => match self.weed_lit(lit) {
                Some(l) => self.alloc_expr(Expr::Lit(l), span),
                None => self.missing(span),
            },
            surface::Exp::Var { path, .. } => {
                let name = QualName::new(path.iter().map(|i| i.text.clone()).collect());
                self.alloc_expr(Expr::Var(name), span)
            }
            surface::Exp::Lambda { params, body, .. } => {
                let mut seen: HashMap<SmolStr, Span> = HashMap::new();
                let mut names = Vec::with_capacity(params.len());
                for p in params {
                    if let Some(&loc1) = seen.get(&p.text) {
                        self.errors.push(WeedError::DuplicateFormal {
                            name: p.text.clone(),
                            loc1,
                            loc2: p.span,
                        });
                        continue;
                    }
                    seen.insert(p.text.clone(), p.span);
                    names.push(self.alloc_name(p.text.clone(), NameKind::Param, p.span));
                }
                let body = self.weed_exp(body);
                self.alloc_expr(Expr::Lambda { params: names, body }, span)
            }
            surface::Exp::Apply { fun, args, .. } => {
                let fun = self.weed_exp(fun);
                let args = args.iter().map(|a| self.weed_exp(a)).collect();
                self.alloc_expr(Expr::Apply { fun, args }, span)
            }
            surface::Exp::Unary { op, exp, .. } => {
                let expr = self.weed_exp(exp);
                self.alloc_expr(Expr::Unary { op: *op, expr }, span)
            }
            surface::Exp::Binary { op, lhs, rhs, .. } => {
                let lhs = self.weed_exp(lhs);
                let rhs = self.weed_exp(rhs);
                match core_bin_op(*op) {
                    Ok(op) => self.alloc_expr(Expr::Binary { op, lhs, rhs }, span),
                    // Extended operators become calls of the function with
                    // the operator's name; overload resolution is ad hoc.
                    Err(lat) => {
                        let fun = self.alloc_expr(
                            Expr::Var(QualName::simple(lat.function_name())),
                            span,
                        );
                        self.alloc_expr(
                            Expr::Apply {
                                fun,
                                args: vec![lhs, rhs],
                            },
                            span,
                        )
                    }
                }
            }
            surface::Exp::Infix { lhs, path, rhs, .. } => {
                let lhs = self.weed_exp(lhs);
                let rhs = self.weed_exp(rhs);
                let name = QualName::new(path.iter().map(|i| i.text.clone()).collect());
                let fun = self.alloc_expr(Expr::Var(name), span);
                self.alloc_expr(
                    Expr::Apply {
                        fun,
                        args: vec![lhs, rhs],
                    },
                    span,
                )
            }
            surface::Exp::IfThenElse {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let cond = self.weed_exp(cond);
                let then_body = self.weed_exp(then_body);
                let else_body = self.weed_exp(else_body);
                self.alloc_expr(
                    Expr::IfThenElse {
                        cond,
                        then_body,
                        else_body,
                    },
                    span,
                )
            }
            surface::Exp::LetMatch {
                pat, value, body, ..
            } => {
                let value = self.weed_exp(value);
                match pat {
                    surface::Pat::Var(ident) => {
                        let name =
                            self.alloc_name(ident.text.clone(), NameKind::LetBound, ident.span);
                        let body = self.weed_exp(body);
                        self.alloc_expr(Expr::Let { name, value, body }, span)
                    }
                    other => {
                        let pat = self.weed_pat(other);
                        let body = self.weed_exp(body);
                        self.alloc_expr(
                            Expr::Match {
                                scrutinee: value,
                                arms: vec![MatchArm { pat, body }],
                            },
                            span,
                        )
                    }
                }
            }
            surface::Exp::Match {
                scrutinee, arms, ..
            } => {
                let scrutinee = self.weed_exp(scrutinee);
                let arms = arms
                    .iter()
                    .map(|(pat, body)| {
                        let pat = self.weed_pat(pat);
                        let body = self.weed_exp(body);
                        MatchArm { pat, body }
                    })
                    .collect();
                self.alloc_expr(Expr::Match { scrutinee, arms }, span)
            }
            surface::Exp::Tag {
                enum_path,
                tag,
                payload,
                ..
            } => {
                let payload = match payload {
                    Some(p) => self.weed_exp(p),
                    // A tag without payload carries an implicit Unit.
                    None => self.alloc_expr(Expr::Lit(Literal::Unit), span),
                };
                let enum_name = enum_path
                    .as_ref()
                    .map(|path| QualName::new(path.iter().map(|i| i.text.clone()).collect()));
                self.alloc_expr(
                    Expr::Tag {
                        enum_name,
                        tag: tag.clone(),
                        payload,
                    },
                    span,
                )
            }
            surface::Exp::Tuple { elms, .. } => match elms.len() {
                0 => self.alloc_expr(Expr::Lit(Literal::Unit), span),
                1 => self.weed_exp(&elms[0]),
                _ => {
                    let elms = elms.iter().map(|e| self.weed_exp(e)).collect();
                    self.alloc_expr(Expr::Tuple(elms), span)
                }
            },
            surface::Exp::OptLit { elm, .. } => {
                let elm = elm.as_ref().map(|e| self.weed_exp(e));
                self.alloc_expr(Expr::OptLit(elm), span)
            }
            surface::Exp::ListLit { elms, .. } => {
                let elms = elms.iter().map(|e| self.weed_exp(e)).collect();
                self.alloc_expr(Expr::ListLit(elms), span)
            }
            surface::Exp::VecLit { elms, .. } => {
                let elms = elms.iter().map(|e| self.weed_exp(e)).collect();
                self.alloc_expr(Expr::VecLit(elms), span)
            }
            surface::Exp::SetLit { elms, .. } => {
                let elms = elms.iter().map(|e| self.weed_exp(e)).collect();
                self.alloc_expr(Expr::SetLit(elms), span)
            }
            surface::Exp::MapLit { elms, .. } => {
                let elms = elms
                    .iter()
                    .map(|(k, v)| (self.weed_exp(k), self.weed_exp(v)))
                    .collect();
                self.alloc_expr(Expr::MapLit(elms), span)
            }
            surface::Exp::Exists { params, body, .. } => {
                let params = self.weed_quant_params(params, span, true);
                let body = self.weed_exp(body);
                self.alloc_expr(Expr::Exists { params, body }, span)
            }
            surface::Exp::Forall { params, body, .. } => {
                let params = self.weed_quant_params(params, span, false);
                let body = self.weed_exp(body);
                self.alloc_expr(Expr::Forall { params, body }, span)
            }
            surface::Exp::Ascribe { exp, ty, .. } => {
                let expr = self.weed_exp(exp);
                self.alloc_expr(
                    Expr::Ascribe {
                        expr,
                        ty: ty.clone(),
                    },
                    span,
                )
            }
            surface::Exp::Bot(span) => self.lat_constant(LatOp::Bot, *span),
            surface::Exp::Top(span) => self.lat_constant(LatOp::Top, *span),
            surface::Exp::Wild(span) => {
                self.errors.push(WeedError::IllegalWildcard { loc: *span });
                self.missing(*span)
            }
            surface::Exp::Error(span) => self.alloc_expr(Expr::UserError, *span),
        }
    }

    /// `⊥`/`⊤` desugar to references to the functions named `bot`/`top`.
    fn lat_constant(&mut self, op: LatOp, span: Span) -> ExprId {
        self.alloc_expr(Expr::Var(QualName::simple(op.function_name())), span)
    }

    fn weed_quant_params(
        &mut self,
        params: &[surface::Param],
        span: Span,
        existential: bool,
    ) -> Vec<QuantParam> {
        if params.is_empty() {
            self.errors.push(if existential {
                WeedError::IllegalExistential { loc: span }
            } else {
                WeedError::IllegalUniversal { loc: span }
            });
            return Vec::new();
        }
        let mut seen: HashMap<SmolStr, Span> = HashMap::new();
        let mut out = Vec::with_capacity(params.len());
        for p in params {
            if let Some(&loc1) = seen.get(&p.ident.text) {
                self.errors.push(WeedError::DuplicateFormal {
                    name: p.ident.text.clone(),
                    loc1,
                    loc2: p.ident.span,
                });
                continue;
            }
            seen.insert(p.ident.text.clone(), p.ident.span);
            let name = self.alloc_name(p.ident.text.clone(), NameKind::QuantVar, p.ident.span);
            out.push(QuantParam {
                name,
                ty: p.ty.clone(),
            });
        }
        out
    }

    // ==========================================================================
    // Patterns
    // ==========================================================================

    fn weed_pat(&mut self, pat: &surface::Pat) -> Pattern {
        let mut seen: HashMap<SmolStr, Span> = HashMap::new();
        self.weed_pat_inner(pat, &mut seen)
    }

    fn weed_pat_inner(
        &mut self,
        pat: &surface::Pat,
        seen: &mut HashMap<SmolStr, Span>,
    ) -> Pattern {
        match pat {
            surface::Pat::Wild(span) => Pattern::Wild { span: *span },
            surface::Pat::Var(ident) => {
                if let Some(&loc1) = seen.get(&ident.text) {
                    self.errors.push(WeedError::NonLinearPattern {
                        name: ident.text.clone(),
                        loc1,
                        loc2: ident.span,
                    });
                    return Pattern::Wild { span: ident.span };
                }
                seen.insert(ident.text.clone(), ident.span);
                let name = self.alloc_name(ident.text.clone(), NameKind::PatVar, ident.span);
                Pattern::Var { name }
            }
            surface::Pat::Lit(lit) => match self.weed_lit(lit) {
                Some(l) => Pattern::Lit {
                    lit: l,
                    span: lit.span(),
                },
                None => Pattern::Wild { span: lit.span() },
            },
            surface::Pat::Tag {
                enum_path,
                tag,
                pat,
                span,
            } => {
                let inner = match pat {
                    Some(p) => self.weed_pat_inner(p, seen),
                    None => Pattern::Lit {
                        lit: Literal::Unit,
                        span: *span,
                    },
                };
                let enum_name = enum_path
                    .as_ref()
                    .map(|path| QualName::new(path.iter().map(|i| i.text.clone()).collect()));
                Pattern::Tag {
                    enum_name,
                    tag: tag.clone(),
                    pat: Box::new(inner),
                    span: *span,
                }
            }
            surface::Pat::Tuple(pats, span) => {
                let pats = pats
                    .iter()
                    .map(|p| self.weed_pat_inner(p, seen))
                    .collect();
                Pattern::Tuple {
                    pats,
                    span: *span,
                }
            }
        }
    }

    // ==========================================================================
    // Literals
    // ==========================================================================

    fn weed_lit(&mut self, lit: &surface::Lit) -> Option<Literal> {
        match lit {
            surface::Lit::Unit(_) => Some(Literal::Unit),
            surface::Lit::Bool(b, _) => Some(Literal::Bool(*b)),
            surface::Lit::Char(c, _) => Some(Literal::Char(*c)),
            surface::Lit::Str(s, _) => Some(Literal::Str(s.clone())),
            surface::Lit::Int { text, suffix, span } => {
                let digits: String = text.chars().filter(|c| *c != '_').collect();
                let out = match suffix {
                    IntSuffix::I8 => digits.parse::<i8>().ok().map(Literal::Int8),
                    IntSuffix::I16 => digits.parse::<i16>().ok().map(Literal::Int16),
                    IntSuffix::I32 => digits.parse::<i32>().ok().map(Literal::Int32),
                    IntSuffix::I64 => digits.parse::<i64>().ok().map(Literal::Int64),
                    IntSuffix::Big => digits
                        .parse::<num_bigint::BigInt>()
                        .ok()
                        .map(Literal::BigInt),
                };
                if out.is_none() {
                    self.errors.push(WeedError::IllegalInt {
                        text: text.clone(),
                        loc: *span,
                    });
                }
                out
            }
            surface::Lit::Float { text, suffix, span } => {
                let digits: String = text.chars().filter(|c| *c != '_').collect();
                let out = match suffix {
                    FloatSuffix::F32 => digits
                        .parse::<f32>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| Literal::Float32(f.into())),
                    FloatSuffix::F64 => digits
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| Literal::Float64(f.into())),
                };
                if out.is_none() {
                    self.errors.push(WeedError::IllegalFloat {
                        text: text.clone(),
                        loc: *span,
                    });
                }
                out
            }
        }
    }
}

/// Split surface operators into the core set and the lattice extensions.
fn core_bin_op(op: surface::BinOp) -> Result<crate::BinOp, LatOp> {
    use crate::BinOp as B;
    use surface::BinOp as S;
    Ok(match op {
        S::Add => B::Add,
        S::Sub => B::Sub,
        S::Mul => B::Mul,
        S::Div => B::Div,
        S::Rem => B::Rem,
        S::Lt => B::Lt,
        S::Le => B::Le,
        S::Gt => B::Gt,
        S::Ge => B::Ge,
        S::Eq => B::Eq,
        S::NotEq => B::NotEq,
        S::And => B::And,
        S::Or => B::Or,
        S::Leq => return Err(LatOp::Leq),
        S::Lub => return Err(LatOp::Lub),
        S::Glb => return Err(LatOp::Glb),
        S::Widen => return Err(LatOp::Widen),
        S::Narrow => return Err(LatOp::Narrow),
    })
}
