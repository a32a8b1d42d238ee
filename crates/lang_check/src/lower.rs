// ==============================================================================
// Lowering to the frozen IR
// ==============================================================================
//
// Runs only after resolution and typing succeeded, so every lookup below is
// total: unresolved names and ill-typed nodes never reach this point. The
// arena module becomes a tree IR whose nodes each carry their zonked type
// and span, and declarations land in maps keyed by fully qualified name.

use lang_ast::symbols::Declaration;
use lang_ast::{
    DeclKind, Expr, ExprId, Literal, Module, Pattern, QualName, Span,
};
use lang_ty::Ty;
use smol_str::SmolStr;

use crate::infer::TypeInfo;
use crate::ir;
use crate::resolve::{RefTarget, Resolution};

pub fn lower(module: &Module, res: &Resolution, info: &TypeInfo) -> ir::Root {
    let ctx = Lower { module, res, info };
    let mut root = ir::Root::default();

    for decl in &module.decls {
        match &decl.kind {
            DeclKind::Def(d) => {
                let name = decl.qual_name().expect("defs are named");
                let (param_tys, ret) = info.def_sigs[&name].clone();
                let params = d
                    .params
                    .iter()
                    .zip(param_tys)
                    .map(|(p, ty)| (module[p.name].text.clone(), ty))
                    .collect();
                let body = ctx.exp(d.body, &decl.ns);
                root.defs.insert(
                    name.clone(),
                    ir::Def {
                        name,
                        anns: d.anns.clone(),
                        params,
                        ret,
                        body,
                    },
                );
            }
            DeclKind::Law(l) => {
                let name = decl.qual_name().expect("laws are named");
                let (param_tys, _) = info.def_sigs[&name].clone();
                let params = l
                    .params
                    .iter()
                    .zip(param_tys)
                    .map(|(p, ty)| (module[p.name].text.clone(), ty))
                    .collect();
                let body = ctx.exp(l.body, &decl.ns);
                root.laws.insert(name.clone(), ir::Law { name, params, body });
            }
            DeclKind::Enum(_) => {
                let name = decl.qual_name().expect("enums are named");
                if let Some(Ty::Enum { cases, .. }) = info.enum_tys.get(&name) {
                    root.enums.insert(
                        name.clone(),
                        ir::Enum {
                            name,
                            cases: cases.clone(),
                        },
                    );
                }
            }
            DeclKind::Relation(r) => {
                let name = decl.qual_name().expect("relations are named");
                let attrs = r
                    .attrs
                    .iter()
                    .map(|a| (a.ident.text.clone(), ctx.attr_ty(&a.ty, &decl.ns, a.ident.span)))
                    .collect();
                root.tables
                    .insert(name.clone(), ir::Table::Relation { name, attrs });
            }
            DeclKind::Lattice(l) => {
                let name = decl.qual_name().expect("lattice tables are named");
                let keys = l
                    .keys
                    .iter()
                    .map(|a| (a.ident.text.clone(), ctx.attr_ty(&a.ty, &decl.ns, a.ident.span)))
                    .collect();
                let value = (
                    l.value.ident.text.clone(),
                    ctx.attr_ty(&l.value.ty, &decl.ns, l.value.ident.span),
                );
                root.tables
                    .insert(name.clone(), ir::Table::Lattice { name, keys, value });
            }
            DeclKind::Index(_) => {}
            DeclKind::BoundedLattice(bl) => {
                let ty = ctx.attr_ty(&bl.ty, &decl.ns, decl.span);
                let instance = ir::LatticeInstance {
                    ty: ty.clone(),
                    bot: ctx.exp(bl.bot, &decl.ns),
                    top: ctx.exp(bl.top, &decl.ns),
                    leq: ctx.exp(bl.leq, &decl.ns),
                    lub: ctx.exp(bl.lub, &decl.ns),
                    glb: ctx.exp(bl.glb, &decl.ns),
                    widen: bl.widen.map(|w| ctx.exp(w, &decl.ns)),
                };
                root.lattices.insert(ty, instance);
            }
            DeclKind::Fact(f) => {
                let head = ctx.head(&f.head, &decl.ns);
                root.facts.push(ir::Constraint {
                    head,
                    body: Vec::new(),
                    span: decl.span,
                });
            }
            DeclKind::Rule(r) => {
                let head = ctx.head(&r.head, &decl.ns);
                let body = r
                    .body
                    .iter()
                    .map(|p| ctx.body_pred(p, &decl.ns))
                    .collect();
                root.rules.push(ir::Constraint {
                    head,
                    body,
                    span: decl.span,
                });
            }
        }
    }

    root.indexes = info
        .indexes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    root
}

struct Lower<'a> {
    module: &'a Module,
    res: &'a Resolution,
    info: &'a TypeInfo,
}

impl<'a> Lower<'a> {
    fn ty_of(&self, expr: ExprId) -> Ty {
        self.info
            .expr_ty
            .get(&expr)
            .cloned()
            .unwrap_or(Ty::Unit)
    }

    /// Attribute and instance types were already lowered by the typer; this
    /// re-runs the same total conversion on the surface type.
    fn attr_ty(&self, ty: &lang_ast::surface::Type, ns: &[SmolStr], _span: Span) -> Ty {
        use lang_ast::surface::Type as S;
        match ty {
            S::Unit => Ty::Unit,
            S::Bool => Ty::Bool,
            S::Char => Ty::Char,
            S::Int8 => Ty::Int8,
            S::Int16 => Ty::Int16,
            S::Int32 => Ty::Int32,
            S::Int64 => Ty::Int64,
            S::BigInt => Ty::BigInt,
            S::Float32 => Ty::Float32,
            S::Float64 => Ty::Float64,
            S::Str => Ty::Str,
            S::Tuple(tys) => {
                Ty::Tuple(tys.iter().map(|t| self.attr_ty(t, ns, _span)).collect())
            }
            S::Lambda(params, ret) => Ty::Lambda {
                params: params.iter().map(|t| self.attr_ty(t, ns, _span)).collect(),
                ret: Box::new(self.attr_ty(ret, ns, _span)),
            },
            S::Parametric(path, args) => Ty::Parametric {
                name: QualName::new(path.iter().map(|i| i.text.clone()).collect()),
                args: args.iter().map(|t| self.attr_ty(t, ns, _span)).collect(),
            },
            S::Native(path) => {
                Ty::Native(QualName::new(path.iter().map(|i| i.text.clone()).collect()))
            }
            S::Named(path) => {
                let name = QualName::new(path.iter().map(|i| i.text.clone()).collect());
                let qualified = name.qualify(ns);
                if let Some(ty) = self.info.enum_tys.get(&qualified) {
                    return ty.clone();
                }
                self.info
                    .enum_tys
                    .get(&name)
                    .cloned()
                    .unwrap_or(Ty::Unit)
            }
        }
    }

    fn head(&self, head: &lang_ast::HeadPredicate, ns: &[SmolStr]) -> ir::HeadAtom {
        let table = self.table_name(&head.name.text, ns);
        ir::HeadAtom {
            table,
            terms: head.terms.iter().map(|&t| self.exp(t, ns)).collect(),
            span: head.span,
        }
    }

    fn body_pred(&self, pred: &lang_ast::BodyPredicate, ns: &[SmolStr]) -> ir::BodyAtom {
        use lang_ast::{BodyPredicate as BP, BodyTerm as BT};
        match pred {
            BP::Atom { name, terms, span } => ir::BodyAtom::Atom {
                table: self.table_name(&name.text, ns),
                terms: terms
                    .iter()
                    .map(|t| match t {
                        BT::Wild(_) => ir::Term::Wild,
                        BT::Var(v) => ir::Term::Var(v.text.clone()),
                        BT::Lit(l, _) => ir::Term::Lit(l.clone()),
                    })
                    .collect(),
                span: *span,
            },
            BP::Alias { ident, exp, span } => ir::BodyAtom::Alias {
                var: ident.text.clone(),
                exp: self.exp(*exp, ns),
                span: *span,
            },
            BP::NotEqual { lhs, rhs, span } => ir::BodyAtom::NotEqual {
                lhs: lhs.text.clone(),
                rhs: rhs.text.clone(),
                span: *span,
            },
            BP::Loop { ident, exp, span } => ir::BodyAtom::Loop {
                var: ident.text.clone(),
                exp: self.exp(*exp, ns),
                span: *span,
            },
        }
    }

    /// Qualify a table reference the way the typer resolved it: the current
    /// namespace wins over the root.
    fn table_name(&self, leaf: &SmolStr, ns: &[SmolStr]) -> QualName {
        let name = QualName::simple(leaf.clone());
        let qualified = name.qualify(ns);
        let is_table = |d: &Declaration| {
            matches!(d, Declaration::Relation { .. } | Declaration::Lattice { .. })
        };
        if self.res.table.lookup(&qualified).iter().any(is_table) {
            qualified
        } else {
            name
        }
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn exp(&self, expr: ExprId, ns: &[SmolStr]) -> ir::Exp {
        let ty = self.ty_of(expr);
        let span = self.module.expr_span(expr);
        let kind = match &self.module[expr] {
            // `Missing` only survives in error recovery; checking failed
            // before lowering in that case.
            Expr::Missing => ir::ExpKind::UserError,
            Expr::Lit(lit) => ir::ExpKind::Lit(lit.clone()),
            Expr::UserError => ir::ExpKind::UserError,
            Expr::Var(_) => match &self.res.var_refs[&expr] {
                RefTarget::Local(id) => ir::ExpKind::Var(self.module[*id].text.clone()),
                RefTarget::RuleVar(v) => ir::ExpKind::Var(v.clone()),
                RefTarget::Def(qn) => ir::ExpKind::Def(qn.clone()),
                RefTarget::Tag { enum_name, tag } => self.bare_tag(enum_name, tag, &ty, span),
                RefTarget::LatticeOp(op) => ir::ExpKind::LatOp {
                    op: *op,
                    elem: self.info.lat_elems[&expr].clone(),
                },
            },
            Expr::Lambda { params, body } => ir::ExpKind::Lambda {
                params: params
                    .iter()
                    .map(|&p| {
                        let text = self.module[p].text.clone();
                        let ty = self.info.name_ty.get(&p).cloned().unwrap_or(Ty::Unit);
                        (text, ty)
                    })
                    .collect(),
                body: Box::new(self.exp(*body, ns)),
            },
            Expr::Apply { fun, args } => ir::ExpKind::Apply {
                fun: Box::new(self.exp(*fun, ns)),
                args: args.iter().map(|&a| self.exp(a, ns)).collect(),
            },
            Expr::Unary { op, expr: inner } => ir::ExpKind::Unary {
                op: *op,
                exp: Box::new(self.exp(*inner, ns)),
            },
            Expr::Binary { op, lhs, rhs } => ir::ExpKind::Binary {
                op: *op,
                lhs: Box::new(self.exp(*lhs, ns)),
                rhs: Box::new(self.exp(*rhs, ns)),
            },
            Expr::IfThenElse {
                cond,
                then_body,
                else_body,
            } => ir::ExpKind::IfThenElse {
                cond: Box::new(self.exp(*cond, ns)),
                then_body: Box::new(self.exp(*then_body, ns)),
                else_body: Box::new(self.exp(*else_body, ns)),
            },
            Expr::Let { name, value, body } => ir::ExpKind::Let {
                name: self.module[*name].text.clone(),
                value: Box::new(self.exp(*value, ns)),
                body: Box::new(self.exp(*body, ns)),
            },
            Expr::Match { scrutinee, arms } => ir::ExpKind::Match {
                scrutinee: Box::new(self.exp(*scrutinee, ns)),
                arms: arms
                    .iter()
                    .map(|arm| (self.pat(&arm.pat, ns), self.exp(arm.body, ns)))
                    .collect(),
            },
            Expr::Tag { tag, payload, .. } => {
                let enum_name = self.res.tag_enums[&expr].clone();
                ir::ExpKind::Tag {
                    enum_name,
                    tag: tag.text.clone(),
                    payload: Box::new(self.exp(*payload, ns)),
                }
            }
            Expr::Tuple(elms) => {
                ir::ExpKind::Tuple(elms.iter().map(|&e| self.exp(e, ns)).collect())
            }
            Expr::OptLit(elm) => {
                ir::ExpKind::OptLit(elm.map(|e| Box::new(self.exp(e, ns))))
            }
            Expr::ListLit(elms) => {
                ir::ExpKind::ListLit(elms.iter().map(|&e| self.exp(e, ns)).collect())
            }
            Expr::VecLit(elms) => {
                ir::ExpKind::VecLit(elms.iter().map(|&e| self.exp(e, ns)).collect())
            }
            Expr::SetLit(elms) => {
                ir::ExpKind::SetLit(elms.iter().map(|&e| self.exp(e, ns)).collect())
            }
            Expr::MapLit(elms) => ir::ExpKind::MapLit(
                elms.iter()
                    .map(|&(k, v)| (self.exp(k, ns), self.exp(v, ns)))
                    .collect(),
            ),
            Expr::Exists { params, body } => ir::ExpKind::Exists {
                params: self.quant_params(params),
                body: Box::new(self.exp(*body, ns)),
            },
            Expr::Forall { params, body } => ir::ExpKind::Forall {
                params: self.quant_params(params),
                body: Box::new(self.exp(*body, ns)),
            },
            Expr::Ascribe { expr: inner, .. } => {
                ir::ExpKind::Ascribe(Box::new(self.exp(*inner, ns)))
            }
        };
        ir::Exp::new(kind, ty, span)
    }

    /// A bare tag reference is a tag construction; a tag with a payload
    /// becomes a constructor lambda.
    fn bare_tag(&self, enum_name: &QualName, tag: &SmolStr, ty: &Ty, span: Span) -> ir::ExpKind {
        match ty {
            Ty::Lambda { params, ret } => {
                let payload_ty = params.first().cloned().unwrap_or(Ty::Unit);
                let arg: SmolStr = "payload".into();
                let body = ir::Exp::new(
                    ir::ExpKind::Tag {
                        enum_name: enum_name.clone(),
                        tag: tag.clone(),
                        payload: Box::new(ir::Exp::new(
                            ir::ExpKind::Var(arg.clone()),
                            payload_ty.clone(),
                            span,
                        )),
                    },
                    (**ret).clone(),
                    span,
                );
                ir::ExpKind::Lambda {
                    params: vec![(arg, payload_ty)],
                    body: Box::new(body),
                }
            }
            _ => ir::ExpKind::Tag {
                enum_name: enum_name.clone(),
                tag: tag.clone(),
                payload: Box::new(ir::Exp::new(
                    ir::ExpKind::Lit(Literal::Unit),
                    Ty::Unit,
                    span,
                )),
            },
        }
    }

    fn quant_params(&self, params: &[lang_ast::QuantParam]) -> Vec<(SmolStr, Ty)> {
        params
            .iter()
            .map(|p| {
                let text = self.module[p.name].text.clone();
                let ty = self.info.name_ty.get(&p.name).cloned().unwrap_or(Ty::Unit);
                (text, ty)
            })
            .collect()
    }

    fn pat(&self, pat: &Pattern, ns: &[SmolStr]) -> ir::Pat {
        match pat {
            Pattern::Wild { .. } => ir::Pat::Wild,
            Pattern::Var { name } => ir::Pat::Var(self.module[*name].text.clone()),
            Pattern::Lit { lit, .. } => ir::Pat::Lit(lit.clone()),
            Pattern::Tag {
                enum_name,
                tag,
                pat,
                span,
            } => {
                // Re-resolution is deterministic and was validated by the
                // typer, so it cannot fail here.
                let (qn, _) = self
                    .res
                    .resolve_enum_tag(ns, enum_name.as_ref(), &tag.text, *span)
                    .expect("pattern tags were resolved during typing");
                ir::Pat::Tag {
                    enum_name: qn,
                    tag: tag.text.clone(),
                    pat: Box::new(self.pat(pat, ns)),
                }
            }
            Pattern::Tuple { pats, .. } => {
                ir::Pat::Tuple(pats.iter().map(|p| self.pat(p, ns)).collect())
            }
        }
    }
}
