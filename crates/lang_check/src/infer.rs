// ==============================================================================
// Type inference
// ==============================================================================
//
// Hindley–Milner unification over the weeded module. Definitions are fully
// annotated, so inference is mostly checking, with fresh variables appearing
// inside bodies, rules, and at lattice-operator call sites. The lattice
// operators are ad-hoc polymorphic: each call site gets a fresh element
// variable, and after solving, the zonked element type selects the
// bounded-lattice instance (dictionary passing, resolved statically).

use std::collections::{BTreeMap, HashMap};

use lang_ast::symbols::Declaration;
use lang_ast::{
    BinOp, BodyPredicate, BodyTerm, DeclIdx, DeclKind, Expr, ExprId, LatOp, Module, NameId,
    Pattern, QualName, Span, UnaryOp,
};
use lang_ty::{Ty, TyVar};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use thiserror::Error;

use crate::resolve::{RefTarget, Resolution, ResolveError};
use crate::CheckError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("type mismatch: expected `{expected}`, got `{actual}`")]
    TypeMismatch {
        expected: Ty,
        actual: Ty,
        span: Span,
    },

    #[error("type `{ty}` has no registered lattice")]
    UnsupportedLatticeOperation { ty: Ty, span: Span },

    #[error("recursive type")]
    RecursiveType { span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::TypeMismatch { span, .. }
            | TypeError::UnsupportedLatticeOperation { span, .. }
            | TypeError::RecursiveType { span } => *span,
        }
    }
}

/// Everything lowering needs: zonked types per expression and binder, the
/// resolved lattice element per operator call site, signatures, and the
/// validated index layouts.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    pub expr_ty: HashMap<ExprId, Ty>,
    pub name_ty: HashMap<NameId, Ty>,
    /// Element type per `Expr::Var` node that resolved to a lattice operator.
    pub lat_elems: HashMap<ExprId, Ty>,
    pub def_sigs: HashMap<QualName, (Vec<Ty>, Ty)>,
    pub enum_tys: HashMap<QualName, Ty>,
    /// Element type → bounded-lattice declaration.
    pub lattice_decls: HashMap<Ty, DeclIdx>,
    /// Table name → index key positions, declaration order.
    pub indexes: HashMap<QualName, Vec<Vec<usize>>>,
}

type RuleEnv = HashMap<SmolStr, Ty>;

pub fn infer(module: &Module, res: &Resolution) -> Result<TypeInfo, Vec<CheckError>> {
    let mut typer = Typer {
        module,
        res,
        subst: BTreeMap::new(),
        next_var: 0,
        info: TypeInfo::default(),
        pending_ops: Vec::new(),
        enum_stack: Vec::new(),
        errors: Vec::new(),
    };
    typer.collect_signatures();
    typer.register_lattices();
    typer.check_defs();
    typer.check_lattice_tables();
    typer.check_indexes();
    typer.check_constraints();
    typer.finish()
}

struct Typer<'a> {
    module: &'a Module,
    res: &'a Resolution,
    subst: BTreeMap<TyVar, Ty>,
    next_var: u32,
    info: TypeInfo,
    /// Lattice-operator call sites awaiting instance selection.
    pending_ops: Vec<(ExprId, Ty, Span)>,
    /// Enums currently being lowered, for cycle detection.
    enum_stack: Vec<QualName>,
    errors: Vec<CheckError>,
}

impl<'a> Typer<'a> {
    fn fresh(&mut self) -> Ty {
        let v = TyVar(self.next_var);
        self.next_var += 1;
        Ty::Var(v)
    }

    fn zonk(&self, ty: &Ty) -> Ty {
        ty.apply(&self.subst)
    }

    // ==========================================================================
    // Unification
    // ==========================================================================

    fn unify(&mut self, actual: &Ty, expected: &Ty, span: Span) {
        let a = self.zonk(actual);
        let b = self.zonk(expected);
        match (&a, &b) {
            (Ty::Var(v), t) | (t, Ty::Var(v)) => {
                if let Ty::Var(w) = t {
                    if w == v {
                        return;
                    }
                }
                if t.occurs(*v) {
                    self.errors
                        .push(CheckError::Type(TypeError::RecursiveType { span }));
                    return;
                }
                self.subst.insert(*v, t.clone());
            }
            (Ty::Tuple(xs), Ty::Tuple(ys)) if xs.len() == ys.len() => {
                for (x, y) in xs.iter().zip(ys) {
                    self.unify(x, y, span);
                }
            }
            (Ty::Lambda { params: ps, ret: r1 }, Ty::Lambda { params: qs, ret: r2 })
                if ps.len() == qs.len() =>
            {
                for (p, q) in ps.iter().zip(qs) {
                    self.unify(p, q, span);
                }
                self.unify(r1, r2, span);
            }
            (Ty::Parametric { name: n1, args: a1 }, Ty::Parametric { name: n2, args: a2 })
                if n1 == n2 && a1.len() == a2.len() =>
            {
                for (x, y) in a1.iter().zip(a2) {
                    self.unify(x, y, span);
                }
            }
            (Ty::Enum { name: n1, .. }, Ty::Enum { name: n2, .. }) if n1 == n2 => {}
            (Ty::Native(n1), Ty::Native(n2)) if n1 == n2 => {}
            _ if a == b => {}
            _ => {
                self.errors.push(CheckError::Type(TypeError::TypeMismatch {
                    expected: b,
                    actual: a,
                    span,
                }));
            }
        }
    }

    // ==========================================================================
    // Surface type lowering
    // ==========================================================================

    fn lower_type(&mut self, ty: &lang_ast::surface::Type, ns: &[SmolStr], span: Span) -> Ty {
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
                Ty::Tuple(tys.iter().map(|t| self.lower_type(t, ns, span)).collect())
            }
            S::Lambda(params, ret) => Ty::Lambda {
                params: params.iter().map(|t| self.lower_type(t, ns, span)).collect(),
                ret: Box::new(self.lower_type(ret, ns, span)),
            },
            S::Parametric(path, args) => Ty::Parametric {
                name: QualName::new(path.iter().map(|i| i.text.clone()).collect()),
                args: args.iter().map(|t| self.lower_type(t, ns, span)).collect(),
            },
            S::Native(path) => {
                Ty::Native(QualName::new(path.iter().map(|i| i.text.clone()).collect()))
            }
            S::Named(path) => {
                let name = QualName::new(path.iter().map(|i| i.text.clone()).collect());
                let name_span = path.first().map(|i| i.span).unwrap_or(span);
                self.lower_named(&name, ns, name_span)
            }
        }
    }

    fn lower_named(&mut self, name: &QualName, ns: &[SmolStr], span: Span) -> Ty {
        let cands = self.res.candidates(ns, name);
        let mut enums = cands.iter().filter_map(|(qn, d)| match d {
            Declaration::Enum { decl, .. } => Some((qn.clone(), *decl)),
            _ => None,
        });
        match (enums.next(), enums.next()) {
            (Some((qn, idx)), None) => self.enum_ty(&qn, idx, span),
            (Some(_), Some(_)) => {
                self.errors
                    .push(CheckError::Resolve(ResolveError::AmbiguousName {
                        name: name.clone(),
                        span,
                    }));
                self.fresh()
            }
            (None, _) => {
                self.errors
                    .push(CheckError::Resolve(ResolveError::NameNotFound {
                        name: name.clone(),
                        span,
                    }));
                self.fresh()
            }
        }
    }

    /// Lower an enum declaration to its nominal type, detecting cycles.
    fn enum_ty(&mut self, qn: &QualName, idx: DeclIdx, span: Span) -> Ty {
        if let Some(ty) = self.info.enum_tys.get(qn) {
            return ty.clone();
        }
        if self.enum_stack.contains(qn) {
            self.errors
                .push(CheckError::Type(TypeError::RecursiveType { span }));
            return self.fresh();
        }
        self.enum_stack.push(qn.clone());
        let decl = &self.module.decls[idx];
        let DeclKind::Enum(e) = &decl.kind else {
            unreachable!("enum declaration index points at an enum");
        };
        let cases: BTreeMap<SmolStr, Ty> = e
            .cases
            .iter()
            .map(|c| {
                let ty = self.lower_type(&c.ty, &decl.ns, c.tag.span);
                (c.tag.text.clone(), ty)
            })
            .collect();
        self.enum_stack.pop();
        let ty = Ty::Enum {
            name: qn.clone(),
            cases,
        };
        self.info.enum_tys.insert(qn.clone(), ty.clone());
        ty
    }

    /// Look up the enum type for a qualified enum name already resolved.
    fn enum_ty_by_name(&mut self, enum_name: &QualName, span: Span) -> Option<Ty> {
        if let Some(ty) = self.info.enum_tys.get(enum_name) {
            return Some(ty.clone());
        }
        let idx = self
            .res
            .table
            .lookup(enum_name)
            .iter()
            .find_map(|d| match d {
                Declaration::Enum { decl, .. } => Some(*decl),
                _ => None,
            })?;
        Some(self.enum_ty(enum_name, idx, span))
    }

    // ==========================================================================
    // Signatures, lattices, tables, indexes
    // ==========================================================================

    fn collect_signatures(&mut self) {
        // Lower every enum up front so recursion surfaces even for enums
        // nothing references yet.
        for (idx, decl) in self.module.decls.iter().enumerate() {
            if let DeclKind::Enum(e) = &decl.kind {
                let name = decl.qual_name().expect("enums are named");
                self.enum_ty(&name, idx, e.ident.span);
            }
        }

        for decl in &self.module.decls {
            let (params, ret) = match &decl.kind {
                DeclKind::Def(d) => (&d.params, Some((d.ret_ty.clone(), d.ident.span))),
                DeclKind::Law(l) => (&l.params, None),
                _ => continue,
            };
            let param_tys: Vec<Ty> = params
                .iter()
                .map(|p| self.lower_type(&p.ty, &decl.ns, self.module.name_span(p.name)))
                .collect();
            let ret_ty = match ret {
                Some((ty, span)) => self.lower_type(&ty, &decl.ns, span),
                // Laws are boolean by construction.
                None => Ty::Bool,
            };
            let name = decl.qual_name().expect("defs and laws are named");
            self.info.def_sigs.insert(name, (param_tys, ret_ty));
        }
    }

    fn register_lattices(&mut self) {
        for (idx, decl) in self.module.decls.iter().enumerate() {
            let DeclKind::BoundedLattice(bl) = &decl.kind else {
                continue;
            };
            let elem = self.lower_type(&bl.ty, &decl.ns, decl.span);
            let elem = self.zonk(&elem);

            let cmp_ty = Ty::Lambda {
                params: vec![elem.clone(), elem.clone()],
                ret: Box::new(Ty::Bool),
            };
            let bin_ty = Ty::Lambda {
                params: vec![elem.clone(), elem.clone()],
                ret: Box::new(elem.clone()),
            };

            let checks: Vec<(ExprId, Ty)> = [
                (bl.bot, elem.clone()),
                (bl.top, elem.clone()),
                (bl.leq, cmp_ty),
                (bl.lub, bin_ty.clone()),
                (bl.glb, bin_ty.clone()),
            ]
            .into_iter()
            .chain(bl.widen.map(|w| (w, bin_ty)))
            .collect();

            for (expr, expected) in checks {
                let actual = self.infer_expr(expr, &decl.ns, &mut None);
                self.unify(&actual, &expected, self.module.expr_span(expr));
            }

            self.info.lattice_decls.insert(elem, idx);
        }
    }

    fn check_defs(&mut self) {
        for decl in &self.module.decls {
            let (params, body) = match &decl.kind {
                DeclKind::Def(d) => (&d.params, d.body),
                DeclKind::Law(l) => (&l.params, l.body),
                _ => continue,
            };
            let name = decl.qual_name().expect("defs and laws are named");
            let (param_tys, ret) = self.info.def_sigs[&name].clone();
            for (p, ty) in params.iter().zip(param_tys) {
                self.info.name_ty.insert(p.name, ty);
            }
            let body_ty = self.infer_expr(body, &decl.ns, &mut None);
            self.unify(&body_ty, &ret, self.module.expr_span(body));
        }
    }

    /// The element column of a lattice table must carry lattice metadata.
    fn check_lattice_tables(&mut self) {
        for decl in &self.module.decls {
            let DeclKind::Lattice(lat) = &decl.kind else {
                continue;
            };
            let value_ty = self.lower_type(&lat.value.ty, &decl.ns, lat.value.ident.span);
            let value_ty = self.zonk(&value_ty);
            if !self.info.lattice_decls.contains_key(&value_ty) {
                self.errors
                    .push(CheckError::Type(TypeError::UnsupportedLatticeOperation {
                        ty: value_ty,
                        span: lat.value.ident.span,
                    }));
            }
        }
    }

    /// Validate index declarations against their table's attribute list and
    /// record key positions, in declaration order.
    fn check_indexes(&mut self) {
        for decl in &self.module.decls {
            let DeclKind::Index(ix) = &decl.kind else {
                continue;
            };
            let table_name = QualName::simple(ix.table.text.clone());
            let Some((qn, attrs)) = self.table_attrs(&table_name, &decl.ns, ix.table.span) else {
                continue;
            };
            let mut keys = Vec::with_capacity(ix.keys.len());
            for key in &ix.keys {
                let mut positions = Vec::with_capacity(key.len());
                for ident in key {
                    match attrs.iter().position(|(name, _)| *name == ident.text) {
                        Some(pos) => positions.push(pos),
                        None => self
                            .errors
                            .push(CheckError::Resolve(ResolveError::NameNotFound {
                                name: QualName::simple(ident.text.clone()),
                                span: ident.span,
                            })),
                    }
                }
                keys.push(positions);
            }
            self.info.indexes.entry(qn).or_default().extend(keys);
        }
    }

    /// Resolve a table reference to its qualified name and attribute types.
    fn table_attrs(
        &mut self,
        name: &QualName,
        ns: &[SmolStr],
        span: Span,
    ) -> Option<(QualName, Vec<(SmolStr, Ty)>)> {
        let cands = self.res.candidates(ns, name);
        let mut tables = cands.iter().filter_map(|(qn, d)| match d {
            Declaration::Relation { decl } | Declaration::Lattice { decl } => {
                Some((qn.clone(), *decl))
            }
            _ => None,
        });
        match (tables.next(), tables.next()) {
            (Some((qn, idx)), None) => {
                let decl = &self.module.decls[idx];
                let raw: Vec<lang_ast::Attribute> = match &decl.kind {
                    DeclKind::Relation(r) => r.attrs.clone(),
                    DeclKind::Lattice(l) => {
                        let mut a = l.keys.clone();
                        a.push(l.value.clone());
                        a
                    }
                    _ => unreachable!("table lookup yields tables"),
                };
                let ns = decl.ns.clone();
                let attrs = raw
                    .iter()
                    .map(|a| {
                        let ty = self.lower_type(&a.ty, &ns, a.ident.span);
                        (a.ident.text.clone(), ty)
                    })
                    .collect();
                Some((qn, attrs))
            }
            (Some(_), Some(_)) => {
                self.errors
                    .push(CheckError::Resolve(ResolveError::AmbiguousName {
                        name: name.clone(),
                        span,
                    }));
                None
            }
            (None, _) => {
                self.errors
                    .push(CheckError::Resolve(ResolveError::NameNotFound {
                        name: name.clone(),
                        span,
                    }));
                None
            }
        }
    }

    // ==========================================================================
    // Constraints
    // ==========================================================================

    fn check_constraints(&mut self) {
        for decl in &self.module.decls {
            match &decl.kind {
                DeclKind::Fact(f) => {
                    let mut env = RuleEnv::new();
                    self.check_head(&f.head, &decl.ns, &mut env);
                }
                DeclKind::Rule(r) => {
                    let mut env = RuleEnv::new();
                    for pred in &r.body {
                        self.check_body_pred(pred, &decl.ns, &mut env);
                    }
                    self.check_head(&r.head, &decl.ns, &mut env);
                }
                _ => {}
            }
        }
    }

    fn rule_var_ty(&mut self, env: &mut RuleEnv, var: &SmolStr) -> Ty {
        if let Some(ty) = env.get(var) {
            return ty.clone();
        }
        let ty = self.fresh();
        env.insert(var.clone(), ty.clone());
        ty
    }

    fn check_body_pred(&mut self, pred: &BodyPredicate, ns: &[SmolStr], env: &mut RuleEnv) {
        match pred {
            BodyPredicate::Atom { name, terms, span } => {
                let table_name = QualName::simple(name.text.clone());
                let Some((_, attrs)) = self.table_attrs(&table_name, ns, name.span) else {
                    return;
                };
                if attrs.len() != terms.len() {
                    let actual = Ty::Tuple((0..terms.len()).map(|_| self.fresh()).collect());
                    self.errors.push(CheckError::Type(TypeError::TypeMismatch {
                        expected: Ty::Tuple(attrs.iter().map(|(_, t)| t.clone()).collect()),
                        actual,
                        span: *span,
                    }));
                    return;
                }
                for (term, (_, attr_ty)) in terms.iter().zip(&attrs) {
                    match term {
                        BodyTerm::Wild(_) => {}
                        BodyTerm::Var(v) => {
                            let var_ty = self.rule_var_ty(env, &v.text);
                            self.unify(&var_ty, attr_ty, v.span);
                        }
                        BodyTerm::Lit(lit, span) => {
                            self.unify(&Ty::from(lit), attr_ty, *span);
                        }
                    }
                }
            }
            BodyPredicate::Alias { ident, exp, .. } => {
                let exp_ty = self.infer_expr(*exp, ns, &mut Some(&mut *env));
                let var_ty = self.rule_var_ty(env, &ident.text);
                self.unify(&exp_ty, &var_ty, ident.span);
            }
            BodyPredicate::NotEqual { lhs, rhs, span } => {
                let l = self.rule_var_ty(env, &lhs.text);
                let r = self.rule_var_ty(env, &rhs.text);
                self.unify(&l, &r, *span);
            }
            BodyPredicate::Loop { ident, exp, .. } => {
                let elem_ty = self.rule_var_ty(env, &ident.text);
                let exp_ty = self.infer_expr(*exp, ns, &mut Some(&mut *env));
                self.unify(&exp_ty, &Ty::set(elem_ty), ident.span);
            }
        }
    }

    fn check_head(&mut self, head: &lang_ast::HeadPredicate, ns: &[SmolStr], env: &mut RuleEnv) {
        let table_name = QualName::simple(head.name.text.clone());
        let Some((_, attrs)) = self.table_attrs(&table_name, ns, head.name.span) else {
            return;
        };
        if attrs.len() != head.terms.len() {
            let actual = Ty::Tuple((0..head.terms.len()).map(|_| self.fresh()).collect());
            self.errors.push(CheckError::Type(TypeError::TypeMismatch {
                expected: Ty::Tuple(attrs.iter().map(|(_, t)| t.clone()).collect()),
                actual,
                span: head.span,
            }));
            return;
        }
        for (&term, (_, attr_ty)) in head.terms.iter().zip(&attrs) {
            let term_ty = self.infer_expr(term, ns, &mut Some(&mut *env));
            self.unify(&term_ty, attr_ty, self.module.expr_span(term));
        }
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn infer_expr(
        &mut self,
        expr: ExprId,
        ns: &[SmolStr],
        rule_env: &mut Option<&mut RuleEnv>,
    ) -> Ty {
        let ty = self.infer_expr_inner(expr, ns, rule_env);
        self.info.expr_ty.insert(expr, ty.clone());
        ty
    }

    fn infer_expr_inner(
        &mut self,
        expr: ExprId,
        ns: &[SmolStr],
        rule_env: &mut Option<&mut RuleEnv>,
    ) -> Ty {
        let span = self.module.expr_span(expr);
        match &self.module[expr] {
            Expr::Missing => self.fresh(),
            Expr::Lit(lit) => Ty::from(lit),
            Expr::UserError => self.fresh(),
            Expr::Var(_) => {
                let target = self.res.var_refs.get(&expr).cloned();
                match target {
                    Some(RefTarget::Local(id)) => self
                        .info
                        .name_ty
                        .get(&id)
                        .cloned()
                        .unwrap_or_else(|| self.fresh()),
                    Some(RefTarget::RuleVar(v)) => match rule_env {
                        Some(env) => self.rule_var_ty(env, &v),
                        None => self.fresh(),
                    },
                    Some(RefTarget::Def(qn)) => {
                        let (params, ret) = self.info.def_sigs[&qn].clone();
                        Ty::Lambda {
                            params,
                            ret: Box::new(ret),
                        }
                    }
                    Some(RefTarget::Tag { enum_name, tag }) => {
                        match self.enum_ty_by_name(&enum_name, span) {
                            Some(ty) => {
                                let payload = match &ty {
                                    Ty::Enum { cases, .. } => {
                                        cases.get(&tag).cloned().unwrap_or(Ty::Unit)
                                    }
                                    _ => Ty::Unit,
                                };
                                if payload == Ty::Unit {
                                    ty
                                } else {
                                    Ty::Lambda {
                                        params: vec![payload],
                                        ret: Box::new(ty),
                                    }
                                }
                            }
                            None => self.fresh(),
                        }
                    }
                    Some(RefTarget::LatticeOp(op)) => {
                        let elem = self.fresh();
                        self.pending_ops.push((expr, elem.clone(), span));
                        match op {
                            LatOp::Leq => Ty::Lambda {
                                params: vec![elem.clone(), elem],
                                ret: Box::new(Ty::Bool),
                            },
                            LatOp::Lub | LatOp::Glb | LatOp::Widen | LatOp::Narrow => Ty::Lambda {
                                params: vec![elem.clone(), elem.clone()],
                                ret: Box::new(elem),
                            },
                            LatOp::Bot | LatOp::Top => elem,
                        }
                    }
                    None => self.fresh(),
                }
            }
            Expr::Lambda { params, body } => {
                let param_tys: Vec<Ty> = params
                    .iter()
                    .map(|&p| {
                        let ty = self.fresh();
                        self.info.name_ty.insert(p, ty.clone());
                        ty
                    })
                    .collect();
                let body_ty = self.infer_expr(*body, ns, rule_env);
                Ty::Lambda {
                    params: param_tys,
                    ret: Box::new(body_ty),
                }
            }
            Expr::Apply { fun, args } => {
                let fun_ty = self.infer_expr(*fun, ns, rule_env);
                let arg_tys: Vec<Ty> = args
                    .iter()
                    .map(|&a| self.infer_expr(a, ns, rule_env))
                    .collect();
                let ret = self.fresh();
                let expected = Ty::Lambda {
                    params: arg_tys,
                    ret: Box::new(ret.clone()),
                };
                self.unify(&fun_ty, &expected, span);
                ret
            }
            Expr::Unary { op, expr: inner } => {
                let inner_ty = self.infer_expr(*inner, ns, rule_env);
                match op {
                    UnaryOp::Not => {
                        self.unify(&inner_ty, &Ty::Bool, span);
                        Ty::Bool
                    }
                    UnaryOp::Plus | UnaryOp::Minus => inner_ty,
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.infer_expr(*lhs, ns, rule_env);
                let r = self.infer_expr(*rhs, ns, rule_env);
                match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                        self.unify(&l, &r, span);
                        l
                    }
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::NotEq => {
                        self.unify(&l, &r, span);
                        Ty::Bool
                    }
                    BinOp::And | BinOp::Or => {
                        self.unify(&l, &Ty::Bool, span);
                        self.unify(&r, &Ty::Bool, span);
                        Ty::Bool
                    }
                }
            }
            Expr::IfThenElse {
                cond,
                then_body,
                else_body,
            } => {
                let c = self.infer_expr(*cond, ns, rule_env);
                self.unify(&c, &Ty::Bool, self.module.expr_span(*cond));
                let t = self.infer_expr(*then_body, ns, rule_env);
                let e = self.infer_expr(*else_body, ns, rule_env);
                self.unify(&e, &t, self.module.expr_span(*else_body));
                t
            }
            Expr::Let { name, value, body } => {
                let v = self.infer_expr(*value, ns, rule_env);
                self.info.name_ty.insert(*name, v);
                self.infer_expr(*body, ns, rule_env)
            }
            Expr::Match { scrutinee, arms } => {
                let scrut_ty = self.infer_expr(*scrutinee, ns, rule_env);
                let result = self.fresh();
                for arm in arms {
                    self.infer_pat(&arm.pat, &scrut_ty, ns);
                    let arm_ty = self.infer_expr(arm.body, ns, rule_env);
                    self.unify(&arm_ty, &result, self.module.expr_span(arm.body));
                }
                result
            }
            Expr::Tag { tag, payload, .. } => {
                let payload_ty = self.infer_expr(*payload, ns, rule_env);
                match self.res.tag_enums.get(&expr).cloned() {
                    Some(enum_name) => match self.enum_ty_by_name(&enum_name, span) {
                        Some(ty) => {
                            if let Ty::Enum { cases, .. } = &ty {
                                if let Some(case_ty) = cases.get(&tag.text).cloned() {
                                    self.unify(&payload_ty, &case_ty, tag.span);
                                }
                            }
                            ty
                        }
                        None => self.fresh(),
                    },
                    None => self.fresh(),
                }
            }
            Expr::Tuple(elms) => {
                let tys = elms
                    .iter()
                    .map(|&e| self.infer_expr(e, ns, rule_env))
                    .collect();
                Ty::Tuple(tys)
            }
            Expr::OptLit(elm) => {
                let elem = match elm {
                    Some(e) => self.infer_expr(*e, ns, rule_env),
                    None => self.fresh(),
                };
                Ty::opt(elem)
            }
            Expr::ListLit(elms) => {
                let elem = self.infer_homogeneous(elms, ns, rule_env);
                Ty::list(elem)
            }
            Expr::VecLit(elms) => {
                let elem = self.infer_homogeneous(elms, ns, rule_env);
                Ty::vector(elem)
            }
            Expr::SetLit(elms) => {
                let elem = self.infer_homogeneous(elms, ns, rule_env);
                Ty::set(elem)
            }
            Expr::MapLit(elms) => {
                let k = self.fresh();
                let v = self.fresh();
                for &(ke, ve) in elms {
                    let kt = self.infer_expr(ke, ns, rule_env);
                    self.unify(&kt, &k, self.module.expr_span(ke));
                    let vt = self.infer_expr(ve, ns, rule_env);
                    self.unify(&vt, &v, self.module.expr_span(ve));
                }
                Ty::map(k, v)
            }
            Expr::Exists { params, body } | Expr::Forall { params, body } => {
                for p in params {
                    let ty = self.lower_type(&p.ty, ns, self.module.name_span(p.name));
                    self.info.name_ty.insert(p.name, ty);
                }
                let b = self.infer_expr(*body, ns, rule_env);
                self.unify(&b, &Ty::Bool, self.module.expr_span(*body));
                Ty::Bool
            }
            Expr::Ascribe { expr: inner, ty } => {
                let expected = self.lower_type(ty, ns, span);
                let actual = self.infer_expr(*inner, ns, rule_env);
                self.unify(&actual, &expected, span);
                expected
            }
        }
    }

    fn infer_homogeneous(
        &mut self,
        elms: &[ExprId],
        ns: &[SmolStr],
        rule_env: &mut Option<&mut RuleEnv>,
    ) -> Ty {
        let elem = self.fresh();
        for &e in elms {
            let t = self.infer_expr(e, ns, rule_env);
            self.unify(&t, &elem, self.module.expr_span(e));
        }
        elem
    }

    fn infer_pat(&mut self, pat: &Pattern, expected: &Ty, ns: &[SmolStr]) {
        match pat {
            Pattern::Wild { .. } => {}
            Pattern::Var { name } => {
                let ty = self.fresh();
                self.unify(&ty, expected, self.module.name_span(*name));
                self.info.name_ty.insert(*name, ty);
            }
            Pattern::Lit { lit, span } => {
                self.unify(&Ty::from(lit), expected, *span);
            }
            Pattern::Tag {
                enum_name,
                tag,
                pat,
                span,
            } => match self
                .res
                .resolve_enum_tag(ns, enum_name.as_ref(), &tag.text, *span)
            {
                Ok((qn, idx)) => {
                    let ty = self.enum_ty(&qn, idx, *span);
                    self.unify(&ty, expected, *span);
                    if let Ty::Enum { cases, .. } = &ty {
                        if let Some(case_ty) = cases.get(&tag.text).cloned() {
                            self.infer_pat(pat, &case_ty, ns);
                        }
                    }
                }
                Err(e) => self.errors.push(CheckError::Resolve(e)),
            },
            Pattern::Tuple { pats, span } => {
                let tys: Vec<Ty> = pats.iter().map(|_| self.fresh()).collect();
                self.unify(&Ty::Tuple(tys.clone()), expected, *span);
                for (p, t) in pats.iter().zip(&tys) {
                    self.infer_pat(p, t, ns);
                }
            }
        }
    }

    // ==========================================================================
    // Finish: select lattice instances, zonk everything
    // ==========================================================================

    fn finish(mut self) -> Result<TypeInfo, Vec<CheckError>> {
        let pending = std::mem::take(&mut self.pending_ops);
        let mut seen: FxHashSet<ExprId> = FxHashSet::default();
        for (expr, elem, span) in pending {
            if !seen.insert(expr) {
                continue;
            }
            let elem = self.zonk(&elem);
            if !elem.is_ground() || !self.info.lattice_decls.contains_key(&elem) {
                self.errors
                    .push(CheckError::Type(TypeError::UnsupportedLatticeOperation {
                        ty: elem,
                        span,
                    }));
                continue;
            }
            self.info.lat_elems.insert(expr, elem);
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let subst = std::mem::take(&mut self.subst);
        let zonked = |ty: &Ty| default_vars(&ty.apply(&subst));
        let expr_ty = std::mem::take(&mut self.info.expr_ty);
        self.info.expr_ty = expr_ty.into_iter().map(|(k, v)| (k, zonked(&v))).collect();
        let name_ty = std::mem::take(&mut self.info.name_ty);
        self.info.name_ty = name_ty.into_iter().map(|(k, v)| (k, zonked(&v))).collect();
        let lat_elems = std::mem::take(&mut self.info.lat_elems);
        self.info.lat_elems = lat_elems
            .into_iter()
            .map(|(k, v)| (k, zonked(&v)))
            .collect();
        Ok(self.info)
    }
}

/// Replace any leftover unconstrained variable with Unit. Exported
/// declarations are fully annotated, so this only touches dead inner
/// positions (e.g. the element of an empty list literal).
fn default_vars(ty: &Ty) -> Ty {
    match ty {
        Ty::Var(_) => Ty::Unit,
        Ty::Tuple(tys) => Ty::Tuple(tys.iter().map(default_vars).collect()),
        Ty::Enum { name, cases } => Ty::Enum {
            name: name.clone(),
            cases: cases
                .iter()
                .map(|(k, v)| (k.clone(), default_vars(v)))
                .collect(),
        },
        Ty::Lambda { params, ret } => Ty::Lambda {
            params: params.iter().map(default_vars).collect(),
            ret: Box::new(default_vars(ret)),
        },
        Ty::Parametric { name, args } => Ty::Parametric {
            name: name.clone(),
            args: args.iter().map(default_vars).collect(),
        },
        other => other.clone(),
    }
}
