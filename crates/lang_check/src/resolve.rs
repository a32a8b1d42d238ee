// ==============================================================================
// Name resolution
// ==============================================================================
//
// Builds the symbol table from the weeded declarations, then resolves every
// reference to a fully qualified target. Candidate search order is
// `current-namespace ++ name` first, then `name` at the root. Zero candidates
// is NameNotFound, more than one is AmbiguousName. Bare enum-tag references
// resolve to a tag construction. The resolution is a side table over the
// immutable module; nothing is rewritten.

use std::collections::HashMap;

use lang_ast::symbols::{Declaration, SymbolTable};
use lang_ast::{
    BodyPredicate, BodyTerm, Decl, DeclIdx, DeclKind, Expr, ExprId, LatOp, Module, NameId,
    QualName, RuleDecl, Span,
};
use lattice::ClassKind;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("name `{name}` not found")]
    NameNotFound { name: QualName, span: Span },

    #[error("name `{name}` is ambiguous")]
    AmbiguousName { name: QualName, span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::NameNotFound { span, .. } | ResolveError::AmbiguousName { span, .. } => {
                *span
            }
        }
    }
}

/// What a `Expr::Var` reference points at after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// A binder in the enclosing expression (parameter, let, pattern,
    /// quantifier variable).
    Local(NameId),
    /// A rule-local Datalog variable, bound by a body atom.
    RuleVar(SmolStr),
    /// A top-level definition.
    Def(QualName),
    /// A bare enum tag; resolves to a tag construction.
    Tag { enum_name: QualName, tag: SmolStr },
    /// One of the ad-hoc overloaded lattice operators; the typer picks the
    /// instance from the element type.
    LatticeOp(LatOp),
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub table: SymbolTable,
    /// Target per `Expr::Var` node.
    pub var_refs: HashMap<ExprId, RefTarget>,
    /// Resolved enum name per explicitly qualified `Expr::Tag` node.
    pub tag_enums: HashMap<ExprId, QualName>,
}

impl Resolution {
    /// Candidate search: `ns ++ name` first, then `name` bare.
    pub fn candidates<'a>(&'a self, ns: &[SmolStr], name: &QualName) -> Vec<(QualName, &'a Declaration)> {
        let qualified = name.qualify(ns);
        let mut out: Vec<(QualName, &Declaration)> = self
            .table
            .lookup(&qualified)
            .iter()
            .map(|d| (qualified.clone(), d))
            .collect();
        if out.is_empty() && !ns.is_empty() {
            out = self
                .table
                .lookup(name)
                .iter()
                .map(|d| (name.clone(), d))
                .collect();
        }
        out
    }

    /// Resolve the enum declaration a (possibly unqualified) tag belongs to.
    /// With an explicit enum path the path is resolved; without one, every
    /// visible enum carrying the tag is a candidate.
    pub fn resolve_enum_tag(
        &self,
        ns: &[SmolStr],
        enum_name: Option<&QualName>,
        tag: &SmolStr,
        span: Span,
    ) -> Result<(QualName, DeclIdx), ResolveError> {
        match enum_name {
            Some(name) => {
                let cands = self.candidates(ns, name);
                let mut hits = cands.iter().filter_map(|(qn, d)| match d {
                    Declaration::Enum { decl, tags } if tags.contains(tag) => {
                        Some((qn.clone(), *decl))
                    }
                    _ => None,
                });
                match (hits.next(), hits.next()) {
                    (Some(hit), None) => Ok(hit),
                    (Some(_), Some(_)) => Err(ResolveError::AmbiguousName {
                        name: name.clone(),
                        span,
                    }),
                    (None, _) => Err(ResolveError::NameNotFound {
                        name: name.clone(),
                        span,
                    }),
                }
            }
            None => {
                // Search all enums for the tag, preferring the current
                // namespace over the root.
                let mut hits: Vec<(QualName, DeclIdx)> = Vec::new();
                for (qn, decls) in self.table.iter() {
                    for d in decls {
                        if let Declaration::Enum { decl, tags } = d {
                            if tags.contains(tag) {
                                hits.push((qn.clone(), *decl));
                            }
                        }
                    }
                }
                let in_ns: Vec<_> = hits
                    .iter()
                    .filter(|(qn, _)| qn.namespace() == ns)
                    .cloned()
                    .collect();
                let pool = if in_ns.is_empty() { hits } else { in_ns };
                match pool.len() {
                    1 => Ok(pool.into_iter().next().expect("len checked")),
                    0 => Err(ResolveError::NameNotFound {
                        name: QualName::simple(tag.clone()),
                        span,
                    }),
                    _ => Err(ResolveError::AmbiguousName {
                        name: QualName::simple(tag.clone()),
                        span,
                    }),
                }
            }
        }
    }
}

/// Resolve a module: build the symbol table and the reference side table.
pub fn resolve(module: &Module) -> Result<Resolution, Vec<ResolveError>> {
    let mut ctx = Resolver {
        module,
        res: Resolution::default(),
        errors: Vec::new(),
    };
    ctx.build_table();
    ctx.resolve_decls();
    if ctx.errors.is_empty() {
        Ok(ctx.res)
    } else {
        Err(ctx.errors)
    }
}

struct Resolver<'a> {
    module: &'a Module,
    res: Resolution,
    errors: Vec<ResolveError>,
}

impl<'a> Resolver<'a> {
    // ==========================================================================
    // Symbol table construction
    // ==========================================================================

    fn build_table(&mut self) {
        // The built-in lattice classes are always in scope.
        for class in ClassKind::ALL {
            self.res.table.insert(
                QualName::simple(class.name()),
                Declaration::Class {
                    name: class.name().into(),
                },
            );
        }

        for (idx, decl) in self.module.decls.iter().enumerate() {
            self.register_decl(idx, decl);
        }
    }

    fn register_decl(&mut self, idx: DeclIdx, decl: &Decl) {
        if !decl.ns.is_empty() {
            self.res
                .table
                .insert(QualName::new(decl.ns.clone()), Declaration::Namespace);
        }
        match &decl.kind {
            DeclKind::Def(_) => {
                let name = decl.qual_name().expect("defs are named");
                self.res.table.insert(name, Declaration::Def { decl: idx });
            }
            DeclKind::Enum(e) => {
                let name = decl.qual_name().expect("enums are named");
                let tags = e.cases.iter().map(|c| c.tag.text.clone()).collect();
                self.res
                    .table
                    .insert(name, Declaration::Enum { decl: idx, tags });
            }
            DeclKind::Relation(_) => {
                let name = decl.qual_name().expect("relations are named");
                self.res
                    .table
                    .insert(name, Declaration::Relation { decl: idx });
            }
            DeclKind::Lattice(_) => {
                let name = decl.qual_name().expect("lattice tables are named");
                self.res
                    .table
                    .insert(name, Declaration::Lattice { decl: idx });
            }
            DeclKind::Law(_) => {
                let name = decl.qual_name().expect("laws are named");
                self.res.table.insert(name, Declaration::Law { decl: idx });
            }
            DeclKind::Index(ix) => {
                // Indexes register under the table they index.
                let name = QualName::simple(ix.table.text.clone()).qualify(&decl.ns);
                self.res
                    .table
                    .insert(name, Declaration::Index { decl: idx });
            }
            DeclKind::BoundedLattice(bl) => {
                // A bounded-lattice declaration is an impl of every class in
                // the hierarchy it instantiates, registered under the element
                // type's name.
                if let lang_ast::surface::Type::Named(path) = &bl.ty {
                    let name = QualName::new(path.iter().map(|i| i.text.clone()).collect())
                        .qualify(&decl.ns);
                    self.res
                        .table
                        .insert(name.clone(), Declaration::BoundedLattice { decl: idx });
                    let top_class = if bl.widen.is_some() {
                        ClassKind::Widening
                    } else {
                        ClassKind::BoundedLattice
                    };
                    for class in top_class.hierarchy() {
                        self.res.table.insert(
                            name.clone(),
                            Declaration::Impl {
                                class: class.name().into(),
                                decl: idx,
                            },
                        );
                    }
                }
            }
            DeclKind::Fact(_) | DeclKind::Rule(_) => {}
        }
    }

    // ==========================================================================
    // Reference resolution
    // ==========================================================================

    fn resolve_decls(&mut self) {
        for decl in &self.module.decls {
            let ns = &decl.ns;
            match &decl.kind {
                DeclKind::Def(d) => {
                    let mut scope = Scope::new();
                    for p in &d.params {
                        scope.push(self.module[p.name].text.clone(), p.name);
                    }
                    self.resolve_expr(d.body, ns, &mut scope, None);
                }
                DeclKind::Law(l) => {
                    let mut scope = Scope::new();
                    for p in &l.params {
                        scope.push(self.module[p.name].text.clone(), p.name);
                    }
                    self.resolve_expr(l.body, ns, &mut scope, None);
                }
                DeclKind::BoundedLattice(bl) => {
                    let mut scope = Scope::new();
                    for e in [bl.bot, bl.top, bl.leq, bl.lub, bl.glb]
                        .into_iter()
                        .chain(bl.widen)
                    {
                        self.resolve_expr(e, ns, &mut scope, None);
                    }
                }
                DeclKind::Fact(f) => {
                    let empty = FxHashSet::default();
                    let mut scope = Scope::new();
                    for &term in &f.head.terms {
                        self.resolve_expr(term, ns, &mut scope, Some(&empty));
                    }
                }
                DeclKind::Rule(r) => self.resolve_rule(r, ns),
                DeclKind::Enum(_)
                | DeclKind::Relation(_)
                | DeclKind::Lattice(_)
                | DeclKind::Index(_) => {}
            }
        }
    }

    fn resolve_rule(&mut self, rule: &RuleDecl, ns: &[SmolStr]) {
        // Rule variables are bound by atom positions, aliases, and loops.
        let mut bound: FxHashSet<SmolStr> = FxHashSet::default();
        for pred in &rule.body {
            match pred {
                BodyPredicate::Atom { terms, .. } => {
                    for term in terms {
                        if let BodyTerm::Var(v) = term {
                            bound.insert(v.text.clone());
                        }
                    }
                }
                BodyPredicate::Alias { ident, .. } | BodyPredicate::Loop { ident, .. } => {
                    bound.insert(ident.text.clone());
                }
                BodyPredicate::NotEqual { .. } => {}
            }
        }

        // Disequality operands must be bound elsewhere in the body.
        for pred in &rule.body {
            if let BodyPredicate::NotEqual { lhs, rhs, span } = pred {
                for side in [lhs, rhs] {
                    if !bound.contains(&side.text) {
                        self.errors.push(ResolveError::NameNotFound {
                            name: QualName::simple(side.text.clone()),
                            span: *span,
                        });
                    }
                }
            }
        }

        let mut scope = Scope::new();
        for pred in &rule.body {
            match pred {
                BodyPredicate::Alias { exp, .. } | BodyPredicate::Loop { exp, .. } => {
                    self.resolve_expr(*exp, ns, &mut scope, Some(&bound));
                }
                BodyPredicate::Atom { .. } | BodyPredicate::NotEqual { .. } => {}
            }
        }
        for &term in &rule.head.terms {
            self.resolve_expr(term, ns, &mut scope, Some(&bound));
        }
    }

    fn resolve_expr(
        &mut self,
        expr: ExprId,
        ns: &[SmolStr],
        scope: &mut Scope,
        rule_vars: Option<&FxHashSet<SmolStr>>,
    ) {
        match &self.module[expr] {
            Expr::Missing | Expr::Lit(_) | Expr::UserError => {}
            Expr::Var(name) => {
                let target = self.resolve_name(expr, name, ns, scope, rule_vars);
                match target {
                    Ok(t) => {
                        self.res.var_refs.insert(expr, t);
                    }
                    Err(e) => self.errors.push(e),
                }
            }
            Expr::Lambda { params, body } => {
                let mark = scope.mark();
                for &p in params {
                    scope.push(self.module[p].text.clone(), p);
                }
                self.resolve_expr(*body, ns, scope, rule_vars);
                scope.truncate(mark);
            }
            Expr::Apply { fun, args } => {
                self.resolve_expr(*fun, ns, scope, rule_vars);
                for &a in args {
                    self.resolve_expr(a, ns, scope, rule_vars);
                }
            }
            Expr::Unary { expr: inner, .. } => self.resolve_expr(*inner, ns, scope, rule_vars),
            Expr::Binary { lhs, rhs, .. } => {
                self.resolve_expr(*lhs, ns, scope, rule_vars);
                self.resolve_expr(*rhs, ns, scope, rule_vars);
            }
            Expr::IfThenElse {
                cond,
                then_body,
                else_body,
            } => {
                self.resolve_expr(*cond, ns, scope, rule_vars);
                self.resolve_expr(*then_body, ns, scope, rule_vars);
                self.resolve_expr(*else_body, ns, scope, rule_vars);
            }
            Expr::Let { name, value, body } => {
                self.resolve_expr(*value, ns, scope, rule_vars);
                let mark = scope.mark();
                scope.push(self.module[*name].text.clone(), *name);
                self.resolve_expr(*body, ns, scope, rule_vars);
                scope.truncate(mark);
            }
            Expr::Match { scrutinee, arms } => {
                self.resolve_expr(*scrutinee, ns, scope, rule_vars);
                for arm in arms {
                    let mark = scope.mark();
                    let mut vars = Vec::new();
                    arm.pat.collect_vars(&mut vars);
                    for v in vars {
                        scope.push(self.module[v].text.clone(), v);
                    }
                    self.resolve_expr(arm.body, ns, scope, rule_vars);
                    scope.truncate(mark);
                }
            }
            Expr::Tag {
                enum_name,
                tag,
                payload,
            } => {
                match self
                    .res
                    .resolve_enum_tag(ns, enum_name.as_ref(), &tag.text, tag.span)
                {
                    Ok((qn, _)) => {
                        self.res.tag_enums.insert(expr, qn);
                    }
                    Err(e) => self.errors.push(e),
                }
                self.resolve_expr(*payload, ns, scope, rule_vars);
            }
            Expr::Tuple(elms) | Expr::ListLit(elms) | Expr::VecLit(elms) | Expr::SetLit(elms) => {
                for &e in elms {
                    self.resolve_expr(e, ns, scope, rule_vars);
                }
            }
            Expr::OptLit(elm) => {
                if let Some(e) = elm {
                    self.resolve_expr(*e, ns, scope, rule_vars);
                }
            }
            Expr::MapLit(elms) => {
                for &(k, v) in elms {
                    self.resolve_expr(k, ns, scope, rule_vars);
                    self.resolve_expr(v, ns, scope, rule_vars);
                }
            }
            Expr::Exists { params, body } | Expr::Forall { params, body } => {
                let mark = scope.mark();
                for p in params {
                    scope.push(self.module[p.name].text.clone(), p.name);
                }
                self.resolve_expr(*body, ns, scope, rule_vars);
                scope.truncate(mark);
            }
            Expr::Ascribe { expr: inner, .. } => self.resolve_expr(*inner, ns, scope, rule_vars),
        }
    }

    fn resolve_name(
        &self,
        expr: ExprId,
        name: &QualName,
        ns: &[SmolStr],
        scope: &Scope,
        rule_vars: Option<&FxHashSet<SmolStr>>,
    ) -> Result<RefTarget, ResolveError> {
        let span = self.module.expr_span(expr);

        if !name.is_qualified() {
            let leaf = name.leaf();
            // 1. Local binders, innermost first.
            if let Some(id) = scope.lookup(leaf) {
                return Ok(RefTarget::Local(id));
            }
            // 2. Rule-local Datalog variables.
            if let Some(vars) = rule_vars {
                if vars.contains(leaf) {
                    return Ok(RefTarget::RuleVar(leaf.clone()));
                }
            }
        }

        // 3. Declarations, current namespace first.
        let cands = self.res.candidates(ns, name);
        let mut defs = cands.iter().filter_map(|(qn, d)| match d {
            Declaration::Def { .. } => Some(qn.clone()),
            _ => None,
        });
        match (defs.next(), defs.next()) {
            (Some(qn), None) => return Ok(RefTarget::Def(qn)),
            (Some(_), Some(_)) => {
                return Err(ResolveError::AmbiguousName {
                    name: name.clone(),
                    span,
                })
            }
            (None, _) => {}
        }

        if !name.is_qualified() {
            let leaf = name.leaf();
            // 4. A bare enum tag resolves to a tag construction.
            if leaf.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                if let Ok((enum_name, _)) = self.res.resolve_enum_tag(ns, None, leaf, span) {
                    return Ok(RefTarget::Tag {
                        enum_name,
                        tag: leaf.clone(),
                    });
                }
            }
            // 5. The overloaded lattice operators.
            if let Some(op) = LatOp::from_name(leaf) {
                return Ok(RefTarget::LatticeOp(op));
            }
        }

        Err(ResolveError::NameNotFound {
            name: name.clone(),
            span,
        })
    }
}

/// A flat scope stack; `mark`/`truncate` bracket nested binders.
struct Scope {
    entries: Vec<(SmolStr, NameId)>,
}

impl Scope {
    fn new() -> Self {
        Scope {
            entries: Vec::new(),
        }
    }

    fn push(&mut self, text: SmolStr, id: NameId) {
        self.entries.push((text, id));
    }

    fn mark(&self) -> usize {
        self.entries.len()
    }

    fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    fn lookup(&self, text: &SmolStr) -> Option<NameId> {
        self.entries
            .iter()
            .rev()
            .find(|(t, _)| t == text)
            .map(|(_, id)| *id)
    }
}
