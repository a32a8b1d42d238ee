// The frozen IR: what the simplifier emits and what the solver and verifier
// consume. Declarations live in maps keyed by fully qualified name; every
// expression node carries its inferred type and source span. Nothing here is
// mutated after simplification.

use std::collections::BTreeMap;

use lang_ast::{Annotation, BinOp, LatOp, Literal, QualName, Span, UnaryOp};
use lang_ty::Ty;
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Root {
    pub defs: BTreeMap<QualName, Def>,
    pub enums: BTreeMap<QualName, Enum>,
    pub tables: BTreeMap<QualName, Table>,
    /// Index key position lists per table, in declaration order.
    pub indexes: BTreeMap<QualName, Vec<Vec<usize>>>,
    /// Lattice instance per element type.
    pub lattices: BTreeMap<Ty, LatticeInstance>,
    pub laws: BTreeMap<QualName, Law>,
    pub facts: Vec<Constraint>,
    pub rules: Vec<Constraint>,
}

impl Root {
    pub fn table(&self, name: &QualName) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn lattice_of(&self, ty: &Ty) -> Option<&LatticeInstance> {
        self.lattices.get(ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Def {
    pub name: QualName,
    pub anns: Vec<Annotation>,
    pub params: Vec<(SmolStr, Ty)>,
    pub ret: Ty,
    pub body: Exp,
}

impl Def {
    pub fn has_ann(&self, ann: Annotation) -> bool {
        self.anns.contains(&ann)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    pub name: QualName,
    pub cases: BTreeMap<SmolStr, Ty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Table {
    Relation {
        name: QualName,
        attrs: Vec<(SmolStr, Ty)>,
    },
    Lattice {
        name: QualName,
        keys: Vec<(SmolStr, Ty)>,
        value: (SmolStr, Ty),
    },
}

impl Table {
    pub fn name(&self) -> &QualName {
        match self {
            Table::Relation { name, .. } | Table::Lattice { name, .. } => name,
        }
    }

    /// All attribute names and types, keys-then-value for lattice tables.
    pub fn attrs(&self) -> Vec<(SmolStr, Ty)> {
        match self {
            Table::Relation { attrs, .. } => attrs.clone(),
            Table::Lattice { keys, value, .. } => {
                let mut out = keys.clone();
                out.push(value.clone());
                out
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Table::Relation { attrs, .. } => attrs.len(),
            Table::Lattice { keys, .. } => keys.len() + 1,
        }
    }

    pub fn is_lattice(&self) -> bool {
        matches!(self, Table::Lattice { .. })
    }
}

/// The dictionary a lattice-operator call site resolves against:
/// the instance record for one element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeInstance {
    pub ty: Ty,
    pub bot: Exp,
    pub top: Exp,
    pub leq: Exp,
    pub lub: Exp,
    pub glb: Exp,
    pub widen: Option<Exp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Law {
    pub name: QualName,
    pub params: Vec<(SmolStr, Ty)>,
    pub body: Exp,
}

// ==============================================================================
// Constraints
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub head: HeadAtom,
    pub body: Vec<BodyAtom>,
    pub span: Span,
}

impl Constraint {
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadAtom {
    pub table: QualName,
    pub terms: Vec<Exp>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyAtom {
    Atom {
        table: QualName,
        terms: Vec<Term>,
        span: Span,
    },
    Alias {
        var: SmolStr,
        exp: Exp,
        span: Span,
    },
    NotEqual {
        lhs: SmolStr,
        rhs: SmolStr,
        span: Span,
    },
    Loop {
        var: SmolStr,
        exp: Exp,
        span: Span,
    },
}

impl BodyAtom {
    pub fn span(&self) -> Span {
        match self {
            BodyAtom::Atom { span, .. }
            | BodyAtom::Alias { span, .. }
            | BodyAtom::NotEqual { span, .. }
            | BodyAtom::Loop { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Wild,
    Var(SmolStr),
    Lit(Literal),
}

// ==============================================================================
// Expressions
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Exp {
    pub kind: ExpKind,
    pub ty: Ty,
    pub span: Span,
}

impl Exp {
    pub fn new(kind: ExpKind, ty: Ty, span: Span) -> Self {
        Exp { kind, ty, span }
    }

    /// A boolean `true` literal, used by rewrites.
    pub fn truth(span: Span) -> Self {
        Exp::new(ExpKind::Lit(Literal::Bool(true)), Ty::Bool, span)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExpKind {
    Lit(Literal),
    /// A local variable: parameter, let, pattern, quantifier, or rule var.
    Var(SmolStr),
    /// A reference to a top-level definition.
    Def(QualName),
    /// A lattice-operator call target, carrying the resolved element type
    /// whose instance record supplies the implementation.
    LatOp { op: LatOp, elem: Ty },
    Lambda {
        params: Vec<(SmolStr, Ty)>,
        body: Box<Exp>,
    },
    Apply {
        fun: Box<Exp>,
        args: Vec<Exp>,
    },
    Unary {
        op: UnaryOp,
        exp: Box<Exp>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Exp>,
        rhs: Box<Exp>,
    },
    IfThenElse {
        cond: Box<Exp>,
        then_body: Box<Exp>,
        else_body: Box<Exp>,
    },
    Let {
        name: SmolStr,
        value: Box<Exp>,
        body: Box<Exp>,
    },
    Match {
        scrutinee: Box<Exp>,
        arms: Vec<(Pat, Exp)>,
    },
    Tag {
        enum_name: QualName,
        tag: SmolStr,
        payload: Box<Exp>,
    },
    Tuple(Vec<Exp>),
    OptLit(Option<Box<Exp>>),
    ListLit(Vec<Exp>),
    VecLit(Vec<Exp>),
    SetLit(Vec<Exp>),
    MapLit(Vec<(Exp, Exp)>),
    Exists {
        params: Vec<(SmolStr, Ty)>,
        body: Box<Exp>,
    },
    Forall {
        params: Vec<(SmolStr, Ty)>,
        body: Box<Exp>,
    },
    Ascribe(Box<Exp>),
    UserError,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pat {
    Wild,
    Var(SmolStr),
    Lit(Literal),
    Tag {
        enum_name: QualName,
        tag: SmolStr,
        pat: Box<Pat>,
    },
    Tuple(Vec<Pat>),
}

impl Pat {
    /// Whether this pattern matches every value of its type.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pat::Wild | Pat::Var(_) => true,
            Pat::Lit(Literal::Unit) => true,
            Pat::Lit(_) => false,
            Pat::Tag { .. } => false,
            Pat::Tuple(pats) => pats.iter().all(Pat::is_irrefutable),
        }
    }
}
