// The parse-tree contract. The parser proper is a collaborator: anything
// that produces these shapes (each node carrying its `(sp1, sp2)` span) can
// feed the pipeline. Numeric literals arrive as raw text; the weeder owns
// the bounds checks.

use smol_str::SmolStr;

use crate::{Ident, Span, UnaryOp};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Root {
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Namespace {
        name: Vec<Ident>,
        decls: Vec<Decl>,
        span: Span,
    },
    Def {
        ident: Ident,
        anns: Vec<Ident>,
        params: Vec<Param>,
        ret_ty: Type,
        body: Exp,
        span: Span,
    },
    Enum {
        ident: Ident,
        cases: Vec<Case>,
        span: Span,
    },
    Relation {
        ident: Ident,
        attrs: Vec<(Ident, Type)>,
        span: Span,
    },
    Lattice {
        ident: Ident,
        attrs: Vec<(Ident, Type)>,
        span: Span,
    },
    Index {
        table: Ident,
        keys: Vec<Vec<Ident>>,
        span: Span,
    },
    /// `let T<> = (e₁, …, eₙ)` — the element list must weed to exactly
    /// (bot, top, leq, lub, glb), optionally followed by widen.
    BoundedLattice {
        ty: Type,
        elms: Vec<Exp>,
        span: Span,
    },
    Law {
        ident: Ident,
        params: Vec<Param>,
        body: Exp,
        span: Span,
    },
    Fact {
        head: Predicate,
        span: Span,
    },
    Rule {
        head: Predicate,
        body: Vec<Predicate>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub ident: Ident,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub tag: Ident,
    pub ty: Option<Type>,
}

/// A surface predicate, in head or body position. The weeder decides which
/// forms are legal where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Ambient {
        name: Ident,
        terms: Vec<Exp>,
        span: Span,
    },
    True(Span),
    False(Span),
    Alias {
        ident: Ident,
        exp: Exp,
        span: Span,
    },
    NotEqual {
        lhs: Ident,
        rhs: Ident,
        span: Span,
    },
    Loop {
        ident: Ident,
        exp: Exp,
        span: Span,
    },
}

impl Predicate {
    pub fn span(&self) -> Span {
        match self {
            Predicate::Ambient { span, .. }
            | Predicate::True(span)
            | Predicate::False(span)
            | Predicate::Alias { span, .. }
            | Predicate::NotEqual { span, .. }
            | Predicate::Loop { span, .. } => *span,
        }
    }
}

// ==============================================================================
// Types
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Unit,
    Bool,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    BigInt,
    Float32,
    Float64,
    Str,
    Named(Vec<Ident>),
    Tuple(Vec<Type>),
    Lambda(Vec<Type>, Box<Type>),
    Parametric(Vec<Ident>, Vec<Type>),
    Native(Vec<Ident>),
}

// ==============================================================================
// Expressions
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSuffix {
    I8,
    I16,
    I32,
    I64,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatSuffix {
    F32,
    F64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lit {
    Unit(Span),
    Bool(bool, Span),
    Char(char, Span),
    /// Raw digits plus suffix; bounds-checked by the weeder.
    Int {
        text: SmolStr,
        suffix: IntSuffix,
        span: Span,
    },
    Float {
        text: SmolStr,
        suffix: FloatSuffix,
        span: Span,
    },
    Str(SmolStr, Span),
}

impl Lit {
    pub fn span(&self) -> Span {
        match self {
            Lit::Unit(span)
            | Lit::Bool(_, span)
            | Lit::Char(_, span)
            | Lit::Int { span, .. }
            | Lit::Float { span, .. }
            | Lit::Str(_, span) => *span,
        }
    }
}

/// Surface binary operators, including the extended lattice operators the
/// weeder desugars away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    And,
    Or,
    /// `⊑`
    Leq,
    /// `⊔`
    Lub,
    /// `⊓`
    Glb,
    /// `▽`
    Widen,
    /// `△`
    Narrow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exp {
    Lit(Lit),
    /// A possibly-qualified reference `A::B::x`.
    Var { path: Vec<Ident>, span: Span },
    Lambda {
        params: Vec<Ident>,
        body: Box<Exp>,
        span: Span,
    },
    Apply {
        fun: Box<Exp>,
        args: Vec<Exp>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        exp: Box<Exp>,
        span: Span,
    },
    Binary {
        op: BinOp,
        lhs: Box<Exp>,
        rhs: Box<Exp>,
        span: Span,
    },
    /// Backtick-style infix identifier application: `a \`f\` b`.
    Infix {
        lhs: Box<Exp>,
        path: Vec<Ident>,
        rhs: Box<Exp>,
        span: Span,
    },
    IfThenElse {
        cond: Box<Exp>,
        then_body: Box<Exp>,
        else_body: Box<Exp>,
        span: Span,
    },
    /// `let pat = value; body` — a single-variable pattern weeds to a
    /// plain let, anything else to a one-arm match.
    LetMatch {
        pat: Pat,
        value: Box<Exp>,
        body: Box<Exp>,
        span: Span,
    },
    Match {
        scrutinee: Box<Exp>,
        arms: Vec<(Pat, Exp)>,
        span: Span,
    },
    Tag {
        enum_path: Option<Vec<Ident>>,
        tag: Ident,
        payload: Option<Box<Exp>>,
        span: Span,
    },
    Tuple {
        elms: Vec<Exp>,
        span: Span,
    },
    OptLit {
        elm: Option<Box<Exp>>,
        span: Span,
    },
    ListLit {
        elms: Vec<Exp>,
        span: Span,
    },
    VecLit {
        elms: Vec<Exp>,
        span: Span,
    },
    SetLit {
        elms: Vec<Exp>,
        span: Span,
    },
    MapLit {
        elms: Vec<(Exp, Exp)>,
        span: Span,
    },
    Exists {
        params: Vec<Param>,
        body: Box<Exp>,
        span: Span,
    },
    Forall {
        params: Vec<Param>,
        body: Box<Exp>,
        span: Span,
    },
    Ascribe {
        exp: Box<Exp>,
        ty: Type,
        span: Span,
    },
    /// `⊥`
    Bot(Span),
    /// `⊤`
    Top(Span),
    /// `_` — illegal in expression position; the weeder rejects it.
    Wild(Span),
    /// `???`
    Error(Span),
}

impl Exp {
    pub fn span(&self) -> Span {
        match self {
            Exp::Lit(lit) => lit.span(),
            Exp::Var { span, .. }
            | Exp::Lambda { span, .. }
            | Exp::Apply { span, .. }
            | Exp::Unary { span, .. }
            | Exp::Binary { span, .. }
            | Exp::Infix { span, .. }
            | Exp::IfThenElse { span, .. }
            | Exp::LetMatch { span, .. }
            | Exp::Match { span, .. }
            | Exp::Tag { span, .. }
            | Exp::Tuple { span, .. }
            | Exp::OptLit { span, .. }
            | Exp::ListLit { span, .. }
            | Exp::VecLit { span, .. }
            | Exp::SetLit { span, .. }
            | Exp::MapLit { span, .. }
            | Exp::Exists { span, .. }
            | Exp::Forall { span, .. }
            | Exp::Ascribe { span, .. }
            | Exp::Bot(span)
            | Exp::Top(span)
            | Exp::Wild(span)
            | Exp::Error(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pat {
    Wild(Span),
    Var(Ident),
    Lit(Lit),
    Tag {
        enum_path: Option<Vec<Ident>>,
        tag: Ident,
        pat: Option<Box<Pat>>,
        span: Span,
    },
    Tuple(Vec<Pat>, Span),
}

impl Pat {
    pub fn span(&self) -> Span {
        match self {
            Pat::Wild(span) => *span,
            Pat::Var(ident) => ident.span,
            Pat::Lit(lit) => lit.span(),
            Pat::Tag { span, .. } => *span,
            Pat::Tuple(_, span) => *span,
        }
    }
}
