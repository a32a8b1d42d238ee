// The weeded AST and everything the weeder needs around it: names, spans,
// literals, the surface parse-tree contract (`surface`), and the declaration
// registry (`symbols`). The layout follows the usual split: an arena `Module`
// owns expressions and binder names, side tables carry spans, and later
// phases (resolution, typing) attach their results as further side tables
// without mutating the module.

pub mod surface;
pub mod symbols;
mod weeder;

#[cfg(test)]
mod tests;

use std::{fmt, ops};

use la_arena::{Arena, ArenaMap, Idx as Id};
use smol_str::SmolStr;

pub use weeder::{weed, WeedError};

// ==============================================================================
// Source positions
// ==============================================================================

/// A half-open byte range `(sp1, sp2)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Span for synthesized nodes with no corresponding text.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// ==============================================================================
// Identifiers and qualified names
// ==============================================================================

/// A source-level identifier. The span exists for diagnostics only;
/// equality, ordering, and hashing all ignore it.
#[derive(Debug, Clone)]
pub struct Ident {
    pub text: SmolStr,
    pub span: Span,
}

impl Ident {
    pub fn new(text: impl Into<SmolStr>, span: Span) -> Self {
        Ident {
            text: text.into(),
            span,
        }
    }
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Ident {}

impl PartialOrd for Ident {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ident {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.text.cmp(&other.text)
    }
}

impl std::hash::Hash for Ident {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A fully qualified name: namespace segments plus a final leaf.
/// Two names are equal iff their segment sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualName {
    segments: Vec<SmolStr>,
}

impl QualName {
    pub fn new(segments: Vec<SmolStr>) -> Self {
        assert!(!segments.is_empty(), "a qualified name has at least a leaf");
        QualName { segments }
    }

    /// A name with no namespace part.
    pub fn simple(leaf: impl Into<SmolStr>) -> Self {
        QualName {
            segments: vec![leaf.into()],
        }
    }

    /// Prefix this name with the given namespace segments.
    pub fn qualify(&self, ns: &[SmolStr]) -> QualName {
        let mut segments = ns.to_vec();
        segments.extend(self.segments.iter().cloned());
        QualName { segments }
    }

    pub fn segments(&self) -> &[SmolStr] {
        &self.segments
    }

    pub fn leaf(&self) -> &SmolStr {
        self.segments.last().expect("non-empty by construction")
    }

    pub fn namespace(&self) -> &[SmolStr] {
        &self.segments[..self.segments.len() - 1]
    }

    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }
}

impl fmt::Display for QualName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "::")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

// ==============================================================================
// Literals and operators
// ==============================================================================

/// A literal after weeding. Sized numeric literals have already been
/// bounds-checked; floats are wrapped so the whole AST stays `Eq + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Literal {
    Unit,
    Bool(bool),
    Char(char),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    BigInt(num_bigint::BigInt),
    Float32(ordered_float::OrderedFloat<f32>),
    Float64(ordered_float::OrderedFloat<f64>),
    Str(SmolStr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnaryOp {
    Not,
    Plus,
    Minus,
}

/// Binary operators that survive weeding. The extended lattice operators
/// (`⊑ ⊔ ⊓ ▽ △`) desugar to calls and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
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
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        write!(f, "{s}")
    }
}

/// The lattice operators subject to ad-hoc overloading. The weeder turns
/// `x ⊔ y` into an application of a variable with the operator's function
/// name; the resolver recognizes these names when ordinary lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LatOp {
    Leq,
    Lub,
    Glb,
    Widen,
    Narrow,
    Bot,
    Top,
}

impl LatOp {
    pub fn function_name(self) -> &'static str {
        match self {
            LatOp::Leq => "leq",
            LatOp::Lub => "lub",
            LatOp::Glb => "glb",
            LatOp::Widen => "widen",
            LatOp::Narrow => "narrow",
            LatOp::Bot => "bot",
            LatOp::Top => "top",
        }
    }

    pub fn from_name(name: &str) -> Option<LatOp> {
        Some(match name {
            "leq" => LatOp::Leq,
            "lub" => LatOp::Lub,
            "glb" => LatOp::Glb,
            "widen" => LatOp::Widen,
            "narrow" => LatOp::Narrow,
            "bot" => LatOp::Bot,
            "top" => LatOp::Top,
            _ => return None,
        })
    }
}

// ==============================================================================
// Annotations
// ==============================================================================

/// The recognized definition annotations. Anything else is `IllegalAnnotation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Annotation {
    Associative,
    Commutative,
    Monotone,
    Strict,
    Unchecked,
    Unsafe,
}

impl Annotation {
    pub fn from_name(name: &str) -> Option<Annotation> {
        Some(match name {
            "associative" => Annotation::Associative,
            "commutative" => Annotation::Commutative,
            "monotone" => Annotation::Monotone,
            "strict" => Annotation::Strict,
            "unchecked" => Annotation::Unchecked,
            "unsafe" => Annotation::Unsafe,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Annotation::Associative => "associative",
            Annotation::Commutative => "commutative",
            Annotation::Monotone => "monotone",
            Annotation::Strict => "strict",
            Annotation::Unchecked => "unchecked",
            Annotation::Unsafe => "unsafe",
        }
    }
}

// ==============================================================================
// The weeded module
// ==============================================================================

/// A binder introduced by a parameter, `let`, pattern, or quantifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub text: SmolStr,
    pub kind: NameKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Param,
    LetBound,
    PatVar,
    QuantVar,
}

pub type ExprId = Id<Expr>;
pub type NameId = Id<Name>;

/// One weeded compilation unit. Declarations are flattened: each carries
/// its full namespace path, so nothing downstream re-walks nesting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub exprs: Arena<Expr>,
    pub names: Arena<Name>,
    pub expr_spans: ArenaMap<ExprId, Span>,
    pub name_spans: ArenaMap<NameId, Span>,
    pub decls: Vec<Decl>,
}

impl Module {
    pub fn expr_span(&self, id: ExprId) -> Span {
        self.expr_spans.get(id).copied().unwrap_or(Span::DUMMY)
    }

    pub fn name_span(&self, id: NameId) -> Span {
        self.name_spans.get(id).copied().unwrap_or(Span::DUMMY)
    }
}

impl ops::Index<ExprId> for Module {
    type Output = Expr;
    fn index(&self, index: ExprId) -> &Self::Output {
        &self.exprs[index]
    }
}

impl ops::Index<NameId> for Module {
    type Output = Name;
    fn index(&self, index: NameId) -> &Self::Output {
        &self.names[index]
    }
}

/// Index of a declaration in `Module::decls`.
pub type DeclIdx = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    /// Namespace path the declaration lives under.
    pub ns: Vec<SmolStr>,
    pub kind: DeclKind,
    pub span: Span,
}

impl Decl {
    /// The fully qualified name this declaration registers, if it has one.
    pub fn qual_name(&self) -> Option<QualName> {
        let leaf = match &self.kind {
            DeclKind::Def(d) => &d.ident,
            DeclKind::Enum(d) => &d.ident,
            DeclKind::Relation(d) => &d.ident,
            DeclKind::Lattice(d) => &d.ident,
            DeclKind::Law(d) => &d.ident,
            DeclKind::Index(_)
            | DeclKind::BoundedLattice(_)
            | DeclKind::Fact(_)
            | DeclKind::Rule(_) => return None,
        };
        Some(QualName::simple(leaf.text.clone()).qualify(&self.ns))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Def(DefDecl),
    Enum(EnumDecl),
    Relation(RelationDecl),
    Lattice(LatticeTableDecl),
    Index(IndexDecl),
    BoundedLattice(BoundedLatticeDecl),
    Law(LawDecl),
    Fact(FactDecl),
    Rule(RuleDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalParam {
    pub name: NameId,
    pub ty: surface::Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefDecl {
    pub ident: Ident,
    pub anns: Vec<Annotation>,
    pub params: Vec<FormalParam>,
    pub ret_ty: surface::Type,
    pub body: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumCase {
    pub tag: Ident,
    /// Payload type; `Unit` when the case carries none.
    pub ty: surface::Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub ident: Ident,
    pub cases: Vec<EnumCase>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub ident: Ident,
    pub ty: surface::Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDecl {
    pub ident: Ident,
    pub attrs: Vec<Attribute>,
}

/// A lattice table: the last attribute of the surface declaration becomes
/// the lattice-valued element, the rest are keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeTableDecl {
    pub ident: Ident,
    pub keys: Vec<Attribute>,
    pub value: Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDecl {
    pub table: Ident,
    /// Each inner list is one multi-column lookup key.
    pub keys: Vec<Vec<Ident>>,
}

/// `let T<> = (bot, top, leq, lub, glb)`, optionally with a sixth
/// widening component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedLatticeDecl {
    pub ty: surface::Type,
    pub bot: ExprId,
    pub top: ExprId,
    pub leq: ExprId,
    pub lub: ExprId,
    pub glb: ExprId,
    pub widen: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LawDecl {
    pub ident: Ident,
    pub params: Vec<FormalParam>,
    pub body: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactDecl {
    pub head: HeadPredicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecl {
    pub head: HeadPredicate,
    pub body: Vec<BodyPredicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadPredicate {
    pub name: Ident,
    pub terms: Vec<ExprId>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPredicate {
    /// A relational lookup `P(t₁, …, tₙ)`.
    Atom {
        name: Ident,
        terms: Vec<BodyTerm>,
        span: Span,
    },
    /// An alias binding `x = t`.
    Alias { ident: Ident, exp: ExprId, span: Span },
    /// A disequality `x != y`.
    NotEqual { lhs: Ident, rhs: Ident, span: Span },
    /// An element loop `x <- S`.
    Loop { ident: Ident, exp: ExprId, span: Span },
}

/// Terms allowed in body atom positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyTerm {
    Wild(Span),
    Var(Ident),
    Lit(Literal, Span),
}

// ==============================================================================
// Expressions and patterns
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchArm {
    pub pat: Pattern,
    pub body: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantParam {
    pub name: NameId,
    pub ty: surface::Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Placeholder for a node whose weeding failed; lets the weeder keep
    /// going and report every independent error.
    Missing,
    Lit(Literal),
    /// A (possibly unqualified) reference; resolution is a side table.
    Var(QualName),
    Lambda {
        params: Vec<NameId>,
        body: ExprId,
    },
    Apply {
        fun: ExprId,
        args: Vec<ExprId>,
    },
    Unary {
        op: UnaryOp,
        expr: ExprId,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    IfThenElse {
        cond: ExprId,
        then_body: ExprId,
        else_body: ExprId,
    },
    Let {
        name: NameId,
        value: ExprId,
        body: ExprId,
    },
    Match {
        scrutinee: ExprId,
        arms: Vec<MatchArm>,
    },
    Tag {
        /// Enum path when written `Sign.Pos`; `None` for a bare tag that
        /// resolution disambiguates.
        enum_name: Option<QualName>,
        tag: Ident,
        payload: ExprId,
    },
    Tuple(Vec<ExprId>),
    OptLit(Option<ExprId>),
    ListLit(Vec<ExprId>),
    VecLit(Vec<ExprId>),
    SetLit(Vec<ExprId>),
    MapLit(Vec<(ExprId, ExprId)>),
    Exists {
        params: Vec<QuantParam>,
        body: ExprId,
    },
    Forall {
        params: Vec<QuantParam>,
        body: ExprId,
    },
    Ascribe {
        expr: ExprId,
        ty: surface::Type,
    },
    /// The user `error` expression: aborts solver evaluation when reached.
    UserError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Wild {
        span: Span,
    },
    Var {
        name: NameId,
    },
    Lit {
        lit: Literal,
        span: Span,
    },
    Tag {
        enum_name: Option<QualName>,
        tag: Ident,
        pat: Box<Pattern>,
        span: Span,
    },
    Tuple {
        pats: Vec<Pattern>,
        span: Span,
    },
}

impl Pattern {
    /// Collect every binder in the pattern, left to right.
    pub fn collect_vars(&self, acc: &mut Vec<NameId>) {
        match self {
            Pattern::Wild { .. } | Pattern::Lit { .. } => {}
            Pattern::Var { name } => acc.push(*name),
            Pattern::Tag { pat, .. } => pat.collect_vars(acc),
            Pattern::Tuple { pats, .. } => {
                for p in pats {
                    p.collect_vars(acc);
                }
            }
        }
    }

    pub fn span(&self, module: &Module) -> Span {
        match self {
            Pattern::Wild { span } | Pattern::Lit { span, .. } => *span,
            Pattern::Var { name } => module.name_span(*name),
            Pattern::Tag { span, .. } | Pattern::Tuple { span, .. } => *span,
        }
    }
}
