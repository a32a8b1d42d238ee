// ==============================================================================
// Term evaluator
// ==============================================================================
//
// A tree-walking interpreter over the frozen IR, used for head terms, alias
// bindings, and the lattice instance operators. Integer arithmetic wraps;
// division and modulus by zero surface as a dedicated error the fixpoint
// loop maps to row suppression.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lang_ast::{BinOp, LatOp, QualName, Span, UnaryOp};
use lang_check::ir::{self, Exp, ExpKind, Pat};
use lang_ty::Ty;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::value::{Closure, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("user error reached during evaluation")]
    UserError { span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("unbound variable `{name}`")]
    UnboundVar { name: SmolStr, span: Span },

    #[error("no pattern matched the scrutinee")]
    MatchFailure { span: Span },

    #[error("{what} cannot be evaluated at solve time")]
    Unsupported { what: &'static str, span: Span },

    #[error("`{name}` is not defined")]
    UndefinedDef { name: QualName, span: Span },

    #[error("type `{ty}` has no lattice instance")]
    NoInstance { ty: Ty, span: Span },
}

/// The evaluation environment: rule variables as a base map, lexical
/// binders as a scoped stack on top.
#[derive(Debug, Default)]
pub struct Env<'a> {
    base: Option<&'a FxHashMap<SmolStr, Value>>,
    locals: Vec<(SmolStr, Value)>,
}

impl<'a> Env<'a> {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn with_base(base: &'a FxHashMap<SmolStr, Value>) -> Self {
        Env {
            base: Some(base),
            locals: Vec::new(),
        }
    }

    fn push(&mut self, name: SmolStr, value: Value) {
        self.locals.push((name, value));
    }

    fn mark(&self) -> usize {
        self.locals.len()
    }

    fn truncate(&mut self, mark: usize) {
        self.locals.truncate(mark);
    }

    fn lookup(&self, name: &SmolStr) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.base.and_then(|b| b.get(name)))
    }
}

pub struct Interpreter<'ir> {
    root: &'ir ir::Root,
}

impl<'ir> Interpreter<'ir> {
    pub fn new(root: &'ir ir::Root) -> Self {
        Interpreter { root }
    }

    pub fn root(&self) -> &'ir ir::Root {
        self.root
    }

    // ==========================================================================
    // Lattice instance access
    // ==========================================================================

    pub fn instance(&self, ty: &Ty, span: Span) -> Result<&'ir ir::LatticeInstance, EvalError> {
        self.root
            .lattices
            .get(ty)
            .ok_or_else(|| EvalError::NoInstance {
                ty: ty.clone(),
                span,
            })
    }

    pub fn lat_bot(&self, ty: &Ty, span: Span) -> Result<Value, EvalError> {
        let inst = self.instance(ty, span)?;
        self.eval(&inst.bot, &mut Env::new())
    }

    pub fn lat_leq(&self, ty: &Ty, a: &Value, b: &Value, span: Span) -> Result<bool, EvalError> {
        let inst = self.instance(ty, span)?;
        match self.apply_op(&inst.leq, &[a.clone(), b.clone()])? {
            Value::Bool(out) => Ok(out),
            _ => Err(EvalError::Unsupported {
                what: "a non-boolean partial order",
                span,
            }),
        }
    }

    pub fn lat_lub(&self, ty: &Ty, a: &Value, b: &Value, span: Span) -> Result<Value, EvalError> {
        let inst = self.instance(ty, span)?;
        self.apply_op(&inst.lub, &[a.clone(), b.clone()])
    }

    /// Apply a lattice-instance operator expression to argument values.
    /// Direct definition and lambda references avoid materializing closures.
    pub fn apply_op(&self, op: &Exp, args: &[Value]) -> Result<Value, EvalError> {
        match &op.kind {
            ExpKind::Def(name) => self.apply_def(name, args, op.span),
            ExpKind::Lambda { params, body } => {
                let mut env = Env::new();
                for ((name, _), value) in params.iter().zip(args) {
                    env.push(name.clone(), value.clone());
                }
                self.eval(body, &mut env)
            }
            _ => {
                let fun = self.eval(op, &mut Env::new())?;
                self.apply_value(fun, args, op.span)
            }
        }
    }

    pub fn apply_def(
        &self,
        name: &QualName,
        args: &[Value],
        span: Span,
    ) -> Result<Value, EvalError> {
        let def = self
            .root
            .defs
            .get(name)
            .ok_or_else(|| EvalError::UndefinedDef {
                name: name.clone(),
                span,
            })?;
        let mut env = Env::new();
        for ((param, _), value) in def.params.iter().zip(args) {
            env.push(param.clone(), value.clone());
        }
        self.eval(&def.body, &mut env)
    }

    fn apply_value(&self, fun: Value, args: &[Value], span: Span) -> Result<Value, EvalError> {
        match fun {
            Value::Closure(closure) => {
                let mut env = Env::new();
                for (name, value) in &closure.env {
                    env.push(name.clone(), value.clone());
                }
                for (param, value) in closure.params.iter().zip(args) {
                    env.push(param.clone(), value.clone());
                }
                self.eval(&closure.body, &mut env)
            }
            _ => Err(EvalError::Unsupported {
                what: "application of a non-function value",
                span,
            }),
        }
    }

    // ==========================================================================
    // Expression evaluation
    // ==========================================================================

    pub fn eval(&self, exp: &Exp, env: &mut Env<'_>) -> Result<Value, EvalError> {
        match &exp.kind {
            ExpKind::Lit(lit) => Ok(Value::from(lit)),
            ExpKind::Var(name) => env.lookup(name).cloned().ok_or_else(|| {
                EvalError::UnboundVar {
                    name: name.clone(),
                    span: exp.span,
                }
            }),
            ExpKind::Def(name) => {
                let def =
                    self.root
                        .defs
                        .get(name)
                        .ok_or_else(|| EvalError::UndefinedDef {
                            name: name.clone(),
                            span: exp.span,
                        })?;
                Ok(Value::Closure(Closure {
                    params: def.params.iter().map(|(n, _)| n.clone()).collect(),
                    body: Arc::new(def.body.clone()),
                    env: Vec::new(),
                }))
            }
            ExpKind::LatOp { op, elem } => match op {
                LatOp::Bot => {
                    let inst = self.instance(elem, exp.span)?;
                    self.eval(&inst.bot, &mut Env::new())
                }
                LatOp::Top => {
                    let inst = self.instance(elem, exp.span)?;
                    self.eval(&inst.top, &mut Env::new())
                }
                _ => Err(EvalError::Unsupported {
                    what: "a first-class lattice operator",
                    span: exp.span,
                }),
            },
            ExpKind::Lambda { params, body } => Ok(Value::Closure(Closure {
                params: params.iter().map(|(n, _)| n.clone()).collect(),
                body: Arc::new((**body).clone()),
                env: env.locals.clone(),
            })),
            ExpKind::Apply { fun, args } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args {
                    arg_values.push(self.eval(a, env)?);
                }
                match &fun.kind {
                    ExpKind::Def(name) => self.apply_def(name, &arg_values, fun.span),
                    ExpKind::LatOp { op, elem } => {
                        self.apply_lat_op(*op, elem, &arg_values, fun.span)
                    }
                    ExpKind::Lambda { params, body } => {
                        let mark = env.mark();
                        for ((name, _), value) in params.iter().zip(&arg_values) {
                            env.push(name.clone(), value.clone());
                        }
                        let out = self.eval(body, env);
                        env.truncate(mark);
                        out
                    }
                    _ => {
                        let fun_value = self.eval(fun, env)?;
                        self.apply_value(fun_value, &arg_values, fun.span)
                    }
                }
            }
            ExpKind::Unary { op, exp: inner } => {
                let v = self.eval(inner, env)?;
                self.unary(*op, v, exp.span)
            }
            ExpKind::Binary { op, lhs, rhs } => {
                // Short-circuit the boolean connectives.
                match op {
                    BinOp::And => {
                        return match self.eval(lhs, env)? {
                            Value::Bool(false) => Ok(Value::Bool(false)),
                            _ => self.eval(rhs, env),
                        };
                    }
                    BinOp::Or => {
                        return match self.eval(lhs, env)? {
                            Value::Bool(true) => Ok(Value::Bool(true)),
                            _ => self.eval(rhs, env),
                        };
                    }
                    _ => {}
                }
                let l = self.eval(lhs, env)?;
                let r = self.eval(rhs, env)?;
                self.binary(*op, l, r, exp.span)
            }
            ExpKind::IfThenElse {
                cond,
                then_body,
                else_body,
            } => match self.eval(cond, env)? {
                Value::Bool(true) => self.eval(then_body, env),
                Value::Bool(false) => self.eval(else_body, env),
                _ => Err(EvalError::Unsupported {
                    what: "a non-boolean condition",
                    span: exp.span,
                }),
            },
            ExpKind::Let { name, value, body } => {
                let v = self.eval(value, env)?;
                let mark = env.mark();
                env.push(name.clone(), v);
                let out = self.eval(body, env);
                env.truncate(mark);
                out
            }
            ExpKind::Match { scrutinee, arms } => {
                let v = self.eval(scrutinee, env)?;
                for (pat, body) in arms {
                    let mark = env.mark();
                    if match_pat(pat, &v, env) {
                        let out = self.eval(body, env);
                        env.truncate(mark);
                        return out;
                    }
                    env.truncate(mark);
                }
                Err(EvalError::MatchFailure { span: exp.span })
            }
            ExpKind::Tag {
                enum_name,
                tag,
                payload,
            } => {
                let v = self.eval(payload, env)?;
                Ok(Value::Tag(enum_name.clone(), tag.clone(), Box::new(v)))
            }
            ExpKind::Tuple(elms) => {
                let mut out = Vec::with_capacity(elms.len());
                for e in elms {
                    out.push(self.eval(e, env)?);
                }
                Ok(Value::Tuple(out))
            }
            ExpKind::OptLit(elm) => match elm {
                Some(e) => Ok(Value::Opt(Some(Box::new(self.eval(e, env)?)))),
                None => Ok(Value::Opt(None)),
            },
            ExpKind::ListLit(elms) => {
                let mut out = Vec::with_capacity(elms.len());
                for e in elms {
                    out.push(self.eval(e, env)?);
                }
                Ok(Value::Lst(out))
            }
            ExpKind::VecLit(elms) => {
                let mut out = Vec::with_capacity(elms.len());
                for e in elms {
                    out.push(self.eval(e, env)?);
                }
                Ok(Value::Vector(out))
            }
            ExpKind::SetLit(elms) => {
                let mut out = BTreeSet::new();
                for e in elms {
                    out.insert(self.eval(e, env)?);
                }
                Ok(Value::Set(out))
            }
            ExpKind::MapLit(elms) => {
                let mut out = BTreeMap::new();
                for (k, v) in elms {
                    out.insert(self.eval(k, env)?, self.eval(v, env)?);
                }
                Ok(Value::Map(out))
            }
            ExpKind::Exists { .. } => Err(EvalError::Unsupported {
                what: "an existential quantifier",
                span: exp.span,
            }),
            ExpKind::Forall { .. } => Err(EvalError::Unsupported {
                what: "a universal quantifier",
                span: exp.span,
            }),
            ExpKind::Ascribe(inner) => self.eval(inner, env),
            ExpKind::UserError => Err(EvalError::UserError { span: exp.span }),
        }
    }

    fn apply_lat_op(
        &self,
        op: LatOp,
        elem: &Ty,
        args: &[Value],
        span: Span,
    ) -> Result<Value, EvalError> {
        let inst = self.instance(elem, span)?;
        match op {
            LatOp::Bot => self.eval(&inst.bot, &mut Env::new()),
            LatOp::Top => self.eval(&inst.top, &mut Env::new()),
            LatOp::Leq => self.apply_op(&inst.leq, args),
            LatOp::Lub => self.apply_op(&inst.lub, args),
            LatOp::Glb => self.apply_op(&inst.glb, args),
            LatOp::Widen | LatOp::Narrow => match &inst.widen {
                Some(w) => self.apply_op(w, args),
                None => Err(EvalError::Unsupported {
                    what: "widening on an instance without a widening operator",
                    span,
                }),
            },
        }
    }

    // ==========================================================================
    // Primitive operators
    // ==========================================================================

    fn unary(&self, op: UnaryOp, v: Value, span: Span) -> Result<Value, EvalError> {
        match (op, v) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Plus, v) => Ok(v),
            (UnaryOp::Minus, Value::Int8(n)) => Ok(Value::Int8(n.wrapping_neg())),
            (UnaryOp::Minus, Value::Int16(n)) => Ok(Value::Int16(n.wrapping_neg())),
            (UnaryOp::Minus, Value::Int32(n)) => Ok(Value::Int32(n.wrapping_neg())),
            (UnaryOp::Minus, Value::Int64(n)) => Ok(Value::Int64(n.wrapping_neg())),
            (UnaryOp::Minus, Value::BigInt(n)) => Ok(Value::BigInt(-n)),
            (UnaryOp::Minus, Value::Float32(x)) => Ok(Value::Float32(-x)),
            (UnaryOp::Minus, Value::Float64(x)) => Ok(Value::Float64(-x)),
            _ => Err(EvalError::Unsupported {
                what: "a unary operator on this value",
                span,
            }),
        }
    }

    fn binary(&self, op: BinOp, l: Value, r: Value, span: Span) -> Result<Value, EvalError> {
        use BinOp::*;
        match op {
            Eq => return Ok(Value::Bool(l == r)),
            NotEq => return Ok(Value::Bool(l != r)),
            Lt => return Ok(Value::Bool(l < r)),
            Le => return Ok(Value::Bool(l <= r)),
            Gt => return Ok(Value::Bool(l > r)),
            Ge => return Ok(Value::Bool(l >= r)),
            _ => {}
        }
        macro_rules! int_arith {
            ($a:expr, $b:expr, $ctor:ident) => {
                match op {
                    Add => Ok(Value::$ctor($a.wrapping_add($b))),
                    Sub => Ok(Value::$ctor($a.wrapping_sub($b))),
                    Mul => Ok(Value::$ctor($a.wrapping_mul($b))),
                    Div if $b == 0 => Err(EvalError::DivisionByZero { span }),
                    Div => Ok(Value::$ctor($a.wrapping_div($b))),
                    Rem if $b == 0 => Err(EvalError::DivisionByZero { span }),
                    Rem => Ok(Value::$ctor($a.wrapping_rem($b))),
                    _ => unreachable!("comparisons handled above"),
                }
            };
        }
        macro_rules! float_arith {
            ($a:expr, $b:expr, $ctor:ident) => {
                match op {
                    Add => Ok(Value::$ctor(($a + $b).into())),
                    Sub => Ok(Value::$ctor(($a - $b).into())),
                    Mul => Ok(Value::$ctor(($a * $b).into())),
                    Div if $b == 0.0 => Err(EvalError::DivisionByZero { span }),
                    Div => Ok(Value::$ctor(($a / $b).into())),
                    Rem if $b == 0.0 => Err(EvalError::DivisionByZero { span }),
                    Rem => Ok(Value::$ctor(($a % $b).into())),
                    _ => unreachable!("comparisons handled above"),
                }
            };
        }
        match (l, r) {
            (Value::Int8(a), Value::Int8(b)) => int_arith!(a, b, Int8),
            (Value::Int16(a), Value::Int16(b)) => int_arith!(a, b, Int16),
            (Value::Int32(a), Value::Int32(b)) => int_arith!(a, b, Int32),
            (Value::Int64(a), Value::Int64(b)) => int_arith!(a, b, Int64),
            (Value::BigInt(a), Value::BigInt(b)) => big_arith(op, a, b, span),
            (Value::Float32(a), Value::Float32(b)) => float_arith!(a.0, b.0, Float32),
            (Value::Float64(a), Value::Float64(b)) => float_arith!(a.0, b.0, Float64),
            _ => Err(EvalError::Unsupported {
                what: "arithmetic on non-numeric values",
                span,
            }),
        }
    }
}

fn big_arith(op: BinOp, a: BigInt, b: BigInt, span: Span) -> Result<Value, EvalError> {
    use BinOp::*;
    let zero = BigInt::from(0);
    match op {
        Add => Ok(Value::BigInt(a + b)),
        Sub => Ok(Value::BigInt(a - b)),
        Mul => Ok(Value::BigInt(a * b)),
        Div => {
            if b == zero {
                Err(EvalError::DivisionByZero { span })
            } else {
                Ok(Value::BigInt(a / b))
            }
        }
        Rem => {
            if b == zero {
                Err(EvalError::DivisionByZero { span })
            } else {
                Ok(Value::BigInt(a % b))
            }
        }
        _ => unreachable!("comparisons handled above"),
    }
}

/// Try to match `value` against `pat`, binding pattern variables into `env`.
/// The caller truncates the environment on failure.
pub fn match_pat(pat: &Pat, value: &Value, env: &mut Env<'_>) -> bool {
    match (pat, value) {
        (Pat::Wild, _) => true,
        (Pat::Var(name), v) => {
            env.push(name.clone(), v.clone());
            true
        }
        (Pat::Lit(lit), v) => &Value::from(lit) == v,
        (Pat::Tag { tag, pat, .. }, Value::Tag(_, vtag, payload)) => {
            tag == vtag && match_pat(pat, payload, env)
        }
        (Pat::Tuple(pats), Value::Tuple(vals)) if pats.len() == vals.len() => pats
            .iter()
            .zip(vals)
            .all(|(p, v)| match_pat(p, v, env)),
        _ => false,
    }
}
