// ==============================================================================
// SMT-LIB encoding of the IR
// ==============================================================================
//
// Sorts: Bool and Str map directly, sized integers to bit-vectors, BigInt
// to Int, floats to Real (an approximation), chars to 32-bit vectors,
// nullary-tag enums to finite enumerations, everything else to an
// uninterpreted sort. Definitions become `define-fun`s in dependency
// order; recursion and constructs without a first-order reading surface as
// `Unencodable`, which the verifier reports as inconclusive.

use std::collections::BTreeMap;

use lang_ast::{BinOp, LatOp, Literal, QualName, UnaryOp};
use lang_check::ir::{self, Exp, ExpKind, Pat};
use lang_ty::Ty;
use smol_str::SmolStr;

use crate::backend::{FunDef, SortDecl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unencodable {
    pub reason: String,
}

impl Unencodable {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Unencodable {
            reason: reason.into(),
        }
    }
}

type Enc<T> = Result<T, Unencodable>;

pub struct Encoder<'ir> {
    root: &'ir ir::Root,
    sorts: BTreeMap<String, SortDecl>,
    funs: Vec<FunDef>,
    fun_names: BTreeMap<QualName, String>,
    /// Definitions currently being encoded, for recursion detection.
    encoding: Vec<QualName>,
    fresh: u32,
}

impl<'ir> Encoder<'ir> {
    pub fn new(root: &'ir ir::Root) -> Self {
        Encoder {
            root,
            sorts: BTreeMap::new(),
            funs: Vec::new(),
            fun_names: BTreeMap::new(),
            encoding: Vec::new(),
            fresh: 0,
        }
    }

    pub fn finish(self) -> (Vec<SortDecl>, Vec<FunDef>) {
        (self.sorts.into_values().collect(), self.funs)
    }

    // ==========================================================================
    // Sorts
    // ==========================================================================

    pub fn sort(&mut self, ty: &Ty) -> Enc<String> {
        Ok(match ty {
            Ty::Bool => "Bool".to_string(),
            Ty::Int8 => "(_ BitVec 8)".to_string(),
            Ty::Int16 => "(_ BitVec 16)".to_string(),
            Ty::Int32 => "(_ BitVec 32)".to_string(),
            Ty::Int64 => "(_ BitVec 64)".to_string(),
            Ty::Char => "(_ BitVec 32)".to_string(),
            Ty::BigInt => "Int".to_string(),
            Ty::Float32 | Ty::Float64 => "Real".to_string(),
            Ty::Str => "String".to_string(),
            Ty::Unit => {
                self.ensure_enum_sort("Unit", &["unit".to_string()]);
                "Unit".to_string()
            }
            Ty::Enum { name, cases } => {
                if cases.values().any(|payload| *payload != Ty::Unit) {
                    return Err(Unencodable::new(format!(
                        "enum `{name}` carries payloads and has no finite encoding"
                    )));
                }
                let sort_name = mangle(name);
                let elems: Vec<String> = cases
                    .keys()
                    .map(|tag| ctor_name(name, tag))
                    .collect();
                self.ensure_enum_sort(&sort_name, &elems);
                sort_name
            }
            Ty::Native(name) => {
                let sort_name = mangle(name);
                self.ensure_opaque_sort(&sort_name);
                sort_name
            }
            Ty::Tuple(_) | Ty::Lambda { .. } | Ty::Parametric { .. } | Ty::Var(_) => {
                return Err(Unencodable::new(format!(
                    "type `{ty}` has no first-order sort"
                )));
            }
        })
    }

    fn ensure_enum_sort(&mut self, name: &str, elems: &[String]) {
        self.sorts.entry(name.to_string()).or_insert_with(|| SortDecl {
            name: name.to_string(),
            elems: elems.to_vec(),
        });
    }

    fn ensure_opaque_sort(&mut self, name: &str) {
        self.sorts.entry(name.to_string()).or_insert_with(|| SortDecl {
            name: name.to_string(),
            elems: Vec::new(),
        });
    }

    // ==========================================================================
    // Definitions
    // ==========================================================================

    /// Encode a definition (and everything it calls) as `define-fun`s,
    /// returning the SMT function name.
    pub fn def(&mut self, name: &QualName) -> Enc<String> {
        if let Some(encoded) = self.fun_names.get(name) {
            return Ok(encoded.clone());
        }
        if self.encoding.contains(name) {
            return Err(Unencodable::new(format!(
                "definition `{name}` is recursive"
            )));
        }
        let def = self
            .root
            .defs
            .get(name)
            .ok_or_else(|| Unencodable::new(format!("`{name}` is not a definition")))?;

        self.encoding.push(name.clone());
        let result = (|| {
            let mut params = Vec::with_capacity(def.params.len());
            let mut env: Vec<(SmolStr, String)> = Vec::new();
            for (p, ty) in &def.params {
                let sort = self.sort(ty)?;
                let smt_name = format!("|{p}|");
                env.push((p.clone(), smt_name.clone()));
                params.push((smt_name, sort));
            }
            let ret = self.sort(&def.ret)?;
            let body = self.exp(&def.body, &mut env)?;
            Ok((params, ret, body))
        })();
        self.encoding.pop();

        let (params, ret, body) = result?;
        let fun_name = mangle(name);
        self.funs.push(FunDef {
            name: fun_name.clone(),
            params,
            ret,
            body,
        });
        self.fun_names.insert(name.clone(), fun_name.clone());
        Ok(fun_name)
    }

    /// Apply a lattice-instance operator expression to encoded arguments.
    pub fn apply_op(&mut self, op: &Exp, args: &[String]) -> Enc<String> {
        match &op.kind {
            ExpKind::Def(name) => {
                let fun = self.def(name)?;
                Ok(app(&fun, args))
            }
            ExpKind::Lambda { params, body } => {
                let mut env: Vec<(SmolStr, String)> = params
                    .iter()
                    .zip(args)
                    .map(|((p, _), a)| (p.clone(), a.clone()))
                    .collect();
                self.exp(body, &mut env)
            }
            // A constant component (bot/top as expressions).
            _ if args.is_empty() => self.exp(op, &mut Vec::new()),
            _ => Err(Unencodable::new(
                "lattice component is not a definition or lambda",
            )),
        }
    }

    /// Encode a constant component expression (bot/top).
    pub fn constant(&mut self, exp: &Exp) -> Enc<String> {
        self.exp(exp, &mut Vec::new())
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    pub fn exp(&mut self, exp: &Exp, env: &mut Vec<(SmolStr, String)>) -> Enc<String> {
        match &exp.kind {
            ExpKind::Lit(lit) => self.literal(lit),
            ExpKind::Var(name) => env
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, smt)| smt.clone())
                .ok_or_else(|| Unencodable::new(format!("unbound variable `{name}`"))),
            ExpKind::Def(name) => {
                // A bare definition reference in operand position only makes
                // sense applied; the apply case handles it.
                Err(Unencodable::new(format!(
                    "first-class reference to `{name}`"
                )))
            }
            ExpKind::LatOp { op, elem } => {
                let inst = self
                    .root
                    .lattice_of(elem)
                    .ok_or_else(|| Unencodable::new(format!("no instance for `{elem}`")))?;
                match op {
                    LatOp::Bot => self.constant(&inst.bot),
                    LatOp::Top => self.constant(&inst.top),
                    _ => Err(Unencodable::new("first-class lattice operator")),
                }
            }
            ExpKind::Lambda { .. } => Err(Unencodable::new("first-class lambda")),
            ExpKind::Apply { fun, args } => {
                let mut encoded_args = Vec::with_capacity(args.len());
                for a in args {
                    encoded_args.push(self.exp(a, env)?);
                }
                match &fun.kind {
                    ExpKind::Def(name) => {
                        let f = self.def(name)?;
                        Ok(app(&f, &encoded_args))
                    }
                    ExpKind::LatOp { op, elem } => {
                        let inst = self
                            .root
                            .lattice_of(elem)
                            .ok_or_else(|| {
                                Unencodable::new(format!("no instance for `{elem}`"))
                            })?
                            .clone();
                        match op {
                            LatOp::Bot => self.constant(&inst.bot),
                            LatOp::Top => self.constant(&inst.top),
                            LatOp::Leq => self.apply_op(&inst.leq, &encoded_args),
                            LatOp::Lub => self.apply_op(&inst.lub, &encoded_args),
                            LatOp::Glb => self.apply_op(&inst.glb, &encoded_args),
                            LatOp::Widen | LatOp::Narrow => match &inst.widen {
                                Some(w) => self.apply_op(w, &encoded_args),
                                None => Err(Unencodable::new("no widening operator")),
                            },
                        }
                    }
                    ExpKind::Lambda { params, body } => {
                        let mark = env.len();
                        for ((p, _), a) in params.iter().zip(&encoded_args) {
                            env.push((p.clone(), a.clone()));
                        }
                        let out = self.exp(body, env);
                        env.truncate(mark);
                        out
                    }
                    _ => Err(Unencodable::new("higher-order application")),
                }
            }
            ExpKind::Unary { op, exp: inner } => {
                let e = self.exp(inner, env)?;
                match (op, &inner.ty) {
                    (UnaryOp::Not, _) => Ok(app("not", &[e])),
                    (UnaryOp::Plus, _) => Ok(e),
                    (UnaryOp::Minus, ty) if ty.is_integral() && *ty != Ty::BigInt => {
                        Ok(app("bvneg", &[e]))
                    }
                    (UnaryOp::Minus, _) => Ok(app("-", &[e])),
                }
            }
            ExpKind::Binary { op, lhs, rhs } => {
                let l = self.exp(lhs, env)?;
                let r = self.exp(rhs, env)?;
                self.binary(*op, &lhs.ty, l, r)
            }
            ExpKind::IfThenElse {
                cond,
                then_body,
                else_body,
            } => {
                let c = self.exp(cond, env)?;
                let t = self.exp(then_body, env)?;
                let e = self.exp(else_body, env)?;
                Ok(app("ite", &[c, t, e]))
            }
            ExpKind::Let { name, value, body } => {
                let v = self.exp(value, env)?;
                let smt_name = self.fresh_name(name);
                env.push((name.clone(), smt_name.clone()));
                let b = self.exp(body, env);
                env.pop();
                Ok(format!("(let (({smt_name} {v})) {b})", b = b?))
            }
            ExpKind::Match { scrutinee, arms } => self.encode_match(scrutinee, arms, env),
            ExpKind::Tag { enum_name, tag, payload } => {
                if payload.ty != Ty::Unit {
                    return Err(Unencodable::new(format!(
                        "constructor `{tag}` carries a payload"
                    )));
                }
                // Make sure the sort (and its constants) exist.
                self.sort(&exp.ty)?;
                Ok(ctor_name(enum_name, tag))
            }
            ExpKind::Ascribe(inner) => self.exp(inner, env),
            ExpKind::Exists { params, body } => self.quant("exists", params, body, env),
            ExpKind::Forall { params, body } => self.quant("forall", params, body, env),
            ExpKind::Tuple(_)
            | ExpKind::OptLit(_)
            | ExpKind::ListLit(_)
            | ExpKind::VecLit(_)
            | ExpKind::SetLit(_)
            | ExpKind::MapLit(_) => Err(Unencodable::new(
                "collection values have no first-order encoding",
            )),
            ExpKind::UserError => Err(Unencodable::new("user error in a law body")),
        }
    }

    fn quant(
        &mut self,
        kind: &str,
        params: &[(SmolStr, Ty)],
        body: &Exp,
        env: &mut Vec<(SmolStr, String)>,
    ) -> Enc<String> {
        let mut decls = String::new();
        let mark = env.len();
        for (p, ty) in params {
            let sort = self.sort(ty)?;
            let smt_name = self.fresh_name(p);
            decls.push_str(&format!("({smt_name} {sort}) "));
            env.push((p.clone(), smt_name));
        }
        let b = self.exp(body, env);
        env.truncate(mark);
        Ok(format!("({kind} ({}) {})", decls.trim_end(), b?))
    }

    /// Matches compile to ite chains. Supported scrutinee shapes: an
    /// arbitrary term matched by tag/literal/variable patterns, and a
    /// syntactic tuple matched component-wise.
    fn encode_match(
        &mut self,
        scrutinee: &Exp,
        arms: &[(Pat, Exp)],
        env: &mut Vec<(SmolStr, String)>,
    ) -> Enc<String> {
        let mut cases: Vec<(String, String)> = Vec::new();
        let mut default: Option<String> = None;
        for (pat, body) in arms {
            let mut binds: Vec<(SmolStr, String)> = Vec::new();
            let cond = self.pat_condition(pat, scrutinee, env, &mut binds)?;
            let mark = env.len();
            env.extend(binds);
            let b = self.exp(body, env);
            env.truncate(mark);
            let b = b?;
            if cond == "true" {
                default = Some(b);
                break;
            }
            cases.push((cond, b));
        }
        // A match with no irrefutable arm still needs a final expression;
        // the simplifier guarantees exhaustiveness, so the last case can
        // serve as the residual branch.
        let mut out = match default {
            Some(d) => d,
            None => {
                let (_, last) = cases.pop().ok_or_else(|| {
                    Unencodable::new("match with no encodable arms")
                })?;
                last
            }
        };
        for (cond, body) in cases.into_iter().rev() {
            out = app("ite", &[cond, body, out]);
        }
        Ok(out)
    }

    /// The boolean condition under which `pat` matches `scrutinee`, plus
    /// the variable bindings it introduces.
    fn pat_condition(
        &mut self,
        pat: &Pat,
        scrutinee: &Exp,
        env: &mut Vec<(SmolStr, String)>,
        binds: &mut Vec<(SmolStr, String)>,
    ) -> Enc<String> {
        match pat {
            Pat::Wild => Ok("true".to_string()),
            Pat::Var(name) => {
                let term = self.exp(scrutinee, env)?;
                binds.push((name.clone(), term));
                Ok("true".to_string())
            }
            Pat::Lit(Literal::Unit) => Ok("true".to_string()),
            Pat::Lit(lit) => {
                let term = self.exp(scrutinee, env)?;
                let value = self.literal(lit)?;
                Ok(app("=", &[term, value]))
            }
            Pat::Tag { enum_name, tag, pat } => {
                if !matches!(**pat, Pat::Wild | Pat::Lit(Literal::Unit)) {
                    return Err(Unencodable::new(format!(
                        "pattern on `{tag}` destructures a payload"
                    )));
                }
                self.sort(&scrutinee.ty)?;
                let term = self.exp(scrutinee, env)?;
                Ok(app("=", &[term, ctor_name(enum_name, tag)]))
            }
            Pat::Tuple(pats) => {
                // Component-wise on a syntactic tuple scrutinee.
                let ExpKind::Tuple(elems) = &scrutinee.kind else {
                    return Err(Unencodable::new(
                        "tuple pattern over a non-tuple scrutinee",
                    ));
                };
                if elems.len() != pats.len() {
                    return Err(Unencodable::new("tuple pattern arity mismatch"));
                }
                let mut conds = Vec::new();
                for (p, e) in pats.iter().zip(elems) {
                    let c = self.pat_condition(p, e, env, binds)?;
                    if c != "true" {
                        conds.push(c);
                    }
                }
                Ok(match conds.len() {
                    0 => "true".to_string(),
                    1 => conds.pop().expect("len checked"),
                    _ => app("and", &conds),
                })
            }
        }
    }

    // ==========================================================================
    // Primitives
    // ==========================================================================

    fn literal(&mut self, lit: &Literal) -> Enc<String> {
        Ok(match lit {
            Literal::Unit => {
                self.ensure_enum_sort("Unit", &["unit".to_string()]);
                "unit".to_string()
            }
            Literal::Bool(b) => b.to_string(),
            Literal::Char(c) => format!("(_ bv{} 32)", *c as u32),
            Literal::Int8(n) => bv(*n as i128, 8),
            Literal::Int16(n) => bv(*n as i128, 16),
            Literal::Int32(n) => bv(*n as i128, 32),
            Literal::Int64(n) => bv(*n as i128, 64),
            Literal::BigInt(n) => {
                if n.sign() == num_bigint::Sign::Minus {
                    format!("(- {})", n.magnitude())
                } else {
                    n.to_string()
                }
            }
            Literal::Float32(f) => real(f.0 as f64),
            Literal::Float64(f) => real(f.0),
            Literal::Str(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        })
    }

    fn binary(&mut self, op: BinOp, operand_ty: &Ty, l: String, r: String) -> Enc<String> {
        let bitvec = operand_ty.is_integral() && *operand_ty != Ty::BigInt;
        let name = match (op, bitvec) {
            (BinOp::Add, true) => "bvadd",
            (BinOp::Sub, true) => "bvsub",
            (BinOp::Mul, true) => "bvmul",
            (BinOp::Div, true) => "bvsdiv",
            (BinOp::Rem, true) => "bvsrem",
            (BinOp::Lt, true) => "bvslt",
            (BinOp::Le, true) => "bvsle",
            (BinOp::Gt, true) => "bvsgt",
            (BinOp::Ge, true) => "bvsge",
            (BinOp::Add, false) => "+",
            (BinOp::Sub, false) => "-",
            (BinOp::Mul, false) => "*",
            (BinOp::Div, false) => {
                if *operand_ty == Ty::BigInt {
                    "div"
                } else {
                    "/"
                }
            }
            (BinOp::Rem, false) => "mod",
            (BinOp::Lt, false) => "<",
            (BinOp::Le, false) => "<=",
            (BinOp::Gt, false) => ">",
            (BinOp::Ge, false) => ">=",
            (BinOp::Eq, _) => "=",
            (BinOp::NotEq, _) => return Ok(app("not", &[app("=", &[l, r])])),
            (BinOp::And, _) => "and",
            (BinOp::Or, _) => "or",
        };
        Ok(app(name, &[l, r]))
    }

    fn fresh_name(&mut self, base: &SmolStr) -> String {
        self.fresh += 1;
        format!("|{base}~{}|", self.fresh)
    }
}

fn app(fun: &str, args: &[String]) -> String {
    if args.is_empty() {
        return fun.to_string();
    }
    format!("({fun} {})", args.join(" "))
}

fn bv(n: i128, width: u32) -> String {
    let mask = if width == 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    };
    format!("(_ bv{} {width})", (n as u128) & mask)
}

fn real(x: f64) -> String {
    if x < 0.0 {
        format!("(- {:?})", -x)
    } else {
        format!("{x:?}")
    }
}

/// Fully qualified names mangle with dots, which plain SMT symbols allow.
pub fn mangle(name: &QualName) -> String {
    name.segments().join(".")
}

pub fn ctor_name(enum_name: &QualName, tag: &str) -> String {
    format!("{}.{tag}", mangle(enum_name))
}
