// The type model shared by the typer, the solver, and the verifier.
// Deliberately small: one enum, constructors from literals, and the helpers
// inference needs to walk and substitute. After typing, no `Var` remains in
// exported declarations.

use std::collections::BTreeMap;
use std::fmt;

use derive_more::Debug;
use lang_ast::{Literal, QualName};
use smol_str::SmolStr;

/// A type variable. Fresh variables are handed out by the typer's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[debug("TyVar({_0})")]
pub struct TyVar(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ty {
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
    Tuple(Vec<Ty>),
    #[debug("Enum({name})")]
    Enum {
        name: QualName,
        /// Tag name to payload type.
        cases: BTreeMap<SmolStr, Ty>,
    },
    Lambda {
        params: Vec<Ty>,
        ret: Box<Ty>,
    },
    Parametric {
        name: QualName,
        args: Vec<Ty>,
    },
    /// A nominal opaque type referenced by fully qualified name.
    Native(QualName),
    Var(TyVar),
}

impl Ty {
    /// The built-in parametric collection types.
    pub fn opt(elem: Ty) -> Ty {
        Ty::Parametric {
            name: QualName::simple("Opt"),
            args: vec![elem],
        }
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::Parametric {
            name: QualName::simple("List"),
            args: vec![elem],
        }
    }

    pub fn vector(elem: Ty) -> Ty {
        Ty::Parametric {
            name: QualName::simple("Vec"),
            args: vec![elem],
        }
    }

    pub fn set(elem: Ty) -> Ty {
        Ty::Parametric {
            name: QualName::simple("Set"),
            args: vec![elem],
        }
    }

    pub fn map(key: Ty, value: Ty) -> Ty {
        Ty::Parametric {
            name: QualName::simple("Map"),
            args: vec![key, value],
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Ty::Int8 | Ty::Int16 | Ty::Int32 | Ty::Int64 | Ty::BigInt | Ty::Float32 | Ty::Float64
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Ty::Int8 | Ty::Int16 | Ty::Int32 | Ty::Int64 | Ty::BigInt
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Ty::Float32 | Ty::Float64)
    }

    /// True when no type variable occurs anywhere in the type.
    pub fn is_ground(&self) -> bool {
        match self {
            Ty::Var(_) => false,
            Ty::Tuple(tys) => tys.iter().all(Ty::is_ground),
            Ty::Enum { cases, .. } => cases.values().all(Ty::is_ground),
            Ty::Lambda { params, ret } => params.iter().all(Ty::is_ground) && ret.is_ground(),
            Ty::Parametric { args, .. } => args.iter().all(Ty::is_ground),
            _ => true,
        }
    }

    /// Whether `var` occurs in this type (the occurs check of unification).
    pub fn occurs(&self, var: TyVar) -> bool {
        match self {
            Ty::Var(v) => *v == var,
            Ty::Tuple(tys) => tys.iter().any(|t| t.occurs(var)),
            Ty::Enum { cases, .. } => cases.values().any(|t| t.occurs(var)),
            Ty::Lambda { params, ret } => params.iter().any(|t| t.occurs(var)) || ret.occurs(var),
            Ty::Parametric { args, .. } => args.iter().any(|t| t.occurs(var)),
            _ => false,
        }
    }

    /// Apply `subst` everywhere, leaving unmapped variables in place.
    pub fn apply(&self, subst: &BTreeMap<TyVar, Ty>) -> Ty {
        match self {
            Ty::Var(v) => match subst.get(v) {
                // The substitution may itself map to a variable chain.
                Some(t) => t.apply(subst),
                None => self.clone(),
            },
            Ty::Tuple(tys) => Ty::Tuple(tys.iter().map(|t| t.apply(subst)).collect()),
            Ty::Enum { name, cases } => Ty::Enum {
                name: name.clone(),
                cases: cases
                    .iter()
                    .map(|(k, v)| (k.clone(), v.apply(subst)))
                    .collect(),
            },
            Ty::Lambda { params, ret } => Ty::Lambda {
                params: params.iter().map(|t| t.apply(subst)).collect(),
                ret: Box::new(ret.apply(subst)),
            },
            Ty::Parametric { name, args } => Ty::Parametric {
                name: name.clone(),
                args: args.iter().map(|t| t.apply(subst)).collect(),
            },
            other => other.clone(),
        }
    }
}

impl From<&Literal> for Ty {
    fn from(value: &Literal) -> Self {
        match value {
            Literal::Unit => Ty::Unit,
            Literal::Bool(_) => Ty::Bool,
            Literal::Char(_) => Ty::Char,
            Literal::Int8(_) => Ty::Int8,
            Literal::Int16(_) => Ty::Int16,
            Literal::Int32(_) => Ty::Int32,
            Literal::Int64(_) => Ty::Int64,
            Literal::BigInt(_) => Ty::BigInt,
            Literal::Float32(_) => Ty::Float32,
            Literal::Float64(_) => Ty::Float64,
            Literal::Str(_) => Ty::Str,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Unit => write!(f, "Unit"),
            Ty::Bool => write!(f, "Bool"),
            Ty::Char => write!(f, "Char"),
            Ty::Int8 => write!(f, "Int8"),
            Ty::Int16 => write!(f, "Int16"),
            Ty::Int32 => write!(f, "Int32"),
            Ty::Int64 => write!(f, "Int64"),
            Ty::BigInt => write!(f, "BigInt"),
            Ty::Float32 => write!(f, "Float32"),
            Ty::Float64 => write!(f, "Float64"),
            Ty::Str => write!(f, "Str"),
            Ty::Tuple(tys) => {
                write!(f, "(")?;
                for (i, t) in tys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Ty::Enum { name, .. } => write!(f, "{name}"),
            Ty::Lambda { params, ret } => {
                write!(f, "(")?;
                for (i, t) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ") -> {ret}")
            }
            Ty::Parametric { name, args } => {
                write!(f, "{name}[")?;
                for (i, t) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
            Ty::Native(name) => write!(f, "#{name}"),
            Ty::Var(v) => write!(f, "'{}", v.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_types() {
        assert_eq!(Ty::from(&Literal::Bool(true)), Ty::Bool);
        assert_eq!(Ty::from(&Literal::Int32(1)), Ty::Int32);
        assert_eq!(Ty::from(&Literal::Unit), Ty::Unit);
    }

    #[test]
    fn occurs_check_sees_through_structure() {
        let v = TyVar(3);
        let ty = Ty::Lambda {
            params: vec![Ty::Int32],
            ret: Box::new(Ty::Tuple(vec![Ty::Bool, Ty::Var(v)])),
        };
        assert!(ty.occurs(v));
        assert!(!ty.occurs(TyVar(4)));
    }

    #[test]
    fn apply_follows_chains() {
        let mut subst = BTreeMap::new();
        subst.insert(TyVar(0), Ty::Var(TyVar(1)));
        subst.insert(TyVar(1), Ty::Int64);
        assert_eq!(Ty::Var(TyVar(0)).apply(&subst), Ty::Int64);
    }

    #[test]
    fn ground_after_full_substitution() {
        let mut subst = BTreeMap::new();
        subst.insert(TyVar(0), Ty::Str);
        let ty = Ty::Tuple(vec![Ty::Var(TyVar(0)), Ty::Bool]);
        assert!(!ty.is_ground());
        assert!(ty.apply(&subst).is_ground());
    }

    #[test]
    fn display_forms() {
        assert_eq!(
            Ty::Tuple(vec![Ty::Int32, Ty::Bool]).to_string(),
            "(Int32, Bool)"
        );
        let lam = Ty::Lambda {
            params: vec![Ty::Int32],
            ret: Box::new(Ty::Bool),
        };
        assert_eq!(lam.to_string(), "(Int32) -> Bool");
    }
}
