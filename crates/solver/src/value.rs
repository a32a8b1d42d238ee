// The runtime value model. Everything is `Ord + Hash` so rows can live in
// hash and tree containers; floats go through `OrderedFloat` and closures
// compare structurally on their captured body and environment.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use lang_ast::{Literal, QualName};
use lang_check::ir;
use num_bigint::BigInt;
use ordered_float::OrderedFloat;
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Unit,
    Bool(bool),
    Char(char),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    BigInt(BigInt),
    Float32(OrderedFloat<f32>),
    Float64(OrderedFloat<f64>),
    Str(SmolStr),
    Tag(QualName, SmolStr, Box<Value>),
    Tuple(Vec<Value>),
    Opt(Option<Box<Value>>),
    Lst(Vec<Value>),
    Vector(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<Value, Value>),
    Closure(Closure),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Closure {
    pub params: Vec<SmolStr>,
    pub body: Arc<ir::Exp>,
    pub env: Vec<(SmolStr, Value)>,
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Unit => Value::Unit,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Char(c) => Value::Char(*c),
            Literal::Int8(n) => Value::Int8(*n),
            Literal::Int16(n) => Value::Int16(*n),
            Literal::Int32(n) => Value::Int32(*n),
            Literal::Int64(n) => Value::Int64(*n),
            Literal::BigInt(n) => Value::BigInt(n.clone()),
            Literal::Float32(f) => Value::Float32(*f),
            Literal::Float64(f) => Value::Float64(*f),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Int8(n) => write!(f, "{n}"),
            Value::Int16(n) => write!(f, "{n}"),
            Value::Int32(n) => write!(f, "{n}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::Float32(x) => write!(f, "{x}"),
            Value::Float64(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Tag(enum_name, tag, payload) => {
                write!(f, "{}.{tag}", enum_name.leaf())?;
                if **payload != Value::Unit {
                    write!(f, "({payload})")?;
                }
                Ok(())
            }
            Value::Tuple(elms) => {
                write!(f, "(")?;
                for (i, v) in elms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Value::Opt(None) => write!(f, "None"),
            Value::Opt(Some(v)) => write!(f, "Some({v})"),
            Value::Lst(elms) => {
                write!(f, "[")?;
                for (i, v) in elms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Vector(elms) => {
                write!(f, "#[")?;
                for (i, v) in elms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Set(elms) => {
                write!(f, "#{{")?;
                for (i, v) in elms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Value::Map(elms) => {
                write!(f, "@{{")?;
                for (i, (k, v)) in elms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                write!(f, "}}")
            }
            Value::Closure(_) => write!(f, "<fn>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_convert() {
        assert_eq!(Value::from(&Literal::Int32(7)), Value::Int32(7));
        assert_eq!(Value::from(&Literal::Unit), Value::Unit);
    }

    #[test]
    fn display_forms() {
        let tag = Value::Tag(QualName::simple("Sign"), "Pos".into(), Box::new(Value::Unit));
        assert_eq!(tag.to_string(), "Sign.Pos");
        let tup = Value::Tuple(vec![Value::Int32(1), Value::Bool(true)]);
        assert_eq!(tup.to_string(), "(1, true)");
    }

    #[test]
    fn values_order_deterministically() {
        let mut set = BTreeSet::new();
        set.insert(Value::Int32(2));
        set.insert(Value::Int32(1));
        let collected: Vec<_> = set.into_iter().collect();
        assert_eq!(collected, vec![Value::Int32(1), Value::Int32(2)]);
    }
}
