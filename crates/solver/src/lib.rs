// The Datalog-with-lattices solver: a runtime value model, a term
// evaluator over the frozen IR, indexed table stores, and the semi-naive
// fixpoint loop (with a naive twin kept for differential testing).

pub mod eval;
mod fixpoint;
pub mod table;
pub mod value;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use lang_ast::QualName;

pub use eval::{Env, EvalError, Interpreter};
pub use fixpoint::{solve, solve_naive, SolverError};
pub use table::AccessPlan;
pub use value::Value;

#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Hard cap on fixpoint rounds per stratum; exceeding it is
    /// `SolverError::NonTerminating`.
    pub iteration_cap: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            iteration_cap: 10_000,
        }
    }
}

/// The final per-table fact sets, deterministically ordered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fixpoint {
    pub relations: BTreeMap<QualName, BTreeSet<Vec<Value>>>,
    pub lattices: BTreeMap<QualName, BTreeMap<Vec<Value>, Value>>,
}

impl Fixpoint {
    pub fn relation(&self, name: &str) -> Option<&BTreeSet<Vec<Value>>> {
        self.relations.get(&QualName::simple(name))
    }

    pub fn lattice(&self, name: &str) -> Option<&BTreeMap<Vec<Value>, Value>> {
        self.lattices.get(&QualName::simple(name))
    }
}
