// ==============================================================================
// SMT backend
// ==============================================================================
//
// The verifier core is backend-agnostic: it produces `Query` values and a
// backend answers sat/unsat/unknown. The shipped implementation drives an
// external Z3 process over SMT-LIB 2 through rsmt2; one solver process per
// query, released when the `Solver` drops, so every exit path cleans up.

use std::path::PathBuf;
use std::time::Duration;

use rsmt2::parse::{IdentParser, ModelParser};
use rsmt2::{SmtConf, SmtRes, Solver};
use thiserror::Error;

/// One closed satisfiability question. `asserts` already contains the
/// negation of the law under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub name: String,
    /// Sorts to declare. An empty constructor list is an uninterpreted
    /// sort; a non-empty one is a finite enumeration (nullary tags).
    pub sorts: Vec<SortDecl>,
    /// Free constants (the skolemized law variables).
    pub consts: Vec<(String, String)>,
    /// Function definitions, dependency order.
    pub funs: Vec<FunDef>,
    pub asserts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDecl {
    pub name: String,
    pub elems: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunDef {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub ret: String,
    pub body: String,
}

/// A counter-example assignment, identifier to value text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model(pub Vec<(String, String)>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtOutcome {
    Unsat,
    Sat(Model),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("smt backend failure: {0}")]
pub struct BackendError(pub String);

pub trait SmtBackend {
    fn check(&mut self, query: &Query) -> Result<SmtOutcome, BackendError>;
}

// ==============================================================================
// Z3 over rsmt2
// ==============================================================================

pub struct Z3Backend {
    cmd: PathBuf,
    timeout: Option<Duration>,
}

impl Z3Backend {
    pub fn new(cmd: PathBuf, timeout: Option<Duration>) -> Self {
        Z3Backend { cmd, timeout }
    }
}

#[derive(Clone, Copy)]
struct Parser;

impl<'a> IdentParser<String, String, &'a str> for Parser {
    fn parse_ident(self, input: &'a str) -> SmtRes<String> {
        Ok(input.to_string())
    }
    fn parse_type(self, input: &'a str) -> SmtRes<String> {
        Ok(input.to_string())
    }
}

impl<'a> ModelParser<String, String, String, &'a str> for Parser {
    fn parse_value(
        self,
        input: &'a str,
        _ident: &String,
        _params: &[(String, String)],
        _typ: &String,
    ) -> SmtRes<String> {
        Ok(input.to_string())
    }
}

impl SmtBackend for Z3Backend {
    fn check(&mut self, query: &Query) -> Result<SmtOutcome, BackendError> {
        let mut conf = SmtConf::z3(self.cmd.to_string_lossy().to_string());
        if let Some(timeout) = self.timeout {
            conf.option(format!("-t:{}", timeout.as_millis()));
        }
        conf.models();

        let mut solver =
            Solver::new(conf, Parser).map_err(|e| BackendError(e.to_string()))?;
        run_query(&mut solver, query).map_err(|e| BackendError(e.to_string()))
    }
}

fn run_query(solver: &mut Solver<Parser>, query: &Query) -> SmtRes<SmtOutcome> {
    for sort in &query.sorts {
        solver.declare_sort(sort.name.as_str(), 0)?;
        if sort.elems.is_empty() {
            continue;
        }
        // A finite enumeration: distinct constants covering the sort.
        for elem in &sort.elems {
            solver.declare_const(elem.as_str(), sort.name.as_str())?;
        }
        if sort.elems.len() > 1 {
            let all = sort.elems.join(" ");
            solver.assert(format!("(distinct {all})").as_str())?;
        }
        let cover = sort
            .elems
            .iter()
            .map(|e| format!("(= |enum-universe| {e})"))
            .collect::<Vec<_>>()
            .join(" ");
        solver.assert(
            format!(
                "(forall ((|enum-universe| {})) (or {cover}))",
                sort.name
            )
            .as_str(),
        )?;
    }
    for (name, sort) in &query.consts {
        solver.declare_const(name.as_str(), sort.as_str())?;
    }
    for fun in &query.funs {
        let args: Vec<(&str, &str)> = fun
            .params
            .iter()
            .map(|(n, s)| (n.as_str(), s.as_str()))
            .collect();
        solver.define_fun(
            fun.name.as_str(),
            &args,
            fun.ret.as_str(),
            fun.body.as_str(),
        )?;
    }
    for assert in &query.asserts {
        solver.assert(assert.as_str())?;
    }

    match solver.check_sat_or_unk()? {
        Some(true) => {
            let model = solver.get_model()?;
            let assignments = model
                .into_iter()
                .map(|(ident, _, _, value)| (ident, value))
                .collect();
            Ok(SmtOutcome::Sat(Model(assignments)))
        }
        Some(false) => Ok(SmtOutcome::Unsat),
        None => Ok(SmtOutcome::Unknown("solver returned unknown".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drives a real Z3 binary; run with `cargo test -- --ignored` when one
    /// is on PATH.
    #[test]
    #[ignore]
    fn z3_answers_a_trivial_query() {
        let mut backend = Z3Backend::new(PathBuf::from("z3"), None);
        let query = Query {
            name: "trivial".to_string(),
            consts: vec![("x".to_string(), "Int".to_string())],
            asserts: vec!["(and (> x 0) (< x 0))".to_string()],
            ..Query::default()
        };
        assert_eq!(backend.check(&query).unwrap(), SmtOutcome::Unsat);
    }
}
