// ==============================================================================
// Semi-naive fixpoint
// ==============================================================================
//
// Seed facts, then per stratum: fire every rule whose body mentions a table
// with a non-empty delta, restricted so at least one body atom reads from a
// delta. Candidate rows stage during the round and are applied at the round
// boundary under the lattice-aware insertion rule, after which the deltas
// swap. Rule firing order is declaration order; within a rule the delta
// atom is evaluated first and the remaining atoms left to right. The final
// fact sets are order-independent (joins commute); diagnostics are not, so
// everything here iterates deterministically.

use std::collections::BTreeMap;

use lang_ast::{QualName, Span};
use lang_check::ir::{self, BodyAtom, Constraint, Table, Term};
use lang_ty::Ty;
use petgraph::graph::DiGraph;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::eval::{match_pat, Env, EvalError, Interpreter};
use crate::table::{LatticeState, RelationState, TableState};
use crate::value::Value;
use crate::{Fixpoint, SolverOptions};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("fixpoint did not stabilize within {cap} iterations")]
    NonTerminating {
        cap: usize,
        /// The tables as of the last completed round.
        partial: Box<Fixpoint>,
        /// The rows derived in the last round, per table.
        last_delta: BTreeMap<QualName, Vec<Vec<Value>>>,
    },

    #[error("cannot join values of type `{ty}` into table `{table}`")]
    LatticeJoinTypeMismatch { table: QualName, ty: Ty },

    #[error("user error reached while deriving facts")]
    UserError { span: Span },

    #[error(transparent)]
    Eval(EvalError),
}

impl From<EvalError> for SolverError {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::UserError { span } => SolverError::UserError { span },
            other => SolverError::Eval(other),
        }
    }
}

/// Evaluate a program to its least fixpoint, semi-naively.
pub fn solve(root: &ir::Root, opts: &SolverOptions) -> Result<Fixpoint, SolverError> {
    Solver::new(root, opts)?.run(false)
}

/// The naive reference evaluator: every round fires every rule against the
/// full stores. Kept for differential testing against the semi-naive loop.
pub fn solve_naive(root: &ir::Root, opts: &SolverOptions) -> Result<Fixpoint, SolverError> {
    Solver::new(root, opts)?.run(true)
}

/// One lattice table's interpretation, with bot evaluated once.
struct LatOps {
    value_ty: Ty,
    bot: Value,
}

struct Solver<'ir> {
    root: &'ir ir::Root,
    interp: Interpreter<'ir>,
    opts: SolverOptions,
    tables: BTreeMap<QualName, TableState>,
    lat_ops: BTreeMap<QualName, LatOps>,
    /// Rules grouped by stratum, declaration order preserved inside each.
    strata: Vec<Vec<&'ir Constraint>>,
}

impl<'ir> Solver<'ir> {
    fn new(root: &'ir ir::Root, opts: &SolverOptions) -> Result<Self, SolverError> {
        let interp = Interpreter::new(root);
        let mut tables = BTreeMap::new();
        let mut lat_ops = BTreeMap::new();
        for (name, table) in &root.tables {
            match table {
                Table::Relation { .. } => {
                    let empty = Vec::new();
                    let keys = root.indexes.get(name).unwrap_or(&empty);
                    tables.insert(name.clone(), TableState::Rel(RelationState::new(keys)));
                }
                Table::Lattice { value, .. } => {
                    let value_ty = value.1.clone();
                    let inst = root.lattices.get(&value_ty).ok_or_else(|| {
                        SolverError::LatticeJoinTypeMismatch {
                            table: name.clone(),
                            ty: value_ty.clone(),
                        }
                    })?;
                    let bot = interp
                        .eval(&inst.bot, &mut Env::new())
                        .map_err(SolverError::from)?;
                    lat_ops.insert(name.clone(), LatOps { value_ty, bot });
                    tables.insert(name.clone(), TableState::Lat(LatticeState::new()));
                }
            }
        }
        let strata = stratify(root);
        Ok(Solver {
            root,
            interp,
            opts: opts.clone(),
            tables,
            lat_ops,
            strata,
        })
    }

    fn run(mut self, naive: bool) -> Result<Fixpoint, SolverError> {
        self.seed_facts()?;

        let strata = std::mem::take(&mut self.strata);
        for stratum in &strata {
            // Deltas start as the full current contents of every table the
            // stratum reads, so cross-stratum inputs count as fresh once.
            self.reset_deltas_to_full();
            let mut iterations = 0usize;
            let mut first_round = true;
            loop {
                let any_delta = self
                    .tables
                    .values()
                    .any(|t| !t.delta_is_empty());
                if !any_delta && !first_round {
                    break;
                }
                if iterations >= self.opts.iteration_cap {
                    return Err(self.non_terminating());
                }
                iterations += 1;

                for rule in stratum {
                    if naive {
                        self.fire(rule, None)?;
                    } else {
                        let delta_positions = self.delta_atom_positions(rule);
                        if delta_positions.is_empty() && first_round {
                            // A body without table atoms fires once.
                            if !rule_has_table_atom(rule) {
                                self.fire(rule, None)?;
                            }
                        }
                        for pos in delta_positions {
                            self.fire(rule, Some(pos))?;
                        }
                    }
                }
                let progressed = self.apply_round()?;
                first_round = false;
                if !progressed && naive {
                    break;
                }
            }
        }

        Ok(self.snapshot())
    }

    // ==========================================================================
    // Seeding
    // ==========================================================================

    fn seed_facts(&mut self) -> Result<(), SolverError> {
        let empty = FxHashMap::default();
        for fact in &self.root.facts {
            let mut row = Vec::with_capacity(fact.head.terms.len());
            let mut env = Env::with_base(&empty);
            for term in &fact.head.terms {
                row.push(self.interp.eval(term, &mut env).map_err(SolverError::from)?);
            }
            self.stage(&fact.head.table, row);
        }
        self.apply_round()?;
        Ok(())
    }

    fn reset_deltas_to_full(&mut self) {
        for state in self.tables.values_mut() {
            match state {
                TableState::Rel(rel) => {
                    rel.delta = rel.rows().to_vec();
                }
                TableState::Lat(lat) => {
                    lat.delta = lat.map.clone();
                }
            }
        }
    }

    // ==========================================================================
    // Rule firing
    // ==========================================================================

    /// Positions of table atoms whose table currently has a non-empty delta.
    fn delta_atom_positions(&self, rule: &Constraint) -> Vec<usize> {
        rule.body
            .iter()
            .enumerate()
            .filter_map(|(i, atom)| match atom {
                BodyAtom::Atom { table, .. } => {
                    let state = self.tables.get(table)?;
                    (!state.delta_is_empty()).then_some(i)
                }
                _ => None,
            })
            .collect()
    }

    /// Evaluate one rule. With `delta_pos`, the atom at that position reads
    /// from its table's delta and is evaluated first; the remaining body
    /// atoms follow in declaration order.
    fn fire(&mut self, rule: &Constraint, delta_pos: Option<usize>) -> Result<(), SolverError> {
        let mut order: Vec<usize> = Vec::with_capacity(rule.body.len());
        if let Some(p) = delta_pos {
            order.push(p);
        }
        order.extend((0..rule.body.len()).filter(|i| Some(*i) != delta_pos));

        let mut env: FxHashMap<SmolStr, Value> = FxHashMap::default();
        let mut staged: Vec<(QualName, Vec<Value>)> = Vec::new();
        self.join(rule, &order, 0, delta_pos, &mut env, &mut staged)?;
        for (table, row) in staged {
            self.stage(&table, row);
        }
        Ok(())
    }

    /// Depth-first join over the ordered body atoms; on success evaluates
    /// the head under the accumulated bindings.
    fn join(
        &self,
        rule: &Constraint,
        order: &[usize],
        depth: usize,
        delta_pos: Option<usize>,
        env: &mut FxHashMap<SmolStr, Value>,
        staged: &mut Vec<(QualName, Vec<Value>)>,
    ) -> Result<(), SolverError> {
        if depth == order.len() {
            return self.derive_head(rule, env, staged);
        }
        let atom = &rule.body[order[depth]];
        match atom {
            BodyAtom::Atom { table, terms, .. } => {
                let state = self
                    .tables
                    .get(table)
                    .expect("typing resolved every table");
                let from_delta = delta_pos == Some(order[depth]);

                let bound: Vec<(usize, Value)> = terms
                    .iter()
                    .enumerate()
                    .filter_map(|(i, t)| match t {
                        Term::Lit(lit) => Some((i, Value::from(lit))),
                        Term::Var(v) => env.get(v).map(|val| (i, val.clone())),
                        Term::Wild => None,
                    })
                    .collect();

                let rows: Vec<Vec<Value>> = match state {
                    TableState::Rel(rel) => {
                        let hits = if from_delta {
                            rel.select_delta(&bound)
                        } else {
                            rel.select(&bound)
                        };
                        hits.into_iter().cloned().collect()
                    }
                    TableState::Lat(lat) => {
                        let iter: Vec<Vec<Value>> = if from_delta {
                            lat.delta_rows().collect()
                        } else {
                            lat.rows().collect()
                        };
                        iter.into_iter()
                            .filter(|row| bound.iter().all(|(p, v)| &row[*p] == v))
                            .collect()
                    }
                };

                for row in rows {
                    let mut bindings: Vec<SmolStr> = Vec::new();
                    let mut ok = true;
                    for (term, value) in terms.iter().zip(&row) {
                        match term {
                            Term::Wild => {}
                            Term::Lit(lit) => {
                                if &Value::from(lit) != value {
                                    ok = false;
                                    break;
                                }
                            }
                            Term::Var(v) => match env.get(v) {
                                Some(existing) => {
                                    if existing != value {
                                        ok = false;
                                        break;
                                    }
                                }
                                None => {
                                    env.insert(v.clone(), value.clone());
                                    bindings.push(v.clone());
                                }
                            },
                        }
                    }
                    if ok {
                        self.join(rule, order, depth + 1, delta_pos, env, staged)?;
                    }
                    for b in bindings {
                        env.remove(&b);
                    }
                }
                Ok(())
            }
            BodyAtom::Alias { var, exp, .. } => {
                let value = match self.eval_term(exp, env) {
                    Ok(v) => v,
                    Err(EvalError::DivisionByZero { .. }) => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                match env.get(var) {
                    Some(existing) if *existing != value => Ok(()),
                    Some(_) => self.join(rule, order, depth + 1, delta_pos, env, staged),
                    None => {
                        env.insert(var.clone(), value);
                        let out = self.join(rule, order, depth + 1, delta_pos, env, staged);
                        env.remove(var);
                        out
                    }
                }
            }
            BodyAtom::NotEqual { lhs, rhs, span } => {
                let l = env.get(lhs).cloned().ok_or(EvalError::UnboundVar {
                    name: lhs.clone(),
                    span: *span,
                })?;
                let r = env.get(rhs).cloned().ok_or(EvalError::UnboundVar {
                    name: rhs.clone(),
                    span: *span,
                })?;
                if l != r {
                    self.join(rule, order, depth + 1, delta_pos, env, staged)?;
                }
                Ok(())
            }
            BodyAtom::Loop { var, exp, .. } => {
                let value = match self.eval_term(exp, env) {
                    Ok(v) => v,
                    Err(EvalError::DivisionByZero { .. }) => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                let Value::Set(elems) = value else {
                    return Err(SolverError::Eval(EvalError::Unsupported {
                        what: "looping over a non-set value",
                        span: atom.span(),
                    }));
                };
                for elem in elems {
                    match env.get(var) {
                        Some(existing) if *existing != elem => continue,
                        Some(_) => {
                            self.join(rule, order, depth + 1, delta_pos, env, staged)?;
                        }
                        None => {
                            env.insert(var.clone(), elem);
                            self.join(rule, order, depth + 1, delta_pos, env, staged)?;
                            env.remove(var);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn derive_head(
        &self,
        rule: &Constraint,
        env: &FxHashMap<SmolStr, Value>,
        staged: &mut Vec<(QualName, Vec<Value>)>,
    ) -> Result<(), SolverError> {
        let mut row = Vec::with_capacity(rule.head.terms.len());
        for term in &rule.head.terms {
            match self.eval_term(term, env) {
                Ok(v) => row.push(v),
                // A zero divisor in a head term abstracts to bottom; the
                // insertion rule would suppress it, so the row is dropped.
                Err(EvalError::DivisionByZero { .. }) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
        staged.push((rule.head.table.clone(), row));
        Ok(())
    }

    fn eval_term(
        &self,
        exp: &ir::Exp,
        env: &FxHashMap<SmolStr, Value>,
    ) -> Result<Value, EvalError> {
        let mut eval_env = Env::with_base(env);
        self.interp.eval(exp, &mut eval_env)
    }

    // ==========================================================================
    // Staging and round application
    // ==========================================================================

    fn stage(&mut self, table: &QualName, row: Vec<Value>) {
        match self.tables.get_mut(table).expect("typing resolved tables") {
            TableState::Rel(rel) => rel.staged.push(row),
            TableState::Lat(lat) => {
                let mut row = row;
                let value = row.pop().expect("lattice rows have a value column");
                lat.staged.push((row, value));
            }
        }
    }

    /// Apply the staged candidates: relational set-insert, lattice join at
    /// key. New deltas replace the old ones. Returns whether anything
    /// changed.
    fn apply_round(&mut self) -> Result<bool, SolverError> {
        let mut progressed = false;
        let names: Vec<QualName> = self.tables.keys().cloned().collect();
        for name in names {
            let is_lattice = matches!(self.tables[&name], TableState::Lat(_));
            if !is_lattice {
                let TableState::Rel(rel) = self.tables.get_mut(&name).expect("known table")
                else {
                    unreachable!("table kind is stable");
                };
                let staged = std::mem::take(&mut rel.staged);
                let mut new_delta = Vec::new();
                for row in staged {
                    if rel.insert(row.clone()) {
                        new_delta.push(row);
                    }
                }
                progressed |= !new_delta.is_empty();
                rel.delta = new_delta;
                continue;
            }

            // Lattice table: pull the staged candidates out, join without
            // holding the table borrow, then write the result back.
            let (staged, mut work) = {
                let TableState::Lat(lat) = self.tables.get_mut(&name).expect("known table")
                else {
                    unreachable!("table kind is stable");
                };
                (std::mem::take(&mut lat.staged), lat.map.clone())
            };
            let mut new_delta = FxHashMap::default();
            let ops = self.lat_ops.get(&name).expect("lattice ops registered");
            for (key, value) in staged {
                // Bottom insertions are suppressed outright.
                if self
                    .interp
                    .lat_leq(&ops.value_ty, &value, &ops.bot, Span::DUMMY)?
                {
                    continue;
                }
                let current = work.get(&key).cloned();
                let joined = match &current {
                    Some(cur) => self.interp.lat_lub(&ops.value_ty, cur, &value, Span::DUMMY)?,
                    None => value.clone(),
                };
                // No progress when the join stays below the stored value.
                if let Some(cur) = &current {
                    if self
                        .interp
                        .lat_leq(&ops.value_ty, &joined, cur, Span::DUMMY)?
                    {
                        continue;
                    }
                }
                work.insert(key.clone(), joined.clone());
                // The delta keeps one row per key: the latest join.
                new_delta.insert(key, joined);
            }
            let TableState::Lat(lat) = self.tables.get_mut(&name).expect("known table") else {
                unreachable!("table kind is stable");
            };
            progressed |= !new_delta.is_empty();
            lat.map = work;
            lat.delta = new_delta;
        }
        Ok(progressed)
    }

    // ==========================================================================
    // Results
    // ==========================================================================

    fn snapshot(&self) -> Fixpoint {
        let mut relations = BTreeMap::new();
        let mut lattices = BTreeMap::new();
        for (name, state) in &self.tables {
            match state {
                TableState::Rel(rel) => {
                    relations.insert(name.clone(), rel.rows().iter().cloned().collect());
                }
                TableState::Lat(lat) => {
                    lattices.insert(
                        name.clone(),
                        lat.map
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    );
                }
            }
        }
        Fixpoint {
            relations,
            lattices,
        }
    }

    fn non_terminating(&self) -> SolverError {
        let mut last_delta = BTreeMap::new();
        for (name, state) in &self.tables {
            let rows: Vec<Vec<Value>> = match state {
                TableState::Rel(rel) => rel.delta.clone(),
                TableState::Lat(lat) => lat.delta_rows().collect(),
            };
            if !rows.is_empty() {
                last_delta.insert(name.clone(), rows);
            }
        }
        SolverError::NonTerminating {
            cap: self.opts.iteration_cap,
            partial: Box::new(self.snapshot()),
            last_delta,
        }
    }
}

fn rule_has_table_atom(rule: &Constraint) -> bool {
    rule.body
        .iter()
        .any(|a| matches!(a, BodyAtom::Atom { .. }))
}

/// Group rules into strata: tables are graph nodes, a rule adds edges from
/// every body table to its head table, and the condensation's topological
/// order gives the evaluation order. With neither negation nor aggregation
/// the program is always stratifiable; the grouping bounds how long deltas
/// stay live and keeps diagnostics in declaration order.
fn stratify(root: &ir::Root) -> Vec<Vec<&Constraint>> {
    let mut graph: DiGraph<&QualName, ()> = DiGraph::new();
    let mut nodes = BTreeMap::new();
    for name in root.tables.keys() {
        nodes.insert(name, graph.add_node(name));
    }
    for rule in &root.rules {
        let Some(&head) = nodes.get(&rule.head.table) else {
            continue;
        };
        for atom in &rule.body {
            if let BodyAtom::Atom { table, .. } = atom {
                if let Some(&body) = nodes.get(table) {
                    graph.update_edge(body, head, ());
                }
            }
        }
    }

    // Tarjan yields SCCs in reverse topological order; evaluation wants
    // body strata before the strata that read them, so walk it backwards.
    let sccs = petgraph::algo::tarjan_scc(&graph);
    let mut stratum_of: BTreeMap<QualName, usize> = BTreeMap::new();
    for (i, scc) in sccs.iter().rev().enumerate() {
        for node in scc {
            stratum_of.insert((*graph[*node]).clone(), i);
        }
    }

    let mut strata: Vec<Vec<&Constraint>> = vec![Vec::new(); sccs.len().max(1)];
    for rule in &root.rules {
        let stratum = stratum_of.get(&rule.head.table).copied().unwrap_or(0);
        strata[stratum].push(rule);
    }
    strata.retain(|s| !s.is_empty());
    if strata.is_empty() {
        strata.push(Vec::new());
    }
    strata
}
