// ==============================================================================
// Table stores
// ==============================================================================
//
// Each relation holds its fact set plus one hash map per declared index;
// lattice tables hold a single joined value per key. Deltas are double
// buffered: candidate rows stage during a round and become the next delta
// when the round is applied, so no table observes its own updates within a
// round.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::value::Value;

/// One declared index: the attribute positions forming the lookup key and
/// the map from key tuples to row buckets.
#[derive(Debug, Clone, Default)]
pub struct IndexMap {
    pub positions: Vec<usize>,
    map: FxHashMap<Vec<Value>, Vec<Vec<Value>>>,
}

impl IndexMap {
    fn new(positions: Vec<usize>) -> Self {
        IndexMap {
            positions,
            map: FxHashMap::default(),
        }
    }

    fn key_of(&self, row: &[Value]) -> Vec<Value> {
        self.positions.iter().map(|&p| row[p].clone()).collect()
    }

    fn insert(&mut self, row: &[Value]) {
        self.map.entry(self.key_of(row)).or_default().push(row.to_vec());
    }

    pub fn bucket(&self, key: &[Value]) -> &[Vec<Value>] {
        self.map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// How an atom lookup will be answered; exposed so index selection is
/// directly testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPlan {
    /// Use the index at this position in the declaration list.
    Index(usize),
    /// No usable index: full scan.
    Scan,
}

#[derive(Debug, Clone, Default)]
pub struct RelationState {
    rows: Vec<Vec<Value>>,
    seen: FxHashSet<Vec<Value>>,
    pub indexes: Vec<IndexMap>,
    pub delta: Vec<Vec<Value>>,
    /// Rows staged during the current round.
    pub staged: Vec<Vec<Value>>,
}

impl RelationState {
    pub fn new(index_keys: &[Vec<usize>]) -> Self {
        RelationState {
            rows: Vec::new(),
            seen: FxHashSet::default(),
            indexes: index_keys.iter().cloned().map(IndexMap::new).collect(),
            delta: Vec::new(),
            staged: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn contains(&self, row: &[Value]) -> bool {
        self.seen.contains(row)
    }

    /// Insert a row; true if it was new. Live indexes accumulate as rows
    /// arrive.
    pub fn insert(&mut self, row: Vec<Value>) -> bool {
        if self.seen.contains(&row) {
            return false;
        }
        for index in &mut self.indexes {
            index.insert(&row);
        }
        self.seen.insert(row.clone());
        self.rows.push(row);
        true
    }

    /// Pick the most selective declared index whose key positions are all
    /// bound. Selectivity is key width; ties break by declaration order.
    pub fn plan(&self, bound: &[usize]) -> AccessPlan {
        let mut best: Option<(usize, usize)> = None;
        for (i, index) in self.indexes.iter().enumerate() {
            if !index.positions.iter().all(|p| bound.contains(p)) {
                continue;
            }
            let width = index.positions.len();
            let better = match best {
                None => true,
                Some((_, best_width)) => width > best_width,
            };
            if better {
                best = Some((i, width));
            }
        }
        match best {
            Some((i, _)) => AccessPlan::Index(i),
            None => AccessPlan::Scan,
        }
    }

    /// Rows matching the bound positions, answered through `plan`.
    pub fn select(&self, bound: &[(usize, Value)]) -> Vec<&Vec<Value>> {
        let bound_positions: Vec<usize> = bound.iter().map(|(p, _)| *p).collect();
        match self.plan(&bound_positions) {
            AccessPlan::Index(i) => {
                let index = &self.indexes[i];
                let key: Vec<Value> = index
                    .positions
                    .iter()
                    .map(|p| {
                        bound
                            .iter()
                            .find(|(bp, _)| bp == p)
                            .map(|(_, v)| v.clone())
                            .expect("plan covers only bound positions")
                    })
                    .collect();
                index
                    .bucket(&key)
                    .iter()
                    .filter(|row| row_matches(row, bound))
                    .collect()
            }
            AccessPlan::Scan => self
                .rows
                .iter()
                .filter(|row| row_matches(row, bound))
                .collect(),
        }
    }

    /// Delta rows matching the bound positions; always a scan, the delta is
    /// small and short-lived.
    pub fn select_delta(&self, bound: &[(usize, Value)]) -> Vec<&Vec<Value>> {
        self.delta
            .iter()
            .filter(|row| row_matches(row, bound))
            .collect()
    }
}

fn row_matches(row: &[Value], bound: &[(usize, Value)]) -> bool {
    bound.iter().all(|(p, v)| &row[*p] == v)
}

#[derive(Debug, Clone, Default)]
pub struct LatticeState {
    pub map: FxHashMap<Vec<Value>, Value>,
    pub delta: FxHashMap<Vec<Value>, Value>,
    /// Key/value candidates staged during the current round.
    pub staged: Vec<(Vec<Value>, Value)>,
}

impl LatticeState {
    pub fn new() -> Self {
        LatticeState::default()
    }

    pub fn get(&self, key: &[Value]) -> Option<&Value> {
        self.map.get(key)
    }

    /// All rows as key-then-value tuples.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        self.map.iter().map(|(k, v)| {
            let mut row = k.clone();
            row.push(v.clone());
            row
        })
    }

    pub fn delta_rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        self.delta.iter().map(|(k, v)| {
            let mut row = k.clone();
            row.push(v.clone());
            row
        })
    }
}

#[derive(Debug, Clone)]
pub enum TableState {
    Rel(RelationState),
    Lat(LatticeState),
}

impl TableState {
    pub fn delta_is_empty(&self) -> bool {
        match self {
            TableState::Rel(r) => r.delta.is_empty(),
            TableState::Lat(l) => l.delta.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[i32]) -> Vec<Value> {
        values.iter().map(|&n| Value::Int32(n)).collect()
    }

    /// S5 — table R(a, b, c) with index [[a, b], [c]].
    fn indexed_relation() -> RelationState {
        let mut rel = RelationState::new(&[vec![0, 1], vec![2]]);
        rel.insert(row(&[1, 2, 3]));
        rel.insert(row(&[1, 2, 7]));
        rel.insert(row(&[4, 2, 7]));
        rel
    }

    #[test]
    fn bound_prefix_selects_widest_index() {
        let rel = indexed_relation();
        // R(1, 2, _): both columns of [a, b] bound.
        assert_eq!(rel.plan(&[0, 1]), AccessPlan::Index(0));
    }

    #[test]
    fn single_bound_column_selects_matching_index() {
        let rel = indexed_relation();
        // R(_, _, 7): only c bound.
        assert_eq!(rel.plan(&[2]), AccessPlan::Index(1));
    }

    #[test]
    fn uncovered_binding_falls_back_to_scan() {
        let rel = indexed_relation();
        // R(_, 2, _): no index key is fully bound.
        assert_eq!(rel.plan(&[1]), AccessPlan::Scan);
    }

    #[test]
    fn select_returns_matching_rows() {
        let rel = indexed_relation();
        let hits = rel.select(&[(0, Value::Int32(1)), (1, Value::Int32(2))]);
        assert_eq!(hits.len(), 2);
        let hits = rel.select(&[(2, Value::Int32(7))]);
        assert_eq!(hits.len(), 2);
        let hits = rel.select(&[(1, Value::Int32(2))]);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut rel = RelationState::new(&[]);
        assert!(rel.insert(row(&[1])));
        assert!(!rel.insert(row(&[1])));
        assert_eq!(rel.rows().len(), 1);
    }

    #[test]
    fn ties_break_by_declaration_order() {
        // Two single-column indexes on the same column: first one wins.
        let rel = RelationState::new(&[vec![0], vec![0]]);
        assert_eq!(rel.plan(&[0]), AccessPlan::Index(0));
    }
}
