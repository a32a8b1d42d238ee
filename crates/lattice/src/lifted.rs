// Lifted constructors: ways of building new lattices out of old ones.

use std::collections::{BTreeMap, BTreeSet};

use crate::{JoinSemiLattice, MeetSemiLattice, PartialOrder};

/// `Lifted<E>` adds a fresh bottom below every element of `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifted<E> {
    Bot,
    Elem(E),
}

impl<E: PartialOrder> PartialOrder for Lifted<E> {
    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (Lifted::Bot, _) => true,
            (Lifted::Elem(_), Lifted::Bot) => false,
            (Lifted::Elem(a), Lifted::Elem(b)) => a.leq(b),
        }
    }
}

impl<E: JoinSemiLattice + Clone> JoinSemiLattice for Lifted<E> {
    fn lub(&self, other: &Self) -> Self {
        match (self, other) {
            (Lifted::Bot, x) | (x, Lifted::Bot) => x.clone(),
            (Lifted::Elem(a), Lifted::Elem(b)) => Lifted::Elem(a.lub(b)),
        }
    }
}

impl<E: MeetSemiLattice + Clone> MeetSemiLattice for Lifted<E> {
    fn glb(&self, other: &Self) -> Self {
        match (self, other) {
            (Lifted::Bot, _) | (_, Lifted::Bot) => Lifted::Bot,
            (Lifted::Elem(a), Lifted::Elem(b)) => Lifted::Elem(a.glb(b)),
        }
    }
}

/// Finite sets ordered by inclusion; join is union, meet is intersection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SubsetSet<T: Ord>(pub BTreeSet<T>);

impl<T: Ord + Clone> SubsetSet<T> {
    pub fn empty() -> Self {
        SubsetSet(BTreeSet::new())
    }

    pub fn singleton(elem: T) -> Self {
        SubsetSet(BTreeSet::from([elem]))
    }
}

impl<T: Ord + Clone> PartialOrder for SubsetSet<T> {
    fn leq(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl<T: Ord + Clone> JoinSemiLattice for SubsetSet<T> {
    fn lub(&self, other: &Self) -> Self {
        SubsetSet(self.0.union(&other.0).cloned().collect())
    }
}

impl<T: Ord + Clone> MeetSemiLattice for SubsetSet<T> {
    fn glb(&self, other: &Self) -> Self {
        SubsetSet(self.0.intersection(&other.0).cloned().collect())
    }
}

/// Maps compared pointwise on the keys of the left operand; a key missing
/// on the right means the left is not below the right. An absent key reads
/// as the value lattice's implicit bottom, so join keeps unmatched entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PointwiseMap<K: Ord, V>(pub BTreeMap<K, V>);

impl<K: Ord + Clone, V: PartialOrder> PartialOrder for PointwiseMap<K, V> {
    fn leq(&self, other: &Self) -> bool {
        self.0.iter().all(|(k, v)| match other.0.get(k) {
            Some(w) => v.leq(w),
            None => false,
        })
    }
}

impl<K: Ord + Clone, V: JoinSemiLattice + Clone> JoinSemiLattice for PointwiseMap<K, V> {
    fn lub(&self, other: &Self) -> Self {
        let mut out = self.0.clone();
        for (k, w) in &other.0 {
            out.entry(k.clone())
                .and_modify(|v| *v = v.lub(w))
                .or_insert_with(|| w.clone());
        }
        PointwiseMap(out)
    }
}

impl<K: Ord + Clone, V: MeetSemiLattice + Clone> MeetSemiLattice for PointwiseMap<K, V> {
    fn glb(&self, other: &Self) -> Self {
        let mut out = BTreeMap::new();
        for (k, v) in &self.0 {
            if let Some(w) = other.0.get(k) {
                out.insert(k.clone(), v.glb(w));
            }
        }
        PointwiseMap(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifted_bot_is_below_everything() {
        let bot: Lifted<bool> = Lifted::Bot;
        assert!(bot.leq(&Lifted::Elem(false)));
        assert!(bot.leq(&Lifted::Elem(true)));
        assert!(!Lifted::Elem(false).leq(&bot));
    }

    #[test]
    fn lifted_join_absorbs_bot() {
        let bot: Lifted<bool> = Lifted::Bot;
        assert_eq!(bot.lub(&Lifted::Elem(true)), Lifted::Elem(true));
        assert_eq!(Lifted::Elem(false).glb(&bot), bot);
    }

    #[test]
    fn sets_order_by_inclusion() {
        let a = SubsetSet(BTreeSet::from([1, 2]));
        let b = SubsetSet(BTreeSet::from([1, 2, 3]));
        assert!(a.leq(&b));
        assert!(!b.leq(&a));
        assert_eq!(a.lub(&b).0.len(), 3);
        assert_eq!(a.glb(&b).0.len(), 2);
    }

    #[test]
    fn maps_compare_on_left_keys() {
        let a = PointwiseMap(BTreeMap::from([("k", false)]));
        let b = PointwiseMap(BTreeMap::from([("k", true), ("extra", false)]));
        assert!(a.leq(&b));
        // Key missing on the right: not below.
        assert!(!b.leq(&a));
    }

    #[test]
    fn map_join_keeps_unmatched_keys() {
        let a = PointwiseMap(BTreeMap::from([("x", false)]));
        let b = PointwiseMap(BTreeMap::from([("y", true)]));
        let j = a.lub(&b);
        assert_eq!(j.0.len(), 2);
    }
}
