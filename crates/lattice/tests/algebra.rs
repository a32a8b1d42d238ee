// Property suites for the algebra: partial-order laws, semilattice laws,
// absorption, and strict height decrease along strictly increasing chains.

use std::collections::BTreeSet;

use lattice::{
    BoundedLattice, JoinSemiLattice, Lifted, MeetSemiLattice, PartialOrder, SubsetSet,
};
use proptest::prelude::*;

fn subset_set() -> impl Strategy<Value = SubsetSet<u8>> {
    proptest::collection::btree_set(0u8..8, 0..6).prop_map(SubsetSet)
}

fn lifted_pair() -> impl Strategy<Value = Lifted<(bool, bool)>> {
    prop_oneof![
        Just(Lifted::Bot),
        (any::<bool>(), any::<bool>()).prop_map(Lifted::Elem),
    ]
}

proptest! {
    #[test]
    fn leq_reflexive(a in subset_set()) {
        prop_assert!(a.leq(&a));
    }

    #[test]
    fn leq_antisymmetric(a in subset_set(), b in subset_set()) {
        if a.leq(&b) && b.leq(&a) {
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn leq_transitive(a in subset_set(), b in subset_set(), c in subset_set()) {
        if a.leq(&b) && b.leq(&c) {
            prop_assert!(a.leq(&c));
        }
    }

    #[test]
    fn lub_commutative(a in subset_set(), b in subset_set()) {
        prop_assert_eq!(a.lub(&b), b.lub(&a));
    }

    #[test]
    fn lub_associative(a in subset_set(), b in subset_set(), c in subset_set()) {
        prop_assert_eq!(a.lub(&b).lub(&c), a.lub(&b.lub(&c)));
    }

    #[test]
    fn lub_idempotent(a in subset_set()) {
        prop_assert_eq!(a.lub(&a), a);
    }

    #[test]
    fn lub_is_upper_bound(a in subset_set(), b in subset_set()) {
        let j = a.lub(&b);
        prop_assert!(a.leq(&j));
        prop_assert!(b.leq(&j));
    }

    #[test]
    fn glb_commutative(a in subset_set(), b in subset_set()) {
        prop_assert_eq!(a.glb(&b), b.glb(&a));
    }

    #[test]
    fn glb_associative(a in subset_set(), b in subset_set(), c in subset_set()) {
        prop_assert_eq!(a.glb(&b).glb(&c), a.glb(&b.glb(&c)));
    }

    #[test]
    fn glb_idempotent(a in subset_set()) {
        prop_assert_eq!(a.glb(&a), a);
    }

    #[test]
    fn absorption(a in subset_set(), b in subset_set()) {
        prop_assert_eq!(a.glb(&a.lub(&b)), a);
    }

    #[test]
    fn lifted_laws_hold_for_products(a in lifted_pair(), b in lifted_pair()) {
        prop_assert_eq!(a.lub(&b), b.lub(&a));
        let j = a.lub(&b);
        prop_assert!(a.leq(&j));
        prop_assert!(b.leq(&j));
        prop_assert_eq!(a.glb(&j), a);
    }

    #[test]
    fn height_strictly_decreases_upward(a in any::<(bool, bool)>(), b in any::<(bool, bool)>()) {
        // x ⊑ y ∧ x ≠ y ⇒ h(x) > h(y)
        if a.leq(&b) && a != b {
            prop_assert!(a.height() > b.height());
        }
    }
}

#[test]
fn powerset_bounds() {
    let empty: SubsetSet<u8> = SubsetSet::empty();
    let s = SubsetSet(BTreeSet::from([1u8, 2]));
    assert!(empty.leq(&s));
    assert_eq!(empty.lub(&s), s);
    assert_eq!(empty.glb(&s), empty);
}
