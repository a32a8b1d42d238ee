// Lattice algebra: the contracts every lattice-valued domain satisfies, a
// handful of lifted constructors, and the catalogue of classes and laws the
// verifier discharges. The solver never calls these traits directly (user
// lattices are interpreted IR), but the catalogue is the single source of
// truth for which laws apply to which class.

mod laws;
mod lifted;

pub use laws::{laws_of, ClassKind, LawKind};
pub use lifted::{Lifted, PointwiseMap, SubsetSet};

/// A partial order on `E`.
///
/// Laws: reflexivity, antisymmetry, transitivity.
pub trait PartialOrder {
    fn leq(&self, other: &Self) -> bool;
}

/// A join-semilattice: every pair of elements has a least upper bound.
///
/// Laws: `lub` is commutative, associative, idempotent, and an upper bound
/// of both arguments.
pub trait JoinSemiLattice: PartialOrder {
    fn lub(&self, other: &Self) -> Self;
}

/// A meet-semilattice, the dual of [`JoinSemiLattice`].
pub trait MeetSemiLattice: PartialOrder {
    fn glb(&self, other: &Self) -> Self;
}

/// Both join and meet, related by absorption: `glb(x, lub(x, y)) = x`.
pub trait Lattice: JoinSemiLattice + MeetSemiLattice {}

impl<T: JoinSemiLattice + MeetSemiLattice> Lattice for T {}

/// A lattice with bottom and top and a non-negative height function that
/// strictly decreases along strictly increasing chains, which bounds every
/// ascending chain.
pub trait BoundedLattice: Lattice {
    fn bot() -> Self;
    fn top() -> Self;
    fn height(&self) -> u64;
}

/// A widening operator for lattices without bounded height:
/// `x ⊑ (x ▽ y)` and `y ⊑ (x ▽ y)`, and any chain
/// `x₀, x₀ ▽ x₁, (x₀ ▽ x₁) ▽ x₂, …` stabilizes.
pub trait Widening: JoinSemiLattice {
    fn widen(&self, other: &Self) -> Self;
}

// ==============================================================================
// Primitive instances
// ==============================================================================

impl PartialOrder for bool {
    fn leq(&self, other: &Self) -> bool {
        !*self || *other
    }
}

impl JoinSemiLattice for bool {
    fn lub(&self, other: &Self) -> Self {
        *self || *other
    }
}

impl MeetSemiLattice for bool {
    fn glb(&self, other: &Self) -> Self {
        *self && *other
    }
}

impl BoundedLattice for bool {
    fn bot() -> Self {
        false
    }
    fn top() -> Self {
        true
    }
    fn height(&self) -> u64 {
        // Height decreases upward: bot is the tallest element.
        if *self {
            0
        } else {
            1
        }
    }
}

impl PartialOrder for u64 {
    fn leq(&self, other: &Self) -> bool {
        self <= other
    }
}

impl JoinSemiLattice for u64 {
    fn lub(&self, other: &Self) -> Self {
        (*self).max(*other)
    }
}

impl MeetSemiLattice for u64 {
    fn glb(&self, other: &Self) -> Self {
        (*self).min(*other)
    }
}

// ==============================================================================
// Product instances — pointwise on components
// ==============================================================================

impl<A: PartialOrder, B: PartialOrder> PartialOrder for (A, B) {
    fn leq(&self, other: &Self) -> bool {
        self.0.leq(&other.0) && self.1.leq(&other.1)
    }
}

impl<A: JoinSemiLattice, B: JoinSemiLattice> JoinSemiLattice for (A, B) {
    fn lub(&self, other: &Self) -> Self {
        (self.0.lub(&other.0), self.1.lub(&other.1))
    }
}

impl<A: MeetSemiLattice, B: MeetSemiLattice> MeetSemiLattice for (A, B) {
    fn glb(&self, other: &Self) -> Self {
        (self.0.glb(&other.0), self.1.glb(&other.1))
    }
}

impl<A: BoundedLattice, B: BoundedLattice> BoundedLattice for (A, B) {
    fn bot() -> Self {
        (A::bot(), B::bot())
    }
    fn top() -> Self {
        (A::top(), B::top())
    }
    fn height(&self) -> u64 {
        self.0.height() + self.1.height()
    }
}

// ==============================================================================
// Option instance — pointwise, None below Some
// ==============================================================================

impl<E: PartialOrder> PartialOrder for Option<E> {
    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => a.leq(b),
        }
    }
}

impl<E: JoinSemiLattice + Clone> JoinSemiLattice for Option<E> {
    fn lub(&self, other: &Self) -> Self {
        match (self, other) {
            (None, x) | (x, None) => x.clone(),
            (Some(a), Some(b)) => Some(a.lub(b)),
        }
    }
}

impl<E: MeetSemiLattice + Clone> MeetSemiLattice for Option<E> {
    fn glb(&self, other: &Self) -> Self {
        match (self, other) {
            (None, _) | (_, None) => None,
            (Some(a), Some(b)) => Some(a.glb(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_is_the_two_point_lattice() {
        assert!(bool::bot().leq(&bool::top()));
        assert!(!bool::top().leq(&bool::bot()));
        assert_eq!(false.lub(&true), true);
        assert_eq!(false.glb(&true), false);
        assert!(bool::bot().height() > bool::top().height());
    }

    #[test]
    fn pair_orders_pointwise() {
        let a = (false, 3u64);
        let b = (true, 5u64);
        assert!(a.leq(&b));
        assert!(!b.leq(&a));
        assert_eq!(a.lub(&b), (true, 5));
        assert_eq!(a.glb(&b), (false, 3));
    }

    #[test]
    fn option_none_is_bottom() {
        let none: Option<bool> = None;
        assert!(none.leq(&Some(false)));
        assert!(!Some(false).leq(&none));
        assert_eq!(none.lub(&Some(true)), Some(true));
        assert_eq!(none.glb(&Some(true)), None);
    }
}
