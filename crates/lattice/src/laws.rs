// The class/law catalogue. A bounded-lattice declaration instantiates each
// class below; the verifier walks `laws_of` to know which obligations to
// discharge for it.

use std::fmt;

/// The built-in lattice classes, from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClassKind {
    PartialOrder,
    JoinSemiLattice,
    MeetSemiLattice,
    Lattice,
    BoundedLattice,
    Widening,
}

impl ClassKind {
    pub const ALL: [ClassKind; 6] = [
        ClassKind::PartialOrder,
        ClassKind::JoinSemiLattice,
        ClassKind::MeetSemiLattice,
        ClassKind::Lattice,
        ClassKind::BoundedLattice,
        ClassKind::Widening,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ClassKind::PartialOrder => "PartialOrder",
            ClassKind::JoinSemiLattice => "JoinSemiLattice",
            ClassKind::MeetSemiLattice => "MeetSemiLattice",
            ClassKind::Lattice => "Lattice",
            ClassKind::BoundedLattice => "BoundedLattice",
            ClassKind::Widening => "Widening",
        }
    }

    /// The class a widening-free bounded-lattice declaration instantiates,
    /// in superclass order.
    pub fn hierarchy(self) -> &'static [ClassKind] {
        match self {
            ClassKind::PartialOrder => &[ClassKind::PartialOrder],
            ClassKind::JoinSemiLattice => &[ClassKind::PartialOrder, ClassKind::JoinSemiLattice],
            ClassKind::MeetSemiLattice => &[ClassKind::PartialOrder, ClassKind::MeetSemiLattice],
            ClassKind::Lattice => &[
                ClassKind::PartialOrder,
                ClassKind::JoinSemiLattice,
                ClassKind::MeetSemiLattice,
                ClassKind::Lattice,
            ],
            ClassKind::BoundedLattice => &[
                ClassKind::PartialOrder,
                ClassKind::JoinSemiLattice,
                ClassKind::MeetSemiLattice,
                ClassKind::Lattice,
                ClassKind::BoundedLattice,
            ],
            ClassKind::Widening => &[
                ClassKind::PartialOrder,
                ClassKind::JoinSemiLattice,
                ClassKind::Widening,
            ],
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One algebraic law. Each maps to a closed formula over the declared
/// operators; the verifier checks its negation for satisfiability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LawKind {
    Reflexivity,
    AntiSymmetry,
    Transitivity,
    LubCommutative,
    LubAssociative,
    LubIdempotent,
    LubUpperBound,
    GlbCommutative,
    GlbAssociative,
    GlbIdempotent,
    GlbLowerBound,
    Absorption,
    BotIsLeast,
    TopIsGreatest,
    /// Strictly increasing chains strictly decrease the height function.
    AscendingChain,
    /// `x ⊑ (x ▽ y)` and `y ⊑ (x ▽ y)`.
    WidenCovering,
}

impl LawKind {
    pub fn name(self) -> &'static str {
        match self {
            LawKind::Reflexivity => "reflexivity",
            LawKind::AntiSymmetry => "anti-symmetry",
            LawKind::Transitivity => "transitivity",
            LawKind::LubCommutative => "lub-commutative",
            LawKind::LubAssociative => "lub-associative",
            LawKind::LubIdempotent => "lub-idempotent",
            LawKind::LubUpperBound => "lub-upper-bound",
            LawKind::GlbCommutative => "glb-commutative",
            LawKind::GlbAssociative => "glb-associative",
            LawKind::GlbIdempotent => "glb-idempotent",
            LawKind::GlbLowerBound => "glb-lower-bound",
            LawKind::Absorption => "absorption",
            LawKind::BotIsLeast => "bot-is-least",
            LawKind::TopIsGreatest => "top-is-greatest",
            LawKind::AscendingChain => "ascending-chain",
            LawKind::WidenCovering => "widen-covering",
        }
    }
}

impl fmt::Display for LawKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The laws a class adds over its superclasses.
pub fn laws_of(class: ClassKind) -> &'static [LawKind] {
    match class {
        ClassKind::PartialOrder => &[
            LawKind::Reflexivity,
            LawKind::AntiSymmetry,
            LawKind::Transitivity,
        ],
        ClassKind::JoinSemiLattice => &[
            LawKind::LubCommutative,
            LawKind::LubAssociative,
            LawKind::LubIdempotent,
            LawKind::LubUpperBound,
        ],
        ClassKind::MeetSemiLattice => &[
            LawKind::GlbCommutative,
            LawKind::GlbAssociative,
            LawKind::GlbIdempotent,
            LawKind::GlbLowerBound,
        ],
        ClassKind::Lattice => &[LawKind::Absorption],
        ClassKind::BoundedLattice => &[
            LawKind::BotIsLeast,
            LawKind::TopIsGreatest,
            LawKind::AscendingChain,
        ],
        ClassKind::Widening => &[LawKind::WidenCovering],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_contributes_laws() {
        for class in ClassKind::ALL {
            assert!(!laws_of(class).is_empty(), "{class} has no laws");
        }
    }

    #[test]
    fn bounded_lattice_hierarchy_reaches_partial_order() {
        let h = ClassKind::BoundedLattice.hierarchy();
        assert_eq!(h.first(), Some(&ClassKind::PartialOrder));
        assert_eq!(h.last(), Some(&ClassKind::BoundedLattice));
    }

    #[test]
    fn no_law_is_shared_between_classes() {
        let mut seen = std::collections::BTreeSet::new();
        for class in ClassKind::ALL {
            for law in laws_of(class) {
                assert!(seen.insert(*law), "{law} appears twice");
            }
        }
    }
}
