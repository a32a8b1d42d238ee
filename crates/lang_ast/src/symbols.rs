// The declaration registry. Built once during resolution, monotone while it
// grows, read-only afterwards. A name may map to several declarations while
// resolution is in flight; disambiguation requires exactly one.

use std::collections::{BTreeSet, HashMap};

use smol_str::SmolStr;

use crate::{DeclIdx, QualName};

/// One registered declaration. Variants that correspond to a weeded
/// declaration carry its index into `Module::decls`; `Class` and `Impl`
/// rows are registered by the resolver for the built-in lattice classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Def { decl: DeclIdx },
    Enum { decl: DeclIdx, tags: BTreeSet<SmolStr> },
    Relation { decl: DeclIdx },
    Lattice { decl: DeclIdx },
    Law { decl: DeclIdx },
    Class { name: SmolStr },
    Impl { class: SmolStr, decl: DeclIdx },
    Index { decl: DeclIdx },
    BoundedLattice { decl: DeclIdx },
    Namespace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    map: HashMap<QualName, Vec<Declaration>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: QualName, decl: Declaration) {
        self.map.entry(name).or_default().push(decl);
    }

    /// All declarations registered under `name`.
    pub fn lookup(&self, name: &QualName) -> &[Declaration] {
        self.map.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The unique declaration under `name`, if exactly one is registered.
    pub fn lookup_unique(&self, name: &QualName) -> Option<&Declaration> {
        match self.lookup(name) {
            [single] => Some(single),
            _ => None,
        }
    }

    pub fn contains(&self, name: &QualName) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QualName, &[Declaration])> {
        self.map.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
