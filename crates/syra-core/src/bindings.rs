//! Variable bindings produced by unification.

use std::collections::{HashMap, HashSet};

use crate::atom::Atom;

/// An immutable-by-convention variable-to-atom substitution map.
///
/// Bindings are cloned at branch points rather than mutated in place across
/// derivations; unification is the only producer of new entries and upholds
/// the invariant that no variable maps to an atom transitively containing
/// that variable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    map: HashMap<Atom, Atom>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Direct binding for a variable, without chain resolution.
    pub fn get(&self, var: &Atom) -> Option<&Atom> {
        self.map.get(var)
    }

    pub(crate) fn insert(&mut self, var: Atom, atom: Atom) {
        debug_assert!(var.is_variable(), "bindings key must be a variable");
        self.map.insert(var, atom);
    }

    /// Resolve an atom through variable chains.
    ///
    /// Follows `$x -> $y -> t` until a non-variable or unbound variable is
    /// reached. Cycle-guarded: a chain that loops back resolves to the last
    /// atom before the repeat, so resolution always terminates.
    pub fn resolve(&self, atom: &Atom) -> Atom {
        let mut current = atom.clone();
        let mut seen: HashSet<u64> = HashSet::new();
        while current.is_variable() {
            if !seen.insert(current.id()) {
                break;
            }
            match self.map.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Atom, &Atom)> {
        self.map.iter()
    }
}
