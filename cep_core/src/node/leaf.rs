//! Leaf nodes: the tree's only event intake points.

use crate::pattern::{PatternAtom, Predicate};

#[derive(Debug)]
pub struct LeafState {
    pub atom: PatternAtom,
    /// Single-event filters, e.g. `a.price > 100`, checked before the
    /// event is even accepted as a singleton partial match.
    pub predicates: Vec<Predicate>,
}

impl LeafState {
    pub fn new(atom: PatternAtom) -> Self {
        Self {
            atom,
            predicates: Vec::new(),
        }
    }
}
