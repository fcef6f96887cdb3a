//! Tree node state.
//!
//! The tree itself is an arena (`Vec<TreeNode>`, see [`crate::tree::Tree`])
//! rather than a graph of owned/`Rc`'d nodes: every edge is a [`NodeId`]
//! index, so the evaluation mechanism can mutate any two nodes on an event's
//! path without fighting the borrow checker over shared parent/child
//! ownership.

pub mod binary;
pub mod kc;
pub mod leaf;
pub mod negation;

pub use binary::BinaryState;
pub use kc::KcState;
pub use leaf::LeafState;
pub use negation::NegationState;

use crate::partial_match::PartialMatchId;
use crate::storage::PartialMatchStorage;
use std::sync::Arc;

/// An index into [`crate::tree::Tree`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug)]
pub enum NodeKind {
    Leaf(LeafState),
    Binary(BinaryState),
    Negation(NegationState),
    Kc(KcState),
}

/// One node's mutable state: its kind-specific data and the bound names for
/// every partial match currently buffered anywhere in its subtree's
/// storage(s).
///
/// Bound names live here, in a per-match side table, rather than on
/// [`crate::partial_match::PartialMatch`] itself -- keeping `PartialMatch`'s
/// fields exactly the windowing/dedup bookkeeping the rest of the tree
/// needs, while this node answers "what name is event #i bound to" only
/// when a predicate at this node actually needs to ask. A leaf node never
/// buffers anything itself (its accepted events are buffered by whichever
/// binary parent needs them for a join), so only [`NodeKind::Negation`] and
/// [`NodeKind::Kc`] use `storage`; [`NodeKind::Binary`] keeps two storages
/// of its own (see [`BinaryState`]).
#[derive(Debug)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub storage: Option<Box<dyn PartialMatchStorage>>,
    pub bound_names: hashbrown::HashMap<PartialMatchId, Vec<Arc<str>>>,
    pub window_nanos: i64,
}

impl TreeNode {
    pub fn record_names(&mut self, id: PartialMatchId, names: Vec<Arc<str>>) {
        self.bound_names.insert(id, names);
    }

    pub fn names_of(&self, id: PartialMatchId) -> &[Arc<str>] {
        self.bound_names
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn forget(&mut self, id: PartialMatchId) {
        self.bound_names.remove(&id);
    }
}
