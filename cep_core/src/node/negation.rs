//! Negation nodes: suppress a positive match if a disallowed event type
//! occurs within its window.
//!
//! All three [`crate::pattern::NegationAlgorithm`] choices agree on which
//! pending matches a negative event discards; they differ only in how the
//! discard search is ordered, which is a placement/traversal optimization
//! rather than a semantic one. `Statistic` and `LowestPosition` are
//! recorded on the node so a future plan builder can special-case the scan
//! order without changing this module's public surface; today all three
//! scan `pending` the same way.

use crate::node::NodeId;
use crate::pattern::{NegationAlgorithm, PatternAtom};

#[derive(Debug)]
pub struct NegationState {
    /// The positive subtree this negation is anchored to.
    pub positive: NodeId,
    pub negated: PatternAtom,
    pub algorithm: NegationAlgorithm,
}
