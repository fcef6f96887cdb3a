//! Binary (AND/SEQ) internal nodes.
//!
//! Unlike leaf/negation/Kc nodes, a binary node owns *two* storages: the
//! partial matches contributed so far by its left child and by its right
//! child. Every new match on one side is joined against every compatible
//! match currently buffered on the other, then buffered on its own side
//! for future joins from the other direction.

use crate::node::NodeId;
use crate::pattern::Predicate;
use crate::plan::{BinaryOp, JoinStrategy};
use crate::storage::PartialMatchStorage;

#[derive(Debug)]
pub struct BinaryState {
    pub operator: BinaryOp,
    pub left: NodeId,
    pub right: NodeId,
    pub strategy: JoinStrategy,
    /// Predicates newly satisfiable once both children are in scope,
    /// assigned here by the plan builder rather than re-checked at every
    /// ancestor.
    pub predicates: Vec<Predicate>,
    pub left_storage: Box<dyn PartialMatchStorage>,
    pub right_storage: Box<dyn PartialMatchStorage>,
}
