//! Tree plans: the shape decided before any event arrives, consumed by
//! [`crate::tree::Tree::from_plan`] to allocate the actual evaluation
//! mechanism. The plan builder produces a plan; the tree is built from
//! the plan.

use crate::pattern::{NegationAlgorithm, Operator, PatternAtom, Predicate};
use std::sync::Arc;

/// A join implementation choice for one [`TreePlanNode::Binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Compare every left partial match against every right partial match.
    NestedLoop,
    /// Both sides kept in [`crate::storage::SortedStorage`] on the join
    /// attribute; candidates located by binary search.
    SortedJoin,
}

/// The storage policy a plan assigns to one node's buffer.
#[derive(Debug, Clone)]
pub enum StoragePlan {
    Unsorted,
    SortedByTimestamp,
    /// Sorted by a named attribute on a named bound variable; the tree
    /// builder resolves `(bound_name, attribute)` into a concrete
    /// [`crate::storage::KeyExtractorFn`] when materializing the node.
    SortedByAttribute {
        bound_name: Arc<str>,
        attribute: Arc<str>,
    },
}

/// A node in the decided evaluation-tree shape, mirroring [`Operator`] but
/// carrying the per-node implementation decisions the plan builder makes:
/// join order, join strategy, storage policy, and (for negation) algorithm.
#[derive(Debug, Clone)]
pub enum TreePlanNode {
    Leaf {
        atom: PatternAtom,
        storage: StoragePlan,
    },
    Binary {
        operator: BinaryOp,
        left: Box<TreePlanNode>,
        right: Box<TreePlanNode>,
        strategy: JoinStrategy,
        storage: StoragePlan,
    },
    Negation {
        /// The positive subtree this negative atom is joined against.
        positive: Box<TreePlanNode>,
        negated: PatternAtom,
        algorithm: NegationAlgorithm,
    },
    Kc {
        atom: PatternAtom,
        max_iter: usize,
        step_predicate: Option<Predicate>,
        storage: StoragePlan,
    },
}

/// The two binary combinators a plan can place at an internal node. `Or` is
/// never a plan-node kind: it is eliminated before plan construction by
/// [`crate::preprocess::split_disjunctions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Seq,
}

impl TreePlanNode {
    /// All leaf/Kc atoms reachable from this plan node, left to right.
    pub fn atoms(&self) -> Vec<PatternAtom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<PatternAtom>) {
        match self {
            TreePlanNode::Leaf { atom, .. } => out.push(atom.clone()),
            TreePlanNode::Binary { left, right, .. } => {
                left.collect_atoms(out);
                right.collect_atoms(out);
            }
            TreePlanNode::Negation { positive, negated, .. } => {
                positive.collect_atoms(out);
                out.push(negated.clone());
            }
            TreePlanNode::Kc { atom, .. } => out.push(atom.clone()),
        }
    }
}

/// Decides a [`TreePlanNode`] shape for an `Or`-free [`Operator`] tree.
///
/// Implementations may consult [`crate::pattern::StatisticsSeed`] (when
/// present on the pattern) to choose join order and strategy; the trivial
/// builder below ignores statistics entirely.
pub trait TreePlanBuilder: std::fmt::Debug + Send + Sync {
    fn build(&self, operator: &Operator, negation_algorithm: NegationAlgorithm) -> TreePlanNode;
}

/// Builds a left-deep tree in declared operator order, with no statistics
/// and no join reordering: the structurally simplest legal plan, and the
/// fallback every adaptive builder starts from before any statistics have
/// been observed.
#[derive(Debug, Default)]
pub struct TrivialLeftDeepBuilder;

impl TreePlanBuilder for TrivialLeftDeepBuilder {
    fn build(&self, operator: &Operator, negation_algorithm: NegationAlgorithm) -> TreePlanNode {
        build_left_deep(operator, negation_algorithm)
    }
}

fn build_left_deep(operator: &Operator, negation_algorithm: NegationAlgorithm) -> TreePlanNode {
    match operator {
        Operator::Atom(atom) => TreePlanNode::Leaf {
            atom: atom.clone(),
            storage: StoragePlan::SortedByTimestamp,
        },
        Operator::Kc {
            atom,
            max_iter,
            step_predicate,
        } => TreePlanNode::Kc {
            atom: atom.clone(),
            max_iter: *max_iter,
            step_predicate: step_predicate.clone(),
            storage: StoragePlan::SortedByTimestamp,
        },
        Operator::Neg(inner) => {
            // A bare top-level negation has no positive sibling to anchor
            // on; the plan builder that calls this with a real pattern
            // never passes one in isolation (negation is always a child of
            // an And/Seq in practice), but a bare one still degrades to the
            // naive algorithm rather than panicking, holding a fully
            // windowed buffer for the unanchored case.
            let negated = inner.atoms().into_iter().next().expect(
                "Operator::Neg must wrap an atom or a subtree with at least one atom",
            );
            TreePlanNode::Negation {
                positive: Box::new(TreePlanNode::Leaf {
                    atom: negated.clone(),
                    storage: StoragePlan::SortedByTimestamp,
                }),
                negated,
                algorithm: negation_algorithm,
            }
        }
        Operator::And(children) | Operator::Seq(children) => {
            let op = if matches!(operator, Operator::And(_)) {
                BinaryOp::And
            } else {
                BinaryOp::Seq
            };
            build_left_deep_chain(op, children, negation_algorithm)
        }
        Operator::Or(_) => unreachable!(
            "Operator::Or must be eliminated by split_disjunctions before plan construction"
        ),
    }
}

fn build_left_deep_chain(
    op: BinaryOp,
    children: &[Operator],
    negation_algorithm: NegationAlgorithm,
) -> TreePlanNode {
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    for child in children {
        match child {
            Operator::Neg(inner) => negatives.push(inner.as_ref().clone()),
            other => positives.push(other.clone()),
        }
    }
    assert!(
        !positives.is_empty(),
        "a conjunction/sequence made entirely of negated atoms has no anchor and is rejected at pattern validation"
    );

    let mut acc = build_left_deep(&positives[0], negation_algorithm);
    for child in &positives[1..] {
        let right = build_left_deep(child, negation_algorithm);
        acc = TreePlanNode::Binary {
            operator: op,
            left: Box::new(acc),
            right: Box::new(right),
            strategy: JoinStrategy::NestedLoop,
            storage: StoragePlan::SortedByTimestamp,
        };
    }
    for neg in &negatives {
        let negated = neg
            .atoms()
            .into_iter()
            .next()
            .expect("negated operand must contain an atom");
        acc = TreePlanNode::Negation {
            positive: Box::new(acc),
            negated,
            algorithm: negation_algorithm,
        };
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_deep_seq_nests_in_declared_order() {
        let op = Operator::Seq(vec![
            Operator::Atom(PatternAtom::new("A", "a")),
            Operator::Atom(PatternAtom::new("B", "b")),
            Operator::Atom(PatternAtom::new("C", "c")),
        ]);
        let plan = TrivialLeftDeepBuilder.build(&op, NegationAlgorithm::Naive);
        match plan {
            TreePlanNode::Binary { left, right, .. } => {
                assert_eq!(right.atoms()[0].name.as_ref(), "c");
                match *left {
                    TreePlanNode::Binary { left, right, .. } => {
                        assert_eq!(left.atoms()[0].name.as_ref(), "a");
                        assert_eq!(right.atoms()[0].name.as_ref(), "b");
                    }
                    _ => panic!("expected nested binary"),
                }
            }
            _ => panic!("expected binary plan"),
        }
    }

    #[test]
    fn negated_child_wraps_positive_accumulator() {
        let op = Operator::And(vec![
            Operator::Atom(PatternAtom::new("A", "a")),
            Operator::Neg(Box::new(Operator::Atom(PatternAtom::new("B", "b")))),
        ]);
        let plan = TrivialLeftDeepBuilder.build(&op, NegationAlgorithm::Naive);
        assert!(matches!(plan, TreePlanNode::Negation { .. }));
    }
}
