//! Declarative patterns: the input to plan construction (out of this
//! core's scope) and, indirectly, to the tree this core evaluates.

use crate::event::Event;
use std::{fmt, sync::Arc};

/// A primitive pattern atom: an event type bound to a variable name that
/// predicates range over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternAtom {
    pub event_type: Arc<str>,
    pub name: Arc<str>,
}

impl PatternAtom {
    pub fn new(event_type: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            event_type: event_type.into(),
            name: name.into(),
        }
    }
}

/// Read-only view over the events bound to names within the scope of one
/// predicate evaluation (one tree node's subtree).
pub struct Bindings<'a> {
    names: &'a [Arc<str>],
    events: &'a [Arc<Event>],
}

impl<'a> Bindings<'a> {
    pub fn new(names: &'a [Arc<str>], events: &'a [Arc<Event>]) -> Self {
        debug_assert_eq!(names.len(), events.len());
        Self { names, events }
    }

    /// The event bound to `name`, if it is within scope.
    pub fn get(&self, name: &str) -> Option<&Event> {
        self.names
            .iter()
            .position(|n| n.as_ref() == name)
            .map(|i| self.events[i].as_ref())
    }
}

/// A boxed predicate over a [`Bindings`] scope.
pub type PredicateFn = Arc<dyn Fn(&Bindings<'_>) -> bool + Send + Sync>;

/// A named predicate, so debug output and error messages are readable
/// instead of `<closure>`, carrying the set of bound names it reads so the
/// plan builder can place it at the shallowest tree node where all of
/// those names are already in scope.
#[derive(Clone)]
pub struct Predicate {
    pub label: Arc<str>,
    pub names: Vec<Arc<str>>,
    pub f: PredicateFn,
}

impl Predicate {
    pub fn new(label: impl Into<Arc<str>>, names: Vec<Arc<str>>, f: PredicateFn) -> Self {
        Self {
            label: label.into(),
            names,
            f,
        }
    }

    pub fn eval(&self, bindings: &Bindings<'_>) -> bool {
        (self.f)(bindings)
    }

    /// Whether every name this predicate reads is present in `scope`.
    pub fn satisfiable_within(&self, scope: &[Arc<str>]) -> bool {
        self.names.iter().all(|n| scope.contains(n))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.label)
    }
}

/// The declarative operator tree over primitive atoms.
///
/// `Or` only ever appears here, before the pattern-preprocessing boundary
/// (see [`crate::preprocess`]) normalizes it away by splitting the pattern
/// into several `Or`-free patterns -- pattern preprocessing internals are
/// out of this core's scope, but the contract (disjunctions never reach
/// the tree) is enforced by [`crate::preprocess::split_disjunctions`].
#[derive(Debug, Clone)]
pub enum Operator {
    Atom(PatternAtom),
    And(Vec<Operator>),
    Seq(Vec<Operator>),
    Or(Vec<Operator>),
    Neg(Box<Operator>),
    Kc {
        atom: PatternAtom,
        max_iter: usize,
        /// Inter-iteration predicate chain, e.g. `a_i.x < a_{i+1}.x`.
        step_predicate: Option<Predicate>,
    },
}

impl Operator {
    /// All primitive atoms reachable from this operator, in left-to-right
    /// declared order, including negated and iterated ones.
    pub fn atoms(&self) -> Vec<PatternAtom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms(&self, out: &mut Vec<PatternAtom>) {
        match self {
            Operator::Atom(a) => out.push(a.clone()),
            Operator::And(children) | Operator::Seq(children) | Operator::Or(children) => {
                for c in children {
                    c.collect_atoms(out);
                }
            }
            Operator::Neg(inner) => inner.collect_atoms(out),
            Operator::Kc { atom, .. } => out.push(atom.clone()),
        }
    }

    /// Whether this subtree (or any descendant) contains a top-level `Or`.
    pub fn contains_or(&self) -> bool {
        match self {
            Operator::Atom(_) => false,
            Operator::Or(_) => true,
            Operator::And(children) | Operator::Seq(children) => {
                children.iter().any(Operator::contains_or)
            }
            Operator::Neg(inner) => inner.contains_or(),
            Operator::Kc { .. } => false,
        }
    }
}

/// Negation algorithm choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegationAlgorithm {
    Naive,
    Statistic,
    LowestPosition,
}

/// Pre-seeded statistics shipped with a pattern, used to skip the
/// statistics-free initial plan builder.
#[derive(Debug, Clone, Default)]
pub struct StatisticsSeed {
    pub arrival_rates: hashbrown::HashMap<Arc<str>, f64>,
    pub selectivities: hashbrown::HashMap<(Arc<str>, Arc<str>), f64>,
}

/// A full pattern definition: operator tree, predicates, window,
/// optional confidence threshold, unique id, optional seed statistics.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: u64,
    pub operator: Operator,
    /// Conjunctive predicate set over bound names, evaluated as each is
    /// brought fully into scope by a join (assignment of *which* node
    /// checks *which* predicate is the plan builder's job).
    pub predicates: Vec<Predicate>,
    pub window_nanos: i64,
    pub confidence_threshold: Option<f64>,
    pub statistics: Option<StatisticsSeed>,
    pub negation_algorithm: NegationAlgorithm,
}

impl Pattern {
    /// Validate the pattern-level invariants that are fatal at construction:
    /// positive window, non-empty atom set, and every predicate referencing
    /// only names the pattern actually declares.
    pub fn validate(&self) -> Result<(), crate::errors::PatternError> {
        use crate::errors::*;
        use snafu::ensure;

        ensure!(
            self.window_nanos > 0,
            NonPositiveWindowSnafu {
                window_nanos: self.window_nanos
            }
        );
        let atoms = self.operator.atoms();
        ensure!(
            !atoms.is_empty(),
            EmptyPatternSnafu {
                pattern_id: self.id
            }
        );
        let bound: Vec<Arc<str>> = atoms.into_iter().map(|a| a.name).collect();
        for predicate in &self.predicates {
            let unbound: Vec<&str> = predicate
                .names
                .iter()
                .filter(|n| !bound.contains(n))
                .map(|n| n.as_ref())
                .collect();
            ensure!(
                unbound.is_empty(),
                UnsatisfiablePredicateSnafu {
                    names: unbound.join(", ")
                }
            );
        }
        Ok(())
    }
}
