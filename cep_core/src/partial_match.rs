//! Partial and full matches.

use crate::event::Event;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Globally unique, monotonically increasing identity for a partial match.
///
/// Unique across the process lifetime and strictly increasing with
/// creation order. Backed by an [`IdGenerator`] owned by one [`crate::tree::Tree`]
/// (injected into every node at construction) rather than a process-global
/// atomic, so multiple engines can coexist in one process without
/// colliding ids -- see the "Global PartialMatch counter" design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartialMatchId(pub u64);

/// Issues strictly increasing [`PartialMatchId`]s.
#[derive(Debug, Clone)]
pub struct IdGenerator(Arc<AtomicU64>);

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    /// Issue the next id. Strictly greater than every id previously issued
    /// by this generator.
    pub fn next(&self) -> PartialMatchId {
        PartialMatchId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// An ordered sequence of events satisfying some operator sub-pattern, plus
/// the bookkeeping the tree needs to window, join, and de-duplicate it.
///
/// Equality (used by storage to reject duplicate content) is *set
/// equality of events plus equal pattern-id set*, not sequence equality
/// and not id equality: two
/// partial matches built from the same events for the same patterns are the
/// same partial match even if a join happened to construct them with the
/// events in a different order.
#[derive(Debug, Clone)]
pub struct PartialMatch {
    pub events: Vec<Arc<Event>>,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub pattern_ids: Vec<u64>,
    pub probability: Option<f64>,
    pub id: PartialMatchId,
}

impl PartialMatch {
    /// Build a length-1 partial match from a single event, as created by a
    /// leaf node.
    pub fn singleton(event: Arc<Event>, pattern_ids: Vec<u64>, ids: &IdGenerator) -> Self {
        Self {
            first_timestamp: event.min_timestamp,
            last_timestamp: event.max_timestamp,
            events: vec![event],
            pattern_ids,
            probability: None,
            id: ids.next(),
        }
    }

    /// Merge two partial matches into a new one, as an internal binary node
    /// does on a successful join. The caller is responsible for
    /// ordering `left`/`right` events as the operator requires (SEQ
    /// appends in declared order; AND has no ordering requirement, so the
    /// caller conventionally keeps left-then-right).
    pub fn merge(left: &Self, right: &Self, pattern_ids: Vec<u64>, ids: &IdGenerator) -> Self {
        let mut events = Vec::with_capacity(left.events.len() + right.events.len());
        events.extend(left.events.iter().cloned());
        events.extend(right.events.iter().cloned());
        Self {
            first_timestamp: left.first_timestamp.min(right.first_timestamp),
            last_timestamp: left.last_timestamp.max(right.last_timestamp),
            events,
            pattern_ids,
            probability: combine_probability(left.probability, right.probability),
            id: ids.next(),
        }
    }

    /// Window span of this match: `last_timestamp - first_timestamp`.
    pub fn span(&self) -> i64 {
        self.last_timestamp - self.first_timestamp
    }

    /// Whether this match fits within window `w`.
    pub fn within_window(&self, window_nanos: i64) -> bool {
        self.span() <= window_nanos
    }

    /// Adds `pattern_id` to the set this match contributes to, if not
    /// already present.
    pub fn add_pattern_id(&mut self, pattern_id: u64) {
        if !self.pattern_ids.contains(&pattern_id) {
            self.pattern_ids.push(pattern_id);
        }
    }

    /// Set-equality of events plus equal pattern-id set. Used by storage
    /// to reject a partial match already present under a different id.
    pub fn content_eq(&self, other: &Self) -> bool {
        if self.events.len() != other.events.len() {
            return false;
        }
        let mut pattern_ids_self = self.pattern_ids.clone();
        let mut pattern_ids_other = other.pattern_ids.clone();
        pattern_ids_self.sort_unstable();
        pattern_ids_other.sort_unstable();
        if pattern_ids_self != pattern_ids_other {
            return false;
        }
        let mut remaining: Vec<&Arc<Event>> = other.events.iter().collect();
        for e in &self.events {
            if let Some(pos) = remaining
                .iter()
                .position(|o| Arc::ptr_eq(*o, e) || o.as_ref() == e.as_ref())
            {
                remaining.remove(pos);
            } else {
                return false;
            }
        }
        remaining.is_empty()
    }
}

fn combine_probability(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a * b),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
